//! The module contains the error the engine can throw.
//!
//! The errors are:
//!
//! - [`InvalidAmount`], [`NegativeBalance`], [`SameAccount`] and [`InvalidId`]
//!   thrown when a request is rejected before touching balances.
//! - [`AccountNotFound`] thrown when a referenced account does not exist.
//! - [`InsufficientBalance`] thrown when a debit would make a balance negative.
//! - [`Database`] and [`Rollback`] thrown when persistence fails.
//!
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`NegativeBalance`]: EngineError::NegativeBalance
//!  [`SameAccount`]: EngineError::SameAccount
//!  [`InvalidId`]: EngineError::InvalidId
//!  [`AccountNotFound`]: EngineError::AccountNotFound
//!  [`InsufficientBalance`]: EngineError::InsufficientBalance
//!  [`Database`]: EngineError::Database
//!  [`Rollback`]: EngineError::Rollback
use sea_orm::DbErr;
use thiserror::Error;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("negative balance: {0}")]
    NegativeBalance(String),
    #[error("invalid ID: {0}")]
    InvalidId(i64),
    #[error("invalid transaction with same source and destination account: {0}")]
    SameAccount(i64),
    #[error("account not found: {0}")]
    AccountNotFound(i64),
    #[error("account already exists: {0}")]
    ExistingAccount(i64),
    #[error("insufficient balance in debiting account")]
    InsufficientBalance,
    #[error(transparent)]
    Database(#[from] DbErr),
    /// The rollback of a failed unit of work failed as well. Both causes are
    /// kept.
    #[error("rollback failed: {source} (after: {cause})")]
    Rollback {
        source: DbErr,
        cause: Box<EngineError>,
    },
}

impl EngineError {
    /// Returns `true` for errors produced by the persistence layer rather than
    /// by a rejected request.
    #[must_use]
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Rollback { .. })
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::NegativeBalance(a), Self::NegativeBalance(b)) => a == b,
            (Self::InvalidId(a), Self::InvalidId(b)) => a == b,
            (Self::SameAccount(a), Self::SameAccount(b)) => a == b,
            (Self::AccountNotFound(a), Self::AccountNotFound(b)) => a == b,
            (Self::ExistingAccount(a), Self::ExistingAccount(b)) => a == b,
            (Self::InsufficientBalance, Self::InsufficientBalance) => true,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            (
                Self::Rollback {
                    source: a,
                    cause: cause_a,
                },
                Self::Rollback {
                    source: b,
                    cause: cause_b,
                },
            ) => a.to_string() == b.to_string() && cause_a == cause_b,
            _ => false,
        }
    }
}
