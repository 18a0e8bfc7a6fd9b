//! Command structs for engine operations.
//!
//! These carry the raw request values; the engine validates and canonicalises
//! them before anything is persisted.

/// Move `amount` from the source to the destination account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferCmd {
    pub source_account_id: i64,
    pub destination_account_id: i64,
    /// Decimal string, e.g. `"12.5"`.
    pub amount: String,
}

impl TransferCmd {
    #[must_use]
    pub fn new(
        source_account_id: i64,
        destination_account_id: i64,
        amount: impl Into<String>,
    ) -> Self {
        Self {
            source_account_id,
            destination_account_id,
            amount: amount.into(),
        }
    }
}

/// Create an account with an initial balance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAccountCmd {
    pub account_id: i64,
    /// Decimal string, e.g. `"100"`.
    pub initial_balance: String,
}

impl NewAccountCmd {
    #[must_use]
    pub fn new(account_id: i64, initial_balance: impl Into<String>) -> Self {
        Self {
            account_id,
            initial_balance: initial_balance.into(),
        }
    }
}
