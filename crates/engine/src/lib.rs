//! Double-entry money transfers between accounts.
//!
//! A transfer debits one account and credits another by the same exact
//! amount and appends a record to the transaction log, all in one unit of
//! work. Concurrent transfers are serialised by the database through one of
//! two [`TransferStrategy`] implementations:
//!
//! - [`LockOrdered`] locks both rows in [`lock_order`] before writing.
//! - [`OptimisticRetry`] runs a serializable unit of work and retries
//!   conflicts with a [`RetryPolicy`].

pub use accounts::Account;
pub use amount::{Amount, SCALE};
pub use commands::{NewAccountCmd, TransferCmd};
pub use error::EngineError;
pub use ops::{Engine, EngineBuilder};
pub use ordering::{TransferOrder, lock_order};
pub use store::{BALANCE_CONSTRAINT, StoreFailure};
pub use strategy::{LockOrdered, OptimisticRetry, RetryPolicy, StrategyKind, TransferStrategy};
pub use transactions::Transaction;

mod accounts;
mod amount;
mod commands;
mod error;
mod ops;
mod ordering;
mod store;
mod strategy;
mod transactions;

pub type ResultEngine<T> = Result<T, EngineError>;
