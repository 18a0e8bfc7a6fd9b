//! Lock ordering for a transfer between two accounts.
//!
//! Every caller touches the account with the larger id first. Two transfers
//! over the same pair, in either direction, therefore request their locks in
//! the same sequence and cannot wait on each other in a cycle.

use std::cmp::Ordering;

use crate::{Amount, Transaction};

/// Order in which two accounts are locked or updated: `Less` means `a` goes
/// first.
#[must_use]
pub fn lock_order(a: i64, b: i64) -> Ordering {
    b.cmp(&a)
}

/// Parameters of a transfer, rearranged into lock order.
///
/// `low` is the account locked (and updated) first, `high` the second one.
/// The signed deltas follow the accounts they belong to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferOrder {
    pub source_account_id: i64,
    pub destination_account_id: i64,
    /// Canonical (rounded to five decimals) transfer amount.
    pub amount: Amount,
    pub low_account_id: i64,
    pub high_account_id: i64,
    pub low_delta: Amount,
    pub high_delta: Amount,
}

impl TransferOrder {
    pub fn new(source_account_id: i64, destination_account_id: i64, amount: &Amount) -> Self {
        let amount = amount.canonical();
        let debit = -&amount;
        match lock_order(source_account_id, destination_account_id) {
            Ordering::Greater => Self {
                source_account_id,
                destination_account_id,
                low_account_id: destination_account_id,
                high_account_id: source_account_id,
                low_delta: amount.clone(),
                high_delta: debit,
                amount,
            },
            Ordering::Less | Ordering::Equal => Self {
                source_account_id,
                destination_account_id,
                low_account_id: source_account_id,
                high_account_id: destination_account_id,
                low_delta: debit,
                high_delta: amount.clone(),
                amount,
            },
        }
    }

    /// Returns `true` when the source account is the one locked first.
    #[must_use]
    pub fn source_is_low(&self) -> bool {
        self.low_account_id == self.source_account_id
    }

    /// The record a successful transfer appends.
    #[must_use]
    pub fn transaction(&self) -> Transaction {
        Transaction::new(
            self.source_account_id,
            self.destination_account_id,
            self.amount.clone(),
        )
    }
}
