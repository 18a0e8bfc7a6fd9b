use serde::{Deserialize, Serialize};

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub mod account {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountNew {
        pub account_id: i64,
        /// Decimal string, e.g. `"100.5"`.
        pub initial_balance: String,
    }

    /// Echo of a created account, balance in canonical form.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountCreated {
        pub account_id: i64,
        pub initial_balance: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct AccountView {
        pub account_id: i64,
        /// Canonical amount with five decimals.
        pub balance: String,
    }
}

pub mod transaction {
    use super::*;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionNew {
        pub source_account_id: i64,
        pub destination_account_id: i64,
        /// Decimal string, e.g. `"12.5"`.
        pub amount: String,
    }

    /// A committed transfer. `amount` is rendered with five decimals.
    #[derive(Debug, Serialize, Deserialize)]
    pub struct TransactionView {
        pub source_account_id: i64,
        pub destination_account_id: i64,
        pub amount: String,
    }
}
