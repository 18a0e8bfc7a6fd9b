//! Transaction primitives.
//!
//! A `Transaction` is the immutable record of one committed transfer. The
//! table is append-only.

use sea_orm::{ActiveValue, entity::prelude::*};

use crate::Amount;

/// A committed transfer of `amount` from the source to the destination
/// account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub source_account_id: i64,
    pub destination_account_id: i64,
    pub amount: Amount,
}

impl Transaction {
    pub fn new(source_account_id: i64, destination_account_id: i64, amount: Amount) -> Self {
        Self {
            source_account_id,
            destination_account_id,
            amount,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub source_account_id: i64,
    pub destination_account_id: i64,
    #[sea_orm(column_type = "Decimal(None)", save_as = "numeric")]
    pub amount: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Transaction> for ActiveModel {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: ActiveValue::NotSet,
            source_account_id: ActiveValue::Set(tx.source_account_id),
            destination_account_id: ActiveValue::Set(tx.destination_account_id),
            amount: ActiveValue::Set(tx.amount.to_string()),
        }
    }
}
