//! The module contains `Account` struct and its database entity.

use sea_orm::{ActiveValue, entity::prelude::*};

use crate::{Amount, EngineError, ResultEngine};

/// An account holding a non-negative balance.
///
/// Accounts are created with a caller-assigned id and are only mutated by
/// transfers afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Account {
    pub id: i64,
    pub balance: Amount,
}

impl Account {
    pub fn new(id: i64, balance: Amount) -> Self {
        Self { id, balance }
    }
}

/// Balances are `DECIMAL` in the database. They are written through a
/// `numeric` cast and read back cast to text (see `store::read`) so that no
/// binary float ever holds them.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "accounts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i64,
    #[sea_orm(column_type = "Decimal(None)", save_as = "numeric")]
    pub balance: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Account> for ActiveModel {
    fn from(account: &Account) -> Self {
        Self {
            id: ActiveValue::Set(account.id),
            balance: ActiveValue::Set(account.balance.to_string()),
        }
    }
}

impl TryFrom<Model> for Account {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            balance: parse_stored(&model.balance)?,
        })
    }
}

/// Decode a balance read back from the database.
pub(crate) fn parse_stored(value: &str) -> ResultEngine<Amount> {
    value
        .trim()
        .parse()
        .map_err(|_| EngineError::Database(DbErr::Type(format!("invalid stored amount: {value}"))))
}
