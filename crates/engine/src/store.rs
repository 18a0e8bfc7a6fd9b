//! Account store.
//!
//! Point reads, locked reads and writes over `accounts`, appends to
//! `transactions`, and the unit-of-work plumbing shared by the transfer
//! strategies. Every function is generic over [`ConnectionTrait`] so it runs
//! on the pool or inside a [`DatabaseTransaction`].

use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QuerySelect, RuntimeErr, Select, SqlErr,
    sea_query::{Alias, Expr, Func},
    sqlx::{self, error::DatabaseError, postgres::PgDatabaseError, sqlite::SqliteError},
};

use crate::{
    Account, EngineError, ResultEngine, Transaction,
    accounts::{self, Column as AccountColumn},
    transactions,
};

/// Name of the `balance >= 0` check on `accounts`.
pub const BALANCE_CONSTRAINT: &str = "accounts_balance_non_negative";

/// PostgreSQL `serialization_failure`.
const PG_SERIALIZATION_FAILURE: &str = "40001";
/// PostgreSQL `deadlock_detected`.
const PG_DEADLOCK_DETECTED: &str = "40P01";
/// Primary SQLite result codes for a busy or locked database.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Run a block inside a unit of work at the given isolation level, committing
/// on success and rolling back on error.
macro_rules! with_tx {
    ($db:expr, $isolation:expr, |$tx:ident| $body:expr) => {{
        let $tx =
            ::sea_orm::TransactionTrait::begin_with_config($db, Some($isolation), None).await?;
        let result = $body;
        $crate::store::finish($tx, result).await
    }};
}

pub(crate) use with_tx;

/// Commit `tx` when `result` is `Ok`, roll it back otherwise.
///
/// A failed rollback is reported together with the error that caused it.
pub(crate) async fn finish<T>(tx: DatabaseTransaction, result: ResultEngine<T>) -> ResultEngine<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(cause) => match tx.rollback().await {
            Ok(()) => Err(cause),
            Err(source) => Err(EngineError::Rollback {
                source,
                cause: Box::new(cause),
            }),
        },
    }
}

/// Select an account with its balance cast to text.
///
/// The cast column is aliased back to `balance`: SQLite names an unaliased
/// expression after its text.
fn select_account(id: i64) -> Select<accounts::Entity> {
    accounts::Entity::find_by_id(id)
        .select_only()
        .column(AccountColumn::Id)
        .column_as(
            Expr::col(AccountColumn::Balance).cast_as(Alias::new("text")),
            "balance",
        )
}

/// Read an account.
pub(crate) async fn read<C: ConnectionTrait>(conn: &C, id: i64) -> ResultEngine<Account> {
    select_account(id)
        .into_model::<accounts::Model>()
        .one(conn)
        .await?
        .ok_or(EngineError::AccountNotFound(id))
        .and_then(Account::try_from)
}

/// Read an account holding an exclusive row lock until the surrounding unit
/// of work ends.
pub(crate) async fn read_for_update<C: ConnectionTrait>(
    conn: &C,
    id: i64,
) -> ResultEngine<Account> {
    select_account(id)
        .lock_exclusive()
        .into_model::<accounts::Model>()
        .one(conn)
        .await?
        .ok_or(EngineError::AccountNotFound(id))
        .and_then(Account::try_from)
}

/// Overwrite the balance of an existing account.
pub(crate) async fn write<C: ConnectionTrait>(conn: &C, account: &Account) -> ResultEngine<()> {
    let result = accounts::Entity::update_many()
        .col_expr(
            AccountColumn::Balance,
            Func::cast_as(account.balance.to_string(), Alias::new("numeric")).into(),
        )
        .filter(AccountColumn::Id.eq(account.id))
        .exec(conn)
        .await?;
    if result.rows_affected == 0 {
        return Err(EngineError::AccountNotFound(account.id));
    }
    Ok(())
}

/// Insert a new account.
pub(crate) async fn create<C: ConnectionTrait>(conn: &C, account: &Account) -> ResultEngine<()> {
    accounts::Entity::insert(accounts::ActiveModel::from(account))
        .exec_without_returning(conn)
        .await
        .map_err(|err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => {
                EngineError::ExistingAccount(account.id)
            }
            _ => EngineError::Database(err),
        })?;
    Ok(())
}

/// Append a transfer record.
pub(crate) async fn insert_transaction<C: ConnectionTrait>(
    conn: &C,
    record: &Transaction,
) -> ResultEngine<()> {
    transactions::Entity::insert(transactions::ActiveModel::from(record))
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

/// Classification of a failed store call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreFailure {
    /// Serialization failure or detected deadlock. Safe to retry.
    Conflict,
    /// The database rejected a negative balance ([`BALANCE_CONSTRAINT`]).
    BalanceCheck,
    /// Anything else.
    Other,
}

impl StoreFailure {
    /// Classify an engine error coming out of a unit of work.
    pub fn of(err: &EngineError) -> Self {
        match err {
            EngineError::Database(db_err) => Self::of_db(db_err),
            EngineError::InsufficientBalance => Self::BalanceCheck,
            _ => Self::Other,
        }
    }

    fn of_db(err: &DbErr) -> Self {
        let Some(db_err) = database_error(err) else {
            return Self::Other;
        };
        if is_balance_check(db_err) {
            return Self::BalanceCheck;
        }
        if is_transient(db_err) {
            return Self::Conflict;
        }
        Self::Other
    }
}

fn database_error(err: &DbErr) -> Option<&(dyn DatabaseError + 'static)> {
    let runtime = match err {
        DbErr::Conn(runtime) | DbErr::Exec(runtime) | DbErr::Query(runtime) => runtime,
        _ => return None,
    };
    match runtime {
        RuntimeErr::SqlxError(sqlx::Error::Database(db_err)) => Some(&**db_err),
        _ => None,
    }
}

fn is_balance_check(db_err: &(dyn DatabaseError + 'static)) -> bool {
    if !matches!(db_err.kind(), sqlx::error::ErrorKind::CheckViolation) {
        return false;
    }
    match db_err.constraint() {
        Some(name) => name == BALANCE_CONSTRAINT,
        // SQLite only reports the constraint name in the message.
        None => db_err.message().contains(BALANCE_CONSTRAINT),
    }
}

fn is_transient(db_err: &(dyn DatabaseError + 'static)) -> bool {
    let code = db_err.code();
    if db_err.try_downcast_ref::<PgDatabaseError>().is_some() {
        return matches!(
            code.as_deref(),
            Some(PG_SERIALIZATION_FAILURE | PG_DEADLOCK_DETECTED)
        );
    }
    if db_err.try_downcast_ref::<SqliteError>().is_some() {
        // Extended result codes keep the primary code in the low byte.
        return code
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED));
    }
    false
}
