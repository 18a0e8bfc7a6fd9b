//! Lock-ordered strategy.

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, IsolationLevel};

use crate::{
    Account, EngineError, ResultEngine, Transaction, TransferOrder,
    store::{self, with_tx},
};

use super::{StrategyKind, TransferStrategy};

/// Locks both account rows in [`lock_order`](crate::lock_order) inside a
/// read-committed unit of work, then checks and writes the balances.
#[derive(Clone, Copy, Debug, Default)]
pub struct LockOrdered;

impl LockOrdered {
    async fn apply<C: ConnectionTrait>(
        &self,
        tx: &C,
        order: &TransferOrder,
    ) -> ResultEngine<Transaction> {
        let low = store::read_for_update(tx, order.low_account_id).await?;
        let high = store::read_for_update(tx, order.high_account_id).await?;
        let (source, destination) = if order.source_is_low() {
            (low, high)
        } else {
            (high, low)
        };

        let source_balance = &source.balance - &order.amount;
        if source_balance.is_negative() {
            return Err(EngineError::InsufficientBalance);
        }
        let destination_balance = &destination.balance + &order.amount;

        store::write(tx, &Account::new(source.id, source_balance)).await?;
        store::write(tx, &Account::new(destination.id, destination_balance)).await?;

        let record = order.transaction();
        store::insert_transaction(tx, &record).await?;
        Ok(record)
    }
}

#[async_trait]
impl TransferStrategy for LockOrdered {
    fn kind(&self) -> StrategyKind {
        StrategyKind::LockOrdered
    }

    async fn execute(
        &self,
        db: &DatabaseConnection,
        order: &TransferOrder,
    ) -> ResultEngine<Transaction> {
        let record = with_tx!(db, IsolationLevel::ReadCommitted, |tx| {
            self.apply(&tx, order).await
        })?;
        tracing::debug!(
            source = order.source_account_id,
            destination = order.destination_account_id,
            amount = %order.amount,
            "transfer committed with row locks"
        );
        Ok(record)
    }
}
