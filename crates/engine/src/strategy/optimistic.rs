//! Optimistic-retry strategy.

use std::future::Future;

use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseConnection, IsolationLevel};

use crate::{
    EngineError, ResultEngine, Transaction, TransferOrder,
    store::{StoreFailure, with_tx},
};

use super::{RetryPolicy, StrategyKind, TransferStrategy};

/// Runs the whole transfer as one serializable unit of work and lets the
/// database detect conflicts, retrying them with [`RetryPolicy`].
///
/// The balance check is left to the `balance >= 0` constraint of the
/// `accounts` table.
#[derive(Clone, Copy, Debug, Default)]
pub struct OptimisticRetry {
    policy: RetryPolicy,
}

impl OptimisticRetry {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    async fn attempt(&self, db: &DatabaseConnection, sql: &str) -> ResultEngine<()> {
        with_tx!(db, IsolationLevel::Serializable, |tx| {
            tx.execute_unprepared(sql)
                .await
                .map(|_| ())
                .map_err(EngineError::from)
        })
    }
}

/// Both balance updates and the insert, issued as one round trip.
///
/// Only integers and canonical amounts are interpolated.
fn render(order: &TransferOrder) -> String {
    format!(
        "UPDATE accounts SET balance = balance + ({low_delta}) WHERE id = {low};\n\
         UPDATE accounts SET balance = balance + ({high_delta}) WHERE id = {high};\n\
         INSERT INTO transactions (source_account_id, destination_account_id, amount) \
         VALUES ({source}, {destination}, {amount});",
        low_delta = order.low_delta,
        low = order.low_account_id,
        high_delta = order.high_delta,
        high = order.high_account_id,
        source = order.source_account_id,
        destination = order.destination_account_id,
        amount = order.amount,
    )
}

/// Run `attempt` until it succeeds, fails with anything but a conflict, or
/// `policy.max_attempts` attempts have been made.
///
/// A balance-check failure becomes [`EngineError::InsufficientBalance`]. When
/// the attempts run out the last conflict is returned as is.
async fn retry_conflicts<F, Fut>(
    policy: RetryPolicy,
    order: &TransferOrder,
    mut attempt: F,
) -> ResultEngine<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ResultEngine<()>>,
{
    let mut retry = 0;
    loop {
        let err = match attempt().await {
            Ok(()) => {
                tracing::debug!(
                    source = order.source_account_id,
                    destination = order.destination_account_id,
                    amount = %order.amount,
                    attempts = retry + 1,
                    "transfer committed"
                );
                return Ok(());
            }
            Err(err) => err,
        };

        match StoreFailure::of(&err) {
            StoreFailure::BalanceCheck => return Err(EngineError::InsufficientBalance),
            StoreFailure::Other => return Err(err),
            StoreFailure::Conflict if retry + 1 >= policy.max_attempts => {
                tracing::warn!(
                    source = order.source_account_id,
                    destination = order.destination_account_id,
                    attempts = retry + 1,
                    "giving up on conflicting transfer: {err}"
                );
                return Err(err);
            }
            StoreFailure::Conflict => {
                let delay = policy.delay(retry);
                tracing::warn!(
                    source = order.source_account_id,
                    destination = order.destination_account_id,
                    attempt = retry + 1,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "transfer conflicted, retrying: {err}"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
        }
    }
}

#[async_trait]
impl TransferStrategy for OptimisticRetry {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Optimistic
    }

    async fn execute(
        &self,
        db: &DatabaseConnection,
        order: &TransferOrder,
    ) -> ResultEngine<Transaction> {
        let sql = render(order);
        retry_conflicts(self.policy, order, || self.attempt(db, &sql)).await?;
        Ok(order.transaction())
    }
}
