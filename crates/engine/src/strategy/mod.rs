//! Concurrency strategies executing a validated transfer.
//!
//! Both strategies honour the same contract: the debit, the credit and the
//! transfer record commit together or not at all, no balance goes negative,
//! and concurrent transfers over overlapping accounts take effect in some
//! serial order.

use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;
use rand::Rng;
use sea_orm::DatabaseConnection;
use serde::Deserialize;

use crate::{ResultEngine, Transaction, TransferOrder};

mod lock;
mod optimistic;

pub use lock::LockOrdered;
pub use optimistic::OptimisticRetry;

/// Applies a [`TransferOrder`] to the store.
#[async_trait]
pub trait TransferStrategy: fmt::Debug + Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn execute(
        &self,
        db: &DatabaseConnection,
        order: &TransferOrder,
    ) -> ResultEngine<Transaction>;
}

/// Selects a [`TransferStrategy`] from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Explicit row locks taken in [`lock_order`](crate::lock_order).
    LockOrdered,
    /// Serializable unit of work retried on conflicts.
    #[default]
    Optimistic,
}

impl StrategyKind {
    #[must_use]
    pub fn build(self, retry: RetryPolicy) -> Arc<dyn TransferStrategy> {
        match self {
            Self::LockOrdered => Arc::new(LockOrdered),
            Self::Optimistic => Arc::new(OptimisticRetry::new(retry)),
        }
    }
}

/// Randomised exponential backoff for transient conflicts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    /// Upper bound (exclusive) of the random delay added to each backoff.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            jitter: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (0-based), doubling each time.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry))
    }

    /// [`backoff`](Self::backoff) plus a random jitter.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..jitter_ms)
        };
        self.backoff(retry)
            .saturating_add(Duration::from_millis(jitter))
    }
}
