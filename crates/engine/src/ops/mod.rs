use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{RetryPolicy, StrategyKind, TransferStrategy};

mod accounts;
mod transfers;

/// Entry point of the engine: account bootstrap and validated transfers.
///
/// The engine holds no in-process locks. Mutual exclusion between concurrent
/// transfers is delegated to the database through the configured
/// [`TransferStrategy`].
#[derive(Clone, Debug)]
pub struct Engine {
    database: DatabaseConnection,
    strategy: Arc<dyn TransferStrategy>,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The strategy [`Engine::transfer`] delegates to.
    pub fn strategy(&self) -> &dyn TransferStrategy {
        self.strategy.as_ref()
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
    strategy: StrategyKind,
    retry: RetryPolicy,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Select the transfer strategy. Defaults to [`StrategyKind::Optimistic`].
    pub fn strategy(mut self, strategy: StrategyKind) -> EngineBuilder {
        self.strategy = strategy;
        self
    }

    /// Retry policy of the optimistic strategy.
    pub fn retry_policy(mut self, retry: RetryPolicy) -> EngineBuilder {
        self.retry = retry;
        self
    }

    /// Construct `Engine`
    pub fn build(self) -> Engine {
        Engine {
            database: self.database,
            strategy: self.strategy.build(self.retry),
        }
    }
}
