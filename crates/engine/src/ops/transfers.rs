use crate::{
    Amount, EngineError, ResultEngine, Transaction, TransferCmd, TransferOrder, TransferStrategy,
    store,
};

use super::Engine;

impl Engine {
    /// Validate a transfer and execute it with the configured strategy.
    pub async fn transfer(&self, cmd: TransferCmd) -> ResultEngine<Transaction> {
        let order = self.validate_transfer(&cmd).await?;
        self.strategy.execute(&self.database, &order).await
    }

    /// Validate a transfer and execute it with `strategy`.
    pub async fn transfer_with(
        &self,
        strategy: &dyn TransferStrategy,
        cmd: TransferCmd,
    ) -> ResultEngine<Transaction> {
        let order = self.validate_transfer(&cmd).await?;
        strategy.execute(&self.database, &order).await
    }

    /// Checks, in order: the amount is a positive decimal, the accounts
    /// differ, both accounts exist. Nothing is written.
    async fn validate_transfer(&self, cmd: &TransferCmd) -> ResultEngine<TransferOrder> {
        let amount = cmd.amount.parse::<Amount>()?.canonical();
        if !amount.is_positive() {
            return Err(EngineError::InvalidAmount(cmd.amount.clone()));
        }
        if cmd.source_account_id == cmd.destination_account_id {
            return Err(EngineError::SameAccount(cmd.source_account_id));
        }
        store::read(&self.database, cmd.source_account_id).await?;
        store::read(&self.database, cmd.destination_account_id).await?;

        Ok(TransferOrder::new(
            cmd.source_account_id,
            cmd.destination_account_id,
            &amount,
        ))
    }
}
