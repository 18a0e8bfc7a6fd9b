use crate::{Account, Amount, EngineError, NewAccountCmd, ResultEngine, store};

use super::Engine;

impl Engine {
    /// Create an account.
    ///
    /// Creation is a bootstrap event: the initial balance is not backed by a
    /// transaction record.
    pub async fn create_account(&self, cmd: NewAccountCmd) -> ResultEngine<Account> {
        let NewAccountCmd {
            account_id,
            initial_balance,
        } = cmd;
        if account_id < 1 {
            return Err(EngineError::InvalidId(account_id));
        }
        let balance = initial_balance.parse::<Amount>()?.canonical();
        if balance.is_negative() {
            return Err(EngineError::NegativeBalance(initial_balance));
        }

        match store::read(&self.database, account_id).await {
            Ok(_) => return Err(EngineError::ExistingAccount(account_id)),
            Err(EngineError::AccountNotFound(_)) => {}
            Err(err) => return Err(err),
        }

        let account = Account::new(account_id, balance);
        store::create(&self.database, &account).await?;
        tracing::info!(account_id, balance = %account.balance, "account created");
        Ok(account)
    }

    /// Return an account.
    pub async fn account(&self, account_id: i64) -> ResultEngine<Account> {
        store::read(&self.database, account_id).await
    }
}
