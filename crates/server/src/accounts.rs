//! Account API endpoints

use api_types::account::{AccountCreated, AccountNew, AccountView};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use engine::{Account, NewAccountCmd};

use crate::{ServerError, server::ServerState};

fn view(account: Account) -> AccountView {
    AccountView {
        account_id: account.id,
        balance: account.balance.to_string(),
    }
}

/// Handle requests for creating a new account
pub async fn account_new(
    State(state): State<ServerState>,
    Json(payload): Json<AccountNew>,
) -> Result<(StatusCode, Json<AccountCreated>), ServerError> {
    let account = state
        .engine
        .create_account(NewAccountCmd::new(
            payload.account_id,
            payload.initial_balance,
        ))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(AccountCreated {
            account_id: account.id,
            initial_balance: account.balance.to_string(),
        }),
    ))
}

/// Handle requests for reading an account
pub async fn get(
    State(state): State<ServerState>,
    Path(account_id): Path<i64>,
) -> Result<Json<AccountView>, ServerError> {
    if account_id < 1 {
        return Err(ServerError::Generic(format!("invalid account id: {account_id}")));
    }
    let account = state.engine.account(account_id).await?;
    Ok(Json(view(account)))
}
