//! Transfer API endpoint

use api_types::transaction::{TransactionNew, TransactionView};
use axum::{Json, extract::State, http::StatusCode};
use engine::TransferCmd;

use crate::{ServerError, server::ServerState};

/// Handle requests for moving money between two accounts
pub async fn transaction_new(
    State(state): State<ServerState>,
    Json(payload): Json<TransactionNew>,
) -> Result<(StatusCode, Json<TransactionView>), ServerError> {
    for id in [payload.source_account_id, payload.destination_account_id] {
        if id < 1 {
            return Err(ServerError::Generic(format!("invalid account id: {id}")));
        }
    }

    let record = state
        .engine
        .transfer(TransferCmd::new(
            payload.source_account_id,
            payload.destination_account_id,
            payload.amount,
        ))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(TransactionView {
            source_account_id: record.source_account_id,
            destination_account_id: record.destination_account_id,
            amount: record.amount.to_string(),
        }),
    ))
}
