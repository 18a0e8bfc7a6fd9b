use axum::{Json, http::StatusCode, response::IntoResponse};
use engine::EngineError;

use api_types::ErrorResponse;
pub use server::{ServerState, router, run_with_listener, spawn_with_listener};

mod accounts;
mod server;
mod transactions;

pub mod types {
    pub mod account {
        pub use api_types::account::{AccountCreated, AccountNew, AccountView};
    }

    pub mod transaction {
        pub use api_types::transaction::{TransactionNew, TransactionView};
    }
}

pub enum ServerError {
    Engine(EngineError),
    Generic(String),
}

fn status_for_engine_error(err: &EngineError) -> StatusCode {
    match err {
        EngineError::AccountNotFound(_) => StatusCode::NOT_FOUND,
        EngineError::InsufficientBalance => StatusCode::PAYMENT_REQUIRED,
        EngineError::Database(_) | EngineError::Rollback { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        EngineError::InvalidAmount(_)
        | EngineError::NegativeBalance(_)
        | EngineError::SameAccount(_)
        | EngineError::InvalidId(_)
        | EngineError::ExistingAccount(_) => StatusCode::BAD_REQUEST,
    }
}

fn message_for_engine_error(err: EngineError) -> String {
    if err.is_storage() {
        tracing::error!("database error: {err}");
        return "internal server error".to_string();
    }
    err.to_string()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ServerError::Engine(err) => (status_for_engine_error(&err), message_for_engine_error(err)),
            ServerError::Generic(err) => (StatusCode::BAD_REQUEST, err),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}

impl From<EngineError> for ServerError {
    fn from(value: EngineError) -> Self {
        Self::Engine(value)
    }
}
