use axum::{
    Router,
    routing::{get, post},
};

use std::{net::SocketAddr, sync::Arc};

use crate::{accounts, transactions};
use engine::Engine;

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
}

pub fn router(engine: Engine) -> Router {
    let state = ServerState {
        engine: Arc::new(engine),
    };
    Router::new()
        .route("/accounts", post(accounts::account_new))
        .route("/accounts/{account_id}", get(accounts::get))
        .route("/transactions", post(transactions::transaction_new))
        .with_state(state)
}

pub async fn run_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(
        strategy = ?engine.strategy().kind(),
        "Server listening on {}",
        addr
    );

    axum::serve(listener, router(engine)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    listener: tokio::net::TcpListener,
) -> Result<SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
