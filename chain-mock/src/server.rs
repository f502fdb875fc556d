/// Axum HTTP server setup and routing

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::*;
use crate::ledger::Ledger;

pub fn create_router(state: AppState) -> Router {
    // Wallet frontends and tests call from arbitrary origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // JSON-RPC
        .route("/", post(json_rpc))

        // Health check
        .route("/health", get(health_check))

        // Test helper endpoints
        .route("/mock/fund", post(fund))
        .route("/mock/transactions", get(transactions))

        // Shared state
        .with_state(state)

        // Middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(ledger: Ledger, host: String, port: u16) -> anyhow::Result<()> {
    let app = create_router(Arc::new(Mutex::new(ledger)));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("🚀 Chain mock listening on http://{}", addr);
    log::info!("💧 Funding endpoint: POST /mock/fund");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Serve `ledger` on an ephemeral localhost port in the background.
///
/// Returns the bound address and a handle on the shared ledger so tests can
/// fund accounts and inspect mined transactions directly.
pub async fn spawn(ledger: Ledger) -> anyhow::Result<(SocketAddr, AppState)> {
    let state: AppState = Arc::new(Mutex::new(ledger));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let app = create_router(state.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            log::error!("Chain mock server stopped: {}", e);
        }
    });

    log::debug!("Chain mock spawned on {}", addr);
    Ok((addr, state))
}
