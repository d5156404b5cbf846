//! HTTP surface (axum): the OAuth redirect target and the calendar
//! push-notification receiver.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use servitor_core::{engine::CorrelationEngine, messaging::port::MessagingPort, Result};

mod handlers;
mod page;

pub use page::{CallbackError, Page};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CorrelationEngine>,
    pub messenger: Arc<dyn MessagingPort>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth/google", get(handlers::auth_google))
        .route("/notification", post(handlers::notification))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Bind `addr` and serve until the process exits.
pub async fn serve(addr: SocketAddr, state: Arc<AppState>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "http listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}
