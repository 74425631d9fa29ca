//! REST API over the quote engine.
//!
//! - `POST /quotes`: compute (or recall) a quote from a request body
//! - `GET /quotes/{id}`: a previously computed quote
//! - `GET /quotes/{id}/tiers/{tier}`: one tier of a stored quote
//! - `GET /templates`: catalog listing

mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

use crate::catalog::loader::{DedupLoader, StaticSource};
use crate::engine::QuoteEngine;

pub use types::{ErrorResponse, TemplateSummary};

/// Application state shared across all request handlers.
///
/// The engine's quote cache is internally synchronized; templates and cost
/// tables reach the pipeline through the deduplicating loader.
pub struct AppState {
    pub engine: QuoteEngine,
    pub loader: DedupLoader<StaticSource>,
}

impl AppState {
    /// Serves templates and cost tables from the engine's own catalog and
    /// configuration.
    pub fn new(engine: QuoteEngine) -> Self {
        let source = StaticSource::new(engine.catalog().clone(), engine.config().clone());
        Self {
            engine,
            loader: DedupLoader::new(source),
        }
    }
}

/// Builds the axum router with all API routes.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/quotes", post(handlers::create_quote))
        .route("/quotes/{id}", get(handlers::get_quote))
        .route("/quotes/{id}/tiers/{tier}", get(handlers::get_tier))
        .route("/templates", get(handlers::list_templates))
        .with_state(state)
}

/// Binds to the given address and serves the API.
///
/// # Panics
///
/// Panics if the TCP listener cannot bind to `addr`.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind to {addr}: {e}"));
    info!(%addr, "API server listening");
    axum::serve(listener, app)
        .await
        .unwrap_or_else(|e| panic!("server error: {e}"));
}
