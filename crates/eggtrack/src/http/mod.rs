//! HTTP facade.
//!
//! Reads (`data`, `qr`, `pdf`, `sheet`, `GET egg-number`) are open. Mutations
//! require the configured shared secret, except the webhook, which accepts
//! any caller and only logs a missing signature header.

pub mod error;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::Config;
use crate::storage::EntryStore;

pub use error::ApiError;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The entry store.
    pub store: Arc<EntryStore>,
    /// Loaded configuration.
    pub config: Arc<Config>,
}

impl AppState {
    /// Bundle a store and configuration.
    #[must_use]
    pub fn new(store: EntryStore, config: Config) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/data", get(handlers::list_entries))
        .route(
            "/api/add",
            get(handlers::add_entry_redirect).post(handlers::add_entry),
        )
        .route("/api/delete", post(handlers::delete_entry))
        .route(
            "/api/egg-number",
            get(handlers::get_egg_number).post(handlers::set_egg_number),
        )
        .route("/api/qr", get(handlers::qr_code))
        .route("/api/pdf", get(handlers::label_pdf))
        .route("/api/sheet", get(handlers::label_sheet))
        .route("/api/webhook", post(handlers::webhook))
        .with_state(state)
}

/// Create the entry document if it is missing.
///
/// A backend failure is logged and swallowed so the server still starts;
/// reads degrade to an empty list until the backend recovers. Returns
/// whether the document is known to exist.
pub async fn prepare_store(store: &EntryStore) -> bool {
    match store.ensure().await {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, store = %store.location(), "could not prepare entry document; serving anyway");
            false
        }
    }
}

/// Serve `state` on `addr` until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    if state.config.secret().is_none() {
        warn!("no server.secret configured; add, delete and egg-number updates will be rejected");
    }
    prepare_store(&state.store).await;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local = listener.local_addr().context("failed to read bound address")?;
    info!(addr = %local, store = %state.store.location(), "listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => {
            warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
