//! LearnPlay · kids' learning games backend
//!
//! - Axum HTTP + WebSocket API driving quiz-style exercise sessions
//! - Built-in catalog (arithmetic, fractions, geometry, algebra, phonics, reading),
//!   optionally extended from a TOML catalog file
//! - Progress persisted per module (JSON files or in memory)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   LEARNPLAY_CONFIG_PATH : path to TOML config (rules, messages, storage)
//!   CATALOG_PATH          : extra TOML catalog, overrides `catalog_path`
//!   PROGRESS_DIR          : JSON progress directory, overrides `progress_dir`
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod grading;
mod catalog;
mod seeds;
mod progress;
mod notify;
mod runner;
mod scheduler;
mod session;
mod config;
mod state;
mod protocol;
mod logic;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::routes::build_router;
use crate::state::{spawn_session_sweeper, AppState};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Catalog problems are fatal at startup, never mid-session.
  let state = match AppState::new() {
    Ok(s) => Arc::new(s),
    Err(e) => {
      error!(target: "learnplay", error = %e, "Content catalog failed validation");
      return Err(e.into());
    }
  };

  let _sweeper = spawn_session_sweeper(state.clone());
  let app = build_router(state);

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "learnplay", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!(target: "learnplay", error = %e, "Failed to listen for shutdown signal");
    std::future::pending::<()>().await;
  }
  info!(target: "learnplay", "Shutdown signal received");
}
