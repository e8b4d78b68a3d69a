//! Dr. Coli · Korean coach backend
//!
//! - Axum HTTP API: `/api/coach` (feedback line), `/api/tts` (speech), `/api/v1/health`
//! - Optional OpenAI integration (via environment variables); without it the
//!   coach answers with built-in lines and TTS reports 503
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   OPENAI_API_KEY      : enables OpenAI integration if present
//!   OPENAI_BASE_URL     : default "https://api.openai.com/v1"
//!   OPENAI_CHAT_MODEL   : default "gpt-4o-mini"
//!   OPENAI_TTS_MODEL    : default "gpt-4o-mini-tts"
//!   OPENAI_TIMEOUT_SECS : upstream request timeout (default 20)
//!   COACH_CONFIG_PATH   : path to TOML config (prompts, answer key, caches, CORS)
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod checkpoints;
mod evaluator;
mod normalizer;
mod fallback;
mod prompt;
mod cache;
mod error;
mod state;
mod protocol;
mod logic;
mod openai;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Shared state: answer key, policies, caches, optional OpenAI client.
  let state = Arc::new(AppState::from_env());

  let app = build_router(state);

  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "drcoli_backend", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  info!(target: "drcoli_backend", "Server stopped");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "drcoli_backend", error = %e, "Failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  info!(target: "drcoli_backend", "Shutdown signal received");
}
