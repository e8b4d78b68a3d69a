//! Tracing setup.
//!
//! - LOG_LEVEL is an `EnvFilter` directive string ("debug", or e.g.
//!   "info,coach=debug,tower_http=warn"). Invalid or missing values fall back
//!   to `DEFAULT_FILTER`.
//! - LOG_FORMAT=json switches to one JSON object per line; anything else is
//!   the human readable format.
//!
//! Log targets: "coach" and "tts" for request flows, "drcoli_backend" for
//! startup, config and upstream failures. The TraceLayer adds per-request spans.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,coach=debug,tts=debug,drcoli_backend=debug,tower_http=info,axum=info";

fn env_filter() -> EnvFilter {
  EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn init_tracing() {
  let builder = tracing_subscriber::fmt()
    .with_env_filter(env_filter())
    .with_target(true)
    .with_file(true)
    .with_line_number(true);

  // json() changes the builder type, so each arm finishes on its own.
  if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
    builder.json().init();
  } else {
    builder.init();
  }
}
