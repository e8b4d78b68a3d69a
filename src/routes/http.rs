//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{
  body::Bytes,
  extract::State,
  http::{
    header::{HeaderName, CACHE_CONTROL, CONTENT_TYPE},
    StatusCode,
  },
  response::IntoResponse,
  Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::logic::{coach_reply, synthesize_speech};
use crate::protocol::*;
use crate::state::AppState;

/// Parse a JSON body. An empty body counts as `{}` so the handler can report
/// the missing field by name.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
  if body.iter().all(u8::is_ascii_whitespace) {
    return Ok(T::default());
  }
  serde_json::from_slice(body).map_err(|_| AppError::invalid("Invalid JSON body"))
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, body), fields(body_len = body.len()))]
pub async fn http_post_coach(
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> AppResult<Json<CoachOut>> {
  let req: CoachIn = parse_body(&body)?;
  let out = coach_reply(&state, req).await?;
  info!(
    target: "coach",
    pause_id = %out.debug.pause_id,
    outcome = out.debug.outcome.as_str(),
    source = ?out.debug.source,
    reply_len = out.reply_text.len(),
    "HTTP coach reply served"
  );
  Ok(Json(out))
}

#[instrument(level = "info", skip(state, body), fields(body_len = body.len()))]
pub async fn http_post_tts(
  State(state): State<Arc<AppState>>,
  body: Bytes,
) -> AppResult<impl IntoResponse> {
  let req: TtsIn = parse_body(&body)?;
  let out = synthesize_speech(&state, req).await?;
  let cache = if out.cached { "HIT" } else { "MISS" };
  info!(target: "tts", bytes = out.audio.len(), %cache, "HTTP speech served");
  Ok((
    [
      (CONTENT_TYPE, "audio/mpeg"),
      (CACHE_CONTROL, "no-store"),
      (HeaderName::from_static("x-tts-cache"), cache),
    ],
    out.audio,
  ))
}

/// Any method other than POST (and the CORS-handled OPTIONS) on the API routes.
pub async fn http_method_not_allowed() -> impl IntoResponse {
  (StatusCode::METHOD_NOT_ALLOWED, Json(json!({ "error": "Use POST" })))
}
