//! Application error type and its HTTP mapping.
//!
//! - `InvalidInput`: caller problem, 400, no retry.
//! - `Upstream`: the speech/generation service failed, 502 (503 when unconfigured).
//! - `Internal`: anything else (including handler panics), generic 500; details only go to the log.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use thiserror::Error;

use crate::evaluator::EvalError;
use crate::openai::UpstreamError;
use crate::util::trunc_chars;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("{message}")]
  InvalidInput { message: String, pause_id: Option<String> },

  #[error("{context}: {source}")]
  Upstream { context: &'static str, source: UpstreamError },

  #[error("internal error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn invalid(message: impl Into<String>) -> Self {
    AppError::InvalidInput { message: message.into(), pause_id: None }
  }
}

impl From<EvalError> for AppError {
  fn from(err: EvalError) -> Self {
    match err {
      EvalError::UnknownCheckpoint(id) => AppError::InvalidInput {
        message: "Unknown pauseId".into(),
        pause_id: Some(id),
      },
    }
  }
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    match self {
      AppError::InvalidInput { message, pause_id } => {
        let body = match pause_id {
          Some(id) => json!({ "error": message, "pauseId": id }),
          None => json!({ "error": message }),
        };
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
      }
      AppError::Upstream { context, source } => {
        tracing::error!(target: "drcoli_backend", %context, error = %source, "Upstream failure");
        let status = match source {
          UpstreamError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
          _ => StatusCode::BAD_GATEWAY,
        };
        let mut body = json!({
          "error": context,
          "details": trunc_chars(&source.to_string(), 800),
        });
        if let Some(upstream_status) = source.status() {
          body["status"] = json!(upstream_status);
        }
        (status, Json(body)).into_response()
      }
      AppError::Internal(msg) => {
        tracing::error!(target: "drcoli_backend", error = %msg, "Internal error");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Server crashed" }))).into_response()
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_codes_follow_taxonomy() {
    assert_eq!(AppError::invalid("Missing text").into_response().status(), StatusCode::BAD_REQUEST);
    assert_eq!(
      AppError::from(EvalError::UnknownCheckpoint("p9".into())).into_response().status(),
      StatusCode::BAD_REQUEST
    );
    let upstream = AppError::Upstream {
      context: "TTS upstream error",
      source: UpstreamError::Api { status: 500, message: "boom".into() },
    };
    assert_eq!(upstream.into_response().status(), StatusCode::BAD_GATEWAY);
    let unconfigured = AppError::Upstream { context: "TTS upstream error", source: UpstreamError::NotConfigured };
    assert_eq!(unconfigured.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(AppError::Internal("x".into()).into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
