//! Router assembly: HTTP endpoints, CORS allow-list, panic catching, and HTTP tracing.

use std::{any::Any, sync::Arc};

use axum::{
  http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
  },
  response::{IntoResponse, Response},
  routing::{get, post},
  Router,
};
use tower_http::{
  catch_panic::CatchPanicLayer,
  cors::{AllowOrigin, CorsLayer},
  trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{warn, Level};

use crate::error::AppError;
use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - `POST /api/coach`, `POST /api/tts` (other methods -> 405)
/// - `GET /api/v1/health`
/// - CORS restricted to the configured origins; the CORS layer answers every
///   OPTIONS request itself, so preflights never reach the handlers
/// - panics turned into a JSON 500
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
  let cors = cors_layer(&state.allowed_origins);

  Router::new()
    .route("/api/v1/health", get(http::http_health))
    .route(
      "/api/coach",
      post(http::http_post_coach).fallback(http::http_method_not_allowed),
    )
    .route(
      "/api/tts",
      post(http::http_post_tts).fallback(http::http_method_not_allowed),
    )
    .with_state(state)
    .layer(CatchPanicLayer::custom(handle_panic))
    .layer(cors)
    .layer(
      TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO)),
    )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
  let base = CorsLayer::new()
    .allow_methods([Method::POST, Method::OPTIONS])
    .allow_headers([CONTENT_TYPE, AUTHORIZATION]);
  if origins.iter().any(|o| o.trim() == "*") {
    return base.allow_origin(AllowOrigin::any());
  }

  let allowed: Vec<HeaderValue> = origins
    .iter()
    .filter_map(|o| match HeaderValue::from_str(o.trim()) {
      Ok(v) => Some(v),
      Err(e) => {
        warn!(target: "drcoli_backend", origin = %o, error = %e, "Ignoring invalid CORS origin");
        None
      }
    })
    .collect();

  base.allow_origin(AllowOrigin::list(allowed))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
  let detail = err
    .downcast_ref::<String>()
    .cloned()
    .or_else(|| err.downcast_ref::<&str>().map(|s| s.to_string()))
    .unwrap_or_else(|| "unknown panic".to_string());
  AppError::Internal(format!("handler panicked: {detail}")).into_response()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::CoachConfig;
  use crate::openai::OpenAI;
  use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
  };
  use tower::ServiceExt;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn router(openai: Option<OpenAI>) -> Router {
    build_router(Arc::new(AppState::new(CoachConfig::default(), openai)))
  }

  fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
      .method("POST")
      .uri(uri)
      .header("content-type", "application/json")
      .body(Body::from(body.to_string()))
      .unwrap()
  }

  async fn json_body(res: Response) -> serde_json::Value {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  #[tokio::test]
  async fn health_is_ok() {
    let res = router(None)
      .oneshot(Request::builder().uri("/api/v1/health").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, serde_json::json!({ "ok": true }));
  }

  #[tokio::test]
  async fn coach_rejects_bad_requests() {
    let res = router(None).oneshot(post_json("/api/coach", "{not json")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["error"], "Invalid JSON body");

    let res = router(None).oneshot(post_json("/api/coach", "{}")).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["error"], "Missing pauseId");

    let res = router(None).oneshot(post_json("/api/coach", r#"{"pauseId":null}"#)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["error"], "Missing pauseId");

    let res = router(None)
      .oneshot(post_json("/api/coach", r#"{"pauseId":"p99","choice":"안녕"}"#))
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body = json_body(res).await;
    assert_eq!(body["error"], "Unknown pauseId");
    assert_eq!(body["pauseId"], "p99");
  }

  #[tokio::test]
  async fn coach_answers_with_fallback_without_upstream() {
    let res = router(None)
      .oneshot(post_json(
        "/api/coach",
        r#"{"pauseId":"p3","choice":"안녕","profile":{"name":"Mina","interest":"puppies"}}"#,
      ))
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(
      body["replyText"],
      "Mina, You got it! \"안녕\" means \"hello (to friends)\". Puppy power! Let’s keep going!"
    );
    assert_eq!(body["debug"]["isCorrect"], true);
    assert_eq!(body["debug"]["isUnsure"], false);
    assert_eq!(body["debug"]["outcome"], "correct");
    assert_eq!(body["debug"]["source"], "fallback");
    assert_eq!(body["debug"]["cached"], false);
  }

  #[tokio::test]
  async fn only_post_is_allowed() {
    let res = router(None)
      .oneshot(Request::builder().method("GET").uri("/api/coach").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(json_body(res).await["error"], "Use POST");

    let res = router(None)
      .oneshot(Request::builder().method("OPTIONS").uri("/api/tts").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert!(res.status().is_success());
  }

  #[tokio::test]
  async fn cors_reflects_allowed_origin_only() {
    let preflight = |origin: &str| {
      Request::builder()
        .method("OPTIONS")
        .uri("/api/coach")
        .header("origin", origin)
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap()
    };

    let res = router(None).oneshot(preflight("https://ottiya.com")).await.unwrap();
    assert_eq!(res.headers()["access-control-allow-origin"], "https://ottiya.com");

    let res = router(None).oneshot(preflight("https://evil.example")).await.unwrap();
    assert!(res.headers().get("access-control-allow-origin").is_none());
  }

  #[tokio::test]
  async fn wildcard_origin_allows_any() {
    let mut cfg = CoachConfig::default();
    cfg.cors.allowed_origins = vec!["*".into()];
    let app = build_router(Arc::new(AppState::new(cfg, None)));
    let res = app
      .oneshot(
        Request::builder()
          .method("OPTIONS")
          .uri("/api/tts")
          .header("origin", "http://localhost:5173")
          .header("access-control-request-method", "POST")
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(res.headers()["access-control-allow-origin"], "*");
  }

  #[tokio::test]
  async fn tts_streams_audio_and_caches() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/audio/speech"))
      .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0x49u8, 0x44, 0x33]))
      .expect(1)
      .mount(&server)
      .await;
    let oa = OpenAI::new("k".into(), server.uri(), "m".into(), "t".into(), 5).unwrap();
    let app = router(Some(oa));

    let res = app.clone().oneshot(post_json("/api/tts", r#"{"text":"안녕하세요"}"#)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "audio/mpeg");
    assert_eq!(res.headers()["cache-control"], "no-store");
    assert_eq!(res.headers()["x-tts-cache"], "MISS");
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.as_ref(), b"ID3");

    let res = app.oneshot(post_json("/api/tts", r#"{"text":"안녕하세요"}"#)).await.unwrap();
    assert_eq!(res.headers()["x-tts-cache"], "HIT");
  }

  #[tokio::test]
  async fn tts_upstream_error_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/audio/speech"))
      .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
        "error": {"message": "Invalid voice"}
      })))
      .mount(&server)
      .await;
    let oa = OpenAI::new("k".into(), server.uri(), "m".into(), "t".into(), 5).unwrap();

    let res = router(Some(oa)).oneshot(post_json("/api/tts", r#"{"text":"hi","voice":"nope"}"#)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(res).await;
    assert_eq!(body["error"], "TTS upstream error");
    assert_eq!(body["status"], 400);
    assert!(body["details"].as_str().unwrap().contains("Invalid voice"));
  }

  #[tokio::test]
  async fn tts_without_upstream_is_unavailable() {
    let res = router(None).oneshot(post_json("/api/tts", r#"{"text":"hi"}"#)).await.unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let res = router(None).oneshot(post_json("/api/tts", r#"{"text":""}"#)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["error"], "Missing text");
  }

  #[tokio::test]
  async fn panics_become_500() {
    async fn boom() -> &'static str {
      panic!("kaboom")
    }
    let app: Router = Router::new()
      .route("/boom", get(boom))
      .layer(CatchPanicLayer::custom(handle_panic));
    let res = app
      .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(res).await["error"], "Server crashed");
  }
}
