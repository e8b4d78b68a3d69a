//! Request flows behind the HTTP handlers.
//!
//! Coach: validate -> evaluate -> cache lookup -> prompt -> model -> normalize,
//! with a deterministic fallback line whenever the model path yields nothing.
//! Speech: validate -> cache lookup -> synthesize -> cache insert.

use axum::body::Bytes;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Checkpoint, EvaluationResult, Profile};
use crate::error::{AppError, AppResult};
use crate::evaluator::evaluate;
use crate::fallback::{fallback_line, FallbackContext};
use crate::normalizer::normalize;
use crate::openai::UpstreamError;
use crate::prompt::build_coach_prompt;
use crate::protocol::{CoachDebug, CoachIn, CoachOut, ReplySource, TtsIn};
use crate::state::{AppState, CoachCacheKey};

#[instrument(level = "info", skip(state, req), fields(request_id = %Uuid::new_v4(), pause_id = %req.pause_id.trim(), choice_len = req.choice.len()))]
pub async fn coach_reply(state: &AppState, req: CoachIn) -> AppResult<CoachOut> {
  let pause_id = req.pause_id.trim().to_string();
  let choice = req.choice.trim().to_string();
  if pause_id.is_empty() {
    return Err(AppError::invalid("Missing pauseId"));
  }

  let eval = evaluate(&state.checkpoints, &pause_id, &choice, &state.policy)?;
  let checkpoint = state
    .checkpoints
    .get(&pause_id)
    .ok_or_else(|| AppError::Internal(format!("checkpoint {pause_id} vanished after evaluation")))?;
  let profile = state.profile(&req.profile.name, &req.profile.interest);
  info!(target: "coach", %pause_id, outcome = eval.outcome().as_str(), has_name = profile.has_name(), "Answer evaluated");

  let key = CoachCacheKey {
    pause_id: pause_id.clone(),
    answer: state.policy.normalize_answer(&choice),
    has_name: profile.has_name(),
    interest: profile.interest.clone(),
    is_correct: eval.is_correct,
    is_unsure: eval.is_unsure,
  };

  let (reply_text, source) = match state.coach_cache.get(&key).await {
    Some(hit) => {
      debug!(target: "coach", %pause_id, "Coach cache hit");
      (hit, ReplySource::Cache)
    }
    None => {
      let (text, source) = generate_reply(state, checkpoint, &choice, &eval, &profile).await;
      if source == ReplySource::Model {
        state.coach_cache.insert(key, text.clone()).await;
        let entries = state.coach_cache.len().await;
        debug!(target: "coach", entries, "Coach reply cached");
      }
      (text, source)
    }
  };

  Ok(CoachOut {
    reply_text,
    debug: CoachDebug {
      pause_id,
      choice,
      is_correct: eval.is_correct,
      is_unsure: eval.is_unsure,
      outcome: eval.outcome(),
      cached: source == ReplySource::Cache,
      source,
    },
  })
}

/// Model reply when possible, fallback line otherwise. Never fails.
async fn generate_reply(
  state: &AppState,
  checkpoint: &Checkpoint,
  choice: &str,
  eval: &EvaluationResult,
  profile: &Profile,
) -> (String, ReplySource) {
  let opts = state.feedback.options_for(eval.is_correct);
  let ending = state.feedback.closing_phrase.as_str();

  let generated = match &state.openai {
    Some(oa) => {
      let prompt = build_coach_prompt(&state.prompts, checkpoint, choice, eval, profile, ending);
      oa.coach_text(&prompt).await
    }
    None => Err(UpstreamError::NotConfigured),
  };

  match generated.map(|raw| normalize(&raw, &opts)) {
    // A reply that is nothing but the closing phrase lost all of its content.
    Ok(text) if !text.is_empty() && text != ending.trim() => (text, ReplySource::Model),
    Ok(_) => {
      warn!(target: "coach", pause_id = %checkpoint.id, "Model reply empty after cleanup; using fallback line");
      (fallback_for(state, checkpoint, eval, profile), ReplySource::Fallback)
    }
    Err(e) => {
      warn!(target: "coach", pause_id = %checkpoint.id, error = %e, "Coach generation unavailable; using fallback line");
      (fallback_for(state, checkpoint, eval, profile), ReplySource::Fallback)
    }
  }
}

fn fallback_for(state: &AppState, checkpoint: &Checkpoint, eval: &EvaluationResult, profile: &Profile) -> String {
  let ctx = FallbackContext {
    name: &profile.name,
    correct_answer: &checkpoint.correct_answer,
    meaning: &checkpoint.meaning,
    theme_word: &profile.theme_word,
  };
  let line = fallback_line(eval.outcome(), &ctx, &state.feedback.closing_phrase);
  normalize(&line, &state.feedback.options_for(eval.is_correct))
}

/// Result of a speech request: audio plus whether it came from the cache.
pub struct SpeechOut {
  pub audio: Bytes,
  pub cached: bool,
}

#[instrument(level = "info", skip(state, req), fields(text_len = req.text.len()))]
pub async fn synthesize_speech(state: &AppState, req: TtsIn) -> AppResult<SpeechOut> {
  let input = req.text.trim().to_string();
  if input.is_empty() {
    return Err(AppError::invalid("Missing text"));
  }
  if input.chars().count() > state.tts.max_chars {
    return Err(AppError::invalid(format!("Text too long (max {} chars)", state.tts.max_chars)));
  }
  let voice = req
    .voice
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
    .unwrap_or_else(|| state.tts.default_voice.clone());

  let key = (voice.clone(), input.clone());
  if let Some(audio) = state.tts_cache.get(&key).await {
    debug!(target: "tts", %voice, bytes = audio.len(), "TTS cache hit");
    return Ok(SpeechOut { audio, cached: true });
  }

  let oa = state.openai.as_ref().ok_or(AppError::Upstream {
    context: "TTS upstream error",
    source: UpstreamError::NotConfigured,
  })?;
  let audio = oa
    .speech(&input, &voice)
    .await
    .map_err(|source| AppError::Upstream { context: "TTS upstream error", source })?;

  info!(target: "tts", %voice, bytes = audio.len(), "Speech synthesized");
  state.tts_cache.insert(key, audio.clone()).await;
  let entries = state.tts_cache.len().await;
  debug!(target: "tts", entries, "Speech cached");
  Ok(SpeechOut { audio, cached: false })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::CoachConfig;
  use crate::fallback::CLOSING_PHRASE;
  use crate::openai::OpenAI;
  use crate::protocol::ProfileIn;
  use wiremock::matchers::{method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn req(pause_id: &str, choice: &str) -> CoachIn {
    CoachIn { pause_id: pause_id.into(), choice: choice.into(), profile: ProfileIn::default() }
  }

  async fn state_with_reply(server: &MockServer, content: &str) -> AppState {
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "choices": [{"message": {"content": content}}]
      })))
      .mount(server)
      .await;
    let oa = OpenAI::new("k".into(), server.uri(), "m".into(), "t".into(), 5).unwrap();
    AppState::new(CoachConfig::default(), Some(oa))
  }

  #[tokio::test]
  async fn missing_and_unknown_pause_are_invalid_input() {
    let state = AppState::new(CoachConfig::default(), None);
    assert!(matches!(
      coach_reply(&state, req("  ", "안녕")).await,
      Err(AppError::InvalidInput { pause_id: None, .. })
    ));
    match coach_reply(&state, req("p42", "안녕")).await {
      Err(AppError::InvalidInput { message, pause_id }) => {
        assert_eq!(message, "Unknown pauseId");
        assert_eq!(pause_id.as_deref(), Some("p42"));
      }
      other => panic!("unexpected: {other:?}"),
    }
  }

  #[tokio::test]
  async fn no_client_means_fallback_line() {
    let state = AppState::new(CoachConfig::default(), None);
    let out = coach_reply(&state, req("p2", "not sure")).await.unwrap();
    assert_eq!(out.debug.source, ReplySource::Fallback);
    assert!(out.debug.is_unsure);
    assert_eq!(out.reply_text, "That’s okay! The right answer is \"선생님\". Let’s keep going!");
    // Fallback lines are not cached.
    assert_eq!(state.coach_cache.len().await, 0);
  }

  #[tokio::test]
  async fn model_reply_is_normalized_and_cached() {
    let server = MockServer::start().await;
    let state = state_with_reply(&server, "Yes! You said 안녕! Can you say it again?").await;

    let first = coach_reply(&state, req("p3", "안녕!")).await.unwrap();
    assert!(first.debug.is_correct);
    assert_eq!(first.debug.source, ReplySource::Model);
    assert_eq!(first.reply_text, format!("Yes! You said 안녕! {CLOSING_PHRASE}"));

    let second = coach_reply(&state, req("p3", " 안녕 ")).await.unwrap();
    assert_eq!(second.debug.source, ReplySource::Cache);
    assert!(second.debug.cached);
    assert_eq!(second.reply_text, first.reply_text);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
  }

  #[tokio::test]
  async fn upstream_failure_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/chat/completions"))
      .respond_with(ResponseTemplate::new(503))
      .mount(&server)
      .await;
    let oa = OpenAI::new("k".into(), server.uri(), "m".into(), "t".into(), 5).unwrap();
    let state = AppState::new(CoachConfig::default(), Some(oa));

    let mut r = req("p1", "영어");
    r.profile = ProfileIn { name: "Jun".into(), interest: "dinos".into() };
    let out = coach_reply(&state, r).await.unwrap();
    assert_eq!(out.debug.source, ReplySource::Fallback);
    assert_eq!(out.reply_text, "Jun, Nice try! The right answer is \"한국어\". Dino power! Let’s keep going!");
  }

  #[tokio::test]
  async fn question_only_reply_on_correct_falls_back() {
    let server = MockServer::start().await;
    let state = state_with_reply(&server, "Want to try another one?").await;
    let out = coach_reply(&state, req("p2", "선생님")).await.unwrap();
    assert_eq!(out.debug.source, ReplySource::Fallback);
    assert!(out.reply_text.starts_with("You got it!"));
    assert!(!out.reply_text.contains('?'));
  }

  #[tokio::test]
  async fn speech_validates_input() {
    let state = AppState::new(CoachConfig::default(), None);
    let empty = synthesize_speech(&state, TtsIn { text: "   ".into(), voice: None }).await;
    assert!(matches!(empty, Err(AppError::InvalidInput { .. })));

    let long = "가".repeat(801);
    match synthesize_speech(&state, TtsIn { text: long, voice: None }).await {
      Err(AppError::InvalidInput { message, .. }) => assert_eq!(message, "Text too long (max 800 chars)"),
      _ => panic!("expected InvalidInput"),
    }

    let unconfigured = synthesize_speech(&state, TtsIn { text: "hi".into(), voice: None }).await;
    assert!(matches!(unconfigured, Err(AppError::Upstream { source: UpstreamError::NotConfigured, .. })));
  }

  #[tokio::test]
  async fn speech_is_cached_per_voice_and_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
      .and(path("/audio/speech"))
      .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
      .mount(&server)
      .await;
    let oa = OpenAI::new("k".into(), server.uri(), "m".into(), "t".into(), 5).unwrap();
    let state = AppState::new(CoachConfig::default(), Some(oa));

    let a = synthesize_speech(&state, TtsIn { text: "안녕".into(), voice: None }).await.unwrap();
    assert!(!a.cached);
    let b = synthesize_speech(&state, TtsIn { text: " 안녕 ".into(), voice: Some("".into()) }).await.unwrap();
    assert!(b.cached);
    assert_eq!(b.audio, a.audio);
    let c = synthesize_speech(&state, TtsIn { text: "안녕".into(), voice: Some("alloy".into()) }).await.unwrap();
    assert!(!c.cached);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
  }
}
