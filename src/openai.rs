//! Minimal OpenAI client for our two use-cases: the coach reply
//! (chat.completions, plain text) and speech synthesis (audio.speech, mp3 bytes).
//!
//! Calls are instrumented and log model names, latencies, and response sizes (not contents).
//!
//! NOTE: We never log the API key and we keep payload truncations short to avoid PII leaks.

use std::time::{Duration, Instant};

use axum::body::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument};

use crate::prompt::PromptPair;
use crate::util::trunc_chars;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 20;
const COACH_MAX_TOKENS: u32 = 70;
const COACH_TEMPERATURE: f32 = 0.4;
const ERROR_DETAIL_MAX: usize = 800;

#[derive(Debug, Error)]
pub enum UpstreamError {
  #[error("upstream client not configured (OPENAI_API_KEY missing)")]
  NotConfigured,
  #[error("request timed out after {0}s")]
  Timeout(u64),
  #[error("network error: {0}")]
  Network(String),
  #[error("API error (HTTP {status}): {message}")]
  Api { status: u16, message: String },
  #[error("failed to decode response: {0}")]
  Decode(String),
  #[error("empty response")]
  Empty,
}

impl UpstreamError {
  pub fn status(&self) -> Option<u16> {
    match self {
      UpstreamError::Api { status, .. } => Some(*status),
      _ => None,
    }
  }
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub chat_model: String,
  pub tts_model: String,
  timeout_secs: u64,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let chat_model = std::env::var("OPENAI_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let tts_model = std::env::var("OPENAI_TTS_MODEL").unwrap_or_else(|_| "gpt-4o-mini-tts".into());
    let timeout_secs = std::env::var("OPENAI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(DEFAULT_TIMEOUT_SECS);

    match Self::new(api_key, base_url, chat_model, tts_model, timeout_secs) {
      Ok(oa) => Some(oa),
      Err(e) => {
        error!(target: "drcoli_backend", error = %e, "Failed to build HTTP client; upstream disabled");
        None
      }
    }
  }

  pub fn new(
    api_key: String,
    base_url: String,
    chat_model: String,
    tts_model: String,
    timeout_secs: u64,
  ) -> Result<Self, UpstreamError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .build()
      .map_err(|e| UpstreamError::Network(e.to_string()))?;
    let base_url = base_url.trim_end_matches('/').to_string();
    Ok(Self { client, api_key, base_url, chat_model, tts_model, timeout_secs })
  }

  fn send_error(&self, e: reqwest::Error) -> UpstreamError {
    if e.is_timeout() {
      UpstreamError::Timeout(self.timeout_secs)
    } else {
      UpstreamError::Network(e.to_string())
    }
  }

  async fn check_status(res: reqwest::Response) -> Result<reqwest::Response, UpstreamError> {
    if res.status().is_success() {
      return Ok(res);
    }
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    let message = extract_openai_error(&body).unwrap_or(body);
    Err(UpstreamError::Api { status, message: trunc_chars(&message, ERROR_DETAIL_MAX) })
  }

  /// Plain-text chat completion for one coach reply. Returns the raw text;
  /// cleanup is the caller's job.
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.chat_model))]
  pub async fn coach_text(&self, prompt: &PromptPair) -> Result<String, UpstreamError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.chat_model.clone(),
      messages: vec![
        ChatMessageReq { role: "system".into(), content: prompt.system.clone() },
        ChatMessageReq { role: "user".into(), content: prompt.user.clone() },
      ],
      temperature: COACH_TEMPERATURE,
      max_tokens: Some(COACH_MAX_TOKENS),
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "drcoli-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| self.send_error(e))?;
    let res = Self::check_status(res).await?;

    let body: ChatCompletionResponse = res.json().await.map_err(|e| UpstreamError::Decode(e.to_string()))?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .map(MessageContent::into_text)
      .unwrap_or_default()
      .trim()
      .to_string();

    info!(elapsed = ?start.elapsed(), text_len = text.len(), "Coach text received");
    if text.is_empty() {
      return Err(UpstreamError::Empty);
    }
    Ok(text)
  }

  /// Speech synthesis. Returns the mp3 bytes as sent by the API.
  #[instrument(level = "info", skip(self, input, voice), fields(model = %self.tts_model, %voice, input_len = input.len()))]
  pub async fn speech(&self, input: &str, voice: &str) -> Result<Bytes, UpstreamError> {
    let url = format!("{}/audio/speech", self.base_url);
    let req = SpeechRequest {
      model: &self.tts_model,
      voice,
      input,
      response_format: "mp3",
    };

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "drcoli-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await.map_err(|e| self.send_error(e))?;
    let res = Self::check_status(res).await?;

    let audio = res.bytes().await.map_err(|e| UpstreamError::Decode(e.to_string()))?;
    info!(elapsed = ?start.elapsed(), bytes = audio.len(), "Speech audio received");
    if audio.is_empty() {
      return Err(UpstreamError::Empty);
    }
    Ok(audio)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  #[serde(default)] choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { #[serde(default)] content: Option<MessageContent> }

/// Content is either a plain string or a list of typed parts.
#[derive(Deserialize)]
#[serde(untagged)]
enum MessageContent {
  Text(String),
  Parts(Vec<ContentPart>),
}
#[derive(Deserialize)]
struct ContentPart { #[serde(default)] text: Option<String> }

impl MessageContent {
  fn into_text(self) -> String {
    match self {
      MessageContent::Text(s) => s,
      MessageContent::Parts(parts) => parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect::<Vec<_>>()
        .join("\n"),
    }
  }
}

#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

#[derive(Serialize)]
struct SpeechRequest<'a> {
  model: &'a str,
  voice: &'a str,
  input: &'a str,
  response_format: &'a str,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}
