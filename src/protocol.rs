//! Public protocol structs for the HTTP endpoints (serde ready).
//! Field names are camelCase to match the existing web front-end.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::Outcome;

/// `null` on the wire reads the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Deserialize<'de> + Default,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Body of `POST /api/coach`. Every field is optional on the wire; the handler
/// reports what is missing.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachIn {
  #[serde(default, deserialize_with = "null_as_default")]
  pub pause_id: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub choice: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub profile: ProfileIn,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileIn {
  #[serde(default, deserialize_with = "null_as_default")]
  pub name: String,
  #[serde(default, deserialize_with = "null_as_default")]
  pub interest: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachOut {
  pub reply_text: String,
  pub debug: CoachDebug,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachDebug {
  pub pause_id: String,
  pub choice: String,
  pub is_correct: bool,
  pub is_unsure: bool,
  pub outcome: Outcome,
  pub cached: bool,
  pub source: ReplySource,
}

/// Where the reply text came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
  Model,
  Fallback,
  Cache,
}

/// Body of `POST /api/tts`.
#[derive(Debug, Default, Deserialize)]
pub struct TtsIn {
  #[serde(default, deserialize_with = "null_as_default")]
  pub text: String,
  #[serde(default)]
  pub voice: Option<String>,
}

#[derive(Serialize)]
pub struct HealthOut {
  pub ok: bool,
}
