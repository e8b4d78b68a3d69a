//! Loading coach configuration (prompts, matching policy, feedback rules,
//! cache sizes, CORS, optional checkpoint table) from TOML.
//!
//! Every section is optional; missing fields take the built-in defaults.

use std::collections::HashMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use crate::cache::{COACH_CACHE_MAX, TTS_CACHE_MAX};
use crate::checkpoints::{CheckpointTable, TableError};
use crate::domain::Checkpoint;
use crate::evaluator::{EvalPolicy, DEFAULT_HEDGE_PHRASES};
use crate::fallback::CLOSING_PHRASE;
use crate::normalizer::NormalizeOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to read {path}: {source}")]
  Io { path: String, source: std::io::Error },
  #[error("invalid TOML: {0}")]
  Parse(#[from] toml::de::Error),
  #[error("invalid checkpoint table: {0}")]
  Checkpoints(#[from] TableError),
  #[error("invalid hedge phrase list: {0}")]
  Hedges(#[from] regex::Error),
}

#[derive(Clone, Debug, Deserialize)]
pub struct CoachConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub evaluation: EvaluationCfg,
  #[serde(default)]
  pub feedback: FeedbackCfg,
  #[serde(default)]
  pub cache: CacheCfg,
  #[serde(default)]
  pub tts: TtsCfg,
  #[serde(default)]
  pub cors: CorsCfg,
  /// interest key -> theme word ("dinos" -> "Dino power!")
  #[serde(default = "default_themes")]
  pub themes: HashMap<String, String>,
  /// Replaces the built-in answer key when non-empty.
  #[serde(default)]
  pub checkpoints: Vec<Checkpoint>,
}

impl Default for CoachConfig {
  fn default() -> Self {
    Self {
      prompts: Prompts::default(),
      evaluation: EvaluationCfg::default(),
      feedback: FeedbackCfg::default(),
      cache: CacheCfg::default(),
      tts: TtsCfg::default(),
      cors: CorsCfg::default(),
      themes: default_themes(),
      checkpoints: Vec::new(),
    }
  }
}

fn default_themes() -> HashMap<String, String> {
  HashMap::from([
    ("puppies".to_string(), "Puppy power!".to_string()),
    ("dinos".to_string(), "Dino power!".to_string()),
    ("planes".to_string(), "Pilot power!".to_string()),
  ])
}

/// Prompts sent to the chat model. Placeholders are `{name}` style, see
/// `prompt::build_coach_prompt` for the full list.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  pub user_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "You are Dr. Coli, a friendly broccoli teacher for kids 6–8. \
               Respond in warm, simple English. 1–2 sentences (max 3). \
               Never mention AI or tech. Do not repeat yourself. \
               End with exactly: \"{ending}\""
        .into(),
      user_template: "Pause {pause_id}. Goal: {label}. Correct: {correct}. \
                      Child tapped: \"{choice}\". isCorrect={is_correct}. isUnsure={is_unsure}. \
                      {name_line}{theme_line}\
                      Rules: If correct, praise + confirm. If unsure, encourage + give correct phrase. \
                      If wrong, say \"Nice try!\" + give correct phrase + one tiny hint. \
                      If you use the name, start with \"{name_prefix}\" (don’t overuse). \
                      {theme_rule}Return plain text only."
        .into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EvaluationCfg {
  pub collapse_whitespace: bool,
  pub strip_punctuation: bool,
  pub detect_hedges: bool,
  pub hedge_phrases: Vec<String>,
}

impl Default for EvaluationCfg {
  fn default() -> Self {
    Self {
      collapse_whitespace: true,
      strip_punctuation: true,
      detect_hedges: true,
      hedge_phrases: DEFAULT_HEDGE_PHRASES.iter().map(|s| s.to_string()).collect(),
    }
  }
}

impl EvaluationCfg {
  pub fn policy(&self) -> Result<EvalPolicy, ConfigError> {
    EvalPolicy::new(
      self.collapse_whitespace,
      self.strip_punctuation,
      self.detect_hedges,
      &self.hedge_phrases,
    )
    .map_err(ConfigError::from)
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FeedbackCfg {
  pub closing_phrase: String,
  pub max_length: usize,
  pub no_question_on_correct: bool,
}

impl Default for FeedbackCfg {
  fn default() -> Self {
    Self {
      closing_phrase: CLOSING_PHRASE.into(),
      max_length: 220,
      no_question_on_correct: true,
    }
  }
}

impl FeedbackCfg {
  pub fn options_for(&self, is_correct: bool) -> NormalizeOptions {
    NormalizeOptions {
      no_question: is_correct && self.no_question_on_correct,
      required_ending: Some(self.closing_phrase.clone()),
      max_length: (self.max_length > 0).then_some(self.max_length),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CacheCfg {
  pub coach_capacity: usize,
  pub tts_capacity: usize,
}

impl Default for CacheCfg {
  fn default() -> Self {
    Self { coach_capacity: COACH_CACHE_MAX, tts_capacity: TTS_CACHE_MAX }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TtsCfg {
  pub default_voice: String,
  pub max_chars: usize,
}

impl Default for TtsCfg {
  fn default() -> Self {
    Self { default_voice: "shimmer".into(), max_chars: 800 }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CorsCfg {
  pub allowed_origins: Vec<String>,
}

impl Default for CorsCfg {
  fn default() -> Self {
    Self {
      allowed_origins: vec!["https://ottiya.com".into(), "https://www.ottiya.com".into()],
    }
  }
}

impl CoachConfig {
  pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
    let cfg: CoachConfig = toml::from_str(s)?;
    // Surface table and regex problems at load time, not on the first request.
    cfg.checkpoint_table()?;
    cfg.evaluation.policy()?;
    Ok(cfg)
  }

  pub fn load_from_path(path: &str) -> Result<Self, ConfigError> {
    let s = std::fs::read_to_string(path)
      .map_err(|source| ConfigError::Io { path: path.to_string(), source })?;
    Self::from_toml_str(&s)
  }

  pub fn checkpoint_table(&self) -> Result<CheckpointTable, TableError> {
    if self.checkpoints.is_empty() {
      Ok(CheckpointTable::builtin())
    } else {
      CheckpointTable::from_entries(self.checkpoints.clone())
    }
  }

  pub fn theme_word(&self, interest: &str) -> String {
    self.themes.get(interest).cloned().unwrap_or_default()
  }
}

/// Load `CoachConfig` from COACH_CONFIG_PATH. Falls back to defaults (with an
/// error log) when the file is missing or invalid.
pub fn load_coach_config_from_env() -> CoachConfig {
  let Ok(path) = std::env::var("COACH_CONFIG_PATH") else {
    info!(target: "drcoli_backend", "COACH_CONFIG_PATH not set; using built-in configuration");
    return CoachConfig::default();
  };
  match CoachConfig::load_from_path(&path) {
    Ok(cfg) => {
      info!(target: "drcoli_backend", %path, checkpoints = cfg.checkpoints.len(), "Loaded coach config (TOML)");
      cfg
    }
    Err(e) => {
      error!(target: "drcoli_backend", %path, error = %e, "Failed to load coach config; using defaults");
      CoachConfig::default()
    }
  }
}
