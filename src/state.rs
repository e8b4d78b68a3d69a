//! Application state: the answer key, matching/feedback policy, prompts, the
//! optional OpenAI client, and the two bounded response caches.
//!
//! Built once at startup and shared with handlers as `Arc<AppState>`.
//! The caches live here rather than in globals so each state (and each test)
//! gets its own.

use axum::body::Bytes;
use tracing::{error, info, instrument};

use crate::cache::BoundedCache;
use crate::checkpoints::CheckpointTable;
use crate::config::{CoachConfig, FeedbackCfg, Prompts, TtsCfg};
use crate::domain::Profile;
use crate::evaluator::EvalPolicy;
use crate::openai::OpenAI;

/// Fingerprint of a coach request. Two requests with the same key get the same reply.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CoachCacheKey {
  pub pause_id: String,
  pub answer: String,
  pub has_name: bool,
  pub interest: String,
  pub is_correct: bool,
  pub is_unsure: bool,
}

/// Speech cache key: (voice, text).
pub type TtsCacheKey = (String, String);

pub struct AppState {
  pub checkpoints: CheckpointTable,
  pub policy: EvalPolicy,
  pub feedback: FeedbackCfg,
  pub prompts: Prompts,
  pub tts: TtsCfg,
  pub allowed_origins: Vec<String>,
  pub openai: Option<OpenAI>,
  pub coach_cache: BoundedCache<CoachCacheKey, String>,
  pub tts_cache: BoundedCache<TtsCacheKey, Bytes>,
  config: CoachConfig,
}

impl AppState {
  /// Build state from env: load config, validate the answer key, init OpenAI.
  #[instrument(level = "info", skip_all)]
  pub fn from_env() -> Self {
    let cfg = crate::config::load_coach_config_from_env();

    // Build optional OpenAI client (if API key present).
    let openai = OpenAI::from_env();
    if let Some(oa) = &openai {
      info!(target: "drcoli_backend", base_url = %oa.base_url, chat_model = %oa.chat_model, tts_model = %oa.tts_model, "OpenAI enabled.");
    } else {
      info!(target: "drcoli_backend", "OpenAI disabled (no OPENAI_API_KEY). Coach uses fallback lines; TTS unavailable.");
    }

    Self::new(cfg, openai)
  }

  /// Build state from an already loaded config. Invalid parts of the config are
  /// logged and replaced by defaults so the service always starts.
  pub fn new(cfg: CoachConfig, openai: Option<OpenAI>) -> Self {
    let checkpoints = cfg.checkpoint_table().unwrap_or_else(|e| {
      error!(target: "drcoli_backend", error = %e, "Invalid checkpoint table; using built-in answer key");
      CheckpointTable::builtin()
    });
    let policy = cfg.evaluation.policy().unwrap_or_else(|e| {
      error!(target: "drcoli_backend", error = %e, "Invalid evaluation policy; using defaults");
      EvalPolicy::default()
    });
    let coach_cache = BoundedCache::new(cfg.cache.coach_capacity);
    let tts_cache = BoundedCache::new(cfg.cache.tts_capacity);
    info!(
      target: "coach",
      count = checkpoints.len(),
      checkpoints = ?checkpoints.ids().collect::<Vec<_>>(),
      strip_punctuation = policy.strip_punctuation,
      detect_hedges = policy.detect_hedges,
      coach_cache = coach_cache.capacity(),
      tts_cache = tts_cache.capacity(),
      "Startup answer key"
    );

    Self {
      checkpoints,
      policy,
      feedback: cfg.feedback.clone(),
      prompts: cfg.prompts.clone(),
      tts: cfg.tts.clone(),
      allowed_origins: cfg.cors.allowed_origins.clone(),
      openai,
      coach_cache,
      tts_cache,
      config: cfg,
    }
  }

  /// Trimmed profile with the interest resolved to its theme word.
  pub fn profile(&self, name: &str, interest: &str) -> Profile {
    let interest = interest.trim().to_string();
    Profile {
      name: name.trim().to_string(),
      theme_word: self.config.theme_word(&interest),
      interest,
    }
  }
}
