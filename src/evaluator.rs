//! Deterministic answer scoring.
//!
//! An answer is `unsure` when it is empty after normalization or contains a
//! hedge phrase, `correct` when it equals the checkpoint's answer after the same
//! normalization, and `wrong` otherwise. No partial credit.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::checkpoints::CheckpointTable;
use crate::domain::EvaluationResult;

pub const DEFAULT_HEDGE_PHRASES: &[&str] =
  &["not sure", "don't know", "dont know", "i forgot", "forgot", "tried"];

static PUNCTUATION: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\p{P}+").expect("static punctuation regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EvalError {
  #[error("unknown checkpoint: {0}")]
  UnknownCheckpoint(String),
}

/// Matching policy. Punctuation stripping and hedge detection are independent
/// switches; speech-to-text input usually wants both.
#[derive(Clone, Debug)]
pub struct EvalPolicy {
  pub collapse_whitespace: bool,
  pub strip_punctuation: bool,
  pub detect_hedges: bool,
  hedges: Option<Regex>,
}

impl EvalPolicy {
  pub fn new(
    collapse_whitespace: bool,
    strip_punctuation: bool,
    detect_hedges: bool,
    hedge_phrases: &[String],
  ) -> Result<Self, regex::Error> {
    let phrases: Vec<String> = hedge_phrases
      .iter()
      .map(|p| p.trim())
      .filter(|p| !p.is_empty())
      .map(regex::escape)
      .collect();
    let hedges = if phrases.is_empty() {
      None
    } else {
      Some(RegexBuilder::new(&phrases.join("|")).case_insensitive(true).build()?)
    };
    Ok(Self { collapse_whitespace, strip_punctuation, detect_hedges, hedges })
  }

  pub fn is_hedge(&self, answer: &str) -> bool {
    if !self.detect_hedges {
      return false;
    }
    let flat = collapse_ws(answer);
    self.hedges.as_ref().is_some_and(|re| re.is_match(&flat))
  }

  /// Canonical form used on both sides of the equality check.
  pub fn normalize_answer(&self, raw: &str) -> String {
    let mut s = raw.trim().to_string();
    if self.strip_punctuation {
      s = PUNCTUATION.replace_all(&s, "").into_owned();
    }
    if self.collapse_whitespace {
      s = collapse_ws(&s);
    }
    s.trim().to_string()
  }
}

impl Default for EvalPolicy {
  fn default() -> Self {
    let hedges = RegexBuilder::new(
      &DEFAULT_HEDGE_PHRASES.iter().map(|p| regex::escape(p)).collect::<Vec<_>>().join("|"),
    )
    .case_insensitive(true)
    .build()
    .ok();
    Self { collapse_whitespace: true, strip_punctuation: true, detect_hedges: true, hedges }
  }
}

fn collapse_ws(s: &str) -> String {
  s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn evaluate(
  table: &CheckpointTable,
  checkpoint_id: &str,
  raw_answer: &str,
  policy: &EvalPolicy,
) -> Result<EvaluationResult, EvalError> {
  let checkpoint = table
    .get(checkpoint_id)
    .ok_or_else(|| EvalError::UnknownCheckpoint(checkpoint_id.to_string()))?;

  let answer = policy.normalize_answer(raw_answer);
  let is_unsure = answer.is_empty() || policy.is_hedge(raw_answer);
  let is_correct = !is_unsure && answer == policy.normalize_answer(&checkpoint.correct_answer);

  Ok(EvaluationResult { is_correct, is_unsure })
}
