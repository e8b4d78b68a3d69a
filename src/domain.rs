//! Domain models: lesson checkpoints, evaluation outcome, and the learner profile.

use serde::{Deserialize, Serialize};

/// One fixed point in the lesson flow ("pause") with a single expected answer.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
  pub id: String,
  /// Expected answer, compared after normalization.
  pub correct_answer: String,
  /// Short description of the task, fed to the prompt ("say 'teacher' in Korean").
  pub prompt_label: String,
  /// English gloss of the answer, used by the "correct" fallback line.
  #[serde(default)]
  pub meaning: String,
}

/// Deterministic scoring of one answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvaluationResult {
  pub is_correct: bool,
  pub is_unsure: bool,
}

impl EvaluationResult {
  pub fn outcome(&self) -> Outcome {
    if self.is_correct {
      Outcome::Correct
    } else if self.is_unsure {
      Outcome::Unsure
    } else {
      Outcome::Wrong
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
  Correct,
  Wrong,
  Unsure,
}

impl Outcome {
  pub fn as_str(&self) -> &'static str {
    match self {
      Outcome::Correct => "correct",
      Outcome::Wrong => "wrong",
      Outcome::Unsure => "unsure",
    }
  }
}

/// Optional personalization sent by the front-end.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Profile {
  /// Child's first name, already trimmed. Empty means "no name".
  pub name: String,
  /// Interest key as sent by the client ("puppies", "dinos", ...).
  pub interest: String,
  /// Theme word resolved from `interest`, empty if unknown.
  pub theme_word: String,
}

impl Profile {
  pub fn has_name(&self) -> bool {
    !self.name.is_empty()
  }
}
