//! The lesson answer key: built-in checkpoints and the validated lookup table.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::domain::Checkpoint;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
  #[error("checkpoint table is empty")]
  Empty,
  #[error("checkpoint id must not be blank")]
  BlankId,
  #[error("duplicate checkpoint id: {0}")]
  DuplicateId(String),
  #[error("checkpoint {id}: {field} must not be blank")]
  BlankField { id: String, field: &'static str },
}

/// Immutable id -> checkpoint table. Only constructed through `from_entries`,
/// so every instance has passed validation.
#[derive(Clone, Debug)]
pub struct CheckpointTable {
  by_id: BTreeMap<String, Checkpoint>,
}

impl CheckpointTable {
  pub fn from_entries(entries: Vec<Checkpoint>) -> Result<Self, TableError> {
    if entries.is_empty() {
      return Err(TableError::Empty);
    }
    let mut by_id = BTreeMap::new();
    for mut cp in entries {
      cp.id = cp.id.trim().to_string();
      if cp.id.is_empty() {
        return Err(TableError::BlankId);
      }
      if cp.correct_answer.trim().is_empty() {
        return Err(TableError::BlankField { id: cp.id, field: "correct_answer" });
      }
      if cp.prompt_label.trim().is_empty() {
        return Err(TableError::BlankField { id: cp.id, field: "prompt_label" });
      }
      if by_id.contains_key(&cp.id) {
        return Err(TableError::DuplicateId(cp.id));
      }
      by_id.insert(cp.id.clone(), cp);
    }
    Ok(Self { by_id })
  }

  /// The Lesson 1 answer key shipped with the binary.
  pub fn builtin() -> Self {
    let by_id = builtin_checkpoints()
      .into_iter()
      .map(|cp| (cp.id.clone(), cp))
      .collect();
    Self { by_id }
  }

  pub fn get(&self, id: &str) -> Option<&Checkpoint> {
    self.by_id.get(id)
  }

  pub fn len(&self) -> usize {
    self.by_id.len()
  }

  pub fn ids(&self) -> impl Iterator<Item = &str> {
    self.by_id.keys().map(String::as_str)
  }
}

fn cp(id: &str, correct_answer: &str, prompt_label: &str, meaning: &str) -> Checkpoint {
  Checkpoint {
    id: id.into(),
    correct_answer: correct_answer.into(),
    prompt_label: prompt_label.into(),
    meaning: meaning.into(),
  }
}

pub fn builtin_checkpoints() -> Vec<Checkpoint> {
  vec![
    cp("p1", "한국어", "say 'Korean language' in Korean", "Korean language"),
    cp("p2", "선생님", "say 'teacher' in Korean", "teacher"),
    cp("p3", "안녕", "hello to friends", "hello (to friends)"),
    cp("p4", "안녕하세요 with a bow", "say 안녕하세요 with respect (a bow)", "polite hello, with a bow"),
    cp("p5", "안녕하세요", "polite hello", "hello (polite)"),
  ]
}
