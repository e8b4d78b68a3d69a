//! Builds the system/user prompt pair for one coach reply.
//!
//! Placeholders available in `Prompts::user_template`:
//!   {pause_id} {label} {correct} {choice} {is_correct} {is_unsure} {outcome}
//!   {name_line} {theme_line} {name_prefix} {theme_rule} {ending}
//! `{ending}` is also filled in `Prompts::system`.

use crate::config::Prompts;
use crate::domain::{Checkpoint, EvaluationResult, Profile};
use crate::util::fill_template;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PromptPair {
  pub system: String,
  pub user: String,
}

pub fn build_coach_prompt(
  prompts: &Prompts,
  checkpoint: &Checkpoint,
  choice: &str,
  eval: &EvaluationResult,
  profile: &Profile,
  ending: &str,
) -> PromptPair {
  let name_line = if profile.has_name() { format!("Name: {}. ", profile.name) } else { String::new() };
  let name_prefix = if profile.has_name() { format!("{}, ", profile.name) } else { String::new() };
  let (theme_line, theme_rule) = if profile.theme_word.is_empty() {
    (String::new(), String::new())
  } else {
    (
      format!("Theme word: {}. ", profile.theme_word),
      format!("Include \"{}\" as a very short sentence before the ending. ", profile.theme_word),
    )
  };
  let is_correct = eval.is_correct.to_string();
  let is_unsure = eval.is_unsure.to_string();

  let system = fill_template(&prompts.system, &[("ending", ending)]);
  let user = fill_template(
    &prompts.user_template,
    &[
      ("pause_id", checkpoint.id.as_str()),
      ("label", checkpoint.prompt_label.as_str()),
      ("correct", checkpoint.correct_answer.as_str()),
      ("choice", choice),
      ("is_correct", is_correct.as_str()),
      ("is_unsure", is_unsure.as_str()),
      ("outcome", eval.outcome().as_str()),
      ("name_line", name_line.as_str()),
      ("theme_line", theme_line.as_str()),
      ("name_prefix", name_prefix.as_str()),
      ("theme_rule", theme_rule.as_str()),
      ("ending", ending),
    ],
  );
  PromptPair { system, user }
}
