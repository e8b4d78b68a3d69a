//! Deterministic fallback lines, used whenever the model reply is unavailable.

use crate::domain::Outcome;
use crate::normalizer::collapse_whitespace;

pub const CLOSING_PHRASE: &str = "Let’s keep going!";

/// Personalization pieces a fallback line may use. Empty strings are omitted.
#[derive(Clone, Debug, Default)]
pub struct FallbackContext<'a> {
  pub name: &'a str,
  pub correct_answer: &'a str,
  pub meaning: &'a str,
  pub theme_word: &'a str,
}

pub fn fallback_line(outcome: Outcome, ctx: &FallbackContext<'_>, ending: &str) -> String {
  let prefix = if ctx.name.is_empty() { String::new() } else { format!("{}, ", ctx.name) };
  let answer = ctx.correct_answer;

  let core = match outcome {
    Outcome::Correct if ctx.meaning.is_empty() => format!("You got it! \"{answer}\" is right! {}", ctx.theme_word),
    Outcome::Correct => format!("You got it! \"{answer}\" means \"{}\". {}", ctx.meaning, ctx.theme_word),
    Outcome::Wrong => format!("Nice try! The right answer is \"{answer}\". {}", ctx.theme_word),
    Outcome::Unsure => format!("That’s okay! The right answer is \"{answer}\"."),
  };

  collapse_whitespace(&format!("{prefix}{core} {ending}"))
}
