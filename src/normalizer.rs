//! Feedback text cleanup.
//!
//! Each step is a small pure function; `normalize_pass` chains them and
//! `normalize` repeats the pass until the text stops changing, so
//! `normalize(normalize(x)) == normalize(x)`.

/// Options for one normalization pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NormalizeOptions {
  /// Drop trailing question sentences (used when the child was correct).
  pub no_question: bool,
  /// Closing phrase every line must end with.
  pub required_ending: Option<String>,
  /// Hard cap in characters. The ending is never cut.
  pub max_length: Option<usize>,
}

const SENTENCE_ENDS: [char; 3] = ['.', '!', '?'];

/// Every pass only shrinks the body, so a fixed point is reached in a few rounds.
const MAX_PASSES: usize = 8;

pub fn normalize(text: &str, opts: &NormalizeOptions) -> String {
  let mut current = collapse_whitespace(text);
  for _ in 0..MAX_PASSES {
    let next = normalize_pass(&current, opts);
    if next == current {
      break;
    }
    current = next;
  }
  current
}

/// One round of the pipeline. Duplicates are checked on the whole line and
/// again on the body once the closing phrase is detached, and questions are
/// looked for in front of the closing phrase, not only at the very end.
fn normalize_pass(text: &str, opts: &NormalizeOptions) -> String {
  let ending = opts.required_ending.as_deref().map(str::trim).filter(|e| !e.is_empty());

  let mut body = collapse_duplicate(&collapse_whitespace(text));
  if let Some(ending) = ending {
    body = collapse_duplicate(&strip_trailing_endings(&body, ending));
  }
  if opts.no_question {
    body = strip_trailing_questions(&body);
  }

  match (ending, opts.max_length) {
    (Some(ending), max) => enforce_ending(&body, ending, max),
    (None, Some(max)) => truncate_chars(&body, max),
    (None, None) => body,
  }
}

/// Removes every copy of `ending` sitting at the end of the text.
fn strip_trailing_endings(text: &str, ending: &str) -> String {
  let mut t = text.trim_end();
  while let Some(rest) = t.strip_suffix(ending) {
    t = rest.trim_end();
  }
  t.to_string()
}

/// Whitespace runs become one space; ends are trimmed.
pub fn collapse_whitespace(text: &str) -> String {
  text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses `"<S> <S>"` (or two identical halves with no separator) into `<S>`,
/// repeatedly, so "ha ha ha ha" ends up as "ha".
pub fn collapse_duplicate(text: &str) -> String {
  let mut current = text.trim().to_string();
  while let Some(half) = duplicated_half(&current) {
    current = half;
  }
  current
}

fn duplicated_half(s: &str) -> Option<String> {
  let chars: Vec<char> = s.chars().collect();
  let n = chars.len();
  if n < 2 {
    return None;
  }

  // "<S><ws+><S>": try every whitespace run as the separator.
  for (i, c) in chars.iter().enumerate() {
    if !c.is_whitespace() || i == 0 || chars[i - 1].is_whitespace() {
      continue;
    }
    let mut j = i;
    while j < n && chars[j].is_whitespace() {
      j += 1;
    }
    if i == n - j {
      let left: String = chars[..i].iter().collect();
      let right: String = chars[j..].iter().collect();
      if left == right {
        return Some(left);
      }
    }
  }

  // "<S><S>" with no separator.
  if n % 2 == 0 {
    let (a, b) = chars.split_at(n / 2);
    if a == b {
      return Some(a.iter().collect());
    }
  }
  None
}

/// While the text ends with `?`, cut back to the previous sentence boundary.
/// Returns an empty string when nothing but questions remains.
pub fn strip_trailing_questions(text: &str) -> String {
  let mut t = text.trim().to_string();
  while t.ends_with('?') {
    let head = &t[..t.len() - 1];
    match head.rfind(SENTENCE_ENDS) {
      Some(idx) => t = head[..=idx].trim_end().to_string(),
      None => return String::new(),
    }
  }
  t
}

/// Makes `ending` the last sentence, keeping the total within `max_length`.
/// A body that already closes a sentence keeps its own punctuation.
pub fn enforce_ending(text: &str, ending: &str, max_length: Option<usize>) -> String {
  let ending = ending.trim();
  let text = text.trim();
  let body = text.strip_suffix(ending).unwrap_or(text);
  let mut body = body.trim_end_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':')).to_string();
  let mut joiner = if body.ends_with(SENTENCE_ENDS) { " " } else { ". " };

  if let Some(max) = max_length {
    let fits = body.is_empty() || body.chars().count() + joiner.chars().count() + ending.chars().count() <= max;
    if !fits {
      // A cut body never ends a sentence cleanly; always close it with ". ".
      let budget = max.saturating_sub(ending.chars().count() + 2);
      body = trim_trailing_punct(&truncate_chars(&body, budget));
      joiner = ". ";
    }
  }

  if body.is_empty() {
    ending.to_string()
  } else {
    format!("{body}{joiner}{ending}")
  }
}

/// Cuts to at most `max` chars, preferring the last word boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    return s.to_string();
  }
  let byte_end = s.char_indices().nth(max).map(|(i, _)| i).unwrap_or(s.len());
  let head = &s[..byte_end];
  let next_is_break = s[byte_end..].starts_with(char::is_whitespace);
  let cut = if next_is_break {
    head
  } else {
    match head.rfind(char::is_whitespace) {
      Some(ws) if ws > 0 => &head[..ws],
      _ => head,
    }
  };
  cut.trim_end().to_string()
}
