//! String helpers for answer matching, feedback text and logging.

/// Substitutes `{name}` placeholders in feedback templates. Unknown
/// placeholders are left as-is.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  pairs
    .iter()
    .fold(tpl.to_string(), |acc, (k, v)| acc.replace(&format!("{{{k}}}"), v))
}

/// Normalize free-text input for comparison: trimmed and lowercased.
pub fn normalize_answer(s: &str) -> String {
  s.trim().to_lowercase()
}

/// Number of whitespace-separated words.
pub fn word_count(s: &str) -> usize {
  s.split_whitespace().count()
}

/// Identifiers used as storage keys and URL segments: lowercase ASCII, digits, `-` and `_`.
pub fn is_slug(s: &str) -> bool {
  !s.is_empty()
    && s
      .chars()
      .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Caps free-text answers before they reach a log line.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} chars total)", head, s.chars().count())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_fills_every_occurrence() {
    let out = fill_template("{a} and {a} then {b}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and x then y");
  }

  #[test]
  fn normalize_trims_and_lowercases() {
    assert_eq!(normalize_answer("  Triangle \n"), "triangle");
  }

  #[test]
  fn word_count_ignores_extra_spaces() {
    assert_eq!(word_count("  the  cat\tsat \n on the mat "), 6);
    assert_eq!(word_count("   "), 0);
  }

  #[test]
  fn slugs() {
    assert!(is_slug("fractions-1"));
    assert!(is_slug("level_2"));
    assert!(!is_slug("Level 2"));
    assert!(!is_slug("../etc"));
    assert!(!is_slug(""));
  }

  #[test]
  fn truncation_keeps_short_strings() {
    assert_eq!(trunc_for_log("short", 10), "short");
    assert!(trunc_for_log("a very long answer indeed", 6).starts_with("a very…"));
  }
}
