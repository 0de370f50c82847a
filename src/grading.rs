//! Pure grading: one function per exercise kind, selected by an exhaustive match.

use crate::domain::{Candidate, Grading, MatchRule};
use crate::util::{normalize_answer, word_count};

/// The candidate's shape does not fit the exercise kind (e.g. text for a
/// single-choice question).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("This answer does not fit a {kind} exercise.")]
pub struct ShapeMismatch {
  pub kind: &'static str,
}

/// Grade `candidate` against `grading`. Deterministic; no side effects.
pub fn grade(grading: &Grading, candidate: &Candidate) -> Result<bool, ShapeMismatch> {
  let mismatch = || ShapeMismatch { kind: grading.kind_name() };
  match (grading, candidate) {
    (Grading::SingleChoice { correct }, Candidate::Choice(idx)) => Ok(grade_single_choice(*correct, *idx)),
    (Grading::MultiSelect { accepted, rule }, Candidate::Choices(set)) => Ok(grade_multi_select(accepted, *rule, set)),
    (Grading::FreeTextExact { answer }, Candidate::Text(t)) => Ok(grade_exact(answer, t)),
    (Grading::FreeTextLenient { accepted }, Candidate::Text(t)) => Ok(grade_lenient(accepted, t)),
    (Grading::MinLengthCreative { min_words }, Candidate::Text(t)) => Ok(grade_creative(*min_words, t)),
    _ => Err(mismatch()),
  }
}

/// Whether `candidate` has the shape `grading` expects.
pub fn fits(grading: &Grading, candidate: &Candidate) -> bool {
  grade(grading, candidate).is_ok()
}

fn grade_single_choice(correct: usize, selected: usize) -> bool {
  correct == selected
}

fn grade_multi_select(
  accepted: &std::collections::BTreeSet<usize>,
  rule: MatchRule,
  selected: &std::collections::BTreeSet<usize>,
) -> bool {
  if selected.is_empty() {
    return false;
  }
  match rule {
    MatchRule::Exact => selected == accepted,
    MatchRule::AnyOverlap => !selected.is_disjoint(accepted),
  }
}

fn grade_exact(answer: &str, text: &str) -> bool {
  normalize_answer(answer) == normalize_answer(text)
}

fn grade_lenient(accepted: &[String], text: &str) -> bool {
  let given = normalize_answer(text);
  accepted.iter().any(|a| normalize_answer(a) == given)
}

fn grade_creative(min_words: usize, text: &str) -> bool {
  word_count(text) >= min_words
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeSet;

  fn set(items: &[usize]) -> BTreeSet<usize> {
    items.iter().copied().collect()
  }

  #[test]
  fn single_choice_compares_indices() {
    let g = Grading::SingleChoice { correct: 2 };
    assert_eq!(grade(&g, &Candidate::Choice(2)), Ok(true));
    assert_eq!(grade(&g, &Candidate::Choice(0)), Ok(false));
  }

  #[test]
  fn multi_select_exact_requires_full_match() {
    let g = Grading::MultiSelect { accepted: set(&[0, 2]), rule: MatchRule::Exact };
    assert_eq!(grade(&g, &Candidate::Choices(set(&[0, 2]))), Ok(true));
    assert_eq!(grade(&g, &Candidate::Choices(set(&[0]))), Ok(false));
    assert_eq!(grade(&g, &Candidate::Choices(set(&[0, 1, 2]))), Ok(false));
  }

  #[test]
  fn multi_select_any_overlap_counts_one_hit() {
    let g = Grading::MultiSelect { accepted: set(&[0, 2]), rule: MatchRule::AnyOverlap };
    assert_eq!(grade(&g, &Candidate::Choices(set(&[2]))), Ok(true));
    assert_eq!(grade(&g, &Candidate::Choices(set(&[1, 2, 3]))), Ok(true));
    assert_eq!(grade(&g, &Candidate::Choices(set(&[1, 3]))), Ok(false));
    assert_eq!(grade(&g, &Candidate::Choices(set(&[]))), Ok(false));
  }

  #[test]
  fn exact_text_ignores_case_and_outer_space() {
    let g = Grading::FreeTextExact { answer: "Triangle".into() };
    assert_eq!(grade(&g, &Candidate::Text("  triangle ".into())), Ok(true));
    assert_eq!(grade(&g, &Candidate::Text("triangles".into())), Ok(false));
  }

  #[test]
  fn lenient_text_accepts_any_synonym() {
    let g = Grading::FreeTextLenient { accepted: vec!["big".into(), "Large".into(), "huge".into()] };
    assert_eq!(grade(&g, &Candidate::Text("LARGE".into())), Ok(true));
    assert_eq!(grade(&g, &Candidate::Text("huge ".into())), Ok(true));
    assert_eq!(grade(&g, &Candidate::Text("small".into())), Ok(false));
  }

  #[test]
  fn creative_needs_minimum_words() {
    let g = Grading::MinLengthCreative { min_words: 10 };
    let eight = "my dog likes to run in the park";
    let ten = "my dog likes to run in the park every day";
    assert_eq!(grade(&g, &Candidate::Text(eight.into())), Ok(false));
    assert_eq!(grade(&g, &Candidate::Text(ten.into())), Ok(true));
  }

  #[test]
  fn wrong_shape_is_rejected() {
    let g = Grading::SingleChoice { correct: 0 };
    assert_eq!(
      grade(&g, &Candidate::Text("0".into())),
      Err(ShapeMismatch { kind: "single-choice" })
    );
    assert!(!fits(&Grading::FreeTextExact { answer: "x".into() }, &Candidate::Choice(0)));
  }

  #[test]
  fn grading_is_deterministic() {
    let g = Grading::FreeTextLenient { accepted: vec!["cat".into()] };
    let c = Candidate::Text("Cat".into());
    let first = grade(&g, &c);
    for _ in 0..10 {
      assert_eq!(grade(&g, &c), first);
    }
  }
}
