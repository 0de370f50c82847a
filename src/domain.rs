//! Domain models: exercises and their grading targets, levels, modules, and the
//! per-attempt / per-level results produced by the runner.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How a multi-select candidate set is compared to the accepted set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
  /// Candidate set must equal the accepted set.
  #[default]
  Exact,
  /// Any accepted option in the candidate set counts.
  AnyOverlap,
}

/// Grading target, tagged by exercise kind. Each variant carries exactly the
/// data its grading function needs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Grading {
  /// Index into `Exercise::options`.
  SingleChoice { correct: usize },
  /// Indices into `Exercise::options`.
  MultiSelect {
    accepted: BTreeSet<usize>,
    #[serde(default)]
    rule: MatchRule,
  },
  /// One canonical answer, compared trimmed and case-insensitively.
  FreeTextExact { answer: String },
  /// Any of several synonyms, compared trimmed and case-insensitively.
  FreeTextLenient { accepted: Vec<String> },
  /// Open-ended writing, accepted once it reaches `min_words`.
  MinLengthCreative { min_words: usize },
}

impl Grading {
  pub fn kind_name(&self) -> &'static str {
    match self {
      Grading::SingleChoice { .. } => "single-choice",
      Grading::MultiSelect { .. } => "multi-select",
      Grading::FreeTextExact { .. } => "free-text-exact",
      Grading::FreeTextLenient { .. } => "free-text-lenient",
      Grading::MinLengthCreative { .. } => "min-length-creative",
    }
  }

  /// Kinds whose candidates index into `options`.
  pub fn uses_options(&self) -> bool {
    matches!(self, Grading::SingleChoice { .. } | Grading::MultiSelect { .. })
  }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  #[default]
  Easy,
  Medium,
  Hard,
}

/// One gradable unit. Immutable once the catalog is built.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Exercise {
  pub id: String,
  pub prompt: String,
  /// Display order is significant: indices in `grading` refer to it.
  #[serde(default)] pub options: Vec<String>,
  pub grading: Grading,
  pub points: u32,
  #[serde(default)] pub explanation: String,
  #[serde(default)] pub difficulty: Difficulty,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Level {
  pub id: String,
  pub name: String,
  pub exercises: Vec<Exercise>,
}

/// A skill area ("world"). Level order is the unlock order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Module {
  pub id: String,
  pub name: String,
  #[serde(default)] pub description: String,
  pub levels: Vec<Level>,
}

impl Module {
  pub fn level_index(&self, level_id: &str) -> Option<usize> {
    self.levels.iter().position(|l| l.id == level_id)
  }
}

/// A user's pending or submitted answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Candidate {
  Choice(usize),
  Choices(BTreeSet<usize>),
  Text(String),
}

impl Candidate {
  /// Empty sets and blank text count as "nothing selected".
  pub fn is_empty(&self) -> bool {
    match self {
      Candidate::Choice(_) => false,
      Candidate::Choices(set) => set.is_empty(),
      Candidate::Text(t) => t.trim().is_empty(),
    }
  }
}

impl fmt::Display for Candidate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Candidate::Choice(i) => write!(f, "choice {}", i),
      Candidate::Choices(set) => write!(f, "choices {:?}", set),
      Candidate::Text(t) => write!(f, "text ({} chars)", t.chars().count()),
    }
  }
}

/// Outcome of one submitted answer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
  pub exercise_id: String,
  pub selected: Candidate,
  pub is_correct: bool,
  pub points_awarded: u32,
}

/// Final numbers of one level run.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSummary {
  pub module_id: String,
  pub level_id: String,
  pub level_index: usize,
  pub score: u32,
  pub correct_count: usize,
  pub total_exercises: usize,
  pub accuracy_percent: f64,
  pub best_streak: u32,
  pub passed: bool,
  pub unlocked_next: bool,
}
