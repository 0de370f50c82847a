//! Read-only content catalog: modules → levels → exercises.
//!
//! The catalog is validated once, when it is built. A running session can assume
//! every exercise has a grading target that fits its kind, every level has at
//! least one exercise and every module has at least one level.
//!
//! Extra modules can be loaded from a TOML file with the same shape as the
//! built-ins:
//!
//! ```toml
//! [[modules]]
//! id = "shapes"
//! name = "Shapes"
//!
//! [[modules.levels]]
//! id = "sides"
//! name = "Counting sides"
//!
//! [[modules.levels.exercises]]
//! id = "triangle"
//! prompt = "How many sides does a triangle have?"
//! options = ["2", "3", "4"]
//! grading = { kind = "single-choice", correct = 1 }
//! points = 10
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::domain::{Exercise, Grading, Level, Module};
use crate::util::is_slug;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
  #[error("Module '{0}' not found")]
  ModuleNotFound(String),

  #[error("Level '{level_id}' not found in module '{module_id}'")]
  LevelNotFound { module_id: String, level_id: String },

  #[error("Invalid catalog entry at {path}: {reason}")]
  Invalid { path: String, reason: String },

  #[error("Duplicate id '{id}' in {scope}")]
  DuplicateId { scope: String, id: String },

  #[error("Failed to read catalog file: {0}")]
  Io(#[from] std::io::Error),

  #[error("Failed to parse catalog TOML: {0}")]
  Parse(#[from] toml::de::Error),
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
  #[serde(default)]
  modules: Vec<Module>,
}

#[derive(Debug)]
pub struct ContentCatalog {
  modules: Vec<Module>,
  by_id: HashMap<String, usize>,
}

impl ContentCatalog {
  /// Build a catalog, failing fast on the first integrity violation.
  pub fn new(modules: Vec<Module>) -> Result<Self, CatalogError> {
    if modules.is_empty() {
      return Err(invalid("catalog", "catalog has no modules"));
    }
    let mut by_id = HashMap::with_capacity(modules.len());
    for (idx, module) in modules.iter().enumerate() {
      validate_module(module)?;
      if by_id.insert(module.id.clone(), idx).is_some() {
        return Err(CatalogError::DuplicateId { scope: "catalog".into(), id: module.id.clone() });
      }
    }
    Ok(Self { modules, by_id })
  }

  /// Built-in modules, plus modules from the TOML file at `extra` if given.
  /// A file module with the id of a built-in replaces it in place.
  #[instrument(level = "info", skip(builtin))]
  pub fn load(builtin: Vec<Module>, extra: Option<&Path>) -> Result<Self, CatalogError> {
    let mut modules = builtin;
    if let Some(path) = extra {
      let text = std::fs::read_to_string(path)?;
      let file_modules = parse_modules(&text)?;
      info!(target: "catalog", path = %path.display(), count = file_modules.len(), "Loaded catalog file");
      for m in file_modules {
        match modules.iter().position(|b| b.id == m.id) {
          Some(pos) => modules[pos] = m,
          None => modules.push(m),
        }
      }
    }
    let catalog = Self::new(modules)?;
    for m in catalog.modules() {
      let exercises: usize = m.levels.iter().map(|l| l.exercises.len()).sum();
      info!(target: "catalog", module = %m.id, levels = m.levels.len(), exercises, "Catalog module ready");
    }
    Ok(catalog)
  }

  pub fn from_toml_str(text: &str) -> Result<Self, CatalogError> {
    Self::new(parse_modules(text)?)
  }

  /// Modules in catalog order.
  pub fn modules(&self) -> impl Iterator<Item = &Module> {
    self.modules.iter()
  }

  pub fn get_module(&self, id: &str) -> Result<&Module, CatalogError> {
    self
      .by_id
      .get(id)
      .map(|&idx| &self.modules[idx])
      .ok_or_else(|| CatalogError::ModuleNotFound(id.to_string()))
  }

  pub fn get_level(&self, module_id: &str, level_id: &str) -> Result<&Level, CatalogError> {
    self.locate_level(module_id, level_id).map(|(_, level)| level)
  }

  /// Level together with its position in the module (its unlock order).
  pub fn locate_level(&self, module_id: &str, level_id: &str) -> Result<(usize, &Level), CatalogError> {
    let module = self.get_module(module_id)?;
    module
      .level_index(level_id)
      .map(|idx| (idx, &module.levels[idx]))
      .ok_or_else(|| CatalogError::LevelNotFound {
        module_id: module_id.to_string(),
        level_id: level_id.to_string(),
      })
  }
}

fn parse_modules(text: &str) -> Result<Vec<Module>, CatalogError> {
  let file: CatalogFile = toml::from_str(text)?;
  Ok(file.modules)
}

fn invalid(path: &str, reason: impl Into<String>) -> CatalogError {
  CatalogError::Invalid { path: path.to_string(), reason: reason.into() }
}

fn check_id(path: &str, id: &str) -> Result<(), CatalogError> {
  if is_slug(id) {
    Ok(())
  } else {
    Err(invalid(path, format!("id '{}' must be lowercase letters, digits, '-' or '_'", id)))
  }
}

fn validate_module(module: &Module) -> Result<(), CatalogError> {
  let path = module.id.clone();
  check_id(&path, &module.id)?;
  if module.levels.is_empty() {
    return Err(invalid(&path, "module has no levels"));
  }
  let mut seen = HashSet::new();
  for level in &module.levels {
    let level_path = format!("{}/{}", module.id, level.id);
    check_id(&level_path, &level.id)?;
    if !seen.insert(level.id.as_str()) {
      return Err(CatalogError::DuplicateId { scope: format!("module '{}'", module.id), id: level.id.clone() });
    }
    validate_level(&level_path, level)?;
  }
  Ok(())
}

fn validate_level(path: &str, level: &Level) -> Result<(), CatalogError> {
  if level.exercises.is_empty() {
    return Err(invalid(path, "level has no exercises"));
  }
  let mut seen = HashSet::new();
  for ex in &level.exercises {
    let ex_path = format!("{}/{}", path, ex.id);
    check_id(&ex_path, &ex.id)?;
    if !seen.insert(ex.id.as_str()) {
      return Err(CatalogError::DuplicateId { scope: format!("level '{}'", path), id: ex.id.clone() });
    }
    validate_exercise(&ex_path, ex)?;
  }
  Ok(())
}

fn validate_exercise(path: &str, ex: &Exercise) -> Result<(), CatalogError> {
  if ex.prompt.trim().is_empty() {
    return Err(invalid(path, "prompt is empty"));
  }
  if ex.grading.uses_options() && ex.options.len() < 2 {
    return Err(invalid(path, "choice exercises need at least two options"));
  }
  if ex.options.iter().any(|o| o.trim().is_empty()) {
    return Err(invalid(path, "blank option"));
  }
  match &ex.grading {
    Grading::SingleChoice { correct } => {
      if *correct >= ex.options.len() {
        return Err(invalid(path, format!("correct index {} out of range", correct)));
      }
    }
    Grading::MultiSelect { accepted, .. } => {
      if accepted.is_empty() {
        return Err(invalid(path, "accepted set is empty"));
      }
      if let Some(bad) = accepted.iter().find(|&&i| i >= ex.options.len()) {
        return Err(invalid(path, format!("accepted index {} out of range", bad)));
      }
    }
    Grading::FreeTextExact { answer } => {
      if answer.trim().is_empty() {
        return Err(invalid(path, "answer is empty"));
      }
    }
    Grading::FreeTextLenient { accepted } => {
      if accepted.is_empty() || accepted.iter().any(|a| a.trim().is_empty()) {
        return Err(invalid(path, "accepted answers must be non-empty"));
      }
    }
    Grading::MinLengthCreative { min_words } => {
      if *min_words == 0 {
        return Err(invalid(path, "min_words must be at least 1"));
      }
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{Difficulty, MatchRule};

  fn exercise(id: &str, grading: Grading, options: &[&str]) -> Exercise {
    Exercise {
      id: id.into(),
      prompt: "What?".into(),
      options: options.iter().map(|s| s.to_string()).collect(),
      grading,
      points: 10,
      explanation: String::new(),
      difficulty: Difficulty::Easy,
    }
  }

  fn module_with(exercises: Vec<Exercise>) -> Module {
    Module {
      id: "m".into(),
      name: "M".into(),
      description: String::new(),
      levels: vec![Level { id: "l1".into(), name: "L1".into(), exercises }],
    }
  }

  #[test]
  fn builtin_catalog_is_valid() {
    let catalog = ContentCatalog::new(crate::seeds::builtin_modules()).expect("valid");
    assert!(catalog.modules().count() >= 6);
    assert!(catalog.get_module("arithmetic").is_ok());
  }

  #[test]
  fn lookups_report_not_found() {
    let catalog = ContentCatalog::new(vec![module_with(vec![exercise(
      "e1",
      Grading::SingleChoice { correct: 0 },
      &["a", "b"],
    )])])
    .unwrap();
    assert!(catalog.get_level("m", "l1").is_ok());
    assert!(matches!(catalog.get_module("x"), Err(CatalogError::ModuleNotFound(_))));
    assert!(matches!(catalog.get_level("m", "nope"), Err(CatalogError::LevelNotFound { .. })));
    assert_eq!(catalog.locate_level("m", "l1").unwrap().0, 0);
  }

  #[test]
  fn rejects_empty_level_and_module() {
    let err = ContentCatalog::new(vec![module_with(vec![])]).unwrap_err();
    assert!(matches!(err, CatalogError::Invalid { .. }));

    let mut m = module_with(vec![]);
    m.levels.clear();
    assert!(ContentCatalog::new(vec![m]).is_err());
  }

  #[test]
  fn rejects_bad_grading_targets() {
    let cases = vec![
      exercise("a", Grading::SingleChoice { correct: 3 }, &["x", "y"]),
      exercise("b", Grading::SingleChoice { correct: 0 }, &["only"]),
      exercise("c", Grading::MultiSelect { accepted: Default::default(), rule: MatchRule::Exact }, &["x", "y"]),
      exercise("d", Grading::MultiSelect { accepted: [5].into_iter().collect(), rule: MatchRule::AnyOverlap }, &["x", "y"]),
      exercise("e", Grading::FreeTextExact { answer: "  ".into() }, &[]),
      exercise("f", Grading::FreeTextLenient { accepted: vec![] }, &[]),
      exercise("g", Grading::MinLengthCreative { min_words: 0 }, &[]),
    ];
    for ex in cases {
      let id = ex.id.clone();
      assert!(ContentCatalog::new(vec![module_with(vec![ex])]).is_err(), "exercise {id} should be rejected");
    }
  }

  #[test]
  fn rejects_duplicate_ids() {
    let ex = exercise("same", Grading::FreeTextExact { answer: "x".into() }, &[]);
    let err = ContentCatalog::new(vec![module_with(vec![ex.clone(), ex])]).unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateId { .. }));

    let m = module_with(vec![exercise("e", Grading::FreeTextExact { answer: "x".into() }, &[])]);
    let err = ContentCatalog::new(vec![m.clone(), m]).unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateId { .. }));
  }

  #[test]
  fn parses_toml_catalog() {
    let text = r#"
[[modules]]
id = "shapes"
name = "Shapes"

[[modules.levels]]
id = "sides"
name = "Counting sides"

[[modules.levels.exercises]]
id = "triangle"
prompt = "How many sides does a triangle have?"
options = ["2", "3", "4"]
grading = { kind = "single-choice", correct = 1 }
points = 10

[[modules.levels.exercises]]
id = "colors"
prompt = "Pick the warm colors"
options = ["red", "blue", "orange"]
grading = { kind = "multi-select", accepted = [0, 2], rule = "any_overlap" }
points = 5
difficulty = "medium"
"#;
    let catalog = ContentCatalog::from_toml_str(text).expect("parse");
    let level = catalog.get_level("shapes", "sides").unwrap();
    assert_eq!(level.exercises.len(), 2);
    assert_eq!(level.exercises[0].grading, Grading::SingleChoice { correct: 1 });
    assert!(matches!(
      level.exercises[1].grading,
      Grading::MultiSelect { rule: MatchRule::AnyOverlap, .. }
    ));
    assert_eq!(level.exercises[1].difficulty, Difficulty::Medium);
  }

  #[test]
  fn file_modules_replace_builtins_with_same_id() {
    let dir = std::env::temp_dir().join(format!("learnplay-catalog-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("catalog.toml");
    std::fs::write(
      &path,
      r#"
[[modules]]
id = "arithmetic"
name = "Custom arithmetic"

[[modules.levels]]
id = "only"
name = "Only level"

[[modules.levels.exercises]]
id = "one"
prompt = "1 + 1 = ?"
grading = { kind = "free-text-exact", answer = "2" }
points = 1
"#,
    )
    .unwrap();
    let builtin = crate::seeds::builtin_modules();
    let count = builtin.len();
    let catalog = ContentCatalog::load(builtin, Some(&path)).unwrap();
    assert_eq!(catalog.modules().count(), count);
    assert_eq!(catalog.get_module("arithmetic").unwrap().name, "Custom arithmetic");
    std::fs::remove_dir_all(&dir).ok();
  }
}
