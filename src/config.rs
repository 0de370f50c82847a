//! Loading service configuration (scoring rules, feedback messages, storage) from TOML.
//!
//! See `AppConfig`, `Rules` and `Messages` for the expected schema. Every field
//! has a default, so an empty file (or no file at all) is a valid config.

use std::path::PathBuf;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{error, info};

use crate::progress::UnlockPolicy;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub rules: Rules,
  #[serde(default)]
  pub messages: Messages,
  #[serde(default)]
  pub sessions: SessionLimits,
  /// When set, progress is kept as JSON files here instead of in memory.
  #[serde(default)]
  pub progress_dir: Option<PathBuf>,
  /// Optional TOML catalog merged over the built-in modules.
  #[serde(default)]
  pub catalog_path: Option<PathBuf>,
}

/// Scoring and progression rules shared by every game.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Rules {
  /// Extra points per correct answer for each level index (level 0 gets none).
  pub level_bonus: u32,
  /// Accuracy (percent) a level run needs to unlock the next level.
  pub pass_threshold_percent: u32,
  /// Delay between grading and the automatic move to the next exercise. 0 disables it.
  pub auto_advance_ms: u64,
  pub unlock_policy: UnlockPolicy,
}

impl Default for Rules {
  fn default() -> Self {
    Self {
      level_bonus: 5,
      pass_threshold_percent: 70,
      auto_advance_ms: 2000,
      unlock_policy: UnlockPolicy::Progressive,
    }
  }
}

impl Rules {
  /// Points for a correct answer: `base + level_index * level_bonus`.
  pub fn points_for(&self, base: u32, level_index: usize) -> u32 {
    let idx = u32::try_from(level_index).unwrap_or(u32::MAX);
    base.saturating_add(idx.saturating_mul(self.level_bonus))
  }

  /// `correct / total >= threshold`, compared in integers.
  pub fn passes(&self, correct: usize, total: usize) -> bool {
    total > 0 && (correct as u64) * 100 >= (self.pass_threshold_percent as u64) * (total as u64)
  }

  pub fn auto_advance(&self) -> Option<Duration> {
    (self.auto_advance_ms > 0).then(|| Duration::from_millis(self.auto_advance_ms))
  }
}

/// Housekeeping for sessions a client stopped talking to.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionLimits {
  /// Sessions untouched for this long are disposed. 0 keeps them forever.
  pub idle_timeout_secs: u64,
  pub sweep_interval_secs: u64,
}

impl Default for SessionLimits {
  fn default() -> Self {
    Self { idle_timeout_secs: 30 * 60, sweep_interval_secs: 60 }
  }
}

impl SessionLimits {
  pub fn idle_timeout(&self) -> Option<Duration> {
    (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
  }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs.max(1))
  }
}

/// Feedback text. Templates use `{key}` placeholders (see `util::fill_template`).
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Messages {
  /// One of these is picked at random for a correct answer. `{points}` is available.
  pub praise: Vec<String>,
  /// `{explanation}` is available.
  pub incorrect_template: String,
  /// `{min_words}` and `{words}` are available.
  pub creative_too_short_template: String,
  /// `{score}`, `{correct}`, `{total}` and `{accuracy}` are available.
  pub level_complete_template: String,
  pub next_level_unlocked: String,
  pub no_selection: String,
}

impl Default for Messages {
  fn default() -> Self {
    Self {
      praise: vec![
        "Great job! +{points} points".into(),
        "Awesome! +{points} points".into(),
        "You got it! +{points} points".into(),
        "Super star! +{points} points".into(),
      ],
      incorrect_template: "Not quite. {explanation}".into(),
      creative_too_short_template: "Great start! Try to write at least {min_words} words (you wrote {words}).".into(),
      level_complete_template: "Level complete! {correct}/{total} correct, {accuracy}% accuracy, {score} points.".into(),
      next_level_unlocked: "The next level is now unlocked!".into(),
      no_selection: "Please select an answer first.".into(),
    }
  }
}

impl Messages {
  /// A random praise template, or a plain fallback if none are configured.
  pub fn pick_praise(&self) -> &str {
    self
      .praise
      .choose(&mut rand::thread_rng())
      .map(String::as_str)
      .unwrap_or("Correct! +{points} points")
  }
}

/// Attempt to load `AppConfig` from LEARNPLAY_CONFIG_PATH, then apply env overrides.
/// On any parsing/IO error the defaults are used.
pub fn load_app_config_from_env() -> AppConfig {
  let mut cfg = match std::env::var("LEARNPLAY_CONFIG_PATH") {
    Ok(path) => match std::fs::read_to_string(&path) {
      Ok(s) => match toml::from_str::<AppConfig>(&s) {
        Ok(cfg) => {
          info!(target: "learnplay", %path, "Loaded config (TOML)");
          cfg
        }
        Err(e) => {
          error!(target: "learnplay", %path, error = %e, "Failed to parse TOML config; using defaults");
          AppConfig::default()
        }
      },
      Err(e) => {
        error!(target: "learnplay", %path, error = %e, "Failed to read TOML config file; using defaults");
        AppConfig::default()
      }
    },
    Err(_) => AppConfig::default(),
  };

  if let Ok(dir) = std::env::var("PROGRESS_DIR") {
    cfg.progress_dir = Some(PathBuf::from(dir));
  }
  if let Ok(path) = std::env::var("CATALOG_PATH") {
    cfg.catalog_path = Some(PathBuf::from(path));
  }
  cfg
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_toml_gives_defaults() {
    let cfg: AppConfig = toml::from_str("").unwrap();
    assert_eq!(cfg.rules.pass_threshold_percent, 70);
    assert_eq!(cfg.rules.unlock_policy, UnlockPolicy::Progressive);
    assert!(cfg.progress_dir.is_none());
    assert!(!cfg.messages.praise.is_empty());
  }

  #[test]
  fn partial_sections_keep_other_defaults() {
    let cfg: AppConfig = toml::from_str(
      r#"
progress_dir = "/var/lib/learnplay"

[rules]
level_bonus = 10
unlock_policy = "all_unlocked"

[messages]
no_selection = "Pick one!"
"#,
    )
    .unwrap();
    assert_eq!(cfg.rules.level_bonus, 10);
    assert_eq!(cfg.rules.auto_advance_ms, 2000);
    assert_eq!(cfg.rules.unlock_policy, UnlockPolicy::AllUnlocked);
    assert_eq!(cfg.messages.no_selection, "Pick one!");
    assert_eq!(cfg.messages.incorrect_template, Messages::default().incorrect_template);
    assert_eq!(cfg.progress_dir, Some(PathBuf::from("/var/lib/learnplay")));
  }

  #[test]
  fn points_grow_with_level_index() {
    let rules = Rules { level_bonus: 5, ..Rules::default() };
    assert_eq!(rules.points_for(10, 0), 10);
    assert_eq!(rules.points_for(10, 1), 15);
    assert_eq!(rules.points_for(10, 3), 25);
    assert!(rules.points_for(10, 2) > rules.points_for(10, 1));
  }

  #[test]
  fn threshold_is_inclusive() {
    let rules = Rules::default();
    assert!(rules.passes(7, 10));
    assert!(!rules.passes(6, 10));
    assert!(!rules.passes(69, 100));
    assert!(rules.passes(70, 100));
    assert!(!rules.passes(0, 0));
  }

  #[test]
  fn zero_delay_disables_auto_advance() {
    let rules = Rules { auto_advance_ms: 0, ..Rules::default() };
    assert!(rules.auto_advance().is_none());
    assert_eq!(Rules::default().auto_advance(), Some(Duration::from_millis(2000)));
  }

  #[test]
  fn session_limits_parse_and_default() {
    let cfg: AppConfig = toml::from_str("[sessions]\nidle_timeout_secs = 0\n").unwrap();
    assert!(cfg.sessions.idle_timeout().is_none());
    assert_eq!(cfg.sessions.sweep_interval(), Duration::from_secs(60));
    assert_eq!(SessionLimits::default().idle_timeout(), Some(Duration::from_secs(1800)));
    let zero = SessionLimits { sweep_interval_secs: 0, ..SessionLimits::default() };
    assert_eq!(zero.sweep_interval(), Duration::from_secs(1));
  }

  #[test]
  fn empty_praise_list_falls_back() {
    let msgs = Messages { praise: vec![], ..Messages::default() };
    assert!(msgs.pick_praise().contains("{points}"));
  }
}
