//! Persisted per-module progress.
//!
//! Stores are plain key-value maps from module id to a JSON document, the same
//! shape a browser's local storage holds. Reads never fail: a missing,
//! unreadable or outdated record loads as "no progress".

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::util::is_slug;

/// Bumped whenever the record layout changes.
pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
  #[error("Progress storage I/O failed: {0}")]
  Io(#[from] std::io::Error),

  #[error("Progress record is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("Invalid progress key '{0}'")]
  InvalidKey(String),

  #[error("Progress storage unavailable")]
  Unavailable,
}

/// How levels become reachable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockPolicy {
  /// Level 0 is open; each further level opens when the previous one is passed.
  #[default]
  Progressive,
  /// Every level is open. Meant for demos and classroom walkthroughs.
  AllUnlocked,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
  pub version: u32,
  pub unlocked_levels: BTreeSet<usize>,
  pub completed_levels: BTreeSet<usize>,
  pub total_score: u64,
}

impl Default for ProgressRecord {
  fn default() -> Self {
    Self {
      version: RECORD_VERSION,
      unlocked_levels: BTreeSet::new(),
      completed_levels: BTreeSet::new(),
      total_score: 0,
    }
  }
}

impl ProgressRecord {
  /// Open the levels the policy guarantees for a module with `level_count` levels.
  /// Never locks anything that is already open.
  pub fn apply_policy(&mut self, policy: UnlockPolicy, level_count: usize) {
    match policy {
      UnlockPolicy::Progressive => {
        if level_count > 0 {
          self.unlocked_levels.insert(0);
        }
      }
      UnlockPolicy::AllUnlocked => self.unlocked_levels.extend(0..level_count),
    }
  }

  pub fn is_unlocked(&self, level_index: usize) -> bool {
    self.unlocked_levels.contains(&level_index)
  }

  pub fn is_completed(&self, level_index: usize) -> bool {
    self.completed_levels.contains(&level_index)
  }
}

/// Raw key-value access plus the typed `load`/`save` contract built on it.
pub trait ProgressStore: Send + Sync {
  fn read_raw(&self, key: &str) -> Result<Option<String>, ProgressError>;
  fn write_raw(&self, key: &str, value: &str) -> Result<(), ProgressError>;
  fn remove_raw(&self, key: &str) -> Result<(), ProgressError>;

  /// Record for `module_id`, or the default record when none is usable.
  fn load(&self, module_id: &str) -> ProgressRecord {
    let raw = match self.read_raw(module_id) {
      Ok(Some(raw)) => raw,
      Ok(None) => return ProgressRecord::default(),
      Err(e) => {
        warn!(target: "progress", %module_id, error = %e, "Progress read failed; starting fresh");
        return ProgressRecord::default();
      }
    };
    match serde_json::from_str::<ProgressRecord>(&raw) {
      Ok(rec) if rec.version == RECORD_VERSION => rec,
      Ok(rec) => {
        warn!(target: "progress", %module_id, version = rec.version, expected = RECORD_VERSION, "Progress record version mismatch; starting fresh");
        ProgressRecord::default()
      }
      Err(e) => {
        warn!(target: "progress", %module_id, error = %e, "Corrupt progress record; starting fresh");
        ProgressRecord::default()
      }
    }
  }

  /// Overwrite the record for `module_id`. Last write wins.
  fn save(&self, module_id: &str, record: &ProgressRecord) -> Result<(), ProgressError> {
    let json = serde_json::to_string(record)?;
    self.write_raw(module_id, &json)?;
    debug!(target: "progress", %module_id, total_score = record.total_score, completed = record.completed_levels.len(), "Progress saved");
    Ok(())
  }

  /// Explicit reset: forget everything stored for `module_id`.
  fn reset(&self, module_id: &str) -> Result<(), ProgressError> {
    self.remove_raw(module_id)
  }

  /// Read the stored record, apply `change`, write it back. Callers fold their
  /// own delta into whatever is stored now instead of overwriting it with an
  /// older copy. Returns the record as saved.
  fn update(
    &self,
    module_id: &str,
    change: &mut dyn FnMut(&mut ProgressRecord),
  ) -> Result<ProgressRecord, ProgressError> {
    let mut record = self.load(module_id);
    change(&mut record);
    self.save(module_id, &record)?;
    Ok(record)
  }
}

/// In-memory store. Progress lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
  entries: RwLock<HashMap<String, String>>,
}

impl MemoryProgressStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl ProgressStore for MemoryProgressStore {
  fn read_raw(&self, key: &str) -> Result<Option<String>, ProgressError> {
    let entries = self.entries.read().map_err(|_| ProgressError::Unavailable)?;
    Ok(entries.get(key).cloned())
  }

  fn write_raw(&self, key: &str, value: &str) -> Result<(), ProgressError> {
    let mut entries = self.entries.write().map_err(|_| ProgressError::Unavailable)?;
    entries.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_raw(&self, key: &str) -> Result<(), ProgressError> {
    let mut entries = self.entries.write().map_err(|_| ProgressError::Unavailable)?;
    entries.remove(key);
    Ok(())
  }

  fn update(
    &self,
    module_id: &str,
    change: &mut dyn FnMut(&mut ProgressRecord),
  ) -> Result<ProgressRecord, ProgressError> {
    let mut entries = self.entries.write().map_err(|_| ProgressError::Unavailable)?;
    let mut record = entries
      .get(module_id)
      .and_then(|raw| serde_json::from_str::<ProgressRecord>(raw).ok())
      .filter(|rec| rec.version == RECORD_VERSION)
      .unwrap_or_default();
    change(&mut record);
    entries.insert(module_id.to_string(), serde_json::to_string(&record)?);
    debug!(target: "progress", %module_id, total_score = record.total_score, "Progress updated");
    Ok(record)
  }
}

/// One `<module_id>.json` file per module under `dir`.
#[derive(Debug)]
pub struct FileProgressStore {
  dir: PathBuf,
  // Serializes read-modify-write cycles within this process.
  update_lock: Mutex<()>,
}

impl FileProgressStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into(), update_lock: Mutex::new(()) }
  }

  fn path_for(&self, key: &str) -> Result<PathBuf, ProgressError> {
    if !is_slug(key) {
      return Err(ProgressError::InvalidKey(key.to_string()));
    }
    Ok(self.dir.join(format!("{}.json", key)))
  }
}

impl ProgressStore for FileProgressStore {
  #[instrument(level = "debug", skip(self))]
  fn read_raw(&self, key: &str) -> Result<Option<String>, ProgressError> {
    let path = self.path_for(key)?;
    match fs::read_to_string(&path) {
      Ok(s) => Ok(Some(s)),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }

  #[instrument(level = "debug", skip(self, value))]
  fn write_raw(&self, key: &str, value: &str) -> Result<(), ProgressError> {
    let path = self.path_for(key)?;
    fs::create_dir_all(&self.dir)?;
    fs::write(path, value)?;
    Ok(())
  }

  fn remove_raw(&self, key: &str) -> Result<(), ProgressError> {
    let path = self.path_for(key)?;
    let _guard = self.update_lock.lock().unwrap_or_else(|p| p.into_inner());
    match fs::remove_file(path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(e.into()),
    }
  }

  #[instrument(level = "debug", skip(self, change))]
  fn update(
    &self,
    module_id: &str,
    change: &mut dyn FnMut(&mut ProgressRecord),
  ) -> Result<ProgressRecord, ProgressError> {
    let _guard = self.update_lock.lock().unwrap_or_else(|p| p.into_inner());
    let mut record = self.load(module_id);
    change(&mut record);
    self.save(module_id, &record)?;
    Ok(record)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sample() -> ProgressRecord {
    ProgressRecord {
      version: RECORD_VERSION,
      unlocked_levels: [0, 1, 2].into_iter().collect(),
      completed_levels: [0, 1].into_iter().collect(),
      total_score: 135,
    }
  }

  fn temp_store() -> (FileProgressStore, PathBuf) {
    let dir = std::env::temp_dir().join(format!("learnplay-progress-{}", uuid::Uuid::new_v4()));
    (FileProgressStore::new(&dir), dir)
  }

  #[test]
  fn missing_record_loads_default() {
    let store = MemoryProgressStore::new();
    let rec = store.load("arithmetic");
    assert_eq!(rec, ProgressRecord::default());
    assert!(rec.unlocked_levels.is_empty());
    assert_eq!(rec.total_score, 0);
  }

  #[test]
  fn memory_round_trip() {
    let store = MemoryProgressStore::new();
    store.save("arithmetic", &sample()).unwrap();
    assert_eq!(store.load("arithmetic"), sample());
    assert_eq!(store.load("fractions"), ProgressRecord::default());
  }

  #[test]
  fn save_overwrites() {
    let store = MemoryProgressStore::new();
    store.save("m", &sample()).unwrap();
    let mut newer = sample();
    newer.total_score = 500;
    store.save("m", &newer).unwrap();
    assert_eq!(store.load("m").total_score, 500);
  }

  #[test]
  fn file_round_trip_and_reset() {
    let (store, dir) = temp_store();
    store.save("fractions", &sample()).unwrap();
    assert_eq!(store.load("fractions"), sample());
    store.reset("fractions").unwrap();
    assert_eq!(store.load("fractions"), ProgressRecord::default());
    store.reset("fractions").unwrap();
    fs::remove_dir_all(dir).ok();
  }

  #[test]
  fn json_uses_camel_case_arrays() {
    let json = serde_json::to_value(sample()).unwrap();
    assert_eq!(json["unlockedLevels"], serde_json::json!([0, 1, 2]));
    assert_eq!(json["completedLevels"], serde_json::json!([0, 1]));
    assert_eq!(json["totalScore"], 135);
    assert_eq!(json["version"], RECORD_VERSION);
  }

  #[test]
  fn corrupt_or_outdated_records_load_default() {
    let store = MemoryProgressStore::new();
    store.write_raw("a", "{not json").unwrap();
    assert_eq!(store.load("a"), ProgressRecord::default());

    store
      .write_raw("b", r#"{"version":0,"unlockedLevels":[0,1],"completedLevels":[0],"totalScore":10}"#)
      .unwrap();
    assert_eq!(store.load("b"), ProgressRecord::default());
  }

  #[test]
  fn file_store_rejects_path_like_keys() {
    let (store, _dir) = temp_store();
    assert!(matches!(store.save("../escape", &sample()), Err(ProgressError::InvalidKey(_))));
    assert_eq!(store.load("../escape"), ProgressRecord::default());
  }

  #[test]
  fn update_folds_into_current_record() {
    let store = MemoryProgressStore::new();
    store.save("m", &sample()).unwrap();
    let saved = store
      .update("m", &mut |rec| {
        rec.total_score += 10;
        rec.completed_levels.insert(2);
      })
      .unwrap();
    assert_eq!(saved.total_score, 145);
    assert_eq!(store.load("m"), saved);
    assert!(store.load("m").is_completed(2));
  }

  #[test]
  fn update_after_reset_starts_from_default() {
    let (store, dir) = temp_store();
    store.save("algebra", &sample()).unwrap();
    store.reset("algebra").unwrap();
    let saved = store.update("algebra", &mut |rec| rec.total_score += 5).unwrap();
    assert_eq!(saved.total_score, 5);
    assert!(saved.completed_levels.is_empty());
    assert_eq!(store.load("algebra"), saved);
    fs::remove_dir_all(dir).ok();
  }

  #[test]
  fn policies_open_expected_levels() {
    let mut rec = ProgressRecord::default();
    rec.apply_policy(UnlockPolicy::Progressive, 3);
    assert_eq!(rec.unlocked_levels, [0].into_iter().collect());

    let mut rec = ProgressRecord::default();
    rec.apply_policy(UnlockPolicy::AllUnlocked, 3);
    assert_eq!(rec.unlocked_levels, [0, 1, 2].into_iter().collect());

    let mut rec = sample();
    rec.apply_policy(UnlockPolicy::Progressive, 3);
    assert!(rec.is_unlocked(2));
  }
}
