//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Catalog listing and per-module progress views
//!   - Opening, driving and closing exercise sessions
//!   - Explicit progress reset
//!   - Mapping core errors to transport-neutral `ApiError`s

use std::sync::Arc;

use tracing::{info, instrument};

use crate::catalog::CatalogError;
use crate::domain::Candidate;
use crate::progress::{ProgressError, ProgressRecord};
use crate::protocol::{module_detail, module_summary, ModuleDetailOut, ModuleSummaryOut, SessionOut};
use crate::runner::{Advance, Continuation, NavigationIntent, RunnerError, RunnerView};
use crate::session::{Session, StepOutcome, SubmitOutcome};
use crate::state::AppState;

/// Errors as the transports see them. The message is always user-facing.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  #[error("{0}")]
  NotFound(String),
  /// The request is fine but the session is in the wrong phase for it.
  #[error("{0}")]
  Conflict(String),
  /// The request itself is unusable (no selection, wrong answer shape, bad index).
  #[error("{0}")]
  Invalid(String),
  #[error("{0}")]
  Storage(String),
}

impl From<RunnerError> for ApiError {
  fn from(e: RunnerError) -> Self {
    let message = e.to_string();
    match e {
      RunnerError::NoSelection { .. }
      | RunnerError::AnswerShape(_)
      | RunnerError::OptionOutOfRange { .. }
      | RunnerError::InvalidExerciseIndex { .. } => ApiError::Invalid(message),
      RunnerError::NotPresenting
      | RunnerError::NotGrading
      | RunnerError::LevelLocked { .. }
      | RunnerError::LevelInProgress
      | RunnerError::Disposed => ApiError::Conflict(message),
      RunnerError::Catalog(inner) => inner.into(),
    }
  }
}

impl From<CatalogError> for ApiError {
  fn from(e: CatalogError) -> Self {
    match e {
      CatalogError::ModuleNotFound(_) | CatalogError::LevelNotFound { .. } => ApiError::NotFound(e.to_string()),
      other => ApiError::Invalid(other.to_string()),
    }
  }
}

impl From<ProgressError> for ApiError {
  fn from(e: ProgressError) -> Self {
    ApiError::Storage(e.to_string())
  }
}

pub fn list_catalog(state: &AppState) -> Vec<ModuleSummaryOut> {
  state.catalog.modules().map(module_summary).collect()
}

#[instrument(level = "info", skip(state))]
pub fn get_module_detail(state: &AppState, module_id: &str) -> Result<ModuleDetailOut, ApiError> {
  let module = state.catalog.get_module(module_id)?;
  let progress = state.module_progress(module_id)?;
  Ok(module_detail(module, &progress))
}

#[instrument(level = "info", skip(state))]
pub fn get_progress(state: &AppState, module_id: &str) -> Result<ProgressRecord, ApiError> {
  Ok(state.module_progress(module_id)?)
}

/// Forget all stored progress for a module; returns the fresh record.
#[instrument(level = "info", skip(state))]
pub fn reset_progress(state: &AppState, module_id: &str) -> Result<ProgressRecord, ApiError> {
  state.catalog.get_module(module_id)?;
  state.store.reset(module_id)?;
  info!(target: "progress", %module_id, "Progress reset");
  Ok(state.module_progress(module_id)?)
}

#[instrument(level = "info", skip(state))]
pub async fn start_session(state: &AppState, module_id: &str, level_id: &str) -> Result<SessionOut, ApiError> {
  let session = state.open_session(module_id, level_id).await?;
  Ok(SessionOut { session_id: session.id().to_string(), view: session.view() })
}

pub async fn find_session(state: &AppState, session_id: &str) -> Result<Arc<Session>, ApiError> {
  state
    .get_session(session_id)
    .await
    .ok_or_else(|| ApiError::NotFound(format!("Session '{}' not found", session_id)))
}

pub async fn session_view(state: &AppState, session_id: &str) -> Result<RunnerView, ApiError> {
  Ok(find_session(state, session_id).await?.view())
}

#[instrument(level = "info", skip(state, answer), fields(%session_id, selection = %answer))]
pub async fn select_answer(state: &AppState, session_id: &str, answer: Candidate) -> Result<RunnerView, ApiError> {
  Ok(find_session(state, session_id).await?.select(answer)?)
}

#[instrument(level = "info", skip(state))]
pub async fn submit_answer(state: &AppState, session_id: &str) -> Result<SubmitOutcome, ApiError> {
  let outcome = find_session(state, session_id).await?.submit()?;
  info!(
    target: "learnplay",
    %session_id,
    exercise = %outcome.result.exercise_id,
    correct = outcome.result.is_correct,
    points = outcome.result.points_awarded,
    "Answer submitted"
  );
  Ok(outcome)
}

pub async fn advance(state: &AppState, session_id: &str) -> Result<StepOutcome<Advance>, ApiError> {
  Ok(find_session(state, session_id).await?.advance()?)
}

pub async fn continue_level(state: &AppState, session_id: &str) -> Result<StepOutcome<Continuation>, ApiError> {
  Ok(find_session(state, session_id).await?.continue_to_next_level()?)
}

pub async fn restart_level(state: &AppState, session_id: &str) -> Result<RunnerView, ApiError> {
  Ok(find_session(state, session_id).await?.restart()?)
}

pub async fn explanation(state: &AppState, session_id: &str, index: usize) -> Result<String, ApiError> {
  Ok(find_session(state, session_id).await?.explanation(index)?)
}

/// Dispose the session and tell the client where to go.
#[instrument(level = "info", skip(state))]
pub async fn exit_session(state: &AppState, session_id: &str) -> Result<NavigationIntent, ApiError> {
  if state.close_session(session_id).await {
    Ok(NavigationIntent::ReturnToCatalog)
  } else {
    Err(ApiError::NotFound(format!("Session '{}' not found", session_id)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::ContentCatalog;
  use crate::config::AppConfig;
  use crate::progress::MemoryProgressStore;
  use crate::runner::Phase;

  fn state() -> AppState {
    let mut config = AppConfig::default();
    config.rules.auto_advance_ms = 0;
    let catalog = ContentCatalog::new(crate::seeds::builtin_modules()).unwrap();
    AppState::from_parts(config, catalog, Arc::new(MemoryProgressStore::new()))
  }

  #[tokio::test]
  async fn full_level_updates_module_detail() {
    let st = state();
    let detail = get_module_detail(&st, "geometry").unwrap();
    assert!(detail.levels[0].unlocked);
    assert!(!detail.levels[1].unlocked);

    let opened = start_session(&st, "geometry", "shapes").await.unwrap();
    let id = opened.session_id;
    for answer in [
      Candidate::Choice(1),
      Candidate::Text("Square".into()),
      Candidate::Choices([0].into_iter().collect()),
    ] {
      select_answer(&st, &id, answer).await.unwrap();
      assert!(submit_answer(&st, &id).await.unwrap().result.is_correct);
      advance(&st, &id).await.unwrap();
    }
    assert_eq!(session_view(&st, &id).await.unwrap().phase, Phase::LevelComplete);

    let detail = get_module_detail(&st, "geometry").unwrap();
    assert!(detail.levels[0].completed);
    assert!(detail.levels[1].unlocked);
    assert_eq!(detail.total_score, 30);

    let step = continue_level(&st, &id).await.unwrap();
    assert_eq!(step.step, Continuation::NextLevel { level_id: "solids".into() });
  }

  #[tokio::test]
  async fn errors_map_to_categories() {
    let st = state();
    assert!(matches!(start_session(&st, "nope", "x").await, Err(ApiError::NotFound(_))));
    assert!(matches!(start_session(&st, "geometry", "solids").await, Err(ApiError::Conflict(_))));

    let id = start_session(&st, "geometry", "shapes").await.unwrap().session_id;
    assert!(matches!(submit_answer(&st, &id).await, Err(ApiError::Invalid(_))));
    assert!(matches!(advance(&st, &id).await, Err(ApiError::Conflict(_))));
    assert!(matches!(explanation(&st, &id, 99).await, Err(ApiError::Invalid(_))));
    assert!(matches!(session_view(&st, "missing").await, Err(ApiError::NotFound(_))));
  }

  #[tokio::test]
  async fn exit_removes_session() {
    let st = state();
    let id = start_session(&st, "phonics", "sounds").await.unwrap().session_id;
    assert_eq!(exit_session(&st, &id).await.unwrap(), NavigationIntent::ReturnToCatalog);
    assert!(matches!(exit_session(&st, &id).await, Err(ApiError::NotFound(_))));
  }

  #[tokio::test]
  async fn reset_clears_progress() {
    let st = state();
    let id = start_session(&st, "algebra", "patterns").await;
    assert!(id.is_err());

    let mut rec = st.store.load("algebra");
    rec.unlocked_levels.insert(1);
    rec.total_score = 40;
    st.store.save("algebra", &rec).unwrap();
    assert_eq!(get_progress(&st, "algebra").unwrap().total_score, 40);

    let fresh = reset_progress(&st, "algebra").unwrap();
    assert_eq!(fresh.total_score, 0);
    assert!(!fresh.is_unlocked(1));
    assert!(fresh.is_unlocked(0));
  }
}
