//! Application state: the catalog, progress store, rules, and live sessions.
//!
//! This module owns:
//!   - the validated content catalog (built once at startup)
//!   - the progress store (JSON files or in-memory)
//!   - the config (rules + feedback messages)
//!   - the session table, keyed by session id, and the sweep that evicts
//!     sessions no client has touched for a while

use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::RwLock, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::catalog::{CatalogError, ContentCatalog};
use crate::config::{load_app_config_from_env, AppConfig};
use crate::progress::{FileProgressStore, MemoryProgressStore, ProgressRecord, ProgressStore};
use crate::runner::RunnerError;
use crate::seeds::builtin_modules;
use crate::session::Session;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<ContentCatalog>,
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn ProgressStore>,
    pub sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
}

impl AppState {
    /// Build state from env: load config, build and validate the catalog, pick a store.
    /// A broken catalog is fatal here, never mid-session.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Result<Self, CatalogError> {
        let config = load_app_config_from_env();
        let catalog = ContentCatalog::load(builtin_modules(), config.catalog_path.as_deref())?;

        let store: Arc<dyn ProgressStore> = match &config.progress_dir {
            Some(dir) => {
                info!(target: "learnplay", dir = %dir.display(), "Progress stored as JSON files");
                Arc::new(FileProgressStore::new(dir))
            }
            None => {
                info!(target: "learnplay", "Progress kept in memory (no PROGRESS_DIR)");
                Arc::new(MemoryProgressStore::new())
            }
        };
        info!(
            target: "learnplay",
            pass_threshold = config.rules.pass_threshold_percent,
            level_bonus = config.rules.level_bonus,
            auto_advance_ms = config.rules.auto_advance_ms,
            unlock_policy = ?config.rules.unlock_policy,
            "Rules loaded"
        );
        Ok(Self::from_parts(config, catalog, store))
    }

    pub fn from_parts(config: AppConfig, catalog: ContentCatalog, store: Arc<dyn ProgressStore>) -> Self {
        Self {
            catalog: Arc::new(catalog),
            config: Arc::new(config),
            store,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Start a runner for `level_id` and register it under a fresh id.
    #[instrument(level = "info", skip(self))]
    pub async fn open_session(&self, module_id: &str, level_id: &str) -> Result<Arc<Session>, RunnerError> {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(Session::start(
            id.clone(),
            &self.catalog,
            module_id,
            level_id,
            self.store.clone(),
            self.config.rules.clone(),
            self.config.messages.clone(),
        )?);
        self.sessions.write().await.insert(id.clone(), session.clone());
        info!(target: "learnplay", session = %id, %module_id, %level_id, "Session opened");
        Ok(session)
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn get_session(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(id).cloned()?;
        session.touch();
        Some(session)
    }

    /// Remove and dispose a session. Returns false if it did not exist.
    pub async fn close_session(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id);
        match removed {
            Some(session) => {
                session.dispose();
                info!(target: "learnplay", session = %id, "Session closed");
                true
            }
            None => false,
        }
    }

    /// Dispose and drop sessions idle for at least `max_idle`. Sessions with an
    /// open socket are left to the socket's own close handling.
    pub async fn evict_idle_sessions(&self, max_idle: Duration) -> usize {
        let evicted: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().await;
            let stale: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| !s.is_attached() && s.idle_for() >= max_idle)
                .map(|(id, _)| id.clone())
                .collect();
            stale.iter().filter_map(|id| sessions.remove(id)).collect()
        };
        for session in &evicted {
            session.dispose();
            info!(target: "learnplay", session = %session.id(), "Idle session evicted");
        }
        evicted.len()
    }

    /// Stored progress with the unlock policy applied, as a level picker shows it.
    pub fn module_progress(&self, module_id: &str) -> Result<ProgressRecord, CatalogError> {
        let module = self.catalog.get_module(module_id)?;
        let mut record = self.store.load(module_id);
        record.apply_policy(self.config.rules.unlock_policy, module.levels.len());
        Ok(record)
    }
}

/// Periodically evict idle sessions. `None` when the idle timeout is disabled.
pub fn spawn_session_sweeper(state: Arc<AppState>) -> Option<JoinHandle<()>> {
    let limits = state.config.sessions.clone();
    let max_idle = limits.idle_timeout()?;
    let every = limits.sweep_interval();
    info!(target: "learnplay", idle_timeout_secs = max_idle.as_secs(), sweep_secs = every.as_secs(), "Session sweeper started");
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let evicted = state.evict_idle_sessions(max_idle).await;
            if evicted > 0 {
                debug!(target: "learnplay", evicted, "Session sweep");
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionLimits;
    use crate::runner::Phase;

    fn state(idle_timeout_secs: u64) -> Arc<AppState> {
        let config = AppConfig {
            sessions: SessionLimits { idle_timeout_secs, sweep_interval_secs: 10 },
            ..AppConfig::default()
        };
        let catalog = ContentCatalog::new(builtin_modules()).unwrap();
        Arc::new(AppState::from_parts(config, catalog, Arc::new(MemoryProgressStore::new())))
    }

    #[tokio::test(start_paused = true)]
    async fn idle_sessions_are_evicted_and_disposed() {
        let st = state(60);
        let idle = st.open_session("arithmetic", "addition").await.unwrap();
        let busy = st.open_session("arithmetic", "addition").await.unwrap();

        tokio::time::advance(Duration::from_secs(45)).await;
        assert!(st.get_session(busy.id()).await.is_some());
        tokio::time::advance(Duration::from_secs(20)).await;

        assert_eq!(st.evict_idle_sessions(Duration::from_secs(60)).await, 1);
        assert!(st.get_session(idle.id()).await.is_none());
        assert!(st.get_session(busy.id()).await.is_some());
        assert!(matches!(idle.advance(), Err(RunnerError::Disposed)));
        assert_eq!(busy.view().phase, Phase::Presenting);
    }

    #[tokio::test(start_paused = true)]
    async fn socket_attached_sessions_survive_sweeps() {
        let st = state(60);
        let s = st.open_session("arithmetic", "addition").await.unwrap();
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        s.subscribe(tx);
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(st.evict_idle_sessions(Duration::from_secs(60)).await, 0);
        assert!(st.get_session(s.id()).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_task_clears_abandoned_sessions() {
        let st = state(60);
        let s = st.open_session("arithmetic", "addition").await.unwrap();
        let sweeper = spawn_session_sweeper(st.clone()).expect("sweeper enabled");

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert!(st.sessions.read().await.is_empty());
        assert!(matches!(s.advance(), Err(RunnerError::Disposed)));
        sweeper.abort();
    }

    #[test]
    fn zero_timeout_disables_sweeper() {
        assert!(spawn_session_sweeper(state(0)).is_none());
    }
}
