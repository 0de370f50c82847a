//! One player session: a runner, its feedback queue, and the pending
//! auto-advance timer. Disposing the session cancels the timer before the
//! runner is marked disposed, so a late timer can never move the runner.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::catalog::ContentCatalog;
use crate::config::{Messages, Rules};
use crate::domain::{AttemptResult, Candidate};
use crate::notify::{CoreEvent, EventBuffer};
use crate::progress::ProgressStore;
use crate::runner::{Advance, Continuation, ExerciseRunner, NavigationIntent, Phase, RunnerContext, RunnerError, RunnerView};
use crate::scheduler::ScheduledTask;

/// Pushed to a subscriber when the timer advances the runner.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceNotice {
    pub session_id: String,
    pub advance: Advance,
    pub view: RunnerView,
    pub events: Vec<CoreEvent>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    pub result: AttemptResult,
    pub view: RunnerView,
    pub events: Vec<CoreEvent>,
    /// Milliseconds until the automatic advance, if one is scheduled.
    pub auto_advance_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome<T> {
    pub step: T,
    pub view: RunnerView,
    pub events: Vec<CoreEvent>,
}

pub struct Session {
    id: String,
    runner: Arc<Mutex<ExerciseRunner>>,
    events: Arc<EventBuffer>,
    timer: Mutex<Option<ScheduledTask>>,
    listener: Arc<Mutex<Option<UnboundedSender<AdvanceNotice>>>>,
    auto_advance: Option<Duration>,
    last_touched: Mutex<Instant>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Session {
    pub fn start(
        id: String,
        catalog: &ContentCatalog,
        module_id: &str,
        level_id: &str,
        store: Arc<dyn ProgressStore>,
        rules: Rules,
        messages: Messages,
    ) -> Result<Self, RunnerError> {
        let events = Arc::new(EventBuffer::new());
        let auto_advance = rules.auto_advance();
        let ctx = RunnerContext { store, sink: events.clone(), rules, messages };
        let runner = ExerciseRunner::start(catalog, module_id, level_id, ctx)?;
        Ok(Self {
            id,
            runner: Arc::new(Mutex::new(runner)),
            events,
            timer: Mutex::new(None),
            listener: Arc::new(Mutex::new(None)),
            auto_advance,
            last_touched: Mutex::new(Instant::now()),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Mark the session as in use by a client.
    pub fn touch(&self) {
        *lock(&self.last_touched) = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        lock(&self.last_touched).elapsed()
    }

    /// An open socket is listening for timer-driven advances.
    pub fn is_attached(&self) -> bool {
        lock(&self.listener).as_ref().is_some_and(|tx| !tx.is_closed())
    }

    /// Receive timer-driven advances. Replaces any previous subscriber.
    pub fn subscribe(&self, tx: UnboundedSender<AdvanceNotice>) {
        *lock(&self.listener) = Some(tx);
    }

    pub fn view(&self) -> RunnerView {
        lock(&self.runner).view()
    }

    pub fn select(&self, candidate: Candidate) -> Result<RunnerView, RunnerError> {
        let mut runner = lock(&self.runner);
        runner.select_answer(candidate)?;
        Ok(runner.view())
    }

    /// Grade the selection and, when configured, schedule the advance.
    #[instrument(level = "info", skip(self), fields(session = %self.id))]
    pub fn submit(&self) -> Result<SubmitOutcome, RunnerError> {
        let mut runner = lock(&self.runner);
        let result = match runner.submit_answer() {
            Ok(r) => r,
            Err(e) => {
                self.events.drain();
                return Err(e);
            }
        };
        let view = runner.view();
        let index = runner.exercise_index();
        drop(runner);

        let auto_advance_ms = match (self.auto_advance, index) {
            (Some(delay), Some(index)) => {
                self.schedule_advance(delay, index);
                Some(u64::try_from(delay.as_millis()).unwrap_or(u64::MAX))
            }
            _ => None,
        };
        Ok(SubmitOutcome { result, view, events: self.events.drain(), auto_advance_ms })
    }

    fn schedule_advance(&self, delay: Duration, index: usize) {
        let runner = Arc::clone(&self.runner);
        let events = Arc::clone(&self.events);
        let listener = Arc::clone(&self.listener);
        let session_id = self.id.clone();
        let task = ScheduledTask::schedule(delay, move || {
            let mut r = lock(&runner);
            if r.is_disposed() || r.phase() != Phase::Grading || r.exercise_index() != Some(index) {
                return;
            }
            match r.advance() {
                Ok(advance) => {
                    debug!(target: "runner", session = %session_id, "Auto-advanced");
                    let notice = AdvanceNotice {
                        session_id: session_id.clone(),
                        advance,
                        view: r.view(),
                        events: events.drain(),
                    };
                    drop(r);
                    if let Some(tx) = lock(&listener).as_ref() {
                        let _ = tx.send(notice);
                    }
                }
                Err(e) => warn!(target: "runner", session = %session_id, error = %e, "Auto-advance failed"),
            }
        });
        // Replacing the slot drops (and so cancels) any older timer.
        *lock(&self.timer) = Some(task);
    }

    fn cancel_timer(&self) {
        if let Some(mut task) = lock(&self.timer).take() {
            task.cancel();
        }
    }

    /// Manual advance; cancels the pending timer.
    pub fn advance(&self) -> Result<StepOutcome<Advance>, RunnerError> {
        self.cancel_timer();
        let mut runner = lock(&self.runner);
        let step = runner.advance()?;
        Ok(StepOutcome { step, view: runner.view(), events: self.events.drain() })
    }

    pub fn continue_to_next_level(&self) -> Result<StepOutcome<Continuation>, RunnerError> {
        self.cancel_timer();
        let mut runner = lock(&self.runner);
        let step = runner.continue_to_next_level()?;
        Ok(StepOutcome { step, view: runner.view(), events: self.events.drain() })
    }

    pub fn restart(&self) -> Result<RunnerView, RunnerError> {
        self.cancel_timer();
        let mut runner = lock(&self.runner);
        runner.restart_level()?;
        Ok(runner.view())
    }

    pub fn explanation(&self, index: usize) -> Result<String, RunnerError> {
        lock(&self.runner).explanation(index).map(str::to_string)
    }

    /// Cancel the timer, then dispose the runner.
    pub fn dispose(&self) -> NavigationIntent {
        self.cancel_timer();
        *lock(&self.listener) = None;
        lock(&self.runner).dispose()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
