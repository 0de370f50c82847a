//! The exercise runner: one level run as a small state machine.
//!
//! ```text
//! Presenting(0) --submit--> Grading(0) --advance--> Presenting(1) ... Grading(n-1)
//!     --advance--> LevelComplete --continue--> Presenting(0) of the next level
//!                                          \-> ModuleComplete | Idle (navigate back)
//! ```
//!
//! Every call runs to completion synchronously. Timers live outside (see
//! `scheduler`); the runner only guarantees that nothing mutates it once it has
//! been disposed.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, instrument};

use crate::catalog::{CatalogError, ContentCatalog};
use crate::config::{Messages, Rules};
use crate::domain::{AttemptResult, Candidate, Difficulty, Exercise, Grading, Level, LevelSummary, Module};
use crate::grading::{self, ShapeMismatch};
use crate::notify::{CoreEvent, NotificationSink};
use crate::progress::{ProgressRecord, ProgressStore};
use crate::util::{fill_template, word_count};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("{message}")]
    NoSelection { message: String },

    #[error(transparent)]
    AnswerShape(#[from] ShapeMismatch),

    #[error("Option {index} does not exist (this exercise has {count} options).")]
    OptionOutOfRange { index: usize, count: usize },

    #[error("No exercise is waiting for an answer right now.")]
    NotPresenting,

    #[error("There is no graded answer to move on from.")]
    NotGrading,

    #[error("Exercise {index} does not exist (this level has {len} exercises).")]
    InvalidExerciseIndex { index: usize, len: usize },

    #[error("Level '{level_id}' is locked. Finish the previous level first.")]
    LevelLocked { level_id: String },

    #[error("This level is not finished yet.")]
    LevelInProgress,

    #[error("This session has ended.")]
    Disposed,

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Where the hosting UI should go next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationIntent {
    ReturnToCatalog,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Advance {
    Next { index: usize },
    LevelComplete { summary: LevelSummary },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Continuation {
    NextLevel {
        #[serde(rename = "levelId")]
        level_id: String,
    },
    Navigate {
        intent: NavigationIntent,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Presenting,
    Grading,
    LevelComplete,
    ModuleComplete,
}

#[derive(Clone, Debug)]
enum RunnerState {
    Idle,
    Presenting { index: usize },
    Grading { index: usize },
    LevelComplete { summary: LevelSummary },
    ModuleComplete,
}

/// Collaborators and settings injected into every runner.
#[derive(Clone)]
pub struct RunnerContext {
    pub store: Arc<dyn ProgressStore>,
    pub sink: Arc<dyn NotificationSink>,
    pub rules: Rules,
    pub messages: Messages,
}

/// Exercise as shown to the player: no answer key.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseView {
    pub id: String,
    pub prompt: String,
    pub kind: &'static str,
    pub options: Vec<String>,
    pub points: u32,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_words: Option<usize>,
}

/// Immutable snapshot for rendering.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerView {
    pub module_id: String,
    pub level_id: String,
    pub level_name: String,
    pub level_index: usize,
    pub phase: Phase,
    pub exercise_index: Option<usize>,
    pub total_exercises: usize,
    pub exercise: Option<ExerciseView>,
    pub selection: Option<Candidate>,
    pub last_result: Option<AttemptResult>,
    /// Shown after an incorrect answer.
    pub explanation: Option<String>,
    pub score: u32,
    pub streak: u32,
    pub correct_count: usize,
    /// Graded exercises / total, in `0.0..=1.0`.
    pub progress: f32,
    pub summary: Option<LevelSummary>,
}

pub struct ExerciseRunner {
    ctx: RunnerContext,
    module: Arc<Module>,
    level_index: usize,
    state: RunnerState,
    pending: Option<Candidate>,
    last_result: Option<AttemptResult>,
    score: u32,
    streak: u32,
    best_streak: u32,
    correct_count: usize,
    graded_count: usize,
    progress: ProgressRecord,
    disposed: bool,
}

impl ExerciseRunner {
    /// Load progress for the module and present the first exercise of `level_id`.
    #[instrument(level = "info", skip(catalog, ctx))]
    pub fn start(
        catalog: &ContentCatalog,
        module_id: &str,
        level_id: &str,
        ctx: RunnerContext,
    ) -> Result<Self, RunnerError> {
        let module = Arc::new(catalog.get_module(module_id)?.clone());
        let (level_index, _) = catalog.locate_level(module_id, level_id)?;

        let mut progress = ctx.store.load(module_id);
        progress.apply_policy(ctx.rules.unlock_policy, module.levels.len());

        let mut runner = Self {
            ctx,
            module,
            level_index,
            state: RunnerState::Idle,
            pending: None,
            last_result: None,
            score: 0,
            streak: 0,
            best_streak: 0,
            correct_count: 0,
            graded_count: 0,
            progress,
            disposed: false,
        };
        runner.begin_level(level_index)?;
        Ok(runner)
    }

    fn begin_level(&mut self, level_index: usize) -> Result<(), RunnerError> {
        let level_id = self.module.levels[level_index].id.clone();
        if !self.progress.is_unlocked(level_index) {
            return Err(RunnerError::LevelLocked { level_id });
        }
        self.level_index = level_index;
        self.state = RunnerState::Presenting { index: 0 };
        self.pending = None;
        self.last_result = None;
        self.score = 0;
        self.streak = 0;
        self.best_streak = 0;
        self.correct_count = 0;
        self.graded_count = 0;
        info!(target: "runner", module = %self.module.id, level = %level_id, "Level started");
        Ok(())
    }

    fn level(&self) -> &Level {
        &self.module.levels[self.level_index]
    }

    fn ensure_live(&self) -> Result<(), RunnerError> {
        if self.disposed {
            Err(RunnerError::Disposed)
        } else {
            Ok(())
        }
    }

    fn presenting_index(&self) -> Result<usize, RunnerError> {
        match self.state {
            RunnerState::Presenting { index } => Ok(index),
            _ => Err(RunnerError::NotPresenting),
        }
    }

    /// Store the pending answer. Replaces any earlier selection; an empty
    /// candidate clears it.
    pub fn select_answer(&mut self, candidate: Candidate) -> Result<(), RunnerError> {
        self.ensure_live()?;
        let index = self.presenting_index()?;
        let exercise = &self.level().exercises[index];
        if !grading::fits(&exercise.grading, &candidate) {
            return Err(ShapeMismatch { kind: exercise.grading.kind_name() }.into());
        }
        check_option_range(exercise, &candidate)?;

        debug!(target: "runner", exercise = %exercise.id, selection = %candidate, "Answer selected");
        self.pending = if candidate.is_empty() { None } else { Some(candidate) };
        Ok(())
    }

    /// Grade the pending answer and move to `Grading`.
    #[instrument(level = "info", skip(self), fields(module = %self.module.id, level_index = self.level_index))]
    pub fn submit_answer(&mut self) -> Result<AttemptResult, RunnerError> {
        self.ensure_live()?;
        let index = self.presenting_index()?;
        let Some(selected) = self.pending.take() else {
            let message = self.ctx.messages.no_selection.clone();
            self.ctx.sink.notify(CoreEvent::ValidationFailed { reason: message.clone() });
            return Err(RunnerError::NoSelection { message });
        };

        let exercise = &self.module.levels[self.level_index].exercises[index];
        let is_correct = grading::grade(&exercise.grading, &selected)?;
        let points_awarded = if is_correct {
            self.ctx.rules.points_for(exercise.points, self.level_index)
        } else {
            0
        };
        let message = self.feedback_message(exercise, &selected, is_correct, points_awarded);

        self.graded_count += 1;
        if is_correct {
            self.score = self.score.saturating_add(points_awarded);
            self.streak += 1;
            self.best_streak = self.best_streak.max(self.streak);
            self.correct_count += 1;
        } else {
            self.streak = 0;
        }

        let result = AttemptResult {
            exercise_id: exercise.id.clone(),
            selected,
            is_correct,
            points_awarded,
        };
        self.ctx.sink.notify(CoreEvent::AttemptGraded {
            exercise_id: result.exercise_id.clone(),
            is_correct,
            points: points_awarded,
            message,
        });
        self.last_result = Some(result.clone());
        self.state = RunnerState::Grading { index };
        Ok(result)
    }

    fn feedback_message(&self, exercise: &Exercise, selected: &Candidate, is_correct: bool, points: u32) -> String {
        let msgs = &self.ctx.messages;
        if is_correct {
            return fill_template(msgs.pick_praise(), &[("points", &points.to_string())]);
        }
        match (&exercise.grading, selected) {
            (Grading::MinLengthCreative { min_words }, Candidate::Text(text)) => fill_template(
                &msgs.creative_too_short_template,
                &[("min_words", &min_words.to_string()), ("words", &word_count(text).to_string())],
            ),
            _ => fill_template(&msgs.incorrect_template, &[("explanation", &exercise.explanation)])
                .trim()
                .to_string(),
        }
    }

    /// Leave `Grading`: next exercise, or finish the level after the last one.
    pub fn advance(&mut self) -> Result<Advance, RunnerError> {
        self.ensure_live()?;
        let index = match self.state {
            RunnerState::Grading { index } => index,
            _ => return Err(RunnerError::NotGrading),
        };
        if index + 1 < self.level().exercises.len() {
            self.state = RunnerState::Presenting { index: index + 1 };
            self.pending = None;
            debug!(target: "runner", next = index + 1, "Advanced");
            Ok(Advance::Next { index: index + 1 })
        } else {
            let summary = self.complete_level()?;
            Ok(Advance::LevelComplete { summary })
        }
    }

    /// Finish the level: record completion and score, unlock the next level
    /// when the pass threshold is met. Only valid once every exercise is graded;
    /// calling it again returns the same summary.
    #[instrument(level = "info", skip(self), fields(module = %self.module.id, level_index = self.level_index))]
    pub fn complete_level(&mut self) -> Result<LevelSummary, RunnerError> {
        self.ensure_live()?;
        if let RunnerState::LevelComplete { summary } = &self.state {
            return Ok(summary.clone());
        }
        let total = self.level().exercises.len();
        let all_graded = matches!(self.state, RunnerState::Grading { index } if index + 1 == total);
        if !all_graded {
            return Err(RunnerError::LevelInProgress);
        }

        let accuracy_percent = self.correct_count as f64 * 100.0 / total as f64;
        let passed = self.ctx.rules.passes(self.correct_count, total);
        let next = self.level_index + 1;
        let unlocked_next = passed && next < self.module.levels.len();

        // Merge into what is stored now; other sessions or a reset may have
        // changed it since this level started. Policy unlocks stay in memory.
        let (level_index, score) = (self.level_index, u64::from(self.score));
        let mut change = |rec: &mut ProgressRecord| {
            rec.completed_levels.insert(level_index);
            rec.total_score = rec.total_score.saturating_add(score);
            if unlocked_next {
                rec.unlocked_levels.insert(next);
            }
        };
        let mut view = match self.ctx.store.update(&self.module.id, &mut change) {
            Ok(saved) => saved,
            Err(e) => {
                error!(target: "progress", module = %self.module.id, error = %e, "Failed to save progress; continuing");
                let mut local = self.progress.clone();
                change(&mut local);
                local
            }
        };
        view.apply_policy(self.ctx.rules.unlock_policy, self.module.levels.len());
        self.progress = view;

        let summary = LevelSummary {
            module_id: self.module.id.clone(),
            level_id: self.level().id.clone(),
            level_index: self.level_index,
            score: self.score,
            correct_count: self.correct_count,
            total_exercises: total,
            accuracy_percent,
            best_streak: self.best_streak,
            passed,
            unlocked_next,
        };

        let msgs = &self.ctx.messages;
        let mut message = fill_template(
            &msgs.level_complete_template,
            &[
                ("score", &summary.score.to_string()),
                ("correct", &summary.correct_count.to_string()),
                ("total", &total.to_string()),
                ("accuracy", &format!("{:.0}", accuracy_percent)),
            ],
        );
        if unlocked_next {
            message.push(' ');
            message.push_str(&msgs.next_level_unlocked);
        }
        self.ctx.sink.notify(CoreEvent::LevelCompleted { summary: summary.clone(), message });
        self.state = RunnerState::LevelComplete { summary: summary.clone() };
        Ok(summary)
    }

    /// From `LevelComplete`: start the next level if it is open, otherwise hand
    /// control back to the catalog.
    pub fn continue_to_next_level(&mut self) -> Result<Continuation, RunnerError> {
        self.ensure_live()?;
        if !matches!(self.state, RunnerState::LevelComplete { .. }) {
            return Err(RunnerError::LevelInProgress);
        }
        let next = self.level_index + 1;
        if next >= self.module.levels.len() {
            info!(target: "runner", module = %self.module.id, "Module complete");
            self.state = RunnerState::ModuleComplete;
            return Ok(Continuation::Navigate { intent: NavigationIntent::ReturnToCatalog });
        }
        if !self.progress.is_unlocked(next) {
            self.state = RunnerState::Idle;
            return Ok(Continuation::Navigate { intent: NavigationIntent::ReturnToCatalog });
        }
        self.begin_level(next)?;
        Ok(Continuation::NextLevel { level_id: self.level().id.clone() })
    }

    /// Replay the current level from its first exercise.
    pub fn restart_level(&mut self) -> Result<(), RunnerError> {
        self.ensure_live()?;
        self.begin_level(self.level_index)
    }

    /// Help text for any exercise of the current level.
    pub fn explanation(&self, index: usize) -> Result<&str, RunnerError> {
        let exercises = &self.level().exercises;
        exercises
            .get(index)
            .map(|e| e.explanation.as_str())
            .ok_or(RunnerError::InvalidExerciseIndex { index, len: exercises.len() })
    }

    /// End the session. Every later call fails with `Disposed`.
    pub fn dispose(&mut self) -> NavigationIntent {
        if !self.disposed {
            info!(target: "runner", module = %self.module.id, level_index = self.level_index, "Runner disposed");
        }
        self.disposed = true;
        self.state = RunnerState::Idle;
        self.pending = None;
        NavigationIntent::ReturnToCatalog
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn phase(&self) -> Phase {
        match self.state {
            RunnerState::Idle => Phase::Idle,
            RunnerState::Presenting { .. } => Phase::Presenting,
            RunnerState::Grading { .. } => Phase::Grading,
            RunnerState::LevelComplete { .. } => Phase::LevelComplete,
            RunnerState::ModuleComplete => Phase::ModuleComplete,
        }
    }

    /// Index of the exercise on screen (presented or just graded).
    pub fn exercise_index(&self) -> Option<usize> {
        match self.state {
            RunnerState::Presenting { index } | RunnerState::Grading { index } => Some(index),
            _ => None,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn correct_count(&self) -> usize {
        self.correct_count
    }

    pub fn progress_record(&self) -> &ProgressRecord {
        &self.progress
    }

    pub fn view(&self) -> RunnerView {
        let level = self.level();
        let exercise_index = self.exercise_index();
        let exercise = exercise_index.map(|i| self.exercise_view(&level.exercises[i]));
        let explanation = match (&self.state, &self.last_result) {
            (RunnerState::Grading { index }, Some(r)) if !r.is_correct => {
                Some(level.exercises[*index].explanation.clone()).filter(|e| !e.is_empty())
            }
            _ => None,
        };
        let summary = match &self.state {
            RunnerState::LevelComplete { summary } => Some(summary.clone()),
            _ => None,
        };
        RunnerView {
            module_id: self.module.id.clone(),
            level_id: level.id.clone(),
            level_name: level.name.clone(),
            level_index: self.level_index,
            phase: self.phase(),
            exercise_index,
            total_exercises: level.exercises.len(),
            exercise,
            selection: self.pending.clone(),
            last_result: self.last_result.clone(),
            explanation,
            score: self.score,
            streak: self.streak,
            correct_count: self.correct_count,
            progress: self.graded_count as f32 / level.exercises.len() as f32,
            summary,
        }
    }

    fn exercise_view(&self, ex: &Exercise) -> ExerciseView {
        ExerciseView {
            id: ex.id.clone(),
            prompt: ex.prompt.clone(),
            kind: ex.grading.kind_name(),
            options: ex.options.clone(),
            points: self.ctx.rules.points_for(ex.points, self.level_index),
            difficulty: ex.difficulty,
            min_words: match ex.grading {
                Grading::MinLengthCreative { min_words } => Some(min_words),
                _ => None,
            },
        }
    }
}

fn check_option_range(exercise: &Exercise, candidate: &Candidate) -> Result<(), RunnerError> {
    let count = exercise.options.len();
    let bad = match candidate {
        Candidate::Choice(i) => Some(*i).filter(|&i| i >= count),
        Candidate::Choices(set) => set.iter().copied().find(|&i| i >= count),
        Candidate::Text(_) => None,
    };
    match bad {
        Some(index) => Err(RunnerError::OptionOutOfRange { index, count }),
        None => Ok(()),
    }
}
