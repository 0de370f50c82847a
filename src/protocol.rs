//! Wire shapes shared by the WebSocket and HTTP surfaces. Field names are
//! camelCase on the wire; enums are tagged by `type`.

use serde::{Deserialize, Serialize};

use crate::domain::{Candidate, Module};
use crate::notify::CoreEvent;
use crate::progress::ProgressRecord;
use crate::runner::{Advance, Continuation, NavigationIntent, RunnerView};
use crate::session::{AdvanceNotice, SubmitOutcome};

/// Frames a game client may send on `/ws`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    ListCatalog,
    StartLevel {
        #[serde(rename = "moduleId")]
        module_id: String,
        #[serde(rename = "levelId")]
        level_id: String,
    },
    SelectAnswer {
        answer: Candidate,
    },
    SubmitAnswer,
    Advance,
    ContinueLevel,
    RestartLevel,
    Explanation {
        index: usize,
    },
    Exit,
}

/// Frames pushed back to the game client, including timer-driven advances.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Catalog {
        modules: Vec<ModuleSummaryOut>,
    },
    Session {
        #[serde(rename = "sessionId")]
        session_id: String,
        view: RunnerView,
    },
    View {
        view: RunnerView,
    },
    AnswerResult {
        outcome: SubmitOutcome,
    },
    Advanced {
        advance: Advance,
        view: RunnerView,
        events: Vec<CoreEvent>,
    },
    AutoAdvanced {
        notice: AdvanceNotice,
    },
    Continued {
        continuation: Continuation,
        view: RunnerView,
        events: Vec<CoreEvent>,
    },
    Explanation {
        index: usize,
        text: String,
    },
    Navigate {
        intent: NavigationIntent,
    },
    Error {
        message: String,
    },
}

// ---- HTTP bodies ----

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelSummaryOut {
    pub id: String,
    pub name: String,
    pub exercise_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSummaryOut {
    pub id: String,
    pub name: String,
    pub description: String,
    pub levels: Vec<LevelSummaryOut>,
}

pub fn module_summary(m: &Module) -> ModuleSummaryOut {
    ModuleSummaryOut {
        id: m.id.clone(),
        name: m.name.clone(),
        description: m.description.clone(),
        levels: m
            .levels
            .iter()
            .map(|l| LevelSummaryOut { id: l.id.clone(), name: l.name.clone(), exercise_count: l.exercises.len() })
            .collect(),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStatusOut {
    pub id: String,
    pub name: String,
    pub exercise_count: usize,
    pub unlocked: bool,
    pub completed: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDetailOut {
    pub id: String,
    pub name: String,
    pub description: String,
    pub total_score: u64,
    pub levels: Vec<LevelStatusOut>,
}

pub fn module_detail(m: &Module, progress: &ProgressRecord) -> ModuleDetailOut {
    ModuleDetailOut {
        id: m.id.clone(),
        name: m.name.clone(),
        description: m.description.clone(),
        total_score: progress.total_score,
        levels: m
            .levels
            .iter()
            .enumerate()
            .map(|(i, l)| LevelStatusOut {
                id: l.id.clone(),
                name: l.name.clone(),
                exercise_count: l.exercises.len(),
                unlocked: progress.is_unlocked(i),
                completed: progress.is_completed(i),
            })
            .collect(),
    }
}

#[derive(Debug, Deserialize)]
pub struct StartSessionIn {
    #[serde(rename = "moduleId")]
    pub module_id: String,
    #[serde(rename = "levelId")]
    pub level_id: String,
}

#[derive(Debug, Serialize)]
pub struct SessionOut {
    #[serde(rename = "sessionId")]
    pub session_id: String,
    pub view: RunnerView,
}

#[derive(Debug, Deserialize)]
pub struct SelectIn {
    pub answer: Candidate,
}

#[derive(Debug, Deserialize)]
pub struct ExplanationQuery {
    pub index: usize,
}

#[derive(Debug, Serialize)]
pub struct ExplanationOut {
    pub index: usize,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct NavigateOut {
    pub intent: NavigationIntent,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
