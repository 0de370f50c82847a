//! Semantic feedback events emitted by the runner. Whoever renders them (toasts,
//! sounds, log lines) is outside the core; the runner never reads anything back.

use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

use crate::domain::LevelSummary;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    AttemptGraded {
        #[serde(rename = "exerciseId")]
        exercise_id: String,
        #[serde(rename = "isCorrect")]
        is_correct: bool,
        points: u32,
        message: String,
    },
    LevelCompleted {
        summary: LevelSummary,
        message: String,
    },
    ValidationFailed {
        reason: String,
    },
}

pub trait NotificationSink: Send + Sync {
    fn notify(&self, event: CoreEvent);
}

/// Logs and queues events until the transport drains them.
#[derive(Debug, Default)]
pub struct EventBuffer {
    queue: Mutex<Vec<CoreEvent>>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn drain(&self) -> Vec<CoreEvent> {
        match self.queue.lock() {
            Ok(mut q) => std::mem::take(&mut *q),
            Err(_) => Vec::new(),
        }
    }
}

impl NotificationSink for EventBuffer {
    fn notify(&self, event: CoreEvent) {
        log_event(&event);
        if let Ok(mut q) = self.queue.lock() {
            q.push(event);
        }
    }
}

fn log_event(event: &CoreEvent) {
    match event {
        CoreEvent::AttemptGraded { exercise_id, is_correct, points, .. } => {
            info!(target: "runner", %exercise_id, %is_correct, points, "Attempt graded");
        }
        CoreEvent::LevelCompleted { summary, .. } => {
            info!(
                target: "runner",
                module = %summary.module_id,
                level = %summary.level_id,
                score = summary.score,
                accuracy = %format!("{:.1}", summary.accuracy_percent),
                unlocked_next = summary.unlocked_next,
                "Level completed"
            );
        }
        CoreEvent::ValidationFailed { reason } => {
            info!(target: "runner", %reason, "Validation failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_drains_in_order() {
        let buf = EventBuffer::new();
        buf.notify(CoreEvent::ValidationFailed { reason: "a".into() });
        buf.notify(CoreEvent::ValidationFailed { reason: "b".into() });
        let events = buf.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], CoreEvent::ValidationFailed { reason: "a".into() });
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(CoreEvent::AttemptGraded {
            exercise_id: "add-1".into(),
            is_correct: true,
            points: 10,
            message: "Great job!".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "attempt_graded");
        assert_eq!(json["exerciseId"], "add-1");
        assert_eq!(json["isCorrect"], true);
    }
}
