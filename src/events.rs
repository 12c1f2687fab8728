use crate::models::AttemptResult;
use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Timestamped envelope published by the controller; the surrounding UI
/// subscribes and renders these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttemptEvent {
    #[serde(flatten)]
    pub kind: EventKind,
    pub ts: String,
}

impl AttemptEvent {
    pub fn now(kind: EventKind) -> Self {
        Self {
            kind,
            ts: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    QuizLoaded {
        title: String,
        total_questions: u32,
        total_marks: u32,
        time_limit_clock: String,
    },
    AttemptStarted,
    ClockTick {
        remaining_seconds: u32,
        clock: String,
    },
    SubmissionStarted {
        forced: bool,
    },
    Completed {
        result: AttemptResult,
    },
    SubmitFailed {
        message: String,
        can_retry: bool,
    },
    LoadFailed {
        message: String,
    },
    RedirectToQuizList,
    RedirectToResults,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_roundtrip() {
        let event = AttemptEvent::now(EventKind::ClockTick {
            remaining_seconds: 65,
            clock: "1:05".into(),
        });
        let raw = serde_json::to_string(&event).unwrap();
        assert!(raw.contains("\"event\":\"clock_tick\""));
        let parsed: AttemptEvent = serde_json::from_str(&raw).unwrap();
        match parsed.kind {
            EventKind::ClockTick {
                remaining_seconds,
                clock,
            } => {
                assert_eq!(remaining_seconds, 65);
                assert_eq!(clock, "1:05");
            }
            other => panic!("expected ClockTick, got {other:?}"),
        }
    }

    #[test]
    fn unit_variant_roundtrip() {
        let event = AttemptEvent::now(EventKind::RedirectToQuizList);
        let raw = serde_json::to_string(&event).unwrap();
        let parsed: AttemptEvent = serde_json::from_str(&raw).unwrap();
        assert!(matches!(parsed.kind, EventKind::RedirectToQuizList));
    }
}
