use crate::models::{
    format_clock, time_limit_seconds, AttemptAnswer, AttemptBundle, Question, QuizInfo,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Lifecycle of one attempt. Transitions are one-directional except for the
/// recoverable submit-failure path (Submitting back to InProgress while time
/// remains). Failed is the terminal error state for a submission that cannot
/// be recovered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Loading,
    Introduction,
    InProgress,
    Submitting,
    Completed,
    Failed,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Forced,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Nav {
    Prev,
    Next,
    Jump(usize),
}

/// Outcome of one countdown tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
    Continue(u32),
    Expired,
    Stopped,
}

/// Gate on entering Submitting. At most one caller ever gets Proceed;
/// everyone else is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitGate {
    Proceed(Vec<AttemptAnswer>),
    ConfirmPartial { answered: usize, total: usize },
    AlreadySubmitted,
    NotInProgress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitFailure {
    /// Manual submission failed with time on the clock; the attempt resumes.
    Resumed { remaining_seconds: u32 },
    /// Post-expiry failure; one manual retry is still allowed.
    RetryAvailable,
    Terminal,
}

/// Snapshot of the question under the cursor, for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub question_id: i64,
    pub index: usize,
    pub total: usize,
    pub question_text: String,
    pub options: [String; 4],
    pub selected: Option<String>,
    pub answered: usize,
    pub clock: String,
}

/// All state for one timed quiz attempt. Owned by a single controller;
/// every mutation goes through a phase check so the invariants in the
/// enum above cannot be bypassed.
#[derive(Debug, Clone)]
pub struct QuizSession {
    pub quiz_id: i64,
    pub student_id: i64,
    pub course_id: i64,
    attempt_id: String,
    quiz: Option<QuizInfo>,
    questions: Vec<Question>,
    answers: HashMap<i64, String>,
    time_remaining_seconds: u32,
    phase: Phase,
    current_question_index: usize,
    submit_trigger: Option<SubmitTrigger>,
    expiry_retry_used: bool,
}

impl QuizSession {
    pub fn new(quiz_id: i64, student_id: i64, course_id: i64) -> Self {
        Self {
            quiz_id,
            student_id,
            course_id,
            attempt_id: String::new(),
            quiz: None,
            questions: Vec::new(),
            answers: HashMap::new(),
            time_remaining_seconds: 0,
            phase: Phase::Loading,
            current_question_index: 0,
            submit_trigger: None,
            expiry_retry_used: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn quiz(&self) -> Option<&QuizInfo> {
        self.quiz.as_ref()
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn answered_count(&self) -> usize {
        self.answers.len()
    }

    pub fn time_remaining_seconds(&self) -> u32 {
        self.time_remaining_seconds
    }

    pub fn clock(&self) -> String {
        format_clock(self.time_remaining_seconds)
    }

    pub fn current_index(&self) -> usize {
        self.current_question_index
    }

    /// Loading -> Introduction. Fixes the question list and starts the clock
    /// budget at `max(questions * 120, 600)` seconds.
    pub fn load_complete(&mut self, bundle: AttemptBundle) -> bool {
        if self.phase != Phase::Loading {
            return false;
        }
        self.time_remaining_seconds = time_limit_seconds(bundle.questions.len());
        self.quiz = Some(bundle.quiz);
        self.questions = bundle.questions;
        self.attempt_id = bundle.attempt_id;
        self.phase = Phase::Introduction;
        true
    }

    /// Introduction -> InProgress, after the user has confirmed the
    /// timer warning.
    pub fn start(&mut self) -> bool {
        if self.phase != Phase::Introduction {
            return false;
        }
        self.phase = Phase::InProgress;
        true
    }

    /// One second elapses. Only ever decrements while InProgress, so no
    /// tick can land after a submission has begun.
    pub fn tick(&mut self) -> Tick {
        if self.phase != Phase::InProgress {
            return Tick::Stopped;
        }
        self.time_remaining_seconds = self.time_remaining_seconds.saturating_sub(1);
        if self.time_remaining_seconds == 0 {
            Tick::Expired
        } else {
            Tick::Continue(self.time_remaining_seconds)
        }
    }

    /// Last write wins; no history kept, no backend roundtrip.
    pub fn select_answer(&mut self, question_id: i64, answer: impl Into<String>) -> bool {
        if self.phase != Phase::InProgress {
            return false;
        }
        if !self.questions.iter().any(|q| q.id == question_id) {
            return false;
        }
        self.answers.insert(question_id, answer.into());
        true
    }

    /// Moves the cursor; out-of-range requests leave it unchanged.
    pub fn navigate(&mut self, nav: Nav) -> usize {
        let len = self.questions.len();
        if len == 0 {
            return 0;
        }
        let target = match nav {
            Nav::Prev => self.current_question_index.checked_sub(1),
            Nav::Next => {
                let next = self.current_question_index + 1;
                (next < len).then_some(next)
            }
            Nav::Jump(index) => (index < len).then_some(index),
        };
        if let Some(index) = target {
            self.current_question_index = index;
        }
        self.current_question_index
    }

    pub fn current_view(&self) -> Option<QuestionView> {
        let question = self.questions.get(self.current_question_index)?;
        Some(QuestionView {
            question_id: question.id,
            index: self.current_question_index,
            total: self.questions.len(),
            question_text: question.question_text.clone(),
            options: question.options().map(str::to_string),
            selected: self.answers.get(&question.id).cloned(),
            answered: self.answers.len(),
            clock: self.clock(),
        })
    }

    /// Single-entry guard for submission. A manual submit with unanswered
    /// questions does not change phase; the caller must confirm and come
    /// back through `begin_submit_partial_confirmed`.
    pub fn begin_submit(&mut self, trigger: SubmitTrigger) -> SubmitGate {
        match self.phase {
            Phase::Submitting | Phase::Completed => SubmitGate::AlreadySubmitted,
            Phase::InProgress => {
                if trigger == SubmitTrigger::Manual && self.answers.len() < self.questions.len() {
                    return SubmitGate::ConfirmPartial {
                        answered: self.answers.len(),
                        total: self.questions.len(),
                    };
                }
                self.enter_submitting(trigger)
            }
            _ => SubmitGate::NotInProgress,
        }
    }

    /// Re-entry after the user accepted the partial-answers warning. The
    /// guard is rechecked: a forced submission may have won in the meantime.
    pub fn begin_submit_partial_confirmed(&mut self) -> SubmitGate {
        match self.phase {
            Phase::Submitting | Phase::Completed => SubmitGate::AlreadySubmitted,
            Phase::InProgress => self.enter_submitting(SubmitTrigger::Manual),
            _ => SubmitGate::NotInProgress,
        }
    }

    /// One manual retry after a post-expiry submission failure.
    pub fn retry_submit(&mut self) -> SubmitGate {
        match self.phase {
            Phase::Failed if !self.expiry_retry_used => {
                self.expiry_retry_used = true;
                self.enter_submitting(SubmitTrigger::Forced)
            }
            Phase::Submitting | Phase::Completed => SubmitGate::AlreadySubmitted,
            _ => SubmitGate::NotInProgress,
        }
    }

    fn enter_submitting(&mut self, trigger: SubmitTrigger) -> SubmitGate {
        self.phase = Phase::Submitting;
        self.submit_trigger = Some(trigger);
        SubmitGate::Proceed(self.answers_payload())
    }

    /// Submitting -> Completed. The session is discarded once the UI
    /// has navigated away.
    pub fn complete(&mut self) -> bool {
        if self.phase != Phase::Submitting {
            return false;
        }
        self.phase = Phase::Completed;
        true
    }

    /// Submitting -> InProgress when the submission was manual and time
    /// remains; otherwise the attempt lands in Failed, keeping the answers
    /// so a retry resubmits the same set.
    pub fn submit_failed(&mut self) -> SubmitFailure {
        debug_assert_eq!(self.phase, Phase::Submitting);
        let manual = self.submit_trigger == Some(SubmitTrigger::Manual);
        if manual && self.time_remaining_seconds > 0 {
            self.phase = Phase::InProgress;
            self.submit_trigger = None;
            SubmitFailure::Resumed {
                remaining_seconds: self.time_remaining_seconds,
            }
        } else {
            self.phase = Phase::Failed;
            if self.expiry_retry_used {
                SubmitFailure::Terminal
            } else {
                SubmitFailure::RetryAvailable
            }
        }
    }

    /// Answers in question order, unanswered questions omitted.
    fn answers_payload(&self) -> Vec<AttemptAnswer> {
        self.questions
            .iter()
            .filter_map(|q| {
                self.answers.get(&q.id).map(|selected| AttemptAnswer {
                    question_id: q.id,
                    selected_answer: selected.clone(),
                })
            })
            .collect()
    }
}
