use crate::client::QuizApi;
use crate::error::AttemptError;
use crate::events::{AttemptEvent, EventKind};
use crate::models::{format_clock, time_limit_seconds, AttemptAnswer, QuizInfo, StudentIdentity};
use crate::session::{
    Nav, Phase, QuestionView, QuizSession, SubmitFailure, SubmitGate, SubmitTrigger, Tick,
};
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Asks the student before an irreversible step (starting the timer is
/// handled by the caller; the controller only prompts for partial
/// submissions). Forced submissions never prompt.
#[async_trait]
pub trait ConfirmationPrompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Orchestrates one timed quiz attempt: load, countdown, answer tracking,
/// and exactly-once submission. All session access is serialized through
/// one mutex, so the timer-expiry path and the manual submit path race
/// only at the phase guard, where the loser becomes a no-op.
pub struct AttemptController {
    api: Arc<dyn QuizApi>,
    prompt: Arc<dyn ConfirmationPrompt>,
    session: Mutex<QuizSession>,
    events: broadcast::Sender<AttemptEvent>,
    timer: StdMutex<Option<JoinHandle<()>>>,
}

impl AttemptController {
    pub fn new(
        api: Arc<dyn QuizApi>,
        prompt: Arc<dyn ConfirmationPrompt>,
        identity: StudentIdentity,
        quiz_id: i64,
        course_id: i64,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            api,
            prompt,
            session: Mutex::new(QuizSession::new(quiz_id, identity.student_id, course_id)),
            events,
            timer: StdMutex::new(None),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AttemptEvent> {
        self.events.subscribe()
    }

    pub async fn phase(&self) -> Phase {
        self.session.lock().await.phase()
    }

    pub async fn quiz_info(&self) -> Option<QuizInfo> {
        self.session.lock().await.quiz().cloned()
    }

    pub async fn current_view(&self) -> Option<QuestionView> {
        self.session.lock().await.current_view()
    }

    /// Fetches quiz metadata, questions and a fresh attempt id. On failure
    /// the attempt is over before it began: the student is sent back to the
    /// quiz listing and no partial state is retained.
    pub async fn load(self: &Arc<Self>) -> Result<(), AttemptError> {
        let (quiz_id, student_id, course_id) = {
            let session = self.session.lock().await;
            if session.phase() != Phase::Loading {
                return Err(AttemptError::InvalidPhase {
                    phase: session.phase(),
                });
            }
            (session.quiz_id, session.student_id, session.course_id)
        };

        match self.api.fetch_for_attempt(quiz_id, student_id, course_id).await {
            Ok(bundle) => {
                let loaded = EventKind::QuizLoaded {
                    title: bundle.quiz.title.clone(),
                    total_questions: bundle.quiz.total_questions,
                    total_marks: bundle.quiz.total_marks,
                    time_limit_clock: format_clock(time_limit_seconds(bundle.questions.len())),
                };
                let attempt_id = bundle.attempt_id.clone();
                {
                    // Recheck under the lock: a concurrent load may have
                    // won while this fetch was in flight.
                    let mut session = self.session.lock().await;
                    if !session.load_complete(bundle) {
                        return Err(AttemptError::InvalidPhase {
                            phase: session.phase(),
                        });
                    }
                }
                info!(quiz_id, %attempt_id, "quiz loaded for attempt");
                self.emit(loaded);
                Ok(())
            }
            Err(err) => {
                warn!(quiz_id, "quiz load failed: {err}");
                self.emit(EventKind::LoadFailed {
                    message: err.to_string(),
                });
                self.emit(EventKind::RedirectToQuizList);
                Err(AttemptError::Load(err))
            }
        }
    }

    /// Introduction -> InProgress. Spawns the 1 Hz countdown; the caller is
    /// expected to have shown the cannot-pause warning already.
    pub async fn start(self: &Arc<Self>) -> Result<(), AttemptError> {
        {
            let mut session = self.session.lock().await;
            if !session.start() {
                return Err(AttemptError::InvalidPhase {
                    phase: session.phase(),
                });
            }
            self.emit(EventKind::AttemptStarted);
            self.emit(EventKind::ClockTick {
                remaining_seconds: session.time_remaining_seconds(),
                clock: session.clock(),
            });
        }
        self.spawn_countdown();
        Ok(())
    }

    pub async fn select_answer(&self, question_id: i64, answer: String) -> bool {
        self.session.lock().await.select_answer(question_id, answer)
    }

    pub async fn navigate(&self, nav: Nav) -> usize {
        self.session.lock().await.navigate(nav)
    }

    /// Manual submission. No-op unless the attempt is running; prompts for
    /// confirmation when questions are still unanswered.
    pub async fn submit(self: &Arc<Self>) -> Result<(), AttemptError> {
        let gate = { self.session.lock().await.begin_submit(SubmitTrigger::Manual) };
        match gate {
            SubmitGate::Proceed(answers) => {
                self.perform_submit(answers, SubmitTrigger::Manual).await
            }
            SubmitGate::ConfirmPartial { answered, total } => {
                let message = format!(
                    "You have answered {answered} of {total} questions. Submit anyway?"
                );
                if !self.prompt.confirm(&message).await {
                    info!("partial submission declined, attempt continues");
                    return Ok(());
                }
                // The timer may have expired while the dialog was open;
                // the guard is rechecked on the way back in.
                let gate = { self.session.lock().await.begin_submit_partial_confirmed() };
                match gate {
                    SubmitGate::Proceed(answers) => {
                        self.perform_submit(answers, SubmitTrigger::Manual).await
                    }
                    _ => Ok(()),
                }
            }
            SubmitGate::AlreadySubmitted | SubmitGate::NotInProgress => Ok(()),
        }
    }

    /// One manual retry after a post-expiry submission failure.
    pub async fn retry_submit(self: &Arc<Self>) -> Result<(), AttemptError> {
        let gate = { self.session.lock().await.retry_submit() };
        match gate {
            SubmitGate::Proceed(answers) => {
                self.perform_submit(answers, SubmitTrigger::Forced).await
            }
            _ => Ok(()),
        }
    }

    /// Stops the countdown. Called when the student navigates away before
    /// submitting; dropping the controller has the same effect.
    pub fn cancel(&self) {
        if let Ok(mut slot) = self.timer.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }

    async fn perform_submit(
        self: &Arc<Self>,
        answers: Vec<AttemptAnswer>,
        trigger: SubmitTrigger,
    ) -> Result<(), AttemptError> {
        self.emit(EventKind::SubmissionStarted {
            forced: trigger == SubmitTrigger::Forced,
        });
        let attempt_id = { self.session.lock().await.attempt_id().to_string() };

        match self.api.submit_attempt(&attempt_id, &answers).await {
            Ok(result) => {
                self.session.lock().await.complete();
                info!(
                    %attempt_id,
                    obtained = result.obtained_marks,
                    total = result.total_marks,
                    "attempt graded"
                );
                self.emit(EventKind::Completed { result });
                self.emit(EventKind::RedirectToResults);
                Ok(())
            }
            Err(err) => {
                warn!(%attempt_id, "submission failed: {err}");
                let outcome = { self.session.lock().await.submit_failed() };
                match outcome {
                    SubmitFailure::Resumed { remaining_seconds } => {
                        self.emit(EventKind::SubmitFailed {
                            message: err.to_string(),
                            can_retry: true,
                        });
                        // The countdown task exited when the phase left
                        // InProgress; bring it back for the resumed attempt.
                        self.emit(EventKind::ClockTick {
                            remaining_seconds,
                            clock: format_clock(remaining_seconds),
                        });
                        self.spawn_countdown();
                    }
                    SubmitFailure::RetryAvailable => {
                        self.emit(EventKind::SubmitFailed {
                            message: err.to_string(),
                            can_retry: true,
                        });
                    }
                    SubmitFailure::Terminal => {
                        self.emit(EventKind::SubmitFailed {
                            message: err.to_string(),
                            can_retry: false,
                        });
                    }
                }
                Err(AttemptError::Submit(err))
            }
        }
    }

    /// The countdown holds only a weak reference: if every strong handle to
    /// the controller is dropped, the task ends on its next tick instead of
    /// firing against a dead attempt.
    fn spawn_countdown(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            // The first tick of a tokio interval completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(ctrl) = weak.upgrade() else { break };
                let outcome = { ctrl.session.lock().await.tick() };
                match outcome {
                    Tick::Continue(remaining) => {
                        ctrl.emit(EventKind::ClockTick {
                            remaining_seconds: remaining,
                            clock: format_clock(remaining),
                        });
                    }
                    Tick::Expired => {
                        ctrl.emit(EventKind::ClockTick {
                            remaining_seconds: 0,
                            clock: format_clock(0),
                        });
                        info!("time expired, forcing submission");
                        let gate =
                            { ctrl.session.lock().await.begin_submit(SubmitTrigger::Forced) };
                        if let SubmitGate::Proceed(answers) = gate {
                            if let Err(err) =
                                ctrl.perform_submit(answers, SubmitTrigger::Forced).await
                            {
                                warn!("forced submission failed: {err}");
                            }
                        }
                        break;
                    }
                    Tick::Stopped => break,
                }
            }
        });
        if let Ok(mut slot) = self.timer.lock() {
            if let Some(old) = slot.replace(handle) {
                old.abort();
            }
        }
    }

    fn emit(&self, kind: EventKind) {
        // Nobody listening is fine; events are fire-and-forget.
        let _ = self.events.send(AttemptEvent::now(kind));
    }
}

impl Drop for AttemptController {
    fn drop(&mut self) {
        self.cancel();
    }
}
