use quiz_student::controller::{AttemptController, ConfirmationPrompt};
use quiz_student::events::{AttemptEvent, EventKind};
use quiz_student::session::Nav;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{broadcast, Mutex, Notify};
use tracing_subscriber::EnvFilter;

type SharedLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

/// y/N prompt over the same stdin the command loop reads. Safe to share:
/// the command loop awaits the controller call that triggers the prompt,
/// so only one reader is ever active.
struct StdinPrompt {
    lines: SharedLines,
}

#[async_trait::async_trait]
impl ConfirmationPrompt for StdinPrompt {
    async fn confirm(&self, message: &str) -> bool {
        println!("{message} [y/N]");
        let mut lines = self.lines.lock().await;
        matches!(
            lines.next_line().await.ok().flatten().as_deref().map(str::trim),
            Some("y") | Some("Y") | Some("yes")
        )
    }
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let identity = match quiz_student::resolve_identity() {
        Ok(identity) => identity,
        Err(err) => {
            tracing::warn!("{err}");
            println!("No student session found; sign in at the portal first.");
            return Ok(());
        }
    };

    let base_url = std::env::var("QUIZ_API_BASE_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
    let quiz_id = env_i64("QUIZ_ID", 1);
    let course_id = env_i64("COURSE_ID", 1);

    let api = quiz_student::build_api(&base_url)?;
    let lines: SharedLines = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let prompt = Arc::new(StdinPrompt {
        lines: Arc::clone(&lines),
    });
    let controller = AttemptController::new(api, prompt.clone(), identity, quiz_id, course_id);

    let done = Arc::new(Notify::new());
    spawn_event_printer(controller.subscribe(), Arc::clone(&done));

    if controller.load().await.is_err() {
        // The load-failed event has already told the student; nothing to keep.
        return Ok(());
    }

    if let Some(quiz) = controller.quiz_info().await {
        println!("== {} ==", quiz.title);
        if let Some(description) = &quiz.description {
            println!("{description}");
        }
        println!(
            "{} questions, {} marks total",
            quiz.total_questions, quiz.total_marks
        );
    }

    if !prompt
        .confirm("The timer cannot be paused once the attempt starts. Start now?")
        .await
    {
        println!("Attempt not started.");
        return Ok(());
    }
    controller.start().await?;
    render(&controller).await;

    loop {
        tokio::select! {
            _ = done.notified() => break,
            line = next_command(&lines) => {
                let Some(line) = line else { break };
                let cmd = line.trim();
                if cmd.is_empty() {
                    continue;
                }
                if let Some(rest) = cmd.strip_prefix("a ") {
                    answer_current(&controller, rest).await;
                } else if let Some(rest) = cmd.strip_prefix("g ") {
                    if let Ok(index) = rest.trim().parse::<usize>() {
                        controller.navigate(Nav::Jump(index)).await;
                        render(&controller).await;
                    }
                } else {
                    match cmd {
                        "n" => {
                            controller.navigate(Nav::Next).await;
                            render(&controller).await;
                        }
                        "p" => {
                            controller.navigate(Nav::Prev).await;
                            render(&controller).await;
                        }
                        "s" => {
                            let _ = controller.submit().await;
                        }
                        "r" => {
                            let _ = controller.retry_submit().await;
                        }
                        "q" => break,
                        _ => println!(
                            "commands: a <1-4> answer, n next, p prev, g <index> jump, s submit, r retry, q quit"
                        ),
                    }
                }
            }
        }
    }

    controller.cancel();
    Ok(())
}

async fn next_command(lines: &SharedLines) -> Option<String> {
    lines.lock().await.next_line().await.ok().flatten()
}

async fn answer_current(controller: &AttemptController, choice: &str) {
    let Some(view) = controller.current_view().await else {
        return;
    };
    match choice.trim().parse::<usize>() {
        Ok(option) if (1..=4).contains(&option) => {
            let answer = view.options[option - 1].clone();
            if controller.select_answer(view.question_id, answer).await {
                render(controller).await;
            }
        }
        _ => println!("choose an option 1-4"),
    }
}

async fn render(controller: &AttemptController) {
    if let Some(view) = controller.current_view().await {
        println!();
        println!(
            "[{}] question {}/{} ({} answered)",
            view.clock,
            view.index + 1,
            view.total,
            view.answered
        );
        println!("{}", view.question_text);
        for (i, option) in view.options.iter().enumerate() {
            let marker = if view.selected.as_deref() == Some(option.as_str()) {
                "*"
            } else {
                " "
            };
            println!(" {marker} {}. {option}", i + 1);
        }
    }
}

fn spawn_event_printer(mut events: broadcast::Receiver<AttemptEvent>, done: Arc<Notify>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match event.kind {
                    EventKind::ClockTick {
                        remaining_seconds,
                        clock,
                    } => {
                        if remaining_seconds > 0
                            && (remaining_seconds % 60 == 0 || remaining_seconds <= 10)
                        {
                            println!("[time remaining {clock}]");
                        }
                    }
                    EventKind::SubmissionStarted { forced } => {
                        if forced {
                            println!("Time is up, submitting your answers.");
                        }
                    }
                    EventKind::Completed { result } => {
                        println!(
                            "Result: {}/{} correct, {} of {} marks ({:.0}%)",
                            result.correct_answers,
                            result.total_questions,
                            result.obtained_marks,
                            result.total_marks,
                            result.score_pct()
                        );
                    }
                    EventKind::SubmitFailed { message, can_retry } => {
                        if can_retry {
                            println!("Submission failed ({message}). Type s or r to try again.");
                        } else {
                            println!("Submission failed ({message}).");
                            done.notify_one();
                        }
                    }
                    EventKind::LoadFailed { message } => {
                        println!("Could not load the quiz: {message}");
                    }
                    EventKind::RedirectToQuizList | EventKind::RedirectToResults => {
                        done.notify_one();
                    }
                    _ => {}
                },
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}
