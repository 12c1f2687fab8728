use axum::extract::Path;
use axum::routing::{get, post};
use axum::{Json, Router};
use quiz_student::client::HttpQuizApi;
use quiz_student::controller::{AttemptController, ConfirmationPrompt};
use quiz_student::events::EventKind;
use quiz_student::models::StudentIdentity;
use quiz_student::session::{Nav, Phase};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct AutoConfirm;

#[async_trait::async_trait]
impl ConfirmationPrompt for AutoConfirm {
    async fn confirm(&self, _message: &str) -> bool {
        true
    }
}

async fn spawn_stub(submits: Arc<AtomicUsize>) -> String {
    let app = Router::new()
        .route(
            "/get-quiz-for-attempt/:quiz_id/:student_id/:course_id/",
            get(
                |Path((quiz_id, _student_id, _course_id)): Path<(i64, i64, i64)>| async move {
                    Json(json!({
                        "status": "success",
                        "quiz": {
                            "title": "Networking basics",
                            "description": "Ports and protocols",
                            "total_questions": 3,
                            "total_marks": 15
                        },
                        "questions": [
                            {"id": 11, "question_text": "Default HTTPS port?",
                             "ans1": "443", "ans2": "80", "ans3": "22", "ans4": "21"},
                            {"id": 12, "question_text": "Default SSH port?",
                             "ans1": "443", "ans2": "80", "ans3": "22", "ans4": "21"},
                            {"id": 13, "question_text": "Default FTP port?",
                             "ans1": "443", "ans2": "80", "ans3": "22", "ans4": "21"}
                        ],
                        "attempt_id": format!("attempt-{quiz_id}")
                    }))
                },
            ),
        )
        .route(
            "/submit-quiz-attempt/:attempt_id/",
            post(
                move |Path(_attempt_id): Path<String>, Json(body): Json<Value>| async move {
                    submits.fetch_add(1, Ordering::SeqCst);
                    let answered =
                        body["answers"].as_array().map(|a| a.len()).unwrap_or(0) as u32;
                    Json(json!({
                        "status": "success",
                        "result": {
                            "total_questions": 3,
                            "correct_answers": answered,
                            "obtained_marks": answered * 5,
                            "total_marks": 15
                        }
                    }))
                },
            ),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn controller_for(base: &str) -> Arc<AttemptController> {
    let api = Arc::new(HttpQuizApi::new(base).unwrap());
    AttemptController::new(
        api,
        Arc::new(AutoConfirm),
        StudentIdentity { student_id: 7 },
        42,
        5,
    )
}

#[tokio::test]
async fn full_attempt_flow_over_http() {
    let submits = Arc::new(AtomicUsize::new(0));
    let base = spawn_stub(submits.clone()).await;
    let controller = controller_for(&base);
    let mut events = controller.subscribe();

    controller.load().await.unwrap();
    assert_eq!(controller.phase().await, Phase::Introduction);
    controller.start().await.unwrap();

    // Answer two of three; the partial-submission prompt auto-confirms.
    let view = controller.current_view().await.unwrap();
    assert_eq!(view.total, 3);
    assert!(
        controller
            .select_answer(view.question_id, view.options[0].clone())
            .await
    );
    controller.navigate(Nav::Next).await;
    let view = controller.current_view().await.unwrap();
    assert!(
        controller
            .select_answer(view.question_id, view.options[2].clone())
            .await
    );

    controller.submit().await.unwrap();

    assert_eq!(submits.load(Ordering::SeqCst), 1);
    assert_eq!(controller.phase().await, Phase::Completed);

    let mut saw_completed = false;
    while let Ok(event) = events.try_recv() {
        if let EventKind::Completed { result } = event.kind {
            assert_eq!(result.correct_answers, 2);
            assert_eq!(result.obtained_marks, 10);
            assert_eq!(result.total_marks, 15);
            saw_completed = true;
        }
    }
    assert!(saw_completed);
}

#[tokio::test]
async fn duplicate_manual_submissions_hit_backend_once() {
    let submits = Arc::new(AtomicUsize::new(0));
    let base = spawn_stub(submits.clone()).await;
    let controller = controller_for(&base);

    controller.load().await.unwrap();
    controller.start().await.unwrap();
    for _ in 0..3 {
        let view = controller.current_view().await.unwrap();
        assert!(
            controller
                .select_answer(view.question_id, view.options[0].clone())
                .await
        );
        controller.navigate(Nav::Next).await;
    }

    let (a, b) = tokio::join!(controller.submit(), controller.submit());
    a.unwrap();
    b.unwrap();

    assert_eq!(submits.load(Ordering::SeqCst), 1);
    assert_eq!(controller.phase().await, Phase::Completed);
}

#[tokio::test]
async fn load_failure_redirects_to_quiz_list() {
    // Nothing listening on this port pattern: use a stub-free base URL that
    // refuses connections.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let controller = controller_for(&base);
    let mut events = controller.subscribe();

    assert!(controller.load().await.is_err());
    assert_eq!(controller.phase().await, Phase::Loading);

    let mut redirects = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event.kind, EventKind::RedirectToQuizList) {
            redirects += 1;
        }
    }
    assert_eq!(redirects, 1);
}
