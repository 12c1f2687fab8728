use crate::error::ApiError;
use crate::models::{AttemptAnswer, AttemptBundle, AttemptResult, Question, QuizInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const SUCCESS_STATUS: &str = "success";

/// The quiz/grading backend as the controller sees it. Mocked in tests;
/// `HttpQuizApi` is the real thing.
#[async_trait]
pub trait QuizApi: Send + Sync {
    async fn fetch_for_attempt(
        &self,
        quiz_id: i64,
        student_id: i64,
        course_id: i64,
    ) -> Result<AttemptBundle, ApiError>;

    async fn submit_attempt(
        &self,
        attempt_id: &str,
        answers: &[AttemptAnswer],
    ) -> Result<AttemptResult, ApiError>;
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    status: String,
    quiz: QuizInfo,
    questions: Vec<Question>,
    attempt_id: String,
}

#[derive(Debug, Serialize)]
struct SubmitPayload<'a> {
    answers: &'a [AttemptAnswer],
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    status: String,
    result: AttemptResult,
}

pub struct HttpQuizApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpQuizApi {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base_url: String = base_url.into();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request_id() -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

#[async_trait]
impl QuizApi for HttpQuizApi {
    async fn fetch_for_attempt(
        &self,
        quiz_id: i64,
        student_id: i64,
        course_id: i64,
    ) -> Result<AttemptBundle, ApiError> {
        let request_id = Self::request_id();
        let url = format!(
            "{}/get-quiz-for-attempt/{}/{}/{}/",
            self.base_url, quiz_id, student_id, course_id
        );
        let body: FetchResponse = self
            .http
            .get(&url)
            .header("x-request-id", &request_id)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if body.status != SUCCESS_STATUS {
            return Err(ApiError::Backend {
                status: body.status,
            });
        }
        debug!(%request_id, quiz_id, "quiz fetched for attempt");
        Ok(AttemptBundle {
            quiz: body.quiz,
            questions: body.questions,
            attempt_id: body.attempt_id,
        })
    }

    async fn submit_attempt(
        &self,
        attempt_id: &str,
        answers: &[AttemptAnswer],
    ) -> Result<AttemptResult, ApiError> {
        let request_id = Self::request_id();
        let url = format!("{}/submit-quiz-attempt/{}/", self.base_url, attempt_id);
        let body: SubmitResponse = self
            .http
            .post(&url)
            .header("x-request-id", &request_id)
            .json(&SubmitPayload { answers })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        if body.status != SUCCESS_STATUS {
            return Err(ApiError::Backend {
                status: body.status,
            });
        }
        debug!(%request_id, attempt_id, answers = answers.len(), "attempt submitted");
        Ok(body.result)
    }
}
