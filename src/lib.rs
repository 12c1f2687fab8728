pub mod client;
pub mod controller;
pub mod error;
pub mod events;
pub mod models;
pub mod session;

use std::sync::Arc;

/// Identity is resolved once, here at the application boundary, and handed
/// to the controller; nothing deeper in the crate reads ambient state.
pub fn resolve_identity() -> Result<models::StudentIdentity, error::AttemptError> {
    std::env::var("STUDENT_ID")
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .map(|student_id| models::StudentIdentity { student_id })
        .ok_or(error::AttemptError::MissingIdentity)
}

pub fn build_api(base_url: &str) -> anyhow::Result<Arc<dyn client::QuizApi>> {
    Ok(Arc::new(client::HttpQuizApi::new(base_url)?))
}
