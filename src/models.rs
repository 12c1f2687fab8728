use serde::{Deserialize, Serialize};

/// Time budget policy for one attempt: two minutes per question,
/// never less than ten minutes overall.
pub const SECONDS_PER_QUESTION: u32 = 120;
pub const MIN_TIME_LIMIT_SECONDS: u32 = 600;

pub fn time_limit_seconds(question_count: usize) -> u32 {
    (question_count as u32)
        .saturating_mul(SECONDS_PER_QUESTION)
        .max(MIN_TIME_LIMIT_SECONDS)
}

/// Countdown display format: minutes, then seconds zero-padded to two digits.
pub fn format_clock(seconds: u32) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentIdentity {
    pub student_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizInfo {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub total_questions: u32,
    pub total_marks: u32,
}

/// One multiple-choice question as the grading backend ships it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub ans1: String,
    pub ans2: String,
    pub ans3: String,
    pub ans4: String,
}

impl Question {
    pub fn options(&self) -> [&str; 4] {
        [&self.ans1, &self.ans2, &self.ans3, &self.ans4]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptAnswer {
    pub question_id: i64,
    pub selected_answer: String,
}

/// Everything the backend issues when an attempt is opened.
#[derive(Debug, Clone)]
pub struct AttemptBundle {
    pub quiz: QuizInfo,
    pub questions: Vec<Question>,
    pub attempt_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub total_questions: u32,
    pub correct_answers: u32,
    pub obtained_marks: u32,
    pub total_marks: u32,
}

impl AttemptResult {
    pub fn score_pct(&self) -> f64 {
        if self.total_marks == 0 {
            0.0
        } else {
            (self.obtained_marks as f64) * 100.0 / (self.total_marks as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_limit_floors_at_ten_minutes() {
        assert_eq!(time_limit_seconds(0), 600);
        assert_eq!(time_limit_seconds(3), 600);
        assert_eq!(time_limit_seconds(5), 600);
        assert_eq!(time_limit_seconds(6), 720);
        assert_eq!(time_limit_seconds(10), 1200);
    }

    #[test]
    fn clock_formatting() {
        assert_eq!(format_clock(0), "0:00");
        assert_eq!(format_clock(65), "1:05");
        assert_eq!(format_clock(90), "1:30");
        assert_eq!(format_clock(600), "10:00");
    }

    #[test]
    fn result_score_pct() {
        let result = AttemptResult {
            total_questions: 4,
            correct_answers: 3,
            obtained_marks: 15,
            total_marks: 20,
        };
        assert_eq!(result.score_pct(), 75.0);

        let empty = AttemptResult {
            total_questions: 0,
            correct_answers: 0,
            obtained_marks: 0,
            total_marks: 0,
        };
        assert_eq!(empty.score_pct(), 0.0);
    }

    #[test]
    fn question_options_in_order() {
        let q = Question {
            id: 1,
            question_text: "Port for HTTPS?".into(),
            ans1: "443".into(),
            ans2: "80".into(),
            ans3: "22".into(),
            ans4: "21".into(),
        };
        assert_eq!(q.options(), ["443", "80", "22", "21"]);
    }
}
