use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Job specification an interview session is conducted against.
/// Loaded once per session and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewContext {
    pub job_position: String,
    pub job_description: String,
    /// Scheduled length in minutes.
    pub duration_minutes: i32,
    pub interview_type: String,
    /// Admin-authored questions, in the order they should be asked.
    pub questions: Vec<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct InterviewRow {
    pub job_position: String,
    pub job_description: Option<String>,
    pub duration_minutes: Option<i32>,
    pub interview_type: Option<String>,
    pub questions: Option<Json<Vec<String>>>,
}

impl From<InterviewRow> for InterviewContext {
    fn from(row: InterviewRow) -> Self {
        Self {
            job_position: row.job_position,
            job_description: row.job_description.unwrap_or_default(),
            duration_minutes: row.duration_minutes.unwrap_or(30),
            interview_type: row
                .interview_type
                .unwrap_or_else(|| "technical".to_string()),
            questions: row
                .questions
                .map(|q| q.0)
                .unwrap_or_default()
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect(),
        }
    }
}
