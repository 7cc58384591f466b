use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::loader::CandidateIdentity;
use crate::errors::AppError;
use crate::interview::engine::{SessionSnapshot, TurnRequest, TurnResponse};
use crate::interview::phase::Clock;
use crate::models::feedback::InterviewFeedback;
use crate::session::state::{Role, Turn};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnBody {
    /// `null` or absent starts (or re-syncs) the interview.
    #[serde(default)]
    pub utterance: Option<String>,
    #[serde(default)]
    pub elapsed_seconds: f64,
    /// Zero or absent falls back to the interview's scheduled duration.
    #[serde(default)]
    pub total_duration_seconds: f64,
    #[serde(default)]
    pub time_exceeded: bool,
    #[serde(default)]
    pub candidate_name: Option<String>,
    #[serde(default)]
    pub candidate_email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptTurn {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackBody {
    #[serde(default)]
    pub candidate_email: Option<String>,
    #[serde(default)]
    pub candidate_name: Option<String>,
    /// Overrides the live session log, e.g. after the session was cleared.
    #[serde(default)]
    pub transcript: Option<Vec<TranscriptTurn>>,
    #[serde(default)]
    pub clear_session: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub feedback_id: Uuid,
    pub interview_id: String,
    pub candidate_email: String,
    #[serde(flatten)]
    pub feedback: InterviewFeedback,
}

fn clock(body: &TurnBody) -> Result<Clock, AppError> {
    for (name, value) in [
        ("elapsedSeconds", body.elapsed_seconds),
        ("totalDurationSeconds", body.total_duration_seconds),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::Validation(format!(
                "{name} must be a finite, non-negative number"
            )));
        }
    }
    Ok(Clock::new(body.elapsed_seconds, body.total_duration_seconds))
}

/// POST /api/v1/interviews/:id/turn
pub async fn handle_turn(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
    Json(body): Json<TurnBody>,
) -> Result<Json<TurnResponse>, AppError> {
    let clock = clock(&body)?;
    let request = TurnRequest {
        session_key: interview_id,
        utterance: body.utterance,
        clock,
        time_exceeded: body.time_exceeded,
        identity: CandidateIdentity::new(body.candidate_name, body.candidate_email),
    };
    Ok(Json(state.engine.turn(request).await))
}

/// DELETE /api/v1/interviews/:id/session
pub async fn handle_clear_session(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
) -> StatusCode {
    state.engine.clear(&interview_id);
    StatusCode::NO_CONTENT
}

/// GET /api/v1/interviews/:id/session
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
) -> Result<Json<SessionSnapshot>, AppError> {
    state
        .engine
        .snapshot(&interview_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("No active session for interview {interview_id}")))
}

/// POST /api/v1/interviews/:id/feedback
pub async fn handle_finalize_feedback(
    State(state): State<AppState>,
    Path(interview_id): Path<String>,
    Json(body): Json<FeedbackBody>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let identity = CandidateIdentity::new(body.candidate_name, body.candidate_email);
    let transcript = body.transcript.map(|turns| {
        turns
            .into_iter()
            .map(|t| Turn::new(t.role, t.text))
            .collect::<Vec<_>>()
    });

    let (feedback, row) = state
        .engine
        .finalize(&interview_id, &identity, transcript)
        .await?;

    if body.clear_session {
        state.engine.clear(&interview_id);
    }

    Ok(Json(FeedbackResponse {
        feedback_id: row.id,
        interview_id: row.interview_id,
        candidate_email: row.candidate_email,
        feedback,
    }))
}
