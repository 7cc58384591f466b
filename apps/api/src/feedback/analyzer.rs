//! Scores one candidate answer against its question.
//!
//! Fire-and-forget from the conversation's point of view. Scoring is
//! best-effort; transcript capture is not: if the model path fails, the raw
//! Q/A pair is still persisted without ratings.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::feedback::prompts::{ANALYSIS_PROMPT_TEMPLATE, ANALYSIS_SYSTEM};
use crate::feedback::store::FeedbackStore;
use crate::llm_client::prompts::{clip, JSON_ONLY_SYSTEM};
use crate::llm_client::{Generation, ModelChain};
use crate::models::feedback::{AnswerAssessment, AnswerRecord};

const ENSURE_ATTEMPTS: u32 = 3;
const ENSURE_BACKOFF: Duration = Duration::from_millis(250);

/// Everything needed to analyze one answer, detached from the session.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub interview_id: String,
    pub feedback_id: Uuid,
    pub sequence_number: u32,
    pub question_type: String,
    pub question: String,
    pub answer: String,
    pub job_position: Option<String>,
}

#[derive(Clone)]
pub struct AnswerAnalyzer {
    chain: ModelChain,
    store: Arc<dyn FeedbackStore>,
}

impl AnswerAnalyzer {
    pub fn new(chain: ModelChain, store: Arc<dyn FeedbackStore>) -> Self {
        Self { chain, store }
    }

    /// Scores and persists one answer. Never returns an error to the caller.
    pub async fn analyze(&self, job: AnalysisJob) {
        let assessment = self.assess(&job).await;
        let scored = assessment.is_some();

        let mut record = AnswerRecord {
            interview_id: job.interview_id,
            feedback_id: job.feedback_id,
            sequence_number: job.sequence_number,
            question_type: job.question_type,
            question: job.question,
            answer: job.answer,
            assessment,
        };

        let Err(e) = self.store.save_analysis(&record).await else {
            info!(
                "Saved analysis #{} for interview {} (scored={scored})",
                record.sequence_number, record.interview_id
            );
            return;
        };
        if !scored {
            error!(
                "Failed to persist analysis #{} for interview {}: {e}",
                record.sequence_number, record.interview_id
            );
            return;
        }

        warn!(
            "Scored analysis #{} for interview {} not saved ({e}); retrying without ratings",
            record.sequence_number, record.interview_id
        );
        record.assessment = None;
        if let Err(e) = self.store.save_analysis(&record).await {
            error!(
                "Failed to persist raw answer #{} for interview {}: {e}",
                record.sequence_number, record.interview_id
            );
        }
    }

    /// Finds or creates the candidate's feedback record, retrying store
    /// failures with a linear backoff. `None` once every attempt failed.
    pub async fn resolve_feedback_id(
        &self,
        interview_id: &str,
        candidate_email: &str,
        candidate_name: Option<&str>,
    ) -> Option<Uuid> {
        for attempt in 1..=ENSURE_ATTEMPTS {
            match self
                .store
                .ensure_feedback(interview_id, candidate_email, candidate_name)
                .await
            {
                Ok(id) => return Some(id),
                Err(e) if attempt < ENSURE_ATTEMPTS => {
                    warn!("Feedback record for {interview_id} unavailable (attempt {attempt}): {e}");
                    tokio::time::sleep(ENSURE_BACKOFF * attempt).await;
                }
                Err(e) => {
                    error!("Feedback record for {interview_id} unavailable after {attempt} attempts: {e}");
                }
            }
        }
        None
    }

    async fn assess(&self, job: &AnalysisJob) -> Option<AnswerAssessment> {
        let prompt = ANALYSIS_PROMPT_TEMPLATE
            .replace("{job_position}", job.job_position.as_deref().unwrap_or("(unspecified)"))
            .replace("{question_type}", &job.question_type)
            .replace("{question}", &clip(&job.question))
            .replace("{answer}", &clip(&job.answer))
            .replace("{json_only}", JSON_ONLY_SYSTEM);

        match self
            .chain
            .run_json::<AnswerAssessment>(ANALYSIS_SYSTEM, &prompt)
            .await
        {
            Generation::Parsed(assessment) => Some(assessment),
            Generation::Malformed { model, .. } => {
                warn!(
                    "Analysis #{} for {}: unparseable output from {model}; storing raw answer",
                    job.sequence_number, job.interview_id
                );
                None
            }
            Generation::Unavailable => {
                warn!(
                    "Analysis #{} for {}: no model available; storing raw answer",
                    job.sequence_number, job.interview_id
                );
                None
            }
        }
    }
}
