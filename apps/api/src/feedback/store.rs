//! Write path for analysis records and the single feedback record per candidate.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::db::{with_timeout, StoreError};
use crate::models::feedback::{AnswerRecord, FeedbackRow, InterviewFeedback};

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Finds or creates the feedback record for (interview, candidate email).
    async fn ensure_feedback(
        &self,
        interview_id: &str,
        candidate_email: &str,
        candidate_name: Option<&str>,
    ) -> Result<Uuid, StoreError>;

    /// Appends one analysis record. `assessment == None` stores the raw Q/A only.
    async fn save_analysis(&self, record: &AnswerRecord) -> Result<(), StoreError>;

    /// Attaches the synthesized result to the one record for (interview, email).
    async fn upsert_feedback(
        &self,
        interview_id: &str,
        candidate_email: &str,
        candidate_name: Option<&str>,
        feedback: &InterviewFeedback,
    ) -> Result<FeedbackRow, StoreError>;
}

pub struct PgFeedbackStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgFeedbackStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl FeedbackStore for PgFeedbackStore {
    async fn ensure_feedback(
        &self,
        interview_id: &str,
        candidate_email: &str,
        candidate_name: Option<&str>,
    ) -> Result<Uuid, StoreError> {
        // No-op update so RETURNING yields the id on conflict as well.
        let id: Uuid = with_timeout(
            self.timeout,
            sqlx::query_scalar(
                r#"
                INSERT INTO interview_feedback (id, interview_id, candidate_email, candidate_name)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (interview_id, candidate_email)
                DO UPDATE SET candidate_name = COALESCE(interview_feedback.candidate_name, EXCLUDED.candidate_name)
                RETURNING id
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(interview_id)
            .bind(candidate_email)
            .bind(candidate_name)
            .fetch_one(&self.pool),
        )
        .await?;

        Ok(id)
    }

    async fn save_analysis(&self, record: &AnswerRecord) -> Result<(), StoreError> {
        let assessment = record.assessment.as_ref();
        let ratings = assessment.map(|a| a.ratings);

        with_timeout(
            self.timeout,
            sqlx::query(
                r#"
                INSERT INTO conversation_analysis
                    (id, interview_id, feedback_id, sequence_number, question_type, question, answer,
                     technical_rating, communication_rating, problem_solving_rating,
                     experience_rating, overall_rating, expected_answer, feedback, insights)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&record.interview_id)
            .bind(record.feedback_id)
            .bind(record.sequence_number as i32)
            .bind(&record.question_type)
            .bind(&record.question)
            .bind(&record.answer)
            .bind(ratings.map(|r| r.technical as i16))
            .bind(ratings.map(|r| r.communication as i16))
            .bind(ratings.map(|r| r.problem_solving as i16))
            .bind(ratings.map(|r| r.experience_relevance as i16))
            .bind(ratings.map(|r| r.overall as i16))
            .bind(assessment.map(|a| a.expected_answer.clone()))
            .bind(assessment.map(|a| a.feedback.clone()))
            .bind(assessment.map(|a| a.insights.clone()))
            .execute(&self.pool),
        )
        .await?;

        Ok(())
    }

    async fn upsert_feedback(
        &self,
        interview_id: &str,
        candidate_email: &str,
        candidate_name: Option<&str>,
        feedback: &InterviewFeedback,
    ) -> Result<FeedbackRow, StoreError> {
        let row = with_timeout(
            self.timeout,
            sqlx::query_as::<_, FeedbackRow>(
                r#"
                INSERT INTO interview_feedback
                    (id, interview_id, candidate_email, candidate_name,
                     technical_rating, communication_rating, problem_solving_rating,
                     experience_rating, summary, recommended, recommendation_message)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (interview_id, candidate_email) DO UPDATE SET
                    candidate_name = COALESCE(EXCLUDED.candidate_name, interview_feedback.candidate_name),
                    technical_rating = EXCLUDED.technical_rating,
                    communication_rating = EXCLUDED.communication_rating,
                    problem_solving_rating = EXCLUDED.problem_solving_rating,
                    experience_rating = EXCLUDED.experience_rating,
                    summary = EXCLUDED.summary,
                    recommended = EXCLUDED.recommended,
                    recommendation_message = EXCLUDED.recommendation_message,
                    updated_at = NOW()
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(interview_id)
            .bind(candidate_email)
            .bind(candidate_name)
            .bind(feedback.ratings.technical as i16)
            .bind(feedback.ratings.communication as i16)
            .bind(feedback.ratings.problem_solving as i16)
            .bind(feedback.ratings.experience as i16)
            .bind(&feedback.summary)
            .bind(feedback.recommended)
            .bind(&feedback.recommendation_message)
            .fetch_optional(&self.pool),
        )
        .await?
        .ok_or_else(|| {
            StoreError::NotFound(format!(
                "feedback record for {interview_id} / {candidate_email}"
            ))
        })?;

        info!("Feedback record {} upserted for interview {interview_id}", row.id);
        Ok(row)
    }
}
