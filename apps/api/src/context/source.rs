//! Read-only access to interview definitions and résumé records.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::{with_timeout, StoreError};
use crate::models::interview::{InterviewContext, InterviewRow};
use crate::models::resume::{ResumeContext, ResumeRow};

/// One tier of the résumé matching policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeMatch<'a> {
    NameAndEmail { name: &'a str, email: &'a str },
    Email(&'a str),
    AnyForInterview,
}

impl ResumeMatch<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            ResumeMatch::NameAndEmail { .. } => "name+email",
            ResumeMatch::Email(_) => "email",
            ResumeMatch::AnyForInterview => "any-for-interview",
        }
    }
}

#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn interview(&self, interview_id: &str) -> Result<Option<InterviewContext>, StoreError>;

    /// Résumés for the interview matching `tier`, most recent first.
    async fn resumes(
        &self,
        interview_id: &str,
        tier: ResumeMatch<'_>,
    ) -> Result<Vec<ResumeContext>, StoreError>;
}

pub struct PgContextSource {
    pool: PgPool,
    timeout: Duration,
}

impl PgContextSource {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

#[async_trait]
impl ContextSource for PgContextSource {
    async fn interview(&self, interview_id: &str) -> Result<Option<InterviewContext>, StoreError> {
        let row = with_timeout(
            self.timeout,
            sqlx::query_as::<_, InterviewRow>(
                r#"
                SELECT job_position, job_description, duration_minutes,
                       interview_type, questions
                FROM interviews
                WHERE id = $1
                "#,
            )
            .bind(interview_id)
            .fetch_optional(&self.pool),
        )
        .await?;

        Ok(row.map(InterviewContext::from))
    }

    async fn resumes(
        &self,
        interview_id: &str,
        tier: ResumeMatch<'_>,
    ) -> Result<Vec<ResumeContext>, StoreError> {
        let query = match tier {
            ResumeMatch::NameAndEmail { name, email } => sqlx::query_as::<_, ResumeRow>(
                r#"
                SELECT candidate_name, candidate_email, experience_years, skills, projects,
                       work_history, education, certifications, achievements
                FROM resumes
                WHERE interview_id = $1 AND candidate_name = $2 AND candidate_email = $3
                ORDER BY created_at DESC
                "#,
            )
            .bind(interview_id)
            .bind(name)
            .bind(email),
            ResumeMatch::Email(email) => sqlx::query_as::<_, ResumeRow>(
                r#"
                SELECT candidate_name, candidate_email, experience_years, skills, projects,
                       work_history, education, certifications, achievements
                FROM resumes
                WHERE interview_id = $1 AND candidate_email = $2
                ORDER BY created_at DESC
                "#,
            )
            .bind(interview_id)
            .bind(email),
            ResumeMatch::AnyForInterview => sqlx::query_as::<_, ResumeRow>(
                r#"
                SELECT candidate_name, candidate_email, experience_years, skills, projects,
                       work_history, education, certifications, achievements
                FROM resumes
                WHERE interview_id = $1
                ORDER BY created_at DESC
                LIMIT 1
                "#,
            )
            .bind(interview_id),
        };

        let rows = with_timeout(self.timeout, query.fetch_all(&self.pool)).await?;
        Ok(rows.into_iter().map(ResumeContext::from).collect())
    }
}
