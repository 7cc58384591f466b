//! Resolves the job specification and the best-matching résumé
//! for a session. Runs once per session; store failures degrade to "absent".

use std::sync::Arc;

use tracing::{info, warn};

use crate::context::source::{ContextSource, ResumeMatch};
use crate::models::interview::InterviewContext;
use crate::models::resume::ResumeContext;

/// Who is on the other end of the session, as far as the caller knows.
#[derive(Debug, Clone, Default)]
pub struct CandidateIdentity {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl CandidateIdentity {
    pub fn new(name: Option<String>, email: Option<String>) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            name: clean(name),
            email: clean(email),
        }
    }
}

/// Immutable context shared by every later step of a session.
#[derive(Debug, Clone, Default)]
pub struct LoadedContext {
    pub interview: Option<InterviewContext>,
    pub resume: Option<ResumeContext>,
}

pub struct ContextLoader {
    source: Arc<dyn ContextSource>,
    /// Whether the "any résumé for this interview" tier may be used.
    allow_unmatched_resume: bool,
}

impl ContextLoader {
    pub fn new(source: Arc<dyn ContextSource>, allow_unmatched_resume: bool) -> Self {
        Self {
            source,
            allow_unmatched_resume,
        }
    }

    pub async fn load(&self, interview_id: &str, identity: &CandidateIdentity) -> LoadedContext {
        let interview = match self.source.interview(interview_id).await {
            Ok(Some(interview)) => Some(interview),
            Ok(None) => {
                warn!("No interview definition found for {interview_id}");
                None
            }
            Err(e) => {
                warn!("Interview lookup failed for {interview_id}: {e}");
                None
            }
        };

        let resume = self.match_resume(interview_id, identity).await;

        info!(
            "Context loaded for {interview_id}: interview={}, resume={}",
            interview.is_some(),
            resume.is_some()
        );

        LoadedContext { interview, resume }
    }

    /// Walks the matching tiers in priority order; a tier runs only if the
    /// previous one returned no rows.
    async fn match_resume(
        &self,
        interview_id: &str,
        identity: &CandidateIdentity,
    ) -> Option<ResumeContext> {
        let mut tiers = Vec::with_capacity(3);
        if let (Some(name), Some(email)) = (identity.name.as_deref(), identity.email.as_deref()) {
            tiers.push(ResumeMatch::NameAndEmail { name, email });
        }
        if let Some(email) = identity.email.as_deref() {
            tiers.push(ResumeMatch::Email(email));
        }
        if self.allow_unmatched_resume {
            tiers.push(ResumeMatch::AnyForInterview);
        }

        for tier in tiers {
            match self.source.resumes(interview_id, tier).await {
                Ok(rows) => {
                    if let Some(resume) = rows.into_iter().next() {
                        if tier == ResumeMatch::AnyForInterview {
                            warn!(
                                "Attached unverified résumé of {} to {interview_id}; candidate identity not confirmed",
                                resume.candidate_email
                            );
                        } else {
                            info!("Résumé matched for {interview_id} by {}", tier.label());
                        }
                        return Some(resume);
                    }
                }
                Err(e) => {
                    warn!("Résumé lookup ({}) failed for {interview_id}: {e}", tier.label());
                    return None;
                }
            }
        }

        None
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn source_with_resumes() -> MemoryContextSource {
        MemoryContextSource {
            interviews: vec![("iv-1".to_string(), interview(&["Why us?"]))],
            resumes: vec![
                ("iv-1".to_string(), resume("Ada", "ada@example.com")),
                ("iv-1".to_string(), resume("Grace", "grace@example.com")),
                ("iv-1".to_string(), resume("Ada L.", "ada@example.com")),
            ],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_exact_match_wins() {
        let source = Arc::new(source_with_resumes());
        let loader = ContextLoader::new(source.clone(), true);
        let identity = CandidateIdentity::new(Some("Ada".into()), Some("ada@example.com".into()));

        let ctx = loader.load("iv-1", &identity).await;
        assert_eq!(ctx.resume.unwrap().candidate_name, "Ada");
        assert!(ctx.interview.is_some());
        assert_eq!(*source.tiers_queried.lock().unwrap(), vec!["name+email"]);
    }

    #[tokio::test]
    async fn test_email_only_tier_takes_most_recent() {
        let source = Arc::new(source_with_resumes());
        let loader = ContextLoader::new(source.clone(), true);
        let identity =
            CandidateIdentity::new(Some("Someone".into()), Some("ada@example.com".into()));

        let ctx = loader.load("iv-1", &identity).await;
        assert_eq!(ctx.resume.unwrap().candidate_name, "Ada L.");
        assert_eq!(
            *source.tiers_queried.lock().unwrap(),
            vec!["name+email", "email"]
        );
    }

    #[tokio::test]
    async fn test_any_resume_tier_only_when_enabled() {
        let identity = CandidateIdentity::new(None, Some("nobody@example.com".into()));

        let enabled = ContextLoader::new(Arc::new(source_with_resumes()), true);
        let ctx = enabled.load("iv-1", &identity).await;
        assert_eq!(ctx.resume.unwrap().candidate_name, "Ada L.");

        let disabled = ContextLoader::new(Arc::new(source_with_resumes()), false);
        assert!(disabled.load("iv-1", &identity).await.resume.is_none());
    }

    #[tokio::test]
    async fn test_no_identity_and_no_fallback_yields_none() {
        let source = Arc::new(source_with_resumes());
        let loader = ContextLoader::new(source.clone(), false);
        let ctx = loader.load("iv-1", &CandidateIdentity::default()).await;
        assert!(ctx.resume.is_none());
        assert!(source.tiers_queried.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_degrades_to_absent() {
        let source = MemoryContextSource {
            fail: true,
            ..source_with_resumes()
        };
        let loader = ContextLoader::new(Arc::new(source), true);
        let identity = CandidateIdentity::new(Some("Ada".into()), Some("ada@example.com".into()));

        let ctx = loader.load("iv-1", &identity).await;
        assert!(ctx.interview.is_none());
        assert!(ctx.resume.is_none());
    }

    #[test]
    fn test_identity_blank_values_are_dropped() {
        let identity = CandidateIdentity::new(Some("  ".into()), Some(" a@b.c ".into()));
        assert!(identity.name.is_none());
        assert_eq!(identity.email.as_deref(), Some("a@b.c"));
    }
}
