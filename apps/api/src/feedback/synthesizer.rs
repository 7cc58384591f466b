//! End-of-interview rating, summary and recommendation.
//!
//! Always returns a well-formed result: any backend or parse failure yields
//! the neutral fallback (midpoint ratings, not recommended, manual review).

use serde::Deserialize;
use tracing::{info, warn};

use crate::feedback::prompts::*;
use crate::interview::responder::{format_history, job_block, resume_block};
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{Generation, ModelChain};
use crate::models::feedback::{InterviewFeedback, OverallRatings};
use crate::models::interview::InterviewContext;
use crate::models::resume::ResumeContext;
use crate::session::state::Turn;

/// Number of most recent turns included in the synthesis prompt.
pub const TRANSCRIPT_WINDOW: usize = 20;

/// Model output. `ratings` and `summary` are required: a reply without them
/// is treated as unparseable rather than silently defaulted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelFeedback {
    ratings: OverallRatings,
    summary: String,
    #[serde(default)]
    recommended: bool,
    #[serde(default)]
    recommendation_message: String,
}

pub fn fallback_feedback() -> InterviewFeedback {
    InterviewFeedback {
        ratings: OverallRatings::MIDPOINT,
        summary: FALLBACK_SUMMARY.to_string(),
        recommended: false,
        recommendation_message: FALLBACK_RECOMMENDATION.to_string(),
    }
}

#[derive(Clone)]
pub struct FeedbackSynthesizer {
    chain: ModelChain,
}

impl FeedbackSynthesizer {
    pub fn new(chain: ModelChain) -> Self {
        Self { chain }
    }

    pub async fn synthesize(
        &self,
        conversation: &[Turn],
        interview: Option<&InterviewContext>,
        resume: Option<&ResumeContext>,
    ) -> InterviewFeedback {
        if conversation.is_empty() {
            info!("Synthesis requested for an empty transcript; returning neutral result");
            return InterviewFeedback {
                summary: EMPTY_TRANSCRIPT_SUMMARY.to_string(),
                ..fallback_feedback()
            };
        }

        let window = &conversation[conversation.len().saturating_sub(TRANSCRIPT_WINDOW)..];
        let prompt = SYNTHESIS_PROMPT_TEMPLATE
            .replace("{job_block}", &job_block(interview))
            .replace("{resume_block}", &resume_block(resume))
            .replace("{transcript}", &format_history(window))
            .replace("{json_only}", JSON_ONLY_SYSTEM);

        match self
            .chain
            .run_json::<ModelFeedback>(SYNTHESIS_SYSTEM, &prompt)
            .await
        {
            Generation::Parsed(parsed) if !parsed.summary.trim().is_empty() => {
                let recommendation_message = if parsed.recommendation_message.trim().is_empty() {
                    if parsed.recommended {
                        "Recommended for the next stage.".to_string()
                    } else {
                        "Not recommended at this time.".to_string()
                    }
                } else {
                    parsed.recommendation_message.trim().to_string()
                };
                InterviewFeedback {
                    ratings: parsed.ratings,
                    summary: parsed.summary.trim().to_string(),
                    recommended: parsed.recommended,
                    recommendation_message,
                }
            }
            Generation::Parsed(_) => {
                warn!("Synthesis reply had an empty summary; using neutral fallback");
                fallback_feedback()
            }
            Generation::Malformed { model, .. } => {
                warn!("Synthesis output from {model} could not be parsed; using neutral fallback");
                fallback_feedback()
            }
            Generation::Unavailable => {
                warn!("No model available for synthesis; using neutral fallback");
                fallback_feedback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{chain, ScriptedBackend};
    use crate::session::state::Role;

    const MODEL_OUTPUT: &str = r#"Here is my evaluation:
    {"ratings": {"technical": 8, "communication": 9, "problemSolving": 7, "experience": 6},
     "summary": "Strong systems knowledge, clear communicator.",
     "recommended": true,
     "recommendationMessage": "Advance to the onsite loop."}"#;

    fn transcript(n: usize) -> Vec<Turn> {
        (0..n)
            .map(|i| {
                let role = if i % 2 == 0 {
                    Role::Interviewer
                } else {
                    Role::Candidate
                };
                Turn::new(role, format!("line {i}"))
            })
            .collect()
    }

    #[tokio::test]
    async fn test_parsed_feedback_is_returned() {
        let synth = FeedbackSynthesizer::new(chain(ScriptedBackend::always(MODEL_OUTPUT)));
        let feedback = synth.synthesize(&transcript(6), None, None).await;

        assert_eq!(feedback.ratings.technical, 8);
        assert_eq!(feedback.ratings.problem_solving, 7);
        assert!(feedback.recommended);
        assert_eq!(feedback.recommendation_message, "Advance to the onsite loop.");
    }

    #[tokio::test]
    async fn test_same_transcript_same_result() {
        let synth = FeedbackSynthesizer::new(chain(ScriptedBackend::always(MODEL_OUTPUT)));
        let turns = transcript(30);

        let first = synth.synthesize(&turns, None, None).await;
        let second = synth.synthesize(&turns, None, None).await;
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_backend_failure_yields_neutral_fallback() {
        let synth = FeedbackSynthesizer::new(chain(ScriptedBackend::failing()));
        let feedback = synth.synthesize(&transcript(4), None, None).await;

        assert_eq!(feedback.ratings, OverallRatings::MIDPOINT);
        assert!(!feedback.recommended);
        assert!(feedback.recommendation_message.contains("Manual review"));
    }

    #[tokio::test]
    async fn test_missing_summary_is_treated_as_unparseable() {
        let synth = FeedbackSynthesizer::new(chain(ScriptedBackend::always(
            r#"{"ratings": {"technical": 9}, "recommended": true}"#,
        )));
        let feedback = synth.synthesize(&transcript(4), None, None).await;
        assert_eq!(feedback, fallback_feedback());
    }

    #[tokio::test]
    async fn test_empty_transcript_skips_backend() {
        let backend = ScriptedBackend::always(MODEL_OUTPUT);
        let synth = FeedbackSynthesizer::new(chain(backend.clone()));
        let feedback = synth.synthesize(&[], None, None).await;

        assert_eq!(feedback.summary, EMPTY_TRANSCRIPT_SUMMARY);
        assert!(backend.called_models().is_empty());
    }
}
