//! Turns session state into the interviewer's next utterance(s).
//!
//! Ordinary turns go through the model chain and JSON repair; anything that
//! fails on that path falls back to deterministic text chosen from the phase
//! and flags. The time-exceeded path never touches the network.

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::interview::phase::{Clock, Phase};
use crate::interview::prompts::*;
use crate::interview::questions::SelectedQuestion;
use crate::llm_client::prompts::{clip, JSON_ONLY_SYSTEM};
use crate::llm_client::{Generation, ModelChain};
use crate::models::interview::InterviewContext;
use crate::models::resume::ResumeContext;
use crate::session::state::{AskedQuestion, Role, Turn};

/// Utterance text the client sends when the interview clock has run out.
pub const TIME_EXCEEDED_SENTINEL: &str = "__TIME_EXCEEDED__";

/// What the candidate side sent this turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateInput {
    /// No utterance: the session is starting (or the client is re-syncing).
    Start,
    TimeExceeded,
    Utterance(String),
}

impl CandidateInput {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => CandidateInput::Start,
            Some(TIME_EXCEEDED_SENTINEL) => CandidateInput::TimeExceeded,
            Some(text) => CandidateInput::Utterance(text.to_string()),
        }
    }
}

/// One spoken interviewer turn as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utterance {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_question: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question_type: Option<String>,
}

impl Utterance {
    pub fn statement(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_question: Some(false),
            question_type: None,
        }
    }

    pub fn question(text: impl Into<String>, question_type: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_question: Some(true),
            question_type: Some(question_type.into()),
        }
    }

    /// The bookkeeping entry for the answer analyzer, if this is a question.
    pub fn as_asked(&self) -> Option<AskedQuestion> {
        (self.is_question == Some(true)).then(|| AskedQuestion {
            text: self.text.clone(),
            question_type: self
                .question_type
                .clone()
                .unwrap_or_else(|| "follow_up".to_string()),
        })
    }
}

/// A generated turn plus whether it came from the model or the fallback path.
#[derive(Debug, Clone)]
pub struct ReplyTurn {
    pub utterance: Utterance,
    pub parsed: bool,
}

/// Snapshot of everything the reply prompt needs, taken under the session lock.
#[derive(Debug, Clone)]
pub struct ReplyInput {
    pub interview: Option<InterviewContext>,
    pub resume: Option<ResumeContext>,
    pub phase: Phase,
    pub clock: Clock,
    pub time_exceeded: bool,
    pub planned: Option<SelectedQuestion>,
    pub history: Vec<Turn>,
}

/// The shape the model is asked to produce. Everything optional: presence is
/// checked separately from parseability.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelReply {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    question_type: Option<String>,
    #[serde(default)]
    is_question: Option<bool>,
}

/// Picks one closing question uniformly at random. No I/O.
pub fn closing_question<R: Rng + ?Sized>(rng: &mut R) -> Utterance {
    let text = CLOSING_QUESTIONS
        .choose(rng)
        .copied()
        .unwrap_or(FALLBACK_CLOSING);
    Utterance::question(text, "closing")
}

/// Deterministic reply used whenever the model path yields nothing usable.
pub fn fallback_reply(
    phase: Phase,
    time_exceeded: bool,
    planned: Option<&SelectedQuestion>,
) -> Utterance {
    if time_exceeded || phase == Phase::Closing {
        return Utterance::question(FALLBACK_CLOSING, "closing");
    }
    match planned {
        Some(q) => Utterance::question(
            format!("{FALLBACK_ACKNOWLEDGEMENT} {}", q.text),
            q.question_type.clone(),
        ),
        None => Utterance::question(FALLBACK_PROBE, "follow_up"),
    }
}

pub fn job_block(interview: Option<&InterviewContext>) -> String {
    match interview {
        Some(i) => format!(
            "JOB POSITION: {}\nINTERVIEW TYPE: {}\nSCHEDULED DURATION: {} minutes\nJOB DESCRIPTION:\n{}",
            i.job_position,
            i.interview_type,
            i.duration_minutes,
            clip(&i.job_description)
        ),
        None => NO_JOB_BLOCK.to_string(),
    }
}

pub fn resume_block(resume: Option<&ResumeContext>) -> String {
    let Some(r) = resume else {
        return NO_RESUME_BLOCK.to_string();
    };

    let mut block = format!(
        "CANDIDATE: {} ({} years of experience)\nSKILLS: {}",
        r.candidate_name,
        r.experience_years,
        r.skills.join(", ")
    );
    if !r.projects.is_empty() {
        block.push_str("\nPROJECTS:");
        for p in &r.projects {
            block.push_str(&format!(
                "\n- {} [{}]: {}",
                p.name,
                p.technologies.join(", "),
                p.description
            ));
        }
    }
    if !r.work_history.is_empty() {
        block.push_str("\nWORK HISTORY:");
        for w in &r.work_history {
            block.push_str(&format!("\n- {} at {}", w.role, w.company));
            if let Some(d) = &w.duration {
                block.push_str(&format!(" ({d})"));
            }
            if let Some(desc) = w.description.as_deref().filter(|d| !d.trim().is_empty()) {
                block.push_str(&format!(": {desc}"));
            }
        }
    }
    if !r.education.is_empty() {
        block.push_str("\nEDUCATION:");
        for e in &r.education {
            block.push_str(&format!("\n- {}, {}", e.degree, e.institution));
            if let Some(year) = &e.year {
                block.push_str(&format!(" ({year})"));
            }
        }
    }
    if !r.certifications.is_empty() {
        block.push_str(&format!("\nCERTIFICATIONS: {}", r.certifications.join(", ")));
    }
    if !r.achievements.is_empty() {
        block.push_str(&format!("\nACHIEVEMENTS: {}", r.achievements.join("; ")));
    }
    clip(&block)
}

pub fn time_status(clock: Clock, time_exceeded: bool) -> String {
    if time_exceeded || clock.past_closing_point() {
        return "Time is nearly up. Begin wrapping up the interview now.".to_string();
    }
    if clock.total_secs <= 0.0 {
        return "No fixed schedule.".to_string();
    }
    format!(
        "{:.0} of {:.0} minutes remaining.",
        clock.remaining_secs() / 60.0,
        clock.total_secs / 60.0
    )
}

pub fn format_history(history: &[Turn]) -> String {
    if history.is_empty() {
        return "(no conversation yet)".to_string();
    }
    history
        .iter()
        .map(|t| {
            let speaker = match t.role {
                Role::Candidate => "Candidate",
                Role::Interviewer => "Interviewer",
            };
            format!("{speaker}: {}", t.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_turn_prompt(input: &ReplyInput) -> String {
    let planned = match &input.planned {
        Some(q) => PLANNED_QUESTION_TEMPLATE.replace("{question}", &q.text),
        None => NO_PLANNED_QUESTION.to_string(),
    };

    TURN_PROMPT_TEMPLATE
        .replace("{job_block}", &job_block(input.interview.as_ref()))
        .replace("{resume_block}", &resume_block(input.resume.as_ref()))
        .replace("{time_status}", &time_status(input.clock, input.time_exceeded))
        .replace("{phase}", input.phase.as_str())
        .replace("{phase_guidance}", input.phase.guidance())
        .replace("{planned_question}", &planned)
        .replace("{history}", &format_history(&input.history))
        .replace("{json_only}", JSON_ONLY_SYSTEM)
}

/// Talks to the model chain on behalf of the interview engine.
#[derive(Clone)]
pub struct Responder {
    chain: ModelChain,
    /// Caller-level budget for one reply, covering the whole chain.
    deadline: Duration,
}

impl Responder {
    pub fn new(chain: ModelChain, deadline: Duration) -> Self {
        Self { chain, deadline }
    }

    /// Greeting + introduction prompt for a fresh session.
    pub async fn opening(
        &self,
        interview: Option<&InterviewContext>,
        resume: Option<&ResumeContext>,
    ) -> Vec<Utterance> {
        let candidate_name = resume
            .map(|r| r.candidate_name.as_str())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("the candidate");
        let prompt = GREETING_PROMPT_TEMPLATE
            .replace("{job_block}", &job_block(interview))
            .replace("{candidate_name}", candidate_name)
            .replace("{json_only}", JSON_ONLY_SYSTEM);

        let greeting = match self.generate(&prompt).await {
            Some(ModelReply {
                text: Some(text), ..
            }) if !text.trim().is_empty() => text.trim().to_string(),
            _ => FALLBACK_GREETING.to_string(),
        };

        vec![
            Utterance::statement(greeting),
            Utterance::question(INTRODUCTION_PROMPT, "introduction"),
        ]
    }

    /// One interviewer turn for an ordinary exchange. Never fails.
    pub async fn reply(&self, input: &ReplyInput) -> ReplyTurn {
        let fallback = fallback_reply(input.phase, input.time_exceeded, input.planned.as_ref());
        let prompt = build_turn_prompt(input);

        match self.generate(&prompt).await {
            Some(ModelReply {
                text: Some(text),
                question_type,
                is_question,
            }) if !text.trim().is_empty() => {
                let is_question = is_question.unwrap_or_else(|| text.trim_end().ends_with('?'));
                let question_type = question_type
                    .filter(|t| !t.trim().is_empty())
                    .or_else(|| input.planned.as_ref().map(|q| q.question_type.clone()))
                    .unwrap_or_else(|| default_question_type(input.phase).to_string());
                ReplyTurn {
                    utterance: Utterance {
                        text: text.trim().to_string(),
                        is_question: Some(is_question),
                        question_type: is_question.then_some(question_type),
                    },
                    parsed: true,
                }
            }
            Some(_) => {
                warn!("Model reply had no usable text; using fallback for phase {}", input.phase);
                ReplyTurn {
                    utterance: fallback,
                    parsed: false,
                }
            }
            None => ReplyTurn {
                utterance: fallback,
                parsed: false,
            },
        }
    }

    /// Runs the chain under the caller deadline. `None` covers exhaustion,
    /// deadline expiry and unparseable output alike.
    async fn generate(&self, prompt: &str) -> Option<ModelReply> {
        let call = self.chain.run_json::<ModelReply>(INTERVIEWER_SYSTEM, prompt);
        match tokio::time::timeout(self.deadline, call).await {
            Ok(Generation::Parsed(reply)) => Some(reply),
            Ok(Generation::Malformed { model, raw }) => {
                info!("Falling back after malformed output from {model} ({} chars)", raw.len());
                None
            }
            Ok(Generation::Unavailable) => None,
            Err(_) => {
                warn!("Reply generation hit the {:?} deadline", self.deadline);
                None
            }
        }
    }
}

fn default_question_type(phase: Phase) -> &'static str {
    match phase {
        Phase::Introduction => "introduction",
        Phase::CustomQuestions => "custom",
        Phase::ResumeBased => "resume",
        Phase::TechnicalDeepDive => "technical",
        Phase::Behavioral => "behavioral",
        Phase::Closing => "closing",
    }
}
