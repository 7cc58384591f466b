// Prompt constants for the live interviewer.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for every interviewer reply.
pub const INTERVIEWER_SYSTEM: &str = "You are a professional, friendly interviewer \
    conducting a live spoken interview. Speak naturally in short turns (at most three \
    sentences), ask one question at a time, and never reveal scores or internal notes.";

/// Reply prompt. Replace: {job_block}, {resume_block}, {time_status}, {phase},
/// {phase_guidance}, {planned_question}, {history}, {json_only}
pub const TURN_PROMPT_TEMPLATE: &str = r#"{job_block}

{resume_block}

TIME: {time_status}
CURRENT PHASE: {phase}: {phase_guidance}

{planned_question}

RECENT CONVERSATION (oldest first):
{history}

Write the interviewer's next spoken turn. Briefly acknowledge the candidate's last answer, then continue.
Return a JSON object with this EXACT schema:
{
  "text": "what the interviewer says next",
  "questionType": "introduction" | "custom" | "resume" | "technical" | "behavioral" | "follow_up" | "closing",
  "isQuestion": true
}

{json_only}"#;

/// Greeting prompt. Replace: {job_block}, {candidate_name}, {json_only}
pub const GREETING_PROMPT_TEMPLATE: &str = r#"{job_block}

CANDIDATE NAME: {candidate_name}

Write a warm one- or two-sentence greeting that opens this interview, names the role, and
thanks the candidate for their time. Do NOT ask a question yet.
Return a JSON object: {"text": "the greeting"}

{json_only}"#;

pub const PLANNED_QUESTION_TEMPLATE: &str =
    "NEXT PLANNED QUESTION (ask this, rephrased naturally): {question}";

pub const NO_PLANNED_QUESTION: &str =
    "No planned question: ask a relevant open-ended follow-up about the candidate's last answer.";

pub const NO_JOB_BLOCK: &str = "JOB: (no job details available; keep questions general)";

pub const NO_RESUME_BLOCK: &str = "";

/// Second utterance of every interview.
pub const INTRODUCTION_PROMPT: &str =
    "To start, could you please introduce yourself and walk me through your background?";

pub const FALLBACK_GREETING: &str =
    "Hello, and thank you for joining us today. I'm looking forward to our conversation.";

pub const FALLBACK_PROBE: &str =
    "Thank you. Could you walk me through that in a bit more detail, with a concrete example?";

pub const FALLBACK_CLOSING: &str = "Thank you, that's very helpful. We're nearly out of time, \
    so to wrap up: is there anything you'd like to ask us about the role or the team?";

pub const FALLBACK_ACKNOWLEDGEMENT: &str = "Thank you for sharing that.";

/// Role-agnostic, forward-looking questions used when the caller reports time is up.
pub const CLOSING_QUESTIONS: &[&str] = &[
    "Before we finish, where do you see your career heading over the next few years?",
    "What kind of team culture helps you do your best work?",
    "What factors will matter most to you when deciding on your next role?",
    "What are you hoping to learn or grow into in your next position?",
    "Is there anything about your experience we haven't covered that you'd like us to know?",
];
