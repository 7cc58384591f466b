// Prompt constants for answer analysis and end-of-interview synthesis.

pub const ANALYSIS_SYSTEM: &str = "You are a senior technical interviewer reviewing a single \
    answer from a recorded interview. Score fairly and concretely. \
    Ratings are integers from 1 (very poor) to 10 (outstanding).";

/// Replace: {job_position}, {question_type}, {question}, {answer}, {json_only}
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"ROLE: {job_position}
QUESTION TYPE: {question_type}

QUESTION:
{question}

CANDIDATE ANSWER:
{answer}

Assess this answer. Return a JSON object with this EXACT schema:
{
  "ratings": {
    "technical": 7,
    "communication": 8,
    "problemSolving": 6,
    "experienceRelevance": 7,
    "overall": 7
  },
  "expectedAnswer": "what a strong answer would have covered",
  "feedback": "two or three sentences of specific feedback",
  "insights": ["short observation", "short observation"]
}

{json_only}"#;

pub const SYNTHESIS_SYSTEM: &str = "You are a hiring panel lead writing the final evaluation \
    of a completed interview. Base every judgement on the transcript. \
    Ratings are integers from 1 (very poor) to 10 (outstanding).";

/// Replace: {job_block}, {resume_block}, {transcript}, {json_only}
pub const SYNTHESIS_PROMPT_TEMPLATE: &str = r#"{job_block}

{resume_block}

INTERVIEW TRANSCRIPT (most recent portion, oldest first):
{transcript}

Evaluate the candidate. Return a JSON object with this EXACT schema:
{
  "ratings": {
    "technical": 7,
    "communication": 8,
    "problemSolving": 6,
    "experience": 7
  },
  "summary": "a short paragraph summarising the candidate's performance",
  "recommended": true,
  "recommendationMessage": "one sentence explaining the hiring recommendation"
}

{json_only}"#;

pub const FALLBACK_SUMMARY: &str =
    "Automated evaluation could not be completed for this interview.";

pub const FALLBACK_RECOMMENDATION: &str =
    "Automated scoring was unavailable. Manual review of the transcript is needed.";

pub const EMPTY_TRANSCRIPT_SUMMARY: &str =
    "No conversation was recorded for this interview.";
