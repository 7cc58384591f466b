// Scoring pipeline: per-answer analysis during the interview and the
// end-of-interview synthesis, plus the store both write to.

pub mod analyzer;
pub mod prompts;
pub mod store;
pub mod synthesizer;
