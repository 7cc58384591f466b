//! Interview phase state machine.
//!
//! Phases only move forward, one step per evaluation, driven by the total
//! number of recorded turns. Time pressure overrides everything and jumps
//! straight to `Closing`.

use serde::{Deserialize, Serialize};

/// Fraction of the scheduled duration after which the interview must close.
pub const CLOSING_TIME_FRACTION: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Introduction,
    CustomQuestions,
    ResumeBased,
    TechnicalDeepDive,
    Behavioral,
    Closing,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Introduction => "introduction",
            Phase::CustomQuestions => "custom_questions",
            Phase::ResumeBased => "resume_based",
            Phase::TechnicalDeepDive => "technical_deep_dive",
            Phase::Behavioral => "behavioral",
            Phase::Closing => "closing",
        }
    }

    /// The following phase and the turn count at which it is entered.
    fn successor(self) -> Option<(Phase, usize)> {
        match self {
            Phase::Introduction => Some((Phase::CustomQuestions, 3)),
            Phase::CustomQuestions => Some((Phase::ResumeBased, 8)),
            Phase::ResumeBased => Some((Phase::TechnicalDeepDive, 15)),
            Phase::TechnicalDeepDive => Some((Phase::Behavioral, 22)),
            Phase::Behavioral => Some((Phase::Closing, 28)),
            Phase::Closing => None,
        }
    }

    /// Interviewer guidance for the phase, placed in the reply prompt.
    pub fn guidance(self) -> &'static str {
        match self {
            Phase::Introduction => "Build rapport and learn the candidate's background.",
            Phase::CustomQuestions => "Work through the hiring team's prepared questions.",
            Phase::ResumeBased => "Probe specific projects and roles from the résumé.",
            Phase::TechnicalDeepDive => {
                "Go deep on technical decisions, trade-offs and problem solving."
            }
            Phase::Behavioral => "Explore teamwork, conflict, ownership and communication.",
            Phase::Closing => "Wrap up warmly and invite the candidate's final questions.",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Elapsed and scheduled interview time, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Clock {
    pub elapsed_secs: f64,
    pub total_secs: f64,
}

impl Clock {
    pub fn new(elapsed_secs: f64, total_secs: f64) -> Self {
        Self {
            elapsed_secs,
            total_secs,
        }
    }

    /// True once elapsed time reaches the closing fraction. A zero schedule never expires.
    pub fn past_closing_point(&self) -> bool {
        self.total_secs > 0.0 && self.elapsed_secs >= CLOSING_TIME_FRACTION * self.total_secs
    }

    pub fn remaining_secs(&self) -> f64 {
        (self.total_secs - self.elapsed_secs).max(0.0)
    }

    /// Substitutes the scheduled length when the client reported no total.
    pub fn or_scheduled(self, scheduled_secs: f64) -> Self {
        if self.total_secs > 0.0 {
            return self;
        }
        Self {
            total_secs: scheduled_secs.max(0.0),
            ..self
        }
    }
}

/// Computes the phase after one exchange.
pub fn evaluate(current: Phase, turns: usize, clock: Clock, time_exceeded: bool) -> Phase {
    if time_exceeded || clock.past_closing_point() {
        return Phase::Closing;
    }
    match current.successor() {
        Some((next, threshold)) if turns >= threshold => next,
        _ => current,
    }
}
