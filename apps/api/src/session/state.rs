use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::interview::phase::{self, Clock, Phase};

/// Upper bound on stored turns.
pub const MAX_LOG_TURNS: usize = 25;
/// Opening turns (greeting + first prompt) that survive truncation.
pub const PRESERVED_HEAD: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Candidate,
    Interviewer,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            at: Utc::now(),
        }
    }
}

/// The question an interviewer utterance asked. Stays current until another
/// question is asked; statements leave it in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AskedQuestion {
    pub text: String,
    pub question_type: String,
}

/// A phase change produced by one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Phase,
    pub to: Phase,
}

/// Mutable per-session interview state. Only reachable through the session lock.
#[derive(Debug)]
pub struct Session {
    log: Vec<Turn>,
    turns_recorded: usize,
    phase: Phase,
    asked: HashSet<String>,
    asked_order: Vec<String>,
    sequence: u32,
    time_exceeded: bool,
    last_question: Option<AskedQuestion>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            log: Vec::new(),
            turns_recorded: 0,
            phase: Phase::Introduction,
            asked: HashSet::new(),
            asked_order: Vec::new(),
            sequence: 0,
            time_exceeded: false,
            last_question: None,
        }
    }

    pub fn log(&self) -> &[Turn] {
        &self.log
    }

    /// Most recent `n` turns, oldest first.
    pub fn recent(&self, n: usize) -> &[Turn] {
        &self.log[self.log.len().saturating_sub(n)..]
    }

    /// Total turns ever recorded; unaffected by truncation.
    pub fn turns_recorded(&self) -> usize {
        self.turns_recorded
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn time_exceeded(&self) -> bool {
        self.time_exceeded
    }

    pub fn mark_time_exceeded(&mut self) {
        self.time_exceeded = true;
    }

    pub fn asked_questions(&self) -> &[String] {
        &self.asked_order
    }

    pub fn last_question(&self) -> Option<&AskedQuestion> {
        self.last_question.as_ref()
    }

    /// Appends a turn, truncating the middle of the log once it exceeds the bound.
    pub fn record(&mut self, role: Role, text: impl Into<String>) {
        self.log.push(Turn::new(role, text));
        self.turns_recorded += 1;

        if self.log.len() > MAX_LOG_TURNS {
            let keep_tail = MAX_LOG_TURNS - PRESERVED_HEAD;
            let drop_end = self.log.len() - keep_tail;
            self.log.drain(PRESERVED_HEAD..drop_end);
        }
    }

    /// Records an interviewer utterance; questions replace the current question.
    pub fn record_interviewer(&mut self, text: &str, question: Option<AskedQuestion>) {
        self.record(Role::Interviewer, text);
        if question.is_some() {
            self.last_question = question;
        }
    }

    pub fn last_interviewer_turn(&self) -> Option<&Turn> {
        self.log.iter().rev().find(|t| t.role == Role::Interviewer)
    }

    pub fn was_asked(&self, question: &str) -> bool {
        self.asked.contains(question.trim())
    }

    /// Adds a question to the asked-set. Returns false if it was already there.
    pub fn mark_asked(&mut self, question: &str) -> bool {
        let key = question.trim().to_string();
        if self.asked.insert(key.clone()) {
            self.asked_order.push(key);
            true
        } else {
            false
        }
    }

    /// Next value of the per-session analysis sequence, starting at 1.
    pub fn next_sequence(&mut self) -> u32 {
        self.sequence += 1;
        self.sequence
    }

    /// Re-evaluates the phase against the current turn count and clock.
    pub fn advance_phase(&mut self, clock: Clock) -> Option<Transition> {
        let to = phase::evaluate(self.phase, self.turns_recorded, clock, self.time_exceeded);
        if to == self.phase {
            return None;
        }
        let transition = Transition {
            from: self.phase,
            to,
        };
        self.phase = to;
        Some(transition)
    }

    /// Jumps straight to closing; used when the caller reports time is up.
    pub fn force_closing(&mut self) -> Option<Transition> {
        self.time_exceeded = true;
        self.advance_phase(Clock::default())
    }
}
