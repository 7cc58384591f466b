//! Orchestrates one inbound turn end to end.
//!
//! Flow for an ordinary utterance:
//!   lock → record candidate turn → evaluate phase → select question →
//!   snapshot prompt input → unlock → spawn answer analysis →
//!   model reply (no lock held) → lock → append reply.
//!
//! The session lock is never held across a store or model await.

use std::sync::Arc;

use rand::thread_rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context::loader::{CandidateIdentity, LoadedContext};
use crate::errors::AppError;
use crate::feedback::analyzer::{AnalysisJob, AnswerAnalyzer};
use crate::feedback::store::FeedbackStore;
use crate::feedback::synthesizer::FeedbackSynthesizer;
use crate::interview::phase::{Clock, Phase};
use crate::interview::prompts::INTRODUCTION_PROMPT;
use crate::interview::questions::select_next;
use crate::interview::responder::{
    closing_question, fallback_reply, CandidateInput, ReplyInput, Responder, Utterance,
};
use crate::models::feedback::{FeedbackRow, InterviewFeedback};
use crate::session::state::{AskedQuestion, Role, Turn};
use crate::session::{SessionHandle, SessionStore};

/// Number of recent turns placed in the reply prompt.
pub const HISTORY_WINDOW: usize = 10;

/// Inbound trigger for one exchange.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub session_key: String,
    pub utterance: Option<String>,
    pub clock: Clock,
    pub time_exceeded: bool,
    pub identity: CandidateIdentity,
}

#[derive(Debug, Clone, Serialize)]
pub struct TurnResponse {
    pub utterances: Vec<Utterance>,
}

/// Read-only view of a session for the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_key: String,
    pub phase: Phase,
    pub turns_recorded: usize,
    pub time_exceeded: bool,
    pub context_loaded: bool,
    pub has_resume: bool,
    pub asked_questions: Vec<String>,
    pub current_question: Option<AskedQuestion>,
    pub log: Vec<Turn>,
}

pub struct InterviewEngine {
    sessions: SessionStore,
    responder: Responder,
    analyzer: AnswerAnalyzer,
    synthesizer: FeedbackSynthesizer,
    feedback_store: Arc<dyn FeedbackStore>,
}

impl InterviewEngine {
    pub fn new(
        sessions: SessionStore,
        responder: Responder,
        analyzer: AnswerAnalyzer,
        synthesizer: FeedbackSynthesizer,
        feedback_store: Arc<dyn FeedbackStore>,
    ) -> Self {
        Self {
            sessions,
            responder,
            analyzer,
            synthesizer,
            feedback_store,
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Handles one inbound turn. Always returns at least one non-empty utterance.
    pub async fn turn(&self, request: TurnRequest) -> TurnResponse {
        let handle = self
            .sessions
            .get_or_create(&request.session_key, &request.identity)
            .await;

        let utterances = match CandidateInput::from_raw(request.utterance.as_deref()) {
            CandidateInput::Start => self.open(&handle).await,
            CandidateInput::TimeExceeded => self.close_on_time(&handle).await,
            CandidateInput::Utterance(text) => self.exchange(&handle, &request, text).await,
        };

        TurnResponse { utterances }
    }

    /// Ends the session. Idempotent.
    pub fn clear(&self, session_key: &str) {
        if !self.sessions.clear(session_key) {
            debug!("Clear requested for unknown session {session_key}");
        }
    }

    pub async fn snapshot(&self, session_key: &str) -> Option<SessionSnapshot> {
        let handle = self.sessions.get(session_key)?;
        let context = handle.context();
        let session = handle.lock().await;
        Some(SessionSnapshot {
            session_key: handle.key().to_string(),
            phase: session.phase(),
            turns_recorded: session.turns_recorded(),
            time_exceeded: session.time_exceeded(),
            context_loaded: handle.context_loaded(),
            has_resume: context.resume.is_some(),
            asked_questions: session.asked_questions().to_vec(),
            current_question: session.last_question().cloned(),
            log: session.log().to_vec(),
        })
    }

    /// Synthesizes the final evaluation and attaches it to the single feedback
    /// record for (interview, candidate). Fails only on a missing email or the store.
    pub async fn finalize(
        &self,
        session_key: &str,
        identity: &CandidateIdentity,
        supplied_transcript: Option<Vec<Turn>>,
    ) -> Result<(InterviewFeedback, FeedbackRow), AppError> {
        let handle = self.sessions.get(session_key);

        let (transcript, context) = match &handle {
            Some(handle) => {
                let log = handle.lock().await.log().to_vec();
                (supplied_transcript.unwrap_or(log), handle.context())
            }
            None => (
                supplied_transcript.unwrap_or_default(),
                Arc::new(self.sessions.load_detached(session_key, identity).await),
            ),
        };

        let email = identity
            .email
            .clone()
            .or_else(|| context.resume.as_ref().map(|r| r.candidate_email.clone()))
            .ok_or_else(|| {
                AppError::Validation("candidate email is required to record feedback".into())
            })?;

        let feedback = self
            .synthesizer
            .synthesize(
                &transcript,
                context.interview.as_ref(),
                context.resume.as_ref(),
            )
            .await;

        let row = self
            .feedback_store
            .upsert_feedback(session_key, &email, identity.name.as_deref(), &feedback)
            .await?;

        info!(
            "Final feedback for {session_key}: recommended={}, record={}",
            feedback.recommended, row.id
        );
        Ok((feedback, row))
    }

    async fn open(&self, handle: &SessionHandle) -> Vec<Utterance> {
        {
            let session = handle.lock().await;
            if session.turns_recorded() > 0 {
                // Client re-sync: repeat what the interviewer last said.
                let repeat = session.last_interviewer_turn().map(|turn| {
                    match session.last_question().filter(|q| q.text == turn.text) {
                        Some(q) => Utterance::question(q.text.clone(), q.question_type.clone()),
                        None => Utterance::statement(turn.text.clone()),
                    }
                });
                return vec![repeat.unwrap_or_else(|| {
                    fallback_reply(session.phase(), session.time_exceeded(), None)
                })];
            }
        }

        let context = handle.context();
        handle
            .opening()
            .get_or_init(|| async {
                let opening = self
                    .responder
                    .opening(context.interview.as_ref(), context.resume.as_ref())
                    .await;
                let mut session = handle.lock().await;
                if !handle.is_cleared() {
                    for utterance in &opening {
                        session.record_interviewer(&utterance.text, utterance.as_asked());
                    }
                }
                info!("Opened interview {}", handle.key());
                opening
            })
            .await
            .clone()
    }

    async fn close_on_time(&self, handle: &SessionHandle) -> Vec<Utterance> {
        let utterance = closing_question(&mut thread_rng());
        let mut session = handle.lock().await;
        if let Some(t) = session.force_closing() {
            info!("{}: {} -> {} (time exceeded)", handle.key(), t.from, t.to);
        }
        session.record_interviewer(&utterance.text, utterance.as_asked());
        vec![utterance]
    }

    async fn exchange(
        &self,
        handle: &SessionHandle,
        request: &TurnRequest,
        answer: String,
    ) -> Vec<Utterance> {
        let context = handle.context();
        let scheduled_secs = context
            .interview
            .as_ref()
            .map_or(0.0, |i| f64::from(i.duration_minutes) * 60.0);
        let clock = request.clock.or_scheduled(scheduled_secs);

        let (input, question, sequence) = {
            let mut session = handle.lock().await;
            session.record(Role::Candidate, answer.as_str());
            if request.time_exceeded {
                session.mark_time_exceeded();
            }
            if let Some(t) = session.advance_phase(clock) {
                info!("{}: {} -> {}", handle.key(), t.from, t.to);
            }

            // Every candidate turn answers the most recent question, even when
            // statements were spoken since.
            let question = session.last_question().cloned().unwrap_or_else(|| AskedQuestion {
                text: INTRODUCTION_PROMPT.to_string(),
                question_type: "introduction".to_string(),
            });
            let sequence = session.next_sequence();
            let planned = select_next(&mut session, &context);

            let input = ReplyInput {
                interview: context.interview.clone(),
                resume: context.resume.clone(),
                phase: session.phase(),
                clock,
                time_exceeded: session.time_exceeded(),
                planned,
                history: session.recent(HISTORY_WINDOW).to_vec(),
            };
            (input, question, sequence)
        };

        self.spawn_analysis(handle.key(), &request.identity, &context, question, sequence, answer);

        let reply = self.responder.reply(&input).await;
        if !reply.parsed {
            warn!("{}: replying with fallback text", handle.key());
        }

        let mut session = handle.lock().await;
        if handle.is_cleared() {
            info!("{}: session cleared mid-turn; reply not recorded", handle.key());
        } else {
            session.record_interviewer(&reply.utterance.text, reply.utterance.as_asked());
        }

        vec![reply.utterance]
    }

    /// Detached analysis of one answer. Resolves the feedback record first
    /// (with retries); never touches the session store, so a cleared session
    /// stays cleared.
    fn spawn_analysis(
        &self,
        session_key: &str,
        identity: &CandidateIdentity,
        context: &LoadedContext,
        question: AskedQuestion,
        sequence: u32,
        answer: String,
    ) {
        let email = identity
            .email
            .clone()
            .or_else(|| context.resume.as_ref().map(|r| r.candidate_email.clone()))
            .filter(|e| !e.trim().is_empty());
        let Some(email) = email else {
            warn!("{session_key}: no candidate email; answer #{sequence} not analyzed");
            return;
        };

        let analyzer = self.analyzer.clone();
        let interview_id = session_key.to_string();
        let name = identity.name.clone();
        let job_position = context.interview.as_ref().map(|i| i.job_position.clone());

        tokio::spawn(async move {
            let Some(feedback_id) = analyzer
                .resolve_feedback_id(&interview_id, &email, name.as_deref())
                .await
            else {
                warn!("{interview_id}: feedback record unavailable, answer #{sequence} dropped");
                return;
            };

            analyzer
                .analyze(AnalysisJob {
                    interview_id,
                    feedback_id,
                    sequence_number: sequence,
                    question_type: question.question_type,
                    question: question.text,
                    answer,
                    job_position,
                })
                .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::context::loader::testing::{interview, resume, MemoryContextSource};
    use crate::context::loader::ContextLoader;
    use crate::feedback::prompts::FALLBACK_SUMMARY;
    use crate::feedback::store::testing::MemoryFeedbackStore;
    use crate::interview::prompts::{CLOSING_QUESTIONS, FALLBACK_GREETING};
    use crate::interview::responder::TIME_EXCEEDED_SENTINEL;
    use crate::llm_client::testing::{chain, HangingBackend, ScriptedBackend};
    use crate::llm_client::ChatBackend;
    use crate::models::feedback::AnswerRecord;

    const KEY: &str = "iv-1";

    fn build(
        backend: Arc<dyn ChatBackend>,
        source: MemoryContextSource,
    ) -> (Arc<InterviewEngine>, Arc<MemoryFeedbackStore>) {
        let store = Arc::new(MemoryFeedbackStore::default());
        let chain = chain(backend);
        let engine = InterviewEngine::new(
            SessionStore::new(ContextLoader::new(Arc::new(source), false)),
            Responder::new(chain.clone(), Duration::from_secs(2)),
            AnswerAnalyzer::new(chain.clone(), store.clone()),
            FeedbackSynthesizer::new(chain),
            store.clone(),
        );
        (Arc::new(engine), store)
    }

    fn source(questions: &[&str]) -> MemoryContextSource {
        MemoryContextSource {
            interviews: vec![(KEY.to_string(), interview(questions))],
            ..Default::default()
        }
    }

    fn ada() -> CandidateIdentity {
        CandidateIdentity::new(Some("Ada".into()), Some("ada@example.com".into()))
    }

    fn request(utterance: Option<&str>, identity: &CandidateIdentity) -> TurnRequest {
        TurnRequest {
            session_key: KEY.to_string(),
            utterance: utterance.map(String::from),
            clock: Clock::new(60.0, 1800.0),
            time_exceeded: false,
            identity: identity.clone(),
        }
    }

    async fn wait_for_analyses(store: &MemoryFeedbackStore, n: usize) -> Vec<AnswerRecord> {
        for _ in 0..200 {
            let analyses = store.analyses();
            if analyses.len() >= n {
                return analyses;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        store.analyses()
    }

    #[tokio::test]
    async fn test_start_returns_greeting_then_introduction() {
        let (engine, _) = build(ScriptedBackend::always(r#"{"text": "Welcome!"}"#), source(&[]));

        let response = engine.turn(request(None, &ada())).await;
        assert_eq!(response.utterances.len(), 2);
        assert_eq!(response.utterances[0].text, "Welcome!");
        assert_eq!(response.utterances[1].text, INTRODUCTION_PROMPT);
        assert_eq!(response.utterances[1].is_question, Some(true));

        let snapshot = engine.snapshot(KEY).await.unwrap();
        assert_eq!(snapshot.log.len(), 2);
        assert!(snapshot.log.iter().all(|t| t.role == Role::Interviewer));
    }

    #[tokio::test]
    async fn test_repeated_start_resends_last_interviewer_turn() {
        let backend = ScriptedBackend::always(r#"{"text": "Welcome!"}"#);
        let (engine, _) = build(backend.clone(), source(&[]));

        engine.turn(request(None, &ada())).await;
        let again = engine.turn(request(None, &ada())).await;

        assert_eq!(again.utterances.len(), 1);
        assert_eq!(again.utterances[0].text, INTRODUCTION_PROMPT);
        assert_eq!(again.utterances[0].question_type.as_deref(), Some("introduction"));
        assert_eq!(backend.called_models().len(), 1);
        assert_eq!(engine.snapshot(KEY).await.unwrap().log.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_start_opens_once() {
        let backend = ScriptedBackend::always(r#"{"text": "Welcome!"}"#);
        let (engine, _) = build(backend.clone(), source(&[]));

        let (a, b) = tokio::join!(
            engine.turn(request(None, &ada())),
            engine.turn(request(None, &ada()))
        );

        assert!(!a.utterances.is_empty() && !b.utterances.is_empty());
        assert_eq!(backend.called_models().len(), 1);
        assert_eq!(engine.snapshot(KEY).await.unwrap().log.len(), 2);
    }

    #[tokio::test]
    async fn test_time_exceeded_sentinel_yields_one_closing_question() {
        let (engine, _) = build(ScriptedBackend::failing(), source(&["Why us?"]));
        engine.turn(request(None, &ada())).await;

        let response = engine
            .turn(request(Some(TIME_EXCEEDED_SENTINEL), &ada()))
            .await;

        assert_eq!(response.utterances.len(), 1);
        let closing = &response.utterances[0];
        assert!(CLOSING_QUESTIONS.contains(&closing.text.as_str()));
        assert_eq!(closing.question_type.as_deref(), Some("closing"));
        assert_eq!(engine.snapshot(KEY).await.unwrap().phase, Phase::Closing);
    }

    #[tokio::test]
    async fn test_failing_backend_still_produces_every_reply() {
        let (engine, _) = build(ScriptedBackend::failing(), source(&[]));

        let opening = engine.turn(request(None, &ada())).await;
        assert_eq!(opening.utterances[0].text, FALLBACK_GREETING);

        for answer in ["I'm Ada.", "I like compilers.", "Mostly Rust."] {
            let reply = engine.turn(request(Some(answer), &ada())).await;
            assert_eq!(reply.utterances.len(), 1);
            assert!(!reply.utterances[0].text.trim().is_empty());
        }
    }

    #[tokio::test]
    async fn test_custom_questions_asked_once_and_phases_only_advance() {
        let (engine, _) = build(ScriptedBackend::failing(), source(&["Q-alpha?", "Q-beta?"]));
        engine.turn(request(None, &ada())).await;

        let mut phases = Vec::new();
        let mut replies = Vec::new();
        for i in 0..20 {
            let reply = engine
                .turn(request(Some(&format!("answer {i}")), &ada()))
                .await;
            replies.push(reply.utterances[0].text.clone());
            phases.push(engine.snapshot(KEY).await.unwrap().phase);
        }

        assert!(phases.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(phases.last(), Some(&Phase::Closing));

        let alpha = replies.iter().filter(|r| r.contains("Q-alpha?")).count();
        let beta = replies.iter().filter(|r| r.contains("Q-beta?")).count();
        assert_eq!((alpha, beta), (1, 1));

        let asked = engine.snapshot(KEY).await.unwrap().asked_questions;
        let unique: HashSet<_> = asked.iter().collect();
        assert_eq!(unique.len(), asked.len());
    }

    #[tokio::test]
    async fn test_answer_to_opening_question_is_analyzed() {
        let (engine, store) = build(ScriptedBackend::failing(), source(&[]));
        engine.turn(request(None, &ada())).await;
        engine
            .turn(request(Some("I'm Ada, I build databases."), &ada()))
            .await;

        let analyses = wait_for_analyses(&store, 1).await;
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].sequence_number, 1);
        assert_eq!(analyses[0].question, INTRODUCTION_PROMPT);
        assert_eq!(analyses[0].question_type, "introduction");
        assert!(analyses[0].assessment.is_none());
        assert_eq!(store.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_answer_after_statement_reply_is_still_analyzed() {
        let (engine, store) = build(
            ScriptedBackend::always(r#"{"text":"I see, thanks.","isQuestion":false}"#),
            source(&[]),
        );
        engine.turn(request(None, &ada())).await;
        for answer in ["I'm Ada.", "I build databases.", "Mostly in Rust."] {
            engine.turn(request(Some(answer), &ada())).await;
        }

        let mut analyses = wait_for_analyses(&store, 3).await;
        assert_eq!(analyses.len(), 3);
        analyses.sort_by_key(|a| a.sequence_number);
        let sequences: Vec<u32> = analyses.iter().map(|a| a.sequence_number).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert!(analyses.iter().all(|a| a.question == INTRODUCTION_PROMPT));
        assert_eq!(analyses[2].answer, "Mostly in Rust.");
    }

    #[tokio::test]
    async fn test_transient_feedback_record_failure_keeps_answer() {
        let (engine, store) = build(ScriptedBackend::failing(), source(&[]));
        store.ensure_failures.store(1, Ordering::SeqCst);
        engine.turn(request(None, &ada())).await;
        engine.turn(request(Some("I'm Ada."), &ada())).await;

        let analyses = wait_for_analyses(&store, 1).await;
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].answer, "I'm Ada.");
        assert!(store.ensure_calls.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_missing_total_duration_uses_scheduled_length() {
        let (engine, _) = build(ScriptedBackend::failing(), source(&[]));
        engine.turn(request(None, &ada())).await;

        let late = TurnRequest {
            clock: Clock::new(1500.0, 0.0),
            ..request(Some("Sorry, I rambled."), &ada())
        };
        engine.turn(late).await;

        assert_eq!(engine.snapshot(KEY).await.unwrap().phase, Phase::Closing);
    }

    #[tokio::test]
    async fn test_resume_email_stands_in_for_missing_identity() {
        let mut src = source(&[]);
        src.resumes = vec![(KEY.to_string(), resume("Grace", "grace@example.com"))];
        let store = Arc::new(MemoryFeedbackStore::default());
        let chain = chain(ScriptedBackend::failing());
        let engine = InterviewEngine::new(
            SessionStore::new(ContextLoader::new(Arc::new(src), true)),
            Responder::new(chain.clone(), Duration::from_secs(2)),
            AnswerAnalyzer::new(chain.clone(), store.clone()),
            FeedbackSynthesizer::new(chain),
            store.clone(),
        );

        let anonymous = CandidateIdentity::default();
        engine.turn(request(None, &anonymous)).await;
        engine.turn(request(Some("Hello."), &anonymous)).await;

        wait_for_analyses(&store, 1).await;
        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].candidate_email, "grace@example.com");
    }

    #[tokio::test]
    async fn test_no_email_skips_analysis() {
        let (engine, store) = build(ScriptedBackend::failing(), source(&[]));
        let anonymous = CandidateIdentity::default();
        engine.turn(request(None, &anonymous)).await;
        engine.turn(request(Some("Hello."), &anonymous)).await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.analyses().is_empty());
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_during_reply_does_not_resurrect_session() {
        let (engine, _) = build(Arc::new(HangingBackend), source(&[]));
        engine.turn(request(None, &CandidateIdentity::default())).await;

        let in_flight = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .turn(request(Some("Still talking"), &CandidateIdentity::default()))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        engine.clear(KEY);

        let response = in_flight.await.unwrap();
        assert_eq!(response.utterances.len(), 1);
        assert!(engine.snapshot(KEY).await.is_none());
        assert_eq!(engine.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_finalize_upserts_one_record_per_candidate() {
        let (engine, store) = build(ScriptedBackend::failing(), source(&[]));
        engine.turn(request(None, &ada())).await;
        engine.turn(request(Some("I'm Ada."), &ada())).await;

        let (first, _) = engine.finalize(KEY, &ada(), None).await.unwrap();
        let (second, row) = engine.finalize(KEY, &ada(), None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.summary, FALLBACK_SUMMARY);
        assert!(!first.recommended);
        assert_eq!(row.summary.as_deref(), Some(FALLBACK_SUMMARY));
        assert_eq!(store.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_finalize_after_clear_uses_supplied_transcript() {
        let (engine, store) = build(ScriptedBackend::failing(), source(&[]));
        engine.turn(request(None, &ada())).await;
        engine.clear(KEY);

        let transcript = vec![
            Turn::new(Role::Interviewer, INTRODUCTION_PROMPT),
            Turn::new(Role::Candidate, "I'm Ada."),
        ];
        let result = engine.finalize(KEY, &ada(), Some(transcript)).await;

        assert!(result.is_ok());
        assert!(engine.snapshot(KEY).await.is_none());
        assert_eq!(store.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_finalize_without_email_is_rejected() {
        let (engine, _) = build(ScriptedBackend::failing(), source(&[]));
        let result = engine
            .finalize(KEY, &CandidateIdentity::default(), None)
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
