//! Owns every live interview session.
//!
//! Each session sits behind its own async mutex, so mutations for one key are
//! serialized without blocking other sessions. The immutable context lives in
//! a `OnceCell` beside the lock: concurrent first requests share a single load.

pub mod state;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, MutexGuard, OnceCell};
use tracing::info;

use crate::context::loader::{CandidateIdentity, ContextLoader, LoadedContext};
use crate::interview::responder::Utterance;
use state::Session;

pub type SessionHandle = Arc<InterviewSession>;

pub struct InterviewSession {
    key: String,
    context: OnceCell<Arc<LoadedContext>>,
    /// Opening utterances, produced once even under concurrent first requests.
    opening: OnceCell<Vec<Utterance>>,
    state: Mutex<Session>,
    cleared: AtomicBool,
}

impl InterviewSession {
    fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            context: OnceCell::new(),
            opening: OnceCell::new(),
            state: Mutex::new(Session::new()),
            cleared: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn context_loaded(&self) -> bool {
        self.context.initialized()
    }

    /// Loaded context; empty if called before loading finished.
    pub fn context(&self) -> Arc<LoadedContext> {
        self.context.get().cloned().unwrap_or_default()
    }

    pub fn opening(&self) -> &OnceCell<Vec<Utterance>> {
        &self.opening
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.state.lock().await
    }

    /// True once the session was removed from the store.
    pub fn is_cleared(&self) -> bool {
        self.cleared.load(Ordering::SeqCst)
    }
}

pub struct SessionStore {
    sessions: DashMap<String, SessionHandle>,
    loader: ContextLoader,
}

impl SessionStore {
    pub fn new(loader: ContextLoader) -> Self {
        Self {
            sessions: DashMap::new(),
            loader,
        }
    }

    /// Returns the session for `key`, creating it and loading its context on
    /// first use. Only the first caller performs the load; others wait for it.
    pub async fn get_or_create(&self, key: &str, identity: &CandidateIdentity) -> SessionHandle {
        let handle = Arc::clone(
            self.sessions
                .entry(key.to_string())
                .or_insert_with(|| {
                    info!("Creating interview session {key}");
                    Arc::new(InterviewSession::new(key))
                })
                .value(),
        );

        handle
            .context
            .get_or_init(|| async { Arc::new(self.loader.load(key, identity).await) })
            .await;

        handle
    }

    pub fn get(&self, key: &str) -> Option<SessionHandle> {
        self.sessions.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Removes the session. Idempotent; returns whether anything was removed.
    pub fn clear(&self, key: &str) -> bool {
        match self.sessions.remove(key) {
            Some((_, handle)) => {
                handle.cleared.store(true, Ordering::SeqCst);
                info!("Cleared interview session {key}");
                true
            }
            None => false,
        }
    }

    /// Loads context without creating a session (used after a session ended).
    pub async fn load_detached(&self, key: &str, identity: &CandidateIdentity) -> LoadedContext {
        self.loader.load(key, identity).await
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}
