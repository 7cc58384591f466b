use std::sync::Arc;

use crate::interview::engine::InterviewEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InterviewEngine>,
    /// Model identifiers in fallback order, reported by `/health`.
    pub models: Arc<[String]>,
}
