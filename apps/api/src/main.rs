mod config;
mod context;
mod db;
mod errors;
mod feedback;
mod interview;
mod llm_client;
mod models;
mod routes;
mod session;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::context::loader::ContextLoader;
use crate::context::source::PgContextSource;
use crate::db::create_pool;
use crate::feedback::analyzer::AnswerAnalyzer;
use crate::feedback::store::{FeedbackStore, PgFeedbackStore};
use crate::feedback::synthesizer::FeedbackSynthesizer;
use crate::interview::engine::InterviewEngine;
use crate::interview::responder::Responder;
use crate::llm_client::{LlmClient, ModelChain};
use crate::routes::build_router;
use crate::session::SessionStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing or inconsistent env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting interviewer v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url, config.store_timeout).await?;

    // Initialize the model chain
    let llm = LlmClient::new(
        config.llm_api_key.clone(),
        config.llm_base_url.clone(),
        config.llm_call_timeout,
    );
    let chain = ModelChain::new(Arc::new(llm), config.llm_models.clone(), config.llm_call_timeout);
    let models: Arc<[String]> = chain.models().into();
    info!(
        "Model chain: {} (attempt timeout {:?}, turn deadline {:?})",
        models.join(" -> "),
        config.llm_call_timeout,
        config.turn_deadline
    );

    // Wire the engine
    let context_source = Arc::new(PgContextSource::new(db.clone(), config.store_timeout));
    if config.allow_unmatched_resume {
        info!("Unmatched résumé fallback enabled");
    }
    let sessions = SessionStore::new(ContextLoader::new(
        context_source,
        config.allow_unmatched_resume,
    ));
    let feedback_store: Arc<dyn FeedbackStore> =
        Arc::new(PgFeedbackStore::new(db, config.store_timeout));

    let engine = InterviewEngine::new(
        sessions,
        Responder::new(chain.clone(), config.turn_deadline),
        AnswerAnalyzer::new(chain.clone(), Arc::clone(&feedback_store)),
        FeedbackSynthesizer::new(chain),
        feedback_store,
    );

    // Build app state
    let state = AppState {
        engine: Arc::new(engine),
        models,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS to the interview front-end origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
