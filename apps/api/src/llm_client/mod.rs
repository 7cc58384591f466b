/// The single point of entry for every generative-backend call.
///
/// ARCHITECTURAL RULE: no other module talks to the chat-completion endpoint.
/// Callers go through `ModelChain`, which walks the configured model list in
/// order and reports each attempt as a typed outcome.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

pub mod json_repair;
pub mod prompts;

const MAX_TOKENS: u32 = 1024;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// A chat-completion style backend: one system/user pair in, free-form text out.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, model: &str, system: &str, prompt: &str)
        -> Result<String, LlmError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// HTTP backend for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: String, base_url: String, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ChatBackend for LlmClient {
    async fn complete(
        &self,
        model: &str,
        system: &str,
        prompt: &str,
    ) -> Result<String, LlmError> {
        let request_body = ChatRequest {
            model,
            max_tokens: MAX_TOKENS,
            temperature: 0.7,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let chat: ChatResponse = response.json().await?;
        if let Some(usage) = &chat.usage {
            debug!(
                "LLM call succeeded ({model}): prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}

/// One model that was tried and did not produce text.
#[derive(Debug)]
pub struct FailedAttempt {
    pub model: String,
    pub error: LlmError,
}

/// Result of walking the model list.
#[derive(Debug)]
pub enum ChainOutcome {
    Completed {
        model: String,
        text: String,
        failed: Vec<FailedAttempt>,
    },
    Exhausted {
        failed: Vec<FailedAttempt>,
    },
}

/// Result of a chain call whose text is expected to hold one JSON object.
/// `Malformed` means a backend answered but nothing usable could be extracted.
#[derive(Debug)]
pub enum Generation<T> {
    Parsed(T),
    Malformed { model: String, raw: String },
    Unavailable,
}

/// Ordered fallback over model identifiers on a single backend.
#[derive(Clone)]
pub struct ModelChain {
    backend: Arc<dyn ChatBackend>,
    models: Arc<[String]>,
    attempt_timeout: Duration,
}

impl ModelChain {
    pub fn new(backend: Arc<dyn ChatBackend>, models: Vec<String>, attempt_timeout: Duration) -> Self {
        Self {
            backend,
            models: models.into(),
            attempt_timeout,
        }
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Tries each model in order; the first non-empty completion wins.
    pub async fn run(&self, system: &str, prompt: &str) -> ChainOutcome {
        let mut failed = Vec::new();

        for model in self.models.iter() {
            let attempt = tokio::time::timeout(
                self.attempt_timeout,
                self.backend.complete(model, system, prompt),
            )
            .await
            .unwrap_or(Err(LlmError::Timeout(self.attempt_timeout)));

            match attempt {
                Ok(text) => {
                    return ChainOutcome::Completed {
                        model: model.clone(),
                        text,
                        failed,
                    }
                }
                Err(error) => {
                    warn!("Model {model} failed ({error}); trying next in chain");
                    failed.push(FailedAttempt {
                        model: model.clone(),
                        error,
                    });
                }
            }
        }

        warn!("All {} models in the chain failed", self.models.len());
        ChainOutcome::Exhausted { failed }
    }

    /// Runs the chain and repairs the first JSON object out of the reply.
    pub async fn run_json<T: DeserializeOwned>(&self, system: &str, prompt: &str) -> Generation<T> {
        match self.run(system, prompt).await {
            ChainOutcome::Completed {
                model,
                text,
                failed,
            } => {
                if !failed.is_empty() {
                    info!("{model} answered after {}", describe(&failed));
                }
                match json_repair::parse_object::<T>(&text) {
                    Some(value) => Generation::Parsed(value),
                    None => {
                        warn!(
                            "Model {model} returned unparseable output: {:?}",
                            text.chars().take(120).collect::<String>()
                        );
                        Generation::Malformed { model, raw: text }
                    }
                }
            }
            ChainOutcome::Exhausted { failed } => {
                warn!("No model answered: {}", describe(&failed));
                Generation::Unavailable
            }
        }
    }
}

fn describe(failed: &[FailedAttempt]) -> String {
    failed
        .iter()
        .map(|f| format!("{} ({})", f.model, f.error))
        .collect::<Vec<_>>()
        .join(", ")
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn test_chain_falls_through_to_next_model() {
        let backend = ScriptedBackend::sequence(vec![
            Err(LlmError::Api {
                status: 400,
                message: "bad request".to_string(),
            }),
            Err(LlmError::EmptyContent),
            Ok("hello".to_string()),
        ]);
        let outcome = chain(backend.clone()).run("sys", "prompt").await;

        match outcome {
            ChainOutcome::Completed { model, text, failed } => {
                assert_eq!(model, "tertiary");
                assert_eq!(text, "hello");
                assert_eq!(failed.len(), 2);
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(
            backend.called_models(),
            vec!["primary", "secondary", "tertiary"]
        );
    }

    #[tokio::test]
    async fn test_chain_stops_at_first_success() {
        let backend = ScriptedBackend::always("ok");
        let outcome = chain(backend.clone()).run("sys", "prompt").await;
        assert!(matches!(outcome, ChainOutcome::Completed { ref model, .. } if model == "primary"));
        assert_eq!(backend.called_models().len(), 1);
    }

    #[tokio::test]
    async fn test_chain_exhausted_reports_every_model() {
        let outcome = chain(ScriptedBackend::failing()).run("sys", "prompt").await;
        match outcome {
            ChainOutcome::Exhausted { failed } => {
                let models: Vec<_> = failed.iter().map(|f| f.model.as_str()).collect();
                assert_eq!(models, vec!["primary", "secondary", "tertiary"]);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_moves_down_the_chain() {
        let outcome = chain(Arc::new(HangingBackend)).run("sys", "prompt").await;
        match outcome {
            ChainOutcome::Exhausted { failed } => {
                assert_eq!(failed.len(), 3);
                assert!(failed
                    .iter()
                    .all(|f| matches!(f.error, LlmError::Timeout(_))));
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_run_json_separates_malformed_from_unavailable() {
        #[derive(Debug, Deserialize)]
        struct Reply {
            text: String,
        }

        let parsed: Generation<Reply> = chain(ScriptedBackend::always(
            "Sure! ```json\n{\"text\": \"Tell me more\"}\n```",
        ))
        .run_json("sys", "prompt")
        .await;
        assert!(matches!(parsed, Generation::Parsed(ref r) if r.text == "Tell me more"));

        let malformed: Generation<Reply> = chain(ScriptedBackend::always("no json here"))
            .run_json("sys", "prompt")
            .await;
        assert!(matches!(malformed, Generation::Malformed { .. }));

        let unavailable: Generation<Reply> = chain(ScriptedBackend::failing())
            .run_json("sys", "prompt")
            .await;
        assert!(matches!(unavailable, Generation::Unavailable));
    }
}
