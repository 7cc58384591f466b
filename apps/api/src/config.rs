use std::time::Duration;

use anyhow::{bail, Context, Result};

pub const DEFAULT_LLM_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Ordered fallback chain used when `LLM_MODELS` is unset.
pub const DEFAULT_LLM_MODELS: &str =
    "meta-llama/llama-3.3-70b-instruct,mistralai/mistral-small-3.1-24b-instruct,google/gemma-3-27b-it";

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or inconsistent.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_models: Vec<String>,
    /// Budget for one model attempt.
    pub llm_call_timeout: Duration,
    /// Budget for one whole interviewer reply, across the chain.
    pub turn_deadline: Duration,
    pub store_timeout: Duration,
    pub allow_unmatched_resume: bool,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let config = Config {
            database_url: require_env("DATABASE_URL")?,
            llm_api_key: require_env("LLM_API_KEY")?,
            llm_base_url: optional_env("LLM_BASE_URL")
                .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            llm_models: parse_models(
                &optional_env("LLM_MODELS").unwrap_or_else(|| DEFAULT_LLM_MODELS.to_string()),
            ),
            llm_call_timeout: secs_env("LLM_CALL_TIMEOUT_SECS", 15)?,
            turn_deadline: secs_env("TURN_DEADLINE_SECS", 45)?,
            store_timeout: secs_env("STORE_TIMEOUT_SECS", 5)?,
            allow_unmatched_resume: optional_env("ALLOW_UNMATCHED_RESUME")
                .map(|v| parse_flag(&v))
                .transpose()
                .context("ALLOW_UNMATCHED_RESUME must be true or false")?
                .unwrap_or(true),
            port: optional_env("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: optional_env("RUST_LOG").unwrap_or_else(|| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.llm_models.is_empty() {
            bail!("LLM_MODELS must name at least one model");
        }
        if self.llm_call_timeout >= self.turn_deadline {
            bail!(
                "LLM_CALL_TIMEOUT_SECS ({:?}) must be shorter than TURN_DEADLINE_SECS ({:?})",
                self.llm_call_timeout,
                self.turn_deadline
            );
        }
        Ok(())
    }
}

/// Splits a comma-separated model list, dropping blanks and keeping order.
pub fn parse_models(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("unrecognised flag value '{other}'"),
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn secs_env(key: &str, default: u64) -> Result<Duration> {
    let secs = match optional_env(key) {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{key} must be a whole number of seconds"))?,
        None => default,
    };
    if secs == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: "postgres://localhost/interviews".into(),
            llm_api_key: "key".into(),
            llm_base_url: DEFAULT_LLM_BASE_URL.into(),
            llm_models: parse_models(DEFAULT_LLM_MODELS),
            llm_call_timeout: Duration::from_secs(15),
            turn_deadline: Duration::from_secs(45),
            store_timeout: Duration::from_secs(5),
            allow_unmatched_resume: true,
            port: 8080,
            rust_log: "info".into(),
        }
    }

    #[test]
    fn test_parse_models_keeps_order_and_drops_blanks() {
        assert_eq!(
            parse_models(" a/one , ,b/two,c/three ,"),
            vec!["a/one", "b/two", "c/three"]
        );
        assert!(parse_models(" , ").is_empty());
        assert_eq!(parse_models(DEFAULT_LLM_MODELS).len(), 3);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("TRUE").unwrap());
        assert!(!parse_flag(" off ").unwrap());
        assert!(parse_flag("maybe").is_err());
    }

    #[test]
    fn test_validate_rejects_inconsistent_timeouts() {
        assert!(config().validate().is_ok());

        let mut slow = config();
        slow.llm_call_timeout = Duration::from_secs(45);
        assert!(slow.validate().is_err());

        let mut empty = config();
        empty.llm_models.clear();
        assert!(empty.validate().is_err());
    }
}
