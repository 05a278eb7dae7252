use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::api::{Endpoints, ResolveEndpoint};
use crate::capabilities::{RetryPolicy, MAX_TIMEOUT_MS};

pub const ENV_PREFIX: &str = "LISTING_BLAST_";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error("environment variable {key} has invalid value '{value}'")]
    InvalidEnv { key: String, value: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_base_url: String,
    pub suggest_debounce_ms: u64,
    pub max_candidates: usize,
    pub narrow_suggestion_limit: usize,
    pub save_step_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub request_timeout_ms: u64,
    pub resolve_endpoint: ResolveEndpoint,
    pub custom_listing_placeholder: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: crate::DEFAULT_API_BASE_URL.to_string(),
            suggest_debounce_ms: crate::SUGGEST_DEBOUNCE_MS,
            max_candidates: crate::MAX_RESOLVED_CANDIDATES,
            narrow_suggestion_limit: crate::NARROW_SUGGESTION_LIMIT,
            save_step_max_attempts: crate::SAVE_STEP_MAX_ATTEMPTS,
            retry_base_delay_ms: crate::SAVE_STEP_RETRY_BASE_MS,
            request_timeout_ms: crate::DEFAULT_REQUEST_TIMEOUT_MS,
            resolve_endpoint: ResolveEndpoint::default(),
            custom_listing_placeholder: crate::CUSTOM_LISTING_PLACEHOLDER.to_string(),
        }
    }
}

impl AppConfig {
    /// Defaults overridden by `LISTING_BLAST_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        };

        let mut config = Self::default();
        if let Some((_, url)) = get("API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Some(kv) = get("SUGGEST_DEBOUNCE_MS") {
            config.suggest_debounce_ms = parse(kv)?;
        }
        if let Some(kv) = get("MAX_CANDIDATES") {
            config.max_candidates = parse(kv)?;
        }
        if let Some(kv) = get("NARROW_SUGGESTION_LIMIT") {
            config.narrow_suggestion_limit = parse(kv)?;
        }
        if let Some(kv) = get("SAVE_STEP_MAX_ATTEMPTS") {
            config.save_step_max_attempts = parse(kv)?;
        }
        if let Some(kv) = get("RETRY_BASE_DELAY_MS") {
            config.retry_base_delay_ms = parse(kv)?;
        }
        if let Some(kv) = get("REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse(kv)?;
        }
        if let Some((key, value)) = get("RESOLVE_ENDPOINT") {
            config.resolve_endpoint = match value.to_ascii_lowercase().as_str() {
                "v1" => ResolveEndpoint::V1,
                "v2" => ResolveEndpoint::V2,
                _ => return Err(ConfigError::InvalidEnv { key, value }),
            };
        }
        if let Some((_, placeholder)) = get("CUSTOM_LISTING_PLACEHOLDER") {
            config.custom_listing_placeholder = placeholder;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoints()?;
        if self.suggest_debounce_ms == 0 {
            return Err(ConfigError::Validation("suggest_debounce_ms must be > 0".into()));
        }
        if self.max_candidates == 0 || self.max_candidates > crate::MAX_RESOLVED_CANDIDATES {
            return Err(ConfigError::Validation(format!(
                "max_candidates must be within 1..={}",
                crate::MAX_RESOLVED_CANDIDATES
            )));
        }
        if self.narrow_suggestion_limit == 0 {
            return Err(ConfigError::Validation(
                "narrow_suggestion_limit must be > 0".into(),
            ));
        }
        if self.save_step_max_attempts == 0 {
            return Err(ConfigError::Validation(
                "save_step_max_attempts must be > 0".into(),
            ));
        }
        if self.request_timeout_ms == 0 || self.request_timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Validation(format!(
                "request_timeout_ms must be within 1..={MAX_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.save_step_max_attempts, self.retry_base_delay_ms)
    }

    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Endpoints::new(&self.api_base_url).map_err(|e| ConfigError::Validation(e.to_string()))
    }
}

fn parse<T: FromStr>((key, value): (String, String)) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.suggest_debounce_ms, 800);
        assert_eq!(config.save_step_max_attempts, 3);
        assert_eq!(config.resolve_endpoint, ResolveEndpoint::V2);
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn env_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("LISTING_BLAST_API_BASE_URL", "https://staging.example.com/api"),
            ("LISTING_BLAST_SUGGEST_DEBOUNCE_MS", "300"),
            ("LISTING_BLAST_RESOLVE_ENDPOINT", "V1"),
            ("LISTING_BLAST_SAVE_STEP_MAX_ATTEMPTS", " "),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "https://staging.example.com/api");
        assert_eq!(config.suggest_debounce_ms, 300);
        assert_eq!(config.resolve_endpoint, ResolveEndpoint::V1);
        assert_eq!(config.save_step_max_attempts, 3);
    }

    #[test]
    fn bad_env_values() {
        let err = AppConfig::from_lookup(lookup(&[("LISTING_BLAST_REQUEST_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                key: "LISTING_BLAST_REQUEST_TIMEOUT_MS".into(),
                value: "soon".into(),
            }
        );

        assert!(AppConfig::from_lookup(lookup(&[("LISTING_BLAST_RESOLVE_ENDPOINT", "v3")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("LISTING_BLAST_MAX_CANDIDATES", "0")])).is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad_url = AppConfig {
            api_base_url: "ftp://files.example.com".into(),
            ..AppConfig::default()
        };
        assert!(bad_url.validate().is_err());

        let bad_timeout = AppConfig {
            request_timeout_ms: MAX_TIMEOUT_MS + 1,
            ..AppConfig::default()
        };
        assert!(bad_timeout.validate().is_err());
    }
}
