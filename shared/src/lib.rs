// lib.rs - Listing Blast checkout core

#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_lines)]

pub mod address;
pub mod api;
pub mod app;
pub mod bridge;
pub mod capabilities;
pub mod checkout;
pub mod config;
pub mod event;
pub mod model;
pub mod pricing;
pub mod promo;
pub mod selection;
pub mod shell;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use app::App;
pub use capabilities::{Capabilities, Effect};
pub use config::AppConfig;
pub use event::Event;
pub use model::{Model, ViewModel};

pub const SUGGEST_DEBOUNCE_MS: u64 = 800;
pub const MAX_RESOLVED_CANDIDATES: usize = 2;
pub const NARROW_SUGGESTION_LIMIT: usize = 5;
pub const SAVE_STEP_MAX_ATTEMPTS: u32 = 3;
pub const SAVE_STEP_RETRY_BASE_MS: u64 = 1000;
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_API_BASE_URL: &str = "https://api.listingblast.com/";
pub const CUSTOM_LISTING_PLACEHOLDER: &str = "/images/custom-listing-placeholder.png";
pub const SUPPORT_HINT: &str =
    "If this keeps happening, reach out to our support team and we'll sort it out.";

/// Paths of the backend endpoints this core talks to. Failures mentioning
/// one of these are expected noise and are logged quietly.
pub const INTERNAL_API_PATHS: &[&str] = &[
    "/suggest-address",
    "/search-by-address",
    "/task/save-step",
    "/task/start",
    "/promo-code/validate",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Transient,
    Permanent,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Network,
    Timeout,
    Validation,
    NotFound,
    RateLimited,
    Server,
    Serialization,
    Deserialization,
    Configuration,
    Payment,
    InvalidState,
    Internal,
    Unknown,
}

impl ErrorKind {
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Network => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::Server => "SERVER_ERROR",
            Self::Serialization => "SERIALIZATION_ERROR",
            Self::Deserialization => "DESERIALIZATION_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Payment => "PAYMENT_ERROR",
            Self::InvalidState => "INVALID_STATE",
            Self::Internal => "INTERNAL_ERROR",
            Self::Unknown => "UNKNOWN_ERROR",
        }
    }

    #[must_use]
    pub const fn default_severity(self) -> ErrorSeverity {
        match self {
            Self::Network | Self::Timeout | Self::RateLimited | Self::Server => {
                ErrorSeverity::Transient
            }

            Self::Serialization | Self::Configuration | Self::Internal | Self::InvalidState => {
                ErrorSeverity::Fatal
            }

            Self::Validation
            | Self::NotFound
            | Self::Deserialization
            | Self::Payment
            | Self::Unknown => ErrorSeverity::Permanent,
        }
    }

    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::Network | Self::Timeout | Self::RateLimited | Self::Server
        )
    }

    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::Validation,
            404 => Self::NotFound,
            408 => Self::Timeout,
            429 => Self::RateLimited,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }
}

/// User-facing failure buckets. The raw error text is matched against these
/// in declaration order, so a save failure caused by a 503 still reads as a
/// save failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCategory {
    SaveSelection,
    Network,
    Timeout,
    Server,
    InvalidRequest,
    Generic,
}

impl FailureCategory {
    const RULES: &'static [(FailureCategory, &'static [&'static str])] = &[
        (
            FailureCategory::SaveSelection,
            &["save step", "save-step", "failed to save"],
        ),
        (FailureCategory::Network, &["network", "fetch", "connection"]),
        (FailureCategory::Timeout, &["timeout", "timed out"]),
        (
            FailureCategory::Server,
            &["500", "502", "503", "504", "server error"],
        ),
        (
            FailureCategory::InvalidRequest,
            &["400", "401", "403", "404", "422", "bad request", "invalid"],
        ),
    ];

    #[must_use]
    pub fn classify(raw: &str) -> Self {
        let lower = raw.to_lowercase();
        Self::RULES
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
            .map_or(Self::Generic, |(category, _)| *category)
    }

    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::SaveSelection => {
                "We couldn't save your selection. Please check your connection and try again."
            }
            Self::Network => "Network error. Please check your internet connection and try again.",
            Self::Timeout => "The request timed out. Please try again.",
            Self::Server => "Our server ran into a problem. Please try again in a moment.",
            Self::InvalidRequest => "Invalid request. Please refresh the page and try again.",
            Self::Generic => "Something went wrong. Please try again.",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppError {
    pub kind: ErrorKind,
    pub severity: ErrorSeverity,
    pub message: String,
    pub internal_message: Option<String>,
    pub context: HashMap<String, String>,
}

impl AppError {
    #[must_use]
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            internal_message: None,
            context: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_internal(mut self, internal: impl Into<String>) -> Self {
        self.internal_message = Some(internal.into());
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.severity = severity;
        self
    }

    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.kind.code()
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && !matches!(self.severity, ErrorSeverity::Fatal)
    }

    #[must_use]
    pub fn category(&self) -> FailureCategory {
        match &self.internal_message {
            Some(internal) => FailureCategory::classify(&format!("{} {internal}", self.message)),
            None => FailureCategory::classify(&self.message),
        }
    }

    #[must_use]
    pub fn user_facing_message(&self) -> &'static str {
        self.category().message()
    }

    /// Whether this failure mentions one of the backend paths.
    #[must_use]
    pub fn is_internal_api_failure(&self) -> bool {
        is_internal_api_failure(&self.message)
            || self
                .internal_message
                .as_deref()
                .is_some_and(is_internal_api_failure)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message)?;
        if let Some(internal) = &self.internal_message {
            write!(f, " (internal: {internal})")?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<capabilities::HttpError> for AppError {
    fn from(e: capabilities::HttpError) -> Self {
        use capabilities::HttpError;

        let kind = match &e {
            HttpError::Timeout { .. } => ErrorKind::Timeout,
            HttpError::ConnectionError { .. } => ErrorKind::Network,
            HttpError::HttpStatus { status, .. } => ErrorKind::from_status(*status),
            HttpError::InvalidResponse { .. } => ErrorKind::Deserialization,
            HttpError::SerializationError { .. } => ErrorKind::Serialization,
            HttpError::InvalidUrl { .. } => ErrorKind::Configuration,
        };

        let mut err = Self::new(kind, e.to_string());
        if let HttpError::HttpStatus { status, .. } = &e {
            err = err.with_context("http_status", status.to_string());
        }
        err
    }
}

#[must_use]
pub fn is_internal_api_failure(message: &str) -> bool {
    INTERNAL_API_PATHS.iter().any(|path| message.contains(path))
}

#[must_use]
pub fn get_current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToastMessage {
    pub message: String,
    pub kind: ToastKind,
    pub support_hint: Option<String>,
    pub created_at_ms: u64,
    pub duration_ms: u64,
}

impl ToastMessage {
    #[must_use]
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            support_hint: None,
            created_at_ms: get_current_time_ms(),
            duration_ms: kind.default_duration_ms(),
        }
    }

    #[must_use]
    pub fn for_error(error: &AppError) -> Self {
        Self {
            support_hint: Some(SUPPORT_HINT.to_string()),
            ..Self::new(error.user_facing_message(), ToastKind::Error)
        }
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.created_at_ms) > self.duration_ms
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ToastKind {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl ToastKind {
    #[must_use]
    pub const fn default_duration_ms(self) -> u64 {
        match self {
            Self::Info => 3000,
            Self::Success => 2000,
            Self::Warning => 4000,
            Self::Error => 8000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod category_tests {
        use super::*;

        #[test]
        fn save_step_wins_over_status_codes() {
            assert_eq!(
                FailureCategory::classify("Failed to save step: HTTP error 503"),
                FailureCategory::SaveSelection
            );
        }

        #[test]
        fn priority_order_is_respected() {
            assert_eq!(
                FailureCategory::classify("TypeError: Failed to fetch"),
                FailureCategory::Network
            );
            assert_eq!(
                FailureCategory::classify("request TIMED OUT after 30s"),
                FailureCategory::Timeout
            );
            assert_eq!(
                FailureCategory::classify("HTTP error 502: bad gateway"),
                FailureCategory::Server
            );
            assert_eq!(
                FailureCategory::classify("HTTP error 404: missing"),
                FailureCategory::InvalidRequest
            );
            // network beats timeout when both appear
            assert_eq!(
                FailureCategory::classify("network timeout"),
                FailureCategory::Network
            );
        }

        #[test]
        fn unknown_text_is_generic() {
            assert_eq!(FailureCategory::classify("boom"), FailureCategory::Generic);
            assert_eq!(FailureCategory::classify(""), FailureCategory::Generic);
        }
    }

    mod error_tests {
        use super::*;
        use crate::capabilities::HttpError;

        #[test]
        fn http_status_maps_to_kind() {
            let err: AppError = HttpError::HttpStatus {
                status: 503,
                message: "unavailable".into(),
                request_id: "r".into(),
                retryable: true,
            }
            .into();
            assert_eq!(err.kind, ErrorKind::Server);
            assert!(err.is_retryable());
            assert_eq!(err.context.get("http_status").map(String::as_str), Some("503"));
        }

        #[test]
        fn user_message_uses_internal_text() {
            let err = AppError::new(ErrorKind::Unknown, "checkout failed")
                .with_internal("connection reset by peer");
            assert_eq!(err.category(), FailureCategory::Network);
            assert_eq!(err.user_facing_message(), FailureCategory::Network.message());
        }

        #[test]
        fn fatal_severity_blocks_retry() {
            let err = AppError::new(ErrorKind::Network, "x").with_severity(ErrorSeverity::Fatal);
            assert!(!err.is_retryable());
        }

        #[test]
        fn display_includes_code_and_internal() {
            let err = AppError::new(ErrorKind::Timeout, "slow").with_internal("30s");
            assert_eq!(err.to_string(), "[TIMEOUT] slow (internal: 30s)");
        }

        #[test]
        fn internal_api_failures_are_detected() {
            assert!(is_internal_api_failure("POST /task/start failed"));
            assert!(!is_internal_api_failure("GET /health failed"));
            let err = AppError::new(ErrorKind::Network, "x")
                .with_internal("https://api.example.com/suggest-address?key=1");
            assert!(err.is_internal_api_failure());
        }
    }

    mod toast_tests {
        use super::*;

        #[test]
        fn error_toast_carries_support_hint() {
            let err = AppError::new(ErrorKind::Server, "HTTP error 500");
            let toast = ToastMessage::for_error(&err);
            assert_eq!(toast.kind, ToastKind::Error);
            assert_eq!(toast.message, FailureCategory::Server.message());
            assert_eq!(toast.support_hint.as_deref(), Some(SUPPORT_HINT));
        }

        #[test]
        fn toast_expiry() {
            let toast = ToastMessage {
                message: "hi".into(),
                kind: ToastKind::Info,
                support_hint: None,
                created_at_ms: 1_000,
                duration_ms: 3_000,
            };
            assert!(!toast.is_expired(3_999));
            assert!(toast.is_expired(4_001));
        }
    }
}
