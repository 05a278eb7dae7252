use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const MAX_URL_LENGTH: usize = 2048;
pub const MAX_TIMEOUT_MS: u64 = 120_000;
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedUrl {
    url: String,
    host: String,
}

impl ValidatedUrl {
    pub fn new(url: impl Into<String>) -> Result<Self, HttpError> {
        let url = url.into();
        let parsed = Self::parse(&url)?;
        Self::from_url(&parsed)
    }

    pub fn from_url(parsed: &Url) -> Result<Self, HttpError> {
        let raw = parsed.as_str();
        if raw.len() > MAX_URL_LENGTH {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(raw),
                reason: format!("URL exceeds maximum length of {MAX_URL_LENGTH} bytes"),
            });
        }

        let scheme = parsed.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(raw),
                reason: format!("invalid scheme '{scheme}', only 'http' and 'https' are allowed"),
            });
        }

        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl {
                url: Self::truncate_url(raw),
                reason: "URL must have a host".to_string(),
            })?
            .to_lowercase();

        if !parsed.username().is_empty() || parsed.password().is_some() {
            return Err(HttpError::InvalidUrl {
                url: Self::truncate_url(raw),
                reason: "credentials in URL are not allowed".to_string(),
            });
        }

        Ok(Self {
            url: raw.to_string(),
            host,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Path plus query, e.g. `/suggest-address?key=12`.
    pub fn path_and_query(&self) -> String {
        match Url::parse(&self.url) {
            Ok(u) => match u.query() {
                Some(q) => format!("{}?{q}", u.path()),
                None => u.path().to_string(),
            },
            Err(_) => self.url.clone(),
        }
    }

    fn parse(url: &str) -> Result<Url, HttpError> {
        if url.trim().is_empty() {
            return Err(HttpError::InvalidUrl {
                url: String::new(),
                reason: "URL cannot be empty".to_string(),
            });
        }
        Url::parse(url).map_err(|e| HttpError::InvalidUrl {
            url: Self::truncate_url(url),
            reason: e.to_string(),
        })
    }

    fn truncate_url(url: &str) -> String {
        if url.len() <= 100 {
            url.to_string()
        } else {
            let mut end = 100;
            while !url.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &url[..end])
        }
    }
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum HttpError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("serialization error: {message}")]
    SerializationError { message: String },

    #[error("connection failed to {target}: {message}")]
    ConnectionError { target: String, message: String },

    #[error("timeout calling {target}")]
    Timeout { target: String, request_id: String },

    #[error("HTTP error {status}: {message}")]
    HttpStatus {
        status: u16,
        message: String,
        request_id: String,
        retryable: bool,
    },

    #[error("invalid response: {reason}")]
    InvalidResponse { reason: String, request_id: String },
}

impl HttpError {
    /// Transport-level failures and 5xx responses.
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Timeout { .. } | HttpError::ConnectionError { .. } => true,
            HttpError::HttpStatus { retryable, .. } => *retryable,
            _ => false,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, HttpError::HttpStatus { status, .. } if (400..500).contains(status))
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, HttpError::HttpStatus { status, .. } if *status >= 500)
    }

    fn for_status(status: u16, body: &[u8], request_id: &str) -> Self {
        let message = String::from_utf8_lossy(body)
            .chars()
            .take(MAX_ERROR_BODY_CHARS)
            .collect::<String>();
        HttpError::HttpStatus {
            status,
            message,
            request_id: request_id.to_string(),
            retryable: status >= 500,
        }
    }

    fn from_crux(error: crux_http::Error, target: &str, request_id: &str) -> Self {
        match error {
            crux_http::Error::Http(e) => {
                let body = e.body.unwrap_or_else(|| e.message.into_bytes());
                Self::for_status(u16::from(e.code), &body, request_id)
            }
            crux_http::Error::Timeout => HttpError::Timeout {
                target: target.to_string(),
                request_id: request_id.to_string(),
            },
            crux_http::Error::Io(message) => HttpError::ConnectionError {
                target: target.to_string(),
                message,
            },
            crux_http::Error::Json(reason) => HttpError::InvalidResponse {
                reason,
                request_id: request_id.to_string(),
            },
            crux_http::Error::Url(reason) => HttpError::InvalidUrl {
                url: target.to_string(),
                reason,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpResponse {
    status: u16,
    body: Vec<u8>,
    request_id: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: Vec<u8>, request_id: impl Into<String>) -> Self {
        Self {
            status,
            body,
            request_id: request_id.into(),
        }
    }

    pub fn json_value(status: u16, value: &serde_json::Value) -> Self {
        Self::new(status, value.to_string().into_bytes(), "")
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, HttpError> {
        serde_json::from_slice(&self.body).map_err(|e| HttpError::InvalidResponse {
            reason: format!("failed to parse JSON: {e}"),
            request_id: self.request_id.clone(),
        })
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Turns a non-2xx response into the matching `HttpError`.
    pub fn error_for_status(self) -> HttpResult {
        if self.is_success() {
            return Ok(self);
        }
        Err(HttpError::for_status(self.status, &self.body, &self.request_id))
    }
}

pub type HttpResult = Result<HttpResponse, HttpError>;

/// Folds a crux_http outcome into `HttpResult`. `target` names the endpoint
/// in transport errors.
pub fn from_crux(
    result: crux_http::Result<crux_http::Response<Vec<u8>>>,
    target: &str,
    request_id: &str,
) -> HttpResult {
    match result {
        Ok(mut response) => {
            let status = u16::from(response.status());
            let body = response
                .body_bytes()
                .map_err(|e| HttpError::from_crux(e, target, request_id))?;
            HttpResponse::new(status, body, request_id).error_for_status()
        }
        Err(e) => Err(HttpError::from_crux(e, target, request_id)),
    }
}

/// Sends `builder` as a JSON call to `url`. The outcome reaches `update`
/// through `make_event`, tagged with a fresh request id.
pub fn send<Ev, F>(builder: crux_http::RequestBuilder<Ev>, url: &ValidatedUrl, make_event: F)
where
    Ev: 'static,
    F: FnOnce(HttpResult) -> Ev + Send + 'static,
{
    let request_id = uuid::Uuid::new_v4().to_string();
    let target = url.path_and_query();
    debug!(request_id = %request_id, target = %target, "sending request");

    builder
        .header("Accept", "application/json")
        .header("X-Request-Id", request_id.clone())
        .send(move |result| make_event(from_crux(result, &target, &request_id)));
}

/// Linear backoff: the wait after attempt `n` is `base_delay_ms * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::SAVE_STEP_MAX_ATTEMPTS,
            base_delay_ms: crate::SAVE_STEP_RETRY_BASE_MS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
        }
    }

    /// Wait before the attempt that follows `attempt`, or `None` once
    /// attempts are used up.
    pub fn next_delay_ms(&self, attempt: u32) -> Option<u64> {
        (attempt < self.max_attempts).then(|| self.base_delay_ms.saturating_mul(u64::from(attempt)))
    }
}

/// Executes the HTTP effects the tokio shell receives. Any status comes back
/// as a response; crux_http classifies non-2xx itself.
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, request: &crux_http::protocol::HttpRequest) -> crux_http::protocol::HttpResult;
}

#[cfg(feature = "native")]
pub use self::native::ReqwestClient;

#[cfg(feature = "native")]
mod native {
    use std::time::Duration;

    use crux_http::protocol::{HttpHeader, HttpRequest, HttpResponse, HttpResult};
    use tracing::warn;

    use super::HttpClient;

    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        inner: reqwest::Client,
        timeout: Duration,
    }

    impl ReqwestClient {
        pub fn new(inner: reqwest::Client, timeout_ms: u64) -> Self {
            Self {
                inner,
                timeout: Duration::from_millis(timeout_ms),
            }
        }
    }

    impl Default for ReqwestClient {
        fn default() -> Self {
            Self::new(reqwest::Client::default(), crate::DEFAULT_REQUEST_TIMEOUT_MS)
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for ReqwestClient {
        async fn execute(&self, request: &HttpRequest) -> HttpResult {
            let method = match reqwest::Method::from_bytes(request.method.as_bytes()) {
                Ok(method) => method,
                Err(e) => return HttpResult::Err(crux_http::Error::Url(e.to_string())),
            };

            let mut builder = self
                .inner
                .request(method, request.url.as_str())
                .timeout(self.timeout);
            for header in &request.headers {
                builder = builder.header(header.name.as_str(), header.value.as_str());
            }
            if !request.body.is_empty() {
                builder = builder.body(request.body.clone());
            }

            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => return HttpResult::Err(crux_http::Error::Timeout),
                Err(e) => {
                    warn!(error = %e, "request failed");
                    return HttpResult::Err(crux_http::Error::Io(e.to_string()));
                }
            };

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value.to_str().ok().map(|value| HttpHeader {
                        name: name.to_string(),
                        value: value.to_string(),
                    })
                })
                .collect();
            match response.bytes().await {
                Ok(body) => HttpResult::Ok(HttpResponse {
                    status,
                    headers,
                    body: body.to_vec(),
                }),
                Err(e) => HttpResult::Err(crux_http::Error::Io(e.to_string())),
            }
        }
    }
}
