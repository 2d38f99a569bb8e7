//! JSON-over-HTTP fetch primitive used by artwork providers.

use std::io::Read;
use std::time::Duration;

use serde_json::Value;

/// Why a provider request produced no usable JSON.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("unexpected HTTP status {code}")]
    Status { code: u16 },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("invalid JSON response: {0}")]
    Parse(String),
}

/// Issues one GET and decodes the body as JSON.
pub trait JsonFetcher: Send + Sync {
    fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// `ureq`-backed fetcher.
pub struct UreqJsonFetcher {
    http_client: ureq::Agent,
    user_agent: String,
}

impl UreqJsonFetcher {
    pub fn new(request_timeout: Duration, user_agent: impl Into<String>) -> Self {
        let http_client = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(5).min(request_timeout))
            .timeout_read(request_timeout)
            .timeout_write(request_timeout)
            .build();
        Self {
            http_client,
            user_agent: user_agent.into(),
        }
    }

    fn classify_ureq_failure(error: ureq::Error) -> FetchError {
        match error {
            ureq::Error::Status(code, _) => match code {
                429 => FetchError::RateLimited(format!("HTTP {code}")),
                408 | 504 => FetchError::Timeout(format!("HTTP {code}")),
                _ => FetchError::Status { code },
            },
            ureq::Error::Transport(transport) => {
                let message = transport.to_string();
                let lowered = message.to_ascii_lowercase();
                if lowered.contains("timed out") || lowered.contains("timeout") {
                    FetchError::Timeout(message)
                } else {
                    FetchError::Transport(message)
                }
            }
        }
    }

    fn classify_io_failure(error: std::io::Error) -> FetchError {
        let is_timeout = matches!(
            error.kind(),
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        ) || error.to_string().to_ascii_lowercase().contains("timed out");
        if is_timeout {
            FetchError::Timeout(format!("Failed to read response: {error}"))
        } else {
            FetchError::Transport(format!("Failed to read response: {error}"))
        }
    }
}

impl JsonFetcher for UreqJsonFetcher {
    fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        let response = self
            .http_client
            .get(url)
            .set("User-Agent", &self.user_agent)
            .set("Accept", "application/json")
            .call()
            .map_err(Self::classify_ureq_failure)?;
        let mut body = String::new();
        response
            .into_reader()
            .read_to_string(&mut body)
            .map_err(Self::classify_io_failure)?;
        parse_json_body(&body)
    }
}

/// Parses a response body, treating blank and HTML bodies as malformed.
pub fn parse_json_body(body: &str) -> Result<Value, FetchError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(FetchError::Parse("empty body".to_string()));
    }
    if trimmed.starts_with('<') {
        let snippet: String = trimmed.chars().take(80).collect();
        return Err(FetchError::Parse(format!("non-JSON body: {snippet}")));
    }
    serde_json::from_str(trimmed).map_err(|error| FetchError::Parse(error.to_string()))
}

/// Builds `base?key=value&...` with percent-encoded values.
pub fn build_query_url(base: &str, params: &[(&str, &str)]) -> String {
    let mut url = base.to_string();
    if params.is_empty() {
        return url;
    }

    url.push('?');
    for (index, (key, value)) in params.iter().enumerate() {
        if index > 0 {
            url.push('&');
        }
        url.push_str(key);
        url.push('=');
        url.push_str(urlencoding::encode(value).as_ref());
    }
    url
}
