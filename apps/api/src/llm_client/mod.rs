/// LLM Client: the single point of entry for all chat-completion calls in the BFF.
///
/// ARCHITECTURAL RULE: No other module may call the aggregator API directly.
/// Translation and the chat proxy both go through this module.
///
/// Every call is bounded by a per-attempt timeout and retried on 429 / 5xx
/// (plus timeouts and network failures) with `Retry-After` honored and a
/// capped exponential backoff otherwise.
use std::time::Duration;

use reqwest::{
    header::{HeaderMap, RETRY_AFTER},
    Client,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub mod prompts;

/// Max characters of an error body kept in `LlmError::Api`.
const BODY_SNIPPET_CHARS: usize = 300;
/// Upper bound on a server-provided `Retry-After`.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Failure of a remote call. `Clone` so coalesced callers can share one outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LlmError {
    #[error("LLM API key is not configured")]
    NotConfigured,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    BadResponse(String),

    #[error("Request cancelled")]
    Cancelled,
}

impl LlmError {
    /// Stable machine-readable code surfaced to API callers.
    pub fn code(&self) -> &'static str {
        match self {
            LlmError::NotConfigured => "not_configured",
            LlmError::Network(_) => "network_error",
            LlmError::Timeout(_) => "timeout",
            LlmError::Api { .. } => "remote_http_error",
            LlmError::BadResponse(_) => "remote_bad_response",
            LlmError::Cancelled => "cancelled",
        }
    }

    fn is_retriable(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Retry budget and backoff curve for remote calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(400),
            max_delay: Duration::from_millis(3000),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (1-based): base, 2×base, 4×base … capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32
            .checked_shl(retry.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// The wait before retry number `retry`, preferring the server's `Retry-After`.
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or_else(|| self.backoff(retry))
    }
}

/// Connection settings for the chat-completion backend.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL without the `/chat/completions` suffix.
    pub base_url: String,
    pub api_key: Option<String>,
    /// Deadline for a single attempt, not for the whole retry sequence.
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl ChatResponse {
    /// Content of `choices[0].message`, if non-blank.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .and_then(|m| m.content.as_deref())
            .filter(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// One failed attempt, with the server's requested wait if it sent one.
struct AttemptFailure {
    error: LlmError,
    retry_after: Option<Duration>,
}

impl From<LlmError> for AttemptFailure {
    fn from(error: LlmError) -> Self {
        Self {
            error,
            retry_after: None,
        }
    }
}

/// The single chat-completion client used by all services in the BFF.
///
/// Cancellation is by drop: dropping the future returned by `call` aborts the
/// in-flight HTTP request and any pending backoff sleep.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    settings: LlmSettings,
}

impl LlmClient {
    pub fn new(settings: LlmSettings) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(settings.timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    /// Whether a credential is present. Without one no request is ever sent.
    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    fn api_key(&self) -> Option<&str> {
        self.settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Makes a chat-completion call, returning the parsed response object.
    pub async fn call(&self, request: &ChatRequest<'_>) -> Result<ChatResponse, LlmError> {
        let api_key = self.api_key().ok_or(LlmError::NotConfigured)?;
        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );
        let policy = self.settings.retry;
        let mut retry = 0;

        loop {
            let failure = match tokio::time::timeout(
                self.settings.timeout,
                self.attempt(&url, api_key, request),
            )
            .await
            {
                Ok(Ok(response)) => {
                    if let Some(usage) = &response.usage {
                        debug!(
                            "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                            usage.prompt_tokens, usage.completion_tokens
                        );
                    }
                    return Ok(response);
                }
                Ok(Err(failure)) => failure,
                Err(_) => AttemptFailure::from(LlmError::Timeout(self.settings.timeout)),
            };

            if !failure.error.is_retriable() || retry >= policy.max_retries {
                return Err(failure.error);
            }

            retry += 1;
            let delay = policy.delay_for(retry, failure.retry_after);
            warn!(
                "LLM call failed ({}), retry {}/{} after {}ms",
                failure.error,
                retry,
                policy.max_retries,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Calls the model and returns the message content, failing on an empty reply.
    pub async fn call_text(&self, request: &ChatRequest<'_>) -> Result<String, LlmError> {
        let response = self.call(request).await?;
        response
            .text()
            .map(str::to_string)
            .ok_or_else(|| LlmError::BadResponse("empty message content".to_string()))
    }

    async fn attempt(
        &self,
        url: &str,
        api_key: &str,
        request: &ChatRequest<'_>,
    ) -> Result<ChatResponse, AttemptFailure> {
        let response = self
            .client
            .post(url)
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();

        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            // Prefer the structured error message when the body carries one
            let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AttemptFailure {
                error: LlmError::Api {
                    status: status.as_u16(),
                    message: snippet(&message),
                },
                retry_after,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        serde_json::from_str(&body)
            .map_err(|e| AttemptFailure::from(LlmError::BadResponse(e.to_string())))
    }
}

/// Reads `Retry-After` as (possibly fractional) seconds. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    let seconds: f64 = raw.parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some(Duration::from_secs_f64(seconds).min(MAX_RETRY_AFTER))
}

fn snippet(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(BODY_SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}
