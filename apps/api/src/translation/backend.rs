//! Translation backends: pluggable strategy behind the `Translator`.
//!
//! Both supported aggregators speak the OpenAI chat-completion dialect, so a
//! single `ChatTranslationBackend` covers them; a `BackendProfile` supplies the
//! per-provider defaults.

use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::llm_client::{strip_json_fences, ChatMessage, ChatRequest, LlmClient, LlmError};
use crate::translation::models::TranslationRequest;
use crate::translation::prompts::{translation_prompt, translation_system};

/// Output budget: roughly one token per two input characters, plus headroom.
const MIN_MAX_TOKENS: u32 = 256;
const MAX_MAX_TOKENS: u32 = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendProfile {
    #[default]
    OpenRouter,
    DeepSeek,
}

impl FromStr for BackendProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Ok(BackendProfile::OpenRouter),
            "deepseek" => Ok(BackendProfile::DeepSeek),
            other => Err(format!("unknown translator backend '{other}'")),
        }
    }
}

impl BackendProfile {
    pub fn name(self) -> &'static str {
        match self {
            BackendProfile::OpenRouter => "openrouter",
            BackendProfile::DeepSeek => "deepseek",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            BackendProfile::OpenRouter => "https://openrouter.ai/api/v1",
            BackendProfile::DeepSeek => "https://api.deepseek.com/v1",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            BackendProfile::OpenRouter => "deepseek/deepseek-chat",
            BackendProfile::DeepSeek => "deepseek-chat",
        }
    }

    /// Max characters per chunk sent to the model.
    pub fn default_chunk_chars(self) -> usize {
        match self {
            BackendProfile::OpenRouter => 3500,
            BackendProfile::DeepSeek => 2000,
        }
    }
}

/// One chunk of masked text to translate, detached from the request's lifetime
/// so it can be moved into a shared in-flight call.
#[derive(Debug, Clone)]
pub struct ChunkJob {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub is_html: bool,
    pub model: String,
    pub temperature: f32,
    pub domain: Option<String>,
}

impl ChunkJob {
    pub fn new(request: &TranslationRequest, text: &str) -> Self {
        Self {
            text: text.to_string(),
            source_lang: request.source_lang.clone(),
            target_lang: request.target_lang.clone(),
            is_html: request.is_html,
            model: request.model.clone(),
            temperature: request.temperature,
            domain: request.domain.clone(),
        }
    }
}

/// The backend trait. Implement this to swap providers without touching the
/// orchestrator, handlers or caches.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// Tag reported in results, e.g. "openrouter".
    fn name(&self) -> &str;

    /// False when no credential is present; such a backend never sends requests.
    fn is_configured(&self) -> bool;

    async fn translate(&self, job: &ChunkJob) -> Result<String, LlmError>;
}

pub struct ChatTranslationBackend {
    llm: LlmClient,
    profile: BackendProfile,
}

impl ChatTranslationBackend {
    pub fn new(llm: LlmClient, profile: BackendProfile) -> Self {
        Self { llm, profile }
    }
}

#[async_trait]
impl TranslationBackend for ChatTranslationBackend {
    fn name(&self) -> &str {
        self.profile.name()
    }

    fn is_configured(&self) -> bool {
        self.llm.is_configured()
    }

    async fn translate(&self, job: &ChunkJob) -> Result<String, LlmError> {
        let messages = [
            ChatMessage::system(translation_system()),
            ChatMessage::user(translation_prompt(
                &job.text,
                &job.source_lang,
                &job.target_lang,
                job.is_html,
                job.domain.as_deref(),
            )),
        ];
        let request = ChatRequest {
            model: &job.model,
            messages: &messages,
            temperature: job.temperature,
            max_tokens: max_tokens_for(&job.text),
        };

        let content = self.llm.call_text(&request).await?;
        Ok(parse_translation(&content))
    }
}

fn max_tokens_for(text: &str) -> u32 {
    let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
    (chars / 2)
        .saturating_add(MIN_MAX_TOKENS)
        .min(MAX_MAX_TOKENS)
}

#[derive(Debug, Deserialize)]
struct TranslationPayload {
    translation: String,
}

/// Reads `{"translation": ...}` (optionally fenced); anything else is taken as
/// the translated text itself.
fn parse_translation(content: &str) -> String {
    match serde_json::from_str::<TranslationPayload>(strip_json_fences(content)) {
        Ok(payload) => payload.translation,
        Err(_) => {
            debug!("translation reply was not structured, using it as plain text");
            content.trim().to_string()
        }
    }
}
