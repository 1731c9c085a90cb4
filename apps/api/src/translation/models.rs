use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Caller-facing input of a single translation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranslateInput {
    pub text: String,
    pub target_lang: String,
    #[serde(default)]
    pub source_lang: Option<String>,
    /// `None` means auto-detect from the text.
    #[serde(default)]
    pub is_html: Option<bool>,
    /// Subject-matter hint for the model, e.g. "resume" or "cover_letter".
    #[serde(default)]
    pub domain: Option<String>,
}

impl TranslateInput {
    pub fn new(text: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            target_lang: target_lang.into(),
            ..Self::default()
        }
    }

    pub fn from_lang(mut self, source_lang: impl Into<String>) -> Self {
        self.source_lang = Some(source_lang.into());
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// Tunables applied to every request handled by a `Translator`.
#[derive(Debug, Clone)]
pub struct TranslatorSettings {
    pub model: String,
    pub temperature: f32,
    pub max_chars: usize,
    pub chunk_chars: usize,
    pub cache_ttl: Duration,
}

/// A fully resolved request: languages normalized, html flag decided,
/// settings captured. Not mutated after construction.
#[derive(Debug, Clone)]
pub struct TranslationRequest {
    pub raw_text: String,
    pub source_lang: String,
    pub target_lang: String,
    pub is_html: bool,
    pub temperature: f32,
    pub model: String,
    pub max_chars: usize,
    pub chunk_chars: usize,
    pub ttl: Duration,
    pub domain: Option<String>,
}

/// Who produced the text in a `TranslationResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Remote,
    Cache,
    /// No backend configured; the input is returned untouched.
    Fallback,
    /// Source and target languages match; nothing to do.
    Noop,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partial_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at_chunk_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,
    /// Backend profile that produced a remote or cached result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    pub cached: bool,
}

impl TranslationResult {
    fn completed(text: String, provider: Provider, backend: Option<&str>) -> Self {
        Self {
            ok: true,
            translated_text: Some(text),
            partial_text: None,
            failed_at_chunk_index: None,
            error_code: None,
            provider: Some(provider),
            backend: backend.map(str::to_string),
            cached: provider == Provider::Cache,
        }
    }

    pub fn noop(text: String) -> Self {
        Self::completed(text, Provider::Noop, None)
    }

    pub fn cached(text: String, backend: &str) -> Self {
        Self::completed(text, Provider::Cache, Some(backend))
    }

    pub fn remote(text: String, backend: &str) -> Self {
        Self::completed(text, Provider::Remote, Some(backend))
    }

    pub fn fallback(text: String) -> Self {
        Self::completed(text, Provider::Fallback, None)
    }

    /// Some chunks translated before chunk `failed_at` failed.
    pub fn partial(partial_text: String, failed_at: usize, error_code: &str, backend: &str) -> Self {
        Self {
            ok: false,
            translated_text: None,
            partial_text: Some(partial_text),
            failed_at_chunk_index: Some(failed_at),
            error_code: Some(error_code.to_string()),
            provider: Some(Provider::Remote),
            backend: Some(backend.to_string()),
            cached: false,
        }
    }

    /// A batch slot whose translation raised an error.
    pub fn failed(error_code: &str) -> Self {
        Self {
            ok: false,
            translated_text: None,
            partial_text: None,
            failed_at_chunk_index: None,
            error_code: Some(error_code.to_string()),
            provider: None,
            backend: None,
            cached: false,
        }
    }
}
