//! Translator: orchestrates a single translation request.
//!
//! Flow: validate → (noop | cache hit | translate)
//!       translate = mask → chunk → per-chunk remote call (in order, coalesced
//!       with identical pending calls) → rejoin → unmask → cache.
//!
//! Chunks are sent one after another, never in parallel; shared free-tier
//! backends rate-limit aggressively.
//!
//! FALLBACK POLICY: when no backend credential is configured and nothing has
//! been translated yet, the original text comes back with
//! `provider: fallback` instead of an error. The resume UI keeps working on a
//! deployment without an API key.

use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::llm_client::LlmError;
use crate::translation::backend::{ChunkJob, TranslationBackend};
use crate::translation::cache::TtlCache;
use crate::translation::chunking::{self, Chunk};
use crate::translation::fingerprint;
use crate::translation::in_flight::InFlight;
use crate::translation::masking::{self, MaskedText};
use crate::translation::models::{
    TranslateInput, TranslationRequest, TranslationResult, TranslatorSettings,
};

const AUTO: &str = "auto";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TranslateError {
    #[error("Target language is missing or invalid")]
    TargetInvalid,

    #[error("Text exceeds the {limit} character limit")]
    TextTooLong { limit: usize },

    #[error(transparent)]
    Remote(#[from] LlmError),
}

impl TranslateError {
    pub fn code(&self) -> &'static str {
        match self {
            TranslateError::TargetInvalid => "target_invalid",
            TranslateError::TextTooLong { .. } => "text_too_long",
            TranslateError::Remote(e) => e.code(),
        }
    }
}

pub struct Translator {
    backend: Arc<dyn TranslationBackend>,
    cache: Arc<TtlCache<String>>,
    in_flight: Arc<InFlight>,
    settings: TranslatorSettings,
}

impl Translator {
    pub fn new(
        backend: Arc<dyn TranslationBackend>,
        cache: Arc<TtlCache<String>>,
        in_flight: Arc<InFlight>,
        settings: TranslatorSettings,
    ) -> Self {
        Self {
            backend,
            cache,
            in_flight,
            settings,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn is_configured(&self) -> bool {
        self.backend.is_configured()
    }

    /// Translates one text. `cancel` aborts the active remote call promptly.
    pub async fn translate_text(
        &self,
        input: TranslateInput,
        cancel: &CancellationToken,
    ) -> Result<TranslationResult, TranslateError> {
        let target = normalize_lang(&input.target_lang)
            .filter(|t| t != AUTO)
            .ok_or(TranslateError::TargetInvalid)?;
        let source = input
            .source_lang
            .as_deref()
            .and_then(normalize_lang)
            .unwrap_or_else(|| AUTO.to_string());

        if source == target {
            debug!("translation {source}->{target}: noop");
            return Ok(TranslationResult::noop(input.text));
        }

        let limit = self.settings.max_chars;
        if input.text.chars().count() > limit {
            return Err(TranslateError::TextTooLong { limit });
        }

        let request = self.build_request(input, source, target);
        let key = fingerprint::translation_key(&request);

        if let Some(hit) = self.cache.get(&key) {
            debug!(
                "translation {}->{}: cache hit",
                request.source_lang, request.target_lang
            );
            return Ok(TranslationResult::cached(hit, self.backend.name()));
        }

        self.translate_uncached(&request, key, cancel).await
    }

    /// Translates each item in order. A failing item yields an `ok: false`
    /// slot and never aborts the rest of the batch.
    pub async fn translate_batch(
        &self,
        items: Vec<TranslateInput>,
        cancel: &CancellationToken,
    ) -> Vec<TranslationResult> {
        let mut results = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let result = match self.translate_text(item, cancel).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("batch item {index} failed: {e}");
                    TranslationResult::failed(e.code())
                }
            };
            results.push(result);
        }
        results
    }

    fn build_request(
        &self,
        input: TranslateInput,
        source_lang: String,
        target_lang: String,
    ) -> TranslationRequest {
        let is_html = masking::resolve_html(input.is_html, &input.text);
        let domain = input
            .domain
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        TranslationRequest {
            raw_text: input.text,
            source_lang,
            target_lang,
            is_html,
            temperature: self.settings.temperature,
            model: self.settings.model.clone(),
            max_chars: self.settings.max_chars,
            chunk_chars: self.settings.chunk_chars,
            ttl: self.settings.cache_ttl,
            domain,
        }
    }

    async fn translate_uncached(
        &self,
        request: &TranslationRequest,
        key: String,
        cancel: &CancellationToken,
    ) -> Result<TranslationResult, TranslateError> {
        let masked = masking::mask(&request.raw_text, request.is_html);
        let chunks = chunking::split(&masked.text, request.chunk_chars);
        debug!(
            "translation {}->{}: {} chunk(s), {} masked span(s)",
            request.source_lang,
            request.target_lang,
            chunks.len(),
            masked.restores.len()
        );

        let mut translated = Vec::with_capacity(chunks.len());
        let mut remote_successes = 0;

        for (index, chunk) in chunks.iter().enumerate() {
            if chunk.text.trim().is_empty() {
                translated.push(chunk.text.clone());
                continue;
            }
            match self.translate_chunk(request, &chunk.text, cancel).await {
                Ok(text) => {
                    debug!("chunk {index}: success");
                    translated.push(text);
                    remote_successes += 1;
                }
                Err(error) => {
                    debug!("chunk {index}: failure ({error})");
                    let failure = ChunkFailure {
                        index,
                        error,
                        chunks: &chunks,
                        translated: &translated,
                        masked: &masked,
                        remote_successes,
                    };
                    return self.on_chunk_failure(request, failure);
                }
            }
        }

        let joined = chunking::rejoin(&chunks, &translated);
        let text = masking::unmask(&joined, &masked.restores);
        self.cache.set(key, text.clone(), request.ttl);

        info!(
            "translation {}->{} completed via {} ({} chunk(s))",
            request.source_lang,
            request.target_lang,
            self.backend.name(),
            chunks.len()
        );
        Ok(TranslationResult::remote(text, self.backend.name()))
    }

    async fn translate_chunk(
        &self,
        request: &TranslationRequest,
        text: &str,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        let key = fingerprint::chunk_key(request, text);
        let backend = Arc::clone(&self.backend);
        let job = ChunkJob::new(request, text);

        let call = self.in_flight.join_or_start(key, move || {
            async move { backend.translate(&job).await }.boxed()
        });
        if call.joined() {
            debug!("joined an in-flight call for an identical chunk");
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LlmError::Cancelled),
            outcome = call.outcome() => outcome,
        }
    }

    fn on_chunk_failure(
        &self,
        request: &TranslationRequest,
        failure: ChunkFailure<'_>,
    ) -> Result<TranslationResult, TranslateError> {
        let ChunkFailure {
            index,
            error,
            chunks,
            translated,
            masked,
            remote_successes,
        } = failure;

        if error == LlmError::Cancelled {
            return Err(error.into());
        }

        if remote_successes > 0 {
            warn!(
                "translation {}->{} partial: chunk {index}/{} failed: {error}",
                request.source_lang,
                request.target_lang,
                chunks.len()
            );
            let partial = masking::unmask(&chunking::rejoin(chunks, translated), &masked.restores);
            return Ok(TranslationResult::partial(
                partial,
                index,
                error.code(),
                self.backend.name(),
            ));
        }

        if !self.backend.is_configured() {
            warn!("no translation backend configured, returning original text");
            return Ok(TranslationResult::fallback(request.raw_text.clone()));
        }

        Err(error.into())
    }
}

struct ChunkFailure<'a> {
    index: usize,
    error: LlmError,
    chunks: &'a [Chunk],
    translated: &'a [String],
    masked: &'a MaskedText,
    remote_successes: usize,
}

/// Lowercases, maps `_` to `-` and checks the BCP-47-ish shape `xx[-yyyy…]`.
/// Returns `None` for anything that is not a plausible language tag.
pub fn normalize_lang(raw: &str) -> Option<String> {
    let tag = raw.trim().to_ascii_lowercase().replace('_', "-");
    if tag == AUTO {
        return Some(tag);
    }

    let mut parts = tag.split('-');
    let primary = parts.next()?;
    let primary_ok = (2..=3).contains(&primary.len())
        && primary.chars().all(|c| c.is_ascii_lowercase());
    let rest_ok = parts.all(|p| (2..=8).contains(&p.len()) && p.chars().all(|c| c.is_ascii_alphanumeric()));

    (primary_ok && rest_ok).then_some(tag)
}
