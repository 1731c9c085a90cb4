use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::jobs::client::{JobsClient, JOBS_CACHE_MAX_ENTRIES};
use crate::llm_client::{LlmClient, LlmSettings, RetryPolicy};
use crate::translation::backend::{ChatTranslationBackend, TranslationBackend};
use crate::translation::cache::{spawn_sweeper, TtlCache};
use crate::translation::in_flight::InFlight;
use crate::translation::models::TranslatorSettings;
use crate::translation::Translator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: LlmClient,
    pub translator: Arc<Translator>,
    pub jobs: JobsClient,
    pub config: Config,
    /// Cancelled on shutdown; handlers derive per-request child tokens from it.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wires clients, caches and the translator from config. Cache sweepers
    /// are spawned here and stop when `shutdown` is cancelled.
    pub fn build(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let llm = LlmClient::new(LlmSettings {
            base_url: config.llm_api_url.clone(),
            api_key: config.llm_api_key.clone(),
            timeout: config.translate_timeout,
            retry: RetryPolicy {
                max_retries: config.translate_max_retries,
                ..RetryPolicy::default()
            },
        })
        .context("Failed to build LLM HTTP client")?;

        let backend: Arc<dyn TranslationBackend> =
            Arc::new(ChatTranslationBackend::new(llm.clone(), config.backend));

        let translation_cache = Arc::new(TtlCache::new(
            config.translate_cache_max_entries,
            config.translate_cache_ttl,
        ));
        let jobs_cache = Arc::new(TtlCache::new(JOBS_CACHE_MAX_ENTRIES, config.jobs_cache_ttl));

        if let Some(every) = config.cache_sweep_every {
            spawn_sweeper("translation", translation_cache.clone(), every, shutdown.clone());
            spawn_sweeper("jobs", jobs_cache.clone(), every, shutdown.clone());
        }

        let translator = Arc::new(Translator::new(
            backend,
            translation_cache,
            Arc::new(InFlight::new()),
            TranslatorSettings {
                model: config.translate_model.clone(),
                temperature: config.translate_temperature,
                max_chars: config.translate_max_chars,
                chunk_chars: config.translate_chunk_chars,
                cache_ttl: config.translate_cache_ttl,
            },
        ));

        let jobs = JobsClient::new(
            config.jobs_api_url.clone(),
            &config.jobs_user_agent,
            jobs_cache,
        )
        .context("Failed to build jobs HTTP client")?;

        info!(
            "Translator backend: {} (model: {}, configured: {})",
            translator.backend_name(),
            config.translate_model,
            translator.is_configured()
        );

        Ok(AppState {
            llm,
            translator,
            jobs,
            config,
            shutdown,
        })
    }
}
