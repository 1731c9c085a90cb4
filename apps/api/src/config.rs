use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::translation::backend::BackendProfile;
use crate::translation::cache::MAX_TTL;

pub const DEFAULT_JOBS_API_URL: &str = "https://api.hh.ru/vacancies";
const DEFAULT_JOBS_USER_AGENT: &str = "resume-bff/0.1 (job-search proxy)";

/// Application configuration loaded from environment variables.
/// Every value has a default; only malformed values fail startup.
/// A missing `LLM_API_KEY` puts translation into fallback mode.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,

    pub backend: BackendProfile,
    pub llm_api_url: String,
    pub llm_api_key: Option<String>,

    pub translate_model: String,
    pub translate_temperature: f32,
    pub translate_timeout: Duration,
    pub translate_max_retries: u32,
    pub translate_max_chars: usize,
    pub translate_chunk_chars: usize,
    pub translate_cache_ttl: Duration,
    pub translate_cache_max_entries: usize,
    /// `None` disables the background sweep.
    pub cache_sweep_every: Option<Duration>,

    pub chat_model: String,
    pub chat_max_messages: usize,

    pub jobs_api_url: String,
    pub jobs_user_agent: String,
    pub jobs_cache_ttl: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let backend = match get("TRANSLATOR_BACKEND") {
            Some(name) => name
                .parse::<BackendProfile>()
                .map_err(|e| anyhow!(e))
                .context("TRANSLATOR_BACKEND must be 'openrouter' or 'deepseek'")?,
            None => BackendProfile::default(),
        };

        let temperature: f32 = parse_or(&get, "TRANSLATE_TEMPERATURE", 0.2)?;
        if !(0.0..=2.0).contains(&temperature) {
            anyhow::bail!("TRANSLATE_TEMPERATURE must be between 0 and 2");
        }

        let chunk_chars = parse_or(&get, "TRANSLATE_CHUNK_CHARS", backend.default_chunk_chars())?;
        if chunk_chars == 0 {
            anyhow::bail!("TRANSLATE_CHUNK_CHARS must be positive");
        }

        let sweep_secs: u64 = parse_or(&get, "CACHE_SWEEP_SECS", 300)?;
        let translate_cache_ttl = cache_ttl(&get, "TRANSLATE_CACHE_TTL_SECS", 3600)?;
        let jobs_cache_ttl = cache_ttl(&get, "JOBS_CACHE_TTL_SECS", 300)?;

        Ok(Config {
            port: parse_or(&get, "PORT", 8080)?,
            rust_log: get("RUST_LOG").unwrap_or_else(|| "info".to_string()),

            backend,
            llm_api_url: get("LLM_API_URL")
                .unwrap_or_else(|| backend.default_base_url().to_string()),
            llm_api_key: get("LLM_API_KEY"),

            translate_model: get("TRANSLATE_MODEL")
                .unwrap_or_else(|| backend.default_model().to_string()),
            translate_temperature: temperature,
            translate_timeout: Duration::from_secs(parse_or(&get, "TRANSLATE_TIMEOUT_SECS", 25)?),
            translate_max_retries: parse_or(&get, "TRANSLATE_MAX_RETRIES", 2)?,
            translate_max_chars: parse_or(&get, "TRANSLATE_MAX_CHARS", 20_000)?,
            translate_chunk_chars: chunk_chars,
            translate_cache_ttl,
            translate_cache_max_entries: parse_or(&get, "TRANSLATE_CACHE_MAX_ENTRIES", 500)?,
            cache_sweep_every: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),

            chat_model: get("CHAT_MODEL").unwrap_or_else(|| backend.default_model().to_string()),
            chat_max_messages: parse_or(&get, "CHAT_MAX_MESSAGES", 40)?,

            jobs_api_url: get("JOBS_API_URL").unwrap_or_else(|| DEFAULT_JOBS_API_URL.to_string()),
            jobs_user_agent: get("JOBS_USER_AGENT")
                .unwrap_or_else(|| DEFAULT_JOBS_USER_AGENT.to_string()),
            jobs_cache_ttl,
        })
    }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn cache_ttl(get: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    let ttl = Duration::from_secs(parse_or(get, key, default)?);
    if ttl > MAX_TTL {
        anyhow::bail!("{key} must be at most {} seconds", MAX_TTL.as_secs());
    }
    Ok(ttl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_without_any_variable() {
        let config = config(&[]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.backend, BackendProfile::OpenRouter);
        assert_eq!(config.llm_api_url, "https://openrouter.ai/api/v1");
        assert_eq!(config.llm_api_key, None);
        assert_eq!(config.translate_chunk_chars, 3500);
        assert_eq!(config.translate_max_chars, 20_000);
        assert_eq!(config.translate_timeout, Duration::from_secs(25));
        assert_eq!(config.cache_sweep_every, Some(Duration::from_secs(300)));
        assert_eq!(config.jobs_api_url, DEFAULT_JOBS_API_URL);
    }

    #[test]
    fn test_profile_drives_defaults() {
        let config = config(&[("TRANSLATOR_BACKEND", "deepseek")]).unwrap();
        assert_eq!(config.llm_api_url, "https://api.deepseek.com/v1");
        assert_eq!(config.translate_model, "deepseek-chat");
        assert_eq!(config.translate_chunk_chars, 2000);
    }

    #[test]
    fn test_blank_key_means_unset_and_zero_sweep_disables() {
        let config = config(&[("LLM_API_KEY", "   "), ("CACHE_SWEEP_SECS", "0")]).unwrap();
        assert_eq!(config.llm_api_key, None);
        assert_eq!(config.cache_sweep_every, None);
    }

    #[test]
    fn test_malformed_values_fail() {
        assert!(config(&[("PORT", "eighty")]).is_err());
        assert!(config(&[("TRANSLATOR_BACKEND", "google")]).is_err());
        assert!(config(&[("TRANSLATE_TEMPERATURE", "3.5")]).is_err());
        assert!(config(&[("TRANSLATE_CHUNK_CHARS", "0")]).is_err());
    }

    #[test]
    fn test_oversized_cache_ttl_rejected_at_startup() {
        let max = MAX_TTL.as_secs().to_string();
        let at_max = config(&[("TRANSLATE_CACHE_TTL_SECS", max.as_str())]).unwrap();
        assert_eq!(at_max.translate_cache_ttl, MAX_TTL);

        for key in ["TRANSLATE_CACHE_TTL_SECS", "JOBS_CACHE_TTL_SECS"] {
            let err = config(&[(key, "18446744073709551615")]).unwrap_err();
            assert!(err.to_string().contains(key), "{err}");
        }
    }
}
