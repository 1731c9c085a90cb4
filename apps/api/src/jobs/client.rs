//! Vacancy search against the public recruiting API.
//!
//! Responses are passed through untouched and cached per normalized query,
//! so repeated searches from the job board page cost one upstream request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::translation::cache::TtlCache;

pub const JOBS_CACHE_MAX_ENTRIES: usize = 200;
const MAX_PER_PAGE: u32 = 100;
const DEFAULT_PER_PAGE: u32 = 20;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobsError {
    #[error("{0}")]
    InvalidQuery(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("upstream returned HTTP {status}")]
    Upstream { status: u16 },

    #[error("upstream returned an unreadable body: {0}")]
    BadResponse(String),
}

/// Query string of `GET /api/v1/jobs`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobsQuery {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
struct SearchParams {
    text: String,
    area: Option<String>,
    page: u32,
    per_page: u32,
}

impl SearchParams {
    fn from_query(query: &JobsQuery) -> Result<Self, JobsError> {
        let text = query
            .text
            .as_deref()
            .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
            .filter(|t| !t.is_empty())
            .ok_or_else(|| JobsError::InvalidQuery("Search text must not be empty".to_string()))?;

        Ok(Self {
            text,
            area: query
                .area
                .as_deref()
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
            page: query.page.unwrap_or(0),
            per_page: query
                .per_page
                .unwrap_or(DEFAULT_PER_PAGE)
                .clamp(1, MAX_PER_PAGE),
        })
    }

    /// Case-insensitive on the search text; everything else is exact.
    fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.text.to_lowercase(),
            self.area.as_deref().unwrap_or(""),
            self.page,
            self.per_page
        )
    }

    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("text", self.text.clone()),
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
        ];
        if let Some(area) = &self.area {
            pairs.push(("area", area.clone()));
        }
        pairs
    }
}

#[derive(Clone)]
pub struct JobsClient {
    client: Client,
    base_url: String,
    cache: Arc<TtlCache<Value>>,
}

impl JobsClient {
    pub fn new(
        base_url: impl Into<String>,
        user_agent: &str,
        cache: Arc<TtlCache<Value>>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            cache,
        })
    }

    pub async fn search(&self, query: &JobsQuery) -> Result<Value, JobsError> {
        let params = SearchParams::from_query(query)?;
        let key = params.cache_key();

        if let Some(hit) = self.cache.get(&key) {
            debug!("jobs cache hit for '{}'", params.text);
            return Ok(hit);
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&params.pairs())
            .send()
            .await
            .map_err(|e| JobsError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!("jobs upstream returned {status} for '{}'", params.text);
            return Err(JobsError::Upstream {
                status: status.as_u16(),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| JobsError::BadResponse(e.to_string()))?;

        self.cache.insert(key, body.clone());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(url: &str) -> JobsClient {
        let cache = Arc::new(TtlCache::new(JOBS_CACHE_MAX_ENTRIES, Duration::from_secs(300)));
        JobsClient::new(format!("{url}/vacancies"), "resume-bff-test", cache).unwrap()
    }

    fn query(text: &str) -> JobsQuery {
        JobsQuery {
            text: Some(text.to_string()),
            ..JobsQuery::default()
        }
    }

    #[test]
    fn test_params_normalization() {
        let params = SearchParams::from_query(&JobsQuery {
            text: Some("  rust   developer ".into()),
            area: Some(" 1 ".into()),
            page: None,
            per_page: Some(500),
        })
        .unwrap();
        assert_eq!(params.text, "rust developer");
        assert_eq!(params.area.as_deref(), Some("1"));
        assert_eq!(params.page, 0);
        assert_eq!(params.per_page, 100);

        let zero = SearchParams::from_query(&JobsQuery {
            per_page: Some(0),
            ..query("go")
        })
        .unwrap();
        assert_eq!(zero.per_page, 1);
    }

    #[test]
    fn test_blank_text_rejected() {
        assert!(matches!(
            SearchParams::from_query(&query("   ")),
            Err(JobsError::InvalidQuery(_))
        ));
        assert!(SearchParams::from_query(&JobsQuery::default()).is_err());
    }

    #[test]
    fn test_cache_key_ignores_case_and_spacing() {
        let a = SearchParams::from_query(&query("Rust  Developer")).unwrap();
        let b = SearchParams::from_query(&query("rust developer")).unwrap();
        assert_eq!(a.cache_key(), b.cache_key());
    }

    #[tokio::test]
    async fn test_search_passes_body_through_and_caches() {
        let mut server = mockito::Server::new_async().await;
        let body = json!({ "items": [{ "id": "1", "name": "Rust developer" }], "found": 1 });
        let mock = server
            .mock("GET", "/vacancies")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("text".into(), "rust".into()),
                Matcher::UrlEncoded("per_page".into(), "20".into()),
            ]))
            .match_header("user-agent", "resume-bff-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .expect(1)
            .create_async()
            .await;

        let client = client(&server.url());
        assert_eq!(client.search(&query("rust")).await.unwrap(), body);
        assert_eq!(client.search(&query("RUST")).await.unwrap(), body);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_error_is_reported_and_not_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/vacancies")
            .match_query(Matcher::Any)
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let client = client(&server.url());
        for _ in 0..2 {
            assert_eq!(
                client.search(&query("rust")).await.unwrap_err(),
                JobsError::Upstream { status: 503 }
            );
        }
        mock.assert_async().await;
    }
}
