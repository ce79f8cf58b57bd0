//! Web/news search client
//!
//! Snippet-level records from a web search API. News queries hit the news
//! vertical; everything else uses organic results. Snippet trust: useful
//! breadth, weakest field quality.

use crate::providers::rate_limit::RateLimiter;
use crate::types::{EntityKind, Provider, ProviderFailure, RawRecord, Source};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const SEARCH_BASE_URL: &str = "https://google.serper.dev";
const USER_AGENT: &str = "dossier-en/0.1.0 (+https://github.com/dossier/dossier)";
const RATE_LIMIT_MS: u64 = 250;
const RESULT_LIMIT: u32 = 20;

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    q: &'a str,
    num: u32,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    organic: Vec<SearchHit>,
    #[serde(default)]
    news: Vec<SearchHit>,
}

/// One search hit (organic or news)
#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub link: Option<String>,
    pub snippet: Option<String>,
    pub date: Option<String>,
}

/// Web search client
pub struct WebSearchClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    api_key: String,
}

impl WebSearchClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderFailure> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderFailure::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            api_key: api_key.into(),
        })
    }

    async fn run_query(&self, query: &str, vertical: &str) -> Result<Vec<SearchHit>, ProviderFailure> {
        self.rate_limiter.wait().await;

        let url = format!("{}/{}", SEARCH_BASE_URL, vertical);
        let request = SearchRequest {
            q: query,
            num: RESULT_LIMIT,
        };

        tracing::debug!(query = %query, vertical = %vertical, "Dispatching web search");

        let response = self
            .http_client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderFailure::Network(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(ProviderFailure::Auth(format!("status {}", status)));
        }
        if status == 429 {
            return Err(ProviderFailure::RateLimited);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderFailure::Api(status.as_u16(), error_text));
        }

        let search: SearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Parse(e.to_string()))?;

        let hits = if vertical == "news" {
            search.news
        } else {
            search.organic
        };

        tracing::info!(query = %query, vertical = %vertical, hits = hits.len(), "Web search complete");

        if hits.is_empty() {
            return Err(ProviderFailure::NotFound);
        }

        Ok(hits)
    }

    fn vertical_for(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::NewsItem => "news",
            _ => "search",
        }
    }

    fn to_raw_record(hit: SearchHit, kind: EntityKind) -> RawRecord {
        let mut fields = serde_json::Map::new();
        fields.insert("title".to_string(), serde_json::Value::String(hit.title));
        if let Some(link) = hit.link {
            fields.insert("link".to_string(), serde_json::Value::String(link));
        }
        if let Some(snippet) = hit.snippet {
            fields.insert("snippet".to_string(), serde_json::Value::String(snippet));
        }
        if let Some(date) = hit.date {
            fields.insert("published_at".to_string(), serde_json::Value::String(date));
        }

        RawRecord {
            source: Source::WebSearch,
            entity_kind: kind,
            fields,
        }
    }
}

#[async_trait::async_trait]
impl Provider for WebSearchClient {
    fn name(&self) -> &'static str {
        "web-search"
    }

    fn source(&self) -> Source {
        Source::WebSearch
    }

    async fn search(
        &self,
        query: &str,
        kind: EntityKind,
    ) -> Result<Vec<RawRecord>, ProviderFailure> {
        let hits = self.run_query(query, Self::vertical_for(kind)).await?;
        Ok(hits
            .into_iter()
            .map(|hit| Self::to_raw_record(hit, kind))
            .collect())
    }

    async fn lookup(
        &self,
        id: &str,
        kind: EntityKind,
    ) -> Result<Vec<RawRecord>, ProviderFailure> {
        // No id-keyed lookups on a search index; quote the id as a query
        self.search(&format!("\"{}\"", id), kind).await
    }
}
