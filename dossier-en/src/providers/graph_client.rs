//! Professional graph client
//!
//! Person/politician lookups against a professional graph API. Mid trust
//! for people: profiles are self-reported but identity-verified.

use crate::providers::rate_limit::RateLimiter;
use crate::types::{EntityKind, Provider, ProviderFailure, RawRecord, Source};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const GRAPH_BASE_URL: &str = "https://api.peopledatalabs.com/v5";
const USER_AGENT: &str = "dossier-en/0.1.0 (+https://github.com/dossier/dossier)";
const RATE_LIMIT_MS: u64 = 1000;
const RESULT_LIMIT: u32 = 10;

#[derive(Debug, Serialize)]
struct PersonSearchRequest<'a> {
    query: &'a str,
    size: u32,
}

#[derive(Debug, Deserialize)]
struct PersonSearchResponse {
    #[serde(default)]
    data: Vec<GraphPerson>,
}

/// Graph person record
#[derive(Debug, Clone, Deserialize)]
pub struct GraphPerson {
    pub full_name: String,
    pub job_title: Option<String>,
    pub linkedin_url: Option<String>,
    pub location_name: Option<String>,
}

/// Professional graph client
pub struct GraphClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    api_key: String,
}

impl GraphClient {
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

    async fn search_people(&self, query: &str) -> Result<Vec<GraphPerson>, ProviderFailure> {
        self.rate_limiter.wait().await;

        let url = format!("{}/person/search", GRAPH_BASE_URL);
        let request = PersonSearchRequest {
            query,
            size: RESULT_LIMIT,
        };

        tracing::debug!(query = %query, "Querying professional graph");

        let response = self
            .http_client
            .post(&url)
            .header("X-Api-Key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderFailure::Network(e.to_string()))?;

        let status = response.status();

        if status == 401 || status == 403 {
            return Err(ProviderFailure::Auth(format!("status {}", status)));
        }
        if status == 404 {
            return Err(ProviderFailure::NotFound);
        }
        if status == 429 {
            return Err(ProviderFailure::RateLimited);
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderFailure::Api(status.as_u16(), error_text));
        }

        let search: PersonSearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Parse(e.to_string()))?;

        tracing::info!(query = %query, results = search.data.len(), "Graph search complete");

        if search.data.is_empty() {
            return Err(ProviderFailure::NotFound);
        }

        Ok(search.data)
    }

    fn to_raw_record(person: GraphPerson, kind: EntityKind) -> RawRecord {
        let mut fields = serde_json::Map::new();
        fields.insert(
            "full_name".to_string(),
            serde_json::Value::String(person.full_name),
        );
        if let Some(title) = person.job_title {
            fields.insert("headline".to_string(), serde_json::Value::String(title));
        }
        if let Some(url) = person.linkedin_url {
            fields.insert("profile_url".to_string(), serde_json::Value::String(url));
        }
        if let Some(location) = person.location_name {
            fields.insert("location".to_string(), serde_json::Value::String(location));
        }

        RawRecord {
            source: Source::ProfessionalGraph,
            entity_kind: kind,
            fields,
        }
    }
}

#[async_trait::async_trait]
impl Provider for GraphClient {
    fn name(&self) -> &'static str {
        "professional-graph"
    }

    fn source(&self) -> Source {
        Source::ProfessionalGraph
    }

    async fn search(
        &self,
        query: &str,
        kind: EntityKind,
    ) -> Result<Vec<RawRecord>, ProviderFailure> {
        let people = self.search_people(query).await?;
        Ok(people
            .into_iter()
            .map(|person| Self::to_raw_record(person, kind))
            .collect())
    }

    async fn lookup(
        &self,
        id: &str,
        kind: EntityKind,
    ) -> Result<Vec<RawRecord>, ProviderFailure> {
        // Profile URLs double as identifiers in the graph
        self.search(id, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = GraphClient::new("key");
        assert!(client.is_ok());
    }

    #[test]
    fn test_to_raw_record_maps_person_fields() {
        let person = GraphPerson {
            full_name: "Maria Silva".to_string(),
            job_title: Some("CEO at Acme".to_string()),
            linkedin_url: Some("https://linkedin.com/in/maria-silva".to_string()),
            location_name: Some("Sao Paulo, Brazil".to_string()),
        };

        let raw = GraphClient::to_raw_record(person, EntityKind::Person);
        assert_eq!(raw.source, Source::ProfessionalGraph);
        assert_eq!(
            raw.fields.get("full_name").and_then(|v| v.as_str()),
            Some("Maria Silva")
        );
        assert_eq!(
            raw.fields.get("headline").and_then(|v| v.as_str()),
            Some("CEO at Acme")
        );
    }

    #[test]
    fn test_empty_data_array_parses() {
        let parsed: PersonSearchResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.data.is_empty());
    }
}
