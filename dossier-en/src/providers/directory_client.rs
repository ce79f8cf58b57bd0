//! Curated business directory client
//!
//! Name-based company search over a curated directory API. Mid trust:
//! records are human-curated but lag the official registry.

use crate::providers::rate_limit::RateLimiter;
use crate::types::{EntityKind, Provider, ProviderFailure, RawRecord, Source};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

const DIRECTORY_BASE_URL: &str = "https://api.opencorporates.com/v0.4";
const USER_AGENT: &str = "dossier-en/0.1.0 (+https://github.com/dossier/dossier)";
const RATE_LIMIT_MS: u64 = 600;
const PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
struct DirectorySearchResponse {
    results: DirectoryResults,
}

#[derive(Debug, Deserialize)]
struct DirectoryResults {
    companies: Vec<DirectoryCompanyWrapper>,
}

#[derive(Debug, Deserialize)]
struct DirectoryCompanyWrapper {
    company: DirectoryCompany,
}

/// Directory company record
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryCompany {
    /// Company display name
    pub name: String,
    /// Registry number in the source jurisdiction
    pub company_number: Option<String>,
    /// Current status text
    pub current_status: Option<String>,
    /// Incorporation date (YYYY-MM-DD)
    pub incorporation_date: Option<String>,
    /// Full registered address
    pub registered_address_in_full: Option<String>,
    /// Directory page for the company
    pub opencorporates_url: Option<String>,
}

/// Curated business directory client
pub struct DirectoryClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    api_token: String,
}

impl DirectoryClient {
    pub fn new(api_token: impl Into<String>) -> Result<Self, ProviderFailure> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderFailure::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
            api_token: api_token.into(),
        })
    }

    async fn search_companies(
        &self,
        query: &str,
    ) -> Result<Vec<DirectoryCompany>, ProviderFailure> {
        self.rate_limiter.wait().await;

        let url = format!("{}/companies/search", DIRECTORY_BASE_URL);

        tracing::debug!(query = %query, "Querying business directory");

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("q", query.to_string()),
                ("per_page", PAGE_SIZE.to_string()),
                ("api_token", self.api_token.clone()),
            ])
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

        let search: DirectorySearchResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Parse(e.to_string()))?;

        let companies: Vec<DirectoryCompany> = search
            .results
            .companies
            .into_iter()
            .map(|wrapper| wrapper.company)
            .collect();

        tracing::info!(
            query = %query,
            results = companies.len(),
            "Directory search complete"
        );

        if companies.is_empty() {
            return Err(ProviderFailure::NotFound);
        }

        Ok(companies)
    }

    fn to_raw_record(company: DirectoryCompany, kind: EntityKind) -> RawRecord {
        let mut fields = serde_json::Map::new();
        fields.insert(
            "name".to_string(),
            serde_json::Value::String(company.name),
        );
        if let Some(number) = company.company_number {
            fields.insert("tax_id".to_string(), serde_json::Value::String(number));
        }
        if let Some(status) = company.current_status {
            fields.insert("status".to_string(), serde_json::Value::String(status));
        }
        if let Some(date) = company.incorporation_date {
            fields.insert("founded".to_string(), serde_json::Value::String(date));
        }
        if let Some(address) = company.registered_address_in_full {
            fields.insert(
                "headquarters".to_string(),
                serde_json::Value::String(address),
            );
        }
        if let Some(url) = company.opencorporates_url {
            fields.insert("website".to_string(), serde_json::Value::String(url));
        }

        RawRecord {
            source: Source::BusinessDirectory,
            entity_kind: kind,
            fields,
        }
    }
}

#[async_trait::async_trait]
impl Provider for DirectoryClient {
    fn name(&self) -> &'static str {
        "business-directory"
    }

    fn source(&self) -> Source {
        Source::BusinessDirectory
    }

    async fn search(
        &self,
        query: &str,
        kind: EntityKind,
    ) -> Result<Vec<RawRecord>, ProviderFailure> {
        let companies = self.search_companies(query).await?;
        Ok(companies
            .into_iter()
            .map(|company| Self::to_raw_record(company, kind))
            .collect())
    }

    async fn lookup(
        &self,
        id: &str,
        kind: EntityKind,
    ) -> Result<Vec<RawRecord>, ProviderFailure> {
        // The directory keys its lookups by registry number; the search
        // endpoint accepts it directly
        self.search(id, kind).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = DirectoryClient::new("token");
        assert!(client.is_ok());
    }

    #[test]
    fn test_to_raw_record_maps_directory_fields() {
        let company = DirectoryCompany {
            name: "Acme Corporation".to_string(),
            company_number: Some("12345678000190".to_string()),
            current_status: Some("Active".to_string()),
            incorporation_date: Some("2015-03-01".to_string()),
            registered_address_in_full: None,
            opencorporates_url: Some(
                "https://opencorporates.com/companies/br/12345678000190".to_string(),
            ),
        };

        let raw = DirectoryClient::to_raw_record(company, EntityKind::Company);
        assert_eq!(raw.source, Source::BusinessDirectory);
        assert_eq!(
            raw.fields.get("tax_id").and_then(|v| v.as_str()),
            Some("12345678000190")
        );
        assert_eq!(
            raw.fields.get("status").and_then(|v| v.as_str()),
            Some("Active")
        );
        assert!(!raw.fields.contains_key("headquarters"));
    }

    #[test]
    fn test_search_response_shape_parses() {
        let body = r#"{
            "results": {
                "companies": [
                    {"company": {"name": "Acme", "company_number": "123", "current_status": "Active"}}
                ]
            }
        }"#;

        let parsed: DirectorySearchResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.companies.len(), 1);
        assert_eq!(parsed.results.companies[0].company.name, "Acme");
    }
}
