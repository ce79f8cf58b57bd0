//! Official company registry client
//!
//! Looks companies up by tax id (CNPJ) against the public registry API.
//! The registry has no name search; search queries that are not a tax id
//! come back as a legitimate empty result.

use crate::providers::rate_limit::RateLimiter;
use crate::types::{EntityKind, Provider, ProviderFailure, RawRecord, Source};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const REGISTRY_BASE_URL: &str = "https://brasilapi.com.br/api/cnpj/v1";
const USER_AGENT: &str = "dossier-en/0.1.0 (+https://github.com/dossier/dossier)";
const RATE_LIMIT_MS: u64 = 350;

/// Registry company record
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegistryCompany {
    /// Tax id (CNPJ)
    pub cnpj: String,
    /// Registered legal name
    pub razao_social: String,
    /// Trade name (may be empty)
    pub nome_fantasia: Option<String>,
    /// Registry standing description (e.g., "ATIVA", "BAIXADA")
    pub descricao_situacao_cadastral: Option<String>,
    /// Activity start date (YYYY-MM-DD)
    pub data_inicio_atividade: Option<String>,
    /// Municipality
    pub municipio: Option<String>,
    /// State code
    pub uf: Option<String>,
    /// Primary activity description
    pub cnae_fiscal_descricao: Option<String>,
}

/// Official company registry client
pub struct RegistryClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
}

impl RegistryClient {
    pub fn new() -> Result<Self, ProviderFailure> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ProviderFailure::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RATE_LIMIT_MS)),
        })
    }

    /// Fetch one company by tax id digits
    async fn fetch_company(&self, cnpj: &str) -> Result<RegistryCompany, ProviderFailure> {
        self.rate_limiter.wait().await;

        let url = format!("{}/{}", REGISTRY_BASE_URL, cnpj);

        tracing::debug!(cnpj = %cnpj, url = %url, "Querying company registry");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderFailure::Network(e.to_string()))?;

        let status = response.status();

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

        let company: RegistryCompany = response
            .json()
            .await
            .map_err(|e| ProviderFailure::Parse(e.to_string()))?;

        tracing::info!(
            cnpj = %cnpj,
            legal_name = %company.razao_social,
            "Retrieved company from registry"
        );

        Ok(company)
    }

    fn to_raw_record(company: RegistryCompany, kind: EntityKind) -> RawRecord {
        let mut fields = serde_json::Map::new();
        let value = serde_json::to_value(&company).unwrap_or_default();
        if let serde_json::Value::Object(map) = value {
            for (key, val) in map {
                if !val.is_null() {
                    fields.insert(key, val);
                }
            }
        }

        RawRecord {
            source: Source::CompanyRegistry,
            entity_kind: kind,
            fields,
        }
    }
}

/// Tax-id digits of a query string, when it plausibly is one
fn cnpj_digits(query: &str) -> Option<String> {
    let digits: String = query.chars().filter(|c| c.is_ascii_digit()).collect();
    let separators_only = query
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '/' | '-' | ' '));

    (digits.len() == 14 && separators_only).then_some(digits)
}

#[async_trait::async_trait]
impl Provider for RegistryClient {
    fn name(&self) -> &'static str {
        "company-registry"
    }

    fn source(&self) -> Source {
        Source::CompanyRegistry
    }

    async fn search(
        &self,
        query: &str,
        kind: EntityKind,
    ) -> Result<Vec<RawRecord>, ProviderFailure> {
        // The registry only answers tax-id lookups
        match cnpj_digits(query) {
            Some(digits) => self.lookup(&digits, kind).await,
            None => Err(ProviderFailure::NotFound),
        }
    }

    async fn lookup(
        &self,
        id: &str,
        kind: EntityKind,
    ) -> Result<Vec<RawRecord>, ProviderFailure> {
        let digits = cnpj_digits(id).ok_or(ProviderFailure::NotFound)?;
        let company = self.fetch_company(&digits).await?;
        Ok(vec![Self::to_raw_record(company, kind)])
    }
}
