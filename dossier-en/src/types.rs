//! Core types and trait definitions for dossier-en
//!
//! Defines the data contracts between the pipeline stages:
//! - **Collection:** Provider trait + Outcome (fan-out layer)
//! - **Normalization:** RawRecord → Record with canonical fields
//! - **Consolidation:** MergedEntityProfile, RankedCandidate
//!
//! Records and profiles are immutable value objects once created; only
//! relevance scores are attached downstream, never fields mutated in place.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Entities and Sources
// ============================================================================

/// Kind of real-world subject a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Company,
    Person,
    Politician,
    NewsItem,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Company => "company",
            EntityKind::Person => "person",
            EntityKind::Politician => "politician",
            EntityKind::NewsItem => "news_item",
        }
    }
}

/// Data provider tag (for provenance tracking)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Official company registry (authoritative for companies)
    CompanyRegistry,
    /// Curated business directory
    BusinessDirectory,
    /// Web/news search snippets
    WebSearch,
    /// Professional/social graph provider
    ProfessionalGraph,
    /// Values extracted from analysis output (lowest trust)
    AnalysisExtract,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::CompanyRegistry => "company_registry",
            Source::BusinessDirectory => "business_directory",
            Source::WebSearch => "web_search",
            Source::ProfessionalGraph => "professional_graph",
            Source::AnalysisExtract => "analysis_extract",
        }
    }

    /// Trust ordinal of this source for a given entity kind
    ///
    /// Higher wins field conflicts during merge. An official registry
    /// outranks a curated directory, which outranks a search snippet,
    /// which outranks free-text extraction.
    pub fn default_trust(self, kind: EntityKind) -> u8 {
        match (self, kind) {
            (Source::CompanyRegistry, EntityKind::Company) => 4,
            (Source::CompanyRegistry, _) => 1,
            (Source::BusinessDirectory, EntityKind::Company) => 3,
            (Source::BusinessDirectory, EntityKind::NewsItem) => 2,
            (Source::BusinessDirectory, _) => 1,
            (Source::WebSearch, EntityKind::NewsItem) => 3,
            (Source::WebSearch, _) => 2,
            (Source::ProfessionalGraph, EntityKind::Person) => 3,
            (Source::ProfessionalGraph, EntityKind::Politician) => 3,
            (Source::ProfessionalGraph, _) => 2,
            (Source::AnalysisExtract, _) => 1,
        }
    }
}

/// Operational status of an entity (e.g., registry standing of a company)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    Active,
    Inactive,
}

// ============================================================================
// Records
// ============================================================================

/// Canonical entity-record schema shared by all providers
///
/// Every field is optional; the normalizer only populates what the raw
/// payload actually carries. A record with neither name nor identifier has
/// no viable identity and is discarded before merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalFields {
    /// Display name
    pub name: Option<String>,
    /// Legal/registered name where distinct from the display name
    pub legal_name: Option<String>,
    /// Stable identifier: tax id digits, URL host, or synthesized key
    pub identifier: Option<String>,
    /// Primary URL
    pub url: Option<String>,
    /// Short description / snippet
    pub description: Option<String>,
    /// Location (city/region)
    pub location: Option<String>,
    /// Operational status
    pub status: Option<EntityStatus>,
    /// Associated date (founding, publication, ...)
    pub date: Option<NaiveDate>,
}

impl CanonicalFields {
    /// High-value fields counted toward profile confidence
    pub const HIGH_VALUE_FIELD_COUNT: usize = 6;

    /// Whether the record carries a minimum viable identity
    pub fn has_identity(&self) -> bool {
        self.name.is_some() || self.identifier.is_some()
    }

    /// Number of populated high-value fields (name, identifier, url,
    /// description, location, status)
    pub fn populated_high_value(&self) -> usize {
        [
            self.name.is_some(),
            self.identifier.is_some(),
            self.url.is_some(),
            self.description.is_some(),
            self.location.is_some(),
            self.status.is_some(),
        ]
        .iter()
        .filter(|&&present| present)
        .count()
    }
}

/// Raw provider observation, exactly as the provider returned it
///
/// The gateway wraps provider payloads unchanged; normalization happens
/// later and never mutates the raw fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// Provider that produced this record
    pub source: Source,
    /// Entity kind the provider was queried for
    pub entity_kind: EntityKind,
    /// Provider-native key/value payload
    pub fields: serde_json::Map<String, serde_json::Value>,
}

/// Normalized provider observation about an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Provider that produced this record
    pub source: Source,
    /// Entity kind
    pub entity_kind: EntityKind,
    /// Provider-native payload, preserved verbatim
    pub raw_fields: serde_json::Map<String, serde_json::Value>,
    /// Canonical fields derived deterministically from raw_fields
    pub canonical: CanonicalFields,
    /// When this record was fetched
    pub fetched_at: DateTime<Utc>,
    /// Trust ordinal of the source for this entity kind
    pub trust: u8,
}

// ============================================================================
// Provider contract
// ============================================================================

/// Provider-level failure taxonomy
///
/// `Timeout` means "unknown", never "absent". `NotFound` is a legitimate
/// empty result, distinct from failure. `Auth` is fatal for the provider
/// for the remainder of the run.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ProviderFailure {
    /// No response within the per-call timeout
    #[error("Timeout")]
    Timeout,

    /// Provider signaled throttling
    #[error("Rate limited")]
    RateLimited,

    /// Credentials rejected; provider unusable for the rest of the run
    #[error("Auth failure: {0}")]
    Auth(String),

    /// Legitimate empty result
    #[error("Not found")]
    NotFound,

    /// Network-level error
    #[error("Network error: {0}")]
    Network(String),

    /// Upstream API error
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Failed to parse provider response
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ProviderFailure {
    /// NotFound is a legitimate empty result, not a provider fault
    pub fn is_empty_result(&self) -> bool {
        matches!(self, ProviderFailure::NotFound)
    }
}

/// Uniform provider capability: search by text, lookup by identifier
///
/// Providers return raw payloads; rate limiting lives inside each client,
/// retries (if any) are the caller's concern, never the provider's.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Provider name for provenance and logging
    fn name(&self) -> &'static str;

    /// Source tag for records produced by this provider
    fn source(&self) -> Source;

    /// Search for entities matching free text
    async fn search(
        &self,
        query: &str,
        kind: EntityKind,
    ) -> Result<Vec<RawRecord>, ProviderFailure>;

    /// Look up a single entity by stable identifier
    async fn lookup(&self, id: &str, kind: EntityKind)
        -> Result<Vec<RawRecord>, ProviderFailure>;
}

/// Operation kind submitted to a gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Search,
    Lookup,
}

/// One provider call: operation, parameters, and its individual timeout
#[derive(Debug, Clone)]
pub struct ProviderOp {
    pub operation: OperationKind,
    pub query: String,
    pub entity_kind: EntityKind,
    pub timeout: Duration,
}

impl ProviderOp {
    pub fn search(query: impl Into<String>, kind: EntityKind, timeout: Duration) -> Self {
        Self {
            operation: OperationKind::Search,
            query: query.into(),
            entity_kind: kind,
            timeout,
        }
    }

    pub fn lookup(id: impl Into<String>, kind: EntityKind, timeout: Duration) -> Self {
        Self {
            operation: OperationKind::Lookup,
            query: id.into(),
            entity_kind: kind,
            timeout,
        }
    }
}

/// Terminal result of one fanned-out provider call
#[derive(Debug, Clone)]
pub enum Outcome {
    Success {
        source: Source,
        operation: OperationKind,
        records: Vec<RawRecord>,
    },
    Failure {
        source: Source,
        operation: OperationKind,
        failure: ProviderFailure,
    },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn source(&self) -> Source {
        match self {
            Outcome::Success { source, .. } | Outcome::Failure { source, .. } => *source,
        }
    }

    /// Records carried by a success outcome (empty slice for failures)
    pub fn records(&self) -> &[RawRecord] {
        match self {
            Outcome::Success { records, .. } => records,
            Outcome::Failure { .. } => &[],
        }
    }

    /// Failure carried by a failure outcome
    pub fn failure(&self) -> Option<&ProviderFailure> {
        match self {
            Outcome::Success { .. } => None,
            Outcome::Failure { failure, .. } => Some(failure),
        }
    }
}

// ============================================================================
// Consolidation outputs
// ============================================================================

/// Deduplicated, conflict-resolved consolidation of records believed to
/// describe the same real-world entity
///
/// Every field value is traceable to at least one contributing record;
/// merge never invents values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedEntityProfile {
    pub entity_kind: EntityKind,
    pub fields: CanonicalFields,
    /// Providers that contributed at least one record
    pub sources: std::collections::BTreeSet<Source>,
    /// Number of records merged into this profile
    pub record_count: usize,
    /// Fraction of expected high-value fields populated, scaled by source
    /// diversity; single-source profiles are capped below the multi-source
    /// ceiling
    pub confidence_score: f64,
}

/// A candidate plus its relevance score and ordered position
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedCandidate<T> {
    pub candidate: T,
    /// Additive relevance score; may be negative after status penalties,
    /// negative scores still sort
    pub relevance_score: f64,
    /// 0-based position after ranking
    pub position: usize,
}

// ============================================================================
// Run inputs
// ============================================================================

/// Inbound entity descriptor: what to research
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityQuery {
    /// Display name to search for
    pub name: String,
    /// Known stable identifier, if the caller has one
    pub identifier: Option<String>,
    /// Subject kind
    pub kind: EntityKind,
    /// Known aliases
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// Run configuration: which provider categories to use, ranking depth,
/// timeouts, and the optional wall-clock budget
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Provider categories enabled for this run
    pub categories: Vec<Source>,
    /// Top-K for candidate ranking
    pub top_k: usize,
    /// Per-provider-call timeout
    pub provider_timeout: Duration,
    /// Warn when more than this fraction of a fan-out fails
    pub failure_warn_fraction: f64,
    /// Optional overall budget; on expiry the run completes degraded with
    /// whatever phases finished
    pub wall_clock_budget: Option<Duration>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            categories: vec![
                Source::CompanyRegistry,
                Source::BusinessDirectory,
                Source::WebSearch,
                Source::ProfessionalGraph,
            ],
            top_k: 10,
            provider_timeout: Duration::from_secs(10),
            failure_warn_fraction: 0.5,
            wall_clock_budget: None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trust_ordering_for_companies() {
        // Registry > directory > search snippet > extraction
        let registry = Source::CompanyRegistry.default_trust(EntityKind::Company);
        let directory = Source::BusinessDirectory.default_trust(EntityKind::Company);
        let search = Source::WebSearch.default_trust(EntityKind::Company);
        let extract = Source::AnalysisExtract.default_trust(EntityKind::Company);

        assert!(registry > directory);
        assert!(directory > search);
        assert!(search > extract);
    }

    #[test]
    fn test_trust_ordering_for_persons() {
        let graph = Source::ProfessionalGraph.default_trust(EntityKind::Person);
        let search = Source::WebSearch.default_trust(EntityKind::Person);
        let registry = Source::CompanyRegistry.default_trust(EntityKind::Person);

        assert!(graph > search);
        assert!(search > registry, "company registry knows nothing about persons");
    }

    #[test]
    fn test_canonical_fields_identity() {
        let empty = CanonicalFields::default();
        assert!(!empty.has_identity());

        let named = CanonicalFields {
            name: Some("Acme".to_string()),
            ..Default::default()
        };
        assert!(named.has_identity());

        let identified = CanonicalFields {
            identifier: Some("12345678000190".to_string()),
            ..Default::default()
        };
        assert!(identified.has_identity());
    }

    #[test]
    fn test_populated_high_value_count() {
        let fields = CanonicalFields {
            name: Some("Acme".to_string()),
            identifier: Some("12345678000190".to_string()),
            status: Some(EntityStatus::Active),
            ..Default::default()
        };
        assert_eq!(fields.populated_high_value(), 3);

        // date and legal_name are not high-value fields
        let fields = CanonicalFields {
            legal_name: Some("Acme S.A.".to_string()),
            date: Some(NaiveDate::from_ymd_opt(2015, 3, 1).unwrap()),
            ..Default::default()
        };
        assert_eq!(fields.populated_high_value(), 0);
    }

    #[test]
    fn test_outcome_accessors() {
        let success = Outcome::Success {
            source: Source::WebSearch,
            operation: OperationKind::Search,
            records: vec![],
        };
        assert!(success.is_success());
        assert!(success.failure().is_none());

        let failure = Outcome::Failure {
            source: Source::WebSearch,
            operation: OperationKind::Search,
            failure: ProviderFailure::Timeout,
        };
        assert!(!failure.is_success());
        assert!(failure.records().is_empty());
        assert!(matches!(failure.failure(), Some(ProviderFailure::Timeout)));
    }

    #[test]
    fn test_not_found_is_empty_result() {
        assert!(ProviderFailure::NotFound.is_empty_result());
        assert!(!ProviderFailure::Timeout.is_empty_result());
        assert!(!ProviderFailure::RateLimited.is_empty_result());
    }
}
