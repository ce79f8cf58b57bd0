//! Shared test helpers: scripted mock providers and a scripted analysis
//! adapter, so pipeline behavior is tested without any network access.

// Each integration test crate compiles this module separately and uses a
// different subset of it.
#![allow(dead_code)]

use dossier_en::analysis::{
    AnalysisAdapter, AnalysisError, AnalysisInstruction, AnalysisOutput, EvidenceBundle,
};
use dossier_en::types::{EntityKind, Provider, ProviderFailure, RawRecord, Source};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Scripted provider: optional delay, then either a failure or its records
/// filtered to the requested entity kind
pub struct MockProvider {
    pub source: Source,
    pub delay: Duration,
    pub failure: Option<ProviderFailure>,
    pub records: Vec<RawRecord>,
    pub calls: Arc<AtomicUsize>,
}

impl MockProvider {
    pub fn succeeding(source: Source, records: Vec<RawRecord>) -> Self {
        Self {
            source,
            delay: Duration::ZERO,
            failure: None,
            records,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(source: Source, failure: ProviderFailure) -> Self {
        Self {
            source,
            delay: Duration::ZERO,
            failure: Some(failure),
            records: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn slow(source: Source, delay: Duration, records: Vec<RawRecord>) -> Self {
        Self {
            source,
            delay,
            failure: None,
            records,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait::async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &'static str {
        match self.source {
            Source::CompanyRegistry => "mock-registry",
            Source::BusinessDirectory => "mock-directory",
            Source::WebSearch => "mock-websearch",
            Source::ProfessionalGraph => "mock-graph",
            Source::AnalysisExtract => "mock-extract",
        }
    }

    fn source(&self) -> Source {
        self.source
    }

    async fn search(
        &self,
        _query: &str,
        kind: EntityKind,
    ) -> Result<Vec<RawRecord>, ProviderFailure> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }

        let matching: Vec<RawRecord> = self
            .records
            .iter()
            .filter(|r| r.entity_kind == kind)
            .cloned()
            .collect();

        if matching.is_empty() {
            return Err(ProviderFailure::NotFound);
        }

        Ok(matching)
    }

    async fn lookup(
        &self,
        id: &str,
        kind: EntityKind,
    ) -> Result<Vec<RawRecord>, ProviderFailure> {
        self.search(id, kind).await
    }
}

/// Raw record with canonical-style keys (every provider mapping probes them)
pub fn raw_record(
    source: Source,
    kind: EntityKind,
    pairs: &[(&str, &str)],
) -> RawRecord {
    let mut fields = serde_json::Map::new();
    for (key, value) in pairs {
        fields.insert(
            key.to_string(),
            serde_json::Value::String(value.to_string()),
        );
    }
    RawRecord {
        source,
        entity_kind: kind,
        fields,
    }
}

pub fn company_record(source: Source, name: &str, identifier: &str) -> RawRecord {
    raw_record(
        source,
        EntityKind::Company,
        &[
            ("name", name),
            ("identifier", identifier),
            ("status", "active"),
        ],
    )
}

pub fn news_record(title: &str, url: &str) -> RawRecord {
    raw_record(
        Source::WebSearch,
        EntityKind::NewsItem,
        &[("title", title), ("link", url), ("snippet", "coverage")],
    )
}

/// Scripted analysis adapter: structured output per instruction, or a
/// scripted transport error
pub struct MockAnalysisAdapter {
    pub error: Option<String>,
}

impl MockAnalysisAdapter {
    pub fn working() -> Self {
        Self { error: None }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
        }
    }
}

#[async_trait::async_trait]
impl AnalysisAdapter for MockAnalysisAdapter {
    fn name(&self) -> &'static str {
        "mock-analysis"
    }

    async fn analyze(
        &self,
        _bundle: &EvidenceBundle,
        instruction: AnalysisInstruction,
    ) -> Result<AnalysisOutput, AnalysisError> {
        if let Some(message) = &self.error {
            return Err(AnalysisError::Network(message.clone()));
        }

        Ok(match instruction {
            AnalysisInstruction::CompetitorScan => AnalysisOutput::Competitors {
                names: vec!["Beta SA".to_string(), "Gamma Logistics".to_string()],
            },
            AnalysisInstruction::Swot => AnalysisOutput::Swot {
                strengths: vec!["market leader".to_string()],
                weaknesses: vec!["regional only".to_string()],
                opportunities: vec!["expansion".to_string()],
                threats: vec!["new entrants".to_string()],
            },
            AnalysisInstruction::Sentiment => AnalysisOutput::Sentiment {
                label: "positive".to_string(),
                score: 0.6,
                rationale: "favorable coverage".to_string(),
            },
            AnalysisInstruction::Biography => AnalysisOutput::Text {
                content: "A short biography.".to_string(),
            },
            AnalysisInstruction::Synthesis => AnalysisOutput::Text {
                content: "Overall synthesis.".to_string(),
            },
        })
    }
}
