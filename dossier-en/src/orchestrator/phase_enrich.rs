//! Enrichment phase
//!
//! Derived data for the identified subject, one block per sub-task:
//! - news: web/news search snippets, ranked against the subject
//! - filings: registry detail by tax id (companies with a strong id)
//! - peers: directory candidates that cluster near the subject name
//! - graph: professional-graph profile (persons/politicians)
//!
//! Sub-tasks run concurrently; each failure becomes its block's error
//! marker and the remaining sub-tasks continue.

use super::RunOrchestrator;
use crate::models::{ResearchRun, PHASE_ENRICH};
use crate::types::{EntityKind, Outcome, ProviderOp, Source};
use std::collections::BTreeSet;

impl RunOrchestrator {
    pub(super) async fn phase_enrich(
        &self,
        run: &mut ResearchRun,
        populated: &mut BTreeSet<Source>,
    ) {
        let subject = run
            .profile
            .as_ref()
            .and_then(|p| p.fields.name.clone())
            .unwrap_or_else(|| run.query.name.clone());

        match run.query.kind {
            EntityKind::Company => {
                let filing_id = run
                    .profile
                    .as_ref()
                    .and_then(|p| p.fields.identifier.clone())
                    .filter(|id| id.len() == 14 && id.chars().all(|c| c.is_ascii_digit()));

                let filings_fut = async {
                    match &filing_id {
                        Some(id) => Some(self.collect_filings(id).await),
                        None => None,
                    }
                };

                let (news, peers, filings) = tokio::join!(
                    self.collect_news(&subject),
                    self.collect_peers(&subject),
                    filings_fut
                );

                if news.is_ok() {
                    populated.insert(Source::WebSearch);
                }
                if peers.is_ok() {
                    populated.insert(Source::BusinessDirectory);
                }
                self.set_block(run, PHASE_ENRICH, "news", news);
                self.set_block(run, PHASE_ENRICH, "peers", peers);

                if let Some(filings) = filings {
                    if filings.is_ok() {
                        populated.insert(Source::CompanyRegistry);
                    }
                    self.set_block(run, PHASE_ENRICH, "filings", filings);
                }
            }
            EntityKind::Person | EntityKind::Politician => {
                let (news, graph) =
                    tokio::join!(self.collect_news(&subject), self.collect_graph(&subject));

                if news.is_ok() {
                    populated.insert(Source::WebSearch);
                }
                if graph.is_ok() {
                    populated.insert(Source::ProfessionalGraph);
                }
                self.set_block(run, PHASE_ENRICH, "news", news);
                self.set_block(run, PHASE_ENRICH, "graph", graph);
            }
            EntityKind::NewsItem => {
                let news = self.collect_news(&subject).await;
                if news.is_ok() {
                    populated.insert(Source::WebSearch);
                }
                self.set_block(run, PHASE_ENRICH, "news", news);
            }
        }
    }

    /// News snippets about the subject, ranked by relevance
    async fn collect_news(&self, subject: &str) -> Result<serde_json::Value, String> {
        let gateway = self
            .gateway(Source::WebSearch)
            .ok_or("web search provider not configured")?;

        let op = ProviderOp::search(
            format!("{} news", subject),
            EntityKind::NewsItem,
            self.config.provider_timeout,
        );

        match gateway.call(&op).await {
            Outcome::Success { records, .. } => {
                let normalized = self.normalizer.normalize_all(&records, chrono::Utc::now());
                let ranked = self.ranker.rank(normalized, subject, self.config.top_k);

                let items: Vec<serde_json::Value> = ranked
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "title": r.candidate.canonical.name,
                            "url": r.candidate.canonical.url,
                            "snippet": r.candidate.canonical.description,
                            "published": r.candidate.canonical.date,
                            "relevance": r.relevance_score,
                        })
                    })
                    .collect();

                Ok(serde_json::Value::Array(items))
            }
            Outcome::Failure { failure, .. } if failure.is_empty_result() => {
                Ok(serde_json::json!([]))
            }
            Outcome::Failure { failure, .. } => Err(failure.to_string()),
        }
    }

    /// Registry detail for the subject's tax id
    async fn collect_filings(&self, identifier: &str) -> Result<serde_json::Value, String> {
        let gateway = self
            .gateway(Source::CompanyRegistry)
            .ok_or("registry provider not configured")?;

        let op = ProviderOp::lookup(identifier, EntityKind::Company, self.config.provider_timeout);

        match gateway.call(&op).await {
            Outcome::Success { records, .. } => {
                let normalized = self.normalizer.normalize_all(&records, chrono::Utc::now());
                let canonical: Vec<_> = normalized.iter().map(|r| &r.canonical).collect();
                serde_json::to_value(&canonical).map_err(|e| e.to_string())
            }
            Outcome::Failure { failure, .. } if failure.is_empty_result() => {
                Ok(serde_json::json!([]))
            }
            Outcome::Failure { failure, .. } => Err(failure.to_string()),
        }
    }

    /// Directory candidates around the subject name (deduplicated, ranked)
    async fn collect_peers(&self, subject: &str) -> Result<serde_json::Value, String> {
        let gateway = self
            .gateway(Source::BusinessDirectory)
            .ok_or("directory provider not configured")?;

        let op = ProviderOp::search(subject, EntityKind::Company, self.config.provider_timeout);

        match gateway.call(&op).await {
            Outcome::Success { records, .. } => {
                let normalized = self.normalizer.normalize_all(&records, chrono::Utc::now());
                let profiles = self.merger.merge(&normalized);
                let ranked = self.ranker.rank(profiles, subject, self.config.top_k);

                let peers: Vec<serde_json::Value> = ranked
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "name": r.candidate.fields.name,
                            "identifier": r.candidate.fields.identifier,
                            "status": r.candidate.fields.status,
                            "confidence": r.candidate.confidence_score,
                            "relevance": r.relevance_score,
                        })
                    })
                    .collect();

                Ok(serde_json::Value::Array(peers))
            }
            Outcome::Failure { failure, .. } if failure.is_empty_result() => {
                Ok(serde_json::json!([]))
            }
            Outcome::Failure { failure, .. } => Err(failure.to_string()),
        }
    }

    /// Professional-graph profile for a person subject
    async fn collect_graph(&self, subject: &str) -> Result<serde_json::Value, String> {
        let gateway = self
            .gateway(Source::ProfessionalGraph)
            .ok_or("professional graph provider not configured")?;

        let op = ProviderOp::search(subject, EntityKind::Person, self.config.provider_timeout);

        match gateway.call(&op).await {
            Outcome::Success { records, .. } => {
                let normalized = self.normalizer.normalize_all(&records, chrono::Utc::now());
                let profiles = self.merger.merge(&normalized);
                let ranked = self.ranker.rank(profiles, subject, self.config.top_k);
                serde_json::to_value(
                    ranked
                        .iter()
                        .map(|r| &r.candidate)
                        .collect::<Vec<_>>(),
                )
                .map_err(|e| e.to_string())
            }
            Outcome::Failure { failure, .. } if failure.is_empty_result() => {
                Ok(serde_json::json!([]))
            }
            Outcome::Failure { failure, .. } => Err(failure.to_string()),
        }
    }
}
