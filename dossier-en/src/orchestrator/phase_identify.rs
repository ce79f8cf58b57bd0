//! Identification phase
//!
//! Fans out a search to every enabled provider (plus a registry lookup when
//! the caller supplied an identifier), then normalizes, merges, and ranks
//! what came back. The best-ranked profile becomes the run's subject. This
//! is the one phase that can fail the run: when no provider yields a single
//! viable candidate, the run is unrecoverable and the failure report lists
//! what was tried.

use super::RunOrchestrator;
use crate::fanout::partition_outcomes;
use crate::gateway::search_ops;
use crate::models::{ResearchRun, RunFailure, PHASE_IDENTIFY};
use crate::types::{EntityKind, Outcome, ProviderOp, Source};
use std::collections::BTreeSet;

impl RunOrchestrator {
    pub(super) async fn phase_identify(
        &self,
        run: &mut ResearchRun,
        populated: &mut BTreeSet<Source>,
    ) -> Result<(), RunFailure> {
        let kind = run.query.kind;

        let mut ops = search_ops(
            &self.gateways,
            &self.config.categories,
            &run.query.name,
            kind,
            self.config.provider_timeout,
        );

        // Known aliases widen the search
        for alias in &run.query.aliases {
            ops.extend(search_ops(
                &self.gateways,
                &self.config.categories,
                alias,
                kind,
                self.config.provider_timeout,
            ));
        }

        // A caller-supplied identifier goes straight to the registry
        if let Some(identifier) = &run.query.identifier {
            if kind == EntityKind::Company {
                if let Some(gateway) = self.gateway(Source::CompanyRegistry) {
                    ops.push((
                        std::sync::Arc::clone(gateway),
                        ProviderOp::lookup(identifier.clone(), kind, self.config.provider_timeout),
                    ));
                }
            }
        }

        if ops.is_empty() {
            return Err(RunFailure {
                error: "no providers configured for this entity kind".to_string(),
                attempts: vec!["no provider categories enabled".to_string()],
            });
        }

        let op_count = ops.len();
        let outcomes = self.fanout.gather(ops).await;

        for outcome in &outcomes {
            if outcome.is_success() && !outcome.records().is_empty() {
                populated.insert(outcome.source());
            }
        }

        let (raw_records, _failures) = partition_outcomes(&outcomes);
        let records = self.normalizer.normalize_all(&raw_records, chrono::Utc::now());
        let profiles = self.merger.merge(&records);
        let ranked = self
            .ranker
            .rank(profiles, &run.query.name, self.config.top_k);

        tracing::info!(
            run_id = %run.run_id,
            operations = op_count,
            raw_records = raw_records.len(),
            normalized = records.len(),
            candidates = ranked.len(),
            "Identification fan-out complete"
        );

        if ranked.is_empty() {
            return Err(RunFailure {
                error: "subject could not be identified by any provider".to_string(),
                attempts: outcomes.iter().map(describe_outcome).collect(),
            });
        }

        let best = ranked[0].candidate.clone();

        self.set_block(
            run,
            PHASE_IDENTIFY,
            "identity",
            Ok(serde_json::json!({
                "profile": best,
                "candidates_considered": ranked.len(),
                "top_score": ranked[0].relevance_score,
            })),
        );

        run.profile = Some(best);
        run.candidates = ranked;

        Ok(())
    }
}

/// One attempt line for the failure report
fn describe_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Success { source, records, .. } if records.is_empty() => {
            format!("{}: returned no records", source.as_str())
        }
        Outcome::Success { source, records, .. } => {
            format!(
                "{}: {} records, none survived normalization and ranking",
                source.as_str(),
                records.len()
            )
        }
        Outcome::Failure {
            source, failure, ..
        } => format!("{}: {}", source.as_str(), failure),
    }
}
