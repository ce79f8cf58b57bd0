//! Fan-out coordinator
//!
//! Issues a batch of independent provider calls concurrently for one entity
//! and collects every terminal Outcome. No operation's failure cancels its
//! siblings: a gather over n operations always returns exactly n outcomes,
//! whatever subset failed. Callers decide whether "no data" is itself an
//! error; the coordinator only logs when the failure fraction is high.
//!
//! No implicit retries. A caller wanting retry-with-backoff wraps individual
//! operations before submission.

use crate::gateway::ProviderGateway;
use crate::types::{Outcome, ProviderFailure, ProviderOp, RawRecord, Source};
use futures::future::join_all;
use std::sync::Arc;

/// Fan-out coordinator for one entity's provider calls
#[derive(Debug, Clone)]
pub struct FanOutCoordinator {
    /// Warn when more than this fraction of a batch fails
    failure_warn_fraction: f64,
}

impl FanOutCoordinator {
    pub fn new(failure_warn_fraction: f64) -> Self {
        Self {
            failure_warn_fraction: failure_warn_fraction.clamp(0.0, 1.0),
        }
    }

    /// Run all operations concurrently and collect every terminal outcome
    pub async fn gather(&self, ops: Vec<(Arc<ProviderGateway>, ProviderOp)>) -> Vec<Outcome> {
        if ops.is_empty() {
            return Vec::new();
        }

        let total = ops.len();
        let futures = ops
            .into_iter()
            .map(|(gateway, op)| async move { gateway.call(&op).await });

        let outcomes = join_all(futures).await;

        let failed = outcomes
            .iter()
            .filter(|o| !o.is_success() && !o.failure().is_some_and(|f| f.is_empty_result()))
            .count();

        if total > 0 && failed as f64 / total as f64 > self.failure_warn_fraction {
            tracing::warn!(
                failed,
                total,
                "High provider failure fraction in fan-out; returning partial results"
            );
        } else {
            tracing::debug!(failed, total, "Fan-out complete");
        }

        outcomes
    }
}

impl Default for FanOutCoordinator {
    fn default() -> Self {
        Self::new(0.5)
    }
}

/// Split outcomes into raw records and per-provider failure reasons
///
/// NotFound outcomes contribute neither: an empty result is not a failure.
pub fn partition_outcomes(outcomes: &[Outcome]) -> (Vec<RawRecord>, Vec<(Source, ProviderFailure)>) {
    let mut records = Vec::new();
    let mut failures = Vec::new();

    for outcome in outcomes {
        match outcome {
            Outcome::Success {
                records: batch, ..
            } => records.extend(batch.iter().cloned()),
            Outcome::Failure {
                source, failure, ..
            } => {
                if !failure.is_empty_result() {
                    failures.push((*source, failure.clone()));
                }
            }
        }
    }

    (records, failures)
}
