//! Provider gateway
//!
//! Uniform interface to one external data source. Normalizes success/error
//! into the common Outcome shape, enforces the per-call timeout, and holds
//! the provider's concurrency budget: over-budget calls queue on the
//! semaphore, they never fail.
//!
//! The gateway performs no retries; retry policy belongs to the caller.

use crate::types::{EntityKind, Outcome, Provider, ProviderFailure, ProviderOp, Source};
use crate::types::OperationKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default per-provider concurrency budget
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Gateway wrapping a single provider
pub struct ProviderGateway {
    provider: Arc<dyn Provider>,
    /// Per-provider concurrency budget, shared across runs
    budget: Arc<Semaphore>,
    /// Latched after the provider rejects credentials; all later calls
    /// short-circuit for the remainder of the process
    auth_failed: AtomicBool,
}

impl ProviderGateway {
    pub fn new(provider: Arc<dyn Provider>, max_concurrency: usize) -> Self {
        Self {
            provider,
            budget: Arc::new(Semaphore::new(max_concurrency.max(1))),
            auth_failed: AtomicBool::new(false),
        }
    }

    pub fn source(&self) -> Source {
        self.provider.source()
    }

    pub fn name(&self) -> &'static str {
        self.provider.name()
    }

    /// Whether this gateway still accepts calls (auth not latched)
    pub fn is_usable(&self) -> bool {
        !self.auth_failed.load(Ordering::Relaxed)
    }

    /// Execute one operation against the provider
    ///
    /// Always returns a terminal Outcome: success, or a tagged failure after
    /// the operation's individual timeout. Timeout means "unknown", never
    /// "absent".
    pub async fn call(&self, op: &ProviderOp) -> Outcome {
        let source = self.provider.source();

        if self.auth_failed.load(Ordering::Relaxed) {
            return Outcome::Failure {
                source,
                operation: op.operation,
                failure: ProviderFailure::Auth("credentials rejected earlier in run".to_string()),
            };
        }

        // Queue (never fail) when the provider's budget is exhausted.
        // acquire() only errs when the semaphore is closed, which we never do.
        let _permit = match self.budget.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return Outcome::Failure {
                    source,
                    operation: op.operation,
                    failure: ProviderFailure::Network("provider budget closed".to_string()),
                }
            }
        };

        tracing::debug!(
            provider = self.provider.name(),
            operation = ?op.operation,
            query = %op.query,
            timeout_ms = op.timeout.as_millis() as u64,
            "Dispatching provider call"
        );

        let call = self.dispatch(op);

        match tokio::time::timeout(op.timeout, call).await {
            Err(_elapsed) => Outcome::Failure {
                source,
                operation: op.operation,
                failure: ProviderFailure::Timeout,
            },
            Ok(Ok(records)) => {
                tracing::debug!(
                    provider = self.provider.name(),
                    records = records.len(),
                    "Provider call succeeded"
                );
                Outcome::Success {
                    source,
                    operation: op.operation,
                    records,
                }
            }
            Ok(Err(failure)) => {
                if matches!(failure, ProviderFailure::Auth(_)) {
                    tracing::warn!(
                        provider = self.provider.name(),
                        "Auth failure; disabling provider for remainder of run"
                    );
                    self.auth_failed.store(true, Ordering::Relaxed);
                }
                Outcome::Failure {
                    source,
                    operation: op.operation,
                    failure,
                }
            }
        }
    }

    async fn dispatch(
        &self,
        op: &ProviderOp,
    ) -> Result<Vec<crate::types::RawRecord>, ProviderFailure> {
        match op.operation {
            OperationKind::Search => self.provider.search(&op.query, op.entity_kind).await,
            OperationKind::Lookup => self.provider.lookup(&op.query, op.entity_kind).await,
        }
    }
}

/// Convenience constructor used by callers that accept the default budget
pub fn gateway_for(provider: Arc<dyn Provider>) -> Arc<ProviderGateway> {
    Arc::new(ProviderGateway::new(provider, DEFAULT_CONCURRENCY))
}

/// Build a search op for each gateway whose category is enabled
pub fn search_ops(
    gateways: &[Arc<ProviderGateway>],
    categories: &[Source],
    query: &str,
    kind: EntityKind,
    timeout: std::time::Duration,
) -> Vec<(Arc<ProviderGateway>, ProviderOp)> {
    gateways
        .iter()
        .filter(|gw| categories.contains(&gw.source()))
        .map(|gw| (Arc::clone(gw), ProviderOp::search(query, kind, timeout)))
        .collect()
}
