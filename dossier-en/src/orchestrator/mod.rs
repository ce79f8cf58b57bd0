//! Consolidation orchestrator
//!
//! Drives a multi-phase research run to completion for one entity:
//! identify → enrich → perspectives → synthesize. Later phases read earlier
//! phases' outputs; sub-tasks inside a phase run concurrently. A failed
//! sub-task records an error marker in its block and the phase continues;
//! only failure to identify the primary entity at all reaches the Failed
//! terminal state. Partial content is always delivered, never dropped:
//! cancellation and budget expiry finalize the run with whatever it has.

pub mod quality;

mod phase_enrich;
mod phase_identify;
mod phase_perspectives;

use crate::analysis::AnalysisAdapter;
use crate::cache::ResultCache;
use crate::fanout::FanOutCoordinator;
use crate::gateway::ProviderGateway;
use crate::merge::Merger;
use crate::models::{
    ReportBlock, ResearchRun, RunState, PHASE_ENRICH, PHASE_IDENTIFY, PHASE_PERSPECTIVES,
    PHASE_SYNTHESIZE,
};
use crate::normalize::Normalizer;
use crate::rank::Ranker;
use crate::types::{RunConfig, Source};
use dossier_common::events::{EventBus, ResearchEvent};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Shared snapshot registry the API layer reads while runs are in flight
pub type RunRegistry = Arc<RwLock<HashMap<Uuid, ResearchRun>>>;

/// Orchestrator for one or more research runs
///
/// The orchestrator exclusively owns each run aggregate while it executes;
/// the registry only ever receives snapshots.
pub struct RunOrchestrator {
    gateways: Vec<Arc<ProviderGateway>>,
    fanout: FanOutCoordinator,
    normalizer: Normalizer,
    merger: Merger,
    ranker: Ranker,
    analysis: Option<Arc<dyn AnalysisAdapter>>,
    cache: Option<ResultCache>,
    registry: Option<RunRegistry>,
    event_bus: EventBus,
    config: RunConfig,
}

impl RunOrchestrator {
    pub fn new(
        gateways: Vec<Arc<ProviderGateway>>,
        analysis: Option<Arc<dyn AnalysisAdapter>>,
        event_bus: EventBus,
        config: RunConfig,
    ) -> Self {
        Self {
            gateways,
            fanout: FanOutCoordinator::new(config.failure_warn_fraction),
            normalizer: Normalizer::new(),
            merger: Merger::new(),
            ranker: Ranker::new(),
            analysis,
            cache: None,
            registry: None,
            event_bus,
            config,
        }
    }

    /// Attach the optional write-through result cache
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attach the snapshot registry the API layer reads
    pub fn with_registry(mut self, registry: RunRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Execute a full research run
    ///
    /// Always returns the run in a terminal state. Failed is reached only
    /// when the subject cannot be identified at all; everything else
    /// completes, possibly degraded with per-block error markers.
    pub async fn execute_run(
        &self,
        mut run: ResearchRun,
        cancel_token: CancellationToken,
    ) -> ResearchRun {
        tracing::info!(
            run_id = %run.run_id,
            subject = %run.query.name,
            kind = run.query.kind.as_str(),
            "Starting research run"
        );

        self.event_bus.emit_lossy(ResearchEvent::RunStarted {
            run_id: run.run_id,
            subject: run.query.name.clone(),
            timestamp: chrono::Utc::now(),
        });

        let deadline = self
            .config
            .wall_clock_budget
            .map(|budget| Instant::now() + budget);

        // Categories actually attempted this run: configured ∩ available
        let attempted: Vec<Source> = self
            .gateways
            .iter()
            .map(|gw| gw.source())
            .filter(|source| self.config.categories.contains(source))
            .collect();
        let mut populated: BTreeSet<Source> = BTreeSet::new();

        // Phase 1: identification (the only phase that can fail the run)
        self.start_phase(&mut run, RunState::Identifying, PHASE_IDENTIFY)
            .await;

        if let Err(failure) = self.phase_identify(&mut run, &mut populated).await {
            tracing::warn!(
                run_id = %run.run_id,
                attempts = failure.attempts.len(),
                "Subject could not be identified; run failed"
            );
            self.event_bus.emit_lossy(ResearchEvent::RunFailed {
                run_id: run.run_id,
                error: failure.error.clone(),
                attempts: failure.attempts.clone(),
                timestamp: chrono::Utc::now(),
            });
            run.failure = Some(failure);
            run.transition_to(RunState::Failed);
            self.save_snapshot(&run).await;
            return run;
        }
        self.finish_phase(&run, PHASE_IDENTIFY).await;
        self.save_snapshot(&run).await;

        if cancel_token.is_cancelled() {
            return self.cancelled(run).await;
        }
        if budget_exhausted(deadline) {
            return self
                .degraded(run, &[PHASE_ENRICH, PHASE_PERSPECTIVES, PHASE_SYNTHESIZE], &attempted, &populated)
                .await;
        }

        // Phase 2: derived data
        self.start_phase(&mut run, RunState::Enriching, PHASE_ENRICH)
            .await;
        self.phase_enrich(&mut run, &mut populated).await;
        self.finish_phase(&run, PHASE_ENRICH).await;
        self.save_snapshot(&run).await;

        if cancel_token.is_cancelled() {
            return self.cancelled(run).await;
        }
        if budget_exhausted(deadline) {
            return self
                .degraded(run, &[PHASE_PERSPECTIVES, PHASE_SYNTHESIZE], &attempted, &populated)
                .await;
        }

        // Phase 3: cross-referenced perspectives
        self.start_phase(&mut run, RunState::Perspectives, PHASE_PERSPECTIVES)
            .await;
        self.phase_perspectives(&mut run).await;
        self.finish_phase(&run, PHASE_PERSPECTIVES).await;
        self.save_snapshot(&run).await;

        if cancel_token.is_cancelled() {
            return self.cancelled(run).await;
        }
        if budget_exhausted(deadline) {
            return self
                .degraded(run, &[PHASE_SYNTHESIZE], &attempted, &populated)
                .await;
        }

        // Phase 4: synthesis
        self.start_phase(&mut run, RunState::Synthesizing, PHASE_SYNTHESIZE)
            .await;
        self.phase_synthesize(&mut run).await;
        self.finish_phase(&run, PHASE_SYNTHESIZE).await;

        self.finalize(run, &attempted, &populated).await
    }

    /// Gateway for a source, when configured
    fn gateway(&self, source: Source) -> Option<&Arc<ProviderGateway>> {
        self.gateways.iter().find(|gw| gw.source() == source)
    }

    async fn start_phase(&self, run: &mut ResearchRun, state: RunState, phase: &str) {
        run.transition_to(state);
        tracing::info!(run_id = %run.run_id, phase, "Phase started");
        self.event_bus.emit_lossy(ResearchEvent::PhaseStarted {
            run_id: run.run_id,
            phase: phase.to_string(),
            timestamp: chrono::Utc::now(),
        });
        self.save_snapshot(run).await;
    }

    async fn finish_phase(&self, run: &ResearchRun, phase: &str) {
        let (blocks_ok, blocks_failed) = run
            .phase(phase)
            .map(|p| (p.blocks_ok(), p.blocks_failed()))
            .unwrap_or((0, 0));

        self.event_bus.emit_lossy(ResearchEvent::PhaseCompleted {
            run_id: run.run_id,
            phase: phase.to_string(),
            blocks_ok,
            blocks_failed,
            timestamp: chrono::Utc::now(),
        });

        self.write_through(run, phase).await;
    }

    /// Record one block and emit the matching event
    fn set_block(
        &self,
        run: &mut ResearchRun,
        phase: &str,
        name: &str,
        result: Result<serde_json::Value, String>,
    ) {
        let block = match result {
            Ok(content) => {
                self.event_bus.emit_lossy(ResearchEvent::BlockCompleted {
                    run_id: run.run_id,
                    phase: phase.to_string(),
                    block: name.to_string(),
                    timestamp: chrono::Utc::now(),
                });
                ReportBlock::ok(content)
            }
            Err(error) => {
                tracing::warn!(run_id = %run.run_id, phase, block = name, error = %error, "Block failed");
                self.event_bus.emit_lossy(ResearchEvent::BlockFailed {
                    run_id: run.run_id,
                    phase: phase.to_string(),
                    block: name.to_string(),
                    error: error.clone(),
                    timestamp: chrono::Utc::now(),
                });
                ReportBlock::failed(error)
            }
        };

        if let Some(phase) = run.phase_mut(phase) {
            phase.set_block(name, block);
        }
    }

    async fn cancelled(&self, mut run: ResearchRun) -> ResearchRun {
        tracing::info!(run_id = %run.run_id, "Run cancelled");
        run.transition_to(RunState::Cancelled);
        self.event_bus.emit_lossy(ResearchEvent::RunCancelled {
            run_id: run.run_id,
            timestamp: chrono::Utc::now(),
        });
        self.save_snapshot(&run).await;
        run
    }

    /// Budget expired: mark unreached phases and complete degraded
    async fn degraded(
        &self,
        mut run: ResearchRun,
        skipped_phases: &[&str],
        attempted: &[Source],
        populated: &BTreeSet<Source>,
    ) -> ResearchRun {
        tracing::warn!(
            run_id = %run.run_id,
            skipped = skipped_phases.len(),
            "Wall-clock budget exhausted; completing run degraded"
        );

        for phase in skipped_phases {
            self.set_block(
                &mut run,
                phase,
                "skipped",
                Err("wall-clock budget exhausted".to_string()),
            );
        }

        self.finalize(run, attempted, populated).await
    }

    async fn finalize(
        &self,
        mut run: ResearchRun,
        attempted: &[Source],
        populated: &BTreeSet<Source>,
    ) -> ResearchRun {
        run.quality_score = quality::quality_score(&run, attempted, populated);
        run.transition_to(RunState::Completed);

        tracing::info!(
            run_id = %run.run_id,
            quality = run.quality_score,
            blocks_ok = run.total_blocks_ok(),
            blocks = run.total_blocks(),
            duration_seconds = run.duration_seconds(),
            "Research run completed"
        );

        self.event_bus.emit_lossy(ResearchEvent::RunCompleted {
            run_id: run.run_id,
            quality_score: run.quality_score,
            duration_seconds: run.duration_seconds(),
            timestamp: chrono::Utc::now(),
        });

        self.save_snapshot(&run).await;
        run
    }

    /// Publish a snapshot for the API layer
    async fn save_snapshot(&self, run: &ResearchRun) {
        if let Some(registry) = &self.registry {
            registry.write().await.insert(run.run_id, run.clone());
        }
    }

    /// Write one phase's blocks through to the cache (best-effort)
    async fn write_through(&self, run: &ResearchRun, phase: &str) {
        let Some(cache) = &self.cache else {
            return;
        };
        let Some(phase_data) = run.phase(phase) else {
            return;
        };

        match serde_json::to_value(phase_data) {
            Ok(payload) => {
                if let Err(e) = cache.save_phase(run.run_id, phase, &payload).await {
                    tracing::warn!(run_id = %run.run_id, phase, error = %e, "Cache write failed (non-fatal)");
                }
            }
            Err(e) => {
                tracing::warn!(run_id = %run.run_id, phase, error = %e, "Phase serialization failed (non-fatal)");
            }
        }
    }
}

fn budget_exhausted(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|d| Instant::now() >= d)
}
