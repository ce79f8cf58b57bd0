//! Research run state machine
//!
//! A run progresses Pending → Identifying → Enriching → Perspectives →
//! Synthesizing → Completed, with Failed reserved for the one unrecoverable
//! condition (the subject could not be identified at all) and Cancelled for
//! caller-initiated aborts. Partial content is delivered as Completed with
//! per-block error markers, never silently dropped.

use crate::types::{EntityQuery, MergedEntityProfile, RankedCandidate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Run workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunState {
    /// Created, not yet started
    Pending,
    /// Resolving the primary entity across providers
    Identifying,
    /// Gathering derived data (news, filings, peers)
    Enriching,
    /// Cross-referenced analysis blocks
    Perspectives,
    /// Final synthesis over the full report
    Synthesizing,
    /// Run finished (possibly degraded, with per-block error markers)
    Completed,
    /// Run cancelled by the caller
    Cancelled,
    /// Subject could not be identified by any provider
    Failed,
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub run_id: Uuid,
    pub old_state: RunState,
    pub new_state: RunState,
    pub transitioned_at: DateTime<Utc>,
}

/// One report block: generated content or an error marker, never both
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportBlock {
    /// Generated content (JSON)
    pub content: Option<serde_json::Value>,
    /// Error marker when the block's sub-task failed
    pub error: Option<String>,
    /// When the block reached its terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl ReportBlock {
    pub fn ok(content: serde_json::Value) -> Self {
        Self {
            content: Some(content),
            error: None,
            completed_at: Some(Utc::now()),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            content: None,
            error: Some(error.into()),
            completed_at: Some(Utc::now()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.content.is_some()
    }
}

/// A named report phase holding block-name → content
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPhase {
    pub name: String,
    pub blocks: BTreeMap<String, ReportBlock>,
}

impl ReportPhase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            blocks: BTreeMap::new(),
        }
    }

    pub fn set_block(&mut self, name: impl Into<String>, block: ReportBlock) {
        self.blocks.insert(name.into(), block);
    }

    pub fn blocks_ok(&self) -> usize {
        self.blocks.values().filter(|b| b.is_ok()).count()
    }

    pub fn blocks_failed(&self) -> usize {
        self.blocks.values().filter(|b| !b.is_ok()).count()
    }
}

/// Structured failure report for the Failed terminal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunFailure {
    pub error: String,
    /// What was tried and how each attempt failed
    pub attempts: Vec<String>,
}

/// Research run aggregate (in-memory state)
///
/// Exclusively owned by its orchestrator while in progress; the API layer
/// only ever sees snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRun {
    /// Unique run identifier
    pub run_id: Uuid,

    /// Subject descriptor the caller submitted
    pub query: EntityQuery,

    /// Current workflow state
    pub state: RunState,

    /// Report phases in execution order, created empty at run start
    pub phases: Vec<ReportPhase>,

    /// Consolidated profile of the identified subject
    pub profile: Option<MergedEntityProfile>,

    /// Ranked identification candidates (top-K)
    pub candidates: Vec<RankedCandidate<MergedEntityProfile>>,

    /// Continuous quality signal (0.0-1.0), computed at completion
    pub quality_score: f64,

    /// Failure report, only present in the Failed state
    pub failure: Option<RunFailure>,

    /// Run start time
    pub started_at: DateTime<Utc>,

    /// Run end time (terminal states only)
    pub ended_at: Option<DateTime<Utc>>,
}

impl ResearchRun {
    /// Create a new pending run with its phases pre-created empty
    pub fn new(query: EntityQuery) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            query,
            state: RunState::Pending,
            phases: super::PHASE_ORDER
                .iter()
                .map(|name| ReportPhase::new(*name))
                .collect(),
            profile: None,
            candidates: Vec::new(),
            quality_score: 0.0,
            failure: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to a new state
    pub fn transition_to(&mut self, new_state: RunState) -> StateTransition {
        let transition = StateTransition {
            run_id: self.run_id,
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        // Set end time for terminal states
        match new_state {
            RunState::Completed | RunState::Cancelled | RunState::Failed => {
                self.ended_at = Some(Utc::now());
            }
            _ => {}
        }

        transition
    }

    /// Check if run is terminal (finished)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            RunState::Completed | RunState::Cancelled | RunState::Failed
        )
    }

    /// Mutable access to a phase by name (phases are pre-created, so this
    /// only returns None for unknown names)
    pub fn phase_mut(&mut self, name: &str) -> Option<&mut ReportPhase> {
        self.phases.iter_mut().find(|p| p.name == name)
    }

    /// Read access to a phase by name
    pub fn phase(&self, name: &str) -> Option<&ReportPhase> {
        self.phases.iter().find(|p| p.name == name)
    }

    /// Total blocks across all phases
    pub fn total_blocks(&self) -> usize {
        self.phases.iter().map(|p| p.blocks.len()).sum()
    }

    /// Blocks completed without an error marker
    pub fn total_blocks_ok(&self) -> usize {
        self.phases.iter().map(|p| p.blocks_ok()).sum()
    }

    /// Run duration in seconds (to now for in-progress runs)
    pub fn duration_seconds(&self) -> u64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds().max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityKind;

    fn run() -> ResearchRun {
        ResearchRun::new(EntityQuery {
            name: "Acme".to_string(),
            identifier: None,
            kind: EntityKind::Company,
            aliases: vec![],
        })
    }

    #[test]
    fn test_new_run_has_empty_phases_in_order() {
        let run = run();
        assert_eq!(run.state, RunState::Pending);
        let names: Vec<_> = run.phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["identify", "enrich", "perspectives", "synthesize"]
        );
        assert!(run.phases.iter().all(|p| p.blocks.is_empty()));
        assert!(run.ended_at.is_none());
    }

    #[test]
    fn test_transition_records_old_and_new() {
        let mut run = run();
        let transition = run.transition_to(RunState::Identifying);
        assert_eq!(transition.old_state, RunState::Pending);
        assert_eq!(transition.new_state, RunState::Identifying);
        assert_eq!(run.state, RunState::Identifying);
        assert!(!run.is_terminal());
    }

    #[test]
    fn test_terminal_states_set_end_time() {
        for terminal in [RunState::Completed, RunState::Failed, RunState::Cancelled] {
            let mut run = run();
            run.transition_to(terminal);
            assert!(run.is_terminal());
            assert!(run.ended_at.is_some());
        }
    }

    #[test]
    fn test_block_accounting() {
        let mut run = run();
        let phase = run.phase_mut("enrich").unwrap();
        phase.set_block("news", ReportBlock::ok(serde_json::json!([])));
        phase.set_block("filings", ReportBlock::failed("provider timeout"));

        assert_eq!(run.total_blocks(), 2);
        assert_eq!(run.total_blocks_ok(), 1);
        assert_eq!(run.phase("enrich").unwrap().blocks_failed(), 1);
    }

    #[test]
    fn test_block_ok_and_failed_shapes() {
        let ok = ReportBlock::ok(serde_json::json!({"x": 1}));
        assert!(ok.is_ok());
        assert!(ok.error.is_none());

        let failed = ReportBlock::failed("timeout");
        assert!(!failed.is_ok());
        assert!(failed.content.is_none());
        assert_eq!(failed.error.as_deref(), Some("timeout"));
    }

    #[test]
    fn test_run_serializes_with_uppercase_state() {
        let mut run = run();
        run.transition_to(RunState::Identifying);
        let json = serde_json::to_string(&run).unwrap();
        assert!(json.contains("\"state\":\"IDENTIFYING\""));
    }
}
