//! Data models for research runs

mod research_run;

pub use research_run::{
    ReportBlock, ReportPhase, ResearchRun, RunFailure, RunState, StateTransition,
};

/// Canonical phase names, in execution order
pub const PHASE_IDENTIFY: &str = "identify";
pub const PHASE_ENRICH: &str = "enrich";
pub const PHASE_PERSPECTIVES: &str = "perspectives";
pub const PHASE_SYNTHESIZE: &str = "synthesize";

pub const PHASE_ORDER: [&str; 4] = [
    PHASE_IDENTIFY,
    PHASE_ENRICH,
    PHASE_PERSPECTIVES,
    PHASE_SYNTHESIZE,
];
