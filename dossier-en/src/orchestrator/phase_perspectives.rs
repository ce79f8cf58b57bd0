//! Perspectives and synthesis phases
//!
//! Hands the consolidated evidence bundle across the analysis-adapter
//! boundary, one instruction per block. Adapter transport errors and
//! parse-failure markers both land as block error markers; an absent
//! adapter degrades every analysis block the same way. The run itself
//! never fails here.

use super::RunOrchestrator;
use crate::analysis::{AnalysisError, AnalysisInstruction, AnalysisOutput, EvidenceBundle};
use crate::models::{ResearchRun, PHASE_PERSPECTIVES, PHASE_SYNTHESIZE};
use crate::types::EntityKind;
use futures::future::join_all;
use std::sync::Arc;

impl RunOrchestrator {
    pub(super) async fn phase_perspectives(&self, run: &mut ResearchRun) {
        let blocks: Vec<(&'static str, AnalysisInstruction)> = match run.query.kind {
            EntityKind::Company => vec![
                ("competitors", AnalysisInstruction::CompetitorScan),
                ("swot", AnalysisInstruction::Swot),
                ("sentiment", AnalysisInstruction::Sentiment),
            ],
            EntityKind::Person | EntityKind::Politician => vec![
                ("biography", AnalysisInstruction::Biography),
                ("sentiment", AnalysisInstruction::Sentiment),
            ],
            EntityKind::NewsItem => vec![("sentiment", AnalysisInstruction::Sentiment)],
        };

        let Some(adapter) = &self.analysis else {
            for (name, _) in blocks {
                self.set_block(
                    run,
                    PHASE_PERSPECTIVES,
                    name,
                    Err("analysis adapter not configured".to_string()),
                );
            }
            return;
        };

        let bundle = self.evidence_bundle(run);

        let futures = blocks.into_iter().map(|(name, instruction)| {
            let adapter = Arc::clone(adapter);
            let bundle = &bundle;
            async move { (name, adapter.analyze(bundle, instruction).await) }
        });

        let results = join_all(futures).await;

        for (name, result) in results {
            self.set_block(run, PHASE_PERSPECTIVES, name, analysis_block(result));
        }
    }

    pub(super) async fn phase_synthesize(&self, run: &mut ResearchRun) {
        let Some(adapter) = &self.analysis else {
            self.set_block(
                run,
                PHASE_SYNTHESIZE,
                "summary",
                Err("analysis adapter not configured".to_string()),
            );
            return;
        };

        // The bundle now carries the perspectives blocks as well
        let bundle = self.evidence_bundle(run);
        let result = adapter.analyze(&bundle, AnalysisInstruction::Synthesis).await;
        self.set_block(run, PHASE_SYNTHESIZE, "summary", analysis_block(result));
    }

    /// Consolidated evidence bundle: subject profile plus every completed
    /// block so far, keyed "<phase>.<block>"
    pub(super) fn evidence_bundle(&self, run: &ResearchRun) -> EvidenceBundle {
        let subject = run
            .profile
            .as_ref()
            .and_then(|p| p.fields.name.clone())
            .unwrap_or_else(|| run.query.name.clone());

        let mut bundle = EvidenceBundle::new(subject, run.query.kind);

        if let Some(profile) = &run.profile {
            bundle = bundle.with_section(
                "profile",
                serde_json::to_value(profile).unwrap_or(serde_json::Value::Null),
            );
        }

        for phase in &run.phases {
            for (name, block) in &phase.blocks {
                if let Some(content) = &block.content {
                    bundle =
                        bundle.with_section(format!("{}.{}", phase.name, name), content.clone());
                }
            }
        }

        bundle
    }
}

/// Map an adapter result onto block content or an error marker
fn analysis_block(
    result: Result<AnalysisOutput, AnalysisError>,
) -> Result<serde_json::Value, String> {
    match result {
        Ok(AnalysisOutput::ParseFailure { error, .. }) => {
            Err(format!("analysis output could not be parsed: {}", error))
        }
        Ok(output) => serde_json::to_value(&output).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    }
}
