//! Run quality scoring
//!
//! Produces a continuous signal rather than a binary success/fail:
//! - which external data categories were successfully populated (weight 0.5)
//! - which report blocks completed without an error marker (weight 0.5)

use crate::models::ResearchRun;
use crate::types::Source;
use std::collections::BTreeSet;

const CATEGORY_WEIGHT: f64 = 0.5;
const BLOCK_WEIGHT: f64 = 0.5;

/// Weighted run quality (0.0-1.0)
pub fn quality_score(
    run: &ResearchRun,
    attempted: &[Source],
    populated: &BTreeSet<Source>,
) -> f64 {
    let category_score = if attempted.is_empty() {
        0.0
    } else {
        let hits = attempted
            .iter()
            .filter(|source| populated.contains(source))
            .count();
        hits as f64 / attempted.len() as f64
    };

    let total_blocks = run.total_blocks();
    let block_score = if total_blocks == 0 {
        0.0
    } else {
        run.total_blocks_ok() as f64 / total_blocks as f64
    };

    let overall = (category_score * CATEGORY_WEIGHT) + (block_score * BLOCK_WEIGHT);

    tracing::debug!(
        run_id = %run.run_id,
        category_score,
        block_score,
        overall,
        "Quality scoring complete"
    );

    overall.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReportBlock;
    use crate::types::{EntityKind, EntityQuery};

    fn run_with_blocks(ok: usize, failed: usize) -> ResearchRun {
        let mut run = ResearchRun::new(EntityQuery {
            name: "Acme".to_string(),
            identifier: None,
            kind: EntityKind::Company,
            aliases: vec![],
        });

        let phase = run.phase_mut("enrich").unwrap();
        for i in 0..ok {
            phase.set_block(format!("ok-{}", i), ReportBlock::ok(serde_json::json!({})));
        }
        for i in 0..failed {
            phase.set_block(format!("failed-{}", i), ReportBlock::failed("timeout"));
        }

        run
    }

    #[test]
    fn test_full_marks_when_everything_succeeded() {
        let run = run_with_blocks(4, 0);
        let attempted = vec![Source::CompanyRegistry, Source::WebSearch];
        let populated: BTreeSet<_> = attempted.iter().copied().collect();

        let score = quality_score(&run, &attempted, &populated);
        assert!((score - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_partial_failures_give_partial_score() {
        let run = run_with_blocks(2, 2);
        let attempted = vec![Source::CompanyRegistry, Source::WebSearch];
        let populated: BTreeSet<_> = [Source::CompanyRegistry].into_iter().collect();

        let score = quality_score(&run, &attempted, &populated);
        // 0.5 * (1/2 categories) + 0.5 * (2/4 blocks) = 0.5
        assert!((score - 0.5).abs() < 1e-9);
        assert!(score > 0.0 && score < 1.0, "signal must be continuous");
    }

    #[test]
    fn test_zero_when_nothing_populated() {
        let run = run_with_blocks(0, 3);
        let attempted = vec![Source::WebSearch];
        let populated = BTreeSet::new();

        let score = quality_score(&run, &attempted, &populated);
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_no_attempted_categories_scores_blocks_only() {
        let run = run_with_blocks(3, 0);
        let score = quality_score(&run, &[], &BTreeSet::new());
        // category component is 0, block component is full
        assert!((score - 0.5).abs() < 1e-9);
    }
}
