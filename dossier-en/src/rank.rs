//! Relevance ranker
//!
//! Scores candidates against the original query and returns an ordered
//! top-K. Scoring is deterministic, additive, and pure: exact substring
//! matches earn fixed bonuses, token overlap earns a proportional bonus,
//! and inactive entities take a fixed penalty. Negative scores still sort;
//! nothing is filtered implicitly. Ties preserve first-seen order.

use crate::normalize::{matching_name, matching_tokens};
use crate::types::{EntityStatus, MergedEntityProfile, RankedCandidate, Record};

/// Anything the ranker can score
pub trait RankTarget {
    fn primary_name(&self) -> Option<&str>;
    fn secondary_name(&self) -> Option<&str>;
    fn status(&self) -> Option<EntityStatus>;
}

impl RankTarget for MergedEntityProfile {
    fn primary_name(&self) -> Option<&str> {
        self.fields.name.as_deref()
    }

    fn secondary_name(&self) -> Option<&str> {
        self.fields.legal_name.as_deref()
    }

    fn status(&self) -> Option<EntityStatus> {
        self.fields.status
    }
}

impl RankTarget for Record {
    fn primary_name(&self) -> Option<&str> {
        self.canonical.name.as_deref()
    }

    fn secondary_name(&self) -> Option<&str> {
        self.canonical.legal_name.as_deref()
    }

    fn status(&self) -> Option<EntityStatus> {
        self.canonical.status
    }
}

/// Deterministic additive ranker
#[derive(Debug, Clone)]
pub struct Ranker {
    /// Exact substring match of the query in the primary name
    exact_primary_bonus: f64,
    /// Exact substring match in the secondary/legal name
    exact_secondary_bonus: f64,
    /// Per-token bonus for query/name token intersection
    token_bonus: f64,
    /// Penalty for inactive/deregistered entities
    inactive_penalty: f64,
}

impl Ranker {
    pub fn new() -> Self {
        Self {
            exact_primary_bonus: 40.0,
            exact_secondary_bonus: 15.0,
            token_bonus: 5.0,
            inactive_penalty: 25.0,
        }
    }

    /// Score one candidate against the query
    pub fn score<T: RankTarget>(&self, candidate: &T, query: &str) -> f64 {
        let query_match = matching_name(query);
        let query_tokens = matching_tokens(query);

        let mut score = 0.0;

        if !query_match.is_empty() {
            if let Some(name) = candidate.primary_name() {
                if matching_name(name).contains(&query_match) {
                    score += self.exact_primary_bonus;
                }
            }
            if let Some(legal) = candidate.secondary_name() {
                if matching_name(legal).contains(&query_match) {
                    score += self.exact_secondary_bonus;
                }
            }
        }

        if let Some(name) = candidate.primary_name() {
            let name_tokens = matching_tokens(name);
            let overlap = query_tokens.intersection(&name_tokens).count();
            score += overlap as f64 * self.token_bonus;
        }

        if candidate.status() == Some(EntityStatus::Inactive) {
            score -= self.inactive_penalty;
        }

        score
    }

    /// Rank candidates and truncate to the caller's top-K
    ///
    /// K = 0 returns an empty list; K beyond the candidate count returns
    /// everything. Equal scores keep discovery order (stable sort).
    pub fn rank<T: RankTarget>(
        &self,
        candidates: Vec<T>,
        query: &str,
        top_k: usize,
    ) -> Vec<RankedCandidate<T>> {
        let mut scored: Vec<(T, f64)> = candidates
            .into_iter()
            .map(|candidate| {
                let score = self.score(&candidate, query);
                (candidate, score)
            })
            .collect();

        // Vec::sort_by is stable: ties preserve first-seen order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);

        scored
            .into_iter()
            .enumerate()
            .map(|(position, (candidate, relevance_score))| RankedCandidate {
                candidate,
                relevance_score,
                position,
            })
            .collect()
    }
}

impl Default for Ranker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CanonicalFields, EntityKind, Source};
    use std::collections::BTreeSet;

    fn profile(name: &str, status: Option<EntityStatus>) -> MergedEntityProfile {
        MergedEntityProfile {
            entity_kind: EntityKind::Company,
            fields: CanonicalFields {
                name: Some(name.to_string()),
                status,
                ..Default::default()
            },
            sources: BTreeSet::from([Source::BusinessDirectory]),
            record_count: 1,
            confidence_score: 0.5,
        }
    }

    #[test]
    fn test_acme_candidates_outrank_beta() {
        let ranker = Ranker::new();
        let candidates = vec![
            profile("Acme Ltda", None),
            profile("Acme Corp", None),
            profile("Beta SA", None),
        ];

        let ranked = ranker.rank(candidates, "Acme", 10);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].candidate.fields.name.as_deref(), Some("Acme Ltda"));
        assert_eq!(ranked[1].candidate.fields.name.as_deref(), Some("Acme Corp"));
        assert_eq!(ranked[2].candidate.fields.name.as_deref(), Some("Beta SA"));
        assert!(ranked[0].relevance_score > ranked[2].relevance_score);
        // The two Acme entries tie; discovery order breaks the tie
        assert_eq!(ranked[0].relevance_score, ranked[1].relevance_score);
    }

    #[test]
    fn test_inactive_status_demotes_candidate() {
        let ranker = Ranker::new();
        let candidates = vec![
            profile("Acme Ltda", Some(EntityStatus::Inactive)),
            profile("Acme Corp", Some(EntityStatus::Active)),
        ];

        let ranked = ranker.rank(candidates, "Acme", 10);
        assert_eq!(ranked[0].candidate.fields.name.as_deref(), Some("Acme Corp"));
        assert_eq!(
            ranked[1].candidate.fields.name.as_deref(),
            Some("Acme Ltda")
        );
    }

    #[test]
    fn test_negative_scores_still_sort() {
        let ranker = Ranker::new();
        let candidates = vec![
            profile("Unrelated Ventures", Some(EntityStatus::Inactive)),
            profile("Other Holdings", Some(EntityStatus::Inactive)),
        ];

        let ranked = ranker.rank(candidates, "Acme", 10);
        assert_eq!(ranked.len(), 2, "negative scores are never filtered");
        assert!(ranked.iter().all(|c| c.relevance_score < 0.0));
        // Tie on equal negative scores keeps discovery order
        assert_eq!(
            ranked[0].candidate.fields.name.as_deref(),
            Some("Unrelated Ventures")
        );
    }

    #[test]
    fn test_secondary_name_scores_lower_than_primary() {
        let ranker = Ranker::new();

        let by_primary = profile("Acme", None);
        let mut by_legal = profile("Northern Trading", None);
        by_legal.fields.legal_name = Some("Acme Comercio S.A.".to_string());

        let primary_score = ranker.score(&by_primary, "Acme");
        let legal_score = ranker.score(&by_legal, "Acme");

        assert!(primary_score > legal_score);
        assert!(legal_score > 0.0);
    }

    #[test]
    fn test_top_k_truncation_bounds() {
        let ranker = Ranker::new();
        let candidates = vec![profile("Acme", None), profile("Beta", None)];

        assert!(ranker.rank(candidates.clone(), "Acme", 0).is_empty());

        let all = ranker.rank(candidates, "Acme", 100);
        assert_eq!(all.len(), 2, "K beyond candidate count returns the full list");
    }

    #[test]
    fn test_ranking_is_deterministic() {
        let ranker = Ranker::new();
        let candidates = || {
            vec![
                profile("Acme Ltda", None),
                profile("Acme Corp", Some(EntityStatus::Active)),
                profile("Acme Holding", Some(EntityStatus::Inactive)),
                profile("Beta SA", None),
            ]
        };

        let first = ranker.rank(candidates(), "Acme", 10);
        let second = ranker.rank(candidates(), "Acme", 10);

        let names = |ranked: &[RankedCandidate<MergedEntityProfile>]| {
            ranked
                .iter()
                .map(|c| c.candidate.fields.name.clone().unwrap())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&first), names(&second));
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.relevance_score, b.relevance_score);
            assert_eq!(a.position, b.position);
        }
    }

    #[test]
    fn test_positions_are_sequential() {
        let ranker = Ranker::new();
        let ranked = ranker.rank(
            vec![profile("Acme", None), profile("Beta", None)],
            "Acme",
            10,
        );
        assert_eq!(ranked[0].position, 0);
        assert_eq!(ranked[1].position, 1);
    }
}
