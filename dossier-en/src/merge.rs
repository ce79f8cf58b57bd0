//! Deduplicator/merger
//!
//! Identifies records that describe the same real-world entity across
//! sources and merges them into MergedEntityProfiles. Pure and synchronous:
//! clustering never raises, unmatched records become singleton clusters.
//!
//! Candidate clusters are formed by a three-tier matching key, tried in
//! order of strictness:
//! 1. exact canonical identifier match (tax id digits, URL host)
//! 2. case-insensitive exact name match
//! 3. fuzzy match: token-set overlap or high name similarity
//!
//! A fuzzy or name cluster whose members carry conflicting strong
//! identifiers is split rather than force-merged (precision over recall on
//! identity).

use crate::normalize::{matching_name, matching_tokens};
use crate::types::{CanonicalFields, MergedEntityProfile, Record};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// Deduplicating merger
#[derive(Debug, Clone)]
pub struct Merger {
    /// Minimum token-set Jaccard overlap for a fuzzy match
    fuzzy_overlap_threshold: f64,
    /// Minimum Jaro-Winkler similarity on matching-form names
    fuzzy_name_threshold: f64,
    /// Confidence ceiling for single-source profiles
    singleton_ceiling: f64,
    /// Scale applied when ≥2 independent sources agree on the identifier
    diversity_bonus: f64,
}

impl Merger {
    pub fn new() -> Self {
        Self {
            fuzzy_overlap_threshold: 0.6,
            fuzzy_name_threshold: 0.92,
            singleton_ceiling: 0.75,
            diversity_bonus: 1.15,
        }
    }

    /// Merge records into deduplicated entity profiles
    ///
    /// Output order follows first-seen order of each cluster's earliest
    /// record, so repeated calls over the same input are deterministic.
    pub fn merge(&self, records: &[Record]) -> Vec<MergedEntityProfile> {
        let mut clusters: Vec<Cluster> = Vec::new();

        for (index, record) in records.iter().enumerate() {
            let key = ClusterKey::of(record);

            let target = clusters
                .iter_mut()
                .find(|cluster| cluster.accepts(&key, self));

            match target {
                Some(cluster) => cluster.push(index, key),
                None => clusters.push(Cluster::seeded(index, key)),
            }
        }

        if clusters.len() < records.len() {
            tracing::debug!(
                records = records.len(),
                clusters = clusters.len(),
                "Clustered records for merge"
            );
        }

        clusters
            .into_iter()
            .map(|cluster| self.merge_cluster(records, &cluster))
            .collect()
    }

    fn merge_cluster(&self, records: &[Record], cluster: &Cluster) -> MergedEntityProfile {
        let members: Vec<&Record> = cluster.indices.iter().map(|&i| &records[i]).collect();

        // Each canonical field resolves independently: highest trust wins,
        // trust ties break toward the most recently fetched value, and a
        // value present anywhere beats absence everywhere.
        let fields = CanonicalFields {
            name: resolve(&members, |c| c.name.clone()),
            legal_name: resolve(&members, |c| c.legal_name.clone()),
            identifier: resolve(&members, |c| c.identifier.clone()),
            url: resolve(&members, |c| c.url.clone()),
            description: resolve(&members, |c| c.description.clone()),
            location: resolve(&members, |c| c.location.clone()),
            status: resolve(&members, |c| c.status),
            date: resolve(&members, |c| c.date),
        };

        let sources: BTreeSet<_> = members.iter().map(|r| r.source).collect();
        let confidence_score = self.confidence(&fields, &members, sources.len());

        MergedEntityProfile {
            entity_kind: members[0].entity_kind,
            fields,
            sources,
            record_count: members.len(),
            confidence_score,
        }
    }

    fn confidence(
        &self,
        fields: &CanonicalFields,
        members: &[&Record],
        distinct_sources: usize,
    ) -> f64 {
        let base = fields.populated_high_value() as f64
            / CanonicalFields::HIGH_VALUE_FIELD_COUNT as f64;

        if distinct_sources < 2 {
            // Single-source profiles stay below the multi-source ceiling
            return base.min(self.singleton_ceiling);
        }

        let id_agreement = fields.identifier.as_deref().map(|merged_id| {
            members
                .iter()
                .filter(|r| r.canonical.identifier.as_deref() == Some(merged_id))
                .map(|r| r.source)
                .collect::<BTreeSet<_>>()
                .len()
        });

        if id_agreement.unwrap_or(0) >= 2 {
            (base * self.diversity_bonus).min(1.0)
        } else {
            base
        }
    }

    fn fuzzy_match(&self, a: &ClusterKey, b: &ClusterKey) -> bool {
        let (Some(name_a), Some(name_b)) = (&a.match_name, &b.match_name) else {
            return false;
        };

        if jaccard(&a.tokens, &b.tokens) >= self.fuzzy_overlap_threshold {
            return true;
        }

        strsim::jaro_winkler(name_a, name_b) >= self.fuzzy_name_threshold
    }
}

impl Default for Merger {
    fn default() -> Self {
        Self::new()
    }
}

/// Matching key extracted from one record
struct ClusterKey {
    /// Strong canonical identifier (tax id digits, URL host); synthesized
    /// name keys are excluded here so they cannot veto a fuzzy merge
    strong_id: Option<String>,
    /// Any canonical identifier, including synthesized keys
    identifier: Option<String>,
    match_name: Option<String>,
    tokens: BTreeSet<String>,
}

impl ClusterKey {
    fn of(record: &Record) -> Self {
        let identifier = record.canonical.identifier.clone();
        let strong_id = identifier
            .as_deref()
            .filter(|id| !is_synthetic_key(id))
            .map(|id| id.to_string());
        let match_name = record.canonical.name.as_deref().map(matching_name);
        let tokens = record
            .canonical
            .name
            .as_deref()
            .map(matching_tokens)
            .unwrap_or_default();

        Self {
            strong_id,
            identifier,
            match_name,
            tokens,
        }
    }
}

struct Cluster {
    indices: Vec<usize>,
    strong_ids: BTreeSet<String>,
    identifiers: BTreeSet<String>,
    match_names: BTreeSet<String>,
    token_sets: Vec<BTreeSet<String>>,
}

impl Cluster {
    fn seeded(index: usize, key: ClusterKey) -> Self {
        let mut cluster = Self {
            indices: Vec::new(),
            strong_ids: BTreeSet::new(),
            identifiers: BTreeSet::new(),
            match_names: BTreeSet::new(),
            token_sets: Vec::new(),
        };
        cluster.push(index, key);
        cluster
    }

    fn push(&mut self, index: usize, key: ClusterKey) {
        self.indices.push(index);
        if let Some(id) = key.strong_id {
            self.strong_ids.insert(id);
        }
        if let Some(id) = key.identifier {
            self.identifiers.insert(id);
        }
        if let Some(name) = key.match_name {
            self.match_names.insert(name);
        }
        if !key.tokens.is_empty() {
            self.token_sets.push(key.tokens);
        }
    }

    fn accepts(&self, key: &ClusterKey, merger: &Merger) -> bool {
        // Tier 1: exact canonical identifier
        if let Some(id) = &key.identifier {
            if self.identifiers.contains(id) {
                return true;
            }
        }

        // Conflicting strong identifiers never merge, whatever the names say
        if let Some(strong) = &key.strong_id {
            if !self.strong_ids.is_empty() && !self.strong_ids.contains(strong) {
                tracing::debug!(
                    identifier = %strong,
                    "Identifier conflict under name match; keeping records separate"
                );
                return false;
            }
        }

        // Tier 2: case-insensitive exact name
        if let Some(name) = &key.match_name {
            if self.match_names.contains(name) {
                return true;
            }
        }

        // Tier 3: fuzzy token-set overlap
        self.token_sets.iter().any(|tokens| {
            let candidate = ClusterKey {
                strong_id: None,
                identifier: None,
                match_name: Some(tokens.iter().cloned().collect::<Vec<_>>().join(" ")),
                tokens: tokens.clone(),
            };
            merger.fuzzy_match(key, &candidate)
        })
    }
}

/// Synthesized name keys are "x" + 16 hex chars (see the normalizer)
fn is_synthetic_key(id: &str) -> bool {
    id.len() == 17
        && id.starts_with('x')
        && id[1..].chars().all(|c| c.is_ascii_hexdigit())
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Resolve one canonical field across cluster members: highest trust wins,
/// trust ties break toward the most recent fetch, first-seen wins exact ties
fn resolve<T, F>(members: &[&Record], accessor: F) -> Option<T>
where
    F: Fn(&CanonicalFields) -> Option<T>,
{
    let mut winner: Option<(T, u8, DateTime<Utc>)> = None;

    for record in members {
        if let Some(value) = accessor(&record.canonical) {
            let better = match &winner {
                None => true,
                Some((_, trust, fetched_at)) => {
                    record.trust > *trust
                        || (record.trust == *trust && record.fetched_at > *fetched_at)
                }
            };
            if better {
                winner = Some((value, record.trust, record.fetched_at));
            }
        }
    }

    winner.map(|(value, _, _)| value)
}
