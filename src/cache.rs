//! Relationship cache.
//!
//! At startup every hot relation kind is materialized by one full scan of the
//! graph store into forward (source -> targets) and reverse (target ->
//! sources) maps keyed by canonical name. The cache is never mutated after
//! [`RelationshipCache::build`]; picking up graph changes means building a new
//! one.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::{EdgeRow, EntityLabel, GraphStore, RelationType};

// ============================================================================
// Hot Relations
// ============================================================================

/// Relation kinds hot enough to be pre-materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HotRelation {
    /// Person -> organization.
    Affiliation,
    /// Person -> place of birth or hometown.
    Birthplace,
    /// Person (coach) -> organization.
    Coaching,
    /// Organization -> place it is based in.
    Headquarters,
}

impl HotRelation {
    pub const ALL: [HotRelation; 4] = [
        HotRelation::Affiliation,
        HotRelation::Birthplace,
        HotRelation::Coaching,
        HotRelation::Headquarters,
    ];

    /// Graph relation types folded into this kind.
    pub fn relation_types(&self) -> &'static [RelationType] {
        match self {
            HotRelation::Affiliation => &[RelationType::AffiliatedWith],
            HotRelation::Birthplace => &[RelationType::BornIn, RelationType::FromPlace],
            HotRelation::Coaching => &[RelationType::Coached],
            HotRelation::Headquarters => &[RelationType::BasedIn],
        }
    }

    /// Relation type used for rows whose stored type is unknown.
    pub fn evidence_type(&self) -> RelationType {
        self.relation_types()[0]
    }

    pub fn source_label(&self) -> EntityLabel {
        match self {
            HotRelation::Headquarters => EntityLabel::Organization,
            _ => EntityLabel::Person,
        }
    }

    pub fn target_label(&self) -> EntityLabel {
        match self {
            HotRelation::Affiliation | HotRelation::Coaching => EntityLabel::Organization,
            HotRelation::Birthplace | HotRelation::Headquarters => EntityLabel::Place,
        }
    }

    /// The hot kind answering questions about a relation type, if any.
    ///
    /// Derived relations (teammates, shared hometowns) map onto the kind
    /// whose shared neighbor they describe.
    pub fn for_relation_type(relation_type: RelationType) -> Option<HotRelation> {
        match relation_type {
            RelationType::AffiliatedWith
            | RelationType::TeammateOf
            | RelationType::SharedAffiliation => Some(HotRelation::Affiliation),
            RelationType::BornIn | RelationType::FromPlace | RelationType::SamePlace => {
                Some(HotRelation::Birthplace)
            }
            RelationType::Coached => Some(HotRelation::Coaching),
            RelationType::BasedIn => Some(HotRelation::Headquarters),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            HotRelation::Affiliation => "affiliation",
            HotRelation::Birthplace => "birthplace",
            HotRelation::Coaching => "coaching",
            HotRelation::Headquarters => "headquarters",
        }
    }
}

impl std::fmt::Display for HotRelation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Relation Maps
// ============================================================================

/// Forward and reverse adjacency for one hot relation kind.
///
/// Each (source, target) pair remembers the relation type of the first row
/// that produced it, so evidence reads like the stored fact.
#[derive(Debug, Clone, Default)]
pub struct RelationMap {
    forward: HashMap<String, BTreeSet<String>>,
    reverse: HashMap<String, BTreeSet<String>>,
    types: HashMap<(String, String), RelationType>,
}

impl RelationMap {
    fn insert(&mut self, row: EdgeRow, relation_type: RelationType) {
        self.types
            .entry((row.source.clone(), row.target.clone()))
            .or_insert(relation_type);
        self.reverse
            .entry(row.target.clone())
            .or_default()
            .insert(row.source.clone());
        self.forward.entry(row.source).or_default().insert(row.target);
    }

    /// Targets reachable from `source`.
    pub fn targets(&self, source: &str) -> Option<&BTreeSet<String>> {
        self.forward.get(source)
    }

    /// Sources pointing at `target`.
    pub fn sources(&self, target: &str) -> Option<&BTreeSet<String>> {
        self.reverse.get(target)
    }

    /// Stored relation type of the `source` -> `target` row.
    pub fn relation_type(&self, source: &str, target: &str) -> Option<RelationType> {
        self.types
            .get(&(source.to_string(), target.to_string()))
            .copied()
    }

    pub fn edge_count(&self) -> usize {
        self.forward.values().map(BTreeSet::len).sum()
    }
}

// ============================================================================
// Relationship Cache
// ============================================================================

/// Immutable projection of the hot 1-hop relations.
#[derive(Debug, Clone)]
pub struct RelationshipCache {
    maps: HashMap<HotRelation, RelationMap>,
    built_at: DateTime<Utc>,
}

impl RelationshipCache {
    /// Warm the cache with one full scan per relation type of each kind.
    pub async fn build(store: &dyn GraphStore, kinds: &[HotRelation]) -> Result<Self> {
        let mut maps = HashMap::new();
        for kind in kinds {
            let mut map = RelationMap::default();
            for relation_type in kind.relation_types() {
                let rows = store
                    .scan_edges(*relation_type, kind.source_label(), kind.target_label())
                    .await?;
                tracing::debug!(
                    "Scanned {} {} rows for {} cache",
                    rows.len(),
                    relation_type,
                    kind
                );
                for row in rows {
                    map.insert(row, *relation_type);
                }
            }
            tracing::info!(
                "Cached {} {} edges from {} sources",
                map.edge_count(),
                kind,
                map.forward.len()
            );
            maps.insert(*kind, map);
        }

        Ok(Self {
            maps,
            built_at: Utc::now(),
        })
    }

    /// Build a cache directly from rows, bypassing the store. Rows are typed
    /// with their kind's [`evidence_type`](HotRelation::evidence_type).
    pub fn from_rows(rows: impl IntoIterator<Item = (HotRelation, EdgeRow)>) -> Self {
        let mut maps: HashMap<HotRelation, RelationMap> = HashMap::new();
        for (kind, row) in rows {
            maps.entry(kind).or_default().insert(row, kind.evidence_type());
        }
        Self {
            maps,
            built_at: Utc::now(),
        }
    }

    /// The map for a kind, if it was warmed.
    pub fn relation(&self, kind: HotRelation) -> Option<&RelationMap> {
        self.maps.get(&kind)
    }

    /// Targets of `source` for a kind.
    pub fn targets(&self, kind: HotRelation, source: &str) -> Option<&BTreeSet<String>> {
        self.relation(kind).and_then(|map| map.targets(source))
    }

    /// Sources of `target` for a kind.
    pub fn sources(&self, kind: HotRelation, target: &str) -> Option<&BTreeSet<String>> {
        self.relation(kind).and_then(|map| map.sources(target))
    }

    /// Stored relation type of a cached row.
    pub fn relation_type(
        &self,
        kind: HotRelation,
        source: &str,
        target: &str,
    ) -> Option<RelationType> {
        self.relation(kind)
            .and_then(|map| map.relation_type(source, target))
    }

    pub fn is_warmed(&self, kind: HotRelation) -> bool {
        self.maps.contains_key(&kind)
    }

    /// Warmed kinds in fixed order.
    pub fn kinds(&self) -> Vec<HotRelation> {
        HotRelation::ALL
            .into_iter()
            .filter(|kind| self.is_warmed(*kind))
            .collect()
    }

    pub fn edge_count(&self) -> usize {
        self.maps.values().map(RelationMap::edge_count).sum()
    }

    /// When the cache was built. Graph changes after this are not visible.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}
