//! Types for question classification.

use serde::{Deserialize, Serialize};

use crate::cache::HotRelation;
use crate::graph::RelationType;

/// Coarse question category selecting the traversal strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryArchetype {
    EntityLookup,
    OneHop,
    TwoHop,
    ThreeHop,
    PathFinding,
    Aggregation,
}

impl QueryArchetype {
    /// Archetype implied by an additive hop score.
    pub fn from_hop_score(score: u32) -> Self {
        match score {
            0 => QueryArchetype::EntityLookup,
            1 => QueryArchetype::OneHop,
            2 => QueryArchetype::TwoHop,
            _ => QueryArchetype::ThreeHop,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            QueryArchetype::EntityLookup => "entity lookup",
            QueryArchetype::OneHop => "one hop",
            QueryArchetype::TwoHop => "two hop",
            QueryArchetype::ThreeHop => "three hop",
            QueryArchetype::PathFinding => "path finding",
            QueryArchetype::Aggregation => "aggregation",
        }
    }
}

impl std::fmt::Display for QueryArchetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Result of classifying a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub archetype: QueryArchetype,
    /// Keywords and indicators that contributed, in table order.
    pub matched_keywords: Vec<String>,
    /// Additive hop score (0 for path-finding and aggregation overrides).
    pub score: u32,
    /// Candidate relation types named by the question.
    pub relation_types: Vec<RelationType>,
}

impl Classification {
    /// Hot relation kinds that can answer the candidate relation types,
    /// deduplicated in first-seen order.
    pub fn hot_kinds(&self) -> Vec<HotRelation> {
        let mut kinds = Vec::new();
        for kind in self
            .relation_types
            .iter()
            .filter_map(|rt| HotRelation::for_relation_type(*rt))
        {
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }
        kinds
    }
}

/// Score breakdown produced by the hop-score rule.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HopScore {
    pub score: u32,
    pub matched_keywords: Vec<String>,
    pub relation_types: Vec<RelationType>,
}
