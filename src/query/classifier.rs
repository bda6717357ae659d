//! Query archetype classifier.
//!
//! A bounded keyword heuristic over templated phrasings, not a parser.
//! Connection questions become path-finding, counting questions become
//! aggregation, and everything else is scored: each compound indicator and
//! each keyword-table hit adds one hop.
//!
//! Known limitation: scoring is additive, so a sentence using two keywords
//! for what is really a single hop is over-counted.

use std::sync::LazyLock;

use regex::Regex;

use super::types::*;
use crate::graph::RelationType;
use crate::resolve::variants::{contains_word_bounded, normalize};

// ============================================================================
// Rule Tables
// ============================================================================

/// Lexical cue that the question chains more than one relation.
#[derive(Debug, Clone, Copy)]
pub struct HopIndicator {
    pub name: &'static str,
    /// Every phrase must appear for the indicator to fire.
    pub all_of: &'static [&'static str],
}

/// Keywords naming one relation.
#[derive(Debug, Clone, Copy)]
pub struct RelationKeyword {
    pub keywords: &'static [&'static str],
    pub relation_types: &'static [RelationType],
}

pub const HOP_INDICATORS: &[HopIndicator] = &[
    HopIndicator {
        name: "teammate chain",
        all_of: &["teammate", "affiliated"],
    },
    HopIndicator {
        name: "coach chain",
        all_of: &["coach", "team"],
    },
    HopIndicator {
        name: "hometown chain",
        all_of: &["hometown of"],
    },
    HopIndicator {
        name: "birthplace chain",
        all_of: &["born", "based"],
    },
    HopIndicator {
        name: "paired check",
        all_of: &["both", "and"],
    },
];

pub const RELATION_KEYWORDS: &[RelationKeyword] = &[
    RelationKeyword {
        keywords: &[
            "affiliated with",
            "played for",
            "plays for",
            "play for",
            "member of",
            "signed for",
        ],
        relation_types: &[RelationType::AffiliatedWith],
    },
    RelationKeyword {
        keywords: &["national team", "represented"],
        relation_types: &[RelationType::RepresentedNation, RelationType::NationalTeammateOf],
    },
    RelationKeyword {
        keywords: &["teammate", "teammates", "played together"],
        relation_types: &[RelationType::TeammateOf],
    },
    RelationKeyword {
        keywords: &["coached", "coach of", "manager of"],
        relation_types: &[RelationType::Coached, RelationType::CoachedNational],
    },
    RelationKeyword {
        keywords: &["born in", "birthplace"],
        relation_types: &[RelationType::BornIn],
    },
    RelationKeyword {
        keywords: &["hometown", "comes from", "come from"],
        relation_types: &[RelationType::FromPlace],
    },
    RelationKeyword {
        keywords: &["based in", "headquartered"],
        relation_types: &[RelationType::BasedIn],
    },
    RelationKeyword {
        keywords: &["home venue", "home stadium", "stadium"],
        relation_types: &[RelationType::HomeVenue],
    },
    RelationKeyword {
        keywords: &["league", "competition", "competed in", "competes in"],
        relation_types: &[RelationType::CompetedIn, RelationType::CompetesIn],
    },
    RelationKeyword {
        keywords: &["position", "role"],
        relation_types: &[RelationType::HasRole],
    },
    RelationKeyword {
        keywords: &[
            "share an organization",
            "shared an organization",
            "same organization",
            "same club",
        ],
        relation_types: &[RelationType::SharedAffiliation],
    },
    RelationKeyword {
        keywords: &["same hometown", "same place", "same province", "same birthplace"],
        relation_types: &[RelationType::SamePlace],
    },
];

// ============================================================================
// Regex Patterns (using LazyLock for static initialization)
// ============================================================================

static PATH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(relationship\s+between|connection\s+between|connected|linked|related\s+to|path\s+(?:from|between))\b",
    )
    .expect("Invalid regex")
});

static AGGREGATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(how\s+many|number\s+of|count|total)\b").expect("Invalid regex")
});

// ============================================================================
// Query Classifier
// ============================================================================

/// Maps question text to a query archetype and candidate relation types.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryClassifier;

impl QueryClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a question given how many entities resolved in it.
    ///
    /// Path-finding needs two endpoints, so connection keywords with fewer
    /// than two entities fall through to scoring.
    pub fn classify(&self, question: &str, entity_count: usize) -> Classification {
        let scored = hop_score(question);

        if entity_count >= 2 {
            if let Some(m) = PATH_PATTERN.find(question) {
                return Classification {
                    archetype: QueryArchetype::PathFinding,
                    matched_keywords: vec![m.as_str().to_lowercase()],
                    score: 0,
                    relation_types: scored.relation_types,
                };
            }
        }

        if let Some(m) = AGGREGATION_PATTERN.find(question) {
            return Classification {
                archetype: QueryArchetype::Aggregation,
                matched_keywords: vec![m.as_str().to_lowercase()],
                score: 0,
                relation_types: scored.relation_types,
            };
        }

        Classification {
            archetype: QueryArchetype::from_hop_score(scored.score),
            matched_keywords: scored.matched_keywords,
            score: scored.score,
            relation_types: scored.relation_types,
        }
    }
}

/// Additive hop score: one point per compound indicator and per keyword
/// table entry present in the question.
pub fn hop_score(question: &str) -> HopScore {
    let text = normalize(question);
    let mut result = HopScore::default();

    for indicator in HOP_INDICATORS {
        if indicator
            .all_of
            .iter()
            .all(|phrase| contains_word_bounded(&text, phrase))
        {
            result.score += 1;
            result.matched_keywords.push(indicator.name.to_string());
        }
    }

    for entry in RELATION_KEYWORDS {
        if let Some(keyword) = entry
            .keywords
            .iter()
            .find(|k| contains_word_bounded(&text, k))
        {
            result.score += 1;
            result.matched_keywords.push(keyword.to_string());
            for rt in entry.relation_types {
                if !result.relation_types.contains(rt) {
                    result.relation_types.push(*rt);
                }
            }
        }
    }

    result
}
