//! Boolean answer synthesis.
//!
//! Questions are matched against a fixed, ordered list of patterns, most
//! specific first. The first pattern whose trigger fires and whose required
//! entities are all present decides the answer. With two or more entities
//! and no pattern, a generic containment check answers at reduced
//! confidence; with fewer, the answer is a fixed low-confidence negative.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cache::HotRelation;
use crate::graph::EntityLabel;
use crate::metrics::get_metrics;
use crate::query::{Classification, QueryArchetype};
use crate::reasoning::chain::{ReasoningChain, ReasoningIssue};
use crate::reasoning::KnowledgeSnapshot;
use crate::resolve::Mention;
use crate::traversal::{MatchKind, PathOutcome, TraversalEngine};

// ============================================================================
// Confidence Rules
// ============================================================================

pub const CONFIDENCE_EXACT: f32 = 0.95;
pub const CONFIDENCE_CONTAINMENT: f32 = 0.90;
pub const CONFIDENCE_SINGLE_NEGATIVE: f32 = 0.90;
pub const CONFIDENCE_SHARED_POSITIVE: f32 = 0.95;
pub const CONFIDENCE_SHARED_NEGATIVE: f32 = 0.85;
pub const CONFIDENCE_FALLBACK_DIRECT: f32 = 0.85;
pub const CONFIDENCE_FALLBACK_SHARED: f32 = 0.80;
pub const CONFIDENCE_FALLBACK_NEGATIVE: f32 = 0.70;
pub const CONFIDENCE_UNRESOLVED: f32 = 0.60;
pub const CONFIDENCE_PATH_NOT_FOUND: f32 = 0.50;
pub const CONFIDENCE_DEGRADED_PARTIAL: f32 = 0.80;

// ============================================================================
// Answer Types
// ============================================================================

/// Boolean decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    True,
    False,
    /// No decision possible; always paired with zero confidence.
    Unknown,
}

impl Verdict {
    fn from_bool(value: bool) -> Self {
        if value {
            Verdict::True
        } else {
            Verdict::False
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Verdict::True => "Yes",
            Verdict::False => "No",
            Verdict::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Answer to a yes/no question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BooleanAnswer {
    pub verdict: Verdict,
    pub confidence: f32,
    pub evidence: Vec<String>,
    pub chain: ReasoningChain,
}

impl BooleanAnswer {
    fn from_chain(verdict: Verdict, confidence: f32, chain: ReasoningChain) -> Self {
        let chain = chain.finish(verdict.display_name(), confidence);
        Self {
            verdict,
            confidence: chain.confidence,
            evidence: chain.evidence.clone(),
            chain,
        }
    }

    pub fn is_true(&self) -> bool {
        self.verdict == Verdict::True
    }
}

// ============================================================================
// Pattern Table
// ============================================================================

static SHARED_ORGANIZATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(share[sd]?\s+(?:an?\s+|the\s+same\s+)?(?:organization|club|team)|same\s+(?:organization|club|team)|teammates?|played\s+together)\b",
    )
    .expect("Invalid regex")
});

static SHARED_PLACE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(same\s+(?:hometown|birthplace|place|province)|share[sd]?\s+(?:an?\s+|the\s+same\s+)?(?:hometown|birthplace))\b",
    )
    .expect("Invalid regex")
});

static HOMETOWN_OF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(hometown|birthplace)\s+of\b").expect("Invalid regex"));

static AFFILIATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(affiliated\s+with|play(?:ed|s)?\s+for|member\s+of|signed\s+for)\b")
        .expect("Invalid regex")
});

static BIRTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(born\s+in|comes?\s+from|hometown|birthplace)\b").expect("Invalid regex")
});

static COACHING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(coach(?:ed|es)?|manag(?:ed|es))\b").expect("Invalid regex")
});

static BASED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(based\s+in|headquartered\s+in|located\s+in)\b").expect("Invalid regex")
});

/// Boolean question patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanPattern {
    /// Two people share an organization and a hometown.
    AffiliationAndBirthplace,
    /// A person is affiliated with an organization based in another
    /// person's hometown.
    AffiliatedInHometownOf,
    SharedAffiliation,
    SharedBirthplace,
    AffiliatedWith,
    BornIn,
    Coached,
    BasedIn,
    /// Any live path between two entities.
    Connected,
}

/// Dispatch order, most specific first.
pub const BOOLEAN_PATTERNS: [BooleanPattern; 9] = [
    BooleanPattern::AffiliationAndBirthplace,
    BooleanPattern::AffiliatedInHometownOf,
    BooleanPattern::SharedAffiliation,
    BooleanPattern::SharedBirthplace,
    BooleanPattern::AffiliatedWith,
    BooleanPattern::BornIn,
    BooleanPattern::Coached,
    BooleanPattern::BasedIn,
    BooleanPattern::Connected,
];

impl BooleanPattern {
    pub fn name(&self) -> &'static str {
        match self {
            BooleanPattern::AffiliationAndBirthplace => "shared organization and hometown",
            BooleanPattern::AffiliatedInHometownOf => "affiliated in hometown of",
            BooleanPattern::SharedAffiliation => "shared organization",
            BooleanPattern::SharedBirthplace => "shared hometown",
            BooleanPattern::AffiliatedWith => "affiliated with",
            BooleanPattern::BornIn => "born in",
            BooleanPattern::Coached => "coached",
            BooleanPattern::BasedIn => "based in",
            BooleanPattern::Connected => "connected",
        }
    }

    /// Whether the question wording selects this pattern.
    pub fn triggered(&self, question: &str, classification: &Classification) -> bool {
        match self {
            BooleanPattern::AffiliationAndBirthplace => {
                SHARED_ORGANIZATION.is_match(question) && SHARED_PLACE.is_match(question)
            }
            BooleanPattern::AffiliatedInHometownOf => {
                HOMETOWN_OF.is_match(question) && AFFILIATION.is_match(question)
            }
            BooleanPattern::SharedAffiliation => SHARED_ORGANIZATION.is_match(question),
            BooleanPattern::SharedBirthplace => SHARED_PLACE.is_match(question),
            BooleanPattern::AffiliatedWith => AFFILIATION.is_match(question),
            BooleanPattern::BornIn => BIRTH.is_match(question),
            BooleanPattern::Coached => COACHING.is_match(question),
            BooleanPattern::BasedIn => BASED.is_match(question),
            BooleanPattern::Connected => classification.archetype == QueryArchetype::PathFinding,
        }
    }

    /// Entity categories the pattern binds, in role order. Empty means any
    /// two entities.
    pub fn required(&self) -> &'static [EntityLabel] {
        use EntityLabel::*;
        match self {
            BooleanPattern::AffiliationAndBirthplace
            | BooleanPattern::AffiliatedInHometownOf
            | BooleanPattern::SharedAffiliation
            | BooleanPattern::SharedBirthplace => &[Person, Person],
            BooleanPattern::AffiliatedWith | BooleanPattern::Coached => &[Person, Organization],
            BooleanPattern::BornIn => &[Person, Place],
            BooleanPattern::BasedIn => &[Organization, Place],
            BooleanPattern::Connected => &[],
        }
    }

    /// Cache kinds the pattern reads.
    pub fn kinds(&self) -> &'static [HotRelation] {
        use HotRelation::*;
        match self {
            BooleanPattern::AffiliationAndBirthplace => &[Affiliation, Birthplace],
            BooleanPattern::AffiliatedInHometownOf => &[Affiliation, Birthplace, Headquarters],
            BooleanPattern::SharedAffiliation | BooleanPattern::AffiliatedWith => &[Affiliation],
            BooleanPattern::SharedBirthplace | BooleanPattern::BornIn => &[Birthplace],
            BooleanPattern::Coached => &[Coaching],
            BooleanPattern::BasedIn => &[Headquarters],
            BooleanPattern::Connected => &[],
        }
    }

    /// Bind mentions to the pattern's roles, taking mentions in question
    /// order. Returns `None` when a required entity is missing.
    pub fn bind<'m>(&self, mentions: &'m [Mention]) -> Option<Vec<&'m Mention>> {
        let ordered = in_question_order(mentions);
        let required = self.required();
        if required.is_empty() {
            return (ordered.len() >= 2).then(|| ordered[..2].to_vec());
        }

        let mut bound: Vec<&Mention> = Vec::with_capacity(required.len());
        for label in required {
            let next = ordered
                .iter()
                .find(|m| m.label == *label && !bound.iter().any(|b| std::ptr::eq(*b, **m)))
                .copied()?;
            bound.push(next);
        }
        Some(bound)
    }
}

fn in_question_order(mentions: &[Mention]) -> Vec<&Mention> {
    let mut ordered: Vec<&Mention> = mentions.iter().collect();
    ordered.sort_by_key(|m| m.tokens.start);
    ordered
}

// ============================================================================
// Synthesizer
// ============================================================================

/// Decides boolean questions against one snapshot.
pub struct BooleanSynthesizer<'a> {
    traversal: &'a TraversalEngine,
    snapshot: &'a KnowledgeSnapshot,
}

impl<'a> BooleanSynthesizer<'a> {
    pub fn new(traversal: &'a TraversalEngine, snapshot: &'a KnowledgeSnapshot) -> Self {
        Self {
            traversal,
            snapshot,
        }
    }

    /// Pick the first applicable pattern and answer with it.
    pub async fn answer(
        &self,
        mentions: &[Mention],
        classification: &Classification,
        mut chain: ReasoningChain,
    ) -> BooleanAnswer {
        if mentions.len() < 2 {
            get_metrics().unresolved_entities_total.inc();
            chain.record(ReasoningIssue::UnresolvedEntity {
                needed: 2,
                found: mentions.len(),
            });
            chain.add_step(
                format!(
                    "Resolved {} of 2 entities needed; no traversal attempted",
                    mentions.len()
                ),
                Vec::new(),
            );
            return BooleanAnswer::from_chain(Verdict::False, CONFIDENCE_UNRESOLVED, chain);
        }

        let question = chain.question.clone();
        for pattern in BOOLEAN_PATTERNS {
            if !pattern.triggered(&question, classification) {
                continue;
            }
            if !pattern
                .kinds()
                .iter()
                .all(|kind| self.snapshot.cache.is_warmed(*kind))
            {
                tracing::debug!("Pattern '{}' skipped, relation not cached", pattern.name());
                continue;
            }
            let Some(bound) = pattern.bind(mentions) else {
                continue;
            };
            tracing::debug!("Boolean pattern '{}' selected", pattern.name());
            let (verdict, confidence) = self.evaluate(pattern, &bound, &mut chain).await;
            return BooleanAnswer::from_chain(verdict, confidence, chain);
        }

        let (verdict, confidence) = self.fallback(mentions, &mut chain);
        BooleanAnswer::from_chain(verdict, confidence, chain)
    }

    async fn evaluate(
        &self,
        pattern: BooleanPattern,
        bound: &[&Mention],
        chain: &mut ReasoningChain,
    ) -> (Verdict, f32) {
        let a = bound[0].canonical_name.as_str();
        let b = bound[1].canonical_name.as_str();
        let traversal = self.traversal;
        let snapshot = self.snapshot;

        match pattern {
            BooleanPattern::AffiliationAndBirthplace => {
                let organizations =
                    traversal.shared_neighbors(snapshot, a, b, HotRelation::Affiliation);
                let places = traversal.shared_neighbors(snapshot, a, b, HotRelation::Birthplace);
                let holds = !organizations.is_empty() && !places.is_empty();
                chain.add_step(
                    format!(
                        "Shared organizations of {a} and {b}: {}",
                        join_or_none(&organizations.shared)
                    ),
                    organizations.evidence,
                );
                chain.add_step(
                    format!(
                        "Shared hometowns of {a} and {b}: {}",
                        join_or_none(&places.shared)
                    ),
                    places.evidence,
                );
                shared_verdict(holds)
            }
            BooleanPattern::AffiliatedInHometownOf => {
                let (hits, evidence) = traversal.affiliated_in_hometown_of(snapshot, a, b);
                let found: Vec<String> = hits.iter().map(|(org, _)| org.clone()).collect();
                chain.add_step(
                    format!(
                        "Organizations of {a} based in the hometown of {b}: {}",
                        join_or_none(&found)
                    ),
                    evidence,
                );
                shared_verdict(!hits.is_empty())
            }
            BooleanPattern::SharedAffiliation | BooleanPattern::SharedBirthplace => {
                let kind = pattern.kinds()[0];
                let shared = traversal.shared_neighbors(snapshot, a, b, kind);
                let holds = !shared.is_empty();
                chain.add_step(
                    format!(
                        "Shared {kind} neighbors of {a} and {b}: {}",
                        join_or_none(&shared.shared)
                    ),
                    shared.evidence,
                );
                shared_verdict(holds)
            }
            BooleanPattern::AffiliatedWith
            | BooleanPattern::BornIn
            | BooleanPattern::Coached
            | BooleanPattern::BasedIn => {
                let kind = pattern.kinds()[0];
                let check = traversal.check_relation(snapshot, a, b, kind);
                let description = match &check.matched {
                    Some(matched) => format!("Cached {kind} of {a} includes {matched}"),
                    None if check.known => format!("Cached {kind} of {a} does not include {b}"),
                    None => format!("No cached {kind} rows for {a}"),
                };
                chain.add_step(description, check.evidence.clone());
                match check.kind {
                    Some(MatchKind::Exact) => (Verdict::True, CONFIDENCE_EXACT),
                    Some(MatchKind::Containment) => (Verdict::True, CONFIDENCE_CONTAINMENT),
                    None => (Verdict::False, CONFIDENCE_SINGLE_NEGATIVE),
                }
            }
            BooleanPattern::Connected => self.connected(a, b, chain).await,
        }
    }

    async fn connected(&self, a: &str, b: &str, chain: &mut ReasoningChain) -> (Verdict, f32) {
        match self.traversal.find_path(a, b).await {
            PathOutcome::Found(path) => {
                chain.add_step(
                    format!("Found a {}-hop path from {a} to {b}", path.len()),
                    path.evidence(),
                );
                (Verdict::True, CONFIDENCE_EXACT)
            }
            PathOutcome::NotFound => {
                chain.add_step(format!("No path from {a} to {b} within depth limit"), Vec::new());
                (Verdict::False, CONFIDENCE_PATH_NOT_FOUND)
            }
            PathOutcome::Unavailable(e) => {
                get_metrics().degraded_answers_total.inc();
                chain.record(ReasoningIssue::StoreUnavailable {
                    detail: e.to_string(),
                });
                for kind in self.snapshot.cache.kinds() {
                    let shared = self.traversal.shared_neighbors(self.snapshot, a, b, kind);
                    if !shared.is_empty() {
                        chain.add_step(
                            format!(
                                "Live path query failed; cached {kind} links {a} and {b} through {}",
                                join_or_none(&shared.shared)
                            ),
                            shared.evidence,
                        );
                        return (Verdict::True, CONFIDENCE_DEGRADED_PARTIAL);
                    }
                }
                chain.add_step(
                    format!("Live path query failed and no cached link between {a} and {b}"),
                    Vec::new(),
                );
                (Verdict::Unknown, 0.0)
            }
        }
    }

    /// Generic containment check over every cached kind.
    fn fallback(&self, mentions: &[Mention], chain: &mut ReasoningChain) -> (Verdict, f32) {
        chain.record(ReasoningIssue::NoPatternMatched);
        let ordered = in_question_order(mentions);
        let a = ordered[0].canonical_name.as_str();
        let b = ordered[1].canonical_name.as_str();
        let kinds = self.snapshot.cache.kinds();

        for kind in &kinds {
            let check = self.traversal.check_relation(self.snapshot, a, b, *kind);
            if let Some(matched) = &check.matched {
                chain.add_step(
                    format!("No pattern matched; cached {kind} of {a} includes {matched}"),
                    check.evidence.clone(),
                );
                return (Verdict::True, CONFIDENCE_FALLBACK_DIRECT);
            }
        }

        for kind in &kinds {
            let shared = self.traversal.shared_neighbors(self.snapshot, a, b, *kind);
            if !shared.is_empty() {
                chain.add_step(
                    format!(
                        "No pattern matched; {a} and {b} share {kind} neighbors: {}",
                        join_or_none(&shared.shared)
                    ),
                    shared.evidence,
                );
                return (Verdict::True, CONFIDENCE_FALLBACK_SHARED);
            }
        }

        chain.add_step(
            format!("No pattern matched; no cached relation between {a} and {b}"),
            Vec::new(),
        );
        (Verdict::False, CONFIDENCE_FALLBACK_NEGATIVE)
    }
}

fn shared_verdict(holds: bool) -> (Verdict, f32) {
    let confidence = if holds {
        CONFIDENCE_SHARED_POSITIVE
    } else {
        CONFIDENCE_SHARED_NEGATIVE
    };
    (Verdict::from_bool(holds), confidence)
}

fn join_or_none<'s>(names: impl IntoIterator<Item = &'s String>) -> String {
    let joined: Vec<&str> = names.into_iter().map(String::as_str).collect();
    if joined.is_empty() {
        "none".to_string()
    } else {
        joined.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::MatchMethod;

    fn mention(name: &str, label: EntityLabel, start: usize) -> Mention {
        Mention {
            canonical_name: name.to_string(),
            label,
            surface: name.to_string(),
            tokens: start..start + 1,
            method: MatchMethod::Exact,
            ambiguous: false,
        }
    }

    fn classification(archetype: QueryArchetype) -> Classification {
        Classification {
            archetype,
            matched_keywords: Vec::new(),
            score: 0,
            relation_types: Vec::new(),
        }
    }

    #[test]
    fn test_triggers_follow_wording() {
        let c = classification(QueryArchetype::OneHop);
        let q = "Did Person1 and Person2 play for the same club and share the same hometown?";
        assert!(BooleanPattern::AffiliationAndBirthplace.triggered(q, &c));
        assert!(BooleanPattern::SharedAffiliation.triggered("Were they teammates?", &c));
        assert!(!BooleanPattern::SharedAffiliation.triggered("Person1 played for OrgA", &c));
        assert!(BooleanPattern::AffiliatedWith.triggered("Person1 played for OrgA", &c));
        assert!(BooleanPattern::AffiliatedInHometownOf
            .triggered("Did Person1 play for a club in the hometown of Person2?", &c));
        assert!(!BooleanPattern::Connected.triggered("connected", &c));
        assert!(BooleanPattern::Connected
            .triggered("connected", &classification(QueryArchetype::PathFinding)));
    }

    #[test]
    fn test_bind_uses_question_order_and_labels() {
        // extraction returns longest first; binding reorders by position
        let mentions = vec![
            mention("OrgA", EntityLabel::Organization, 4),
            mention("Person2", EntityLabel::Person, 2),
            mention("Person1", EntityLabel::Person, 0),
        ];
        let bound = BooleanPattern::SharedAffiliation.bind(&mentions).unwrap();
        assert_eq!(bound[0].canonical_name, "Person1");
        assert_eq!(bound[1].canonical_name, "Person2");

        let bound = BooleanPattern::AffiliatedWith.bind(&mentions).unwrap();
        assert_eq!(bound[1].canonical_name, "OrgA");

        assert!(BooleanPattern::BornIn.bind(&mentions).is_none());

        let bound = BooleanPattern::Connected.bind(&mentions).unwrap();
        assert_eq!(bound.len(), 2);
        assert_eq!(bound[0].canonical_name, "Person1");
    }

    #[test]
    fn test_pattern_order_is_most_specific_first() {
        assert_eq!(BOOLEAN_PATTERNS[0], BooleanPattern::AffiliationAndBirthplace);
        assert_eq!(BOOLEAN_PATTERNS[8], BooleanPattern::Connected);
        let shared = BOOLEAN_PATTERNS
            .iter()
            .position(|p| *p == BooleanPattern::SharedAffiliation);
        let single = BOOLEAN_PATTERNS
            .iter()
            .position(|p| *p == BooleanPattern::AffiliatedWith);
        assert!(shared < single);
    }

    #[test]
    fn test_confidence_monotonicity_constants() {
        assert!(CONFIDENCE_EXACT >= CONFIDENCE_FALLBACK_DIRECT);
        assert!(CONFIDENCE_CONTAINMENT >= CONFIDENCE_FALLBACK_DIRECT);
        assert!(CONFIDENCE_UNRESOLVED <= 0.6);
        assert!((0.70..=0.90).contains(&CONFIDENCE_FALLBACK_NEGATIVE));
    }
}
