//! Multiple-choice answer synthesis.
//!
//! The primary entity's cached targets for the inferred relation kinds form
//! the candidate set. Each choice scores 1.0 when it matches a candidate
//! exactly, by containment, or through the resolver; otherwise it scores half
//! its best token overlap. The highest score wins, earliest choice on ties.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::cache::HotRelation;
use crate::graph::RelationType;
use crate::metrics::get_metrics;
use crate::query::Classification;
use crate::reasoning::chain::{ReasoningChain, ReasoningIssue};
use crate::reasoning::KnowledgeSnapshot;
use crate::resolve::variants::{names_equal, names_match, token_overlap};
use crate::resolve::Mention;
use crate::traversal::TraversalEngine;

pub const SCORE_MATCH: f32 = 1.0;
pub const OVERLAP_WEIGHT: f32 = 0.5;

static OPTION_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*\(?(?:[A-Za-z]|\d{1,2})[\.\):]\s+").expect("Invalid regex")
});

/// Remove a leading option label such as "A.", "b)", "(C)" or "2:".
pub fn strip_option_label(choice: &str) -> &str {
    match OPTION_LABEL.find(choice) {
        Some(m) => choice[m.end()..].trim(),
        None => choice.trim(),
    }
}

/// Answer to a multiple-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McqAnswer {
    /// The selected choice as offered, label included. Empty when no
    /// choices were offered.
    pub choice: String,
    pub index: Option<usize>,
    pub confidence: f32,
    pub evidence: Vec<String>,
    pub chain: ReasoningChain,
}

/// A candidate answer derived from the graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub evidence: Vec<String>,
}

/// Scores offered choices against one snapshot.
pub struct McqSynthesizer<'a> {
    traversal: &'a TraversalEngine,
    snapshot: &'a KnowledgeSnapshot,
}

impl<'a> McqSynthesizer<'a> {
    pub fn new(traversal: &'a TraversalEngine, snapshot: &'a KnowledgeSnapshot) -> Self {
        Self {
            traversal,
            snapshot,
        }
    }

    pub fn answer<S: AsRef<str>>(
        &self,
        mentions: &[Mention],
        classification: &Classification,
        choices: &[S],
        mut chain: ReasoningChain,
    ) -> McqAnswer {
        if choices.is_empty() {
            chain.add_step("No choices offered", Vec::new());
            return finish(chain, String::new(), None, 0.0, Vec::new());
        }

        let Some(primary) = mentions.iter().min_by_key(|m| m.tokens.start) else {
            get_metrics().unresolved_entities_total.inc();
            chain.record(ReasoningIssue::UnresolvedEntity {
                needed: 1,
                found: 0,
            });
            chain.add_step("No entity resolved; defaulting to the first choice", Vec::new());
            let confidence = 1.0 / choices.len() as f32;
            return finish(
                chain,
                choices[0].as_ref().to_string(),
                Some(0),
                confidence,
                Vec::new(),
            );
        };

        let candidates = self.candidates(&primary.canonical_name, classification);
        chain.add_step(
            format!(
                "Candidates related to {}: {}",
                primary.canonical_name,
                if candidates.is_empty() {
                    "none".to_string()
                } else {
                    candidates
                        .iter()
                        .map(|c| c.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                }
            ),
            Vec::new(),
        );

        let mut best: Option<(usize, f32, Option<&Candidate>)> = None;
        for (index, choice) in choices.iter().enumerate() {
            let (score, matched) = self.score(choice.as_ref(), &candidates);
            tracing::debug!("Choice {} '{}' scored {:.2}", index, choice.as_ref(), score);
            if best.map_or(true, |(_, top, _)| score > top) {
                best = Some((index, score, matched));
            }
        }

        let (index, score, matched) = best.unwrap_or((0, 0.0, None));
        let evidence = matched.map(|c| c.evidence.clone()).unwrap_or_default();
        let description = match matched {
            Some(candidate) => format!(
                "Choice '{}' matches {}",
                strip_option_label(choices[index].as_ref()),
                candidate.name
            ),
            None => "No choice matched a candidate".to_string(),
        };
        chain.add_step(description, evidence.clone());
        finish(
            chain,
            choices[index].as_ref().to_string(),
            Some(index),
            score,
            evidence,
        )
    }

    /// Candidate targets of `primary` for the relation kinds the question
    /// names, or every cached kind when it names none.
    pub fn candidates(&self, primary: &str, classification: &Classification) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = Vec::new();
        let mut push = |candidate: Candidate| {
            if !candidates.iter().any(|c| c.name == candidate.name) {
                candidates.push(candidate);
            }
        };

        let mut inferred = false;
        for relation_type in &classification.relation_types {
            let (kind, two_hop) = match relation_type {
                RelationType::TeammateOf | RelationType::SharedAffiliation => {
                    (HotRelation::Affiliation, true)
                }
                RelationType::SamePlace => (HotRelation::Birthplace, true),
                other => match HotRelation::for_relation_type(*other) {
                    Some(kind) => (kind, false),
                    None => continue,
                },
            };
            if !self.snapshot.cache.is_warmed(kind) {
                continue;
            }
            inferred = true;
            if two_hop {
                for hop in self.traversal.two_hop(self.snapshot, primary, kind) {
                    push(Candidate {
                        name: hop.name,
                        evidence: hop.evidence,
                    });
                }
            } else {
                for neighbor in self.neighbor_candidates(primary, kind) {
                    push(neighbor);
                }
            }
        }

        if !inferred {
            for kind in self.snapshot.cache.kinds() {
                for neighbor in self.neighbor_candidates(primary, kind) {
                    push(neighbor);
                }
            }
        }
        candidates
    }

    fn neighbor_candidates(&self, primary: &str, kind: HotRelation) -> Vec<Candidate> {
        let check_row = |neighbor: &str| {
            self.traversal
                .check_relation(self.snapshot, primary, neighbor, kind)
                .evidence
        };
        self.traversal
            .neighbors(self.snapshot, kind, primary)
            .into_iter()
            .map(|name| Candidate {
                evidence: check_row(&name),
                name,
            })
            .collect()
    }

    fn score<'c>(&self, choice: &str, candidates: &'c [Candidate]) -> (f32, Option<&'c Candidate>) {
        let text = strip_option_label(choice);
        let resolved = self
            .snapshot
            .resolver
            .resolve(text, None)
            .map(|r| r.canonical_name);

        let direct = candidates.iter().find(|c| {
            names_match(&c.name, text)
                || resolved
                    .as_deref()
                    .is_some_and(|canonical| names_equal(canonical, &c.name))
        });
        if let Some(candidate) = direct {
            return (SCORE_MATCH, Some(candidate));
        }

        let mut best: Option<(f32, &'c Candidate)> = None;
        for candidate in candidates {
            let score = OVERLAP_WEIGHT * token_overlap(text, &candidate.name);
            if score > 0.0 && best.map_or(true, |(top, _)| score > top) {
                best = Some((score, candidate));
            }
        }
        match best {
            Some((score, candidate)) => (score, Some(candidate)),
            None => (0.0, None),
        }
    }
}

fn finish(
    chain: ReasoningChain,
    choice: String,
    index: Option<usize>,
    confidence: f32,
    evidence: Vec<String>,
) -> McqAnswer {
    let chain = chain.finish(choice.clone(), confidence);
    McqAnswer {
        choice,
        index,
        confidence: chain.confidence,
        evidence,
        chain,
    }
}
