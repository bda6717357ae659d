//! Reasoning chain: the request-scoped trail of steps and evidence behind an
//! answer.

use serde::{Deserialize, Serialize};

use crate::query::QueryArchetype;

/// A recoverable problem met while answering. Recorded, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReasoningIssue {
    /// Fewer entities resolved than the question needs.
    UnresolvedEntity { needed: usize, found: usize },
    /// A mention matched several canonical names equally well.
    AmbiguousMatch { surface: String, chosen: String },
    /// A live graph query failed or timed out.
    StoreUnavailable { detail: String },
    /// No archetype-specific rule applied; the generic fallback answered.
    NoPatternMatched,
}

/// One step of a reasoning chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningStep {
    pub number: usize,
    pub description: String,
    /// Evidence lines consulted in this step.
    pub evidence: Vec<String>,
}

/// Structured trail of how an answer was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningChain {
    pub question: String,
    pub query_type: QueryArchetype,
    pub steps: Vec<ReasoningStep>,
    pub final_answer: String,
    /// Rule-derived confidence in [0, 1].
    pub confidence: f32,
    /// Evidence from every step, deduplicated in first-seen order.
    pub evidence: Vec<String>,
    pub issues: Vec<ReasoningIssue>,
}

impl ReasoningChain {
    /// Start a chain for a question.
    pub fn new(question: impl Into<String>, query_type: QueryArchetype) -> Self {
        Self {
            question: question.into(),
            query_type,
            steps: Vec::new(),
            final_answer: String::new(),
            confidence: 0.0,
            evidence: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Append a step.
    pub fn add_step(&mut self, description: impl Into<String>, evidence: Vec<String>) {
        for line in &evidence {
            if !self.evidence.contains(line) {
                self.evidence.push(line.clone());
            }
        }
        self.steps.push(ReasoningStep {
            number: self.steps.len() + 1,
            description: description.into(),
            evidence,
        });
    }

    /// Record a recoverable issue.
    pub fn record(&mut self, issue: ReasoningIssue) {
        if !self.issues.contains(&issue) {
            self.issues.push(issue);
        }
    }

    /// Set the final answer and clamp the confidence into [0, 1].
    pub fn finish(mut self, answer: impl Into<String>, confidence: f32) -> Self {
        self.final_answer = answer.into();
        self.confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    /// Whether a live query failure shaped the answer.
    pub fn is_degraded(&self) -> bool {
        self.issues
            .iter()
            .any(|i| matches!(i, ReasoningIssue::StoreUnavailable { .. }))
    }

    /// Plain-text rendering of the chain.
    pub fn to_text(&self) -> String {
        let mut lines = vec![
            format!("Question: {}", self.question),
            format!("Query type: {}", self.query_type),
        ];
        for step in &self.steps {
            lines.push(format!("Step {}: {}", step.number, step.description));
            for line in &step.evidence {
                lines.push(format!("  - {line}"));
            }
        }
        lines.push(format!(
            "Answer: {} (confidence {:.2})",
            self.final_answer, self.confidence
        ));
        lines.join("\n")
    }
}
