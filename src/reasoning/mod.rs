//! Reasoning: snapshot lifecycle, reasoning chains, answer synthesis and the
//! public entry points.

pub mod boolean;
pub mod chain;
pub mod engine;
pub mod mcq;
pub mod snapshot;

pub use boolean::{BooleanAnswer, BooleanPattern, BooleanSynthesizer, Verdict, BOOLEAN_PATTERNS};
pub use chain::{ReasoningChain, ReasoningIssue, ReasoningStep};
pub use engine::ReasoningEngine;
pub use mcq::{strip_option_label, Candidate, McqAnswer, McqSynthesizer};
pub use snapshot::KnowledgeSnapshot;
