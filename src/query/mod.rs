//! Question classification.

pub mod classifier;
pub mod types;

pub use classifier::{hop_score, HopIndicator, QueryClassifier, RelationKeyword, HOP_INDICATORS, RELATION_KEYWORDS};
pub use types::{Classification, HopScore, QueryArchetype};
