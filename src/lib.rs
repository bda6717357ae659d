//! kgqa: Knowledge-Graph Question Answering
//!
//! Answers yes/no and multiple-choice questions over a graph of people,
//! organizations and places by resolving entity mentions, classifying the
//! question, and traversing a warm relationship cache with a bounded live
//! path query behind it.

pub mod cache;
pub mod config;
pub mod error;
pub mod graph;
pub mod metrics;
pub mod query;
pub mod reasoning;
pub mod resolve;
pub mod traversal;

pub use cache::{HotRelation, RelationMap, RelationshipCache};
pub use config::Config;
pub use error::{ConfigError, KgqaError, Result, SnapshotError, StoreError};
pub use graph::{
    Direction, EdgeRow, Entity, EntityLabel, GraphPath, GraphStore, InMemoryGraphStore,
    RelationType, Relationship,
};
pub use metrics::{get_metrics, Metrics, MetricsSnapshot};
pub use query::{Classification, QueryArchetype, QueryClassifier};
pub use reasoning::{
    BooleanAnswer, KnowledgeSnapshot, McqAnswer, ReasoningChain, ReasoningEngine, ReasoningIssue,
    ReasoningStep, Verdict,
};
pub use resolve::{AliasTable, EntityResolver, MatchMethod, Mention, MentionExtractor};
pub use traversal::{PathOutcome, TraversalEngine};
