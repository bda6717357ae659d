//! Knowledge graph model and read-only access layer.

#[cfg(feature = "neo4j")]
pub mod neo4j;
pub mod store;
pub mod types;

#[cfg(feature = "neo4j")]
pub use neo4j::Neo4jGraphStore;
pub use store::{
    GraphBuilder, GraphSnapshot, GraphStore, InMemoryGraphStore, SnapshotEdge, StoreResult,
    DEFAULT_RELATIONSHIP_LIMIT, SNAPSHOT_VERSION,
};
pub use types::{
    evidence_line, Direction, EdgeRow, Entity, EntityLabel, GraphPath, GraphStats, PathHop,
    RelationType, Relationship,
};
