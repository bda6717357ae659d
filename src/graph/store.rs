//! Graph access layer.
//!
//! The engine talks to the external graph store only through the read-only
//! [`GraphStore`] trait. [`InMemoryGraphStore`] is the reference backend,
//! loaded from a JSON snapshot produced by the upstream import pipeline.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{KgqaError, Result, SnapshotError, StoreError};
use crate::graph::types::{
    Direction, EdgeRow, Entity, EntityLabel, GraphPath, GraphStats, PathHop, RelationType,
    Relationship,
};

/// Result type for graph store queries.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Default row limit for relationship lookups.
pub const DEFAULT_RELATIONSHIP_LIMIT: usize = 100;

// ============================================================================
// GraphStore Trait
// ============================================================================

/// Read-only access to the knowledge graph.
///
/// Every method is a single parameterized query. No method ever writes.
/// Names are matched case-insensitively against canonical names; "zero rows"
/// is reported as an empty result, never as an error.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Exact-label node lookup by canonical name.
    ///
    /// Without a label, labels are tried in [`EntityLabel::ALL`] order.
    async fn find_entity(&self, name: &str, label: Option<EntityLabel>)
        -> StoreResult<Option<Entity>>;

    /// Search entities whose name contains `text`, ordered exact match first,
    /// then prefix matches, then by name length.
    async fn search_entities(
        &self,
        text: &str,
        label: Option<EntityLabel>,
        limit: usize,
    ) -> StoreResult<Vec<Entity>>;

    /// All entities carrying a label.
    async fn list_entities(&self, label: EntityLabel) -> StoreResult<Vec<Entity>>;

    /// Relationships touching an entity, filtered by direction and type.
    ///
    /// An empty `types` slice means every relation type.
    async fn relationships_of(
        &self,
        name: &str,
        direction: Direction,
        types: &[RelationType],
        limit: usize,
    ) -> StoreResult<Vec<Relationship>>;

    /// Full scan of one relation type between two labels.
    async fn scan_edges(
        &self,
        relation_type: RelationType,
        source_label: EntityLabel,
        target_label: EntityLabel,
    ) -> StoreResult<Vec<EdgeRow>>;

    /// Bounded-length shortest path, ignoring edge direction.
    async fn shortest_path(
        &self,
        source: &str,
        target: &str,
        max_depth: usize,
    ) -> StoreResult<Option<GraphPath>>;

    /// Counts by label and relation type.
    async fn stats(&self) -> StoreResult<GraphStats>;
}

// ============================================================================
// Snapshot Format
// ============================================================================

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk graph snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: u32,
    pub entities: Vec<Entity>,
    pub relationships: Vec<SnapshotEdge>,
}

/// A relationship in a snapshot, referencing entities by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub source_id: String,
    pub relation_type: RelationType,
    pub target_id: String,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

// ============================================================================
// Internal Data Structure
// ============================================================================

#[derive(Debug, Default)]
struct GraphData {
    /// Entities indexed by id.
    entities: HashMap<String, Entity>,
    /// Index: (label, lowercased name) -> entity id.
    by_name: HashMap<(EntityLabel, String), String>,
    /// Index: label -> entity ids, in insertion order.
    by_label: HashMap<EntityLabel, Vec<String>>,
    edges: Vec<SnapshotEdge>,
    /// Index: source id -> edge positions.
    outgoing: HashMap<String, Vec<usize>>,
    /// Index: target id -> edge positions.
    incoming: HashMap<String, Vec<usize>>,
}

impl GraphData {
    fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version).into());
        }

        let mut data = GraphData::default();
        for entity in snapshot.entities {
            let key = (entity.label, name_key(&entity.canonical_name));
            if data.by_name.contains_key(&key) {
                return Err(SnapshotError::DuplicateCanonicalName {
                    name: entity.canonical_name,
                    label: entity.label.to_string(),
                }
                .into());
            }
            data.by_name.insert(key, entity.id.clone());
            data.by_label
                .entry(entity.label)
                .or_default()
                .push(entity.id.clone());
            data.entities.insert(entity.id.clone(), entity);
        }

        for edge in snapshot.relationships {
            for id in [&edge.source_id, &edge.target_id] {
                if !data.entities.contains_key(id) {
                    return Err(StoreError::DanglingReference(id.clone()).into());
                }
            }
            let position = data.edges.len();
            data.outgoing
                .entry(edge.source_id.clone())
                .or_default()
                .push(position);
            data.incoming
                .entry(edge.target_id.clone())
                .or_default()
                .push(position);
            data.edges.push(edge);
        }

        Ok(data)
    }

    fn lookup(&self, name: &str, label: Option<EntityLabel>) -> Option<&Entity> {
        let key = name_key(name);
        let labels: &[EntityLabel] = match label {
            Some(ref l) => std::slice::from_ref(l),
            None => &EntityLabel::ALL,
        };
        labels
            .iter()
            .find_map(|l| self.by_name.get(&(*l, key.clone())))
            .and_then(|id| self.entities.get(id))
    }

    fn hydrate(&self, edge: &SnapshotEdge) -> Option<Relationship> {
        let source = self.entities.get(&edge.source_id)?.clone();
        let target = self.entities.get(&edge.target_id)?.clone();
        Some(Relationship {
            source,
            relation_type: edge.relation_type,
            target,
            properties: edge.properties.clone(),
        })
    }

    fn name_of(&self, id: &str) -> String {
        self.entities
            .get(id)
            .map(|e| e.canonical_name.clone())
            .unwrap_or_default()
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

// ============================================================================
// In-Memory Implementation
// ============================================================================

/// In-memory graph store backed by a JSON snapshot.
pub struct InMemoryGraphStore {
    data: RwLock<GraphData>,
}

impl InMemoryGraphStore {
    /// Create a store from an in-memory snapshot.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        Ok(Self {
            data: RwLock::new(GraphData::from_snapshot(snapshot)?),
        })
    }

    /// Load a store from a JSON snapshot file.
    pub async fn load(path: &Path) -> Result<Self> {
        let snapshot = read_snapshot(path).await?;
        let store = Self::from_snapshot(snapshot)?;
        tracing::info!("Loaded graph snapshot from {}", path.display());
        Ok(store)
    }

    /// Replace the store contents with a fresh snapshot file.
    ///
    /// Engines built on this store keep serving their existing knowledge
    /// snapshot until they are rebuilt.
    pub async fn reload(&self, path: &Path) -> Result<()> {
        let snapshot = read_snapshot(path).await?;
        let fresh = GraphData::from_snapshot(snapshot)?;
        *self.data.write().await = fresh;
        tracing::info!("Reloaded graph snapshot from {}", path.display());
        Ok(())
    }

    /// Start building a store by hand.
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }
}

async fn read_snapshot(path: &Path) -> Result<GraphSnapshot> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(KgqaError::Io)?;
    serde_json::from_str(&content).map_err(KgqaError::Serialization)
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn find_entity(
        &self,
        name: &str,
        label: Option<EntityLabel>,
    ) -> StoreResult<Option<Entity>> {
        let data = self.data.read().await;
        Ok(data.lookup(name, label).cloned())
    }

    async fn search_entities(
        &self,
        text: &str,
        label: Option<EntityLabel>,
        limit: usize,
    ) -> StoreResult<Vec<Entity>> {
        let data = self.data.read().await;
        let needle = name_key(text);
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<(u8, &Entity)> = data
            .entities
            .values()
            .filter(|e| label.map_or(true, |l| e.label == l))
            .filter_map(|e| {
                let name = name_key(&e.canonical_name);
                if name == needle {
                    Some((0, e))
                } else if name.starts_with(&needle) {
                    Some((1, e))
                } else if name.contains(&needle) {
                    Some((2, e))
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|(rank_a, a), (rank_b, b)| {
            rank_a
                .cmp(rank_b)
                .then(a.canonical_name.len().cmp(&b.canonical_name.len()))
                .then(a.canonical_name.cmp(&b.canonical_name))
        });

        Ok(hits
            .into_iter()
            .take(limit)
            .map(|(_, e)| e.clone())
            .collect())
    }

    async fn list_entities(&self, label: EntityLabel) -> StoreResult<Vec<Entity>> {
        let data = self.data.read().await;
        Ok(data
            .by_label
            .get(&label)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| data.entities.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn relationships_of(
        &self,
        name: &str,
        direction: Direction,
        types: &[RelationType],
        limit: usize,
    ) -> StoreResult<Vec<Relationship>> {
        let data = self.data.read().await;
        let Some(entity) = data.lookup(name, None) else {
            return Ok(Vec::new());
        };

        let mut positions: Vec<usize> = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            positions.extend(data.outgoing.get(&entity.id).into_iter().flatten());
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            positions.extend(data.incoming.get(&entity.id).into_iter().flatten());
        }
        positions.sort_unstable();
        positions.dedup();

        Ok(positions
            .into_iter()
            .map(|p| &data.edges[p])
            .filter(|edge| types.is_empty() || types.contains(&edge.relation_type))
            .filter_map(|edge| data.hydrate(edge))
            .take(limit)
            .collect())
    }

    async fn scan_edges(
        &self,
        relation_type: RelationType,
        source_label: EntityLabel,
        target_label: EntityLabel,
    ) -> StoreResult<Vec<EdgeRow>> {
        let data = self.data.read().await;
        Ok(data
            .edges
            .iter()
            .filter(|edge| edge.relation_type == relation_type)
            .filter_map(|edge| {
                let source = data.entities.get(&edge.source_id)?;
                let target = data.entities.get(&edge.target_id)?;
                (source.label == source_label && target.label == target_label).then(|| EdgeRow {
                    source: source.canonical_name.clone(),
                    target: target.canonical_name.clone(),
                })
            })
            .collect())
    }

    async fn shortest_path(
        &self,
        source: &str,
        target: &str,
        max_depth: usize,
    ) -> StoreResult<Option<GraphPath>> {
        let data = self.data.read().await;
        let (Some(from), Some(to)) = (data.lookup(source, None), data.lookup(target, None)) else {
            return Ok(None);
        };
        if from.id == to.id {
            return Ok(Some(GraphPath {
                nodes: vec![from.canonical_name.clone()],
                hops: Vec::new(),
            }));
        }

        // Breadth-first search over edges in both directions. `parent` maps a
        // node to (previous node, edge position, walked forward).
        let mut parent: HashMap<&str, (&str, usize, bool)> = HashMap::new();
        let mut visited: HashSet<&str> = HashSet::from([from.id.as_str()]);
        let mut queue: VecDeque<(&str, usize)> = VecDeque::from([(from.id.as_str(), 0)]);
        let mut found = false;

        while let Some((current, depth)) = queue.pop_front() {
            if current == to.id {
                found = true;
                break;
            }
            if depth >= max_depth {
                continue;
            }

            let forward = data.outgoing.get(current).into_iter().flatten().map(|&p| {
                (data.edges[p].target_id.as_str(), p, true)
            });
            let backward = data.incoming.get(current).into_iter().flatten().map(|&p| {
                (data.edges[p].source_id.as_str(), p, false)
            });

            for (next, position, is_forward) in forward.chain(backward) {
                if visited.insert(next) {
                    parent.insert(next, (current, position, is_forward));
                    queue.push_back((next, depth + 1));
                }
            }
        }

        if !found {
            return Ok(None);
        }

        let mut hops = Vec::new();
        let mut cursor = to.id.as_str();
        while let Some(&(previous, position, forward)) = parent.get(cursor) {
            hops.push(PathHop {
                from: data.name_of(previous),
                to: data.name_of(cursor),
                relation_type: data.edges[position].relation_type,
                forward,
            });
            cursor = previous;
        }
        hops.reverse();

        let mut nodes = vec![from.canonical_name.clone()];
        nodes.extend(hops.iter().map(|hop| hop.to.clone()));
        Ok(Some(GraphPath { nodes, hops }))
    }

    async fn stats(&self) -> StoreResult<GraphStats> {
        let data = self.data.read().await;
        let mut stats = GraphStats {
            entity_count: data.entities.len(),
            relationship_count: data.edges.len(),
            ..Default::default()
        };
        for (label, ids) in &data.by_label {
            stats
                .entities_by_label
                .insert(label.graph_label().to_string(), ids.len());
        }
        for edge in &data.edges {
            *stats
                .relationships_by_type
                .entry(edge.relation_type.graph_type().to_string())
                .or_insert(0) += 1;
        }
        Ok(stats)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builds an [`InMemoryGraphStore`] by canonical name instead of by id.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    entities: Vec<Entity>,
    relations: Vec<(String, RelationType, String)>,
}

impl GraphBuilder {
    /// Add an entity.
    pub fn entity(mut self, label: EntityLabel, name: impl Into<String>) -> Self {
        self.entities.push(Entity::new(label, name));
        self
    }

    /// Add a fully specified entity.
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// Add a relationship between two previously added entities.
    ///
    /// Names are matched case-insensitively; when a name exists under several
    /// labels the first label in [`EntityLabel::ALL`] order wins.
    pub fn relate(
        mut self,
        source: impl Into<String>,
        relation_type: RelationType,
        target: impl Into<String>,
    ) -> Self {
        self.relations
            .push((source.into(), relation_type, target.into()));
        self
    }

    /// Build the snapshot without creating a store.
    pub fn snapshot(self) -> Result<GraphSnapshot> {
        let id_of = |name: &str| -> Result<String> {
            let key = name_key(name);
            EntityLabel::ALL
                .iter()
                .find_map(|label| {
                    self.entities
                        .iter()
                        .find(|e| e.label == *label && name_key(&e.canonical_name) == key)
                })
                .map(|e| e.id.clone())
                .ok_or_else(|| StoreError::DanglingReference(name.to_string()).into())
        };

        let mut relationships = Vec::with_capacity(self.relations.len());
        for (source, relation_type, target) in &self.relations {
            relationships.push(SnapshotEdge {
                source_id: id_of(source)?,
                relation_type: *relation_type,
                target_id: id_of(target)?,
                properties: HashMap::new(),
            });
        }

        Ok(GraphSnapshot {
            version: SNAPSHOT_VERSION,
            entities: self.entities,
            relationships,
        })
    }

    /// Build the store.
    pub fn build(self) -> Result<InMemoryGraphStore> {
        InMemoryGraphStore::from_snapshot(self.snapshot()?)
    }
}
