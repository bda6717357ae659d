//! Neo4j-backed graph store.
//!
//! Issues parameterized Cypher only. Labels and relationship types come from
//! the closed [`EntityLabel`] / [`RelationType`] enums, so the only values
//! interpolated into query text are fixed identifiers and the path depth.

use async_trait::async_trait;
use neo4rs::{query, Graph, Query, Row};

use crate::config::Neo4jConfig;
use crate::error::StoreError;
use crate::graph::store::{GraphStore, StoreResult};
use crate::graph::types::{
    Direction, EdgeRow, Entity, EntityLabel, GraphPath, GraphStats, PathHop, RelationType,
    Relationship,
};

/// Graph store talking to a live Neo4j instance.
pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    /// Connect using the configured URI and credentials.
    pub async fn connect(config: &Neo4jConfig) -> StoreResult<Self> {
        let graph = Graph::new(&config.uri, &config.user, &config.resolved_password())
            .await
            .map_err(unavailable)?;
        tracing::info!("Connected to Neo4j at {}", config.uri);
        Ok(Self { graph })
    }

    async fn rows(&self, q: Query) -> StoreResult<Vec<Row>> {
        let mut stream = self.graph.execute(q).await.map_err(unavailable)?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(unavailable)? {
            rows.push(row);
        }
        Ok(rows)
    }
}

fn unavailable(err: neo4rs::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn column<'r, T: serde::Deserialize<'r>>(row: &'r Row, key: &str) -> StoreResult<T> {
    row.get::<T>(key)
        .map_err(|e| StoreError::Decode(format!("{key}: {e}")))
}

fn entity_from_row(row: &Row, prefix: &str) -> StoreResult<Entity> {
    let id: String = column(row, &format!("{prefix}_id"))?;
    let name: String = column(row, &format!("{prefix}_name"))?;
    let label: String = column(row, &format!("{prefix}_label"))?;
    let aliases: Vec<String> = column(row, &format!("{prefix}_aliases")).unwrap_or_default();
    let label = label.parse::<EntityLabel>().map_err(StoreError::Decode)?;
    let mut entity = Entity::with_id(id, label, name);
    entity.aliases = aliases;
    Ok(entity)
}

fn node_columns(var: &str, prefix: &str) -> String {
    format!(
        "elementId({var}) AS {prefix}_id, {var}.name AS {prefix}_name, \
         labels({var})[0] AS {prefix}_label, coalesce({var}.aliases, []) AS {prefix}_aliases"
    )
}

fn type_names(types: &[RelationType]) -> Vec<String> {
    types.iter().map(|t| t.graph_type().to_string()).collect()
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn find_entity(
        &self,
        name: &str,
        label: Option<EntityLabel>,
    ) -> StoreResult<Option<Entity>> {
        let pattern = match label {
            Some(l) => format!("(n:{})", l.graph_label()),
            None => "(n)".to_string(),
        };
        let cypher = format!(
            "MATCH {pattern} WHERE toLower(n.name) = toLower($name) RETURN {}",
            node_columns("n", "n")
        );
        let rows = self.rows(query(&cypher).param("name", name)).await?;

        let mut entities = rows
            .iter()
            .map(|row| entity_from_row(row, "n"))
            .collect::<StoreResult<Vec<_>>>()?;
        entities.sort_by_key(|e| e.label.ordinal());
        Ok(entities.into_iter().next())
    }

    async fn search_entities(
        &self,
        text: &str,
        label: Option<EntityLabel>,
        limit: usize,
    ) -> StoreResult<Vec<Entity>> {
        let pattern = match label {
            Some(l) => format!("(n:{})", l.graph_label()),
            None => "(n)".to_string(),
        };
        let cypher = format!(
            "MATCH {pattern} WHERE toLower(n.name) CONTAINS toLower($text) \
             RETURN {} \
             ORDER BY CASE WHEN toLower(n.name) = toLower($text) THEN 0 \
                           WHEN toLower(n.name) STARTS WITH toLower($text) THEN 1 \
                           ELSE 2 END, size(n.name), n.name \
             LIMIT $limit",
            node_columns("n", "n")
        );
        let q = query(&cypher)
            .param("text", text)
            .param("limit", limit as i64);
        self.rows(q)
            .await?
            .iter()
            .map(|row| entity_from_row(row, "n"))
            .collect()
    }

    async fn list_entities(&self, label: EntityLabel) -> StoreResult<Vec<Entity>> {
        let cypher = format!(
            "MATCH (n:{}) RETURN {}",
            label.graph_label(),
            node_columns("n", "n")
        );
        self.rows(query(&cypher))
            .await?
            .iter()
            .map(|row| entity_from_row(row, "n"))
            .collect()
    }

    async fn relationships_of(
        &self,
        name: &str,
        direction: Direction,
        types: &[RelationType],
        limit: usize,
    ) -> StoreResult<Vec<Relationship>> {
        let patterns: &[&str] = match direction {
            Direction::Outgoing => &["(e)-[r]->(o)"],
            Direction::Incoming => &["(e)<-[r]-(o)"],
            Direction::Both => &["(e)-[r]->(o)", "(e)<-[r]-(o)"],
        };

        let mut relationships = Vec::new();
        for pattern in patterns {
            let cypher = format!(
                "MATCH {pattern} WHERE toLower(e.name) = toLower($name) \
                 AND (size($types) = 0 OR type(r) IN $types) \
                 RETURN {}, {}, type(r) AS rel_type LIMIT $limit",
                node_columns("startNode(r)", "s"),
                node_columns("endNode(r)", "t"),
            );
            let q = query(&cypher)
                .param("name", name)
                .param("types", type_names(types))
                .param("limit", limit as i64);
            for row in self.rows(q).await? {
                let rel_type: String = column(&row, "rel_type")?;
                let Ok(relation_type) = rel_type.parse::<RelationType>() else {
                    tracing::debug!("Skipping unmodelled relationship type {}", rel_type);
                    continue;
                };
                relationships.push(Relationship::new(
                    entity_from_row(&row, "s")?,
                    relation_type,
                    entity_from_row(&row, "t")?,
                ));
            }
        }
        relationships.truncate(limit);
        Ok(relationships)
    }

    async fn scan_edges(
        &self,
        relation_type: RelationType,
        source_label: EntityLabel,
        target_label: EntityLabel,
    ) -> StoreResult<Vec<EdgeRow>> {
        let cypher = format!(
            "MATCH (a:{})-[:{}]->(b:{}) RETURN a.name AS source, b.name AS target",
            source_label.graph_label(),
            relation_type.graph_type(),
            target_label.graph_label()
        );
        self.rows(query(&cypher))
            .await?
            .iter()
            .map(|row| {
                Ok(EdgeRow {
                    source: column(row, "source")?,
                    target: column(row, "target")?,
                })
            })
            .collect()
    }

    async fn shortest_path(
        &self,
        source: &str,
        target: &str,
        max_depth: usize,
    ) -> StoreResult<Option<GraphPath>> {
        let cypher = format!(
            "MATCH (a) WHERE toLower(a.name) = toLower($source) \
             MATCH (b) WHERE toLower(b.name) = toLower($target) \
             MATCH p = shortestPath((a)-[*..{max_depth}]-(b)) \
             RETURN [n IN nodes(p) | n.name] AS names, \
                    [r IN relationships(p) | type(r)] AS types, \
                    [r IN relationships(p) | startNode(r).name] AS starts \
             LIMIT 1"
        );
        let q = query(&cypher)
            .param("source", source)
            .param("target", target);
        let rows = self.rows(q).await?;
        let Some(row) = rows.first() else {
            return Ok(None);
        };

        let names: Vec<String> = column(row, "names")?;
        let types: Vec<String> = column(row, "types")?;
        let starts: Vec<String> = column(row, "starts")?;

        let mut hops = Vec::with_capacity(types.len());
        for (i, rel_type) in types.iter().enumerate() {
            let (Some(from), Some(to), Some(start)) =
                (names.get(i), names.get(i + 1), starts.get(i))
            else {
                return Err(StoreError::Decode("path columns disagree in length".into()));
            };
            hops.push(PathHop {
                from: from.clone(),
                to: to.clone(),
                relation_type: rel_type.parse().map_err(StoreError::Decode)?,
                forward: start == from,
            });
        }
        Ok(Some(GraphPath { nodes: names, hops }))
    }

    async fn stats(&self) -> StoreResult<GraphStats> {
        let mut stats = GraphStats::default();
        for row in self
            .rows(query(
                "MATCH (n) RETURN labels(n)[0] AS label, count(*) AS count",
            ))
            .await?
        {
            let label: String = column(&row, "label")?;
            let count: i64 = column(&row, "count")?;
            stats.entity_count += count as usize;
            stats.entities_by_label.insert(label, count as usize);
        }
        for row in self
            .rows(query(
                "MATCH ()-[r]->() RETURN type(r) AS rel_type, count(*) AS count",
            ))
            .await?
        {
            let rel_type: String = column(&row, "rel_type")?;
            let count: i64 = column(&row, "count")?;
            stats.relationship_count += count as usize;
            stats.relationships_by_type.insert(rel_type, count as usize);
        }
        Ok(stats)
    }
}
