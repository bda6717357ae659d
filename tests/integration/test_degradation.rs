//! Live store failures, timeouts and snapshot rebuilds.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use kgqa::config::Config;
use kgqa::error::StoreError;
use kgqa::graph::{
    Direction, EdgeRow, Entity, EntityLabel, GraphPath, GraphStats, GraphStore,
    InMemoryGraphStore, RelationType, Relationship, StoreResult,
};
use kgqa::reasoning::{ReasoningEngine, ReasoningIssue, Verdict};

use crate::common::{create_engine_with, create_test_graph, create_test_store};

/// How the wrapped store misbehaves on live path queries.
#[derive(Clone, Copy)]
enum Fault {
    Unavailable,
    Slow(Duration),
}

/// Delegates to an in-memory store, but breaks shortest-path queries.
struct FaultyStore {
    inner: InMemoryGraphStore,
    fault: Fault,
}

#[async_trait]
impl GraphStore for FaultyStore {
    async fn find_entity(
        &self,
        name: &str,
        label: Option<EntityLabel>,
    ) -> StoreResult<Option<Entity>> {
        self.inner.find_entity(name, label).await
    }

    async fn search_entities(
        &self,
        text: &str,
        label: Option<EntityLabel>,
        limit: usize,
    ) -> StoreResult<Vec<Entity>> {
        self.inner.search_entities(text, label, limit).await
    }

    async fn list_entities(&self, label: EntityLabel) -> StoreResult<Vec<Entity>> {
        self.inner.list_entities(label).await
    }

    async fn relationships_of(
        &self,
        name: &str,
        direction: Direction,
        types: &[RelationType],
        limit: usize,
    ) -> StoreResult<Vec<Relationship>> {
        self.inner
            .relationships_of(name, direction, types, limit)
            .await
    }

    async fn scan_edges(
        &self,
        relation_type: RelationType,
        source_label: EntityLabel,
        target_label: EntityLabel,
    ) -> StoreResult<Vec<EdgeRow>> {
        self.inner
            .scan_edges(relation_type, source_label, target_label)
            .await
    }

    async fn shortest_path(
        &self,
        source: &str,
        target: &str,
        max_depth: usize,
    ) -> StoreResult<Option<GraphPath>> {
        match self.fault {
            Fault::Unavailable => Err(StoreError::Unavailable("connection refused".into())),
            Fault::Slow(delay) => {
                tokio::time::sleep(delay).await;
                self.inner.shortest_path(source, target, max_depth).await
            }
        }
    }

    async fn stats(&self) -> StoreResult<GraphStats> {
        self.inner.stats().await
    }
}

async fn create_faulty_engine(fault: Fault) -> ReasoningEngine {
    let mut config = Config::default();
    config.graph.query_timeout_ms = 50;
    let store = FaultyStore {
        inner: create_test_store(),
        fault,
    };
    create_engine_with(Arc::new(store), config).await
}

#[tokio::test]
async fn test_unavailable_store_uses_cached_link() {
    let engine = create_faulty_engine(Fault::Unavailable).await;
    let answer = engine.ask_boolean("Is Person1 connected to Person2?").await;

    // both are affiliated with OrgA, which the cache already knows
    assert_eq!(answer.verdict, Verdict::True);
    assert!(answer.confidence < 0.95);
    assert!(answer.chain.is_degraded());
    assert!(answer
        .evidence
        .contains(&"Person2 is affiliated with OrgA".to_string()));
}

#[tokio::test]
async fn test_unavailable_store_without_partial_result_is_unknown() {
    let engine = create_faulty_engine(Fault::Unavailable).await;
    let answer = engine.ask_boolean("Is Person3 connected to Person2?").await;

    assert_eq!(answer.verdict, Verdict::Unknown);
    assert_eq!(answer.confidence, 0.0);
    assert!(answer.evidence.is_empty());
    assert!(answer.chain.issues.iter().any(|i| matches!(
        i,
        ReasoningIssue::StoreUnavailable { detail } if detail.contains("connection refused")
    )));
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let engine = create_faulty_engine(Fault::Slow(Duration::from_millis(500))).await;
    let answer = engine.ask_boolean("Is Person3 connected to Person2?").await;

    assert_eq!(answer.verdict, Verdict::Unknown);
    assert_eq!(answer.confidence, 0.0);
    assert!(answer.chain.issues.iter().any(|i| matches!(
        i,
        ReasoningIssue::StoreUnavailable { detail } if detail.contains("timed out")
    )));
}

#[tokio::test]
async fn test_cached_questions_ignore_store_faults() {
    let engine = create_faulty_engine(Fault::Unavailable).await;
    let answer = engine.ask_boolean("Person1 is affiliated with OrgA.").await;

    assert_eq!(answer.verdict, Verdict::True);
    assert_eq!(answer.confidence, 0.95);
    assert!(!answer.chain.is_degraded());
}

#[tokio::test]
async fn test_reason_three_hop_prefers_cache() {
    let engine = create_faulty_engine(Fault::Unavailable).await;
    let chain = engine
        .reason("Was Person1 a teammate of Person2, affiliated with a club based in Town?")
        .await;

    assert!(!chain.is_degraded());
    assert_eq!(chain.final_answer, "OrgA");
}

fn write_snapshot(dir: &TempDir, builder: kgqa::graph::GraphBuilder) -> std::path::PathBuf {
    let path = dir.path().join("graph.json");
    let snapshot = builder.snapshot().unwrap();
    std::fs::write(&path, serde_json::to_string_pretty(&snapshot).unwrap()).unwrap();
    path
}

#[tokio::test]
async fn test_rebuild_picks_up_graph_changes() {
    let dir = TempDir::new().unwrap();
    let path = write_snapshot(&dir, create_test_graph());
    let store = Arc::new(InMemoryGraphStore::load(&path).await.unwrap());
    let engine = create_engine_with(store.clone(), Config::default()).await;

    let before = engine.ask_boolean("Person3 is affiliated with OrgA.").await;
    assert_eq!(before.verdict, Verdict::False);
    let pinned = engine.snapshot();

    let path = write_snapshot(
        &dir,
        create_test_graph().relate("Person3", RelationType::AffiliatedWith, "OrgA"),
    );
    store.reload(&path).await.unwrap();

    // the store changed, but the cache is a startup snapshot
    let stale = engine.ask_boolean("Person3 is affiliated with OrgA.").await;
    assert_eq!(stale.verdict, Verdict::False);

    engine.rebuild().await.unwrap();
    let after = engine.ask_boolean("Person3 is affiliated with OrgA.").await;
    assert_eq!(after.verdict, Verdict::True);

    // a request holding the old snapshot still sees the old generation
    assert!(pinned
        .cache
        .targets(kgqa::HotRelation::Affiliation, "Person3")
        .is_some_and(|orgs| !orgs.contains("OrgA")));
}

#[tokio::test]
async fn test_engine_from_config_file() {
    let dir = TempDir::new().unwrap();
    let graph = write_snapshot(&dir, create_test_graph());
    let config_path = dir.path().join("kgqa.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[graph]
snapshot_path = "{}"
max_path_depth = 4

[aliases.organization]
"Org Alpha" = "OrgA"
"#,
            graph.display()
        ),
    )
    .unwrap();

    let config = Config::from_file(&config_path).unwrap();
    let engine = ReasoningEngine::from_config(config).await.unwrap();
    let answer = engine.ask_boolean("Person2 played for Org Alpha.").await;
    assert_eq!(answer.verdict, Verdict::True);
}

#[tokio::test]
async fn test_unknown_alias_target_fails_startup() {
    let mut config = Config::default();
    config
        .aliases
        .organization
        .insert("Ghost".into(), "Ghost Club".into());
    let result = ReasoningEngine::new(Arc::new(create_test_store()), config).await;
    assert!(result.is_err());
}
