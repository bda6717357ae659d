//! Shared fixtures for integration tests.

use std::sync::{Arc, Once};

use kgqa::config::Config;
use kgqa::graph::{Entity, EntityLabel, GraphBuilder, InMemoryGraphStore, RelationType};
use kgqa::ReasoningEngine;

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`, once per process.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// The fixture graph as a builder, so tests can extend or serialize it.
pub fn create_test_graph() -> GraphBuilder {
    InMemoryGraphStore::builder()
        .entity(EntityLabel::Person, "Person1")
        .entity(EntityLabel::Person, "Person2")
        .entity(EntityLabel::Person, "Person3")
        .entity(EntityLabel::Person, "Coach1")
        .entity(EntityLabel::Person, "Nguyen Quang Hai")
        .entity(EntityLabel::Organization, "OrgA")
        .entity(EntityLabel::Organization, "OrgB")
        .entity(EntityLabel::Organization, "OrgC")
        .with_entity(Entity::new(EntityLabel::Organization, "Hoang Anh Gia Lai").with_alias("HAGL"))
        .entity(EntityLabel::Place, "Town")
        .entity(EntityLabel::Place, "Harbor")
        .relate("Person1", RelationType::AffiliatedWith, "OrgA")
        .relate("Person1", RelationType::AffiliatedWith, "OrgB")
        .relate("Person2", RelationType::AffiliatedWith, "OrgA")
        .relate("Person3", RelationType::AffiliatedWith, "OrgC")
        .relate("Nguyen Quang Hai", RelationType::AffiliatedWith, "Hoang Anh Gia Lai")
        .relate("Person1", RelationType::BornIn, "Town")
        .relate("Person2", RelationType::FromPlace, "Town")
        .relate("Person3", RelationType::BornIn, "Harbor")
        .relate("OrgC", RelationType::BasedIn, "Town")
        .relate("Coach1", RelationType::Coached, "OrgA")
}

pub fn create_test_store() -> InMemoryGraphStore {
    create_test_graph().build().unwrap()
}

pub async fn create_test_engine() -> ReasoningEngine {
    create_engine_with(Arc::new(create_test_store()), Config::default()).await
}

pub async fn create_engine_with(
    store: Arc<dyn kgqa::GraphStore>,
    config: Config,
) -> ReasoningEngine {
    init_tracing();
    ReasoningEngine::new(store, config).await.unwrap()
}
