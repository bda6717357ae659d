//! Knowledge snapshot: the resolver and relationship cache built together at
//! startup and shared read-only by every request.

use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::cache::RelationshipCache;
use crate::config::Config;
use crate::error::{Result, SnapshotError};
use crate::graph::{Entity, EntityLabel, GraphStore};
use crate::metrics::get_metrics;
use crate::resolve::{AliasTable, EntityIndex, EntityResolver};

/// Immutable startup state. Replaced wholesale on rebuild, never mutated.
#[derive(Debug, Clone)]
pub struct KnowledgeSnapshot {
    pub resolver: EntityResolver,
    pub cache: RelationshipCache,
    built_at: DateTime<Utc>,
}

impl KnowledgeSnapshot {
    /// Load every canonical name, assemble the alias table and warm the
    /// relationship cache.
    ///
    /// Fails when the store cannot be read or when a configured alias points
    /// at a name the graph does not contain.
    pub async fn build(store: &dyn GraphStore, config: &Config) -> Result<Self> {
        let metrics = get_metrics();
        let started = Instant::now();

        let mut entities: Vec<Entity> = Vec::new();
        for label in EntityLabel::ALL {
            let batch = store.list_entities(label).await?;
            tracing::debug!("Loaded {} {} names", batch.len(), label);
            entities.extend(batch);
        }

        let index = EntityIndex::build(&entities, &config.resolver.organization_affixes);
        let mut aliases = canonical_aliases(&AliasTable::from_config(&config.aliases), &index)?;
        aliases.extend_from_entities(&entities);

        let resolver = EntityResolver::new(index, aliases, config.resolver.min_variant_len);
        let cache = RelationshipCache::build(store, &config.cache.warm_relations).await?;
        let snapshot = Self::from_parts(resolver, cache);

        metrics.canonical_names.set(snapshot.resolver.index().len() as i64);
        metrics.alias_entries.set(snapshot.resolver.aliases().len() as i64);
        metrics.cached_edges.set(snapshot.cache.edge_count() as i64);
        metrics.snapshot_built_at.set(snapshot.built_at.timestamp());
        metrics
            .warmup_duration_seconds
            .observe(started.elapsed().as_secs_f64());

        tracing::info!(
            "Knowledge snapshot ready: {} names, {} aliases, {} cached edges in {:?}",
            snapshot.resolver.index().len(),
            snapshot.resolver.aliases().len(),
            snapshot.cache.edge_count(),
            started.elapsed()
        );
        Ok(snapshot)
    }

    /// Assemble a snapshot from prebuilt parts.
    pub fn from_parts(resolver: EntityResolver, cache: RelationshipCache) -> Self {
        Self {
            resolver,
            cache,
            built_at: Utc::now(),
        }
    }

    /// When this snapshot was built. Graph changes after this are not
    /// visible to resolution or cached lookups.
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }
}

/// Point every configured alias at the stored spelling of its target.
///
/// Fails when a target is not a canonical name in the graph.
fn canonical_aliases(configured: &AliasTable, index: &EntityIndex) -> Result<AliasTable> {
    let mut aliases = AliasTable::new();
    for (label, alias, target) in configured.iter() {
        let entry = index
            .canonical(target, Some(label))
            .ok_or_else(|| SnapshotError::UnknownAliasTarget {
                alias: alias.to_string(),
                canonical: target.to_string(),
            })?;
        if entry.canonical_name != target {
            tracing::debug!(
                "Alias '{}' target '{}' stored as '{}'",
                alias,
                target,
                entry.canonical_name
            );
        }
        aliases.insert(label, alias, &entry.canonical_name);
    }
    Ok(aliases)
}
