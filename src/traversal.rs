//! Graph traversal over the relationship cache and the live store.
//!
//! One-hop checks, shared-neighbor joins and two-hop expansions are answered
//! entirely from the [`KnowledgeSnapshot`] cache. Only shortest-path queries
//! reach the live store, and those run under a timeout and degrade to
//! [`PathOutcome::Unavailable`] instead of failing the question.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::cache::HotRelation;
use crate::config::Config;
use crate::error::StoreError;
use crate::graph::{evidence_line, GraphPath, GraphStore};
use crate::metrics::{get_metrics, Metrics};
use crate::reasoning::KnowledgeSnapshot;
use crate::resolve::variants::{names_equal, names_match, normalize};

// ============================================================================
// Result Types
// ============================================================================

/// How a one-hop check matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// The cached target equals the expected name.
    Exact,
    /// One name contains the other on word boundaries.
    Containment,
}

/// Outcome of a one-hop relation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationCheck {
    /// The cached neighbor that matched, if any.
    pub matched: Option<String>,
    pub kind: Option<MatchKind>,
    /// Whether the subject had any cached rows for the relation.
    pub known: bool,
    /// Matching row when found, otherwise every cached row of the subject.
    pub evidence: Vec<String>,
}

impl RelationCheck {
    pub fn holds(&self) -> bool {
        self.matched.is_some()
    }
}

/// Neighbors two entities have in common through one relation kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedNeighbors {
    pub kind: HotRelation,
    pub shared: BTreeSet<String>,
    pub evidence: Vec<String>,
}

impl SharedNeighbors {
    pub fn is_empty(&self) -> bool {
        self.shared.is_empty()
    }
}

/// An entity reached in two hops through a shared neighbor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TwoHopMatch {
    pub name: String,
    pub via: String,
    pub evidence: Vec<String>,
}

/// Outcome of a live shortest-path query.
#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome {
    Found(GraphPath),
    NotFound,
    /// The store failed or timed out; nothing can be said about the path.
    Unavailable(StoreError),
}

type PathKey = (String, String, usize);

// ============================================================================
// Traversal Engine
// ============================================================================

/// Answers relation lookups against a snapshot, and path queries live.
pub struct TraversalEngine {
    store: Arc<dyn GraphStore>,
    path_memo: Option<Cache<PathKey, Option<GraphPath>>>,
    max_depth: usize,
    timeout: Duration,
}

impl TraversalEngine {
    pub fn new(store: Arc<dyn GraphStore>, config: &Config) -> Self {
        let capacity = config.cache.path_memo_capacity;
        Self {
            store,
            path_memo: (capacity > 0).then(|| Cache::new(capacity)),
            max_depth: config.graph.max_path_depth,
            timeout: Duration::from_millis(config.graph.query_timeout_ms),
        }
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    /// Drop memoized paths. Called whenever the snapshot is rebuilt.
    pub fn invalidate(&self) {
        if let Some(memo) = &self.path_memo {
            memo.invalidate_all();
        }
    }

    /// Cached neighbors of `name` for a kind, from either endpoint.
    ///
    /// Querying a source yields its targets; querying a target yields its
    /// sources.
    pub fn neighbors(
        &self,
        snapshot: &KnowledgeSnapshot,
        kind: HotRelation,
        name: &str,
    ) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        if let Some(targets) = snapshot.cache.targets(kind, name) {
            found.extend(targets.iter().cloned());
        }
        if let Some(sources) = snapshot.cache.sources(kind, name) {
            found.extend(sources.iter().cloned());
        }
        found
    }

    /// Does `subject` relate to `object` through `kind`?
    ///
    /// An exact match on a cached neighbor beats a containment match, and
    /// either endpoint may be the stored source.
    pub fn check_relation(
        &self,
        snapshot: &KnowledgeSnapshot,
        subject: &str,
        object: &str,
        kind: HotRelation,
    ) -> RelationCheck {
        let metrics = get_metrics();
        let neighbors = self.neighbors(snapshot, kind, subject);
        record_lookup(&metrics, !neighbors.is_empty());

        let exact = neighbors.iter().find(|n| names_equal(n, object));
        let contained = || neighbors.iter().find(|n| names_match(n, object));
        let (matched, match_kind) = match exact {
            Some(n) => (Some(n.clone()), Some(MatchKind::Exact)),
            None => match contained() {
                Some(n) => (Some(n.clone()), Some(MatchKind::Containment)),
                None => (None, None),
            },
        };

        let evidence = match &matched {
            Some(neighbor) => vec![edge_text(snapshot, kind, subject, neighbor)],
            None => neighbors
                .iter()
                .map(|n| edge_text(snapshot, kind, subject, n))
                .collect(),
        };

        RelationCheck {
            matched,
            kind: match_kind,
            known: !neighbors.is_empty(),
            evidence,
        }
    }

    /// Neighbors shared by `a` and `b` through `kind`. Symmetric in its
    /// arguments.
    pub fn shared_neighbors(
        &self,
        snapshot: &KnowledgeSnapshot,
        a: &str,
        b: &str,
        kind: HotRelation,
    ) -> SharedNeighbors {
        let metrics = get_metrics();
        let left = self.neighbors(snapshot, kind, a);
        let right = self.neighbors(snapshot, kind, b);
        record_lookup(&metrics, !left.is_empty());
        record_lookup(&metrics, !right.is_empty());

        let shared: BTreeSet<String> = left.intersection(&right).cloned().collect();
        let mut evidence = Vec::new();
        for neighbor in &shared {
            evidence.push(edge_text(snapshot, kind, a, neighbor));
            evidence.push(edge_text(snapshot, kind, b, neighbor));
        }

        SharedNeighbors {
            kind,
            shared,
            evidence,
        }
    }

    /// Entities reached from `name` through one shared neighbor of `kind`,
    /// e.g. everyone affiliated with one of the same organizations.
    pub fn two_hop(
        &self,
        snapshot: &KnowledgeSnapshot,
        name: &str,
        kind: HotRelation,
    ) -> Vec<TwoHopMatch> {
        let mut matches: Vec<TwoHopMatch> = Vec::new();
        for via in self.neighbors(snapshot, kind, name) {
            for other in self.neighbors(snapshot, kind, &via) {
                if names_equal(&other, name) || matches.iter().any(|m| m.name == other) {
                    continue;
                }
                matches.push(TwoHopMatch {
                    evidence: vec![
                        edge_text(snapshot, kind, name, &via),
                        edge_text(snapshot, kind, &other, &via),
                    ],
                    name: other,
                    via: via.clone(),
                });
            }
        }
        matches
    }

    /// Organizations `person` is affiliated with that are based in a place
    /// `other` comes from. Returns (organization, place) pairs and evidence.
    pub fn affiliated_in_hometown_of(
        &self,
        snapshot: &KnowledgeSnapshot,
        person: &str,
        other: &str,
    ) -> (Vec<(String, String)>, Vec<String>) {
        let hometowns = self.neighbors(snapshot, HotRelation::Birthplace, other);
        let mut hits = Vec::new();
        let mut evidence: Vec<String> = hometowns
            .iter()
            .map(|place| edge_text(snapshot, HotRelation::Birthplace, other, place))
            .collect();

        for organization in self.neighbors(snapshot, HotRelation::Affiliation, person) {
            let bases = self.neighbors(snapshot, HotRelation::Headquarters, &organization);
            for place in bases.intersection(&hometowns) {
                evidence.push(edge_text(
                    snapshot,
                    HotRelation::Affiliation,
                    person,
                    &organization,
                ));
                evidence.push(edge_text(
                    snapshot,
                    HotRelation::Headquarters,
                    &organization,
                    place,
                ));
                hits.push((organization.clone(), place.clone()));
            }
        }
        (hits, evidence)
    }

    /// Cached facts about one entity across every warmed kind.
    pub fn lookup(&self, snapshot: &KnowledgeSnapshot, name: &str) -> Vec<String> {
        let mut facts = Vec::new();
        for kind in snapshot.cache.kinds() {
            for neighbor in self.neighbors(snapshot, kind, name) {
                facts.push(edge_text(snapshot, kind, name, &neighbor));
            }
        }
        facts
    }

    /// Neighbor counts per kind, with the rows counted.
    pub fn aggregate(
        &self,
        snapshot: &KnowledgeSnapshot,
        name: &str,
        kinds: &[HotRelation],
    ) -> Vec<(HotRelation, usize, Vec<String>)> {
        kinds
            .iter()
            .filter(|kind| snapshot.cache.is_warmed(**kind))
            .map(|kind| {
                let rows: Vec<String> = self
                    .neighbors(snapshot, *kind, name)
                    .iter()
                    .map(|n| edge_text(snapshot, *kind, name, n))
                    .collect();
                (*kind, rows.len(), rows)
            })
            .collect()
    }

    /// Live bounded shortest path between two canonical names.
    ///
    /// Successful answers are memoized until the next rebuild. Failures and
    /// timeouts are returned as [`PathOutcome::Unavailable`] and not memoized.
    pub async fn find_path(&self, source: &str, target: &str) -> PathOutcome {
        let metrics = get_metrics();
        let key = (normalize(source), normalize(target), self.max_depth);

        if let Some(memo) = &self.path_memo {
            if let Some(cached) = memo.get(&key).await {
                metrics.path_memo_hits_total.inc();
                return match cached {
                    Some(path) => PathOutcome::Found(path),
                    None => PathOutcome::NotFound,
                };
            }
        }

        metrics.live_queries_total.inc();
        let _timer = Metrics::start_timer(&metrics.live_query_duration_seconds);
        let result = tokio::time::timeout(
            self.timeout,
            self.store.shortest_path(source, target, self.max_depth),
        )
        .await
        .unwrap_or_else(|_| {
            Err(StoreError::Timeout {
                millis: self.timeout.as_millis() as u64,
            })
        });

        match result {
            Ok(path) => {
                if let Some(memo) = &self.path_memo {
                    memo.insert(key, path.clone()).await;
                }
                match path {
                    Some(path) => PathOutcome::Found(path),
                    None => PathOutcome::NotFound,
                }
            }
            Err(e) => {
                metrics.store_errors_total.inc();
                tracing::warn!("Live path query {} -> {} failed: {}", source, target, e);
                PathOutcome::Unavailable(e)
            }
        }
    }
}

fn record_lookup(metrics: &Metrics, hit: bool) {
    if hit {
        metrics.cache_hits_total.inc();
    } else {
        metrics.cache_misses_total.inc();
    }
}

/// Evidence line for a cached row, in stored direction and with the row's
/// own relation type.
fn edge_text(snapshot: &KnowledgeSnapshot, kind: HotRelation, a: &str, b: &str) -> String {
    match snapshot.cache.relation_type(kind, a, b) {
        Some(relation_type) => evidence_line(a, relation_type, b),
        None => {
            let relation_type = snapshot
                .cache
                .relation_type(kind, b, a)
                .unwrap_or_else(|| kind.evidence_type());
            evidence_line(b, relation_type, a)
        }
    }
}
