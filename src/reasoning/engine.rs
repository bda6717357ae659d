//! Reasoning engine: the question-answering entry points.
//!
//! Every request takes one [`KnowledgeSnapshot`] handle up front and reads
//! only from it, so a concurrent [`ReasoningEngine::rebuild`] never mixes two
//! generations of cache state inside one answer. Answering never fails; every
//! recoverable problem is recorded on the reasoning chain.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::HotRelation;
use crate::config::{Config, GraphBackend};
use crate::error::{ConfigError, Result};
use crate::graph::{GraphStore, InMemoryGraphStore};
use crate::metrics::{get_metrics, Metrics};
use crate::query::{Classification, QueryArchetype, QueryClassifier};
use crate::reasoning::boolean::{
    BooleanAnswer, BooleanSynthesizer, CONFIDENCE_CONTAINMENT, CONFIDENCE_EXACT,
    CONFIDENCE_PATH_NOT_FOUND, CONFIDENCE_UNRESOLVED,
};
use crate::reasoning::chain::{ReasoningChain, ReasoningIssue};
use crate::reasoning::mcq::{McqAnswer, McqSynthesizer};
use crate::reasoning::KnowledgeSnapshot;
use crate::resolve::{Mention, MentionExtractor};
use crate::traversal::{MatchKind, PathOutcome, TraversalEngine};

/// Knowledge-graph question answering over a shared snapshot.
pub struct ReasoningEngine {
    config: Config,
    traversal: TraversalEngine,
    extractor: MentionExtractor,
    classifier: QueryClassifier,
    snapshot: RwLock<Arc<KnowledgeSnapshot>>,
}

impl ReasoningEngine {
    /// Build the snapshot from `store` and create the engine.
    pub async fn new(store: Arc<dyn GraphStore>, config: Config) -> Result<Self> {
        let snapshot = KnowledgeSnapshot::build(store.as_ref(), &config).await?;
        Ok(Self::with_snapshot(store, config, snapshot))
    }

    /// Create an engine around an already built snapshot.
    pub fn with_snapshot(
        store: Arc<dyn GraphStore>,
        config: Config,
        snapshot: KnowledgeSnapshot,
    ) -> Self {
        Self {
            traversal: TraversalEngine::new(store, &config),
            extractor: MentionExtractor::from_config(&config.resolver),
            classifier: QueryClassifier::new(),
            snapshot: RwLock::new(Arc::new(snapshot)),
            config,
        }
    }

    /// Open the configured graph backend and build the engine.
    pub async fn from_config(config: Config) -> Result<Self> {
        let store: Arc<dyn GraphStore> = match config.graph.backend {
            GraphBackend::Memory => {
                let path = config.snapshot_path().ok_or_else(|| {
                    ConfigError::MissingField("graph.snapshot_path".to_string())
                })?;
                Arc::new(InMemoryGraphStore::load(&path).await?)
            }
            GraphBackend::Neo4j => open_neo4j(&config).await?,
        };
        Self::new(store, config).await
    }

    /// The current snapshot. Holding the handle pins that generation.
    pub fn snapshot(&self) -> Arc<KnowledgeSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Rebuild the snapshot from the store and swap it in.
    ///
    /// Requests already running keep the snapshot they started with. The
    /// live path memo is cleared with the swap.
    pub async fn rebuild(&self) -> Result<()> {
        let fresh = KnowledgeSnapshot::build(self.traversal.store().as_ref(), &self.config).await?;
        *self.snapshot.write() = Arc::new(fresh);
        self.traversal.invalidate();
        tracing::info!("Knowledge snapshot rebuilt");
        Ok(())
    }

    /// Answer a yes/no question.
    pub async fn ask_boolean(&self, question: &str) -> BooleanAnswer {
        let metrics = get_metrics();
        metrics.boolean_questions_total.inc();
        let _timer = Metrics::start_timer(&metrics.answer_duration_seconds);

        let snapshot = self.snapshot();
        let (mentions, classification, chain) = self.prepare(&snapshot, question, 2);
        let answer = BooleanSynthesizer::new(&self.traversal, &snapshot)
            .answer(&mentions, &classification, chain)
            .await;

        tracing::info!(
            "Boolean answer {} ({:.2}) for {:?}",
            answer.verdict,
            answer.confidence,
            question
        );
        answer
    }

    /// Pick the best of the offered choices.
    pub async fn ask_mcq<S: AsRef<str>>(&self, question: &str, choices: &[S]) -> McqAnswer {
        let metrics = get_metrics();
        metrics.mcq_questions_total.inc();
        let _timer = Metrics::start_timer(&metrics.answer_duration_seconds);

        let snapshot = self.snapshot();
        let (mentions, classification, chain) = self.prepare(&snapshot, question, 1);
        let answer = McqSynthesizer::new(&self.traversal, &snapshot).answer(
            &mentions,
            &classification,
            choices,
            chain,
        );

        tracing::info!(
            "MCQ answer {:?} ({:.2}) for {:?}",
            answer.choice,
            answer.confidence,
            question
        );
        answer
    }

    /// Produce a reasoning chain for any question, following its archetype.
    pub async fn reason(&self, question: &str) -> ReasoningChain {
        let metrics = get_metrics();
        metrics.reason_questions_total.inc();
        let _timer = Metrics::start_timer(&metrics.answer_duration_seconds);

        let snapshot = self.snapshot();
        let (mentions, classification, mut chain) = self.prepare(&snapshot, question, 1);
        let ordered = in_question_order(&mentions);

        let Some(first) = ordered.first() else {
            metrics.unresolved_entities_total.inc();
            chain.record(ReasoningIssue::UnresolvedEntity {
                needed: 1,
                found: 0,
            });
            return chain.finish("Unknown", 0.0);
        };
        let a = first.canonical_name.as_str();
        let second = ordered.get(1).map(|m| m.canonical_name.as_str());
        let kinds = kinds_for(&snapshot, &classification);

        match (classification.archetype, second) {
            (QueryArchetype::PathFinding, Some(b)) => self.reason_path(a, b, chain).await,
            (QueryArchetype::ThreeHop, Some(b)) => {
                // cached two-hop answers first, live path only without one
                match self.shared_link(&snapshot, a, b, &kinds, &mut chain) {
                    Some(via) => chain.finish(via, CONFIDENCE_EXACT),
                    None => self.reason_path(a, b, chain).await,
                }
            }
            (QueryArchetype::TwoHop, Some(b)) => {
                match self.shared_link(&snapshot, a, b, &kinds, &mut chain) {
                    Some(via) => chain.finish(via, CONFIDENCE_EXACT),
                    None => chain.finish("No", CONFIDENCE_PATH_NOT_FOUND),
                }
            }
            (QueryArchetype::OneHop, Some(b)) => {
                for kind in &kinds {
                    let check = self.traversal.check_relation(&snapshot, a, b, *kind);
                    if let Some(matched) = check.matched.clone() {
                        chain.add_step(format!("Cached {kind} of {a} includes {matched}"), check.evidence);
                        let confidence = match check.kind {
                            Some(MatchKind::Exact) => CONFIDENCE_EXACT,
                            _ => CONFIDENCE_CONTAINMENT,
                        };
                        return chain.finish(matched, confidence);
                    }
                }
                chain.add_step(format!("No cached relation from {a} to {b}"), Vec::new());
                chain.finish("No", CONFIDENCE_CONTAINMENT)
            }
            (QueryArchetype::Aggregation, _) => {
                let counts = self.traversal.aggregate(&snapshot, a, &kinds);
                let mut total = 0;
                for (kind, count, rows) in counts {
                    total += count;
                    chain.add_step(format!("{a} has {count} {kind} rows"), rows);
                }
                chain.finish(total.to_string(), CONFIDENCE_EXACT)
            }
            (QueryArchetype::TwoHop | QueryArchetype::ThreeHop, None) => {
                let mut names = Vec::new();
                for kind in &kinds {
                    for hop in self.traversal.two_hop(&snapshot, a, *kind) {
                        chain.add_step(
                            format!("{} is linked to {a} through {}", hop.name, hop.via),
                            hop.evidence,
                        );
                        names.push(hop.name);
                    }
                }
                finish_listing(chain, names)
            }
            _ => {
                let facts = self.traversal.lookup(&snapshot, a);
                let found = !facts.is_empty();
                chain.add_step(format!("Cached facts about {a}"), facts);
                let confidence = if found { CONFIDENCE_EXACT } else { CONFIDENCE_UNRESOLVED };
                chain.finish(a.to_string(), confidence)
            }
        }
    }

    /// Resolve mentions, classify, and open the chain with a resolution step.
    fn prepare(
        &self,
        snapshot: &KnowledgeSnapshot,
        question: &str,
        wanted: usize,
    ) -> (Vec<Mention>, Classification, ReasoningChain) {
        let mentions = self
            .extractor
            .extract_at_least(&snapshot.resolver, question, wanted);
        let classification = self.classifier.classify(question, mentions.len());
        let mut chain = ReasoningChain::new(question, classification.archetype);

        for mention in mentions.iter().filter(|m| m.ambiguous) {
            get_metrics().ambiguous_matches_total.inc();
            chain.record(ReasoningIssue::AmbiguousMatch {
                surface: mention.surface.clone(),
                chosen: mention.canonical_name.clone(),
            });
        }

        let resolved: Vec<String> = in_question_order(&mentions)
            .iter()
            .map(|m| format!("'{}' -> {} ({})", m.surface, m.canonical_name, m.label))
            .collect();
        chain.add_step(
            if resolved.is_empty() {
                "No entities resolved".to_string()
            } else {
                format!("Resolved entities: {}", resolved.join(", "))
            },
            Vec::new(),
        );
        chain.add_step(
            format!(
                "Classified as {} (keywords: {})",
                classification.archetype,
                if classification.matched_keywords.is_empty() {
                    "none".to_string()
                } else {
                    classification.matched_keywords.join(", ")
                }
            ),
            Vec::new(),
        );

        (mentions, classification, chain)
    }

    /// First neighbor `a` and `b` share through any of `kinds`.
    fn shared_link(
        &self,
        snapshot: &KnowledgeSnapshot,
        a: &str,
        b: &str,
        kinds: &[HotRelation],
        chain: &mut ReasoningChain,
    ) -> Option<String> {
        for kind in kinds {
            let shared = self.traversal.shared_neighbors(snapshot, a, b, *kind);
            if let Some(via) = shared.shared.iter().next().cloned() {
                chain.add_step(
                    format!("{a} and {b} share {kind} neighbor {via}"),
                    shared.evidence,
                );
                return Some(via);
            }
        }
        chain.add_step(format!("No cached neighbor shared by {a} and {b}"), Vec::new());
        None
    }

    async fn reason_path(&self, a: &str, b: &str, mut chain: ReasoningChain) -> ReasoningChain {
        match self.traversal.find_path(a, b).await {
            PathOutcome::Found(path) => {
                let route = path.nodes.join(" -> ");
                chain.add_step(format!("Path from {a} to {b}: {route}"), path.evidence());
                chain.finish(route, CONFIDENCE_EXACT)
            }
            PathOutcome::NotFound => {
                chain.add_step(format!("No path from {a} to {b}"), Vec::new());
                chain.finish("No", CONFIDENCE_PATH_NOT_FOUND)
            }
            PathOutcome::Unavailable(e) => {
                get_metrics().degraded_answers_total.inc();
                chain.record(ReasoningIssue::StoreUnavailable {
                    detail: e.to_string(),
                });
                chain.add_step("Live path query unavailable", Vec::new());
                chain.finish("Unknown", 0.0)
            }
        }
    }
}

fn in_question_order(mentions: &[Mention]) -> Vec<&Mention> {
    let mut ordered: Vec<&Mention> = mentions.iter().collect();
    ordered.sort_by_key(|m| m.tokens.start);
    ordered
}

/// Kinds named by the question that are cached, or every cached kind.
fn kinds_for(snapshot: &KnowledgeSnapshot, classification: &Classification) -> Vec<HotRelation> {
    let named: Vec<HotRelation> = classification
        .hot_kinds()
        .into_iter()
        .filter(|kind| snapshot.cache.is_warmed(*kind))
        .collect();
    if named.is_empty() {
        snapshot.cache.kinds()
    } else {
        named
    }
}

fn finish_listing(chain: ReasoningChain, names: Vec<String>) -> ReasoningChain {
    if names.is_empty() {
        chain.finish("None", CONFIDENCE_UNRESOLVED)
    } else {
        chain.finish(names.join(", "), CONFIDENCE_EXACT)
    }
}

#[cfg(feature = "neo4j")]
async fn open_neo4j(config: &Config) -> Result<Arc<dyn GraphStore>> {
    let store = crate::graph::Neo4jGraphStore::connect(&config.graph.neo4j).await?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "neo4j"))]
async fn open_neo4j(_config: &Config) -> Result<Arc<dyn GraphStore>> {
    Err(ConfigError::Invalid("graph.backend \"neo4j\" needs the neo4j feature".to_string()).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EntityLabel, RelationType};
    use crate::reasoning::Verdict;

    async fn create_test_engine() -> ReasoningEngine {
        let store = InMemoryGraphStore::builder()
            .entity(EntityLabel::Person, "Person1")
            .entity(EntityLabel::Person, "Person2")
            .entity(EntityLabel::Organization, "OrgA")
            .entity(EntityLabel::Organization, "OrgB")
            .entity(EntityLabel::Organization, "OrgC")
            .entity(EntityLabel::Place, "Town")
            .relate("Person1", RelationType::AffiliatedWith, "OrgA")
            .relate("Person1", RelationType::AffiliatedWith, "OrgB")
            .relate("Person2", RelationType::AffiliatedWith, "OrgA")
            .relate("Person2", RelationType::BornIn, "Town")
            .build()
            .unwrap();
        ReasoningEngine::new(Arc::new(store), Config::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ask_boolean_records_resolution_steps() {
        let engine = create_test_engine().await;
        let answer = engine.ask_boolean("Person1 is affiliated with OrgA.").await;
        assert_eq!(answer.verdict, Verdict::True);
        assert_eq!(answer.chain.query_type, QueryArchetype::OneHop);
        assert!(answer.chain.steps[0].description.contains("Person1"));
        assert!(answer.chain.issues.is_empty());
    }

    #[tokio::test]
    async fn test_reason_aggregation() {
        let engine = create_test_engine().await;
        let chain = engine
            .reason("How many organizations was Person1 affiliated with?")
            .await;
        assert_eq!(chain.query_type, QueryArchetype::Aggregation);
        assert_eq!(chain.final_answer, "2");
        assert_eq!(chain.evidence.len(), 2);
    }

    #[tokio::test]
    async fn test_reason_path_finding() {
        let engine = create_test_engine().await;
        let chain = engine
            .reason("How is Person1 connected to Town?")
            .await;
        assert_eq!(chain.query_type, QueryArchetype::PathFinding);
        assert_eq!(chain.final_answer, "Person1 -> OrgA -> Person2 -> Town");
        assert_eq!(chain.confidence, CONFIDENCE_EXACT);
    }

    #[tokio::test]
    async fn test_reason_lookup_and_unresolved() {
        let engine = create_test_engine().await;
        let chain = engine.reason("Tell me about Person2").await;
        assert_eq!(chain.final_answer, "Person2");
        assert_eq!(chain.evidence.len(), 2);

        let chain = engine.reason("Tell me about nobody").await;
        assert_eq!(chain.final_answer, "Unknown");
        assert_eq!(chain.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_rebuild_swaps_snapshot() {
        let engine = create_test_engine().await;
        let before = engine.snapshot();
        engine.rebuild().await.unwrap();
        let after = engine.snapshot();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before.cache.edge_count(), after.cache.edge_count());
    }

    #[tokio::test]
    async fn test_from_config_requires_snapshot_path() {
        let result = ReasoningEngine::from_config(Config::default()).await;
        assert!(result.is_err());
    }
}
