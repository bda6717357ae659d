//! Core types for the knowledge graph.
//!
//! Entities and relationships belong to the external graph store; the engine
//! only ever reads them. Every lookup that crosses a component boundary is
//! keyed by an entity's canonical name, never by its store-internal id.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

// ============================================================================
// Entity Types
// ============================================================================

/// A typed node in the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Opaque identifier, internal to the graph access layer.
    pub id: String,
    /// Authoritative name, unique within the entity's label.
    pub canonical_name: String,
    /// The label (node category) of the entity.
    pub label: EntityLabel,
    /// Alternative names declared by the graph itself.
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Open property map.
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl Entity {
    /// Create a new entity with a generated id.
    pub fn new(label: EntityLabel, canonical_name: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), label, canonical_name)
    }

    /// Create a new entity with a specific id.
    pub fn with_id(
        id: impl Into<String>,
        label: EntityLabel,
        canonical_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            canonical_name: canonical_name.into(),
            label,
            aliases: Vec::new(),
            properties: HashMap::new(),
        }
    }

    /// Add an alias to the entity.
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Add a property.
    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

/// Node categories present in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityLabel {
    Person,
    Organization,
    Role,
    Place,
    Venue,
    EventCategory,
}

impl EntityLabel {
    /// All labels, in the fixed order used for deterministic tie-breaking.
    pub const ALL: [EntityLabel; 6] = [
        EntityLabel::Person,
        EntityLabel::Organization,
        EntityLabel::Role,
        EntityLabel::Place,
        EntityLabel::Venue,
        EntityLabel::EventCategory,
    ];

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            EntityLabel::Person => "Person",
            EntityLabel::Organization => "Organization",
            EntityLabel::Role => "Role",
            EntityLabel::Place => "Place",
            EntityLabel::Venue => "Venue",
            EntityLabel::EventCategory => "Event category",
        }
    }

    /// Node label as stored in the graph.
    pub fn graph_label(&self) -> &'static str {
        match self {
            EntityLabel::Person => "Person",
            EntityLabel::Organization => "Organization",
            EntityLabel::Role => "Role",
            EntityLabel::Place => "Place",
            EntityLabel::Venue => "Venue",
            EntityLabel::EventCategory => "EventCategory",
        }
    }

    /// Position in [`EntityLabel::ALL`].
    pub fn ordinal(&self) -> usize {
        EntityLabel::ALL
            .iter()
            .position(|label| label == self)
            .unwrap_or(EntityLabel::ALL.len())
    }
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for EntityLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityLabel::ALL
            .into_iter()
            .find(|label| {
                label.graph_label().eq_ignore_ascii_case(s)
                    || label.display_name().eq_ignore_ascii_case(s)
            })
            .ok_or_else(|| format!("unknown entity label: {s}"))
    }
}

// ============================================================================
// Relationship Types
// ============================================================================

/// A typed edge between two entities, hydrated with both endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: Entity,
    pub relation_type: RelationType,
    pub target: Entity,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

impl Relationship {
    /// Create a relationship between two entities.
    pub fn new(source: Entity, relation_type: RelationType, target: Entity) -> Self {
        Self {
            source,
            relation_type,
            target,
            properties: HashMap::new(),
        }
    }

    /// Render the relationship as an evidence line.
    pub fn to_text(&self) -> String {
        evidence_line(
            &self.source.canonical_name,
            self.relation_type,
            &self.target.canonical_name,
        )
    }
}

/// Render a single relation row as a human-readable sentence.
pub fn evidence_line(source: &str, relation_type: RelationType, target: &str) -> String {
    format!("{} {} {}", source, relation_type.phrase(), target)
}

/// The relation types populated by the upstream import pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    /// Person is (or was) a member of an organization.
    AffiliatedWith,
    /// Person represented a national organization.
    RepresentedNation,
    TeammateOf,
    NationalTeammateOf,
    /// Person coached an organization.
    Coached,
    CoachedNational,
    BornIn,
    /// Person comes from a place (hometown).
    FromPlace,
    /// Organization is based in a place.
    BasedIn,
    HomeVenue,
    CompetedIn,
    CompetesIn,
    /// Derived: two people were affiliated with the same organization.
    SharedAffiliation,
    /// Derived: two people come from the same place.
    SamePlace,
    HasRole,
    HasNationality,
}

impl RelationType {
    pub const ALL: [RelationType; 16] = [
        RelationType::AffiliatedWith,
        RelationType::RepresentedNation,
        RelationType::TeammateOf,
        RelationType::NationalTeammateOf,
        RelationType::Coached,
        RelationType::CoachedNational,
        RelationType::BornIn,
        RelationType::FromPlace,
        RelationType::BasedIn,
        RelationType::HomeVenue,
        RelationType::CompetedIn,
        RelationType::CompetesIn,
        RelationType::SharedAffiliation,
        RelationType::SamePlace,
        RelationType::HasRole,
        RelationType::HasNationality,
    ];

    /// Relationship type name as stored in the graph.
    pub fn graph_type(&self) -> &'static str {
        match self {
            RelationType::AffiliatedWith => "AFFILIATED_WITH",
            RelationType::RepresentedNation => "REPRESENTED_NATION",
            RelationType::TeammateOf => "TEAMMATE_OF",
            RelationType::NationalTeammateOf => "NATIONAL_TEAMMATE_OF",
            RelationType::Coached => "COACHED",
            RelationType::CoachedNational => "COACHED_NATIONAL",
            RelationType::BornIn => "BORN_IN",
            RelationType::FromPlace => "FROM_PLACE",
            RelationType::BasedIn => "BASED_IN",
            RelationType::HomeVenue => "HOME_VENUE",
            RelationType::CompetedIn => "COMPETED_IN",
            RelationType::CompetesIn => "COMPETES_IN",
            RelationType::SharedAffiliation => "SHARED_AFFILIATION",
            RelationType::SamePlace => "SAME_PLACE",
            RelationType::HasRole => "HAS_ROLE",
            RelationType::HasNationality => "HAS_NATIONALITY",
        }
    }

    /// Verb phrase used when rendering evidence lines.
    pub fn phrase(&self) -> &'static str {
        match self {
            RelationType::AffiliatedWith => "is affiliated with",
            RelationType::RepresentedNation => "represented",
            RelationType::TeammateOf => "was a teammate of",
            RelationType::NationalTeammateOf => "was a national teammate of",
            RelationType::Coached => "coached",
            RelationType::CoachedNational => "coached the national side of",
            RelationType::BornIn => "was born in",
            RelationType::FromPlace => "comes from",
            RelationType::BasedIn => "is based in",
            RelationType::HomeVenue => "plays home games at",
            RelationType::CompetedIn => "competed in",
            RelationType::CompetesIn => "competes in",
            RelationType::SharedAffiliation => "shared an organization with",
            RelationType::SamePlace => "shares a hometown with",
            RelationType::HasRole => "has the role",
            RelationType::HasNationality => "has nationality",
        }
    }

    /// Whether the relation reads the same from both endpoints.
    pub fn is_symmetric(&self) -> bool {
        matches!(
            self,
            RelationType::TeammateOf
                | RelationType::NationalTeammateOf
                | RelationType::SharedAffiliation
                | RelationType::SamePlace
        )
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.graph_type())
    }
}

impl FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationType::ALL
            .into_iter()
            .find(|rt| rt.graph_type().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown relation type: {s}"))
    }
}

/// Traversal direction for relationship lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

// ============================================================================
// Query Results
// ============================================================================

/// A (source, target) canonical-name pair returned by a full relation scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRow {
    pub source: String,
    pub target: String,
}

/// One traversed edge on a path. `from`/`to` follow the walk order, which may
/// run against the stored direction of the edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathHop {
    pub from: String,
    pub to: String,
    pub relation_type: RelationType,
    /// True when the walk follows the stored edge direction.
    pub forward: bool,
}

impl PathHop {
    /// Evidence line in the stored edge direction.
    pub fn to_text(&self) -> String {
        if self.forward {
            evidence_line(&self.from, self.relation_type, &self.to)
        } else {
            evidence_line(&self.to, self.relation_type, &self.from)
        }
    }
}

/// A shortest path between two entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphPath {
    /// Canonical names of the nodes along the path, endpoints included.
    pub nodes: Vec<String>,
    pub hops: Vec<PathHop>,
}

impl GraphPath {
    /// Number of edges on the path.
    pub fn len(&self) -> usize {
        self.hops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// One evidence line per hop.
    pub fn evidence(&self) -> Vec<String> {
        self.hops.iter().map(PathHop::to_text).collect()
    }
}

/// Statistics about the graph store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphStats {
    pub entity_count: usize,
    pub relationship_count: usize,
    pub entities_by_label: HashMap<String, usize>,
    pub relationships_by_type: HashMap<String, usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_type_round_trip_names() {
        for rt in RelationType::ALL {
            assert_eq!(rt.graph_type().parse::<RelationType>().unwrap(), rt);
        }
        assert!("PLAYED_FOR".parse::<RelationType>().is_err());
    }

    #[test]
    fn test_label_parse() {
        assert_eq!(
            "eventcategory".parse::<EntityLabel>().unwrap(),
            EntityLabel::EventCategory
        );
        assert_eq!("Person".parse::<EntityLabel>().unwrap(), EntityLabel::Person);
    }

    #[test]
    fn test_relationship_text() {
        let rel = Relationship::new(
            Entity::new(EntityLabel::Person, "Ada Byron"),
            RelationType::AffiliatedWith,
            Entity::new(EntityLabel::Organization, "Analytical Society"),
        );
        assert_eq!(rel.to_text(), "Ada Byron is affiliated with Analytical Society");
    }

    #[test]
    fn test_path_hop_keeps_stored_direction() {
        let hop = PathHop {
            from: "Org".into(),
            to: "Person".into(),
            relation_type: RelationType::AffiliatedWith,
            forward: false,
        };
        assert_eq!(hop.to_text(), "Person is affiliated with Org");
    }
}
