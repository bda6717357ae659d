//! Configuration settings for the kgqa engine.

use crate::cache::HotRelation;
use crate::error::{ConfigError, Result};
use crate::graph::EntityLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Upper bound on the live shortest-path depth.
pub const MAX_PATH_DEPTH_LIMIT: usize = 15;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graph: GraphConfig,
    pub cache: CacheConfig,
    pub resolver: ResolverConfig,
    pub aliases: AliasConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(ConfigError::ReadFile)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from default locations or use defaults.
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("kgqa.toml"),
            PathBuf::from("config.toml"),
            dirs::config_dir()
                .map(|p| p.join("kgqa/config.toml"))
                .unwrap_or_default(),
            dirs::home_dir()
                .map(|p| p.join(".kgqa/config.toml"))
                .unwrap_or_default(),
        ];

        for path in &config_paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Config::default())
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<()> {
        if self.graph.max_path_depth == 0 || self.graph.max_path_depth > MAX_PATH_DEPTH_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "graph.max_path_depth must be between 1 and {MAX_PATH_DEPTH_LIMIT}"
            ))
            .into());
        }

        if self.graph.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid("graph.query_timeout_ms must be > 0".into()).into());
        }

        if self.graph.backend == GraphBackend::Memory && self.graph.snapshot_path.is_none() {
            tracing::debug!("No graph.snapshot_path set; the store must be supplied in code");
        }

        if self.graph.backend == GraphBackend::Neo4j && self.graph.neo4j.uri.is_empty() {
            return Err(ConfigError::MissingField("graph.neo4j.uri".to_string()).into());
        }

        if self.resolver.max_window == 0 {
            return Err(ConfigError::Invalid("resolver.max_window must be > 0".into()).into());
        }

        Ok(())
    }

    /// Expand the snapshot path, if configured.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        self.graph.snapshot_path.as_ref().map(|raw| {
            let expanded = shellexpand::tilde(raw);
            PathBuf::from(expanded.as_ref())
        })
    }
}

/// Graph store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub backend: GraphBackend,
    /// JSON snapshot for the in-memory backend.
    pub snapshot_path: Option<String>,
    pub neo4j: Neo4jConfig,
    /// Maximum hops for the live shortest-path query.
    pub max_path_depth: usize,
    /// Timeout applied to each live query, in milliseconds.
    pub query_timeout_ms: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            backend: GraphBackend::Memory,
            snapshot_path: None,
            neo4j: Neo4jConfig::default(),
            max_path_depth: 10,
            query_timeout_ms: 5_000,
        }
    }
}

/// Graph backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    Memory,
    Neo4j,
}

/// Neo4j connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    /// Falls back to `KGQA_NEO4J_PASSWORD` when empty.
    pub password: String,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
        }
    }
}

impl Neo4jConfig {
    /// Password from the config, or from the environment when unset.
    pub fn resolved_password(&self) -> String {
        if self.password.is_empty() {
            std::env::var("KGQA_NEO4J_PASSWORD").unwrap_or_default()
        } else {
            self.password.clone()
        }
    }
}

/// Relationship cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Hot relation kinds materialized at startup.
    pub warm_relations: Vec<HotRelation>,
    /// Entries kept in the live path memo (0 disables it).
    pub path_memo_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            warm_relations: HotRelation::ALL.to_vec(),
            path_memo_capacity: 1_024,
        }
    }
}

/// Entity resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Shortest name variant accepted by containment matching.
    pub min_variant_len: usize,
    /// Longest token window tried by the mention extractor.
    pub max_window: usize,
    /// Extra stopwords on top of the built-in list.
    pub stopwords: Vec<String>,
    /// Generic organization words stripped to form short-name variants.
    pub organization_affixes: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_variant_len: 5,
            max_window: 5,
            stopwords: Vec::new(),
            organization_affixes: ["football club", "club", "fc", "association", "society"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Category-partitioned alias tables: alias -> canonical name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AliasConfig {
    pub person: BTreeMap<String, String>,
    pub organization: BTreeMap<String, String>,
    pub role: BTreeMap<String, String>,
    pub place: BTreeMap<String, String>,
    pub venue: BTreeMap<String, String>,
    pub event_category: BTreeMap<String, String>,
}

impl AliasConfig {
    /// Entries for one category.
    pub fn for_label(&self, label: EntityLabel) -> &BTreeMap<String, String> {
        match label {
            EntityLabel::Person => &self.person,
            EntityLabel::Organization => &self.organization,
            EntityLabel::Role => &self.role,
            EntityLabel::Place => &self.place,
            EntityLabel::Venue => &self.venue,
            EntityLabel::EventCategory => &self.event_category,
        }
    }
}
