//! Configuration loading.

mod settings;

pub use settings::{
    AliasConfig, CacheConfig, Config, GraphBackend, GraphConfig, Neo4jConfig, ResolverConfig,
    MAX_PATH_DEPTH_LIMIT,
};
