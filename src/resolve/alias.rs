//! Category-partitioned alias table.

use std::collections::BTreeMap;

use crate::config::AliasConfig;
use crate::graph::{Entity, EntityLabel};
use crate::resolve::variants::{find_word_bounded, normalize};

/// Maps normalized short names and abbreviations to canonical names.
///
/// Built once at startup and never modified afterward. Each category keeps
/// its own map, so "Hanoi" can mean a place in one partition and an
/// organization in another.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    partitions: BTreeMap<EntityLabel, BTreeMap<String, String>>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configured aliases.
    pub fn from_config(config: &AliasConfig) -> Self {
        let mut table = Self::new();
        for label in EntityLabel::ALL {
            for (alias, canonical) in config.for_label(label) {
                table.insert(label, alias, canonical);
            }
        }
        table
    }

    /// Add the aliases declared on graph entities.
    ///
    /// Configured aliases win over graph-declared ones for the same key.
    pub fn extend_from_entities<'a>(&mut self, entities: impl IntoIterator<Item = &'a Entity>) {
        for entity in entities {
            for alias in &entity.aliases {
                let key = normalize(alias);
                if key.is_empty() {
                    continue;
                }
                self.partitions
                    .entry(entity.label)
                    .or_default()
                    .entry(key)
                    .or_insert_with(|| entity.canonical_name.clone());
            }
        }
    }

    /// Insert or replace one alias.
    pub fn insert(&mut self, label: EntityLabel, alias: &str, canonical: &str) {
        let key = normalize(alias);
        if key.is_empty() {
            return;
        }
        self.partitions
            .entry(label)
            .or_default()
            .insert(key, canonical.to_string());
    }

    /// Exact alias lookup.
    ///
    /// The hinted category is consulted first, then every category in
    /// [`EntityLabel::ALL`] order.
    pub fn lookup(&self, alias: &str, hint: Option<EntityLabel>) -> Option<(EntityLabel, &str)> {
        let key = normalize(alias);
        if key.is_empty() {
            return None;
        }
        hint.into_iter()
            .chain(EntityLabel::ALL)
            .find_map(|label| {
                self.partitions
                    .get(&label)
                    .and_then(|p| p.get(&key))
                    .map(|canonical| (label, canonical.as_str()))
            })
    }

    /// Longest alias of one category appearing on word boundaries in `phrase`.
    ///
    /// `phrase` must already be normalized. Returns the alias, its canonical
    /// name, and the byte span it covers. Equal-length aliases are decided by
    /// alphabetical order.
    pub fn find_in(
        &self,
        label: EntityLabel,
        phrase: &str,
    ) -> Option<(&str, &str, std::ops::Range<usize>)> {
        let partition = self.partitions.get(&label)?;
        partition
            .iter()
            .filter_map(|(alias, canonical)| {
                find_word_bounded(phrase, alias).map(|span| (alias.as_str(), canonical.as_str(), span))
            })
            .min_by_key(|(alias, _, _)| std::cmp::Reverse(alias.len()))
    }

    /// All (label, alias, canonical) entries in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityLabel, &str, &str)> {
        self.partitions.iter().flat_map(|(label, partition)| {
            partition
                .iter()
                .map(move |(alias, canonical)| (*label, alias.as_str(), canonical.as_str()))
        })
    }

    pub fn len(&self) -> usize {
        self.partitions.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
