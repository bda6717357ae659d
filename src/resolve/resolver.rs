//! Entity resolver.
//!
//! Resolves a text phrase to a canonical name. Rules are tried in order and
//! the first one that produces a match wins:
//!
//! 1. exact case-insensitive match against the canonical-name index
//! 2. exact match in the alias table
//! 3. organization aliases appearing inside the phrase
//! 4. name variants appearing inside the phrase on word boundaries
//!
//! Ties are broken by the longest matched text, then by the hinted category,
//! then by label order and canonical name.

use std::collections::HashMap;
use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::graph::{Entity, EntityLabel};
use crate::resolve::alias::AliasTable;
use crate::resolve::variants::{find_word_bounded, normalize, organization_variants, person_variants};

// ============================================================================
// Canonical Name Index
// ============================================================================

/// One canonical name with its precomputed variants.
#[derive(Debug, Clone)]
pub struct IndexedName {
    pub canonical_name: String,
    pub label: EntityLabel,
    pub normalized: String,
    /// Normalized variants, the full name included.
    pub variants: Vec<String>,
}

/// Index of every canonical name in the graph.
///
/// Entries are kept sorted by (label order, canonical name), which is the
/// final deterministic tie-break for ambiguous matches.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    entries: Vec<IndexedName>,
    by_normalized: HashMap<String, Vec<usize>>,
}

impl EntityIndex {
    /// Build the index, generating variants per label.
    pub fn build<'a>(
        entities: impl IntoIterator<Item = &'a Entity>,
        organization_affixes: &[String],
    ) -> Self {
        let mut entries: Vec<IndexedName> = entities
            .into_iter()
            .filter_map(|entity| {
                let normalized = normalize(&entity.canonical_name);
                if normalized.is_empty() {
                    return None;
                }
                let variants = match entity.label {
                    EntityLabel::Person => person_variants(&entity.canonical_name),
                    EntityLabel::Organization => {
                        organization_variants(&entity.canonical_name, organization_affixes)
                    }
                    _ => vec![normalized.clone()],
                };
                Some(IndexedName {
                    canonical_name: entity.canonical_name.clone(),
                    label: entity.label,
                    normalized,
                    variants,
                })
            })
            .collect();

        entries.sort_by(|a, b| {
            a.label
                .ordinal()
                .cmp(&b.label.ordinal())
                .then_with(|| a.canonical_name.cmp(&b.canonical_name))
        });
        entries.dedup_by(|a, b| a.label == b.label && a.canonical_name == b.canonical_name);

        let mut by_normalized: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, entry) in entries.iter().enumerate() {
            by_normalized
                .entry(entry.normalized.clone())
                .or_default()
                .push(position);
        }

        Self {
            entries,
            by_normalized,
        }
    }

    /// Whether a canonical name exists under any label.
    pub fn contains(&self, canonical_name: &str) -> bool {
        self.by_normalized.contains_key(&normalize(canonical_name))
    }

    /// The stored entry for a name, compared case-insensitively. The
    /// preferred label wins when the name exists under several labels.
    pub fn canonical(&self, name: &str, preferred: Option<EntityLabel>) -> Option<&IndexedName> {
        let positions = self.by_normalized.get(&normalize(name))?;
        positions
            .iter()
            .find(|&&p| Some(self.entries[p].label) == preferred)
            .or(positions.first())
            .map(|&p| &self.entries[p])
    }

    /// Label of a canonical name, first label in order when several match.
    pub fn label_of(&self, canonical_name: &str) -> Option<EntityLabel> {
        self.by_normalized
            .get(&normalize(canonical_name))
            .and_then(|positions| positions.first())
            .map(|&p| self.entries[p].label)
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexedName> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// Resolution Types
// ============================================================================

/// Which rule produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    Exact,
    Alias,
    OrganizationAlias,
    Variant,
    /// Short multi-token variant accepted only by the relaxed pass.
    RelaxedVariant,
}

/// A phrase resolved to a canonical entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub canonical_name: String,
    pub label: EntityLabel,
    pub method: MatchMethod,
    /// The normalized text that matched.
    pub matched: String,
    /// Byte span of `matched` within the normalized phrase.
    pub span: Range<usize>,
    /// More than one canonical name matched equally well.
    pub ambiguous: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VariantPolicy {
    Strict,
    Relaxed,
}

// ============================================================================
// Entity Resolver
// ============================================================================

/// Resolves phrases against the canonical-name index and alias table.
#[derive(Debug, Clone)]
pub struct EntityResolver {
    index: EntityIndex,
    aliases: AliasTable,
    min_variant_len: usize,
}

impl EntityResolver {
    pub fn new(index: EntityIndex, aliases: AliasTable, min_variant_len: usize) -> Self {
        Self {
            index,
            aliases,
            min_variant_len,
        }
    }

    pub fn index(&self) -> &EntityIndex {
        &self.index
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Resolve a phrase to its best canonical name.
    pub fn resolve(&self, phrase: &str, hint: Option<EntityLabel>) -> Option<Resolution> {
        self.resolve_with(phrase, hint, VariantPolicy::Strict)
    }

    /// Like [`resolve`](Self::resolve), but also accepts variants shorter
    /// than the minimum length as long as they span two or more tokens.
    pub fn resolve_relaxed(&self, phrase: &str, hint: Option<EntityLabel>) -> Option<Resolution> {
        self.resolve_with(phrase, hint, VariantPolicy::Relaxed)
    }

    fn resolve_with(
        &self,
        phrase: &str,
        hint: Option<EntityLabel>,
        policy: VariantPolicy,
    ) -> Option<Resolution> {
        let normalized = normalize(phrase);
        if normalized.is_empty() {
            return None;
        }

        self.match_exact(&normalized, hint)
            .or_else(|| self.match_alias(&normalized, hint))
            .or_else(|| self.match_organization_alias(&normalized, hint))
            .or_else(|| self.match_variant(&normalized, hint, policy))
    }

    fn match_exact(&self, normalized: &str, hint: Option<EntityLabel>) -> Option<Resolution> {
        let positions = self.index.by_normalized.get(normalized)?;
        let hinted: Vec<usize> = positions
            .iter()
            .copied()
            .filter(|&p| Some(self.index.entries[p].label) == hint)
            .collect();
        let chosen = hinted.first().or(positions.first()).copied()?;
        let ambiguous = if hinted.is_empty() {
            positions.len() > 1
        } else {
            hinted.len() > 1
        };

        let entry = &self.index.entries[chosen];
        Some(Resolution {
            canonical_name: entry.canonical_name.clone(),
            label: entry.label,
            method: MatchMethod::Exact,
            matched: normalized.to_string(),
            span: 0..normalized.len(),
            ambiguous,
        })
    }

    fn match_alias(&self, normalized: &str, hint: Option<EntityLabel>) -> Option<Resolution> {
        let (label, canonical) = self.aliases.lookup(normalized, hint)?;
        Some(Resolution {
            canonical_name: canonical.to_string(),
            label,
            method: MatchMethod::Alias,
            matched: normalized.to_string(),
            span: 0..normalized.len(),
            ambiguous: false,
        })
    }

    fn match_organization_alias(
        &self,
        normalized: &str,
        hint: Option<EntityLabel>,
    ) -> Option<Resolution> {
        if hint.is_some_and(|h| h != EntityLabel::Organization) {
            return None;
        }
        let (alias, canonical, span) = self.aliases.find_in(EntityLabel::Organization, normalized)?;
        Some(Resolution {
            canonical_name: canonical.to_string(),
            label: EntityLabel::Organization,
            method: MatchMethod::OrganizationAlias,
            matched: alias.to_string(),
            span,
            ambiguous: false,
        })
    }

    fn match_variant(
        &self,
        normalized: &str,
        hint: Option<EntityLabel>,
        policy: VariantPolicy,
    ) -> Option<Resolution> {
        // (matched chars, same category as hint, entry position, span, variant)
        let mut best: Option<(usize, bool, usize, Range<usize>, &str)> = None;
        let mut ambiguous = false;

        for (position, entry) in self.index.entries.iter().enumerate() {
            let same_category = Some(entry.label) == hint;
            let found = entry
                .variants
                .iter()
                .filter(|v| self.accepts(v, policy))
                .filter_map(|v| find_word_bounded(normalized, v).map(|span| (v.chars().count(), span, v.as_str())))
                .max_by_key(|(len, _, _)| *len);

            let Some((len, span, variant)) = found else {
                continue;
            };

            let current = best.as_ref().map(|(l, s, p, _, _)| ((*l, *s), *p));
            match current {
                Some((best_rank, _)) if (len, same_category) > best_rank => {
                    best = Some((len, same_category, position, span, variant));
                    ambiguous = false;
                }
                Some((best_rank, best_position)) => {
                    if (len, same_category) == best_rank
                        && self.index.entries[best_position].canonical_name != entry.canonical_name
                    {
                        ambiguous = true;
                    }
                }
                None => best = Some((len, same_category, position, span, variant)),
            }
        }

        let (_, _, position, span, variant) = best?;
        let entry = &self.index.entries[position];
        let short_variant = variant.chars().count() < self.min_variant_len;
        if ambiguous {
            tracing::debug!(
                "Ambiguous variant '{}' resolved to '{}' by tie-break",
                variant,
                entry.canonical_name
            );
        }
        Some(Resolution {
            canonical_name: entry.canonical_name.clone(),
            label: entry.label,
            method: if short_variant {
                MatchMethod::RelaxedVariant
            } else {
                MatchMethod::Variant
            },
            matched: variant.to_string(),
            span,
            ambiguous,
        })
    }

    fn accepts(&self, variant: &str, policy: VariantPolicy) -> bool {
        if variant.chars().count() >= self.min_variant_len {
            return true;
        }
        policy == VariantPolicy::Relaxed && variant.split(' ').count() >= 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_resolver() -> EntityResolver {
        let entities = vec![
            Entity::new(EntityLabel::Person, "Nguyen Quang Hai"),
            Entity::new(EntityLabel::Person, "Nguyen Van Toan"),
            Entity::new(EntityLabel::Person, "Le An"),
            Entity::new(EntityLabel::Person, "Bui Tien Dung"),
            Entity::new(EntityLabel::Person, "Tran Tien Dung"),
            Entity::new(EntityLabel::Organization, "Hanoi FC"),
            Entity::new(EntityLabel::Organization, "Hoang Anh Gia Lai"),
            Entity::new(EntityLabel::Place, "Hanoi"),
        ];
        let index = EntityIndex::build(&entities, &["FC".to_string()]);
        let mut aliases = AliasTable::new();
        aliases.insert(EntityLabel::Organization, "HAGL", "Hoang Anh Gia Lai");
        EntityResolver::new(index, aliases, 5)
    }

    #[test]
    fn test_exact_canonical_names_resolve_to_themselves() {
        let resolver = create_test_resolver();
        for entry in resolver.index().iter() {
            let resolved = resolver
                .resolve(&entry.canonical_name, Some(entry.label))
                .unwrap();
            assert_eq!(resolved.canonical_name, entry.canonical_name);
            assert_eq!(resolved.method, MatchMethod::Exact);
        }
    }

    #[test]
    fn test_exact_match_prefers_hint_then_label_order() {
        let resolver = create_test_resolver();
        let place = resolver.resolve("hanoi", Some(EntityLabel::Place)).unwrap();
        assert_eq!(place.label, EntityLabel::Place);

        // "hanoi" is an exact place name; the organization only matches it
        // through a variant, which is a later rule
        let unhinted = resolver.resolve("HANOI", None).unwrap();
        assert_eq!(unhinted.canonical_name, "Hanoi");
        assert_eq!(unhinted.method, MatchMethod::Exact);
    }

    #[test]
    fn test_canonical_lookup_returns_stored_spelling() {
        let resolver = create_test_resolver();
        let entry = resolver.index().canonical("hoang ANH gia lai", None).unwrap();
        assert_eq!(entry.canonical_name, "Hoang Anh Gia Lai");

        let place = resolver.index().canonical("HANOI", Some(EntityLabel::Place)).unwrap();
        assert_eq!(place.label, EntityLabel::Place);
        assert!(resolver.index().canonical("Ha Noi", None).is_none());
    }

    #[test]
    fn test_alias_resolution() {
        let resolver = create_test_resolver();
        let resolved = resolver.resolve("hagl", None).unwrap();
        assert_eq!(resolved.canonical_name, "Hoang Anh Gia Lai");
        assert_eq!(resolved.method, MatchMethod::Alias);
    }

    #[test]
    fn test_organization_alias_inside_phrase() {
        let resolver = create_test_resolver();
        let resolved = resolver.resolve("played for hagl", None).unwrap();
        assert_eq!(resolved.canonical_name, "Hoang Anh Gia Lai");
        assert_eq!(resolved.method, MatchMethod::OrganizationAlias);
        assert_eq!(resolved.span, 11..15);

        let blocked = resolver.resolve("played for hagl", Some(EntityLabel::Person));
        assert!(blocked.is_none());
    }

    #[test]
    fn test_variant_with_word_boundary() {
        let resolver = create_test_resolver();
        let resolved = resolver.resolve("did quang hai score", None).unwrap();
        assert_eq!(resolved.canonical_name, "Nguyen Quang Hai");
        assert_eq!(resolved.method, MatchMethod::Variant);
        assert_eq!(resolved.matched, "quang hai");
        assert_eq!(resolved.span, 4..13);

        assert!(resolver.resolve("quanghai", None).is_none());
    }

    #[test]
    fn test_short_fragments_rejected() {
        let resolver = create_test_resolver();
        // "hai" and "toan" are variants but shorter than five characters
        assert!(resolver.resolve("hai", None).is_none());
        assert!(resolver.resolve("toan", None).is_none());
    }

    #[test]
    fn test_longest_variant_wins() {
        let resolver = create_test_resolver();
        let resolved = resolver.resolve("nguyen van toan and quang hai", None).unwrap();
        assert_eq!(resolved.canonical_name, "Nguyen Van Toan");
        assert_eq!(resolved.matched, "nguyen van toan");
    }

    #[test]
    fn test_ambiguous_variant_is_flagged_and_deterministic() {
        let resolver = create_test_resolver();
        let first = resolver.resolve("tien dung", None).unwrap();
        let second = resolver.resolve("tien dung", None).unwrap();
        assert!(first.ambiguous);
        assert_eq!(first.canonical_name, "Bui Tien Dung");
        assert_eq!(first, second);
    }

    #[test]
    fn test_relaxed_accepts_short_multi_token_variants() {
        let resolver = create_test_resolver();
        // "le an" is the full name, so exact matching already finds it
        assert!(resolver.resolve("le an", None).is_some());
        // inside a longer phrase the 5-char name still passes the strict rule
        assert!(resolver.resolve("is le an here", None).is_some());

        let entities = vec![Entity::new(EntityLabel::Person, "Vu A")];
        let resolver =
            EntityResolver::new(EntityIndex::build(&entities, &[]), AliasTable::new(), 5);
        assert!(resolver.resolve("ask vu a now", None).is_none());
        let relaxed = resolver.resolve_relaxed("ask vu a now", None).unwrap();
        assert_eq!(relaxed.canonical_name, "Vu A");
        assert_eq!(relaxed.matched, "vu a");
        assert_eq!(relaxed.method, MatchMethod::RelaxedVariant);
    }

    #[test]
    fn test_empty_phrase() {
        let resolver = create_test_resolver();
        assert!(resolver.resolve("", None).is_none());
        assert!(resolver.resolve("?!", None).is_none());
    }
}
