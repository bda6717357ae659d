//! Mention extraction.
//!
//! Slides token windows over a question, longest first, and hands each
//! candidate phrase to the [`EntityResolver`]. A match is accepted only when
//! it covers the whole window. Tokens covered by an accepted match are
//! consumed, so a full name and one of its fragments can never be reported
//! as two different entities.

use std::collections::HashSet;
use std::ops::Range;

use crate::config::ResolverConfig;
use crate::graph::EntityLabel;
use crate::resolve::resolver::{EntityResolver, MatchMethod, Resolution};
use crate::resolve::variants::tokenize;

/// Words that never start a resolution on their own.
const BUILTIN_STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "am", "do", "does",
    "did", "has", "have", "had", "of", "in", "on", "at", "for", "with", "and", "or", "to",
    "from", "by", "as", "than", "both", "either", "neither", "not", "no", "yes", "true",
    "false", "it", "its", "this", "that", "these", "those", "he", "she", "they", "his", "her",
    "their", "who", "whom", "whose", "which", "what", "where", "when", "how", "why", "many",
    "much", "same", "share", "shared", "shares", "also", "ever", "once", "still",
    "affiliated", "played", "plays", "play", "member", "members", "teammate", "teammates",
    "born", "hometown", "coach", "coached", "coaches", "based", "organization",
    "organizations", "club", "clubs", "team", "teams", "person", "people", "player",
    "players", "place", "province", "city", "stadium", "venue", "league", "connected",
    "connection", "related", "relationship", "between", "count", "number", "total",
];

/// An entity mention found in a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mention {
    pub canonical_name: String,
    pub label: EntityLabel,
    /// Original-case tokens covered by the match.
    pub surface: String,
    /// Token positions covered by the match.
    pub tokens: Range<usize>,
    pub method: MatchMethod,
    pub ambiguous: bool,
}

/// Greedy longest-match-first mention extractor.
#[derive(Debug, Clone)]
pub struct MentionExtractor {
    stopwords: HashSet<String>,
    max_window: usize,
}

impl Default for MentionExtractor {
    fn default() -> Self {
        Self::new(5)
    }
}

impl MentionExtractor {
    /// Create an extractor with the built-in stopwords.
    pub fn new(max_window: usize) -> Self {
        Self {
            stopwords: BUILTIN_STOPWORDS.iter().map(|w| w.to_string()).collect(),
            max_window: max_window.max(1),
        }
    }

    /// Create an extractor from resolver settings.
    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.max_window).with_stopwords(config.stopwords.iter().cloned())
    }

    /// Add extra stopwords.
    pub fn with_stopwords(mut self, words: impl IntoIterator<Item = String>) -> Self {
        self.stopwords
            .extend(words.into_iter().map(|w| w.to_lowercase()));
        self
    }

    /// Extract mentions, longest first, without duplicates.
    ///
    /// Returns an empty list when nothing resolves.
    pub fn extract(&self, resolver: &EntityResolver, text: &str) -> Vec<Mention> {
        self.extract_at_least(resolver, text, 0)
    }

    /// Extract mentions, running a relaxed second pass over the unconsumed
    /// tokens when the strict pass finds fewer than `wanted` entities.
    pub fn extract_at_least(
        &self,
        resolver: &EntityResolver,
        text: &str,
        wanted: usize,
    ) -> Vec<Mention> {
        let tokens = tokenize(text);
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        let mut consumed = vec![false; tokens.len()];
        let mut mentions = Vec::new();

        self.scan(resolver, &tokens, &lowered, &mut consumed, &mut mentions, false);
        if mentions.len() < wanted {
            tracing::debug!(
                "Strict pass found {} of {} entities, trying relaxed variants",
                mentions.len(),
                wanted
            );
            self.scan(resolver, &tokens, &lowered, &mut consumed, &mut mentions, true);
        }
        mentions
    }

    fn scan(
        &self,
        resolver: &EntityResolver,
        tokens: &[String],
        lowered: &[String],
        consumed: &mut [bool],
        mentions: &mut Vec<Mention>,
        relaxed: bool,
    ) {
        let longest = self.max_window.min(tokens.len());
        for width in (1..=longest).rev() {
            for start in 0..=(tokens.len() - width) {
                let window = start..start + width;
                if consumed[window.clone()].iter().any(|&c| c) {
                    continue;
                }
                if lowered[window.clone()]
                    .iter()
                    .all(|t| self.stopwords.contains(t))
                {
                    continue;
                }

                let phrase = lowered[window.clone()].join(" ");
                let resolution = if relaxed {
                    resolver.resolve_relaxed(&phrase, None)
                } else {
                    resolver.resolve(&phrase, None)
                };
                let Some(resolution) = resolution else {
                    continue;
                };

                // a match inside a wider window is left to the sub-window
                // holding exactly those tokens, where exact names go first
                let covered = covered_tokens(&lowered[window.clone()], &resolution, start);
                if covered != window {
                    continue;
                }
                for flag in &mut consumed[covered.clone()] {
                    *flag = true;
                }

                if mentions
                    .iter()
                    .any(|m: &Mention| m.canonical_name == resolution.canonical_name)
                {
                    continue;
                }
                tracing::debug!(
                    "Resolved '{}' to '{}' via {:?}",
                    resolution.matched,
                    resolution.canonical_name,
                    resolution.method
                );
                mentions.push(Mention {
                    canonical_name: resolution.canonical_name,
                    label: resolution.label,
                    surface: tokens[covered.clone()].join(" "),
                    tokens: covered,
                    method: resolution.method,
                    ambiguous: resolution.ambiguous,
                });
            }
        }
    }
}

/// Map the byte span of a resolution back onto absolute token positions.
fn covered_tokens(window: &[String], resolution: &Resolution, start: usize) -> Range<usize> {
    let mut offset = 0;
    let mut first = None;
    let mut last = start;
    for (i, token) in window.iter().enumerate() {
        let end = offset + token.len();
        if offset < resolution.span.end && resolution.span.start < end {
            first.get_or_insert(start + i);
            last = start + i;
        }
        offset = end + 1;
    }
    match first {
        Some(first) => first..last + 1,
        None => start..start + window.len(),
    }
}
