//! Pure string rules used by entity resolution and traversal.
//!
//! Every function here works on plain strings with no shared state, so each
//! matching rule can be tested on its own.

use std::collections::HashSet;
use std::ops::Range;

/// Characters removed before tokenizing a question.
const PUNCTUATION: &[char] = &[
    '?', '!', '.', ',', ';', ':', '"', '(', ')', '[', ']', '{', '}', '“', '”',
];

/// Split text into tokens after stripping punctuation. Case is preserved.
pub fn tokenize(text: &str) -> Vec<String> {
    text.replace(PUNCTUATION, " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Lowercase, punctuation-free, single-spaced form used for all comparisons.
pub fn normalize(text: &str) -> String {
    tokenize(text)
        .iter()
        .map(|t| t.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Short references for a multi-part personal name.
///
/// Produces the full name, everything but the first part, the last part
/// alone, and the last two parts when the name has three or more parts.
/// Output is normalized and duplicate-free, longest forms first.
pub fn person_variants(name: &str) -> Vec<String> {
    let parts: Vec<String> = normalize(name).split(' ').map(str::to_string).collect();
    if parts.iter().all(String::is_empty) {
        return Vec::new();
    }

    let mut variants = vec![parts.join(" ")];
    if parts.len() >= 2 {
        variants.push(parts[1..].join(" "));
    }
    if parts.len() >= 3 {
        variants.push(parts[parts.len() - 2..].join(" "));
    }
    if parts.len() >= 2 {
        variants.push(parts[parts.len() - 1].clone());
    }
    dedup_in_order(variants)
}

/// Organization name plus forms with generic affixes ("FC", "Club") removed.
pub fn organization_variants(name: &str, affixes: &[String]) -> Vec<String> {
    let full = normalize(name);
    if full.is_empty() {
        return Vec::new();
    }

    let mut variants = vec![full.clone()];
    for affix in affixes.iter().map(|a| normalize(a)).filter(|a| !a.is_empty()) {
        if let Some(rest) = full.strip_prefix(&format!("{affix} ")) {
            variants.push(rest.trim().to_string());
        }
        if let Some(rest) = full.strip_suffix(&format!(" {affix}")) {
            variants.push(rest.trim().to_string());
        }
    }
    variants.retain(|v| !v.is_empty());
    dedup_in_order(variants)
}

fn dedup_in_order(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Byte range of the first occurrence of `needle` in `haystack` that sits on
/// word boundaries at both ends.
///
/// A boundary is the start/end of the string or a non-alphanumeric
/// character, so "anna" is not found inside "annabelle".
pub fn find_word_bounded(haystack: &str, needle: &str) -> Option<Range<usize>> {
    if needle.is_empty() {
        return None;
    }
    haystack.match_indices(needle).find_map(|(start, _)| {
        let end = start + needle.len();
        let before_ok = haystack[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = haystack[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        (before_ok && after_ok).then_some(start..end)
    })
}

/// Whether `needle` occurs in `haystack` on word boundaries.
pub fn contains_word_bounded(haystack: &str, needle: &str) -> bool {
    find_word_bounded(haystack, needle).is_some()
}

/// Case-insensitive three-way match: equal, `a` contains `b`, or `b`
/// contains `a`, with containment checked on word boundaries.
///
/// The same real entity is often stored under a formal name and mentioned
/// under a colloquial one, so an exact comparison is too strict.
pub fn names_match(a: &str, b: &str) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || contains_word_bounded(&a, &b) || contains_word_bounded(&b, &a)
}

/// Case-insensitive exact comparison after normalization.
pub fn names_equal(a: &str, b: &str) -> bool {
    let a = normalize(a);
    !a.is_empty() && a == normalize(b)
}

/// Shared-token ratio: |A ∩ B| / max(|A|, |B|) over normalized token sets.
pub fn token_overlap(a: &str, b: &str) -> f32 {
    let a_norm = normalize(a);
    let b_norm = normalize(b);
    let a_tokens: HashSet<&str> = a_norm.split(' ').filter(|t| !t.is_empty()).collect();
    let b_tokens: HashSet<&str> = b_norm.split(' ').filter(|t| !t.is_empty()).collect();
    let denominator = a_tokens.len().max(b_tokens.len());
    if denominator == 0 {
        return 0.0;
    }
    a_tokens.intersection(&b_tokens).count() as f32 / denominator as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_strips_punctuation() {
        assert_eq!(
            tokenize("Is Ada, (really) affiliated with OrgA?"),
            vec!["Is", "Ada", "really", "affiliated", "with", "OrgA"]
        );
        assert!(tokenize(" ?! ").is_empty());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  Nguyen   Quang HAI. "), "nguyen quang hai");
    }

    #[test]
    fn test_person_variants_three_parts() {
        assert_eq!(
            person_variants("Nguyen Quang Hai"),
            vec!["nguyen quang hai", "quang hai", "hai"]
        );
    }

    #[test]
    fn test_person_variants_four_parts() {
        assert_eq!(
            person_variants("Nguyen Van Toan Anh"),
            vec!["nguyen van toan anh", "van toan anh", "toan anh", "anh"]
        );
    }

    #[test]
    fn test_person_variants_short_names() {
        assert_eq!(person_variants("Pele"), vec!["pele"]);
        assert_eq!(person_variants("Ada Byron"), vec!["ada byron", "byron"]);
        assert!(person_variants("  ").is_empty());
    }

    #[test]
    fn test_organization_variants() {
        let affixes = vec!["FC".to_string(), "Football Club".to_string()];
        assert_eq!(
            organization_variants("Hanoi FC", &affixes),
            vec!["hanoi fc", "hanoi"]
        );
        assert_eq!(
            organization_variants("Football Club Saigon", &affixes),
            vec!["football club saigon", "saigon"]
        );
        assert_eq!(organization_variants("FC", &affixes), vec!["fc"]);
    }

    #[test]
    fn test_word_boundaries() {
        assert_eq!(find_word_bounded("did quang hai play", "quang hai"), Some(4..13));
        assert!(!contains_word_bounded("annabelle", "anna"));
        assert!(contains_word_bounded("anna-belle", "anna"));
        assert!(!contains_word_bounded("orgab", "orga"));
        // second occurrence is the bounded one
        assert_eq!(find_word_bounded("haiphong hai", "hai"), Some(9..12));
        assert!(!contains_word_bounded("anything", ""));
    }

    #[test]
    fn test_names_match_three_way() {
        assert!(names_match("OrgA", "orga"));
        assert!(names_match("Hanoi FC", "Hanoi"));
        assert!(names_match("Hanoi", "Hanoi FC"));
        assert!(!names_match("OrgA", "OrgAB"));
        assert!(!names_match("", "OrgA"));
    }

    #[test]
    fn test_token_overlap() {
        assert_eq!(token_overlap("Hoang Anh Gia Lai", "Gia Lai"), 0.5);
        assert_eq!(token_overlap("OrgX", "OrgA"), 0.0);
        assert_eq!(token_overlap("", ""), 0.0);
    }
}
