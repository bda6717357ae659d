//! Behavioral properties that must hold for any question.

use kgqa::reasoning::{ReasoningIssue, Verdict};
use kgqa::resolve::MatchMethod;

use crate::common::create_test_engine;

const QUESTIONS: &[&str] = &[
    "Person1 is affiliated with OrgA.",
    "Person1 is affiliated with OrgC.",
    "Person1 and Person2 share an organization.",
    "Do Person1 and Person3 share the same hometown?",
    "Is Person3 connected to Person2?",
    "What about Person1 and OrgB?",
    "Is Zorblax affiliated with OrgA?",
    "",
    "?!?",
];

#[tokio::test]
async fn test_confidence_always_in_range() {
    let engine = create_test_engine().await;
    for question in QUESTIONS {
        let answer = engine.ask_boolean(question).await;
        assert!(
            (0.0..=1.0).contains(&answer.confidence),
            "confidence out of range for {question:?}"
        );
        assert_eq!(answer.chain.confidence, answer.confidence);
    }
}

#[tokio::test]
async fn test_repeated_questions_are_idempotent() {
    let engine = create_test_engine().await;
    for question in QUESTIONS {
        let first = engine.ask_boolean(question).await;
        let second = engine.ask_boolean(question).await;
        assert_eq!(first.verdict, second.verdict, "{question:?}");
        assert_eq!(first.confidence, second.confidence, "{question:?}");
        assert_eq!(first.evidence, second.evidence, "{question:?}");
    }
}

#[tokio::test]
async fn test_shared_relation_is_symmetric() {
    let engine = create_test_engine().await;
    let pairs = [("Person1", "Person2"), ("Person1", "Person3"), ("Person2", "Person3")];
    for (a, b) in pairs {
        for template in [
            "Do {a} and {b} share an organization?",
            "Do {a} and {b} share the same hometown?",
        ] {
            let forward = engine
                .ask_boolean(&template.replace("{a}", a).replace("{b}", b))
                .await;
            let backward = engine
                .ask_boolean(&template.replace("{a}", b).replace("{b}", a))
                .await;
            assert_eq!(forward.verdict, backward.verdict, "{a} / {b}: {template}");
            assert_eq!(forward.confidence, backward.confidence);
        }
    }
}

#[tokio::test]
async fn test_exact_match_never_below_fallback() {
    let engine = create_test_engine().await;
    let exact = engine.ask_boolean("Person1 is affiliated with OrgB.").await;
    let fallback = engine.ask_boolean("What about Person1 and OrgB?").await;

    assert_eq!(exact.verdict, Verdict::True);
    assert_eq!(fallback.verdict, Verdict::True);
    assert!(exact.confidence >= fallback.confidence);
}

#[tokio::test]
async fn test_unresolved_never_guesses_positive() {
    let engine = create_test_engine().await;
    for question in [
        "Is Zorblax affiliated with OrgA?",
        "Did Nobody play for Somewhere?",
        "Are Zorblax and Quux connected?",
        "",
    ] {
        let answer = engine.ask_boolean(question).await;
        assert_ne!(answer.verdict, Verdict::True, "{question:?}");
        assert!(answer.confidence <= 0.6, "{question:?}");
        assert!(answer.evidence.is_empty(), "{question:?}");
    }
}

#[tokio::test]
async fn test_canonical_names_resolve_to_themselves() {
    let engine = create_test_engine().await;
    let snapshot = engine.snapshot();
    for entry in snapshot.resolver.index().iter() {
        let resolved = snapshot
            .resolver
            .resolve(&entry.canonical_name, Some(entry.label))
            .unwrap();
        assert_eq!(resolved.canonical_name, entry.canonical_name);
        assert_eq!(resolved.method, MatchMethod::Exact);
    }
}

#[tokio::test]
async fn test_aliases_resolve_to_targets() {
    let engine = create_test_engine().await;
    let snapshot = engine.snapshot();
    for (label, alias, canonical) in snapshot.resolver.aliases().iter() {
        let resolved = snapshot.resolver.resolve(alias, Some(label)).unwrap();
        assert_eq!(resolved.canonical_name, canonical);
    }
}

#[tokio::test]
async fn test_full_name_and_fragment_are_one_entity() {
    let engine = create_test_engine().await;
    let answer = engine
        .ask_boolean("Did Nguyen Quang Hai, known as Quang Hai, play for HAGL?")
        .await;
    assert_eq!(answer.verdict, Verdict::True);
    assert!(answer.chain.steps[0].description.contains("Nguyen Quang Hai"));
    assert_eq!(answer.chain.steps[0].description.matches("->").count(), 2);
}

#[tokio::test]
async fn test_mcq_degenerate_inputs() {
    let engine = create_test_engine().await;

    let none: &[&str] = &[];
    let empty = engine.ask_mcq("Person1 affiliated with which org?", none).await;
    assert_eq!(empty.choice, "");
    assert_eq!(empty.index, None);
    assert_eq!(empty.confidence, 0.0);

    let unresolved = engine
        .ask_mcq("Which one?", &["OrgA", "OrgB", "OrgC", "Town"])
        .await;
    assert_eq!(unresolved.index, Some(0));
    assert_eq!(unresolved.confidence, 0.25);
    assert!(unresolved
        .chain
        .issues
        .iter()
        .any(|i| matches!(i, ReasoningIssue::UnresolvedEntity { .. })));
}

#[tokio::test]
async fn test_mcq_partial_overlap_scores_below_match() {
    let engine = create_test_engine().await;
    let answer = engine
        .ask_mcq(
            "Which club did Nguyen Quang Hai play for?",
            &["Hoang Anh Saigon", "OrgA"],
        )
        .await;
    // two of four tokens shared with "Hoang Anh Gia Lai"
    assert_eq!(answer.index, Some(0));
    assert!((answer.confidence - 0.25).abs() < 1e-6);
}
