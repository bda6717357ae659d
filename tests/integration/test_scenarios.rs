//! End-to-end question scenarios.

use std::sync::Arc;

use kgqa::config::Config;
use kgqa::graph::{EntityLabel, RelationType};
use kgqa::reasoning::{ReasoningIssue, Verdict};

use crate::common::{create_engine_with, create_test_engine, create_test_graph};

#[tokio::test]
async fn test_single_relation_confirmed() {
    let engine = create_test_engine().await;
    let answer = engine.ask_boolean("Person1 is affiliated with OrgA.").await;

    assert_eq!(answer.verdict, Verdict::True);
    assert_eq!(answer.confidence, 0.95);
    assert!(answer
        .evidence
        .contains(&"Person1 is affiliated with OrgA".to_string()));
}

#[tokio::test]
async fn test_single_relation_refuted() {
    let engine = create_test_engine().await;
    let answer = engine.ask_boolean("Person1 is affiliated with OrgC.").await;

    assert_eq!(answer.verdict, Verdict::False);
    assert!(answer.confidence >= 0.85);
    // evidence lists what is actually known about Person1
    assert!(answer
        .evidence
        .contains(&"Person1 is affiliated with OrgB".to_string()));
}

#[tokio::test]
async fn test_shared_organization() {
    let engine = create_test_engine().await;
    let answer = engine
        .ask_boolean("Person1 and Person2 share an organization.")
        .await;

    assert_eq!(answer.verdict, Verdict::True);
    assert_eq!(answer.confidence, 0.95);
    assert!(answer.evidence.iter().any(|line| line.contains("OrgA")));
}

#[tokio::test]
async fn test_mcq_selects_true_option() {
    let engine = create_test_engine().await;
    let answer = engine
        .ask_mcq("Person1 affiliated with which org?", &["OrgA", "OrgX", "OrgY"])
        .await;

    assert_eq!(answer.choice, "OrgA");
    assert_eq!(answer.index, Some(0));
    assert!((answer.confidence - 1.0).abs() < f32::EPSILON);
    assert_eq!(answer.evidence, vec!["Person1 is affiliated with OrgA"]);
}

#[tokio::test]
async fn test_unknown_entity_is_low_confidence_negative() {
    let engine = create_test_engine().await;
    let answer = engine.ask_boolean("Is Zorblax affiliated with OrgA?").await;

    assert_ne!(answer.verdict, Verdict::True);
    assert!(answer.confidence <= 0.6);
    assert!(answer.evidence.is_empty());
    assert!(answer
        .chain
        .issues
        .iter()
        .any(|i| matches!(i, ReasoningIssue::UnresolvedEntity { found: 1, .. })));
}

#[tokio::test]
async fn test_mcq_option_labels_are_ignored() {
    let engine = create_test_engine().await;
    let answer = engine
        .ask_mcq(
            "Which organization is Person2 affiliated with?",
            &["A. OrgB", "B. OrgA", "C. OrgC"],
        )
        .await;

    assert_eq!(answer.choice, "B. OrgA");
    assert_eq!(answer.index, Some(1));
    assert_eq!(answer.confidence, 1.0);
}

#[tokio::test]
async fn test_mcq_alias_choice_matches_canonical_target() {
    let engine = create_test_engine().await;
    let answer = engine
        .ask_mcq(
            "Which club did Nguyen Quang Hai play for?",
            &["OrgA", "HAGL", "OrgC"],
        )
        .await;

    assert_eq!(answer.choice, "HAGL");
    assert_eq!(answer.confidence, 1.0);
}

#[tokio::test]
async fn test_mcq_teammates_use_two_hops() {
    let engine = create_test_engine().await;
    let answer = engine
        .ask_mcq(
            "Who was a teammate of Person2?",
            &["Person3", "Person1", "Coach1"],
        )
        .await;

    assert_eq!(answer.choice, "Person1");
    assert_eq!(answer.confidence, 1.0);
    assert!(answer
        .evidence
        .contains(&"Person1 is affiliated with OrgA".to_string()));
}

#[tokio::test]
async fn test_alias_and_name_fragment() {
    let engine = create_test_engine().await;
    let answer = engine.ask_boolean("Did Quang Hai play for HAGL?").await;

    assert_eq!(answer.verdict, Verdict::True);
    assert_eq!(answer.confidence, 0.95);
    assert_eq!(
        answer.evidence,
        vec!["Nguyen Quang Hai is affiliated with Hoang Anh Gia Lai"]
    );
}

#[tokio::test]
async fn test_birthplace_and_headquarters() {
    let engine = create_test_engine().await;

    let born = engine.ask_boolean("Was Person3 born in Harbor?").await;
    assert_eq!(born.verdict, Verdict::True);

    let based = engine.ask_boolean("Is OrgC based in Harbor?").await;
    assert_eq!(based.verdict, Verdict::False);
    assert_eq!(based.evidence, vec!["OrgC is based in Town"]);
}

#[tokio::test]
async fn test_coaching() {
    let engine = create_test_engine().await;
    let answer = engine.ask_boolean("Did Coach1 coach OrgA?").await;
    assert_eq!(answer.verdict, Verdict::True);
    assert_eq!(answer.evidence, vec!["Coach1 coached OrgA"]);
}

#[tokio::test]
async fn test_shared_hometown() {
    let engine = create_test_engine().await;

    let same = engine
        .ask_boolean("Do Person1 and Person2 share the same hometown?")
        .await;
    assert_eq!(same.verdict, Verdict::True);
    assert!(same.evidence.contains(&"Person2 comes from Town".to_string()));

    let different = engine
        .ask_boolean("Do Person1 and Person3 share the same hometown?")
        .await;
    assert_eq!(different.verdict, Verdict::False);
    assert_eq!(different.confidence, 0.85);
}

#[tokio::test]
async fn test_combined_organization_and_hometown() {
    let engine = create_test_engine().await;

    let both = engine
        .ask_boolean("Did Person1 and Person2 play for the same club and share the same hometown?")
        .await;
    assert_eq!(both.verdict, Verdict::True);
    assert_eq!(both.chain.steps.len(), 4);

    // same hometown, but no shared organization
    let one = engine
        .ask_boolean("Did Person1 and Person3 play for the same club and share the same hometown?")
        .await;
    assert_eq!(one.verdict, Verdict::False);
}

#[tokio::test]
async fn test_affiliated_in_hometown_of() {
    let engine = create_test_engine().await;
    let answer = engine
        .ask_boolean("Did Person3 play for a club in the hometown of Person1?")
        .await;

    assert_eq!(answer.verdict, Verdict::True);
    assert!(answer
        .evidence
        .contains(&"OrgC is based in Town".to_string()));
}

#[tokio::test]
async fn test_connection_uses_live_path() {
    let engine = create_test_engine().await;
    let answer = engine.ask_boolean("Is Person3 connected to Person2?").await;

    assert_eq!(answer.verdict, Verdict::True);
    assert_eq!(answer.confidence, 0.95);
    assert!(!answer.evidence.is_empty());
}

#[tokio::test]
async fn test_fallback_without_pattern() {
    let engine = create_test_engine().await;
    let answer = engine.ask_boolean("What about Person1 and OrgB?").await;

    assert_eq!(answer.verdict, Verdict::True);
    assert!((0.70..=0.90).contains(&answer.confidence));
    assert!(answer.chain.issues.contains(&ReasoningIssue::NoPatternMatched));
}

#[tokio::test]
async fn test_reasoning_chain_text() {
    let engine = create_test_engine().await;
    let answer = engine.ask_boolean("Person1 is affiliated with OrgA.").await;
    let text = answer.chain.to_text();

    assert!(text.starts_with("Question: Person1 is affiliated with OrgA."));
    assert!(text.contains("Query type: one hop"));
    assert!(text.ends_with("Answer: Yes (confidence 0.95)"));
}

#[tokio::test]
async fn test_place_name_shadowed_by_club_variant() {
    let store = create_test_graph()
        .entity(EntityLabel::Person, "Person4")
        .entity(EntityLabel::Place, "Hanoi")
        .entity(EntityLabel::Organization, "Hanoi FC")
        .relate("Person4", RelationType::BornIn, "Hanoi")
        .build()
        .unwrap();
    let engine = create_engine_with(Arc::new(store), Config::default()).await;

    let answer = engine.ask_boolean("Was Person4 born in Hanoi?").await;
    assert_eq!(answer.verdict, Verdict::True);
    assert_eq!(answer.confidence, 0.95);
    assert_eq!(answer.evidence, vec!["Person4 was born in Hanoi"]);
    assert!(answer.chain.issues.is_empty());
}

#[tokio::test]
async fn test_config_alias_target_in_other_case() {
    let store = create_test_graph()
        .entity(EntityLabel::Place, "Pleiku")
        .relate("Hoang Anh Gia Lai", RelationType::BasedIn, "Pleiku")
        .build()
        .unwrap();
    let mut config = Config::default();
    config
        .aliases
        .organization
        .insert("HAGL".into(), "hoang anh gia lai".into());
    let engine = create_engine_with(Arc::new(store), config).await;

    let answer = engine.ask_boolean("Is HAGL based in Pleiku?").await;
    assert_eq!(answer.verdict, Verdict::True);
    assert_eq!(answer.confidence, 0.95);
    assert_eq!(answer.evidence, vec!["Hoang Anh Gia Lai is based in Pleiku"]);
}
