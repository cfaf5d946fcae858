mod common;

use common::*;

use chrono::Duration;

use intake_flow::{ResolveError, TemplateSelector, resolve_effective_template};
use intake_spec::{PageType, QuestionOverride, Rule};
use serde_json::json;

fn resolve(scenario: &Scenario) -> Result<intake_flow::EffectiveTemplate, ResolveError> {
    resolve_effective_template(
        "clinic-1",
        &TemplateSelector::Default,
        now(),
        &scenario.assignments,
        &scenario.templates,
        &scenario.pages,
        &scenario.questions,
    )
}

#[test]
fn resolution_is_deterministic() {
    let scenario = branching_scenario();
    let first = resolve(&scenario).unwrap();
    let second = resolve(&scenario).unwrap();
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
}

#[test]
fn two_live_defaults_are_ambiguous() {
    let mut scenario = branching_scenario();
    scenario
        .assignments
        .push(assignment("a2", "clinic-1", "t1", true));
    assert!(matches!(
        resolve(&scenario).unwrap_err(),
        ResolveError::AmbiguousDefault { clinic_id } if clinic_id == "clinic-1"
    ));
}

#[test]
fn no_matching_assignment_fails() {
    let scenario = branching_scenario();
    let err = resolve_effective_template(
        "clinic-2",
        &TemplateSelector::Default,
        now(),
        &scenario.assignments,
        &scenario.templates,
        &scenario.pages,
        &scenario.questions,
    )
    .unwrap_err();
    assert!(matches!(err, ResolveError::AssignmentNotFound { .. }));
}

#[test]
fn effective_window_is_half_open() {
    let mut scenario = branching_scenario();
    let assignment = &mut scenario.assignments[0];
    assignment.effective_from = Some(now());
    assignment.effective_until = Some(now() + Duration::hours(1));
    // from == now is included.
    assert!(resolve(&scenario).is_ok());

    let scenario_until = {
        let mut scenario = branching_scenario();
        scenario.assignments[0].effective_until = Some(now());
        scenario
    };
    // until == now is excluded.
    assert!(matches!(
        resolve(&scenario_until).unwrap_err(),
        ResolveError::AssignmentNotFound { .. }
    ));
}

#[test]
fn explicit_selector_prefers_non_default_assignment() {
    let mut scenario = branching_scenario();
    scenario.templates.push(template("t2"));
    scenario.pages.push(page("t2p1", "t2", 1, PageType::Standard));
    scenario
        .assignments
        .push(assignment("a2", "clinic-1", "t2", false));

    let resolved = resolve_effective_template(
        "clinic-1",
        &TemplateSelector::Explicit("t2".into()),
        now(),
        &scenario.assignments,
        &scenario.templates,
        &scenario.pages,
        &scenario.questions,
    )
    .unwrap();
    assert_eq!(resolved.assignment_id, "a2");
    assert_eq!(resolved.template.id, "t2");
}

#[test]
fn customization_removal_drops_question_from_snapshot() {
    // Scenario B: the clinic removes Q2, so page 3 never carries it.
    let mut scenario = branching_scenario();
    scenario.assignments[0]
        .customizations
        .removed_questions
        .push("q2".into());

    let resolved = resolve(&scenario).unwrap();
    assert!(resolved.question("q2").is_none());
    let page3 = resolved.page("p3").unwrap();
    assert!(page3.questions.is_empty());
}

#[test]
fn overrides_apply_before_removals() {
    let mut scenario = branching_scenario();
    let customizations = &mut scenario.assignments[0].customizations;
    customizations.question_overrides.insert(
        "q1".into(),
        QuestionOverride {
            question_text: Some("How can we help you?".into()),
            is_required: Some(false),
            ..Default::default()
        },
    );
    customizations.removed_pages.push("p3".into());

    let resolved = resolve(&scenario).unwrap();
    let q1 = resolved.question("q1").unwrap();
    assert_eq!(q1.question_text, "How can we help you?");
    assert!(!q1.is_required);
    assert!(resolved.page("p3").is_none());
    // Page numbers stay contiguous after the removal.
    let numbers: Vec<u32> = resolved
        .pages
        .iter()
        .map(|entry| entry.page.page_number)
        .collect();
    assert_eq!(numbers, vec![1, 2]);
}

#[test]
fn unknown_patch_target_is_rejected() {
    let mut scenario = branching_scenario();
    scenario.assignments[0]
        .customizations
        .removed_questions
        .push("missing".into());
    assert!(matches!(
        resolve(&scenario).unwrap_err(),
        ResolveError::InvalidCustomization { .. }
    ));
}

#[test]
fn added_question_requires_known_page_and_fresh_id() {
    let mut scenario = branching_scenario();
    let mut added = question("q3", "t1", "p2", 5);
    added.page_id = Some("nope".into());
    scenario.assignments[0]
        .customizations
        .added_questions
        .push(added);
    assert!(matches!(
        resolve(&scenario).unwrap_err(),
        ResolveError::InvalidCustomization { .. }
    ));

    let mut scenario = branching_scenario();
    scenario.assignments[0]
        .customizations
        .added_questions
        .push(question("q1", "t1", "p2", 5));
    assert!(matches!(
        resolve(&scenario).unwrap_err(),
        ResolveError::InvalidCustomization { .. }
    ));
}

#[test]
fn page_reorder_must_be_a_permutation() {
    let mut scenario = branching_scenario();
    scenario.assignments[0].customizations.page_order =
        vec!["p3".into(), "p1".into(), "p2".into()];
    let resolved = resolve(&scenario).unwrap();
    let ids: Vec<&str> = resolved
        .pages
        .iter()
        .map(|entry| entry.page.id.as_str())
        .collect();
    assert_eq!(ids, vec!["p3", "p1", "p2"]);

    let mut scenario = branching_scenario();
    scenario.assignments[0].customizations.page_order = vec!["p1".into()];
    assert!(matches!(
        resolve(&scenario).unwrap_err(),
        ResolveError::InvalidCustomization { .. }
    ));
}

#[test]
fn conditional_cycle_fails_resolution() {
    let mut scenario = branching_scenario();
    // q1 -> q2 while q2 -> q1 already exists in the fixture.
    scenario.questions[0].conditional_logic = Some(Rule::IsAnswered {
        question: "q2".into(),
    });
    assert!(matches!(
        resolve(&scenario).unwrap_err(),
        ResolveError::CyclicCondition { .. }
    ));
}

#[test]
fn rule_referencing_unknown_question_fails_resolution() {
    let mut scenario = branching_scenario();
    scenario.questions[1].conditional_logic = Some(Rule::Equals {
        question: "ghost".into(),
        value: json!("x"),
    });
    assert!(matches!(
        resolve(&scenario).unwrap_err(),
        ResolveError::UnknownReference { referenced, .. } if referenced == "ghost"
    ));
}

#[test]
fn orphaned_questions_are_excluded_but_listed() {
    let mut scenario = branching_scenario();
    let mut orphan = question("stray", "t1", "p2", 9);
    orphan.page_id = None;
    scenario.questions.push(orphan);

    let resolved = resolve(&scenario).unwrap();
    assert!(resolved.question("stray").is_none());
    assert_eq!(resolved.orphaned_questions, vec!["stray"]);
}

#[test]
fn inactive_template_is_an_integrity_error() {
    let mut scenario = branching_scenario();
    scenario.templates[0].is_active = false;
    assert!(matches!(
        resolve(&scenario).unwrap_err(),
        ResolveError::IntegrityViolation { .. }
    ));
}
