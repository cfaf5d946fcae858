mod common;

use common::*;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Value, json};

use intake_flow::{
    FlowError, Session, SessionOutcome, SessionStatus, TemplateSelector,
    resolve_effective_template,
};
use intake_spec::PageType;

fn start_session(scenario: &Scenario) -> Session {
    let resolved = resolve_effective_template(
        "clinic-1",
        &TemplateSelector::Default,
        now(),
        &scenario.assignments,
        &scenario.templates,
        &scenario.pages,
        &scenario.questions,
    )
    .unwrap();
    Session::start(Arc::new(resolved)).unwrap()
}

fn submission(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
    pairs
        .iter()
        .map(|(id, value)| (id.to_string(), value.clone()))
        .collect()
}

#[test]
fn session_starts_at_the_intro_page() {
    let session = start_session(&branching_scenario());
    assert_eq!(session.status(), SessionStatus::InProgress);
    assert_eq!(session.current_page().unwrap().page.id, "p1");
}

#[test]
fn page_three_is_hidden_until_its_dependency_holds() {
    let session = start_session(&branching_scenario());
    let visible: Vec<String> = session
        .visible_pages()
        .unwrap()
        .into_iter()
        .map(|summary| summary.id)
        .collect();
    // With no answers, Q2's condition is false and page 3 drops out.
    assert_eq!(visible, vec!["p1", "p2"]);
}

#[test]
fn answering_no_skips_the_conditional_page_and_completes() {
    // Scenario A, "no" branch.
    let mut session = start_session(&branching_scenario());
    assert!(matches!(
        session.submit_page(&submission(&[])).unwrap(),
        SessionOutcome::Advanced { next_page } if next_page == "p2"
    ));
    let outcome = session
        .submit_page(&submission(&[("q1", json!("no"))]))
        .unwrap();
    match outcome {
        SessionOutcome::Completed { final_answers } => {
            assert_eq!(final_answers.get("q1"), Some(&json!("no")));
        }
        other => panic!("expected completion, got {other:?}"),
    }
    assert_eq!(session.status(), SessionStatus::Completed);
}

#[test]
fn answering_yes_reveals_the_conditional_page() {
    // Scenario A, "yes" branch.
    let mut session = start_session(&branching_scenario());
    session.submit_page(&submission(&[])).unwrap();
    let outcome = session
        .submit_page(&submission(&[("q1", json!("yes"))]))
        .unwrap();
    assert!(matches!(
        outcome,
        SessionOutcome::Advanced { next_page } if next_page == "p3"
    ));
    assert_eq!(session.status(), SessionStatus::InProgress);
}

#[test]
fn missing_required_answer_rejects_without_advancing() {
    let mut session = start_session(&branching_scenario());
    session.submit_page(&submission(&[])).unwrap();
    let outcome = session.submit_page(&submission(&[])).unwrap();
    match outcome {
        SessionOutcome::Rejected { outcome } => {
            assert_eq!(outcome.missing_required, vec!["q1"]);
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    // Still on page 2; the failed submission committed nothing.
    assert_eq!(session.current_page().unwrap().page.id, "p2");
    assert!(session.answers().is_empty());
}

#[test]
fn go_back_restores_the_previous_page_and_keeps_answers() {
    let mut session = start_session(&branching_scenario());
    session.submit_page(&submission(&[])).unwrap();
    session
        .submit_page(&submission(&[("q1", json!("yes"))]))
        .unwrap();
    assert_eq!(session.current_page().unwrap().page.id, "p3");

    let restored = session.go_back().unwrap().page.id.clone();
    assert_eq!(restored, "p2");
    assert_eq!(session.answers().get("q1"), Some(&json!("yes")));
}

#[test]
fn go_back_is_blocked_when_the_page_forbids_it() {
    // Scenario C.
    let mut scenario = branching_scenario();
    scenario.pages[2].allow_back_navigation = false;
    let mut session = start_session(&scenario);
    session.submit_page(&submission(&[])).unwrap();
    session
        .submit_page(&submission(&[("q1", json!("yes"))]))
        .unwrap();

    let before_history = session.current_page().unwrap().page.id.clone();
    let err = session.go_back().unwrap_err();
    assert!(matches!(err, FlowError::NavigationBlocked { page_id } if page_id == "p3"));
    // Session state unchanged.
    assert_eq!(session.current_page().unwrap().page.id, before_history);
    assert_eq!(session.status(), SessionStatus::InProgress);
}

#[test]
fn closed_sessions_accept_no_mutation() {
    let mut session = start_session(&branching_scenario());
    session.submit_page(&submission(&[])).unwrap();
    session
        .submit_page(&submission(&[("q1", json!("no"))]))
        .unwrap();
    assert_eq!(session.status(), SessionStatus::Completed);

    assert!(matches!(
        session.submit_page(&submission(&[])).unwrap_err(),
        FlowError::SessionClosed { .. }
    ));
    assert!(matches!(
        session.go_back().unwrap_err(),
        FlowError::SessionClosed { .. }
    ));
}

#[test]
fn abandoned_sessions_stay_abandoned() {
    let mut session = start_session(&branching_scenario());
    session.abandon().unwrap();
    assert_eq!(session.status(), SessionStatus::Abandoned);
    assert!(matches!(
        session.submit_page(&submission(&[])).unwrap_err(),
        FlowError::SessionClosed { .. }
    ));
    assert!(matches!(
        session.abandon().unwrap_err(),
        FlowError::SessionClosed { .. }
    ));
}

#[test]
fn foreign_question_id_in_submission_is_rejected() {
    let mut session = start_session(&branching_scenario());
    session.submit_page(&submission(&[])).unwrap();
    let err = session
        .submit_page(&submission(&[("intruder", json!("x"))]))
        .unwrap_err();
    assert!(matches!(
        err,
        FlowError::ForeignAnswer { question_id, page_id }
            if question_id == "intruder" && page_id == "p2"
    ));
}

#[test]
fn answer_for_a_later_page_is_rejected_with_the_offending_page() {
    // q2 exists in the snapshot but lives on p3, not the current p2.
    let mut session = start_session(&branching_scenario());
    session.submit_page(&submission(&[])).unwrap();
    let err = session
        .submit_page(&submission(&[("q2", json!("early"))]))
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "question 'q2' is not on the current page 'p2'"
    );
}

#[test]
fn auto_advance_page_with_one_question_submits_on_answer() {
    let mut scenario = branching_scenario();
    scenario.pages[1].auto_advance = true;
    let mut session = start_session(&scenario);
    session.submit_page(&submission(&[])).unwrap();

    assert!(session.should_auto_advance().unwrap());
    let outcome = session.submit_answer("q1", json!("yes")).unwrap();
    assert!(matches!(
        outcome,
        SessionOutcome::Advanced { next_page } if next_page == "p3"
    ));
}

#[test]
fn emptied_page_is_skipped_entirely() {
    // Scenario B: removing Q2 empties page 3, and an empty standard page
    // drops out of the flow regardless of Q1's value.
    let mut scenario = branching_scenario();
    scenario.assignments[0]
        .customizations
        .removed_questions
        .push("q2".into());
    let mut session = start_session(&scenario);
    session.submit_page(&submission(&[])).unwrap();
    let outcome = session
        .submit_page(&submission(&[("q1", json!("yes"))]))
        .unwrap();
    assert!(matches!(outcome, SessionOutcome::Completed { .. }));
}

#[test]
fn summary_page_is_never_skipped_for_emptiness() {
    let mut scenario = branching_scenario();
    scenario.pages.push(page("p4", "t1", 4, PageType::Summary));
    let mut session = start_session(&scenario);
    session.submit_page(&submission(&[])).unwrap();
    let outcome = session
        .submit_page(&submission(&[("q1", json!("no"))]))
        .unwrap();
    assert!(matches!(
        outcome,
        SessionOutcome::Advanced { next_page } if next_page == "p4"
    ));
}

#[test]
fn completion_message_renders_with_answers() {
    let mut session = start_session(&branching_scenario());
    session.submit_page(&submission(&[])).unwrap();
    session
        .submit_page(&submission(&[("q1", json!("no"))]))
        .unwrap();
    let message = session.completion_message().unwrap().unwrap();
    assert_eq!(message, "Thank you no.");
}
