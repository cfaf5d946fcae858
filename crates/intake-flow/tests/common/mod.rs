#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde_json::json;

use intake_spec::{
    ClinicAssignment, Customizations, Page, PageType, PageValidationRules, Question,
    QuestionOptions, QuestionType, Rule, Template, ValidationRules,
};

pub fn now() -> DateTime<Utc> {
    "2026-08-01T09:00:00Z".parse().expect("timestamp")
}

pub fn template(id: &str) -> Template {
    Template {
        id: id.into(),
        name: format!("Template {id}"),
        description: None,
        version: 3,
        is_active: true,
        language: "en".into(),
        total_pages: 0,
        estimated_completion_minutes: 10,
        configuration: Default::default(),
        introduction_text: Some("Welcome to your intake.".into()),
        completion_message: Some("Thank you {{answers.q1}}.".into()),
    }
}

pub fn page(id: &str, template_id: &str, number: u32, page_type: PageType) -> Page {
    Page {
        id: id.into(),
        template_id: template_id.into(),
        page_number: number,
        title: format!("Page {number}"),
        description: None,
        instruction_text: None,
        page_type,
        validation_rules: PageValidationRules::default(),
        show_progress: true,
        allow_back_navigation: true,
        auto_advance: false,
    }
}

pub fn question(id: &str, template_id: &str, page_id: &str, order: u32) -> Question {
    Question {
        id: id.into(),
        template_id: template_id.into(),
        page_id: Some(page_id.into()),
        section: "general".into(),
        question_text: format!("Question {id}"),
        question_type: QuestionType::Text,
        options: QuestionOptions::default(),
        validation_rules: ValidationRules::default(),
        is_required: false,
        order_index: order,
        conditional_logic: None,
        display_logic: None,
        help_text: None,
        placeholder_text: None,
    }
}

pub fn assignment(id: &str, clinic_id: &str, template_id: &str, is_default: bool) -> ClinicAssignment {
    ClinicAssignment {
        id: id.into(),
        clinic_id: clinic_id.into(),
        template_id: template_id.into(),
        is_default,
        is_active: true,
        effective_from: None,
        effective_until: None,
        customizations: Customizations::default(),
    }
}

/// Scenario fixture: page 1 intro, page 2 with required text Q1, page 3
/// with Q2 visible only when Q1 == "yes".
pub struct Scenario {
    pub templates: Vec<Template>,
    pub pages: Vec<Page>,
    pub questions: Vec<Question>,
    pub assignments: Vec<ClinicAssignment>,
}

pub fn branching_scenario() -> Scenario {
    let template_id = "t1";
    let mut q1 = question("q1", template_id, "p2", 0);
    q1.is_required = true;
    let mut q2 = question("q2", template_id, "p3", 0);
    q2.conditional_logic = Some(Rule::Equals {
        question: "q1".into(),
        value: json!("yes"),
    });

    Scenario {
        templates: vec![template(template_id)],
        pages: vec![
            page("p1", template_id, 1, PageType::Intro),
            page("p2", template_id, 2, PageType::Standard),
            page("p3", template_id, 3, PageType::Standard),
        ],
        questions: vec![q1, q2],
        assignments: vec![assignment("a1", "clinic-1", template_id, true)],
    }
}
