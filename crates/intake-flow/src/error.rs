use thiserror::Error;

use intake_spec::{RuleError, ValidateError, ValidationOutcome};

/// Configuration-integrity failures surfaced before any session exists.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no active assignment matches clinic '{clinic_id}'")]
    AssignmentNotFound { clinic_id: String },
    #[error("clinic '{clinic_id}' has more than one active default assignment")]
    AmbiguousDefault { clinic_id: String },
    #[error("invalid customization: {detail}")]
    InvalidCustomization { detail: String },
    #[error("conditional logic cycle involving question '{question_id}'")]
    CyclicCondition { question_id: String },
    #[error("condition on question '{question_id}' references unknown question '{referenced}'")]
    UnknownReference {
        question_id: String,
        referenced: String,
    },
    #[error(transparent)]
    InvalidCondition(#[from] RuleError),
    #[error("template integrity violation: {detail}")]
    IntegrityViolation { detail: String },
}

/// Failures raised by session operations.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("session is {status} and accepts no further mutation")]
    SessionClosed { status: &'static str },
    #[error("page '{page_id}' does not allow back navigation")]
    NavigationBlocked { page_id: String },
    #[error("'{id}' is not part of the effective template")]
    NotFound { id: String },
    #[error("question '{question_id}' is not on the current page '{page_id}'")]
    ForeignAnswer {
        question_id: String,
        page_id: String,
    },
    #[error(transparent)]
    Condition(#[from] RuleError),
    #[error(transparent)]
    Unsupported(#[from] ValidateError),
}

/// Outcome of a page submission: advance, finish, or a full error set for
/// the page with no state committed.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Advanced { next_page: String },
    Completed { final_answers: intake_spec::AnswerSet },
    Rejected { outcome: ValidationOutcome },
}
