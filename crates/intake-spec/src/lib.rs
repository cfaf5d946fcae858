#![allow(missing_docs)]

pub mod answers;
pub mod message;
pub mod model;
pub mod rules;
pub mod validate;

pub use answers::AnswerSet;
pub use message::{MessageError, render_message};
pub use model::{
    ClinicAssignment, Customizations, DisplayLogic, MimeCategory, Page, PageOverride, PageType,
    PageValidationRules, Question, QuestionOptions, QuestionOverride, QuestionType, Template,
    ValidationRules,
};
pub use rules::{Rule, RuleError};
pub use validate::{AnswerError, ValidateError, ValidationOutcome, validate_answer, validate_page};
