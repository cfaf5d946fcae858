pub mod assignment;
pub mod question;
pub mod template;

pub use assignment::{ClinicAssignment, Customizations, PageOverride, QuestionOverride};
pub use question::{
    DisplayLogic, MimeCategory, Question, QuestionOptions, QuestionType, ValidationRules,
};
pub use template::{Page, PageType, PageValidationRules, Template};
