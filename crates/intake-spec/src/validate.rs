use chrono::NaiveDate;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::answers::AnswerSet;
use crate::model::question::{MimeCategory, Question, QuestionType};
use crate::model::template::PageValidationRules;
use crate::rules::RuleError;

/// One rejected answer, with a stable machine code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnswerError {
    pub question_id: String,
    pub code: String,
    pub message: String,
}

impl AnswerError {
    fn new(question: &Question, code: &str, message: impl Into<String>) -> Self {
        Self {
            question_id: question.id.clone(),
            code: code.into(),
            message: message.into(),
        }
    }
}

/// Result of validating one page submission. `valid` is true only when the
/// whole required set passed; nothing commits otherwise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<AnswerError>,
    pub missing_required: Vec<String>,
}

/// Configuration-integrity failures. These are fatal to the caller, not
/// per-answer rejections the patient can correct.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error("question '{question_id}' cannot be validated as {kind}: {reason}")]
    UnsupportedQuestionType {
        question_id: String,
        kind: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Condition(#[from] RuleError),
}

/// A question is required when its base flag is set or its
/// `display_logic.required_if` rule holds for the current answers.
pub fn resolve_required(question: &Question, answers: &AnswerSet) -> Result<bool, RuleError> {
    if question.is_required {
        return Ok(true);
    }
    match question
        .display_logic
        .as_ref()
        .and_then(|logic| logic.required_if.as_ref())
    {
        Some(rule) => rule.evaluate(answers),
        None => Ok(false),
    }
}

/// Validates every question of one page submission, collecting the full set
/// of per-question errors. `questions` must be the currently-visible
/// questions of the page; `answers` must already include the candidate
/// submission so conditional requiredness sees it.
pub fn validate_page(
    page_id: &str,
    questions: &[&Question],
    answers: &AnswerSet,
    page_rules: &PageValidationRules,
) -> Result<ValidationOutcome, ValidateError> {
    let mut errors = Vec::new();
    let mut missing_required = Vec::new();
    let mut answered = 0usize;

    for question in questions {
        let required = resolve_required(question, answers)?;
        let value = answers
            .get(&question.id)
            .filter(|value| !AnswerSet::is_blank(value));
        if value.is_some() {
            answered += 1;
        }
        match value {
            None if required => {
                missing_required.push(question.id.clone());
                errors.push(AnswerError::new(
                    question,
                    codes::REQUIRED,
                    "this question is required",
                ));
            }
            None => {}
            Some(value) => errors.extend(validate_answer(question, value)?),
        }
    }

    if let Some(min) = page_rules.min_answered
        && answered < min as usize
    {
        errors.push(AnswerError {
            question_id: page_id.to_string(),
            code: codes::MIN_ANSWERED.into(),
            message: format!("page needs at least {min} answered question(s)"),
        });
    }

    Ok(ValidationOutcome {
        valid: errors.is_empty() && missing_required.is_empty(),
        errors,
        missing_required,
    })
}

/// Stable error codes shared with collaborators.
pub mod codes {
    pub const REQUIRED: &str = "required";
    pub const MIN_ANSWERED: &str = "min_answered";
    pub const TYPE_MISMATCH: &str = "type_mismatch";
    pub const MIN_LENGTH: &str = "min_length";
    pub const MAX_LENGTH: &str = "max_length";
    pub const PATTERN_MISMATCH: &str = "pattern_mismatch";
    pub const INVALID_EMAIL: &str = "invalid_email";
    pub const INVALID_PHONE: &str = "invalid_phone";
    pub const MIN: &str = "min";
    pub const MAX: &str = "max";
    pub const STEP_MISMATCH: &str = "step_mismatch";
    pub const INVALID_DATE: &str = "invalid_date";
    pub const DATE_BEFORE_MIN: &str = "date_before_min";
    pub const DATE_AFTER_MAX: &str = "date_after_max";
    pub const OPTION_MISMATCH: &str = "option_mismatch";
    pub const MIN_SELECTIONS: &str = "min_selections";
    pub const MAX_SELECTIONS: &str = "max_selections";
    pub const MAX_FILES: &str = "max_files";
    pub const FILE_TOO_LARGE: &str = "file_too_large";
    pub const MIME_MISMATCH: &str = "mime_mismatch";
    pub const OUT_OF_SCALE: &str = "out_of_scale";
    pub const NOT_INTEGER: &str = "not_integer";
    pub const INVALID_TOOTH: &str = "invalid_tooth";
    pub const RANGE_INVERTED: &str = "range_inverted";
}

/// Checks one non-blank answer value against the question's type and rules.
pub fn validate_answer(
    question: &Question,
    value: &Value,
) -> Result<Vec<AnswerError>, ValidateError> {
    match question.question_type {
        QuestionType::Text | QuestionType::Textarea => check_text(question, value),
        QuestionType::Email => check_email(question, value),
        QuestionType::Phone => Ok(check_phone(question, value)),
        QuestionType::Number => Ok(check_number(question, value)),
        QuestionType::Date | QuestionType::DatePicker => Ok(check_date(question, value)),
        QuestionType::SingleChoice => check_single_choice(question, value),
        QuestionType::MultipleChoice | QuestionType::Checkbox => {
            check_multi_choice(question, value)
        }
        QuestionType::FileUpload | QuestionType::PhotoUpload | QuestionType::PhotoGrid => {
            Ok(check_upload(question, value))
        }
        QuestionType::Rating | QuestionType::Slider | QuestionType::PainScale => {
            check_scale(question, value)
        }
        QuestionType::ToothChart => Ok(check_tooth_chart(question, value)),
        QuestionType::BudgetRange => Ok(check_budget_range(question, value)),
    }
}

fn type_mismatch(question: &Question, expected: &str) -> Vec<AnswerError> {
    vec![AnswerError::new(
        question,
        codes::TYPE_MISMATCH,
        format!("expected {expected}"),
    )]
}

fn check_text(question: &Question, value: &Value) -> Result<Vec<AnswerError>, ValidateError> {
    let Some(text) = value.as_str() else {
        return Ok(type_mismatch(question, "a string"));
    };
    let rules = &question.validation_rules;
    let mut errors = Vec::new();
    let length = text.chars().count();
    if let Some(min) = rules.min_length
        && length < min
    {
        errors.push(AnswerError::new(
            question,
            codes::MIN_LENGTH,
            format!("needs at least {min} characters"),
        ));
    }
    if let Some(max) = rules.max_length
        && length > max
    {
        errors.push(AnswerError::new(
            question,
            codes::MAX_LENGTH,
            format!("allows at most {max} characters"),
        ));
    }
    if let Some(pattern) = &rules.pattern {
        // An uncompilable pattern is a configuration defect, never a
        // rule the answer silently satisfies.
        let regex =
            Regex::new(pattern).map_err(|err| ValidateError::UnsupportedQuestionType {
                question_id: question.id.clone(),
                kind: question.question_type.label(),
                reason: format!("pattern does not compile: {err}"),
            })?;
        if !regex.is_match(text) {
            errors.push(AnswerError::new(
                question,
                codes::PATTERN_MISMATCH,
                "value does not match the expected pattern",
            ));
        }
    }
    Ok(errors)
}

fn check_email(question: &Question, value: &Value) -> Result<Vec<AnswerError>, ValidateError> {
    let Some(text) = value.as_str() else {
        return Ok(type_mismatch(question, "a string"));
    };
    let mut errors = check_text(question, value)?;
    let plausible = match text.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !text.contains(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    };
    if !plausible {
        errors.push(AnswerError::new(
            question,
            codes::INVALID_EMAIL,
            "not a valid email address",
        ));
    }
    Ok(errors)
}

fn check_phone(question: &Question, value: &Value) -> Vec<AnswerError> {
    let Some(text) = value.as_str() else {
        return type_mismatch(question, "a string");
    };
    let mut digits = 0usize;
    let well_formed = text.chars().all(|ch| {
        if ch.is_ascii_digit() {
            digits += 1;
            true
        } else {
            matches!(ch, '+' | '-' | '(' | ')' | ' ')
        }
    });
    if !well_formed || !(7..=15).contains(&digits) {
        return vec![AnswerError::new(
            question,
            codes::INVALID_PHONE,
            "not a valid phone number",
        )];
    }
    Vec::new()
}

fn check_numeric_bounds(
    question: &Question,
    number: f64,
    min: Option<f64>,
    max: Option<f64>,
    step: Option<f64>,
) -> Vec<AnswerError> {
    let mut errors = Vec::new();
    if let Some(min) = min
        && number < min
    {
        errors.push(AnswerError::new(
            question,
            codes::MIN,
            format!("must be at least {min}"),
        ));
    }
    if let Some(max) = max
        && number > max
    {
        errors.push(AnswerError::new(
            question,
            codes::MAX,
            format!("must be at most {max}"),
        ));
    }
    if let Some(step) = step
        && step > 0.0
    {
        let origin = min.unwrap_or(0.0);
        let offset = (number - origin) / step;
        if (offset - offset.round()).abs() > 1e-9 {
            errors.push(AnswerError::new(
                question,
                codes::STEP_MISMATCH,
                format!("must be a multiple of {step} from {origin}"),
            ));
        }
    }
    errors
}

fn check_number(question: &Question, value: &Value) -> Vec<AnswerError> {
    let Some(number) = value.as_f64() else {
        return type_mismatch(question, "a number");
    };
    let rules = &question.validation_rules;
    check_numeric_bounds(question, number, rules.min, rules.max, rules.step)
}

fn check_date(question: &Question, value: &Value) -> Vec<AnswerError> {
    let Some(text) = value.as_str() else {
        return type_mismatch(question, "an ISO date string");
    };
    let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") else {
        return vec![AnswerError::new(
            question,
            codes::INVALID_DATE,
            "not a valid calendar date (expected YYYY-MM-DD)",
        )];
    };
    let rules = &question.validation_rules;
    let mut errors = Vec::new();
    if let Some(min) = rules.min_date
        && date < min
    {
        errors.push(AnswerError::new(
            question,
            codes::DATE_BEFORE_MIN,
            format!("date must not be before {min}"),
        ));
    }
    if let Some(max) = rules.max_date
        && date > max
    {
        errors.push(AnswerError::new(
            question,
            codes::DATE_AFTER_MAX,
            format!("date must not be after {max}"),
        ));
    }
    errors
}

fn declared_choices<'a>(question: &'a Question) -> Result<&'a [String], ValidateError> {
    if question.options.choices.is_empty() {
        return Err(ValidateError::UnsupportedQuestionType {
            question_id: question.id.clone(),
            kind: question.question_type.label(),
            reason: "choice question declares no options".into(),
        });
    }
    Ok(&question.options.choices)
}

fn check_single_choice(
    question: &Question,
    value: &Value,
) -> Result<Vec<AnswerError>, ValidateError> {
    let choices = declared_choices(question)?;
    let Some(text) = value.as_str() else {
        return Ok(type_mismatch(question, "a string"));
    };
    if !choices.iter().any(|choice| choice == text) {
        return Ok(vec![AnswerError::new(
            question,
            codes::OPTION_MISMATCH,
            format!("'{text}' is not one of the declared options"),
        )]);
    }
    Ok(Vec::new())
}

fn check_multi_choice(
    question: &Question,
    value: &Value,
) -> Result<Vec<AnswerError>, ValidateError> {
    let choices = declared_choices(question)?;
    let Some(items) = value.as_array() else {
        return Ok(type_mismatch(question, "an array of strings"));
    };
    let mut errors = Vec::new();
    for item in items {
        match item.as_str() {
            Some(text) if choices.iter().any(|choice| choice == text) => {}
            Some(text) => errors.push(AnswerError::new(
                question,
                codes::OPTION_MISMATCH,
                format!("'{text}' is not one of the declared options"),
            )),
            None => errors.push(AnswerError::new(
                question,
                codes::TYPE_MISMATCH,
                "selections must be strings",
            )),
        }
    }
    let rules = &question.validation_rules;
    if let Some(min) = rules.min_selections
        && items.len() < min
    {
        errors.push(AnswerError::new(
            question,
            codes::MIN_SELECTIONS,
            format!("select at least {min} option(s)"),
        ));
    }
    if let Some(max) = rules.max_selections
        && items.len() > max
    {
        errors.push(AnswerError::new(
            question,
            codes::MAX_SELECTIONS,
            format!("select at most {max} option(s)"),
        ));
    }
    Ok(errors)
}

/// Upload answers carry file descriptors, not bytes; the storage layer owns
/// the actual content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FileRef {
    pub name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

fn check_upload(question: &Question, value: &Value) -> Vec<AnswerError> {
    let Some(items) = value.as_array() else {
        return type_mismatch(question, "an array of file descriptors");
    };
    let rules = &question.validation_rules;
    let mut errors = Vec::new();
    if let Some(max) = rules.max_files
        && items.len() > max
    {
        errors.push(AnswerError::new(
            question,
            codes::MAX_FILES,
            format!("at most {max} file(s) allowed"),
        ));
    }
    // Photo question types only ever accept images, whatever the rules say.
    let photo_only = matches!(
        question.question_type,
        QuestionType::PhotoUpload | QuestionType::PhotoGrid
    );
    for item in items {
        let Ok(file) = serde_json::from_value::<FileRef>(item.clone()) else {
            errors.push(AnswerError::new(
                question,
                codes::TYPE_MISMATCH,
                "file entries need name, mime_type, and size_bytes",
            ));
            continue;
        };
        if let Some(limit) = rules.max_file_bytes
            && file.size_bytes > limit
        {
            errors.push(AnswerError::new(
                question,
                codes::FILE_TOO_LARGE,
                format!("'{}' exceeds {limit} bytes", file.name),
            ));
        }
        let category_ok = if photo_only {
            MimeCategory::Image.matches(&file.mime_type)
        } else if rules.mime_categories.is_empty() {
            true
        } else {
            rules
                .mime_categories
                .iter()
                .any(|category| category.matches(&file.mime_type))
        };
        if !category_ok {
            errors.push(AnswerError::new(
                question,
                codes::MIME_MISMATCH,
                format!("'{}' has unsupported type {}", file.name, file.mime_type),
            ));
        }
    }
    errors
}

/// Declared numeric range for a scale question, falling back to the
/// conventional defaults for rating (1–5) and pain scale (0–10). Sliders
/// must declare their range.
fn scale_bounds(question: &Question) -> Result<(f64, f64), ValidateError> {
    let declared_min = question.options.min.or(question.validation_rules.min);
    let declared_max = question.options.max.or(question.validation_rules.max);
    match (question.question_type, declared_min, declared_max) {
        (_, Some(min), Some(max)) => Ok((min, max)),
        (QuestionType::Rating, _, _) => Ok((1.0, 5.0)),
        (QuestionType::PainScale, _, _) => Ok((0.0, 10.0)),
        _ => Err(ValidateError::UnsupportedQuestionType {
            question_id: question.id.clone(),
            kind: question.question_type.label(),
            reason: "slider declares no numeric range".into(),
        }),
    }
}

fn check_scale(question: &Question, value: &Value) -> Result<Vec<AnswerError>, ValidateError> {
    let (min, max) = scale_bounds(question)?;
    let Some(number) = value.as_f64() else {
        return Ok(type_mismatch(question, "a number"));
    };
    let mut errors = Vec::new();
    if number < min || number > max {
        errors.push(AnswerError::new(
            question,
            codes::OUT_OF_SCALE,
            format!("must be between {min} and {max}"),
        ));
    }
    let discrete = matches!(
        question.question_type,
        QuestionType::Rating | QuestionType::PainScale
    );
    if discrete && number.fract() != 0.0 {
        errors.push(AnswerError::new(
            question,
            codes::NOT_INTEGER,
            "must be a whole number",
        ));
    }
    if let Some(step) = question.options.step.or(question.validation_rules.step)
        && step > 0.0
    {
        let offset = (number - min) / step;
        if (offset - offset.round()).abs() > 1e-9 {
            errors.push(AnswerError::new(
                question,
                codes::STEP_MISMATCH,
                format!("must be a multiple of {step} from {min}"),
            ));
        }
    }
    Ok(errors)
}

fn check_tooth_chart(question: &Question, value: &Value) -> Vec<AnswerError> {
    let Some(items) = value.as_array() else {
        return type_mismatch(question, "an array of tooth numbers");
    };
    let allowed = &question.options.allowed_teeth;
    let mut errors = Vec::new();
    for item in items {
        let valid = item.as_u64().is_some_and(|tooth| {
            if allowed.is_empty() {
                (1..=32).contains(&tooth)
            } else {
                u8::try_from(tooth).is_ok_and(|tooth| allowed.contains(&tooth))
            }
        });
        if !valid {
            errors.push(AnswerError::new(
                question,
                codes::INVALID_TOOTH,
                format!("{item} is not a valid tooth identifier"),
            ));
        }
    }
    errors
}

fn check_budget_range(question: &Question, value: &Value) -> Vec<AnswerError> {
    let (Some(low), Some(high)) = (
        value.get("low").and_then(Value::as_f64),
        value.get("high").and_then(Value::as_f64),
    ) else {
        return type_mismatch(question, "an object with numeric 'low' and 'high'");
    };
    let mut errors = Vec::new();
    if low > high {
        errors.push(AnswerError::new(
            question,
            codes::RANGE_INVERTED,
            "'low' must not exceed 'high'",
        ));
    }
    if let Some(floor) = question.options.min
        && low < floor
    {
        errors.push(AnswerError::new(
            question,
            codes::MIN,
            format!("'low' must be at least {floor}"),
        ));
    }
    if let Some(ceiling) = question.options.max
        && high > ceiling
    {
        errors.push(AnswerError::new(
            question,
            codes::MAX,
            format!("'high' must be at most {ceiling}"),
        ));
    }
    errors
}
