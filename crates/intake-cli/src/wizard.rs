use std::fmt::Write;

use serde_json::Value;

use intake_flow::EffectivePage;
use intake_spec::{AnswerSet, Question, QuestionType, ValidationOutcome};

/// Controls which bits of state the wizard prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: page titles and prompts only.
    Clean,
    /// Verbose output: page flags, visible questions, error codes.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints pages, prompts, and outcomes as the session advances.
pub struct WizardPresenter {
    verbosity: Verbosity,
    show_answers_json: bool,
}

impl WizardPresenter {
    pub fn new(verbosity: Verbosity, show_answers_json: bool) -> Self {
        Self {
            verbosity,
            show_answers_json,
        }
    }

    pub fn show_intro(&self, template_name: &str, intro: Option<&str>) {
        println!("Questionnaire: {template_name}");
        if let Some(intro) = intro {
            println!("{intro}");
        }
    }

    pub fn show_page(&self, entry: &EffectivePage, position: usize, total: usize) {
        let page = &entry.page;
        if page.show_progress && total > 0 {
            println!("-- {} ({position}/{total})", page.title);
        } else {
            println!("-- {}", page.title);
        }
        if let Some(instruction) = &page.instruction_text {
            println!("{instruction}");
        }
        if self.verbosity.is_verbose() {
            let mut flags = Vec::new();
            if page.auto_advance {
                flags.push("auto-advance");
            }
            if !page.allow_back_navigation {
                flags.push("no-back");
            }
            if !flags.is_empty() {
                println!("   [{}]", flags.join(", "));
            }
        }
    }

    pub fn show_prompt(&self, question: &Question) {
        let mut line = question.question_text.clone();
        if question.is_required {
            line.push_str(" *");
        }
        if let Some(hint) = type_hint(question) {
            line.push(' ');
            line.push_str(&hint);
        }
        println!("{line}");
        if let Some(help) = &question.help_text {
            println!("  {help}");
        }
        if self.verbosity.is_verbose() && !question.options.choices.is_empty() {
            println!("  Choices: {}", question.options.choices.join(", "));
        }
    }

    pub fn show_rejection(&self, outcome: &ValidationOutcome) {
        eprintln!("The page could not be submitted:");
        for error in &outcome.errors {
            if self.verbosity.is_verbose() {
                eprintln!("  {}: {} [{}]", error.question_id, error.message, error.code);
            } else {
                eprintln!("  {}: {}", error.question_id, error.message);
            }
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.message);
        if let Some(expected) = &error.expected {
            eprintln!("  Expected: {expected}");
        }
    }

    pub fn show_completion(&self, answers: &AnswerSet, completion_message: Option<&str>) {
        println!("Questionnaire completed.");
        if let Some(message) = completion_message {
            println!("{message}");
        }
        match answers.to_cbor() {
            Ok(bytes) => println!("Answers (CBOR hex): {}", encode_hex(&bytes)),
            Err(err) => eprintln!("Failed to serialize answers to CBOR: {err}"),
        }
        if self.show_answers_json {
            match answers.to_json_pretty() {
                Ok(pretty) => println!("{pretty}"),
                Err(err) => eprintln!("Failed to serialize answers to JSON: {err}"),
            }
        }
    }
}

fn type_hint(question: &Question) -> Option<String> {
    match question.question_type {
        QuestionType::Number | QuestionType::Slider => Some("(number)".to_string()),
        QuestionType::Rating | QuestionType::PainScale => Some("(whole number)".to_string()),
        QuestionType::Date | QuestionType::DatePicker => Some("(YYYY-MM-DD)".to_string()),
        QuestionType::SingleChoice if !question.options.choices.is_empty() => {
            Some(format!("({})", question.options.choices.join("/")))
        }
        QuestionType::MultipleChoice | QuestionType::Checkbox => {
            Some("(comma-separated)".to_string())
        }
        QuestionType::ToothChart => Some("(comma-separated tooth numbers)".to_string()),
        QuestionType::BudgetRange => Some("(low-high)".to_string()),
        QuestionType::Email => Some("(email)".to_string()),
        QuestionType::Phone => Some("(phone)".to_string()),
        _ => None,
    }
}

/// Error produced when a typed answer cannot be parsed from the input line.
#[derive(Debug)]
pub struct AnswerParseError {
    pub message: String,
    pub expected: Option<String>,
}

impl AnswerParseError {
    fn new(message: impl Into<String>, expected: Option<String>) -> Self {
        Self {
            message: message.into(),
            expected,
        }
    }
}

/// Turns one input line into the JSON value shape the validator expects for
/// the question's type. An empty line means "no answer".
pub fn parse_answer(question: &Question, input: &str) -> Result<Option<Value>, AnswerParseError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    let value = match question.question_type {
        QuestionType::Text
        | QuestionType::Textarea
        | QuestionType::Email
        | QuestionType::Phone
        | QuestionType::Date
        | QuestionType::DatePicker
        | QuestionType::SingleChoice => Value::String(input.to_string()),
        QuestionType::Number
        | QuestionType::Rating
        | QuestionType::Slider
        | QuestionType::PainScale => {
            let number: f64 = input.parse().map_err(|_| {
                AnswerParseError::new(
                    format!("'{input}' is not a number"),
                    Some("a numeric value".into()),
                )
            })?;
            serde_json::Number::from_f64(number)
                .map(Value::Number)
                .ok_or_else(|| {
                    AnswerParseError::new("number is not representable", None)
                })?
        }
        QuestionType::MultipleChoice | QuestionType::Checkbox => Value::Array(
            input
                .split(',')
                .map(|item| Value::String(item.trim().to_string()))
                .collect(),
        ),
        QuestionType::ToothChart => {
            let mut teeth = Vec::new();
            for item in input.split(',') {
                let tooth: u64 = item.trim().parse().map_err(|_| {
                    AnswerParseError::new(
                        format!("'{}' is not a tooth number", item.trim()),
                        Some("comma-separated numbers, e.g. 14,15".into()),
                    )
                })?;
                teeth.push(Value::from(tooth));
            }
            Value::Array(teeth)
        }
        QuestionType::BudgetRange => {
            let (low, high) = input.split_once('-').ok_or_else(|| {
                AnswerParseError::new(
                    "budget range needs a low and a high value",
                    Some("low-high, e.g. 1000-5000".into()),
                )
            })?;
            let low: f64 = low.trim().parse().map_err(|_| {
                AnswerParseError::new("the low bound is not a number", None)
            })?;
            let high: f64 = high.trim().parse().map_err(|_| {
                AnswerParseError::new("the high bound is not a number", None)
            })?;
            serde_json::json!({ "low": low, "high": high })
        }
        QuestionType::FileUpload | QuestionType::PhotoUpload | QuestionType::PhotoGrid => {
            // The CLI carries descriptors only; uploads happen elsewhere.
            serde_json::from_str(input).map_err(|_| {
                AnswerParseError::new(
                    "file answers must be a JSON array of descriptors",
                    Some(r#"[{"name":"a.jpg","mime_type":"image/jpeg","size_bytes":1024}]"#.into()),
                )
            })?
        }
    };
    Ok(Some(value))
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        write!(&mut encoded, "{byte:02x}").expect("writing to string cannot fail");
    }
    encoded
}
