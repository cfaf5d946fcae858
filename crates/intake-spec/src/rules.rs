use std::collections::BTreeSet;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::answers::AnswerSet;

/// Rule tree used for `conditional_logic` (visibility) and
/// `display_logic.required_if` (requiredness).
///
/// Leaves compare one referenced question's answer against a literal
/// operand; compounds combine child rules. The operator set is closed so
/// evaluation is exhaustive and new operators are compile-time additions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Rule {
    Equals { question: String, value: Value },
    NotEquals { question: String, value: Value },
    In { question: String, values: Vec<Value> },
    NotIn { question: String, values: Vec<Value> },
    Contains { question: String, value: Value },
    GreaterThan { question: String, value: Value },
    LessThan { question: String, value: Value },
    Between { question: String, low: Value, high: Value },
    IsEmpty { question: String },
    IsAnswered { question: String },
    And { rules: Vec<Rule> },
    Or { rules: Vec<Rule> },
    Not { rule: Box<Rule> },
}

/// Raised for operand shapes the operator cannot consume.
#[derive(Debug, Error, PartialEq)]
pub enum RuleError {
    #[error("invalid condition on question '{question_id}': {reason}")]
    InvalidCondition { question_id: String, reason: String },
}

impl Rule {
    /// Evaluates the rule against a possibly partial answer set.
    ///
    /// A value comparison against an unanswered question is `false`;
    /// `is_empty` on an unanswered question is `true` and `is_answered` is
    /// `false`. This keeps dependent questions hidden until their
    /// dependency has a value.
    pub fn evaluate(&self, answers: &AnswerSet) -> Result<bool, RuleError> {
        match self {
            Rule::Equals { question, value } => {
                Ok(answered(answers, question).is_some_and(|answer| loose_eq(answer, value)))
            }
            Rule::NotEquals { question, value } => match answered(answers, question) {
                Some(answer) => Ok(!loose_eq(answer, value)),
                None => Ok(false),
            },
            Rule::In { question, values } => Ok(answered(answers, question)
                .is_some_and(|answer| values.iter().any(|value| loose_eq(answer, value)))),
            Rule::NotIn { question, values } => match answered(answers, question) {
                Some(answer) => Ok(!values.iter().any(|value| loose_eq(answer, value))),
                None => Ok(false),
            },
            Rule::Contains { question, value } => {
                Ok(answered(answers, question).is_some_and(|answer| contains(answer, value)))
            }
            Rule::GreaterThan { question, value } => {
                let operand = numeric_operand(question, value)?;
                Ok(answered_number(answers, question).is_some_and(|answer| answer > operand))
            }
            Rule::LessThan { question, value } => {
                let operand = numeric_operand(question, value)?;
                Ok(answered_number(answers, question).is_some_and(|answer| answer < operand))
            }
            Rule::Between {
                question,
                low,
                high,
            } => {
                let low = numeric_operand(question, low)?;
                let high = numeric_operand(question, high)?;
                Ok(answered_number(answers, question)
                    .is_some_and(|answer| answer >= low && answer <= high))
            }
            Rule::IsEmpty { question } => Ok(answered(answers, question).is_none()),
            Rule::IsAnswered { question } => Ok(answered(answers, question).is_some()),
            Rule::And { rules } => {
                for rule in rules {
                    if !rule.evaluate(answers)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Rule::Or { rules } => {
                for rule in rules {
                    if rule.evaluate(answers)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Rule::Not { rule } => Ok(!rule.evaluate(answers)?),
        }
    }

    /// Collects the ids of every question this rule reads. Used by the
    /// resolver to build the dependency graph for cycle detection.
    pub fn referenced_questions(&self, out: &mut BTreeSet<String>) {
        match self {
            Rule::Equals { question, .. }
            | Rule::NotEquals { question, .. }
            | Rule::In { question, .. }
            | Rule::NotIn { question, .. }
            | Rule::Contains { question, .. }
            | Rule::GreaterThan { question, .. }
            | Rule::LessThan { question, .. }
            | Rule::Between { question, .. }
            | Rule::IsEmpty { question }
            | Rule::IsAnswered { question } => {
                out.insert(question.clone());
            }
            Rule::And { rules } | Rule::Or { rules } => {
                for rule in rules {
                    rule.referenced_questions(out);
                }
            }
            Rule::Not { rule } => rule.referenced_questions(out),
        }
    }
}

/// Returns the answer only when it is present and non-blank.
fn answered<'a>(answers: &'a AnswerSet, question: &str) -> Option<&'a Value> {
    answers
        .get(question)
        .filter(|value| !AnswerSet::is_blank(value))
}

fn answered_number(answers: &AnswerSet, question: &str) -> Option<f64> {
    answered(answers, question).and_then(Value::as_f64)
}

fn numeric_operand(question: &str, value: &Value) -> Result<f64, RuleError> {
    value.as_f64().ok_or_else(|| RuleError::InvalidCondition {
        question_id: question.to_string(),
        reason: format!("ordering comparison needs a numeric operand, got {value}"),
    })
}

/// Equality that treats 1 and 1.0 as the same number.
fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

/// Substring on string answers, membership on array answers.
fn contains(answer: &Value, operand: &Value) -> bool {
    match answer {
        Value::String(text) => operand.as_str().is_some_and(|needle| text.contains(needle)),
        Value::Array(items) => items.iter().any(|item| loose_eq(item, operand)),
        _ => false,
    }
}
