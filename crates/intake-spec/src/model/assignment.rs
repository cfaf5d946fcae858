use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::question::{Question, QuestionOptions, ValidationRules};

/// Links a clinic to a template version, with an effective-date window and
/// an optional customization patch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClinicAssignment {
    pub id: String,
    pub clinic_id: String,
    pub template_id: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_active: bool,
    /// Open end means unbounded; the window is `from <= now < until`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub customizations: Customizations,
}

impl ClinicAssignment {
    pub fn effective_at(&self, now: DateTime<Utc>) -> bool {
        let started = self.effective_from.is_none_or(|from| from <= now);
        let not_ended = self.effective_until.is_none_or(|until| now < until);
        started && not_ended
    }
}

/// Field overrides for one page, applied before structural edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PageOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_progress: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_back_navigation: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_advance: Option<bool>,
}

/// Field overrides for one question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<QuestionOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<ValidationRules>,
}

/// Clinic patch over a base template.
///
/// The resolver applies sections in a fixed order: overrides, then
/// additions, then removals, then reordering. Ids referenced anywhere in
/// the patch must exist at the point the section is applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Customizations {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub page_overrides: BTreeMap<String, PageOverride>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub question_overrides: BTreeMap<String, QuestionOverride>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub added_questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_pages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_questions: Vec<String>,
    /// Full permutation of the surviving page ids.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_order: Vec<String>,
    /// Page id to full permutation of its surviving question ids.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub question_order: BTreeMap<String, Vec<String>>,
}

impl Customizations {
    pub fn is_empty(&self) -> bool {
        self.page_overrides.is_empty()
            && self.question_overrides.is_empty()
            && self.added_questions.is_empty()
            && self.removed_pages.is_empty()
            && self.removed_questions.is_empty()
            && self.page_order.is_empty()
            && self.question_order.is_empty()
    }
}
