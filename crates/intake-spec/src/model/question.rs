use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::rules::Rule;

/// Closed set of supported answer widgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Text,
    Textarea,
    Email,
    Phone,
    Number,
    Date,
    DatePicker,
    SingleChoice,
    MultipleChoice,
    Checkbox,
    FileUpload,
    PhotoUpload,
    PhotoGrid,
    Rating,
    Slider,
    PainScale,
    ToothChart,
    BudgetRange,
}

impl QuestionType {
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice | QuestionType::MultipleChoice | QuestionType::Checkbox
        )
    }

    pub fn is_upload(&self) -> bool {
        matches!(
            self,
            QuestionType::FileUpload | QuestionType::PhotoUpload | QuestionType::PhotoGrid
        )
    }

    pub fn is_scale(&self) -> bool {
        matches!(
            self,
            QuestionType::Rating | QuestionType::Slider | QuestionType::PainScale
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            QuestionType::Text => "text",
            QuestionType::Textarea => "textarea",
            QuestionType::Email => "email",
            QuestionType::Phone => "phone",
            QuestionType::Number => "number",
            QuestionType::Date => "date",
            QuestionType::DatePicker => "date_picker",
            QuestionType::SingleChoice => "single_choice",
            QuestionType::MultipleChoice => "multiple_choice",
            QuestionType::Checkbox => "checkbox",
            QuestionType::FileUpload => "file_upload",
            QuestionType::PhotoUpload => "photo_upload",
            QuestionType::PhotoGrid => "photo_grid",
            QuestionType::Rating => "rating",
            QuestionType::Slider => "slider",
            QuestionType::PainScale => "pain_scale",
            QuestionType::ToothChart => "tooth_chart",
            QuestionType::BudgetRange => "budget_range",
        }
    }
}

/// Broad MIME classes accepted by upload questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MimeCategory {
    Image,
    Document,
    Video,
}

impl MimeCategory {
    pub fn matches(&self, mime_type: &str) -> bool {
        match self {
            MimeCategory::Image => mime_type.starts_with("image/"),
            MimeCategory::Document => {
                mime_type.starts_with("application/") || mime_type.starts_with("text/")
            }
            MimeCategory::Video => mime_type.starts_with("video/"),
        }
    }
}

/// Choice sets and ranges presented by the widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QuestionOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    /// Localized tooth numbering; empty means the standard 1–32 scheme.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_teeth: Vec<u8>,
}

/// Per-question validation thresholds from the template author.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_selections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_selections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mime_categories: Vec<MimeCategory>,
}

/// Conditional requiredness plus free-form rendering hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DisplayLogic {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_if: Option<Rule>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub render_hints: Map<String, Value>,
}

/// One question of a questionnaire template.
///
/// A question without a `page_id` is orphaned: it exists in the template
/// record set but is excluded from any navigable flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Question {
    pub id: String,
    pub template_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_id: Option<String>,
    #[serde(default)]
    pub section: String,
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default)]
    pub options: QuestionOptions,
    #[serde(default)]
    pub validation_rules: ValidationRules,
    #[serde(default)]
    pub is_required: bool,
    /// Unique within the owning page.
    pub order_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional_logic: Option<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_logic: Option<DisplayLogic>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder_text: Option<String>,
}
