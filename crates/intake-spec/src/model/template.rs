use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Versioned questionnaire definition as published by the template catalog.
///
/// A published template is immutable; edits create a new version or an
/// inactive draft. This core only ever reads templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub version: u32,
    #[serde(default)]
    pub is_active: bool,
    pub language: String,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub estimated_completion_minutes: u32,
    /// Free-form global configuration (branding keys, feature toggles).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub configuration: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub introduction_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_message: Option<String>,
}

/// Kind of page within a questionnaire flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Intro,
    Standard,
    PhotoUpload,
    Summary,
}

impl PageType {
    /// Intro and summary pages are structural: they stay in the flow even
    /// when every question on them is hidden.
    pub fn is_structural(&self) -> bool {
        matches!(self, PageType::Intro | PageType::Summary)
    }
}

/// Page-level validation applied when the whole page is submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PageValidationRules {
    /// Minimum number of visible questions that must carry an answer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_answered: Option<u32>,
}

/// One page of a questionnaire template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Page {
    pub id: String,
    pub template_id: String,
    /// 1-based, unique and contiguous within a template.
    pub page_number: u32,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instruction_text: Option<String>,
    pub page_type: PageType,
    #[serde(default)]
    pub validation_rules: PageValidationRules,
    #[serde(default)]
    pub show_progress: bool,
    #[serde(default)]
    pub allow_back_navigation: bool,
    #[serde(default)]
    pub auto_advance: bool,
}
