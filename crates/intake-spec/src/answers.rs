use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Mapping from question id to the submitted answer value.
///
/// The map is the session's single source of truth for what the patient has
/// entered so far; it only ever grows or has entries replaced, never removed
/// by navigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AnswerSet {
    values: BTreeMap<String, Value>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, question_id: &str) -> Option<&Value> {
        self.values.get(question_id)
    }

    pub fn insert(&mut self, question_id: impl Into<String>, value: Value) {
        self.values.insert(question_id.into(), value);
    }

    /// Merges a page submission into the set; incoming values replace
    /// existing ones for the same question.
    pub fn merge(&mut self, incoming: &BTreeMap<String, Value>) {
        for (id, value) in incoming {
            self.values.insert(id.clone(), value.clone());
        }
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.values.contains_key(question_id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// True when the stored value counts as "no answer": null, empty string,
    /// or empty array.
    pub fn is_blank(value: &Value) -> bool {
        match value {
            Value::Null => true,
            Value::String(text) => text.is_empty(),
            Value::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Compact export used for the finished response payload.
    pub fn to_cbor(&self) -> Result<Vec<u8>, serde_cbor::Error> {
        serde_cbor::to_vec(&self.values)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.values)
    }
}

impl From<BTreeMap<String, Value>> for AnswerSet {
    fn from(values: BTreeMap<String, Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, Value)> for AnswerSet {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
