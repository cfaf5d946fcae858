use handlebars::Handlebars;
use serde_json::json;
use thiserror::Error;

use crate::answers::AnswerSet;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("message template failed to render: {0}")]
    Render(#[from] handlebars::RenderError),
}

/// Renders an intro or completion message against the collected answers.
///
/// Placeholders use `{{answers.<question_id>}}`; unknown placeholders render
/// empty rather than failing, since message text is authored alongside
/// templates that clinics may customize.
pub fn render_message(text: &str, answers: &AnswerSet) -> Result<String, MessageError> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(false);
    Ok(registry.render_template(text, &json!({ "answers": answers }))?)
}
