use std::collections::BTreeMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use intake_spec::{
    AnswerSet, MessageError, PageType, Question, render_message, validate_page,
};

use crate::error::{FlowError, SessionOutcome};
use crate::resolver::{EffectivePage, EffectiveTemplate};

/// Lifecycle of one patient traversal. No transition leaves `Completed` or
/// `Abandoned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

/// Read-only view of a visible page, for navigation UIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PageSummary {
    pub id: String,
    pub page_number: u32,
    pub title: String,
    pub page_type: PageType,
    pub show_progress: bool,
    pub is_current: bool,
}

/// One patient's in-progress or finished traversal of an effective
/// template. The snapshot is shared immutably; all mutation happens through
/// the session's own methods.
#[derive(Debug, Clone)]
pub struct Session {
    template: Arc<EffectiveTemplate>,
    status: SessionStatus,
    current_page: Option<String>,
    visited: Vec<String>,
    answers: AnswerSet,
}

impl Session {
    /// Starts a session at the first page that has visible questions or is
    /// structural (intro/summary pages are never skipped for emptiness).
    /// A template with no presentable page at all completes immediately.
    pub fn start(template: Arc<EffectiveTemplate>) -> Result<Self, FlowError> {
        let mut session = Self {
            template,
            status: SessionStatus::NotStarted,
            current_page: None,
            visited: Vec::new(),
            answers: AnswerSet::new(),
        };
        let first = session.visible_page_ids()?.into_iter().next();
        match first {
            Some(page_id) => {
                info!(page_id = %page_id, "session started");
                session.current_page = Some(page_id);
                session.status = SessionStatus::InProgress;
            }
            None => {
                session.status = SessionStatus::Completed;
            }
        }
        Ok(session)
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn answers(&self) -> &AnswerSet {
        &self.answers
    }

    pub fn template(&self) -> &EffectiveTemplate {
        &self.template
    }

    pub fn current_page(&self) -> Option<&EffectivePage> {
        self.current_page
            .as_deref()
            .and_then(|page_id| self.template.page(page_id))
    }

    /// True when visibility holds for the question under the given answers.
    fn question_visible(question: &Question, answers: &AnswerSet) -> Result<bool, FlowError> {
        match &question.conditional_logic {
            Some(rule) => Ok(rule.evaluate(answers)?),
            None => Ok(true),
        }
    }

    /// A page stays in the flow when it is structural (intro/summary) or
    /// has at least one visible question. A standard page emptied of
    /// questions, by customization or by conditions, is skipped entirely.
    fn page_visible(entry: &EffectivePage, answers: &AnswerSet) -> Result<bool, FlowError> {
        if entry.page.page_type.is_structural() {
            return Ok(true);
        }
        for question in &entry.questions {
            if Self::question_visible(question, answers)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn visible_page_ids(&self) -> Result<Vec<String>, FlowError> {
        let mut ids = Vec::new();
        for entry in &self.template.pages {
            if Self::page_visible(entry, &self.answers)? {
                ids.push(entry.page.id.clone());
            }
        }
        Ok(ids)
    }

    /// Ordered subsequence of pages currently visible. Recomputed from the
    /// answers on every call; visibility is never cached across answer
    /// mutations.
    pub fn visible_pages(&self) -> Result<Vec<PageSummary>, FlowError> {
        let mut summaries = Vec::new();
        for entry in &self.template.pages {
            if Self::page_visible(entry, &self.answers)? {
                summaries.push(PageSummary {
                    id: entry.page.id.clone(),
                    page_number: entry.page.page_number,
                    title: entry.page.title.clone(),
                    page_type: entry.page.page_type,
                    show_progress: entry.page.show_progress,
                    is_current: self.current_page.as_deref() == Some(entry.page.id.as_str()),
                });
            }
        }
        Ok(summaries)
    }

    /// Currently visible questions of the current page.
    pub fn visible_questions(&self) -> Result<Vec<&Question>, FlowError> {
        let Some(entry) = self.current_page() else {
            return Ok(Vec::new());
        };
        let mut visible = Vec::new();
        for question in &entry.questions {
            if Self::question_visible(question, &self.answers)? {
                visible.push(question);
            }
        }
        Ok(visible)
    }

    /// True when a single valid answer should advance without an explicit
    /// page submission.
    pub fn should_auto_advance(&self) -> Result<bool, FlowError> {
        let Some(entry) = self.current_page() else {
            return Ok(false);
        };
        Ok(entry.page.auto_advance && self.visible_questions()?.len() == 1)
    }

    fn ensure_open(&self) -> Result<(), FlowError> {
        match self.status {
            SessionStatus::InProgress | SessionStatus::NotStarted => Ok(()),
            SessionStatus::Completed => Err(FlowError::SessionClosed {
                status: "completed",
            }),
            SessionStatus::Abandoned => Err(FlowError::SessionClosed {
                status: "abandoned",
            }),
        }
    }

    /// Validates and commits one page submission.
    ///
    /// Every currently-visible question on the current page is validated
    /// against the merged answers; on any failure the full per-question
    /// error set comes back and nothing commits. On success the answers
    /// merge, the page joins the visited history, and the session advances
    /// to the next visible page or completes.
    pub fn submit_page(
        &mut self,
        page_answers: &BTreeMap<String, Value>,
    ) -> Result<SessionOutcome, FlowError> {
        self.ensure_open()?;
        let current_id = self
            .current_page
            .clone()
            .ok_or_else(|| FlowError::NotFound {
                id: "<current page>".into(),
            })?;
        let entry = self
            .template
            .page(&current_id)
            .ok_or_else(|| FlowError::NotFound {
                id: current_id.clone(),
            })?;

        // Submissions may only answer questions that live on this page.
        for question_id in page_answers.keys() {
            if !entry
                .questions
                .iter()
                .any(|question| question.id == *question_id)
            {
                return Err(FlowError::ForeignAnswer {
                    question_id: question_id.clone(),
                    page_id: current_id.clone(),
                });
            }
        }

        // Merge into a scratch set first so conditional requiredness and
        // visibility see the candidate values before anything commits.
        let mut merged = self.answers.clone();
        merged.merge(page_answers);

        let mut visible = Vec::new();
        for question in &entry.questions {
            if Self::question_visible(question, &merged)? {
                visible.push(question);
            }
        }
        let outcome = validate_page(
            &entry.page.id,
            &visible,
            &merged,
            &entry.page.validation_rules,
        )?;
        if !outcome.valid {
            debug!(page_id = %current_id, errors = outcome.errors.len(), "page rejected");
            return Ok(SessionOutcome::Rejected { outcome });
        }

        self.answers = merged;
        self.visited.push(current_id.clone());

        let visible_ids = self.visible_page_ids()?;
        let current_index = self.template.page_index(&current_id).unwrap_or(0);
        let next = visible_ids.into_iter().find(|page_id| {
            self.template
                .page_index(page_id)
                .is_some_and(|index| index > current_index)
        });

        match next {
            Some(next_page) => {
                debug!(from = %current_id, to = %next_page, "page advanced");
                self.current_page = Some(next_page.clone());
                Ok(SessionOutcome::Advanced { next_page })
            }
            None => {
                info!(page_id = %current_id, "session completed");
                self.current_page = None;
                self.status = SessionStatus::Completed;
                Ok(SessionOutcome::Completed {
                    final_answers: self.answers.clone(),
                })
            }
        }
    }

    /// Single-answer submission path used by auto-advance pages. Same
    /// validation contract as [`Session::submit_page`].
    pub fn submit_answer(
        &mut self,
        question_id: &str,
        value: Value,
    ) -> Result<SessionOutcome, FlowError> {
        let submission = BTreeMap::from([(question_id.to_string(), value)]);
        self.submit_page(&submission)
    }

    /// Returns to the previously visited page. Answers are never discarded
    /// by navigating backward. The session is unchanged on failure.
    pub fn go_back(&mut self) -> Result<&EffectivePage, FlowError> {
        self.ensure_open()?;
        let entry = self.current_page().ok_or_else(|| FlowError::NotFound {
            id: "<current page>".into(),
        })?;
        if !entry.page.allow_back_navigation {
            return Err(FlowError::NavigationBlocked {
                page_id: entry.page.id.clone(),
            });
        }
        let page_id = entry.page.id.clone();
        let Some(previous) = self.visited.pop() else {
            return Err(FlowError::NavigationBlocked { page_id });
        };
        debug!(from = %page_id, to = %previous, "navigated back");
        self.current_page = Some(previous.clone());
        self.template
            .page(&previous)
            .ok_or(FlowError::NotFound { id: previous })
    }

    /// Cooperative termination; only valid while in progress.
    pub fn abandon(&mut self) -> Result<(), FlowError> {
        self.ensure_open()?;
        info!("session abandoned");
        self.status = SessionStatus::Abandoned;
        Ok(())
    }

    /// Introduction text with answer placeholders resolved.
    pub fn introduction_text(&self) -> Result<Option<String>, MessageError> {
        self.template
            .template
            .introduction_text
            .as_deref()
            .map(|text| render_message(text, &self.answers))
            .transpose()
    }

    /// Completion message with answer placeholders resolved.
    pub fn completion_message(&self) -> Result<Option<String>, MessageError> {
        self.template
            .template
            .completion_message
            .as_deref()
            .map(|text| render_message(text, &self.answers))
            .transpose()
    }
}
