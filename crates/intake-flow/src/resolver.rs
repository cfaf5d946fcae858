use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use intake_spec::{ClinicAssignment, Customizations, Page, Question, Template};

use crate::error::ResolveError;

/// How the caller picks a template for a clinic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSelector {
    /// Use the clinic's single active default assignment.
    Default,
    /// Use the assignment for this template id.
    Explicit(String),
}

/// One page of the resolved snapshot with its questions in display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EffectivePage {
    pub page: Page,
    pub questions: Vec<Question>,
}

/// Immutable clinic-and-time-resolved merge of a base template with its
/// applicable customization patch. Never mutated after resolution; clinic
/// edits mid-session cannot reach an in-flight session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EffectiveTemplate {
    pub template: Template,
    pub clinic_id: String,
    pub assignment_id: String,
    pub resolved_at: DateTime<Utc>,
    pub pages: Vec<EffectivePage>,
    /// Questions with no page assignment; excluded from any navigable flow
    /// but kept here so callers can audit them.
    pub orphaned_questions: Vec<String>,
}

impl EffectiveTemplate {
    pub fn page(&self, page_id: &str) -> Option<&EffectivePage> {
        self.pages.iter().find(|entry| entry.page.id == page_id)
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.pages
            .iter()
            .flat_map(|entry| entry.questions.iter())
            .find(|question| question.id == question_id)
    }

    pub fn page_index(&self, page_id: &str) -> Option<usize> {
        self.pages.iter().position(|entry| entry.page.id == page_id)
    }
}

/// Resolves the effective template for a clinic at a point in time.
///
/// Deterministic: the same records, selector, and timestamp always produce
/// an identical snapshot. All failure modes are configuration problems the
/// caller must surface before any session exists.
pub fn resolve_effective_template(
    clinic_id: &str,
    selector: &TemplateSelector,
    now: DateTime<Utc>,
    assignments: &[ClinicAssignment],
    templates: &[Template],
    pages: &[Page],
    questions: &[Question],
) -> Result<EffectiveTemplate, ResolveError> {
    let assignment = select_assignment(clinic_id, selector, now, assignments)?;

    let template = templates
        .iter()
        .find(|template| template.id == assignment.template_id)
        .ok_or_else(|| ResolveError::IntegrityViolation {
            detail: format!(
                "assignment '{}' references missing template '{}'",
                assignment.id, assignment.template_id
            ),
        })?;
    if !template.is_active {
        return Err(ResolveError::IntegrityViolation {
            detail: format!("template '{}' is not active", template.id),
        });
    }

    let mut effective_pages = collect_base_pages(template, pages, questions)?;
    let mut orphaned: Vec<String> = questions
        .iter()
        .filter(|question| question.template_id == template.id && question.page_id.is_none())
        .map(|question| question.id.clone())
        .collect();
    orphaned.sort();

    apply_customizations(&mut effective_pages, &mut orphaned, &assignment.customizations)?;
    renumber(&mut effective_pages);
    check_condition_graph(&effective_pages)?;

    let mut template = template.clone();
    template.total_pages = effective_pages.len() as u32;

    debug!(
        clinic_id,
        template_id = %template.id,
        assignment_id = %assignment.id,
        pages = effective_pages.len(),
        "resolved effective template"
    );

    Ok(EffectiveTemplate {
        template,
        clinic_id: clinic_id.to_string(),
        assignment_id: assignment.id.clone(),
        resolved_at: now,
        pages: effective_pages,
        orphaned_questions: orphaned,
    })
}

fn select_assignment<'a>(
    clinic_id: &str,
    selector: &TemplateSelector,
    now: DateTime<Utc>,
    assignments: &'a [ClinicAssignment],
) -> Result<&'a ClinicAssignment, ResolveError> {
    let mut candidates: Vec<&ClinicAssignment> = assignments
        .iter()
        .filter(|assignment| {
            assignment.clinic_id == clinic_id
                && assignment.is_active
                && assignment.effective_at(now)
        })
        .collect();
    candidates.sort_by(|a, b| a.id.cmp(&b.id));

    // Two live defaults is a data-integrity problem that must be surfaced,
    // never silently tie-broken.
    let defaults: Vec<&&ClinicAssignment> = candidates
        .iter()
        .filter(|assignment| assignment.is_default)
        .collect();
    if defaults.len() > 1 {
        return Err(ResolveError::AmbiguousDefault {
            clinic_id: clinic_id.to_string(),
        });
    }

    let selected = match selector {
        TemplateSelector::Explicit(template_id) => {
            let mut matching: Vec<&&ClinicAssignment> = candidates
                .iter()
                .filter(|assignment| assignment.template_id == *template_id)
                .collect();
            matching.sort_by_key(|assignment| assignment.is_default);
            matching.first().map(|assignment| **assignment)
        }
        TemplateSelector::Default => defaults.first().map(|assignment| **assignment),
    };

    selected.ok_or_else(|| ResolveError::AssignmentNotFound {
        clinic_id: clinic_id.to_string(),
    })
}

fn collect_base_pages(
    template: &Template,
    pages: &[Page],
    questions: &[Question],
) -> Result<Vec<EffectivePage>, ResolveError> {
    let mut base: Vec<Page> = pages
        .iter()
        .filter(|page| page.template_id == template.id)
        .cloned()
        .collect();
    base.sort_by_key(|page| page.page_number);

    for (index, page) in base.iter().enumerate() {
        let expected = index as u32 + 1;
        if page.page_number != expected {
            return Err(ResolveError::IntegrityViolation {
                detail: format!(
                    "page numbers of template '{}' are not contiguous (expected {expected}, found {})",
                    template.id, page.page_number
                ),
            });
        }
    }

    let page_ids: BTreeSet<&str> = base.iter().map(|page| page.id.as_str()).collect();
    let mut by_page: BTreeMap<String, Vec<Question>> = BTreeMap::new();
    for question in questions {
        if question.template_id != template.id {
            continue;
        }
        match &question.page_id {
            Some(page_id) if page_ids.contains(page_id.as_str()) => {
                by_page.entry(page_id.clone()).or_default().push(question.clone());
            }
            Some(page_id) => {
                return Err(ResolveError::IntegrityViolation {
                    detail: format!(
                        "question '{}' references unknown page '{page_id}'",
                        question.id
                    ),
                });
            }
            None => {}
        }
    }

    let mut effective = Vec::with_capacity(base.len());
    for page in base {
        let mut page_questions = by_page.remove(&page.id).unwrap_or_default();
        page_questions.sort_by(|a, b| (a.order_index, &a.id).cmp(&(b.order_index, &b.id)));
        check_order_indices(&page.id, &page_questions)?;
        effective.push(EffectivePage {
            page,
            questions: page_questions,
        });
    }
    Ok(effective)
}

fn check_order_indices(page_id: &str, questions: &[Question]) -> Result<(), ResolveError> {
    let mut seen = BTreeSet::new();
    for question in questions {
        if !seen.insert(question.order_index) {
            return Err(ResolveError::IntegrityViolation {
                detail: format!(
                    "duplicate order index {} on page '{page_id}'",
                    question.order_index
                ),
            });
        }
    }
    Ok(())
}

/// Applies the clinic patch in its fixed order: field overrides, then
/// additions, then removals, then reordering. A removal can therefore never
/// undercut an override it depends on, and reordering always sees the final
/// member set.
fn apply_customizations(
    pages: &mut Vec<EffectivePage>,
    orphaned: &mut Vec<String>,
    patch: &Customizations,
) -> Result<(), ResolveError> {
    // 1. Field overrides.
    for (page_id, over) in &patch.page_overrides {
        let entry = pages
            .iter_mut()
            .find(|entry| entry.page.id == *page_id)
            .ok_or_else(|| ResolveError::InvalidCustomization {
                detail: format!("page override targets unknown page '{page_id}'"),
            })?;
        let page = &mut entry.page;
        if let Some(title) = &over.title {
            page.title = title.clone();
        }
        if let Some(description) = &over.description {
            page.description = Some(description.clone());
        }
        if let Some(instruction) = &over.instruction_text {
            page.instruction_text = Some(instruction.clone());
        }
        if let Some(show_progress) = over.show_progress {
            page.show_progress = show_progress;
        }
        if let Some(allow_back) = over.allow_back_navigation {
            page.allow_back_navigation = allow_back;
        }
        if let Some(auto_advance) = over.auto_advance {
            page.auto_advance = auto_advance;
        }
    }
    for (question_id, over) in &patch.question_overrides {
        let question = pages
            .iter_mut()
            .flat_map(|entry| entry.questions.iter_mut())
            .find(|question| question.id == *question_id)
            .ok_or_else(|| ResolveError::InvalidCustomization {
                detail: format!("question override targets unknown question '{question_id}'"),
            })?;
        if let Some(text) = &over.question_text {
            question.question_text = text.clone();
        }
        if let Some(help) = &over.help_text {
            question.help_text = Some(help.clone());
        }
        if let Some(placeholder) = &over.placeholder_text {
            question.placeholder_text = Some(placeholder.clone());
        }
        if let Some(required) = over.is_required {
            question.is_required = required;
        }
        if let Some(options) = &over.options {
            question.options = options.clone();
        }
        if let Some(rules) = &over.validation_rules {
            question.validation_rules = rules.clone();
        }
    }

    // 2. Additions.
    for added in &patch.added_questions {
        let collision = pages
            .iter()
            .flat_map(|entry| entry.questions.iter())
            .any(|question| question.id == added.id)
            || orphaned.contains(&added.id);
        if collision {
            return Err(ResolveError::InvalidCustomization {
                detail: format!("added question '{}' collides with an existing id", added.id),
            });
        }
        match &added.page_id {
            Some(page_id) => {
                let entry = pages
                    .iter_mut()
                    .find(|entry| entry.page.id == *page_id)
                    .ok_or_else(|| ResolveError::InvalidCustomization {
                        detail: format!(
                            "added question '{}' targets unknown page '{page_id}'",
                            added.id
                        ),
                    })?;
                entry.questions.push(added.clone());
                entry
                    .questions
                    .sort_by(|a, b| (a.order_index, &a.id).cmp(&(b.order_index, &b.id)));
            }
            None => orphaned.push(added.id.clone()),
        }
    }
    orphaned.sort();

    // 3. Removals.
    for page_id in &patch.removed_pages {
        let index = pages
            .iter()
            .position(|entry| entry.page.id == *page_id)
            .ok_or_else(|| ResolveError::InvalidCustomization {
                detail: format!("removal targets unknown page '{page_id}'"),
            })?;
        pages.remove(index);
    }
    for question_id in &patch.removed_questions {
        let mut removed = false;
        for entry in pages.iter_mut() {
            if let Some(index) = entry
                .questions
                .iter()
                .position(|question| question.id == *question_id)
            {
                entry.questions.remove(index);
                removed = true;
                break;
            }
        }
        if !removed {
            if let Some(index) = orphaned.iter().position(|id| id == question_id) {
                orphaned.remove(index);
                removed = true;
            }
        }
        if !removed {
            return Err(ResolveError::InvalidCustomization {
                detail: format!("removal targets unknown question '{question_id}'"),
            });
        }
    }

    // 4. Reordering over the final member set.
    if !patch.page_order.is_empty() {
        let current: BTreeSet<&str> = pages.iter().map(|entry| entry.page.id.as_str()).collect();
        let requested: BTreeSet<&str> = patch.page_order.iter().map(String::as_str).collect();
        if current != requested || patch.page_order.len() != pages.len() {
            return Err(ResolveError::InvalidCustomization {
                detail: "page_order must be a permutation of the surviving page ids".into(),
            });
        }
        pages.sort_by_key(|entry| {
            patch
                .page_order
                .iter()
                .position(|id| *id == entry.page.id)
                .unwrap_or(usize::MAX)
        });
    }
    for (page_id, order) in &patch.question_order {
        let entry = pages
            .iter_mut()
            .find(|entry| entry.page.id == *page_id)
            .ok_or_else(|| ResolveError::InvalidCustomization {
                detail: format!("question_order targets unknown page '{page_id}'"),
            })?;
        let current: BTreeSet<&str> = entry
            .questions
            .iter()
            .map(|question| question.id.as_str())
            .collect();
        let requested: BTreeSet<&str> = order.iter().map(String::as_str).collect();
        if current != requested || order.len() != entry.questions.len() {
            return Err(ResolveError::InvalidCustomization {
                detail: format!(
                    "question_order for page '{page_id}' must be a permutation of its questions"
                ),
            });
        }
        entry.questions.sort_by_key(|question| {
            order
                .iter()
                .position(|id| *id == question.id)
                .unwrap_or(usize::MAX)
        });
    }

    Ok(())
}

/// Restores contiguous page numbers and order indices after structural
/// edits, so the snapshot honors the base-template invariants.
fn renumber(pages: &mut [EffectivePage]) {
    for (page_index, entry) in pages.iter_mut().enumerate() {
        entry.page.page_number = page_index as u32 + 1;
        for (question_index, question) in entry.questions.iter_mut().enumerate() {
            question.order_index = question_index as u32;
            question.page_id = Some(entry.page.id.clone());
        }
    }
}

/// Builds the cross-question dependency graph and rejects unknown
/// references and cycles. Runs once per resolution; evaluation never
/// repeats this work.
fn check_condition_graph(pages: &[EffectivePage]) -> Result<(), ResolveError> {
    let questions: Vec<&Question> = pages
        .iter()
        .flat_map(|entry| entry.questions.iter())
        .collect();
    let known: BTreeSet<&str> = questions.iter().map(|question| question.id.as_str()).collect();

    let mut edges: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for question in &questions {
        let mut refs = BTreeSet::new();
        if let Some(rule) = &question.conditional_logic {
            rule.referenced_questions(&mut refs);
        }
        if let Some(rule) = question
            .display_logic
            .as_ref()
            .and_then(|logic| logic.required_if.as_ref())
        {
            rule.referenced_questions(&mut refs);
        }
        for referenced in &refs {
            if !known.contains(referenced.as_str()) {
                return Err(ResolveError::UnknownReference {
                    question_id: question.id.clone(),
                    referenced: referenced.clone(),
                });
            }
        }
        edges.insert(question.id.clone(), refs.into_iter().collect());
    }

    // Three-color depth-first search over the dependency edges, with an
    // explicit stack so a long dependency chain cannot exhaust the call
    // stack. Absent from `colors` means undiscovered.
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        Gray,
        Black,
    }

    let mut colors: BTreeMap<String, Color> = BTreeMap::new();
    for start in edges.keys() {
        if colors.contains_key(start.as_str()) {
            continue;
        }
        colors.insert(start.clone(), Color::Gray);
        let mut stack: Vec<(String, usize)> = vec![(start.clone(), 0)];
        while let Some(frame) = stack.last_mut() {
            let node = frame.0.clone();
            let next_child = frame.1;
            let children = edges.get(&node).map(Vec::as_slice).unwrap_or(&[]);
            if next_child >= children.len() {
                colors.insert(node, Color::Black);
                stack.pop();
                continue;
            }
            frame.1 += 1;
            let child = children[next_child].clone();
            match colors.get(&child).copied() {
                Some(Color::Gray) => {
                    return Err(ResolveError::CyclicCondition { question_id: child });
                }
                Some(Color::Black) => {}
                None => {
                    colors.insert(child.clone(), Color::Gray);
                    stack.push((child, 0));
                }
            }
        }
    }
    Ok(())
}
