mod wizard;

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use intake_flow::{
    EffectiveTemplate, FlowError, ResolveError, Session, SessionOutcome, SessionStatus,
    TemplateSelector, resolve_effective_template,
};
use intake_spec::{
    AnswerSet, ClinicAssignment, MessageError, Page, Question, Template, ValidateError,
    ValidationOutcome, validate_page,
};

use wizard::{Verbosity, WizardPresenter, parse_answer};

/// Resolve and run clinic intake questionnaires from record files.
#[derive(Parser)]
#[command(name = "intake", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Print page flags, visible questions, and error codes.
    #[arg(long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the effective template for a clinic and print it as JSON.
    Resolve(RecordArgs),
    /// Validate an answers file against the resolved template.
    Validate {
        #[command(flatten)]
        records: RecordArgs,
        /// JSON object mapping question ids to answer values.
        #[arg(long)]
        answers: PathBuf,
    },
    /// Walk the questionnaire interactively on the terminal.
    Run {
        #[command(flatten)]
        records: RecordArgs,
        /// Also print the final answers as pretty JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct RecordArgs {
    /// JSON array of template records.
    #[arg(long)]
    templates: PathBuf,
    /// JSON array of page records.
    #[arg(long)]
    pages: PathBuf,
    /// JSON array of question records.
    #[arg(long)]
    questions: PathBuf,
    /// JSON array of clinic assignment records.
    #[arg(long)]
    assignments: PathBuf,
    /// Clinic id to resolve for.
    #[arg(long)]
    clinic: String,
    /// Explicit template id; defaults to the clinic's default assignment.
    #[arg(long)]
    template: Option<String>,
    /// Reference timestamp (RFC 3339); defaults to the current time.
    #[arg(long)]
    now: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    Validate(#[from] ValidateError),
    #[error(transparent)]
    Message(#[from] MessageError),
    #[error("json encode error: {0}")]
    Encode(#[source] serde_json::Error),
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let verbosity = Verbosity::from_verbose(cli.verbose);
    match cli.command {
        Command::Resolve(records) => {
            let resolved = resolve_from_files(&records)?;
            let json = serde_json::to_string_pretty(&resolved).map_err(CliError::Encode)?;
            println!("{json}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate { records, answers } => {
            let resolved = resolve_from_files(&records)?;
            let answers: BTreeMap<String, Value> = load_json(&answers)?;
            let outcome = validate_all(&resolved, &AnswerSet::from(answers))?;
            let json = serde_json::to_string_pretty(&outcome).map_err(CliError::Encode)?;
            println!("{json}");
            Ok(if outcome.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Run { records, json } => {
            let resolved = resolve_from_files(&records)?;
            let presenter = WizardPresenter::new(verbosity, json);
            run_wizard(resolved, &presenter)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, CliError> {
    let file = File::open(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| CliError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_from_files(records: &RecordArgs) -> Result<EffectiveTemplate, CliError> {
    let templates: Vec<Template> = load_json(&records.templates)?;
    let pages: Vec<Page> = load_json(&records.pages)?;
    let questions: Vec<Question> = load_json(&records.questions)?;
    let assignments: Vec<ClinicAssignment> = load_json(&records.assignments)?;
    let selector = match &records.template {
        Some(template_id) => TemplateSelector::Explicit(template_id.clone()),
        None => TemplateSelector::Default,
    };
    let now = records.now.unwrap_or_else(Utc::now);
    debug!(clinic = %records.clinic, "resolving effective template");
    Ok(resolve_effective_template(
        &records.clinic,
        &selector,
        now,
        &assignments,
        &templates,
        &pages,
        &questions,
    )?)
}

/// One-shot validation of a full answer set against every page of the
/// snapshot, honoring per-question visibility.
fn validate_all(
    resolved: &EffectiveTemplate,
    answers: &AnswerSet,
) -> Result<ValidationOutcome, CliError> {
    let mut combined = ValidationOutcome {
        valid: true,
        errors: Vec::new(),
        missing_required: Vec::new(),
    };
    for entry in &resolved.pages {
        let mut visible = Vec::new();
        for question in &entry.questions {
            let shown = match &question.conditional_logic {
                Some(rule) => rule.evaluate(answers).map_err(ValidateError::from)?,
                None => true,
            };
            if shown {
                visible.push(question);
            }
        }
        let outcome = validate_page(
            &entry.page.id,
            &visible,
            answers,
            &entry.page.validation_rules,
        )?;
        combined.valid &= outcome.valid;
        combined.errors.extend(outcome.errors);
        combined.missing_required.extend(outcome.missing_required);
    }
    Ok(combined)
}

fn run_wizard(resolved: EffectiveTemplate, presenter: &WizardPresenter) -> Result<(), CliError> {
    let mut session = Session::start(Arc::new(resolved))?;
    presenter.show_intro(
        &session.template().template.name,
        session.introduction_text()?.as_deref(),
    );

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    while session.status() == SessionStatus::InProgress {
        let entry = match session.current_page() {
            Some(entry) => entry.clone(),
            None => break,
        };
        let visible_pages = session.visible_pages()?;
        let position = visible_pages
            .iter()
            .position(|summary| summary.id == entry.page.id)
            .map(|index| index + 1)
            .unwrap_or(0);
        presenter.show_page(&entry, position, visible_pages.len());

        let questions: Vec<Question> = session
            .visible_questions()?
            .into_iter()
            .cloned()
            .collect();

        let mut submission = BTreeMap::new();
        let mut went_back = false;
        for question in &questions {
            presenter.show_prompt(question);
            let value = loop {
                let Some(line) = next_line(&mut lines) else {
                    // EOF: the patient walked away.
                    session.abandon()?;
                    eprintln!("Input ended; session abandoned.");
                    return Ok(());
                };
                if line.trim() == ":back" {
                    match session.go_back() {
                        Ok(previous) => {
                            debug!(page_id = %previous.page.id, "went back");
                            went_back = true;
                        }
                        Err(err) => eprintln!("Cannot go back: {err}"),
                    }
                    break None;
                }
                match parse_answer(question, &line) {
                    Ok(value) => break value,
                    Err(err) => {
                        presenter.show_parse_error(&err);
                        presenter.show_prompt(question);
                    }
                }
            };
            if went_back {
                break;
            }
            if let Some(value) = value {
                submission.insert(question.id.clone(), value);
            }
        }
        if went_back {
            continue;
        }
        if questions.is_empty() {
            // Structural page: consume an acknowledgement line, then move on.
            let _ = next_line(&mut lines);
        }

        let outcome = if session.should_auto_advance()? && submission.len() == 1 {
            let (question_id, value) = submission.into_iter().next().expect("one entry");
            session.submit_answer(&question_id, value)?
        } else {
            session.submit_page(&submission)?
        };
        match outcome {
            SessionOutcome::Advanced { .. } => {}
            SessionOutcome::Completed { final_answers } => {
                presenter.show_completion(
                    &final_answers,
                    session.completion_message()?.as_deref(),
                );
            }
            SessionOutcome::Rejected { outcome } => presenter.show_rejection(&outcome),
        }
    }
    Ok(())
}

fn next_line(lines: &mut impl Iterator<Item = io::Result<String>>) -> Option<String> {
    lines.next().and_then(Result::ok)
}
