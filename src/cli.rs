use clap::{Args, Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

use crate::config::Config;
use crate::controller::{AnalysisController, LifecycleState};
use crate::domain::{FormVariant, Preset, QueryField, QueryForm};
use crate::error::AppError;
use crate::health::{check_health, ScoringServiceChecker};
use crate::presentation::{HistoryView, ResultView};
use crate::scoring::{HttpScoringClient, ScoringService};
use crate::session::{Session, SessionHandle, SessionSnapshot, SnapshotCause};

#[derive(Parser)]
#[command(name = "txrisk")]
#[command(about = "Transaction Risk Analyzer - client for the risk-scoring service", long_about = None)]
pub struct Cli {
    /// Form variant: numeric or categorical (overrides FORM_VARIANT)
    #[arg(long, global = true, value_name = "VARIANT")]
    pub variant: Option<FormVariant>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Analyze one transaction and print the result
    Analyze(AnalyzeArgs),

    /// Interactive analysis session (default)
    Interactive,

    /// Check that the scoring service is reachable
    Health,

    /// Configuration validation
    Config,
}

#[derive(Args, Debug, Default)]
pub struct AnalyzeArgs {
    /// Start from a canned form (high-risk or normal)
    #[arg(long)]
    pub preset: Option<Preset>,

    #[arg(long)]
    pub user_id: Option<String>,

    #[arg(long)]
    pub transaction_type: Option<String>,

    #[arg(long)]
    pub amount: Option<String>,

    #[arg(long)]
    pub timestamp: Option<String>,

    #[arg(long)]
    pub device_id: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    /// Print the raw result as JSON
    #[arg(long)]
    pub json: bool,
}

impl AnalyzeArgs {
    fn edits(&self) -> Vec<(QueryField, &str)> {
        [
            (QueryField::UserId, &self.user_id),
            (QueryField::TransactionType, &self.transaction_type),
            (QueryField::Amount, &self.amount),
            (QueryField::Timestamp, &self.timestamp),
            (QueryField::DeviceId, &self.device_id),
            (QueryField::Location, &self.location),
        ]
        .into_iter()
        .filter_map(|(field, value)| value.as_deref().map(|v| (field, v)))
        .collect()
    }
}

/// One line typed into the interactive session.
#[derive(Debug, PartialEq, Eq)]
pub enum ReplCommand {
    Set { field: QueryField, value: String },
    Preset(Preset),
    Analyze,
    Show,
    History,
    Form,
    Help,
    Quit,
}

pub fn parse_command(line: &str) -> Result<Option<ReplCommand>, AppError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_lowercase().as_str() {
        "set" => {
            let (name, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let field = name.parse::<QueryField>().map_err(AppError::UnknownField)?;
            ReplCommand::Set {
                field,
                value: value.trim().to_string(),
            }
        }
        "preset" | "load" => {
            ReplCommand::Preset(rest.parse::<Preset>().map_err(AppError::UnknownPreset)?)
        }
        "analyze" | "a" => ReplCommand::Analyze,
        "show" => ReplCommand::Show,
        "history" => ReplCommand::History,
        "form" => ReplCommand::Form,
        "help" | "?" => ReplCommand::Help,
        "quit" | "exit" | "q" => ReplCommand::Quit,
        other => return Err(AppError::UnknownCommand(other.to_string())),
    };

    Ok(Some(command))
}

pub fn render_form(form: &QueryForm) -> String {
    form.fields()
        .map(|field| format!("  {:<17} {}", field.as_str(), form.get(field)))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_history(history: &[HistoryView]) -> String {
    if history.is_empty() {
        return "No analyses yet".to_string();
    }

    let mut out = String::from("Recent Analyses");
    for entry in history {
        out.push_str("\n  ");
        out.push_str(&entry.to_string());
    }
    out
}

/// The notice, when there is one, always comes first. The previous result
/// stays on screen underneath it when the form is rejected.
fn render_current(snapshot: &SessionSnapshot) -> String {
    let mut lines = Vec::new();
    if let Some(notice) = &snapshot.notice {
        lines.push(format!("✗ {}", notice));
    }
    match &snapshot.current {
        Some(view) => lines.push(view.to_string()),
        None if !lines.is_empty() => {}
        None if snapshot.state == LifecycleState::InFlight => {
            lines.push("Contacting risk engine…".to_string())
        }
        None => lines.push("No result".to_string()),
    }
    lines.join("\n")
}

fn print_help() {
    println!("Commands:");
    println!("  set <field> <value>     edit one field ({})", field_names());
    println!("  preset <high-risk|normal>");
    println!("  analyze                 submit the form");
    println!("  show | history | form   print the current result, history or form");
    println!("  quit");
}

fn field_names() -> String {
    QueryField::ALL
        .iter()
        .map(|field| field.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Text to print for one observed snapshot. The watch channel only keeps the
/// latest value, so a completion can be overwritten before it is seen;
/// `last_sequence` tracks the newest history entry already reported so that
/// a skipped completion is still printed.
fn render_update(snapshot: &SessionSnapshot, last_sequence: &mut Option<u64>) -> Option<String> {
    let newest = snapshot.history.first();
    let skipped = match newest {
        Some(entry) if Some(entry.sequence) != *last_sequence => {
            snapshot.cause != SnapshotCause::Completed
        }
        _ => false,
    };
    *last_sequence = newest.map(|entry| entry.sequence);

    let mut lines = Vec::new();
    if let (true, Some(entry)) = (skipped, newest) {
        lines.push(format!("Analysis complete: {}", entry));
    }
    match snapshot.cause {
        SnapshotCause::AnalysisStarted => {
            lines.push("Analyzing transaction... contacting risk engine…".to_string())
        }
        SnapshotCause::TriggerIgnored => {
            lines.push("An analysis is already in progress".to_string())
        }
        SnapshotCause::InputRejected | SnapshotCause::Failed | SnapshotCause::Completed => {
            lines.push(render_current(snapshot))
        }
        SnapshotCause::PresetLoaded => lines.push(render_form(&snapshot.form)),
        SnapshotCause::Opened | SnapshotCause::Edited => {}
    }

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

async fn print_updates(mut snapshots: watch::Receiver<SessionSnapshot>) {
    let mut last_sequence = snapshots
        .borrow()
        .history
        .first()
        .map(|entry| entry.sequence);

    while snapshots.changed().await.is_ok() {
        let snapshot = snapshots.borrow_and_update().clone();
        if let Some(text) = render_update(&snapshot, &mut last_sequence) {
            println!("{}", text);
        }
    }
}

fn apply(handle: &SessionHandle, command: ReplCommand) -> Result<(), AppError> {
    match command {
        ReplCommand::Set { field, value } => handle.edit(field, value)?,
        ReplCommand::Preset(preset) => handle.load_preset(preset)?,
        ReplCommand::Analyze => handle.analyze()?,
        ReplCommand::Show => println!("{}", render_current(&handle.snapshot())),
        ReplCommand::History => println!("{}", render_history(&handle.snapshot().history)),
        ReplCommand::Form => println!("{}", render_form(&handle.snapshot().form)),
        ReplCommand::Help => print_help(),
        ReplCommand::Quit => handle.shutdown()?,
    }
    Ok(())
}

pub async fn handle_analyze(
    config: &Config,
    variant: FormVariant,
    args: &AnalyzeArgs,
) -> anyhow::Result<()> {
    let mut controller = AnalysisController::new(variant);
    if let Some(preset) = args.preset {
        controller.load_preset(preset);
    }
    for (field, value) in args.edits() {
        controller.edit(field, value);
    }

    let client = HttpScoringClient::new(config.base_url(), config.request_timeout);
    let outcome = controller
        .analyze(&client, config.request_timeout)
        .await
        .map(|result| result.cloned());

    match outcome {
        Ok(Some(result)) if args.json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        Ok(Some(result)) => {
            println!("{}", ResultView::from_result(&result));
            Ok(())
        }
        Ok(None) => anyhow::bail!("analysis was not started"),
        Err(e) => {
            if let Some(notice) = controller.notice() {
                eprintln!("✗ {}", notice);
            }
            Err(e.into())
        }
    }
}

pub async fn handle_interactive(config: &Config, variant: FormVariant) -> anyhow::Result<()> {
    let client: Arc<dyn ScoringService> = Arc::new(HttpScoringClient::new(
        config.base_url(),
        config.request_timeout,
    ));
    let (session, handle) = Session::new(
        AnalysisController::new(variant),
        client,
        config.request_timeout,
    );
    let session_task = tokio::spawn(session.run());
    let printer = tokio::spawn(print_updates(handle.subscribe()));

    println!("Transaction Risk Analyzer ({})", config.analyze_url());
    println!("{}", render_form(&handle.snapshot().form));
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Ok(Some(ReplCommand::Quit)) => break,
            Ok(Some(command)) => {
                if let Err(e) = apply(&handle, command) {
                    eprintln!("{}", e);
                }
            }
            Ok(None) => {}
            Err(e) => eprintln!("{}", e),
        }
    }

    handle.shutdown().ok();
    let controller = session_task.await?;
    printer.abort();
    tracing::debug!(
        requests = controller.requests_issued(),
        history = controller.history().len(),
        "Interactive session finished"
    );

    Ok(())
}

pub async fn handle_health(config: &Config) -> anyhow::Result<()> {
    let client = HttpScoringClient::new(config.base_url(), config.request_timeout);
    let checker = ScoringServiceChecker::new(client);

    tracing::info!("Checking scoring service at {}", config.health_url());
    let report = check_health(&checker).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.status != "healthy" {
        anyhow::bail!("scoring service is {}", report.status);
    }
    println!("✓ Scoring service is healthy");

    Ok(())
}

pub fn handle_config_validate(config: &Config, variant: FormVariant) -> anyhow::Result<()> {
    tracing::info!("Validating configuration...");

    println!("Configuration:");
    println!("  Scoring Service URL: {}", config.scoring_service_url);
    println!("  Analyze Endpoint:    {}", config.analyze_url());
    println!("  Request Timeout:     {}s", config.request_timeout.as_secs());
    println!("  Form Variant:        {:?}", variant);
    println!("  Log Format:          {:?}", config.log_format);

    // the default form has to serialize or every session starts broken
    QueryForm::new(variant).to_request()?;

    tracing::info!("Configuration is valid");
    println!("✓ Configuration is valid");

    Ok(())
}
