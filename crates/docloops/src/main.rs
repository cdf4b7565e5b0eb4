mod config;
mod history;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tokio::task::JoinSet;
use tracing::warn;

use docloops_agent::{create_agent, Agent, AgentConfig, AgentType};
use docloops_core::{
    infer_doc_type, Collaborators, CycleArchive, CycleController, CycleError, CycleOptions,
    CycleRecord, Document, StopReason,
};
use docloops_eval::{
    display_name, AgentEvaluator, AgentImprover, CachingEvaluator, EvaluationResult, Metadata,
    ScoreCard,
};
use docloops_history::HistoryStore;
use docloops_logging::{init_tracing, LogFormat, Logger};

use crate::config::{ProjectConfig, RoleConfig};

/// Document types every run can handle without `--doc-type`
const BUILTIN_DOC_TYPES: [&str; 3] = ["readme", "wiki", "markdown"];

const EXIT_FAILURE: i32 = 1;
const EXIT_CONFIGURATION: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser, Debug)]
#[command(
    name = "docloops",
    about = "Evaluate and iteratively improve documentation with coding agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Agent to use for both evaluator and improver
    #[arg(short, long, value_enum, global = true)]
    agent: Option<AgentChoice>,

    /// Model to use (if agent supports it)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Log output format
    #[arg(long, value_enum, default_value = "pretty", global = true)]
    log_format: LogFormatChoice,

    /// Also append cycle events as JSON lines to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Output results as JSON
    #[arg(long, global = true)]
    json_output: bool,

    /// Do not record history or write results
    #[arg(long, global = true)]
    no_save: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run evaluate/improve cycles on one or more documents
    Run {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Document type (default: inferred from each path)
        #[arg(short = 't', long)]
        doc_type: Option<String>,

        /// Maximum improvement iterations
        #[arg(short = 'n', long)]
        max_iterations: Option<usize>,

        /// Stop unless an iteration gains more than this many points
        #[arg(long)]
        min_improvement: Option<f64>,

        /// Stop once the score reaches this value
        #[arg(long)]
        target_score: Option<f64>,

        /// Categories to focus on instead of the evaluator's recommendations
        #[arg(long, value_delimiter = ',')]
        focus: Vec<String>,

        /// Write the best content back to each file
        #[arg(long)]
        write: bool,
    },
    /// Evaluate a document once
    Evaluate {
        file: PathBuf,

        #[arg(short = 't', long)]
        doc_type: Option<String>,
    },
    /// Show recorded history metrics
    History {
        #[arg(short = 't', long)]
        doc_type: Option<String>,

        /// Number of recent cycles to list
        #[arg(short = 'l', long, default_value = "10")]
        limit: usize,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AgentChoice {
    Claude,
    Opencode,
}

impl From<AgentChoice> for AgentType {
    fn from(choice: AgentChoice) -> Self {
        match choice {
            AgentChoice::Claude => AgentType::ClaudeCode,
            AgentChoice::Opencode => AgentType::OpenCode,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatChoice {
    Pretty,
    Json,
    Compact,
}

impl From<LogFormatChoice> for LogFormat {
    fn from(choice: LogFormatChoice) -> Self {
        match choice {
            LogFormatChoice::Pretty => LogFormat::Pretty,
            LogFormatChoice::Json => LogFormat::Json,
            LogFormatChoice::Compact => LogFormat::Compact,
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let log_format: LogFormat = cli.log_format.into();
    init_tracing("warn", log_format);

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            exit_code_for(&e)
        }
    };
    std::process::exit(code);
}

fn exit_code_for(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<CycleError>() {
        Some(CycleError::Configuration(_)) => EXIT_CONFIGURATION,
        _ => EXIT_FAILURE,
    }
}

fn configuration_error(message: impl Into<String>) -> anyhow::Error {
    CycleError::Configuration(message.into()).into()
}

async fn run(cli: Cli) -> Result<i32> {
    let working_dir = std::env::current_dir().context("Failed to get current directory")?;
    let config = ProjectConfig::load(&working_dir)
        .map_err(|e| configuration_error(format!("{:#}", e)))?
        .unwrap_or_default();

    let store = open_history(&config)?;

    let code = match &cli.command {
        Command::History { doc_type, limit } => {
            history::handle_history_command(&store, doc_type.clone(), *limit, cli.json_output)?;
            return Ok(0);
        }
        Command::Evaluate { file, doc_type } => {
            let controller =
                build_controller(&cli, &config, &working_dir, doc_type.as_deref(), &store).await?;
            evaluate_file(&controller, &cli, file, &working_dir, doc_type.as_deref()).await?
        }
        Command::Run {
            files,
            doc_type,
            max_iterations,
            min_improvement,
            target_score,
            focus,
            write,
        } => {
            let mut options = config.cycle_options();
            if let Some(max) = max_iterations {
                options = options.with_max_iterations(*max);
            }
            if let Some(min) = min_improvement {
                options = options.with_min_improvement(*min);
            }
            if let Some(target) = target_score {
                options = options.with_target_score(*target);
            }
            if !focus.is_empty() {
                options = options.with_focus_categories(focus.clone());
            }
            if cli.no_save {
                options = options.without_saving();
            }
            options.validate()?;

            let controller =
                build_controller(&cli, &config, &working_dir, doc_type.as_deref(), &store).await?;
            let archive_dir = config.results_dir.clone().or_else(default_results_dir);
            let controller = match archive_dir {
                Some(dir) if !cli.no_save => controller.with_archive(CycleArchive::new(dir)),
                _ => controller,
            };

            let run = RunSettings {
                working_dir: &working_dir,
                doc_type: doc_type.as_deref(),
                options: &options,
                write: *write,
            };
            run_files(&controller, &cli, files, &run).await?
        }
    };

    if !cli.no_save {
        if let Err(e) = store.save() {
            warn!(error = %e, "Failed to save history");
            eprintln!("{} failed to save history: {}", "Warning:".yellow(), e);
        }
    }

    Ok(code)
}

/// History backed by the configured directory, or the user data dir.
/// Falls back to memory only when neither is available.
fn open_history(config: &ProjectConfig) -> Result<Arc<HistoryStore>> {
    let dir = config.history_dir.clone().or_else(HistoryStore::default_dir);
    let store = match dir {
        Some(dir) => HistoryStore::new(dir),
        None => HistoryStore::in_memory(),
    };
    store.load().context("Failed to load history")?;
    Ok(Arc::new(store))
}

fn default_results_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("docloops").join("results"))
}

async fn resolve_agent(
    cli_choice: Option<AgentChoice>,
    configured: Option<&str>,
) -> Result<Arc<dyn Agent>> {
    let agent_type: AgentType = match (cli_choice, configured) {
        (Some(choice), _) => choice.into(),
        (None, Some(name)) => name.parse::<AgentType>().map_err(configuration_error)?,
        (None, None) => AgentType::ClaudeCode,
    };

    let agent: Arc<dyn Agent> = Arc::from(create_agent(agent_type));
    if !agent.is_available().await {
        return Err(configuration_error(format!(
            "Agent '{}' is not available. Make sure it's installed and in PATH.",
            agent.name()
        )));
    }
    Ok(agent)
}

fn agent_config(working_dir: &Path, model: Option<&str>, role: &RoleConfig) -> AgentConfig {
    let mut config = AgentConfig::new(working_dir.to_path_buf());
    if let Some(model) = model {
        config = config.with_model(model);
    }
    if let Some(timeout) = role.timeout() {
        config = config.with_timeout(timeout);
    }
    config
}

async fn build_controller(
    cli: &Cli,
    config: &ProjectConfig,
    working_dir: &Path,
    extra_doc_type: Option<&str>,
    store: &Arc<HistoryStore>,
) -> Result<CycleController> {
    let evaluator_agent = resolve_agent(cli.agent, config.evaluator_agent()).await?;
    let improver_agent = resolve_agent(cli.agent, config.improver_agent()).await?;

    let evaluator_config = agent_config(
        working_dir,
        cli.model.as_deref().or(config.evaluator_model()),
        &config.evaluator,
    );
    let improver_config = agent_config(
        working_dir,
        cli.model.as_deref().or(config.improver_model()),
        &config.improver,
    );
    let improver = Arc::new(AgentImprover::new(improver_agent, improver_config));

    let mut doc_types: Vec<&str> = BUILTIN_DOC_TYPES.to_vec();
    if let Some(extra) = extra_doc_type.filter(|t| !doc_types.contains(t)) {
        doc_types.push(extra);
    }

    let mut collaborators = Collaborators::new();
    for doc_type in doc_types {
        let evaluator = AgentEvaluator::new(
            evaluator_agent.clone(),
            evaluator_config.clone(),
            ScoreCard::for_doc_type(doc_type),
        );
        collaborators = collaborators.register(
            doc_type,
            Arc::new(CachingEvaluator::new(Arc::new(evaluator))),
            improver.clone(),
        );
    }

    let log_format: LogFormat = cli.log_format.into();
    let logger = match &cli.log_file {
        Some(path) => Logger::with_file(log_format, path)
            .with_context(|| format!("Failed to open log file {}", path.display()))?,
        None => Logger::new(log_format),
    };

    Ok(CycleController::new(collaborators, Arc::new(logger)).with_history(store.clone()))
}

fn load_document(path: &Path, working_dir: &Path, doc_type: Option<&str>) -> Result<Document> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let doc_type = doc_type.unwrap_or_else(|| infer_doc_type(path));

    Ok(Document::new(content, doc_type)
        .with_filename(document_name(path, working_dir))
        .with_metadata("path", path.display().to_string()))
}

/// History identity for a file: its path relative to the working directory,
/// or the absolute path when it lives elsewhere
fn document_name(path: &Path, working_dir: &Path) -> String {
    let absolute = path
        .canonicalize()
        .unwrap_or_else(|_| working_dir.join(path));
    let base = working_dir
        .canonicalize()
        .unwrap_or_else(|_| working_dir.to_path_buf());

    absolute
        .strip_prefix(&base)
        .unwrap_or(&absolute)
        .to_string_lossy()
        .into_owned()
}

async fn evaluate_file(
    controller: &CycleController,
    cli: &Cli,
    file: &Path,
    working_dir: &Path,
    doc_type: Option<&str>,
) -> Result<i32> {
    let document = load_document(file, working_dir, doc_type)?;
    let mut metadata: Metadata = document.metadata.clone();
    metadata.insert("doc_id".into(), document.doc_id().into());

    let (evaluation, metrics) = controller
        .evaluate(&document.content, &document.doc_type, &metadata)
        .await?;

    if cli.json_output {
        let output = serde_json::json!({
            "evaluation": evaluation,
            "metrics": metrics,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_evaluation(file, &evaluation);
    }

    Ok(if evaluation.is_failed() { EXIT_FAILURE } else { 0 })
}

struct RunSettings<'a> {
    working_dir: &'a Path,
    doc_type: Option<&'a str>,
    options: &'a CycleOptions,
    write: bool,
}

async fn run_files(
    controller: &CycleController,
    cli: &Cli,
    files: &[PathBuf],
    run: &RunSettings<'_>,
) -> Result<i32> {
    let interrupt_handle = controller.interrupt_handle();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted. Finishing current step...");
        interrupt_handle.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    let mut tasks = JoinSet::new();
    let mut outcomes: Vec<(PathBuf, Result<CycleRecord>)> = Vec::new();

    for (index, path) in files.iter().enumerate() {
        let document = match load_document(path, run.working_dir, run.doc_type) {
            Ok(document) => document,
            Err(e) => {
                outcomes.push((path.clone(), Err(e)));
                continue;
            }
        };
        let controller = controller.clone();
        let options = run.options.clone();
        tasks.spawn(async move { (index, controller.run_cycle(document, &options).await) });
    }

    let mut finished = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        finished.push(joined.context("Cycle task panicked")?);
    }
    finished.sort_by_key(|(index, _)| *index);
    outcomes.extend(
        finished
            .into_iter()
            .map(|(index, result)| (files[index].clone(), result.map_err(anyhow::Error::from))),
    );

    let mut code = 0;
    let mut records = Vec::new();
    for (path, outcome) in outcomes {
        match outcome {
            Ok(record) => {
                if run.write && record.improved() {
                    std::fs::write(&path, &record.final_content)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                }
                if record.stop_reason == StopReason::Cancelled {
                    code = EXIT_INTERRUPTED;
                }
                if !cli.json_output {
                    print_record(&path, &record, run.write);
                }
                records.push(record);
            }
            Err(e) => {
                let failure = exit_code_for(&e);
                eprintln!("{} {}: {:#}", "Failed".red().bold(), path.display(), e);
                if code != EXIT_INTERRUPTED {
                    code = code.max(failure);
                }
            }
        }
    }

    if cli.json_output {
        println!("{}", serde_json::to_string_pretty(&records)?);
    }

    Ok(code)
}

fn print_evaluation(path: &Path, evaluation: &EvaluationResult) {
    eprintln!();
    eprintln!("=== {} ===", path.display());
    eprintln!("Score: {}", evaluation.short_description());
    eprintln!("Summary: {}", evaluation.summary);

    if !evaluation.category_scores.is_empty() {
        eprintln!("Categories:");
        for (category, score) in &evaluation.category_scores {
            eprintln!(
                "  {:<28} {:>3}/{:<3} {}",
                display_name(category),
                score.score,
                score.max_score,
                score.reason.dimmed()
            );
        }
    }

    if !evaluation.top_recommendations.is_empty() {
        eprintln!("Recommendations:");
        for recommendation in &evaluation.top_recommendations {
            eprintln!("  - {}", recommendation);
        }
    }
}

fn print_record(path: &Path, record: &CycleRecord, written: bool) {
    let heading = match record.stop_reason {
        StopReason::Cancelled => "INTERRUPTED".yellow(),
        StopReason::ImproverFailed => "INCOMPLETE".yellow(),
        _ if record.improved() => "IMPROVED".green(),
        _ => "UNCHANGED".dimmed(),
    };

    eprintln!();
    eprintln!("=== {} {} ===", heading, path.display());
    eprintln!(
        "Score: {} -> {} ({:+})",
        record.initial_score,
        record.final_score,
        record.total_improvement()
    );
    eprintln!("Trajectory: {:?}", record.score_trajectory());
    eprintln!("Iterations: {}", record.iterations.len());
    eprintln!("Stopped: {}", record.stop_reason);
    eprintln!("Duration: {:.1}s", record.duration_secs());
    if let Some(failed) = &record.failed_attempt {
        eprintln!("Failed attempt {}: {}", failed.index, failed.error);
    }
    if written && record.improved() {
        eprintln!("Wrote improved content to {}", path.display());
    }
}
