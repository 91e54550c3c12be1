//! Restore Job Client
//!
//! Provides CLI interface for submitting and following restore jobs on a backup server

// restorectl/src/main.rs
mod config;
mod errors;
mod monitor;
mod naming;
mod restore;
mod settings;
mod transport;
mod utils;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use config::AppConfig;
use monitor::MonitorState;
use naming::{CaseMode, NameInferenceEngine, NamePattern};
use restore::{DatabaseMode, RestoreForm, RestoreKind};
use settings::{JsonFileStore, SettingsStore};
use transport::{HttpTransport, JobId, Transport};

#[derive(Parser, Debug)]
#[command(name = "restorectl", version, about = "Submit and follow database restore jobs")]
struct Cli {
    /// Path to config.json
    #[arg(long, short, default_value = "config.json", env = "RESTORECTL_CONFIG")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a restore job and follow its output (Ctrl-C aborts the job)
    Restore(RestoreArgs),
    /// Follow an existing job until it finishes
    Status { jobid: u64 },
    /// Ask the server to abort a job
    Abort { jobid: u64 },
    /// List jobs known to the server
    Jobs,
    /// List restore destinations
    Destinations,
    /// Search the server's backup catalogue
    Search { query: String },
    /// Print the tables referenced by SQL read from a file or stdin
    Tables { file: Option<PathBuf> },
    /// Print the schemas referenced by SQL read from a file or stdin
    Schemas { file: Option<PathBuf> },
    /// Show the database name the stored patterns produce for a backup path
    InferName { backup: String },
    /// Manage database naming patterns
    #[command(subcommand)]
    Patterns(PatternsCommand),
    /// Export, import or change client settings
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Args, Debug)]
struct RestoreArgs {
    /// Backup path on the server, or an http(s) URL
    #[arg(long, short)]
    backup: String,

    /// Destination index; defaults to the preferred destination
    #[arg(long, short)]
    destination: Option<usize>,

    /// Database name; inferred from the backup path when omitted
    #[arg(long = "name", short = 'n')]
    database_name: Option<String>,

    #[arg(long, value_enum, default_value_t = DatabaseMode::Create)]
    mode: DatabaseMode,

    /// Comma or whitespace separated tables/schemas for a partial restore
    #[arg(long, conflicts_with_all = ["tables_from", "schemas_from"])]
    objects: Option<String>,

    /// Partial restore of the tables referenced by this SQL file
    #[arg(long, conflicts_with = "schemas_from")]
    tables_from: Option<PathBuf>,

    /// Partial restore of the schemas referenced by this SQL file
    #[arg(long)]
    schemas_from: Option<PathBuf>,

    #[arg(long)]
    restore_schema: bool,

    #[arg(long)]
    restore_indexes: bool,

    #[arg(long)]
    ignore_errors: bool,

    /// Swap path separators of the backup path before submitting
    #[arg(long)]
    convert_slashes: bool,
}

#[derive(Subcommand, Debug)]
enum PatternsCommand {
    List,
    Add {
        path_pattern: String,
        template: String,
        #[arg(long = "case", value_enum, default_value_t = CaseMode::None)]
        case_mode: CaseMode,
        /// Insert at this position instead of appending
        #[arg(long)]
        at: Option<usize>,
    },
    Remove { index: usize },
    Up { index: usize },
    Down { index: usize },
}

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Print settings as `<destination>;<patterns JSON>`
    Export,
    /// Replace settings from exported text (argument, or stdin when omitted)
    Import { text: Option<String> },
    /// Set the preferred destination, or clear it with `none`
    Destination { index: String },
}

/// Main entry point for the restore client
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let local = tokio::task::LocalSet::new();
    match local.run_until(run_app(cli)).await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("restorectl=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_app(cli: Cli) -> Result<()> {
    let app_config = AppConfig::load(&cli.config).with_context(|| {
        format!(
            "Failed to load application configuration from {}",
            cli.config.display()
        )
    })?;
    let mut store = JsonFileStore::new(&app_config.settings_path);

    match cli.command {
        Command::Restore(args) => {
            println!("🔄 Starting Restore Process...");
            let form = build_form(args, &store)?;
            form.validate().context("Restore request is incomplete")?;
            let transport = connect(&app_config)?;
            let state = restore::run_restore_flow(transport, &app_config, &form, stdin_lines())
                .await
                .context("Restore process failed")?;
            finish(state)?;
        }
        Command::Status { jobid } => {
            let transport = connect(&app_config)?;
            let state = restore::watch_job(transport, &app_config, JobId(jobid), stdin_lines()).await?;
            finish(state)?;
        }
        Command::Abort { jobid } => {
            let transport = connect(&app_config)?;
            transport
                .abort_job(JobId(jobid))
                .await
                .with_context(|| format!("Failed to abort job {}", jobid))?;
            println!("🛑 Abort requested for job {}", jobid);
        }
        Command::Jobs => {
            let jobs = connect(&app_config)?.list_jobs().await.context("Failed to list jobs")?;
            if jobs.is_empty() {
                println!("No jobs.");
            }
            for job in jobs {
                println!(
                    "{:>6}  {}  {:<12} {}",
                    job.jobid.0,
                    utils::format_created(job.created),
                    job.status.describe(),
                    job.stage.unwrap_or_default()
                );
            }
        }
        Command::Destinations => {
            let preferred = store.preferred_destination()?;
            let destinations = connect(&app_config)?
                .list_destinations()
                .await
                .context("Failed to list destinations")?;
            for destination in destinations {
                let marker = if Some(destination.index) == preferred { "*" } else { " " };
                println!("{} {:>3}  {}", marker, destination.index, destination.name);
            }
        }
        Command::Search { query } => {
            let results = connect(&app_config)?
                .search(&query)
                .await
                .with_context(|| format!("Search for '{}' failed", query))?;
            for result in results {
                println!("{}", result);
            }
        }
        Command::Tables { file } => {
            let text = utils::read_text_input(file.as_deref())?;
            println!("{}", restore::tables_from_text(&text).join(", "));
        }
        Command::Schemas { file } => {
            let text = utils::read_text_input(file.as_deref())?;
            println!("{}", restore::schemas_from_text(&text).join(", "));
        }
        Command::InferName { backup } => {
            let engine = NameInferenceEngine::new(store.name_patterns()?);
            match engine.infer(&backup) {
                Some(name) => println!("{}", name),
                None => anyhow::bail!(
                    "None of the {} name patterns matches {}",
                    engine.patterns().len(),
                    backup
                ),
            }
        }
        Command::Patterns(command) => run_patterns_command(command, &mut store)?,
        Command::Settings(command) => run_settings_command(command, &mut store)?,
    }
    Ok(())
}

fn stdin_lines() -> tokio::io::BufReader<tokio::io::Stdin> {
    tokio::io::BufReader::new(tokio::io::stdin())
}

fn connect(app_config: &AppConfig) -> Result<Arc<HttpTransport>> {
    let transport = HttpTransport::new(app_config.server_url.clone(), app_config.request_timeout)
        .context("Failed to create HTTP client")?;
    Ok(Arc::new(transport))
}

fn build_form(args: RestoreArgs, store: &JsonFileStore) -> Result<RestoreForm> {
    let destination = match args.destination {
        Some(index) => Some(index),
        None => store.preferred_destination()?,
    };
    let mut form = RestoreForm::new(destination);

    let backup = if args.convert_slashes {
        restore::convert_slashes(&args.backup)
    } else {
        args.backup
    };
    let engine = NameInferenceEngine::new(store.name_patterns()?);
    form.set_backup(&backup, &engine);
    if let Some(name) = args.database_name {
        form.database_name = name;
    }

    form.database = args.mode;
    form.restore_schema = args.restore_schema;
    form.restore_indexes = args.restore_indexes;
    form.ignore_errors = args.ignore_errors;

    if let Some(objects) = args.objects {
        form.kind = RestoreKind::Partial;
        form.objects = objects;
    } else if let Some(path) = args.tables_from {
        form.fill_tables_from(&utils::read_text_input(Some(&path))?);
    } else if let Some(path) = args.schemas_from {
        form.fill_schemas_from(&utils::read_text_input(Some(&path))?);
    }

    Ok(form)
}

fn finish(state: MonitorState) -> Result<()> {
    match state {
        MonitorState::Success => Ok(()),
        MonitorState::Stalled(reason) => {
            anyhow::bail!("Stopped watching after losing contact with the job: {}", reason)
        }
        other => anyhow::bail!("Job ended as {:?}", other),
    }
}

fn run_patterns_command(command: PatternsCommand, store: &mut JsonFileStore) -> Result<()> {
    let patterns = store.name_patterns()?;
    let updated = match command {
        PatternsCommand::List => {
            if patterns.is_empty() {
                println!("No name patterns.");
            }
            for (index, pattern) in patterns.iter().enumerate() {
                println!(
                    "{:>3}  {}  ->  {}  ({:?})",
                    index, pattern.path_pattern, pattern.template, pattern.case_mode
                );
            }
            return Ok(());
        }
        PatternsCommand::Add {
            path_pattern,
            template,
            case_mode,
            at,
        } => {
            let pattern = NamePattern::new(&path_pattern, &template, case_mode);
            pattern.compile()?;
            match at {
                Some(index) => patterns.insert(index, pattern),
                None => patterns.push(pattern),
            }
        }
        PatternsCommand::Remove { index } => {
            let removed = patterns
                .get(index)
                .with_context(|| format!("No name pattern at position {}", index))?;
            println!("Removing {}", removed.path_pattern);
            patterns.remove(index)
        }
        PatternsCommand::Up { index } => patterns.move_up(index),
        PatternsCommand::Down { index } => patterns.move_down(index),
    };

    store.set_name_patterns(&updated)?;
    println!("Name patterns now hold {} entries.", updated.len());
    Ok(())
}

fn run_settings_command(command: SettingsCommand, store: &mut JsonFileStore) -> Result<()> {
    match command {
        SettingsCommand::Export => println!("{}", settings::export_settings(&*store)?),
        SettingsCommand::Import { text } => {
            let text = match text {
                Some(text) => text,
                None => utils::read_text_input(None)?,
            };
            settings::import_settings(store, text.trim()).context("Settings were not imported")?;
            println!("Settings written to {}", store.path().display());
        }
        SettingsCommand::Destination { index } => {
            let value = if index.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(index.parse::<usize>().context("Destination must be a non-negative integer")?)
            };
            store.set_preferred_destination(value)?;
        }
    }
    Ok(())
}
