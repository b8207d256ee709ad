//! Command handlers
//!
//! Each subcommand maps onto one `AppState` operation and prints its
//! outcome, as JSON with `--json` or as a short colored summary.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::*;
use serde::Serialize;
use tracing::debug;

use crate::app::state::{AdhocRunRequest, AppState, RunRequest, ADHOC_WORKFLOW};
use crate::errors::ChapError;
use crate::http::jupyter::DEFAULT_NOTEBOOK;
use crate::models::execution::{ReleaseReport, RunReport, RunStatus};
use crate::models::notebook::NotebookRecord;
use crate::models::pipeline::{DEFAULT_MODULE, DEFAULT_PROCESSOR};

/// User used when none is given in development mode
pub const DEV_USER: &str = "dev_user";

/// chapbook subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered workflows
    Workflows {
        /// Print the full descriptors as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the pipeline config a workflow run would use
    Config {
        /// Workflow name
        workflow: String,

        #[command(flatten)]
        processor: ProcessorArgs,
    },
    /// Run a registered workflow with user code
    Run {
        /// Workflow name
        workflow: String,

        #[command(flatten)]
        processor: ProcessorArgs,

        #[command(flatten)]
        code: CodeSource,

        /// Submit in batch mode
        #[arg(long)]
        batch: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a reader / user processor / writer pipeline
    Adhoc {
        /// Reader format (yaml, nexus)
        #[arg(long)]
        reader: String,

        /// Writer format (yaml, nexus)
        #[arg(long)]
        writer: String,

        /// Scratch area under the user directory
        #[arg(long, default_value = ADHOC_WORKFLOW)]
        workflow: String,

        #[command(flatten)]
        processor: ProcessorArgs,

        #[command(flatten)]
        code: CodeSource,

        /// Submit in batch mode
        #[arg(long)]
        batch: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Archive a user's workflow area into <user>/<workflow>.tar.gz
    Tar {
        /// Workflow name
        workflow: String,

        /// User name
        #[arg(short, long)]
        user: Option<String>,
    },
    /// List readers, writers and processors from the CHAP docs
    Catalog,
    /// Store an edited workflow config as <user>/<workflow>/chap.yaml
    SaveConfig {
        /// Workflow name
        workflow: String,

        /// User name
        #[arg(short, long)]
        user: Option<String>,

        /// YAML file holding the config
        #[arg(long)]
        file: PathBuf,
    },
    /// Commit the user's code area to the user repository
    Commit {
        /// User name
        #[arg(short, long)]
        user: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Publish a new release of the user repository
    Publish {
        /// User name
        #[arg(short, long)]
        user: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Notebooks on the configured Jupyter server
    Notebook {
        #[command(subcommand)]
        action: NotebookCommand,
    },
}

/// Jupyter notebook actions
#[derive(Subcommand, Debug)]
pub enum NotebookCommand {
    /// Create a new notebook in the user's area
    Create {
        /// User name
        #[arg(short, long)]
        user: Option<String>,
    },
    /// Print the code cells of a notebook
    Show {
        /// Notebook file
        #[arg(default_value = DEFAULT_NOTEBOOK)]
        file: String,

        /// User name
        #[arg(short, long)]
        user: Option<String>,
    },
}

/// User and processor naming
#[derive(Args, Debug, Clone)]
pub struct ProcessorArgs {
    /// User name
    #[arg(short, long)]
    pub user: Option<String>,

    /// Python module of the generated processor
    #[arg(long, default_value = DEFAULT_MODULE)]
    pub module: String,

    /// Processor class name
    #[arg(long, default_value = DEFAULT_PROCESSOR)]
    pub processor: String,
}

/// Where the user code comes from
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct CodeSource {
    /// Local .ipynb notebook
    #[arg(long)]
    pub notebook: Option<PathBuf>,

    /// Python source files, one cell each
    #[arg(long, num_args = 1..)]
    pub source: Vec<PathBuf>,

    /// Notebook on the configured Jupyter server
    #[arg(long, num_args = 0..=1, default_missing_value = DEFAULT_NOTEBOOK)]
    pub jupyter: Option<String>,
}

/// Dispatch a subcommand
pub async fn run(state: &AppState, command: Commands, default_user: Option<&str>) -> Result<()> {
    match command {
        Commands::Workflows { json } => list_workflows(state, json).await,
        Commands::Config { workflow, processor } => {
            let user = resolve_user(processor.user.as_deref(), default_user)?;
            let config = state
                .workflow_config(&user, &workflow, &processor.module, &processor.processor)
                .await?;
            print!("{}", config);
            Ok(())
        }
        Commands::Run {
            workflow,
            processor,
            code,
            batch,
            json,
        } => {
            let user = resolve_user(processor.user.as_deref(), default_user)?;
            let lines = collect_lines(state, &user, &code).await?;
            let request = RunRequest {
                user,
                workflow,
                module: processor.module,
                processor: processor.processor,
                lines,
                batch,
            };
            let report = state.run_workflow(&request).await?;
            print_report(&report, json)
        }
        Commands::Adhoc {
            reader,
            writer,
            workflow,
            processor,
            code,
            batch,
            json,
        } => {
            let user = resolve_user(processor.user.as_deref(), default_user)?;
            let lines = collect_lines(state, &user, &code).await?;
            let request = AdhocRunRequest {
                user,
                workflow,
                module: processor.module,
                processor: processor.processor,
                reader,
                writer,
                lines,
                batch,
            };
            let report = state.run_adhoc(&request).await?;
            print_report(&report, json)
        }
        Commands::Tar { workflow, user } => {
            let user = resolve_user(user.as_deref(), default_user)?;
            let archive = state.package(&user, &workflow).await?;
            println!("{}", "✓ Archive created".green().bold());
            println!("  {}", archive.display().to_string().cyan());
            Ok(())
        }
        Commands::Catalog => {
            let catalog = state.catalog().await;
            print_section("Readers", &catalog.readers);
            print_section("Writers", &catalog.writers);
            print_section("Processors", &catalog.processors);
            Ok(())
        }
        Commands::SaveConfig {
            workflow,
            user,
            file,
        } => {
            let user = resolve_user(user.as_deref(), default_user)?;
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read config file {}", file.display()))?;
            let saved = state.save_config(&user, &workflow, &text).await?;
            println!("{}", "✓ Config saved".green().bold());
            println!("  {}", saved.display().to_string().cyan());
            Ok(())
        }
        Commands::Commit { user, json } => {
            let user = resolve_user(user.as_deref(), default_user)?;
            print_release(state.commit(&user).await, json)
        }
        Commands::Publish { user, json } => {
            let user = resolve_user(user.as_deref(), default_user)?;
            print_release(state.publish(&user).await, json)
        }
        Commands::Notebook { action } => match action {
            NotebookCommand::Create { user } => {
                let user = resolve_user(user.as_deref(), default_user)?;
                let record = state.create_notebook(&user).await?;
                println!("{}", "✓ Notebook created".green().bold());
                println!("  {}", record.path.cyan());
                Ok(())
            }
            NotebookCommand::Show { file, user } => {
                let user = resolve_user(user.as_deref(), default_user)?;
                for (i, cell) in state.capture_notebook(&user, &file).await?.iter().enumerate() {
                    println!("{}", format!("# cell {}", i + 1).dimmed());
                    println!("{}", cell);
                }
                Ok(())
            }
        },
    }
}

/// User from the command line, falling back to the development user
pub fn resolve_user(user: Option<&str>, default_user: Option<&str>) -> Result<String> {
    match user.or(default_user) {
        Some(user) => Ok(user.to_string()),
        None => bail!("no user given, pass --user"),
    }
}

async fn list_workflows(state: &AppState, json: bool) -> Result<()> {
    let snapshot = state.registry.workflows().await;

    if json {
        print_json(snapshot.workflows())?;
        return Ok(());
    }

    if snapshot.is_empty() {
        println!(
            "{}",
            format!("No workflows under {}", state.registry.root().display()).yellow()
        );
        return Ok(());
    }

    println!(
        "{} {}",
        "Workflows".bold(),
        format!("(scanned {})", snapshot.refreshed_at().to_rfc3339()).dimmed()
    );
    for workflow in snapshot.workflows() {
        println!(
            "  {} {} {}",
            workflow.name.cyan(),
            workflow.version.dimmed(),
            workflow.description
        );
    }
    Ok(())
}

async fn collect_lines(state: &AppState, user: &str, code: &CodeSource) -> Result<Vec<String>> {
    if let Some(path) = &code.notebook {
        let record = NotebookRecord::from_ipynb_file(path)
            .await
            .with_context(|| format!("Failed to read notebook {}", path.display()))?;
        return Ok(record.cell_sources());
    }

    if let Some(file) = &code.jupyter {
        return Ok(state.capture_notebook(user, file).await?);
    }

    let mut lines = Vec::with_capacity(code.source.len());
    for path in &code.source {
        debug!("Reading user code from {}", path.display());
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read source file {}", path.display()))?;
        lines.push(text.trim_end_matches('\n').to_string());
    }
    Ok(lines)
}

fn print_report(report: &RunReport, json: bool) -> Result<()> {
    if json {
        print_json(report)?;
    } else {
        match report.status {
            RunStatus::Success => println!(
                "{} {}",
                "✓ Pipeline succeeded:".green().bold(),
                report.workflow.bold()
            ),
            RunStatus::Error => println!(
                "{} {}",
                "✗ Pipeline failed:".red().bold(),
                report.workflow.bold()
            ),
        }
        if let Some(code) = &report.code {
            println!("  Code:   {}", code.path.display().to_string().cyan());
        }
        if let Some(result) = &report.result {
            println!("  Run:    {}", result.run_id.dimmed());
            println!("  Took:   {:.2}s", result.duration.as_secs_f64());
        }
        println!("{}", "Config:".bold());
        print!("{}", report.config);
        if !report.stdout.is_empty() {
            println!("{}", "Output:".bold());
            print!("{}", report.stdout);
        }
        if !report.stderr.is_empty() {
            println!("{}", "Errors:".bold());
            print!("{}", report.stderr.red());
        }
        if let Some(error) = &report.error {
            println!("{} {}", "Error:".red().bold(), error);
        }
    }

    if report.status == RunStatus::Error {
        bail!("pipeline run of {} failed", report.workflow);
    }
    Ok(())
}

fn print_release(result: Result<ReleaseReport, ChapError>, json: bool) -> Result<()> {
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            if let Some((stdout, stderr)) = e.captured_output() {
                print!("{}", stdout);
                eprint!("{}", stderr.red());
            }
            return Err(e.into());
        }
    };

    if json {
        return print_json(&report);
    }
    println!(
        "{} {} {}",
        format!("✓ {}", report.action).green().bold(),
        report.user.bold(),
        format!("({})", report.repo).dimmed()
    );
    if !report.stdout.is_empty() {
        print!("{}", report.stdout);
    }
    if let Some(link) = &report.doi_link {
        println!("  DOI:    {}", link.cyan());
    }
    Ok(())
}

fn print_section(title: &str, names: &[String]) {
    println!("{}", title.bold());
    if names.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for name in names {
        println!("  {}", name.cyan());
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}
