//! `switchyard` command-line runner.

mod commands;
mod config;
mod error;

use clap::{Parser, Subcommand};
use crate::commands::{InputSource, Runner};
use crate::config::CliConfig;
use crate::error::CliError;
use rootcause::prelude::Report;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use switchyard_workflow::ExecutionStatus;

/// Run and inspect switchyard workflows
#[derive(Parser)]
#[command(name = "switchyard")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: ./switchyard.toml if present)
    #[arg(long, global = true, env = "SWITCHYARD_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a workflow and print its execution record
    Run {
        /// Path to the workflow definition (JSON)
        workflow: PathBuf,

        /// Run input as inline JSON
        #[arg(long, conflicts_with = "input_file")]
        input: Option<String>,

        /// Run input read from a JSON file
        #[arg(long)]
        input_file: Option<PathBuf>,
    },
    /// Check a workflow definition without running it
    Validate {
        /// Path to the workflow definition (JSON)
        workflow: PathBuf,
    },
    /// Print a stored execution record
    Show {
        /// Execution id
        id: String,
    },
    /// Cancel a running execution
    Cancel {
        /// Execution id
        id: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match CliConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| config.log_filter.clone().into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    tracing::debug!(store_dir = %config.store_dir.display(), "Loaded configuration");

    match dispatch(cli.command, &config).await {
        Ok(code) => code,
        Err(report) => {
            eprintln!("error: {report}");
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(command: Command, config: &CliConfig) -> Result<ExitCode, Report<CliError>> {
    let runner = Runner::from_config(config);
    match command {
        Command::Run {
            workflow,
            input,
            input_file,
        } => {
            let source = match (input, input_file) {
                (Some(json), _) => InputSource::Inline(json),
                (None, Some(path)) => InputSource::File(path),
                (None, None) => InputSource::None,
            };
            let execution = runner.run(&workflow, &source).await?;
            print_json(&execution)?;
            Ok(exit_code(execution.status))
        }
        Command::Validate { workflow } => {
            let report = runner.validate(&workflow).await?;
            print_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Show { id } => {
            let execution = runner.show(&id).await?;
            print_json(&execution)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Cancel { id } => {
            let execution = runner.cancel(&id).await?;
            print_json(&execution)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_json(value: &impl Serialize) -> Result<(), Report<CliError>> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| Report::new(e).context(CliError::Output))?;
    println!("{json}");
    Ok(())
}

fn exit_code(status: ExecutionStatus) -> ExitCode {
    if status == ExecutionStatus::Success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
