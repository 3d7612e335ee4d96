// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! `scheduler` CLI: dry-run a pipeline against a request fixture, validate
//! a pipeline config file, or print the JSON schema for a wire type —
//! all without standing up the HTTP adapter or a control plane.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use commands::SchemaKind;

#[derive(Parser, Debug)]
#[command(name = "scheduler", version, about = "Scheduler pipeline CLI")]
struct Args {
    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the JSON schema for a wire type.
    Schema {
        /// Which type's schema to print.
        #[arg(value_enum)]
        kind: SchemaArg,
    },
    /// Build a pipeline from a config file and run it against a request
    /// fixture, printing the resulting decision as JSON.
    DryRun {
        /// Path to a TOML file holding a `[[pipelines]]` array.
        #[arg(long)]
        config: PathBuf,
        /// Name of the pipeline to run, as it appears in `config`.
        #[arg(long)]
        pipeline: String,
        /// Path to a JSON file holding a `Request` fixture.
        #[arg(long)]
        request: PathBuf,
    },
    /// Load and admission-validate every pipeline in a config file,
    /// printing any warnings.
    Validate {
        /// Path to a TOML file holding a `[[pipelines]]` array.
        #[arg(long)]
        config: PathBuf,
    },
}

/// CLI-facing mirror of [`SchemaKind`] deriving `clap::ValueEnum`.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum SchemaArg {
    Request,
    Decision,
    PipelineConfig,
}

impl From<SchemaArg> for SchemaKind {
    fn from(arg: SchemaArg) -> Self {
        match arg {
            SchemaArg::Request => SchemaKind::Request,
            SchemaArg::Decision => SchemaKind::Decision,
            SchemaArg::PipelineConfig => SchemaKind::PipelineConfig,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("scheduler=debug")
    } else {
        EnvFilter::new("scheduler=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Command::Schema { kind } => {
            let json = commands::schema_json(kind.into())?;
            println!("{json}");
        }
        Command::DryRun { config, pipeline, request } => {
            let decision = commands::dry_run(&config, &pipeline, &request).await?;
            println!("{}", serde_json::to_string_pretty(&decision)?);
        }
        Command::Validate { config } => {
            let warnings = commands::validate_config_file(&config)?;
            if warnings.is_empty() {
                println!("ok: no warnings");
            } else {
                for warning in warnings {
                    println!("warning: {warning}");
                }
            }
        }
    }

    Ok(())
}
