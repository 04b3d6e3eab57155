// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! stagelib CLI
//!
//! Command-line interface for validating, inspecting and running pipeline
//! definition files.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use stagelib::DriveMode;

mod commands;

#[derive(Parser)]
#[command(name = "stagelib")]
#[command(author, version, about = "Stage graph pipeline CLI", long_about = None)]
struct Cli {
    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect a pipeline definition and run it
    Run {
        /// Pipeline definition file (JSON, YAML or TOML)
        #[arg(value_name = "DEFINITION")]
        definition: PathBuf,

        /// Run at most this many cycles (overrides the file's run mode)
        #[arg(long)]
        cycles: Option<u64>,

        /// Drive mode (overrides the file's drive)
        #[arg(long, value_enum)]
        drive: Option<DriveArg>,

        /// Queue a frame file (JSON) on a source stage, as LABEL=FILE
        #[arg(long = "feed", value_name = "LABEL=FILE")]
        feeds: Vec<String>,

        /// Skip and log frames that fail a stage instead of stopping
        #[arg(long)]
        skip_errors: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check a definition: labels, references, cycles and parameters
    Validate {
        #[arg(value_name = "DEFINITION")]
        definition: PathBuf,
    },

    /// Print the stage graph of a definition in Graphviz DOT format
    Dot {
        #[arg(value_name = "DEFINITION")]
        definition: PathBuf,
    },

    /// List available stage types
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum DriveArg {
    Push,
    Pull,
}

impl From<DriveArg> for DriveMode {
    fn from(arg: DriveArg) -> Self {
        match arg {
            DriveArg::Push => DriveMode::Push,
            DriveArg::Pull => DriveMode::Pull,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Run {
            definition,
            cycles,
            drive,
            feeds,
            skip_errors,
            json,
        } => commands::run::run(
            &definition,
            commands::run::Overrides {
                cycles,
                drive: drive.map(DriveMode::from),
                skip_errors,
            },
            &feeds,
            json,
        )?,
        Commands::Validate { definition } => commands::validate::run(&definition)?,
        Commands::Dot { definition } => commands::dot::run(&definition)?,
        Commands::List => commands::list::stages()?,
    }

    Ok(())
}
