// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-freeze
//!
//! Command-line interface for the model freezer.
//!
//! ## Usage
//! ```bash
//! # Freeze with the built-in defaults
//! model-freeze freeze
//!
//! # Freeze a specific model into a specific directory
//! model-freeze freeze --model TL_handling/tl_classifier_model --output-dir out/
//!
//! # Inspect a frozen graph
//! model-freeze inspect --graph out/tl_classifier_tf_model1.pb
//!
//! # Print the effective configuration
//! model-freeze -c freeze.toml config
//! ```

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "model-freeze",
    about = "Freeze a trained model into a single self-contained graph file",
    version,
    author
)]
struct Cli {
    /// Path to a TOML configuration file (CLI arguments override its values).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging (repeat for more: -v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a model, freeze its variables and write the graph file.
    Freeze {
        #[command(flatten)]
        overrides: commands::Overrides,
    },

    /// Print the nodes of a frozen graph file.
    Inspect {
        /// Path to a frozen graph (binary or text).
        #[arg(short, long)]
        graph: PathBuf,
    },

    /// Print the effective configuration as TOML.
    Config {
        #[command(flatten)]
        overrides: commands::Overrides,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing/logging based on verbosity.
    commands::init_tracing(cli.verbose);

    match cli.command {
        Commands::Freeze { overrides } => {
            let config = commands::resolve_config(cli.config.as_deref(), overrides)?;
            commands::freeze::execute(config)
        }
        Commands::Inspect { graph } => commands::inspect::execute(graph),
        Commands::Config { overrides } => {
            let config = commands::resolve_config(cli.config.as_deref(), overrides)?;
            commands::config::execute(&config)
        }
    }
}
