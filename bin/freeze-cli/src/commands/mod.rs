// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Subcommands and the pieces they share: logging setup and config
//! resolution.

pub mod config;
pub mod freeze;
pub mod inspect;

use anyhow::Context;
use freezer::{FreezeConfig, LearningPhase};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `-v` count picks the level
/// (none = warn, `-v` = info, `-vv` = debug, `-vvv` = trace).
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Command-line values that override the configuration file.
#[derive(Debug, Default, clap::Args)]
pub struct Overrides {
    /// Model prefix (`<prefix>.json` and `<prefix>.<weights-ext>` are read).
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Extension of the weights file. The file must be SafeTensors; HDF5
    /// (`.h5`) is not read.
    #[arg(long)]
    pub weights_ext: Option<String>,

    /// Directory the frozen graph is written to.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// File name of the frozen graph.
    #[arg(short = 'f', long)]
    pub output_file: Option<String>,

    /// Output node to freeze for (repeatable; defaults to the model outputs).
    #[arg(long = "output-name")]
    pub output_names: Vec<String>,

    /// Variable to leave mutable (repeatable).
    #[arg(long = "keep-var")]
    pub keep_var_names: Vec<String>,

    /// Build the session in the training phase.
    #[arg(long)]
    pub training: bool,

    /// Keep device placements in the written graph.
    #[arg(long)]
    pub keep_devices: bool,

    /// Device placement for session nodes.
    #[arg(long)]
    pub device: Option<String>,

    /// Write pretty JSON instead of the binary format.
    #[arg(long)]
    pub as_text: bool,
}

impl Overrides {
    pub fn apply(self, config: &mut FreezeConfig) {
        if let Some(model) = self.model {
            config.model_path = model;
        }
        if let Some(ext) = self.weights_ext {
            config.weights_extension = ext;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(file) = self.output_file {
            config.output_file = file;
        }
        if !self.output_names.is_empty() {
            config.output_names = self.output_names;
        }
        if !self.keep_var_names.is_empty() {
            config.keep_var_names = self.keep_var_names;
        }
        if self.training {
            config.learning_phase = LearningPhase::Training;
        }
        if self.keep_devices {
            config.clear_devices = false;
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if self.as_text {
            config.as_text = true;
        }
    }
}

/// Loads the config file (or the defaults) and applies CLI overrides.
pub fn resolve_config(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<FreezeConfig> {
    let mut config = match path {
        Some(path) => FreezeConfig::from_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => FreezeConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate().context("invalid configuration")?;
    tracing::debug!("effective configuration: {config:?}");
    Ok(config)
}

/// Truncates a string to `max_len` with ellipsis if needed.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
