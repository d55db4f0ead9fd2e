// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `model-freeze freeze` command: load, freeze and write a model.
//!
//! Walks the full type-state pipeline:
//! ```text
//! FreezePipeline<Configured> → load → <Loaded> → freeze → <Frozen> → write → <Serialized>
//! ```

use anyhow::Context;
use freezer::{FreezeConfig, FreezePipeline};

/// Printed after the graph file has been written.
const COMPLETION_MARKER: &str = "Fertig";

pub fn execute(config: FreezeConfig) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║              model-freeze · Freezer                 ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    println!("  Config:");
    println!("   Model:    {}", config.model_path.display());
    println!("   Output:   {}", config.output_path().display());
    println!("   Phase:    {:?}", config.learning_phase);
    println!("   Format:   {}", config.graph_format());
    println!();

    // Step 1: Configured → Loaded.
    println!("  [1/3] Loading model...");
    let model_path = config.model_path.clone();
    let loaded = FreezePipeline::new(config)?
        .load()
        .with_context(|| format!("failed to load model '{}'", model_path.display()))?;
    println!("        {}", loaded.model().summary());
    println!("        {}", loaded.session().summary());
    println!();

    // Step 2: Loaded → Frozen.
    println!("  [2/3] Freezing variables for {:?}...", loaded.output_names());
    let frozen = loaded.freeze().context("failed to freeze session")?;
    println!("        {}", frozen.frozen_graph().summary());
    println!();

    // Step 3: Frozen → Serialized.
    println!("  [3/3] Writing graph...");
    let done = frozen.write().context("failed to write frozen graph")?;
    println!("        {}", done.output_path().display());
    println!();

    println!("  {}", done.report().summary());
    println!();
    println!("{COMPLETION_MARKER}");
    Ok(())
}
