// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `model-freeze inspect` command: display the contents of a frozen graph.

use super::truncate;
use anyhow::Context;
use model_ir::AttrValue;
use std::path::PathBuf;

pub fn execute(graph: PathBuf) -> anyhow::Result<()> {
    println!("╔══════════════════════════════════════════════════════╗");
    println!("║            model-freeze · Graph Inspector           ║");
    println!("╚══════════════════════════════════════════════════════╝");
    println!();

    let frozen = freezer::read_graph(&graph)
        .with_context(|| format!("failed to read graph '{}'", graph.display()))?;

    // ── Summary ────────────────────────────────────────────────
    println!("  File:      {}", graph.display());
    println!("  Nodes:     {}", frozen.num_nodes());
    println!("  Outputs:   {}", frozen.outputs().join(", "));
    println!("  Variables: {}", frozen.variable_nodes().len());
    println!(
        "  Constants: {:.2} MB",
        frozen.constant_bytes() as f64 / (1024.0 * 1024.0),
    );
    println!();

    // ── Per-Node Detail ────────────────────────────────────────
    println!("  {:<4} {:<32} {:<16} {:<18} Inputs", "Idx", "Name", "Op", "Value");
    println!("  {}", "-".repeat(90));

    for (i, node) in frozen.graph().nodes().iter().enumerate() {
        let value = match node.attr("value").and_then(AttrValue::as_tensor) {
            Some(t) => format!("{} {}", t.dtype(), t.shape()),
            None => String::new(),
        };
        println!(
            "  {:<4} {:<32} {:<16} {:<18} {}",
            i,
            truncate(&node.name, 32),
            node.op.as_str(),
            value,
            node.inputs.join(", "),
        );
    }
    println!();
    Ok(())
}
