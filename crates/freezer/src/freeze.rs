// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Freezing: replacing session variables with constants and pruning the
//! graph to what the outputs need.
//!
//! ```text
//!   Session ──graph_def()──► GraphDef ──clear_devices──► GraphDef
//!                                                          │
//!                          extract_sub_graph(roots)        ▼
//!                                                       pruned
//!                                                          │
//!            convert_variables_to_constants(session)      ▼
//!                                                     FrozenGraph
//! ```
//!
//! The roots are the requested outputs followed by every session
//! variable, so a variable survives pruning even when no output reads
//! it. Loader plumbing (`<var>/Assign`, `<var>/assign_value`) is never an
//! input of anything the roots reach and disappears.

use crate::session::{const_node, Session};
use crate::FreezeError;
use model_ir::{AttrValue, GraphDef, ModelError, NodeDef, Op};
use std::collections::{BTreeSet, HashSet};

/// Options controlling [`freeze_session`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreezeOptions {
    /// Variables left mutable in the frozen graph.
    pub keep_var_names: BTreeSet<String>,
    /// Strip placement annotations so the graph loads on any device.
    pub clear_devices: bool,
}

impl Default for FreezeOptions {
    fn default() -> Self {
        Self {
            keep_var_names: BTreeSet::new(),
            clear_devices: true,
        }
    }
}

/// A pruned graph whose frozen variables are constants.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FrozenGraph {
    graph: GraphDef,
    /// Output identifiers as requested by the caller.
    outputs: Vec<String>,
    /// Outputs plus every session variable; the graph is exactly what
    /// these reach.
    roots: Vec<String>,
}

impl FrozenGraph {
    /// Wraps an already pruned graph.
    pub fn new(graph: GraphDef, outputs: Vec<String>, roots: Vec<String>) -> Self {
        Self { graph, outputs, roots }
    }

    pub fn graph(&self) -> &GraphDef {
        &self.graph
    }

    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.len()
    }

    /// Names of nodes that are still mutable variables.
    pub fn variable_nodes(&self) -> Vec<&str> {
        self.graph
            .nodes()
            .iter()
            .filter(|n| n.op.is_variable())
            .map(|n| n.name.as_str())
            .collect()
    }

    /// Total size of all constant payloads in bytes.
    pub fn constant_bytes(&self) -> usize {
        self.graph
            .nodes()
            .iter()
            .filter(|n| n.op == Op::Const)
            .filter_map(|n| n.attr("value").and_then(AttrValue::as_tensor))
            .map(|t| t.size_bytes())
            .sum()
    }

    /// Nodes not reachable from [`roots`](Self::roots). Empty for any
    /// graph produced by [`freeze_session`].
    pub fn unreachable_nodes(&self) -> Result<Vec<&str>, FreezeError> {
        let reach = self.graph.reachable_from(self.roots.as_slice()).map_err(root_not_found)?;
        Ok(self
            .graph
            .nodes()
            .iter()
            .map(|n| n.name.as_str())
            .filter(|name| !reach.contains(*name))
            .collect())
    }

    /// Returns a summary string describing the frozen graph.
    pub fn summary(&self) -> String {
        format!(
            "FrozenGraph: {} outputs, {} variables left, {:.2} MB constants, {}",
            self.outputs.len(),
            self.variable_nodes().len(),
            self.constant_bytes() as f64 / (1024.0 * 1024.0),
            self.graph.summary(),
        )
    }

    pub fn into_graph(self) -> GraphDef {
        self.graph
    }
}

/// Freezes `session` into a self-contained graph.
///
/// Every variable not named in `options.keep_var_names` is replaced by a
/// `Const` node carrying its current session value, and the graph is
/// pruned to the nodes reachable from `output_names` and the session
/// variables.
///
/// # Errors
/// - [`FreezeError::OutputNotFound`] if an output name is not a graph node.
/// - [`FreezeError::UninitializedVariable`] if a frozen variable has no value.
pub fn freeze_session(
    session: &Session,
    output_names: &[String],
    options: &FreezeOptions,
) -> Result<FrozenGraph, FreezeError> {
    let freeze_vars: BTreeSet<String> = session
        .global_variables()
        .iter()
        .filter(|v| !options.keep_var_names.contains(*v))
        .cloned()
        .collect();

    let mut seen: HashSet<&String> = HashSet::new();
    let roots: Vec<String> = output_names
        .iter()
        .chain(session.global_variables())
        .filter(|name| seen.insert(*name))
        .cloned()
        .collect();

    let mut graph = session.graph_def();
    if options.clear_devices {
        graph.clear_devices();
    }

    let before = graph.len();
    let pruned = extract_sub_graph(&graph, &roots)?;
    let frozen = convert_variables_to_constants(pruned, session, &freeze_vars)?;

    tracing::info!(
        "froze {} variables ({} kept), {} -> {} nodes",
        freeze_vars.len(),
        session.global_variables().len() - freeze_vars.len(),
        before,
        frozen.len(),
    );

    Ok(FrozenGraph::new(frozen, output_names.to_vec(), roots))
}

/// Returns the nodes of `graph` reachable from `roots`, in their original
/// relative order.
pub fn extract_sub_graph(graph: &GraphDef, roots: &[String]) -> Result<GraphDef, FreezeError> {
    let reach = graph.reachable_from(roots).map_err(root_not_found)?;
    let nodes: Vec<NodeDef> = graph
        .nodes()
        .iter()
        .filter(|n| reach.contains(&n.name))
        .cloned()
        .collect();
    // A closed-under-inputs subset of a topologically ordered graph is
    // itself topologically ordered.
    Ok(GraphDef::from_nodes(nodes)?)
}

/// Replaces every `Variable` node named in `freeze` with a `Const` node
/// holding the session's current value.
pub fn convert_variables_to_constants(
    graph: GraphDef,
    session: &Session,
    freeze: &BTreeSet<String>,
) -> Result<GraphDef, FreezeError> {
    let mut nodes = graph.into_nodes();
    for node in nodes.iter_mut() {
        if !node.op.is_variable() || !freeze.contains(&node.name) {
            continue;
        }
        let value = session
            .variable_value(&node.name)
            .ok_or_else(|| FreezeError::UninitializedVariable {
                name: node.name.clone(),
            })?;

        let declared = node.attr("dtype").and_then(AttrValue::as_type);
        if declared.is_some_and(|d| d != value.dtype()) {
            return Err(FreezeError::InvalidSession(format!(
                "variable '{}' holds {} but is declared {:?}",
                node.name,
                value.dtype(),
                declared,
            )));
        }

        let mut constant = const_node(&node.name, value.clone());
        constant.device = std::mem::take(&mut node.device);
        *node = constant;
    }
    Ok(GraphDef::from_nodes(nodes)?)
}

fn root_not_found(err: ModelError) -> FreezeError {
    match err {
        ModelError::NodeNotFound { name } => FreezeError::OutputNotFound { name },
        other => FreezeError::Model(other),
    }
}
