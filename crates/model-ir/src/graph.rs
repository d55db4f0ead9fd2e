// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Computation graph IR: the serializable node list a session exports and
//! the freezer rewrites.
//!
//! ```text
//!   x (Placeholder)   dense/kernel (Variable)
//!          \             /
//!         dense/MatMul (MatMul)     dense/bias (Variable)
//!                    \                /
//!                   dense/BiasAdd (BiasAdd)
//! ```
//!
//! Nodes are kept in insertion order and every input must name a node
//! added *earlier*, so a [`GraphDef`] built through [`GraphDef::add_node`]
//! is always a DAG in topological order. Attributes are stored in a
//! `BTreeMap` so that encoding a graph is deterministic.

use crate::ModelError;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tensor_core::{DType, Shape, Tensor};

/// Prefix marking a control (ordering-only) input.
pub const CONTROL_PREFIX: char = '^';

/// Suffix of the placeholder that feeds a variable's assign op.
pub const ASSIGN_VALUE_SUFFIX: &str = "assign_value";

/// Suffix of a variable's assign op.
pub const ASSIGN_SUFFIX: &str = "Assign";

/// Suffix of the keep-probability constant of a training-phase dropout.
pub const KEEP_PROB_SUFFIX: &str = "keep_prob";

/// Suffix of the noise node of a training-phase dropout.
pub const RANDOM_UNIFORM_SUFFIX: &str = "random_uniform";

/// Returns `true` if `suffix` names a node a session generates under a
/// layer or variable name (`<name>/<suffix>`): any op name or one of the
/// helper suffixes above.
pub fn is_generated_suffix(suffix: &str) -> bool {
    [ASSIGN_VALUE_SUFFIX, KEEP_PROB_SUFFIX, RANDOM_UNIFORM_SUFFIX].contains(&suffix)
        || Op::ALL.iter().any(|op| op.as_str() == suffix)
}

/// Operation performed by a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Op {
    /// Value fed at run time.
    Placeholder,
    /// Fixed tensor carried in the `value` attribute.
    Const,
    /// Mutable parameter whose value lives in the session.
    Variable,
    /// Writes its second input into the variable named by its first.
    Assign,
    Identity,
    MatMul,
    BiasAdd,
    Add,
    Conv2D,
    MaxPool,
    Reshape,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
    FusedBatchNorm,
    /// Training-phase dropout: `(x, keep_prob, noise)`.
    Dropout,
    RandomUniform,
}

impl Op {
    /// Every op, in declaration order.
    pub const ALL: [Op; 18] = [
        Op::Placeholder,
        Op::Const,
        Op::Variable,
        Op::Assign,
        Op::Identity,
        Op::MatMul,
        Op::BiasAdd,
        Op::Add,
        Op::Conv2D,
        Op::MaxPool,
        Op::Reshape,
        Op::Relu,
        Op::Sigmoid,
        Op::Tanh,
        Op::Softmax,
        Op::FusedBatchNorm,
        Op::Dropout,
        Op::RandomUniform,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Placeholder => "Placeholder",
            Op::Const => "Const",
            Op::Variable => "Variable",
            Op::Assign => "Assign",
            Op::Identity => "Identity",
            Op::MatMul => "MatMul",
            Op::BiasAdd => "BiasAdd",
            Op::Add => "Add",
            Op::Conv2D => "Conv2D",
            Op::MaxPool => "MaxPool",
            Op::Reshape => "Reshape",
            Op::Relu => "Relu",
            Op::Sigmoid => "Sigmoid",
            Op::Tanh => "Tanh",
            Op::Softmax => "Softmax",
            Op::FusedBatchNorm => "FusedBatchNorm",
            Op::Dropout => "Dropout",
            Op::RandomUniform => "RandomUniform",
        }
    }

    /// Returns `true` for ops that hold mutable state.
    pub fn is_variable(&self) -> bool {
        matches!(self, Op::Variable)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed node attribute.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    Bool(bool),
    Int(i64),
    Float(f32),
    Str(String),
    Ints(Vec<i64>),
    Type(DType),
    Shape(Shape),
    Tensor(Tensor),
}

impl AttrValue {
    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            AttrValue::Tensor(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<DType> {
        match self {
            AttrValue::Type(t) => Some(*t),
            _ => None,
        }
    }
}

/// A single node of a [`GraphDef`].
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NodeDef {
    /// Unique node name.
    pub name: String,
    pub op: Op,
    /// Upstream node names; `^name` marks a control input.
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Placement annotation (e.g., `"/device:CPU:0"`); empty when unplaced.
    #[serde(default)]
    pub device: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, AttrValue>,
}

impl NodeDef {
    /// Creates a node with no inputs, device or attributes.
    pub fn new(name: impl Into<String>, op: Op) -> Self {
        Self {
            name: name.into(),
            op,
            inputs: Vec::new(),
            device: String::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_inputs<I, S>(mut self, inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs = inputs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attr(mut self, key: &str, value: AttrValue) -> Self {
        self.attrs.insert(key.to_string(), value);
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = device.into();
        self
    }

    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.get(key)
    }

    /// Names of all upstream nodes, data and control, without the `^`
    /// marker.
    pub fn input_nodes(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().map(|i| node_name(i))
    }
}

/// Strips the control-input marker from an input reference.
pub fn node_name(input: &str) -> &str {
    input.strip_prefix(CONTROL_PREFIX).unwrap_or(input)
}

/// An ordered, serializable computation graph.
///
/// A name index is kept next to the node list; it is not serialized and
/// is rebuilt (with the same checks as [`add_node`](Self::add_node)) when
/// a graph is deserialized.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawGraphDef")]
pub struct GraphDef {
    nodes: Vec<NodeDef>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

/// Unchecked wire form of a [`GraphDef`].
#[derive(serde::Deserialize)]
struct RawGraphDef {
    nodes: Vec<NodeDef>,
}

impl TryFrom<RawGraphDef> for GraphDef {
    type Error = ModelError;

    fn try_from(raw: RawGraphDef) -> Result<Self, Self::Error> {
        GraphDef::from_nodes(raw.nodes)
    }
}

impl PartialEq for GraphDef {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl GraphDef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from a node list, checking it the same way
    /// [`add_node`](Self::add_node) does.
    pub fn from_nodes(nodes: Vec<NodeDef>) -> Result<Self, ModelError> {
        let mut graph = Self {
            nodes: Vec::with_capacity(nodes.len()),
            index: HashMap::with_capacity(nodes.len()),
        };
        for node in nodes {
            graph.add_node(node)?;
        }
        Ok(graph)
    }

    /// Appends a node.
    ///
    /// Fails if the name is already taken or an input names a node that
    /// has not been added yet.
    pub fn add_node(&mut self, node: NodeDef) -> Result<(), ModelError> {
        if self.contains(&node.name) {
            return Err(ModelError::InvalidGraph(format!(
                "duplicate node name '{}'",
                node.name
            )));
        }
        if let Some(missing) = node.input_nodes().find(|i| !self.contains(i)) {
            return Err(ModelError::InvalidGraph(format!(
                "node '{}' references unknown input '{missing}'",
                node.name
            )));
        }
        self.index.insert(node.name.clone(), self.nodes.len());
        self.nodes.push(node);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NodeDef] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<NodeDef> {
        self.nodes
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&NodeDef> {
        self.index.get(name).map(|&i| &self.nodes[i])
    }

    /// Number of nodes performing `op`.
    pub fn count_op(&self, op: Op) -> usize {
        self.nodes.iter().filter(|n| n.op == op).count()
    }

    /// Empties every node's placement annotation.
    pub fn clear_devices(&mut self) {
        for node in &mut self.nodes {
            node.device.clear();
        }
    }

    /// Collects the names of every node reachable from `roots` by walking
    /// data and control inputs backwards.
    ///
    /// Fails with [`ModelError::NodeNotFound`] on the first root that is
    /// not in the graph.
    pub fn reachable_from<S: AsRef<str>>(&self, roots: &[S]) -> Result<HashSet<String>, ModelError> {
        let mut stack = Vec::with_capacity(roots.len());
        for root in roots {
            let name = node_name(root.as_ref());
            if !self.contains(name) {
                return Err(ModelError::NodeNotFound {
                    name: name.to_string(),
                });
            }
            stack.push(name);
        }

        let mut seen: HashSet<String> = HashSet::new();
        while let Some(name) = stack.pop() {
            if !seen.insert(name.to_string()) {
                continue;
            }
            let node = self.node(name).ok_or_else(|| ModelError::NodeNotFound {
                name: name.to_string(),
            })?;
            stack.extend(node.input_nodes());
        }
        Ok(seen)
    }

    /// Returns a summary string: node count and op histogram.
    pub fn summary(&self) -> String {
        let mut ops: BTreeMap<&str, usize> = BTreeMap::new();
        for node in &self.nodes {
            *ops.entry(node.op.as_str()).or_default() += 1;
        }
        let histogram: Vec<String> = ops.iter().map(|(op, n)| format!("{op}={n}")).collect();
        format!("{} nodes ({})", self.nodes.len(), histogram.join(", "))
    }
}

impl fmt::Display for GraphDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "GraphDef ({} nodes):", self.nodes.len())?;
        for node in &self.nodes {
            write!(f, "  {} = {}({})", node.name, node.op, node.inputs.join(", "))?;
            if !node.device.is_empty() {
                write!(f, " @ {}", node.device)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> GraphDef {
        GraphDef::from_nodes(vec![
            NodeDef::new("x", Op::Placeholder),
            NodeDef::new("w", Op::Variable),
            NodeDef::new("w/assign_value", Op::Placeholder),
            NodeDef::new("w/Assign", Op::Assign).with_inputs(["w", "w/assign_value"]),
            NodeDef::new("y", Op::MatMul).with_inputs(["x", "w"]),
            NodeDef::new("z", Op::Identity).with_inputs(["y", "^w/Assign"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_add_node_rejects_duplicates() {
        let mut g = sample_graph();
        let result = g.add_node(NodeDef::new("x", Op::Placeholder));
        assert!(matches!(result, Err(ModelError::InvalidGraph(_))));
    }

    #[test]
    fn test_add_node_rejects_forward_reference() {
        let mut g = GraphDef::new();
        let result = g.add_node(NodeDef::new("y", Op::Relu).with_inputs(["later"]));
        assert!(result.is_err());
        assert!(g.is_empty());
    }

    #[test]
    fn test_reachable_data_inputs() {
        let g = sample_graph();
        let reach = g.reachable_from(&["y"]).unwrap();
        let mut names: Vec<_> = reach.iter().map(String::as_str).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["w", "x", "y"]);
    }

    #[test]
    fn test_reachable_follows_control_inputs() {
        let g = sample_graph();
        let reach = g.reachable_from(&["z"]).unwrap();
        assert!(reach.contains("w/Assign"));
        assert!(reach.contains("w/assign_value"));
        assert_eq!(reach.len(), 6);
    }

    #[test]
    fn test_reachable_unknown_root() {
        let g = sample_graph();
        let result = g.reachable_from(&["nope"]);
        assert!(matches!(result, Err(ModelError::NodeNotFound { name }) if name == "nope"));
    }

    #[test]
    fn test_node_lookup_by_name() {
        let g = sample_graph();
        assert_eq!(g.node("w/Assign").map(|n| n.op), Some(Op::Assign));
        assert!(g.contains("z"));
        assert!(g.node("^w").is_none());

        let rebuilt = GraphDef::from_nodes(g.clone().into_nodes()).unwrap();
        assert_eq!(rebuilt, g);
        assert_eq!(rebuilt.node("y").map(|n| n.inputs.len()), Some(2));
    }

    #[test]
    fn test_deserialize_rebuilds_index() {
        let g = sample_graph();
        let json = serde_json::to_string(&g).unwrap();
        let back: GraphDef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, g);
        assert_eq!(back.node("z").map(|n| n.op), Some(Op::Identity));
    }

    #[test]
    fn test_deserialize_rejects_invalid_graph() {
        let dup = r#"{"nodes":[{"name":"a","op":"Placeholder"},{"name":"a","op":"Placeholder"}]}"#;
        assert!(serde_json::from_str::<GraphDef>(dup).is_err());

        let dangling = r#"{"nodes":[{"name":"b","op":"Relu","inputs":["a"]}]}"#;
        assert!(serde_json::from_str::<GraphDef>(dangling).is_err());
    }

    #[test]
    fn test_clear_devices() {
        let mut g = GraphDef::from_nodes(vec![
            NodeDef::new("a", Op::Placeholder).with_device("/device:GPU:0"),
            NodeDef::new("b", Op::Relu).with_inputs(["a"]).with_device("/device:CPU:0"),
        ])
        .unwrap();
        g.clear_devices();
        assert!(g.nodes().iter().all(|n| n.device.is_empty()));
    }

    #[test]
    fn test_count_op_and_summary() {
        let g = sample_graph();
        assert_eq!(g.count_op(Op::Placeholder), 2);
        assert_eq!(g.count_op(Op::Variable), 1);
        let s = g.summary();
        assert!(s.starts_with("6 nodes"));
        assert!(s.contains("Placeholder=2"));
    }

    #[test]
    fn test_display() {
        let g = sample_graph();
        let text = format!("{g}");
        assert!(text.contains("y = MatMul(x, w)"));
        assert!(text.contains("z = Identity(y, ^w/Assign)"));
    }

    #[test]
    fn test_node_name_strips_control_marker() {
        assert_eq!(node_name("^init"), "init");
        assert_eq!(node_name("dense/MatMul"), "dense/MatMul");
    }

    #[test]
    fn test_generated_suffixes() {
        assert!(is_generated_suffix("MatMul"));
        assert!(is_generated_suffix(ASSIGN_SUFFIX));
        assert!(is_generated_suffix(ASSIGN_VALUE_SUFFIX));
        assert!(is_generated_suffix(KEEP_PROB_SUFFIX));
        assert!(!is_generated_suffix("kernel"));
        assert!(!is_generated_suffix("moving_mean"));
    }

    #[test]
    fn test_attr_accessors() {
        let node = NodeDef::new("c", Op::Const)
            .with_attr("dtype", AttrValue::Type(DType::F32))
            .with_attr("value", AttrValue::Tensor(Tensor::scalar_f32(1.0)))
            .with_attr("is_training", AttrValue::Bool(false));
        assert_eq!(node.attr("dtype").and_then(AttrValue::as_type), Some(DType::F32));
        assert!(node.attr("value").and_then(AttrValue::as_tensor).is_some());
        assert_eq!(node.attr("is_training").and_then(AttrValue::as_bool), Some(false));
        assert!(node.attr("missing").is_none());
    }
}
