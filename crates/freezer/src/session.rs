// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The computation context: a live graph plus the mutable values of its
//! variables.
//!
//! A [`Session`] is an ordinary value. Its learning phase and device
//! placement are fixed by [`SessionOptions`] when it is created, before
//! any model is lowered into it, so there is no global flag whose setting
//! order matters.

use crate::lowering;
use crate::FreezeError;
use model_ir::graph::{ASSIGN_SUFFIX, ASSIGN_VALUE_SUFFIX};
use model_ir::{AttrValue, GraphDef, Model, NodeDef, Op};
use std::collections::HashMap;
use tensor_core::{DType, Shape, Tensor};

/// Whether layers are built with training-time or inference-time behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningPhase {
    /// Dropout is an identity, batch norm uses moving statistics.
    #[default]
    Inference,
    /// Dropout is active, batch norm uses batch statistics.
    Training,
}

impl LearningPhase {
    /// Numeric flag as ML frameworks spell it (`0` = inference, `1` = training).
    pub fn as_flag(self) -> u8 {
        match self {
            LearningPhase::Inference => 0,
            LearningPhase::Training => 1,
        }
    }

    pub fn from_flag(flag: u8) -> Option<Self> {
        match flag {
            0 => Some(LearningPhase::Inference),
            1 => Some(LearningPhase::Training),
            _ => None,
        }
    }

    pub fn is_training(self) -> bool {
        self == LearningPhase::Training
    }
}

/// Options fixed at session creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Learning phase used when lowering layers.
    pub learning_phase: LearningPhase,
    /// Placement annotation stamped on every node; empty for none.
    pub device: String,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            learning_phase: LearningPhase::Inference,
            device: "/device:CPU:0".to_string(),
        }
    }
}

/// A computation context holding a graph and its variable values.
///
/// # Example
/// ```
/// use freezer::{Session, SessionOptions};
/// use model_ir::{NodeDef, Op};
/// use tensor_core::{Shape, Tensor};
///
/// let mut session = Session::new(SessionOptions::default());
/// session.add_variable("w", Tensor::from_f32(Shape::vector(2), &[1.0, 2.0]).unwrap()).unwrap();
/// session.add_variable("b", Tensor::from_f32(Shape::vector(2), &[0.5, 0.5]).unwrap()).unwrap();
/// session.add_op(NodeDef::new("y", Op::Add).with_inputs(["w", "b"])).unwrap();
/// assert_eq!(session.global_variables(), &["w", "b"]);
/// ```
#[derive(Debug, Clone)]
pub struct Session {
    options: SessionOptions,
    graph: GraphDef,
    /// Variable names in registration order.
    variables: Vec<String>,
    values: HashMap<String, Tensor>,
    /// Nodes producing the lowered model's results.
    outputs: Vec<String>,
}

impl Session {
    /// Creates an empty session.
    pub fn new(options: SessionOptions) -> Self {
        Self {
            options,
            graph: GraphDef::new(),
            variables: Vec::new(),
            values: HashMap::new(),
            outputs: Vec::new(),
        }
    }

    /// Creates a session and lowers `model` into it.
    ///
    /// Every model weight becomes an initialised variable and the model's
    /// output layers become [`model_outputs`](Self::model_outputs).
    pub fn from_model(model: &Model, options: SessionOptions) -> Result<Self, FreezeError> {
        let mut session = Self::new(options);
        let outputs = lowering::lower_model(model, &mut session)?;
        session.outputs = outputs;
        tracing::debug!(
            "session for '{}' ({} phase): {}",
            model.name(),
            if session.learning_phase().is_training() { "training" } else { "inference" },
            session.graph.summary(),
        );
        Ok(session)
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn learning_phase(&self) -> LearningPhase {
        self.options.learning_phase
    }

    /// Borrows the live graph.
    pub fn graph(&self) -> &GraphDef {
        &self.graph
    }

    /// Exports a copy of the graph structure.
    pub fn graph_def(&self) -> GraphDef {
        self.graph.clone()
    }

    /// Names of all registered variables, in registration order.
    pub fn global_variables(&self) -> &[String] {
        &self.variables
    }

    /// Current value of a variable, if it has been assigned.
    pub fn variable_value(&self, name: &str) -> Option<&Tensor> {
        self.values.get(name)
    }

    /// Output nodes of the lowered model (empty for hand-built sessions).
    pub fn model_outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Adds a graph input.
    pub fn add_placeholder(
        &mut self,
        name: &str,
        dtype: DType,
        shape: Shape,
    ) -> Result<(), FreezeError> {
        self.push(
            NodeDef::new(name, Op::Placeholder)
                .with_attr("dtype", AttrValue::Type(dtype))
                .with_attr("shape", AttrValue::Shape(shape)),
        )
    }

    /// Adds a constant node.
    pub fn add_const(&mut self, name: &str, value: Tensor) -> Result<(), FreezeError> {
        self.push(const_node(name, value))
    }

    /// Registers a variable without a value.
    ///
    /// Adds the variable node plus its `<name>/assign_value` placeholder
    /// and `<name>/Assign` op, the plumbing weights are loaded through.
    pub fn declare_variable(
        &mut self,
        name: &str,
        dtype: DType,
        shape: Shape,
    ) -> Result<(), FreezeError> {
        let assign_value = format!("{name}/{ASSIGN_VALUE_SUFFIX}");
        let assign = format!("{name}/{ASSIGN_SUFFIX}");

        self.push(
            NodeDef::new(name, Op::Variable)
                .with_attr("dtype", AttrValue::Type(dtype))
                .with_attr("shape", AttrValue::Shape(shape.clone())),
        )?;
        self.push(
            NodeDef::new(&assign_value, Op::Placeholder)
                .with_attr("dtype", AttrValue::Type(dtype))
                .with_attr("shape", AttrValue::Shape(shape)),
        )?;
        self.push(NodeDef::new(&assign, Op::Assign).with_inputs([name, assign_value.as_str()]))?;

        self.variables.push(name.to_string());
        Ok(())
    }

    /// Registers a variable and assigns its initial value.
    pub fn add_variable(&mut self, name: &str, initial: Tensor) -> Result<(), FreezeError> {
        self.declare_variable(name, initial.dtype(), initial.shape().clone())?;
        self.assign(name, initial)
    }

    /// Replaces a variable's value. The new value must keep the declared
    /// dtype and shape.
    pub fn assign(&mut self, name: &str, value: Tensor) -> Result<(), FreezeError> {
        let node = self
            .graph
            .node(name)
            .filter(|n| n.op.is_variable())
            .ok_or_else(|| FreezeError::InvalidSession(format!("'{name}' is not a variable")))?;

        let declared_dtype = node.attr("dtype").and_then(AttrValue::as_type);
        let declared_shape = match node.attr("shape") {
            Some(AttrValue::Shape(s)) => Some(s),
            _ => None,
        };
        if declared_dtype != Some(value.dtype()) || declared_shape != Some(value.shape()) {
            return Err(FreezeError::InvalidSession(format!(
                "value {} {} does not match variable '{name}'",
                value.dtype(),
                value.shape(),
            )));
        }

        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Adds an operation node. Variables must go through
    /// [`declare_variable`](Self::declare_variable) instead.
    pub fn add_op(&mut self, node: NodeDef) -> Result<(), FreezeError> {
        if node.op.is_variable() {
            return Err(FreezeError::InvalidSession(format!(
                "variable '{}' must be added with add_variable",
                node.name
            )));
        }
        self.push(node)
    }

    /// Returns a summary string describing the session.
    pub fn summary(&self) -> String {
        format!(
            "Session: {} variables ({} assigned), {}",
            self.variables.len(),
            self.values.len(),
            self.graph.summary(),
        )
    }

    /// Stamps the session device on nodes without one and appends them.
    fn push(&mut self, mut node: NodeDef) -> Result<(), FreezeError> {
        if node.device.is_empty() {
            node.device = self.options.device.clone();
        }
        self.graph.add_node(node)?;
        Ok(())
    }
}

/// Builds a `Const` node carrying `value`.
pub(crate) fn const_node(name: &str, value: Tensor) -> NodeDef {
    NodeDef::new(name, Op::Const)
        .with_attr("dtype", AttrValue::Type(value.dtype()))
        .with_attr("value", AttrValue::Tensor(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(values: &[f32]) -> Tensor {
        Tensor::from_f32(Shape::vector(values.len()), values).unwrap()
    }

    #[test]
    fn test_learning_phase_flags() {
        assert_eq!(LearningPhase::Inference.as_flag(), 0);
        assert_eq!(LearningPhase::from_flag(1), Some(LearningPhase::Training));
        assert_eq!(LearningPhase::from_flag(2), None);
        assert_eq!(LearningPhase::default(), LearningPhase::Inference);
    }

    #[test]
    fn test_add_variable_creates_plumbing() {
        let mut s = Session::new(SessionOptions::default());
        s.add_variable("w", vector(&[1.0, 2.0])).unwrap();

        let g = s.graph();
        assert_eq!(g.len(), 3);
        assert_eq!(g.node("w").unwrap().op, Op::Variable);
        assert_eq!(g.node("w/assign_value").unwrap().op, Op::Placeholder);
        assert_eq!(g.node("w/Assign").unwrap().inputs, vec!["w", "w/assign_value"]);
        assert_eq!(s.global_variables(), &["w"]);
        assert!(s.variable_value("w").is_some());
    }

    #[test]
    fn test_device_stamped() {
        let mut s = Session::new(SessionOptions {
            device: "/device:GPU:0".into(),
            ..Default::default()
        });
        s.add_placeholder("x", DType::F32, Shape::vector(2)).unwrap();
        s.add_op(NodeDef::new("y", Op::Relu).with_inputs(["x"]).with_device("/device:CPU:1"))
            .unwrap();
        assert_eq!(s.graph().node("x").unwrap().device, "/device:GPU:0");
        assert_eq!(s.graph().node("y").unwrap().device, "/device:CPU:1");
    }

    #[test]
    fn test_declare_without_value() {
        let mut s = Session::new(SessionOptions::default());
        s.declare_variable("w", DType::F32, Shape::vector(2)).unwrap();
        assert!(s.variable_value("w").is_none());
        s.assign("w", vector(&[3.0, 4.0])).unwrap();
        assert_eq!(s.variable_value("w").unwrap().to_f32_vec().unwrap(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_assign_shape_mismatch() {
        let mut s = Session::new(SessionOptions::default());
        s.add_variable("w", vector(&[1.0, 2.0])).unwrap();
        let result = s.assign("w", vector(&[1.0, 2.0, 3.0]));
        assert!(matches!(result, Err(FreezeError::InvalidSession(_))));
    }

    #[test]
    fn test_assign_to_non_variable() {
        let mut s = Session::new(SessionOptions::default());
        s.add_const("c", vector(&[1.0])).unwrap();
        assert!(s.assign("c", vector(&[2.0])).is_err());
        assert!(s.assign("missing", vector(&[2.0])).is_err());
    }

    #[test]
    fn test_add_op_rejects_variables_and_unknown_inputs() {
        let mut s = Session::new(SessionOptions::default());
        assert!(s.add_op(NodeDef::new("v", Op::Variable)).is_err());
        let result = s.add_op(NodeDef::new("y", Op::Relu).with_inputs(["x"]));
        assert!(matches!(result, Err(FreezeError::Model(_))));
    }

    #[test]
    fn test_duplicate_variable() {
        let mut s = Session::new(SessionOptions::default());
        s.add_variable("w", vector(&[1.0])).unwrap();
        assert!(s.add_variable("w", vector(&[1.0])).is_err());
        assert_eq!(s.global_variables().len(), 1);
    }

    #[test]
    fn test_summary() {
        let mut s = Session::new(SessionOptions::default());
        s.declare_variable("w", DType::F32, Shape::vector(1)).unwrap();
        assert!(s.summary().starts_with("Session: 1 variables (0 assigned)"));
    }
}
