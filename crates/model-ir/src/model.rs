// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The loaded model: topology plus parameter values.

use crate::{InputSpec, LayerDef, ModelError, ModelTopology};
use std::collections::BTreeMap;
use std::fmt;
use tensor_core::{DType, Tensor};

/// A fully constructed model.
///
/// Built by [`crate::ModelLoader`] (or [`Model::new`]) only after every
/// declared weight was found with the declared shape and dtype, so a
/// `Model` value is always internally consistent. It is read-only after
/// construction.
#[derive(Debug, Clone)]
pub struct Model {
    name: String,
    dtype: DType,
    inputs: Vec<InputSpec>,
    layers: Vec<LayerDef>,
    outputs: Vec<String>,
    weights: BTreeMap<String, Tensor>,
}

impl Model {
    /// Builds a model from a topology and a set of named tensors.
    ///
    /// Every weight the topology declares must be present in `weights`
    /// with a matching shape and dtype. Tensors the topology does not
    /// reference are dropped with a warning.
    pub fn new(
        topology: &ModelTopology,
        mut weights: BTreeMap<String, Tensor>,
    ) -> Result<Self, ModelError> {
        let layers = topology.resolve_layers()?;
        let dtype = topology.parse_dtype()?;

        let mut attached = BTreeMap::new();
        for spec in topology.weight_specs() {
            let tensor = weights
                .remove(&spec.name)
                .ok_or_else(|| ModelError::WeightNotFound {
                    name: spec.name.clone(),
                })?;
            if tensor.shape() != &spec.shape {
                return Err(ModelError::ShapeMismatch {
                    weight: spec.name.clone(),
                    expected: spec.shape.clone(),
                    actual: tensor.shape().clone(),
                });
            }
            if tensor.dtype() != dtype {
                return Err(ModelError::DTypeMismatch {
                    weight: spec.name.clone(),
                    expected: dtype,
                    actual: tensor.dtype(),
                });
            }
            attached.insert(spec.name.clone(), tensor);
        }

        for unused in weights.keys() {
            tracing::warn!("weights file entry '{unused}' is not referenced by the topology");
        }

        Ok(Self {
            name: topology.name.clone(),
            dtype,
            inputs: topology.inputs.clone(),
            layers,
            outputs: topology.outputs.clone(),
            weights: attached,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Graph inputs in declaration order.
    pub fn inputs(&self) -> &[InputSpec] {
        &self.inputs
    }

    /// Names of the layers producing the model's results.
    pub fn outputs(&self) -> &[String] {
        &self.outputs
    }

    /// Returns the total number of layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Returns an iterator over the layers in declaration order.
    pub fn iter_layers(&self) -> impl Iterator<Item = &LayerDef> {
        self.layers.iter()
    }

    /// Looks up a layer by name.
    pub fn layer(&self, name: &str) -> Option<&LayerDef> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Returns the value of a named parameter.
    pub fn weight(&self, name: &str) -> Option<&Tensor> {
        self.weights.get(name)
    }

    /// Number of parameter tensors.
    pub fn num_weights(&self) -> usize {
        self.weights.len()
    }

    /// Total number of scalar parameters.
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.num_parameters()).sum()
    }

    /// Total size of all parameter tensors in bytes.
    pub fn total_weight_bytes(&self) -> usize {
        self.weights.values().map(|t| t.size_bytes()).sum()
    }

    /// Returns a summary string describing the model.
    pub fn summary(&self) -> String {
        format!(
            "Model '{}': {} layers, {} inputs, {} outputs, {} parameters ({:.2} MB)",
            self.name,
            self.num_layers(),
            self.inputs.len(),
            self.outputs.len(),
            self.num_parameters(),
            self.total_weight_bytes() as f64 / (1024.0 * 1024.0),
        )
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model '{}' ({} layers):", self.name, self.layers.len())?;
        for layer in &self.layers {
            writeln!(f, "  {}", layer.summary())?;
        }
        Ok(())
    }
}
