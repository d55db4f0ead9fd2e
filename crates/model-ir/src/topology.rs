// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! JSON model topology parsing.
//!
//! The topology (`<prefix>.json`) describes the network's layers and how
//! they connect, independent of parameter values. Parameter tensors are
//! referenced by name and declared shape; the values live in the weights
//! file next to it.
//!
//! # Format
//! ```json
//! {
//!   "name": "tl_classifier",
//!   "dtype": "f32",
//!   "inputs": [{ "name": "input_1", "shape": [1, 32, 32, 3] }],
//!   "layers": [
//!     {
//!       "name": "conv2d_1",
//!       "layer_type": "conv2d",
//!       "weights": [
//!         { "name": "conv2d_1/kernel", "shape": [3, 3, 3, 8] },
//!         { "name": "conv2d_1/bias", "shape": [8] }
//!       ],
//!       "config": { "activation": "relu", "padding": "same" }
//!     },
//!     { "name": "flatten_1", "layer_type": "flatten" },
//!     ...
//!   ],
//!   "outputs": ["dense_2"]
//! }
//! ```
//!
//! A layer without `inputs` consumes the previous layer (or the first
//! model input, for the first layer). An explicit input must name a model
//! input or an *earlier* layer, which keeps every topology acyclic. Every
//! supported layer type reads exactly one input.
//!
//! Inputs, layers and weights all end up as graph node names, so they
//! share one namespace. A weight or input may also not take a name the
//! session generates under a layer or weight (`dense_1/MatMul`,
//! `dense_1/kernel/Assign`).

use crate::graph::is_generated_suffix;
use crate::{Activation, LayerConfig, LayerDef, LayerType, ModelError, WeightSpec};
use std::collections::HashSet;
use std::path::Path;
use tensor_core::{DType, Shape};

/// Top-level model topology, deserialized from `<prefix>.json`.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelTopology {
    /// Human-readable model name.
    pub name: String,
    /// Element type for all parameters (e.g., `"f32"`).
    #[serde(default = "default_dtype")]
    pub dtype: String,
    /// Graph inputs fed at inference time.
    #[serde(default)]
    pub inputs: Vec<InputSpec>,
    /// Layers in declaration order.
    pub layers: Vec<TopologyLayer>,
    /// Names of the layers (or inputs) whose results the model produces.
    pub outputs: Vec<String>,
}

fn default_dtype() -> String {
    "f32".to_string()
}

/// A graph input placeholder.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InputSpec {
    pub name: String,
    pub shape: Shape,
}

/// A single layer entry in the topology.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TopologyLayer {
    /// Layer name (e.g., `"dense_1"`).
    pub name: String,
    /// Layer type string (e.g., `"dense"`, `"Conv2D"`).
    pub layer_type: String,
    /// Upstream layer or input names. Empty means "previous layer".
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Parameters owned by the layer.
    #[serde(default)]
    pub weights: Vec<WeightSpec>,
    /// Static configuration.
    #[serde(default)]
    pub config: LayerConfig,
}

impl ModelTopology {
    /// Loads a topology from a JSON file path.
    pub fn from_file(path: &Path) -> Result<Self, ModelError> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::TopologyRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parses a topology from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let topology: Self = serde_json::from_str(json)?;
        Ok(topology)
    }

    /// Returns the parameter element type.
    pub fn parse_dtype(&self) -> Result<DType, ModelError> {
        DType::from_str_loose(&self.dtype)
            .ok_or_else(|| ModelError::UnsupportedDType(self.dtype.clone()))
    }

    /// Validates that the topology is internally consistent.
    ///
    /// Equivalent to [`resolve_layers`](Self::resolve_layers) with the
    /// result discarded.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.resolve_layers().map(|_| ())
    }

    /// Resolves every layer entry into a typed [`LayerDef`].
    ///
    /// Checks:
    /// - At least one layer and one output are declared.
    /// - The dtype string is valid.
    /// - Input, layer and weight names are unique across all three kinds.
    /// - No input or weight takes a generated `<layer or weight>/<op>` name.
    /// - Layer types and activations are recognised.
    /// - Each layer has a single input, naming a model input or an earlier
    ///   layer.
    /// - Weight arity and ranks fit the layer type.
    /// - Every output names a layer or input.
    pub fn resolve_layers(&self) -> Result<Vec<LayerDef>, ModelError> {
        if self.layers.is_empty() {
            return Err(ModelError::InvalidTopology(
                "topology contains no layers".into(),
            ));
        }
        if self.outputs.is_empty() {
            return Err(ModelError::InvalidTopology(
                "topology declares no outputs".into(),
            ));
        }

        let dtype = self.parse_dtype()?;

        // Names a layer may read from: inputs and earlier layers.
        let mut defined: HashSet<&str> = HashSet::new();
        for input in &self.inputs {
            if !defined.insert(input.name.as_str()) {
                return Err(ModelError::InvalidTopology(format!(
                    "duplicate input name '{}'",
                    input.name
                )));
            }
            if input.shape.checked_size_bytes(dtype).is_none() {
                return Err(ModelError::InvalidTopology(format!(
                    "input '{}' shape {} is too large",
                    input.name, input.shape
                )));
            }
        }
        self.check_node_names()?;

        let mut weight_names: HashSet<&str> = HashSet::new();
        let mut layers = Vec::with_capacity(self.layers.len());
        let mut previous: Option<&str> = self.inputs.first().map(|i| i.name.as_str());

        for (index, tl) in self.layers.iter().enumerate() {
            let invalid = |detail: String| ModelError::InvalidLayer {
                layer: tl.name.clone(),
                detail,
            };

            let layer_type = LayerType::from_str_loose(&tl.layer_type)
                .ok_or_else(|| invalid(format!("unrecognised layer type '{}'", tl.layer_type)))?;

            let inputs = match tl.inputs.as_slice() {
                [] => {
                    let prev = previous
                        .ok_or_else(|| invalid("no explicit inputs and nothing precedes it".into()))?;
                    vec![prev.to_string()]
                }
                [name] if defined.contains(name.as_str()) => tl.inputs.clone(),
                [name] => {
                    return Err(invalid(format!(
                        "input '{name}' is not a model input or an earlier layer"
                    )))
                }
                many => {
                    return Err(invalid(format!(
                        "{} layers take exactly one input, got {}",
                        layer_type,
                        many.len()
                    )))
                }
            };

            let activation = match (&tl.config.activation, layer_type) {
                (Some(name), LayerType::Dense | LayerType::Conv2d | LayerType::Activation) => {
                    Activation::from_str_loose(name)
                        .ok_or_else(|| invalid(format!("unrecognised activation '{name}'")))?
                }
                (None, LayerType::Activation) => {
                    return Err(invalid("activation layer without an activation".into()))
                }
                _ => Activation::Linear,
            };

            for w in &tl.weights {
                if !weight_names.insert(w.name.as_str()) {
                    return Err(invalid(format!("duplicate weight name '{}'", w.name)));
                }
                if w.shape.checked_size_bytes(dtype).is_none() {
                    return Err(invalid(format!("weight '{}' shape {} is too large", w.name, w.shape)));
                }
            }

            let layer = LayerDef {
                name: tl.name.clone(),
                layer_type,
                index,
                inputs,
                weights: tl.weights.clone(),
                dtype,
                activation,
                config: tl.config.clone(),
            };
            layer.check_weights()?;

            if !defined.insert(tl.name.as_str()) {
                return Err(invalid("duplicate layer name".into()));
            }
            previous = Some(tl.name.as_str());
            layers.push(layer);
        }

        for output in &self.outputs {
            if !defined.contains(output.as_str()) {
                return Err(ModelError::InvalidTopology(format!(
                    "output '{output}' is not a layer or input"
                )));
            }
        }

        Ok(layers)
    }

    /// Checks the graph-node namespace shared by inputs, layers and
    /// weights.
    fn check_node_names(&self) -> Result<(), ModelError> {
        let clash = |detail: String| -> Result<(), ModelError> {
            Err(ModelError::InvalidTopology(detail))
        };

        // Layer names are only checked against inputs and weights here;
        // duplicate layers are reported per layer by `resolve_layers`.
        let layers: HashSet<&str> = self.layers.iter().map(|l| l.name.as_str()).collect();
        let weights: HashSet<&str> = self.weight_specs().map(|w| w.name.as_str()).collect();

        for input in &self.inputs {
            let name = input.name.as_str();
            if layers.contains(name) {
                return clash(format!("input '{name}' has the same name as a layer"));
            }
            if weights.contains(name) {
                return clash(format!("input '{name}' has the same name as a weight"));
            }
        }
        for w in self.weight_specs() {
            if layers.contains(w.name.as_str()) {
                return clash(format!("weight '{}' has the same name as a layer", w.name));
            }
        }

        let names = self
            .inputs
            .iter()
            .map(|i| i.name.as_str())
            .chain(self.weight_specs().map(|w| w.name.as_str()));
        for name in names {
            let Some((owner, suffix)) = name.rsplit_once('/') else {
                continue;
            };
            if is_generated_suffix(suffix) && (layers.contains(owner) || weights.contains(owner)) {
                return clash(format!(
                    "'{name}' collides with a node generated for '{owner}'"
                ));
            }
        }
        Ok(())
    }

    /// Iterates over every weight declared by any layer.
    pub fn weight_specs(&self) -> impl Iterator<Item = &WeightSpec> {
        self.layers.iter().flat_map(|l| l.weights.iter())
    }

    /// Returns the number of declared weight tensors.
    pub fn total_weight_count(&self) -> usize {
        self.weight_specs().count()
    }
}
