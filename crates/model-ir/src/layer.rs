// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Layer definitions for the model IR.
//!
//! Each [`LayerDef`] describes a single layer of the network: its type,
//! the nodes it reads from, the parameters it owns and its static
//! configuration. Parameter *values* are not stored here; they live in
//! [`crate::Model::weights`] keyed by [`WeightSpec::name`].

use crate::ModelError;
use tensor_core::{DType, Shape};

/// The type of computation a layer performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerType {
    /// Fully connected projection (kernel + optional bias).
    Dense,
    /// 2-D convolution (kernel + optional bias).
    Conv2d,
    /// 2-D max pooling.
    MaxPooling2d,
    /// Collapses all non-batch dimensions.
    Flatten,
    /// Standalone activation function.
    Activation,
    /// Dropout; an identity outside the training phase.
    Dropout,
    /// Batch normalization (gamma, beta, moving mean, moving variance).
    BatchNormalization,
}

impl LayerType {
    /// Parses a layer type from a topology string.
    ///
    /// Accepts snake_case (`"max_pooling2d"`), the framework class names
    /// (`"Conv2D"`, `"BatchNormalization"`) and short aliases (`"fc"`, `"bn"`).
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dense" | "fc" | "linear" => Some(Self::Dense),
            "conv2d" | "conv_2d" | "convolution2d" => Some(Self::Conv2d),
            "max_pooling2d" | "maxpooling2d" | "max_pool2d" | "maxpool" => Some(Self::MaxPooling2d),
            "flatten" => Some(Self::Flatten),
            "activation" => Some(Self::Activation),
            "dropout" => Some(Self::Dropout),
            "batch_normalization" | "batchnormalization" | "batch_norm" | "bn" => {
                Some(Self::BatchNormalization)
            }
            _ => None,
        }
    }

    /// Returns a human-readable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Conv2d => "conv2d",
            Self::MaxPooling2d => "max_pooling2d",
            Self::Flatten => "flatten",
            Self::Activation => "activation",
            Self::Dropout => "dropout",
            Self::BatchNormalization => "batch_normalization",
        }
    }
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Element-wise activation applied at the end of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    /// No activation.
    #[default]
    Linear,
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    /// Parses an activation name. Case-insensitive.
    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" | "none" | "identity" => Some(Self::Linear),
            "relu" => Some(Self::Relu),
            "sigmoid" => Some(Self::Sigmoid),
            "tanh" => Some(Self::Tanh),
            "softmax" => Some(Self::Softmax),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Relu => "relu",
            Self::Sigmoid => "sigmoid",
            Self::Tanh => "tanh",
            Self::Softmax => "softmax",
        }
    }
}

/// Spatial padding mode for convolution and pooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Padding {
    #[default]
    Valid,
    Same,
}

impl Padding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Valid => "VALID",
            Self::Same => "SAME",
        }
    }
}

/// A named parameter tensor owned by a layer, with its declared shape.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct WeightSpec {
    /// Key of the tensor in the weights file (e.g., `"dense_1/kernel"`).
    pub name: String,
    /// Shape the topology expects the stored tensor to have.
    pub shape: Shape,
}

/// Static, per-type layer configuration. Unused fields are ignored.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Activation name for `dense`, `conv2d` and `activation` layers.
    pub activation: Option<String>,
    /// Drop rate for `dropout` layers.
    pub rate: Option<f32>,
    /// Window size for pooling layers.
    pub pool_size: Option<Vec<usize>>,
    /// Spatial strides for convolution and pooling.
    pub strides: Option<Vec<usize>>,
    /// Padding mode for convolution and pooling.
    pub padding: Option<Padding>,
    /// Variance epsilon for batch normalization.
    pub epsilon: Option<f32>,
}

/// Metadata describing a single resolved layer of a model.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LayerDef {
    /// Unique identifier for this layer (e.g., `"dense_1"`).
    pub name: String,
    /// The type of computation this layer performs.
    pub layer_type: LayerType,
    /// Index in declaration order (0-based).
    pub index: usize,
    /// Names of the model inputs or layers this layer consumes.
    pub inputs: Vec<String>,
    /// Parameters owned by this layer, in the order the layer uses them.
    pub weights: Vec<WeightSpec>,
    /// Element type for this layer's parameters.
    pub dtype: DType,
    /// Resolved activation (always `Linear` for types without one).
    pub activation: Activation,
    /// Remaining static configuration.
    pub config: LayerConfig,
}

impl LayerDef {
    /// Checks the number and ranks of this layer's parameters against what
    /// its type requires.
    ///
    /// - `dense`: kernel `[in, units]`, optional bias `[units]`.
    /// - `conv2d`: kernel `[kh, kw, in, filters]`, optional bias `[filters]`.
    /// - `batch_normalization`: gamma, beta, moving mean, moving variance,
    ///   all `[channels]`.
    /// - everything else: no parameters.
    pub fn check_weights(&self) -> Result<(), ModelError> {
        let invalid = |detail: String| ModelError::InvalidLayer {
            layer: self.name.clone(),
            detail,
        };

        match self.layer_type {
            LayerType::Dense | LayerType::Conv2d => {
                let kernel_rank = if self.layer_type == LayerType::Dense { 2 } else { 4 };
                let (kernel, bias) = match self.weights.as_slice() {
                    [kernel] => (kernel, None),
                    [kernel, bias] => (kernel, Some(bias)),
                    other => {
                        return Err(invalid(format!(
                            "expected kernel and optional bias, got {} weights",
                            other.len()
                        )))
                    }
                };
                if kernel.shape.rank() != kernel_rank {
                    return Err(invalid(format!(
                        "kernel '{}' must have rank {kernel_rank}, got shape {}",
                        kernel.name, kernel.shape
                    )));
                }
                if let Some(bias) = bias {
                    if bias.shape.rank() != 1 || bias.shape.dim(0) != kernel.shape.last_dim() {
                        return Err(invalid(format!(
                            "bias '{}' shape {} does not match kernel output dim of {}",
                            bias.name, bias.shape, kernel.shape
                        )));
                    }
                }
            }
            LayerType::BatchNormalization => {
                if self.weights.len() != 4 {
                    return Err(invalid(format!(
                        "expected gamma, beta, moving_mean and moving_variance, got {} weights",
                        self.weights.len()
                    )));
                }
                let channels = &self.weights[0].shape;
                for w in &self.weights {
                    if w.shape.rank() != 1 || &w.shape != channels {
                        return Err(invalid(format!(
                            "parameter '{}' has shape {}, expected {}",
                            w.name, w.shape, channels
                        )));
                    }
                }
            }
            LayerType::MaxPooling2d
            | LayerType::Flatten
            | LayerType::Activation
            | LayerType::Dropout => {
                if !self.weights.is_empty() {
                    return Err(invalid(format!(
                        "{} layers take no weights, got {}",
                        self.layer_type,
                        self.weights.len()
                    )));
                }
            }
        }

        if let Some(rate) = self.config.rate {
            if !(0.0..1.0).contains(&rate) {
                return Err(invalid(format!("dropout rate {rate} outside [0, 1)")));
            }
        }

        Ok(())
    }

    /// Estimated memory required for this layer's parameters in bytes.
    pub fn estimated_weight_bytes(&self) -> usize {
        self.weights
            .iter()
            .map(|w| w.shape.size_bytes(self.dtype))
            .sum()
    }

    /// Total number of scalar parameters in this layer.
    pub fn num_parameters(&self) -> usize {
        self.weights.iter().map(|w| w.shape.num_elements()).sum()
    }

    /// Returns a concise summary string for display.
    pub fn summary(&self) -> String {
        let weight_kb = self.estimated_weight_bytes() as f64 / 1024.0;
        format!(
            "[{}] {} ({}) <- {:?}, {} params ({:.1} KB)",
            self.index,
            self.name,
            self.layer_type,
            self.inputs,
            self.num_parameters(),
            weight_kb,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(weights: Vec<WeightSpec>) -> LayerDef {
        LayerDef {
            name: "dense_1".into(),
            layer_type: LayerType::Dense,
            index: 0,
            inputs: vec!["input_1".into()],
            weights,
            dtype: DType::F32,
            activation: Activation::Relu,
            config: LayerConfig::default(),
        }
    }

    fn spec(name: &str, dims: &[usize]) -> WeightSpec {
        WeightSpec {
            name: name.into(),
            shape: Shape::from(dims),
        }
    }

    #[test]
    fn test_dense_weights_ok() {
        let layer = dense(vec![spec("k", &[4, 8]), spec("b", &[8])]);
        layer.check_weights().unwrap();
        assert_eq!(layer.num_parameters(), 40);
        assert_eq!(layer.estimated_weight_bytes(), 160);
    }

    #[test]
    fn test_dense_without_bias() {
        dense(vec![spec("k", &[4, 8])]).check_weights().unwrap();
    }

    #[test]
    fn test_dense_bias_mismatch() {
        let layer = dense(vec![spec("k", &[4, 8]), spec("b", &[4])]);
        assert!(matches!(layer.check_weights(), Err(ModelError::InvalidLayer { .. })));
    }

    #[test]
    fn test_dense_kernel_rank() {
        let layer = dense(vec![spec("k", &[4, 8, 1])]);
        assert!(layer.check_weights().is_err());
    }

    #[test]
    fn test_batch_norm_arity() {
        let mut layer = dense(vec![spec("g", &[8]), spec("b", &[8]), spec("m", &[8])]);
        layer.layer_type = LayerType::BatchNormalization;
        assert!(layer.check_weights().is_err());

        layer.weights.push(spec("v", &[8]));
        layer.check_weights().unwrap();
    }

    #[test]
    fn test_weightless_layer_rejects_weights() {
        let mut layer = dense(vec![spec("k", &[4])]);
        layer.layer_type = LayerType::Flatten;
        assert!(layer.check_weights().is_err());
    }

    #[test]
    fn test_dropout_rate_range() {
        let mut layer = dense(vec![]);
        layer.layer_type = LayerType::Dropout;
        layer.config.rate = Some(1.5);
        assert!(layer.check_weights().is_err());
        layer.config.rate = Some(0.25);
        layer.check_weights().unwrap();
    }

    #[test]
    fn test_layer_type_from_str() {
        assert_eq!(LayerType::from_str_loose("Conv2D"), Some(LayerType::Conv2d));
        assert_eq!(LayerType::from_str_loose("MaxPooling2D"), Some(LayerType::MaxPooling2d));
        assert_eq!(
            LayerType::from_str_loose("BatchNormalization"),
            Some(LayerType::BatchNormalization)
        );
        assert_eq!(LayerType::from_str_loose("fc"), Some(LayerType::Dense));
        assert_eq!(LayerType::from_str_loose("lstm"), None);
    }

    #[test]
    fn test_activation_from_str() {
        assert_eq!(Activation::from_str_loose("ReLU"), Some(Activation::Relu));
        assert_eq!(Activation::from_str_loose("none"), Some(Activation::Linear));
        assert_eq!(Activation::from_str_loose("gelu"), None);
    }

    #[test]
    fn test_summary() {
        let layer = dense(vec![spec("k", &[4, 8]), spec("b", &[8])]);
        let s = layer.summary();
        assert!(s.contains("[0] dense_1 (dense)"));
        assert!(s.contains("40 params"));
    }
}
