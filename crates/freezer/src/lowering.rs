// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Lowering of a loaded [`Model`] into session graph nodes.
//!
//! Each layer expands to a short chain of primitive ops named
//! `<layer>/<Op>`:
//!
//! | Layer                 | Nodes                                          |
//! |-----------------------|------------------------------------------------|
//! | `dense`               | `MatMul`, `BiasAdd`?, activation?              |
//! | `conv2d`              | `Conv2D`, `BiasAdd`?, activation?              |
//! | `max_pooling2d`       | `MaxPool`                                      |
//! | `flatten`             | `Reshape`                                      |
//! | `activation`          | `Relu` / `Sigmoid` / `Tanh` / `Softmax` / `Identity` |
//! | `dropout`             | `Identity` (inference) or `keep_prob`, `random_uniform`, `Dropout` (training) |
//! | `batch_normalization` | `FusedBatchNorm`                               |
//!
//! Weights become session variables named exactly as in the weights file.

use crate::session::Session;
use crate::FreezeError;
use model_ir::graph::{KEEP_PROB_SUFFIX, RANDOM_UNIFORM_SUFFIX};
use model_ir::{Activation, AttrValue, LayerDef, LayerType, Model, NodeDef, Op};
use std::collections::HashMap;
use tensor_core::Tensor;

/// Drop rate used when a dropout layer does not configure one.
const DEFAULT_DROPOUT_RATE: f32 = 0.5;

/// Variance epsilon used when a batch norm layer does not configure one.
const DEFAULT_BN_EPSILON: f32 = 1e-3;

/// Default pooling window.
const DEFAULT_POOL_SIZE: [usize; 2] = [2, 2];

/// Lowers `model` into `session` and returns the names of the nodes that
/// produce the model's outputs, in output order.
pub(crate) fn lower_model(model: &Model, session: &mut Session) -> Result<Vec<String>, FreezeError> {
    // Maps model-level names (inputs and layers) to the node holding their result.
    let mut produced: HashMap<String, String> = HashMap::new();

    for input in model.inputs() {
        session.add_placeholder(&input.name, model.dtype(), input.shape.clone())?;
        produced.insert(input.name.clone(), input.name.clone());
    }

    for layer in model.iter_layers() {
        for spec in &layer.weights {
            let value = model
                .weight(&spec.name)
                .ok_or_else(|| FreezeError::InvalidSession(format!("weight '{}' not loaded", spec.name)))?;
            session.add_variable(&spec.name, value.clone())?;
        }

        let input = single_input(layer, &produced)?;
        let output = lower_layer(layer, &input, model, session)?;
        tracing::trace!("lowered {} ({}) -> {output}", layer.name, layer.layer_type);
        produced.insert(layer.name.clone(), output);
    }

    model
        .outputs()
        .iter()
        .map(|name| {
            produced
                .get(name)
                .cloned()
                .ok_or_else(|| FreezeError::OutputNotFound { name: name.clone() })
        })
        .collect()
}

/// Resolves the node feeding a single-input layer.
fn single_input(layer: &LayerDef, produced: &HashMap<String, String>) -> Result<String, FreezeError> {
    match layer.inputs.as_slice() {
        [input] => produced.get(input).cloned().ok_or_else(|| {
            FreezeError::InvalidSession(format!(
                "layer '{}' reads '{input}' which has not been lowered",
                layer.name
            ))
        }),
        other => Err(FreezeError::InvalidSession(format!(
            "layer '{}' must have exactly one input, got {}",
            layer.name,
            other.len()
        ))),
    }
}

/// Adds the nodes for one layer and returns the name of its result node.
fn lower_layer(
    layer: &LayerDef,
    input: &str,
    model: &Model,
    session: &mut Session,
) -> Result<String, FreezeError> {
    let name = layer.name.as_str();
    let dtype = AttrValue::Type(model.dtype());

    match layer.layer_type {
        LayerType::Dense => {
            let matmul = format!("{name}/MatMul");
            session.add_op(
                NodeDef::new(&matmul, Op::MatMul)
                    .with_inputs([input, layer.weights[0].name.as_str()])
                    .with_attr("T", dtype),
            )?;
            let out = add_bias(layer, matmul, session)?;
            add_activation(name, layer.activation, out, false, session)
        }
        LayerType::Conv2d => {
            let stride = stride_pair(layer, [1, 1]);
            let conv = format!("{name}/Conv2D");
            session.add_op(
                NodeDef::new(&conv, Op::Conv2D)
                    .with_inputs([input, layer.weights[0].name.as_str()])
                    .with_attr("T", dtype)
                    .with_attr("strides", AttrValue::Ints(vec![1, stride[0], stride[1], 1]))
                    .with_attr("padding", padding_attr(layer)),
            )?;
            let out = add_bias(layer, conv, session)?;
            add_activation(name, layer.activation, out, false, session)
        }
        LayerType::MaxPooling2d => {
            let window = match layer.config.pool_size.as_deref() {
                Some([h, w]) => [*h as i64, *w as i64],
                Some([k]) => [*k as i64, *k as i64],
                _ => [DEFAULT_POOL_SIZE[0] as i64, DEFAULT_POOL_SIZE[1] as i64],
            };
            let stride = stride_pair(layer, [window[0] as usize, window[1] as usize]);
            let pool = format!("{name}/MaxPool");
            session.add_op(
                NodeDef::new(&pool, Op::MaxPool)
                    .with_inputs([input])
                    .with_attr("T", dtype)
                    .with_attr("ksize", AttrValue::Ints(vec![1, window[0], window[1], 1]))
                    .with_attr("strides", AttrValue::Ints(vec![1, stride[0], stride[1], 1]))
                    .with_attr("padding", padding_attr(layer)),
            )?;
            Ok(pool)
        }
        LayerType::Flatten => {
            let reshape = format!("{name}/Reshape");
            session.add_op(
                NodeDef::new(&reshape, Op::Reshape)
                    .with_inputs([input])
                    .with_attr("T", dtype)
                    .with_attr("shape", AttrValue::Ints(vec![0, -1])),
            )?;
            Ok(reshape)
        }
        LayerType::Activation => add_activation(name, layer.activation, input.to_string(), true, session),
        LayerType::Dropout => lower_dropout(layer, input, dtype, session),
        LayerType::BatchNormalization => {
            let bn = format!("{name}/FusedBatchNorm");
            let mut inputs = vec![input.to_string()];
            inputs.extend(layer.weights.iter().map(|w| w.name.clone()));
            session.add_op(
                NodeDef::new(&bn, Op::FusedBatchNorm)
                    .with_inputs(inputs)
                    .with_attr("T", dtype)
                    .with_attr(
                        "epsilon",
                        AttrValue::Float(layer.config.epsilon.unwrap_or(DEFAULT_BN_EPSILON)),
                    )
                    .with_attr("is_training", AttrValue::Bool(session.learning_phase().is_training())),
            )?;
            Ok(bn)
        }
    }
}

fn lower_dropout(
    layer: &LayerDef,
    input: &str,
    dtype: AttrValue,
    session: &mut Session,
) -> Result<String, FreezeError> {
    let name = layer.name.as_str();

    if !session.learning_phase().is_training() {
        let identity = format!("{name}/Identity");
        session.add_op(
            NodeDef::new(&identity, Op::Identity)
                .with_inputs([input])
                .with_attr("T", dtype),
        )?;
        return Ok(identity);
    }

    let rate = layer.config.rate.unwrap_or(DEFAULT_DROPOUT_RATE);
    let keep_prob = format!("{name}/{KEEP_PROB_SUFFIX}");
    let noise = format!("{name}/{RANDOM_UNIFORM_SUFFIX}");
    let dropout = format!("{name}/Dropout");

    session.add_const(&keep_prob, Tensor::scalar_f32(1.0 - rate))?;
    session.add_op(
        NodeDef::new(&noise, Op::RandomUniform)
            .with_inputs([input])
            .with_attr("dtype", dtype.clone()),
    )?;
    session.add_op(
        NodeDef::new(&dropout, Op::Dropout)
            .with_inputs([input, keep_prob.as_str(), noise.as_str()])
            .with_attr("T", dtype),
    )?;
    Ok(dropout)
}

/// Appends `BiasAdd` when the layer has a bias.
fn add_bias(layer: &LayerDef, input: String, session: &mut Session) -> Result<String, FreezeError> {
    let Some(bias) = layer.weights.get(1) else {
        return Ok(input);
    };
    let node = format!("{}/BiasAdd", layer.name);
    session.add_op(NodeDef::new(&node, Op::BiasAdd).with_inputs([input.as_str(), bias.name.as_str()]))?;
    Ok(node)
}

/// Appends the activation node. `Linear` adds nothing unless `always` is
/// set, in which case it becomes an `Identity` so the layer has a node of
/// its own.
fn add_activation(
    layer: &str,
    activation: Activation,
    input: String,
    always: bool,
    session: &mut Session,
) -> Result<String, FreezeError> {
    let op = match activation {
        Activation::Linear if !always => return Ok(input),
        Activation::Linear => Op::Identity,
        Activation::Relu => Op::Relu,
        Activation::Sigmoid => Op::Sigmoid,
        Activation::Tanh => Op::Tanh,
        Activation::Softmax => Op::Softmax,
    };
    let node = format!("{layer}/{}", op.as_str());
    session.add_op(NodeDef::new(&node, op).with_inputs([input]))?;
    Ok(node)
}

fn stride_pair(layer: &LayerDef, default: [usize; 2]) -> [i64; 2] {
    let [h, w] = match layer.config.strides.as_deref() {
        Some([h, w]) => [*h, *w],
        Some([s]) => [*s, *s],
        _ => default,
    };
    [h as i64, w as i64]
}

fn padding_attr(layer: &LayerDef) -> AttrValue {
    AttrValue::Str(layer.config.padding.unwrap_or_default().as_str().to_string())
}
