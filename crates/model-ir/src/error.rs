// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for model loading and IR construction.

use std::path::PathBuf;
use tensor_core::{DType, Shape};

/// Errors that can occur when loading a model or building graph IR.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// A model file the loader needs does not exist.
    #[error("model file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    /// The topology file could not be read.
    #[error("failed to read topology '{}': {source}", path.display())]
    TopologyRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The topology JSON is malformed.
    #[error("failed to parse topology: {0}")]
    TopologyParse(#[from] serde_json::Error),

    /// The weights file could not be opened or mapped.
    #[error("failed to read weights '{}': {source}", path.display())]
    WeightsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The weights blob is not a valid SafeTensors file.
    #[error("failed to parse weights: {0}")]
    WeightsParse(String),

    /// A weight declared in the topology is absent from the weights file.
    #[error("weight tensor not found: {name}")]
    WeightNotFound { name: String },

    /// A stored weight does not have the shape the topology declares.
    #[error("shape mismatch for weight '{weight}': topology declares {expected}, weights file has {actual}")]
    ShapeMismatch {
        weight: String,
        expected: Shape,
        actual: Shape,
    },

    /// A stored weight does not have the dtype the topology declares.
    #[error("dtype mismatch for weight '{weight}': topology declares {expected}, weights file has {actual}")]
    DTypeMismatch {
        weight: String,
        expected: DType,
        actual: DType,
    },

    /// A dtype string or stored dtype is not supported.
    #[error("unsupported dtype '{0}'")]
    UnsupportedDType(String),

    /// A layer definition is invalid (e.g., wrong weight arity or rank).
    #[error("invalid layer '{layer}': {detail}")]
    InvalidLayer { layer: String, detail: String },

    /// The topology as a whole is inconsistent.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// A graph node references a node that does not exist.
    #[error("node not found: {name}")]
    NodeNotFound { name: String },

    /// A graph is malformed (duplicate node names, forward references).
    #[error("invalid graph: {0}")]
    InvalidGraph(String),
}
