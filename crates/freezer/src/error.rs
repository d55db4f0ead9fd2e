// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for session construction, freezing and serialization.

use std::path::PathBuf;

/// Errors that can occur anywhere in the freezing pipeline.
///
/// Every variant is fatal: the pipeline never retries or writes partial
/// output.
#[derive(Debug, thiserror::Error)]
pub enum FreezeError {
    /// Loading the model or building graph IR failed.
    #[error("model error: {0}")]
    Model(#[from] model_ir::ModelError),

    /// A requested output identifier does not exist in the graph.
    #[error("output node not found in graph: {name}")]
    OutputNotFound { name: String },

    /// A variable selected for freezing has no value in the session.
    #[error("variable '{name}' has no value in the session")]
    UninitializedVariable { name: String },

    /// The session graph and its stored values disagree.
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// Creating the output directory or writing the graph file failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The graph could not be encoded.
    #[error("failed to encode graph: {0}")]
    Encode(String),

    /// A graph file could not be decoded.
    #[error("failed to decode graph: {0}")]
    Decode(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}
