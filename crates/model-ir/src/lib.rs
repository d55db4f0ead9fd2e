// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # model-ir
//!
//! Model description, weight loading and graph IR for the freezer.
//!
//! - [`ModelTopology`]: the JSON topology file (layers, connections,
//!   declared weight shapes).
//! - [`LayerType`] / [`LayerDef`]: typed, resolved layers.
//! - [`Model`]: topology plus validated parameter values.
//! - [`ModelLoader`]: reads `<prefix>.json` + `<prefix>.safetensors`.
//! - [`GraphDef`] / [`NodeDef`] / [`Op`]: the serializable computation
//!   graph that sessions export and the freezer rewrites.
//!
//! # Supported Model Format
//! A model is stored as two files sharing a prefix:
//! - `<prefix>.json`: topology.
//! - `<prefix>.safetensors`: weights in HuggingFace SafeTensors format.
//!
//! The HDF5 `<prefix>.h5` weights a Keras export produces are **not**
//! read. Re-save them as SafeTensors (for example with the `safetensors`
//! Python package) before loading.
//!
//! # Example
//! ```no_run
//! use model_ir::ModelLoader;
//! use std::path::Path;
//!
//! let model = ModelLoader::load(Path::new("TL_handling/tl_classifier_model")).unwrap();
//! println!("{}", model.summary());
//! for layer in model.iter_layers() {
//!     println!("  {}", layer.summary());
//! }
//! ```

mod error;
pub mod graph;
mod layer;
mod loader;
mod model;
mod topology;

pub use error::ModelError;
pub use graph::{AttrValue, GraphDef, NodeDef, Op};
pub use layer::{Activation, LayerConfig, LayerDef, LayerType, Padding, WeightSpec};
pub use loader::{read_weight_tensors, ModelLoader, DEFAULT_WEIGHTS_EXTENSION};
pub use model::Model;
pub use topology::{InputSpec, ModelTopology, TopologyLayer};
