// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # freezer
//!
//! Turns a trained model into a single self-contained graph file.
//!
//! The freezer takes:
//! - A validated [`model_ir::Model`] (topology plus weights).
//! - [`SessionOptions`] fixing the learning phase and device placement.
//!
//! It lowers the model into a [`Session`] whose weights are variables,
//! replaces those variables with constants, prunes everything the outputs
//! do not need and writes the result atomically.
//!
//! # Type-State Pipeline
//! ```text
//! FreezePipeline<Configured> → <Loaded> → <Frozen> → <Serialized>
//! ```
//! Transitions are compile-time checked.
//!
//! # Example
//! ```no_run
//! use freezer::FreezeConfig;
//!
//! let report = freezer::run(FreezeConfig::default()).unwrap();
//! println!("{}", report.summary());
//! ```

mod config;
mod error;
mod freeze;
mod lowering;
mod pipeline;
mod report;
mod session;
mod writer;

pub use config::FreezeConfig;
pub use error::FreezeError;
pub use freeze::{
    convert_variables_to_constants, extract_sub_graph, freeze_session, FreezeOptions, FrozenGraph,
};
pub use pipeline::{run, Configured, Frozen, FreezePipeline, Loaded, PipelineState, Serialized};
pub use report::FreezeReport;
pub use session::{LearningPhase, Session, SessionOptions};
pub use writer::{
    decode_graph, encode_graph, read_graph, write_graph, GraphFormat, DEFAULT_OUTPUT_FILE,
    FORMAT_VERSION, GRAPH_MAGIC,
};
