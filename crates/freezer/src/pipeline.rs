// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The freezing pipeline with type-state–enforced ordering.
//!
//! ```text
//! FreezePipeline<Configured>
//!     │  .load()      read topology + weights, build the session
//!     ▼
//! FreezePipeline<Loaded>
//!     │  .freeze()    variables → constants, prune to outputs
//!     ▼
//! FreezePipeline<Frozen>
//!     │  .write()     encode and atomically write the graph file
//!     ▼
//! FreezePipeline<Serialized>
//! ```
//!
//! Each state transition consumes the old value and returns a new one,
//! so freezing before loading or writing before freezing does not compile.

use crate::{
    freeze_session, write_graph, FreezeConfig, FreezeError, FreezeReport, FrozenGraph, Session,
};
use model_ir::{Model, ModelLoader};
use std::path::{Path, PathBuf};
use std::time::Instant;

// ── Type-state markers ─────────────────────────────────────────

/// Configuration is set; nothing has been read.
#[derive(Debug)]
pub struct Configured;

/// The model is loaded and lowered into a session.
#[derive(Debug)]
pub struct Loaded {
    model: Model,
    session: Session,
}

/// Variables are constants and the graph is pruned.
#[derive(Debug)]
pub struct Frozen {
    graph: FrozenGraph,
}

/// The frozen graph is on disk.
#[derive(Debug)]
pub struct Serialized {
    graph: FrozenGraph,
    path: PathBuf,
}

mod sealed {
    pub trait Sealed {}
    impl Sealed for super::Configured {}
    impl Sealed for super::Loaded {}
    impl Sealed for super::Frozen {}
    impl Sealed for super::Serialized {}
}

/// Sealed trait for pipeline states.
pub trait PipelineState: sealed::Sealed + std::fmt::Debug {}
impl PipelineState for Configured {}
impl PipelineState for Loaded {}
impl PipelineState for Frozen {}
impl PipelineState for Serialized {}

// ── Pipeline ───────────────────────────────────────────────────

/// A single freezing run.
///
/// # Example
/// ```no_run
/// use freezer::{FreezeConfig, FreezePipeline};
///
/// # fn example() -> Result<(), freezer::FreezeError> {
/// let done = FreezePipeline::new(FreezeConfig::default())?
///     .load()?
///     .freeze()?
///     .write()?;
/// println!("{}", done.report().summary());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct FreezePipeline<S: PipelineState = Configured> {
    config: FreezeConfig,
    state: S,
    report: FreezeReport,
}

impl<S: PipelineState> FreezePipeline<S> {
    pub fn config(&self) -> &FreezeConfig {
        &self.config
    }

    /// Report of the stages run so far.
    pub fn report(&self) -> &FreezeReport {
        &self.report
    }
}

// ── Configured → Loaded ────────────────────────────────────────

impl FreezePipeline<Configured> {
    /// Validates `config` and creates a pipeline.
    pub fn new(config: FreezeConfig) -> Result<Self, FreezeError> {
        config.validate()?;
        tracing::info!(
            "freezing '{}' into {}",
            config.model_path.display(),
            config.output_path().display()
        );
        Ok(Self {
            config,
            state: Configured,
            report: FreezeReport::default(),
        })
    }

    /// Reads and validates the model, then lowers it into a session.
    ///
    /// Every load error surfaces here, before any graph is produced.
    pub fn load(self) -> Result<FreezePipeline<Loaded>, FreezeError> {
        let start = Instant::now();
        let model = ModelLoader::load_with_extension(
            &self.config.model_path,
            &self.config.weights_extension,
        )?;
        let mut pipeline = self.from_model(model)?;
        pipeline.report.load_duration = start.elapsed();
        Ok(pipeline)
    }

    /// Skips the file loader and starts from an in-memory model.
    pub fn from_model(self, model: Model) -> Result<FreezePipeline<Loaded>, FreezeError> {
        let start = Instant::now();
        let session = Session::from_model(&model, self.config.session_options())?;
        tracing::info!("{}", session.summary());

        let mut report = FreezeReport::new(model.name());
        report.nodes_before = session.graph().len();
        report.load_duration = start.elapsed();

        Ok(FreezePipeline {
            config: self.config,
            state: Loaded { model, session },
            report,
        })
    }
}

// ── Loaded → Frozen ────────────────────────────────────────────

impl FreezePipeline<Loaded> {
    pub fn model(&self) -> &Model {
        &self.state.model
    }

    pub fn session(&self) -> &Session {
        &self.state.session
    }

    /// Output identifiers the graph will be frozen for: the configured
    /// names, or the model's outputs when none are configured.
    pub fn output_names(&self) -> Vec<String> {
        if self.config.output_names.is_empty() {
            self.state.session.model_outputs().to_vec()
        } else {
            self.config.output_names.clone()
        }
    }

    /// Freezes the session's variables and prunes the graph.
    pub fn freeze(self) -> Result<FreezePipeline<Frozen>, FreezeError> {
        let start = Instant::now();
        let outputs = self.output_names();
        let options = self.config.freeze_options();
        let graph = freeze_session(&self.state.session, &outputs, &options)?;

        let mut report = self.report;
        report.freeze_duration = start.elapsed();
        report.nodes_after = graph.num_nodes();
        report.kept_variables = graph.variable_nodes().len();
        report.frozen_variables = self.state.session.global_variables().len() - report.kept_variables;
        report.constant_bytes = graph.constant_bytes();
        tracing::info!("{}", graph.summary());

        Ok(FreezePipeline {
            config: self.config,
            state: Frozen { graph },
            report,
        })
    }
}

// ── Frozen → Serialized ────────────────────────────────────────

impl FreezePipeline<Frozen> {
    pub fn frozen_graph(&self) -> &FrozenGraph {
        &self.state.graph
    }

    /// Writes the frozen graph to `<output_dir>/<output_file>`.
    pub fn write(self) -> Result<FreezePipeline<Serialized>, FreezeError> {
        let start = Instant::now();
        let path = write_graph(
            &self.state.graph,
            &self.config.output_dir,
            &self.config.output_file,
            self.config.graph_format(),
        )?;

        let mut report = self.report;
        report.write_duration = start.elapsed();
        report.output_bytes = std::fs::metadata(&path)
            .map_err(|source| FreezeError::Io {
                path: path.clone(),
                source,
            })?
            .len();
        report.output_path = Some(path.clone());

        Ok(FreezePipeline {
            config: self.config,
            state: Serialized {
                graph: self.state.graph,
                path,
            },
            report,
        })
    }
}

// ── Serialized ─────────────────────────────────────────────────

impl FreezePipeline<Serialized> {
    pub fn frozen_graph(&self) -> &FrozenGraph {
        &self.state.graph
    }

    pub fn output_path(&self) -> &Path {
        &self.state.path
    }

    pub fn into_report(self) -> FreezeReport {
        self.report
    }
}

/// Runs the whole pipeline for `config` and returns its report.
pub fn run(config: FreezeConfig) -> Result<FreezeReport, FreezeError> {
    let done = FreezePipeline::new(config)?.load()?.freeze()?.write()?;
    tracing::info!("{}", done.report().summary());
    Ok(done.into_report())
}

#[cfg(test)]
mod tests {
    use super::*;
    use model_ir::ModelTopology;
    use std::collections::BTreeMap;
    use tensor_core::{Shape, Tensor};

    fn model() -> Model {
        let topology = ModelTopology::from_json(
            r#"{
                "name": "tiny",
                "inputs": [{ "name": "x", "shape": [1, 2] }],
                "layers": [{
                    "name": "dense",
                    "layer_type": "dense",
                    "weights": [
                        { "name": "dense/kernel", "shape": [2, 3] },
                        { "name": "dense/bias", "shape": [3] }
                    ],
                    "config": { "activation": "sigmoid" }
                }],
                "outputs": ["dense"]
            }"#,
        )
        .unwrap();
        let mut weights = BTreeMap::new();
        weights.insert(
            "dense/kernel".to_string(),
            Tensor::from_f32(Shape::matrix(2, 3), &[0.1; 6]).unwrap(),
        );
        weights.insert(
            "dense/bias".to_string(),
            Tensor::from_f32(Shape::vector(3), &[0.0; 3]).unwrap(),
        );
        ModelLoader::from_topology_and_weights(&topology, weights).unwrap()
    }

    fn config(dir: &Path) -> FreezeConfig {
        FreezeConfig {
            output_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_transition_chain() {
        let tmp = tempfile::tempdir().unwrap();
        let loaded = FreezePipeline::new(config(tmp.path()))
            .unwrap()
            .from_model(model())
            .unwrap();
        assert_eq!(loaded.output_names(), vec!["dense/Sigmoid"]);
        assert_eq!(loaded.model().name(), "tiny");
        // x, 2 × (variable, assign_value, Assign), MatMul, BiasAdd, Sigmoid
        assert_eq!(loaded.report().nodes_before, 10);

        let frozen = loaded.freeze().unwrap();
        assert!(frozen.frozen_graph().variable_nodes().is_empty());
        assert_eq!(frozen.report().frozen_variables, 2);
        assert_eq!(frozen.report().nodes_after, 6);

        let done = frozen.write().unwrap();
        assert_eq!(done.output_path(), tmp.path().join("tl_classifier_tf_model1.pb"));
        assert!(done.report().output_bytes > 0);
        assert_eq!(crate::read_graph(done.output_path()).unwrap(), *done.frozen_graph());
    }

    #[test]
    fn test_configured_output_names() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = FreezeConfig {
            output_names: vec!["dense/BiasAdd".into()],
            ..config(tmp.path())
        };
        let frozen = FreezePipeline::new(cfg)
            .unwrap()
            .from_model(model())
            .unwrap()
            .freeze()
            .unwrap();
        assert!(frozen.frozen_graph().graph().node("dense/Sigmoid").is_none());
        assert_eq!(frozen.frozen_graph().outputs(), &["dense/BiasAdd"]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = FreezeConfig {
            output_file: String::new(),
            ..Default::default()
        };
        assert!(matches!(FreezePipeline::new(cfg), Err(FreezeError::Config(_))));
    }

    #[test]
    fn test_load_missing_model() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = FreezeConfig {
            model_path: tmp.path().join("absent"),
            ..config(tmp.path())
        };
        let result = FreezePipeline::new(cfg).unwrap().load();
        assert!(matches!(
            result,
            Err(FreezeError::Model(model_ir::ModelError::MissingFile { .. }))
        ));
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
