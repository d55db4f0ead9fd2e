// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Freezer configuration loaded from TOML files or constructed programmatically.
//!
//! # TOML Format
//! ```toml
//! model_path = "TL_handling/tl_classifier_model"
//! weights_extension = "safetensors"
//! output_dir = "ros/src/tl_detector/light_classification/models"
//! output_file = "tl_classifier_tf_model1.pb"
//! learning_phase = "inference"
//! output_names = []
//! keep_var_names = []
//! clear_devices = true
//! device = "/device:CPU:0"
//! as_text = false
//! ```
//!
//! Every key is optional; missing keys take the defaults shown above.

use crate::writer::{check_file_name, DEFAULT_OUTPUT_FILE};
use crate::{FreezeError, FreezeOptions, GraphFormat, LearningPhase, SessionOptions};
use std::path::{Path, PathBuf};

/// Configuration for a freezing run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FreezeConfig {
    /// Model prefix; `<model_path>.json` and `<model_path>.<weights_extension>` are read.
    pub model_path: PathBuf,
    /// Extension of the weights file.
    pub weights_extension: String,
    /// Directory the frozen graph is written to (created if absent).
    pub output_dir: PathBuf,
    /// File name of the frozen graph inside `output_dir`.
    pub output_file: String,
    /// Learning phase the session is built in.
    pub learning_phase: LearningPhase,
    /// Output identifiers to freeze for; empty means the model's outputs.
    pub output_names: Vec<String>,
    /// Variables left mutable.
    pub keep_var_names: Vec<String>,
    /// Strip device placements from the frozen graph.
    pub clear_devices: bool,
    /// Device placement stamped on session nodes.
    pub device: String,
    /// Write pretty JSON instead of the binary format.
    pub as_text: bool,
}

impl Default for FreezeConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("TL_handling/tl_classifier_model"),
            weights_extension: model_ir::DEFAULT_WEIGHTS_EXTENSION.to_string(),
            output_dir: PathBuf::from("ros/src/tl_detector/light_classification/models"),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            learning_phase: LearningPhase::Inference,
            output_names: Vec::new(),
            keep_var_names: Vec::new(),
            clear_devices: true,
            device: SessionOptions::default().device,
            as_text: false,
        }
    }
}

impl FreezeConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, FreezeError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FreezeError::Config(format!("cannot read config '{}': {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, FreezeError> {
        toml::from_str(toml_str).map_err(|e| FreezeError::Config(format!("TOML parse error: {e}")))
    }

    /// Serialises configuration to TOML.
    pub fn to_toml(&self) -> Result<String, FreezeError> {
        toml::to_string_pretty(self)
            .map_err(|e| FreezeError::Config(format!("TOML serialise error: {e}")))
    }

    /// Rejects empty paths and output file names that are not plain names.
    pub fn validate(&self) -> Result<(), FreezeError> {
        if self.model_path.as_os_str().is_empty() {
            return Err(FreezeError::Config("model_path must not be empty".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(FreezeError::Config("output_dir must not be empty".into()));
        }
        if self.weights_extension.is_empty() || self.weights_extension.starts_with('.') {
            return Err(FreezeError::Config(format!(
                "weights_extension '{}' must be a bare extension like 'safetensors'",
                self.weights_extension
            )));
        }
        check_file_name(&self.output_file)
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            learning_phase: self.learning_phase,
            device: self.device.clone(),
        }
    }

    pub fn freeze_options(&self) -> FreezeOptions {
        FreezeOptions {
            keep_var_names: self.keep_var_names.iter().cloned().collect(),
            clear_devices: self.clear_devices,
        }
    }

    pub fn graph_format(&self) -> GraphFormat {
        GraphFormat::from_as_text(self.as_text)
    }

    /// `<output_dir>/<output_file>`
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default() {
        let c = FreezeConfig::default();
        assert_eq!(c.model_path, PathBuf::from("TL_handling/tl_classifier_model"));
        assert_eq!(
            c.output_path(),
            PathBuf::from("ros/src/tl_detector/light_classification/models/tl_classifier_tf_model1.pb")
        );
        assert_eq!(c.learning_phase, LearningPhase::Inference);
        assert!(c.clear_devices);
        assert_eq!(c.graph_format(), GraphFormat::Binary);
        c.validate().unwrap();
    }

    #[test]
    fn test_from_toml_partial() {
        let toml = r#"
model_path = "/tmp/model"
learning_phase = "training"
keep_var_names = ["dense/bias"]
as_text = true
"#;
        let c = FreezeConfig::from_toml(toml).unwrap();
        assert_eq!(c.model_path, PathBuf::from("/tmp/model"));
        assert_eq!(c.learning_phase, LearningPhase::Training);
        assert_eq!(c.output_file, "tl_classifier_tf_model1.pb");
        assert_eq!(c.graph_format(), GraphFormat::Text);
        assert!(c.freeze_options().keep_var_names.contains("dense/bias"));
        assert!(c.session_options().learning_phase.is_training());
    }

    #[test]
    fn test_from_toml_rejects_unknown_key() {
        assert!(FreezeConfig::from_toml("strategy = \"greedy\"").is_err());
        assert!(FreezeConfig::from_toml("learning_phase = \"eval\"").is_err());
    }

    #[test]
    fn test_to_toml_roundtrip() {
        let c = FreezeConfig {
            output_names: vec!["probs/Softmax".into()],
            device: String::new(),
            ..Default::default()
        };
        let toml = c.to_toml().unwrap();
        assert_eq!(FreezeConfig::from_toml(&toml).unwrap(), c);
    }

    #[test]
    fn test_validate() {
        let bad_file = FreezeConfig {
            output_file: "../escape.pb".into(),
            ..Default::default()
        };
        assert!(bad_file.validate().is_err());

        let empty_model = FreezeConfig {
            model_path: PathBuf::new(),
            ..Default::default()
        };
        assert!(empty_model.validate().is_err());

        let dotted_ext = FreezeConfig {
            weights_extension: ".h5".into(),
            ..Default::default()
        };
        assert!(dotted_ext.validate().is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let result = FreezeConfig::from_file(Path::new("/nonexistent/freeze.toml"));
        assert!(matches!(result, Err(FreezeError::Config(_))));
    }
}
