// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Freezing run report.
//!
//! [`FreezeReport`] collects what a pipeline run did: how much the graph
//! shrank, how many variables became constants and how long each stage
//! took.

use std::path::PathBuf;
use std::time::Duration;

/// Summary of a complete freezing run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FreezeReport {
    /// Name of the frozen model.
    pub model_name: String,
    /// Nodes in the session graph before pruning.
    pub nodes_before: usize,
    /// Nodes in the frozen graph.
    pub nodes_after: usize,
    /// Variables replaced by constants.
    pub frozen_variables: usize,
    /// Variables left mutable.
    pub kept_variables: usize,
    /// Total constant payload in bytes.
    pub constant_bytes: usize,
    /// Size of the written file in bytes.
    pub output_bytes: u64,
    /// Where the graph was written.
    pub output_path: Option<PathBuf>,
    /// Time spent reading and validating the model.
    pub load_duration: Duration,
    /// Time spent lowering and freezing.
    pub freeze_duration: Duration,
    /// Time spent encoding and writing.
    pub write_duration: Duration,
}

impl FreezeReport {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            ..Default::default()
        }
    }

    pub fn total_duration(&self) -> Duration {
        self.load_duration + self.freeze_duration + self.write_duration
    }

    /// Fraction of session nodes removed by pruning, in percent.
    pub fn pruned_percent(&self) -> f64 {
        if self.nodes_before == 0 {
            return 0.0;
        }
        (self.nodes_before - self.nodes_after.min(self.nodes_before)) as f64
            / self.nodes_before as f64
            * 100.0
    }

    /// Returns a human-readable summary suitable for CLI output.
    pub fn summary(&self) -> String {
        let path = self
            .output_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<not written>".to_string());
        format!(
            "Freeze '{}': {} -> {} nodes ({:.0}% pruned), {} variables frozen, {} kept, \
             {:.2} MB constants, {} bytes written to {} \
             (load {:.2}ms, freeze {:.2}ms, write {:.2}ms)",
            self.model_name,
            self.nodes_before,
            self.nodes_after,
            self.pruned_percent(),
            self.frozen_variables,
            self.kept_variables,
            self.constant_bytes as f64 / (1024.0 * 1024.0),
            self.output_bytes,
            path,
            self.load_duration.as_secs_f64() * 1000.0,
            self.freeze_duration.as_secs_f64() * 1000.0,
            self.write_duration.as_secs_f64() * 1000.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pruned_percent() {
        let r = FreezeReport {
            nodes_before: 40,
            nodes_after: 10,
            ..FreezeReport::new("m")
        };
        assert!((r.pruned_percent() - 75.0).abs() < 1e-9);
        assert_eq!(FreezeReport::new("empty").pruned_percent(), 0.0);
    }

    #[test]
    fn test_summary() {
        let r = FreezeReport {
            nodes_before: 12,
            nodes_after: 6,
            frozen_variables: 2,
            output_path: Some(PathBuf::from("out/model.pb")),
            load_duration: Duration::from_millis(3),
            ..FreezeReport::new("tiny")
        };
        let s = r.summary();
        assert!(s.contains("Freeze 'tiny': 12 -> 6 nodes (50% pruned)"));
        assert!(s.contains("out/model.pb"));
        assert_eq!(r.total_duration(), Duration::from_millis(3));
    }
}
