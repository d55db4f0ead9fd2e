// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Frozen graph file format and atomic writer.
//!
//! # Binary Layout
//! ```text
//! ┌──────────┬──────────────┬──────────────────────────────┐
//! │ "FRZG"   │ version u32  │ bincode(FrozenGraph)         │
//! │ 4 bytes  │ LE, 4 bytes  │ rest of file                 │
//! └──────────┴──────────────┴──────────────────────────────┘
//! ```
//!
//! The text format is the same [`FrozenGraph`] as pretty-printed JSON.
//! [`decode_graph`] tells the two apart by the magic bytes.

use crate::{FreezeError, FrozenGraph};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Leading bytes of a binary graph file.
pub const GRAPH_MAGIC: [u8; 4] = *b"FRZG";

/// Binary format version written by this crate.
pub const FORMAT_VERSION: u32 = 1;

/// Default output file name.
pub const DEFAULT_OUTPUT_FILE: &str = "tl_classifier_tf_model1.pb";

const HEADER_LEN: usize = GRAPH_MAGIC.len() + std::mem::size_of::<u32>();

/// Encoding used for the written graph file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphFormat {
    /// Magic, version and bincode payload.
    #[default]
    Binary,
    /// Pretty-printed JSON.
    Text,
}

impl GraphFormat {
    pub fn from_as_text(as_text: bool) -> Self {
        if as_text {
            GraphFormat::Text
        } else {
            GraphFormat::Binary
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GraphFormat::Binary => "binary",
            GraphFormat::Text => "text",
        }
    }
}

impl std::fmt::Display for GraphFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encodes a frozen graph. Equal graphs always encode to equal bytes.
pub fn encode_graph(graph: &FrozenGraph, format: GraphFormat) -> Result<Vec<u8>, FreezeError> {
    match format {
        GraphFormat::Binary => {
            let payload = bincode::serialize(graph).map_err(|e| FreezeError::Encode(e.to_string()))?;
            let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
            bytes.extend_from_slice(&GRAPH_MAGIC);
            bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
            bytes.extend_from_slice(&payload);
            Ok(bytes)
        }
        GraphFormat::Text => {
            let mut text =
                serde_json::to_string_pretty(graph).map_err(|e| FreezeError::Encode(e.to_string()))?;
            text.push('\n');
            Ok(text.into_bytes())
        }
    }
}

/// Decodes either format, detected from the leading bytes.
pub fn decode_graph(bytes: &[u8]) -> Result<FrozenGraph, FreezeError> {
    if let Some(rest) = bytes.strip_prefix(&GRAPH_MAGIC) {
        let (version, payload) = rest
            .split_first_chunk::<4>()
            .ok_or_else(|| FreezeError::Decode("truncated header".into()))?;
        let version = u32::from_le_bytes(*version);
        if version != FORMAT_VERSION {
            return Err(FreezeError::Decode(format!(
                "unsupported format version {version} (expected {FORMAT_VERSION})"
            )));
        }
        return bincode::deserialize(payload).map_err(|e| FreezeError::Decode(e.to_string()));
    }

    serde_json::from_slice(bytes)
        .map_err(|e| FreezeError::Decode(format!("not a binary graph and not valid JSON: {e}")))
}

impl FrozenGraph {
    /// Encodes in the binary format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FreezeError> {
        encode_graph(self, GraphFormat::Binary)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FreezeError> {
        decode_graph(bytes)
    }
}

/// Writes `graph` to `<dir>/<file_name>` and returns the full path.
///
/// Creates `dir` (and parents) if absent and overwrites an existing file.
/// The bytes go to a temporary file in `dir` that is renamed into place,
/// so a failure at any point leaves no partial output behind.
pub fn write_graph(
    graph: &FrozenGraph,
    dir: &Path,
    file_name: &str,
    format: GraphFormat,
) -> Result<PathBuf, FreezeError> {
    check_file_name(file_name)?;
    let path = dir.join(file_name);
    let io_err = |source| FreezeError::Io {
        path: path.clone(),
        source,
    };

    let bytes = encode_graph(graph, format)?;

    std::fs::create_dir_all(dir).map_err(|source| FreezeError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(&bytes).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(&path).map_err(|e| io_err(e.error))?;

    tracing::info!(
        "wrote {} graph ({} bytes, {} nodes) to {}",
        format,
        bytes.len(),
        graph.num_nodes(),
        path.display(),
    );
    Ok(path)
}

/// Reads a graph file in either format.
pub fn read_graph(path: &Path) -> Result<FrozenGraph, FreezeError> {
    let bytes = std::fs::read(path).map_err(|source| FreezeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_graph(&bytes)
}

/// Output file names are plain names inside the output directory.
pub(crate) fn check_file_name(file_name: &str) -> Result<(), FreezeError> {
    if file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\'])
    {
        return Err(FreezeError::Config(format!(
            "output file name '{file_name}' must be a plain file name"
        )));
    }
    Ok(())
}
