// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Model loading from a topology file and a SafeTensors weights blob.
//!
//! Given a path prefix such as `TL_handling/tl_classifier_model`, the
//! loader reads:
//! - `<prefix>.json`: the topology (see [`ModelTopology`]).
//! - `<prefix>.safetensors`: the weight blob (extension configurable).
//!
//! Keras `<prefix>.h5` (HDF5) weight files are not read. Convert them to
//! SafeTensors first; pointing the extension at `h5` only makes the loader
//! fail with a weights parse error.
//!
//! Everything is validated before a [`Model`] is returned: both files must
//! exist, the topology must resolve, and every declared weight must be
//! present with the declared shape and dtype.

use crate::{Model, ModelError, ModelTopology};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tensor_core::{DType, Shape, Tensor};

/// Topology file extension.
pub const TOPOLOGY_EXTENSION: &str = "json";

/// Default weights file extension. The file must be SafeTensors whatever
/// its extension; HDF5 is not supported.
pub const DEFAULT_WEIGHTS_EXTENSION: &str = "safetensors";

/// Loads a model from disk.
///
/// # Example
/// ```no_run
/// use model_ir::ModelLoader;
/// use std::path::Path;
///
/// let model = ModelLoader::load(Path::new("TL_handling/tl_classifier_model")).unwrap();
/// println!("{}", model.summary());
/// ```
pub struct ModelLoader;

impl ModelLoader {
    /// Loads `<prefix>.json` and `<prefix>.safetensors`.
    pub fn load(prefix: &Path) -> Result<Model, ModelError> {
        Self::load_with_extension(prefix, DEFAULT_WEIGHTS_EXTENSION)
    }

    /// Loads `<prefix>.json` and `<prefix>.<weights_extension>`.
    ///
    /// Steps:
    /// 1. Check that both files exist.
    /// 2. Parse and resolve the topology.
    /// 3. Read every tensor from the weights file.
    /// 4. Attach the tensors to the topology, checking shapes and dtypes.
    pub fn load_with_extension(prefix: &Path, weights_extension: &str) -> Result<Model, ModelError> {
        let topology_path = Self::topology_path(prefix);
        let weights_path = Self::weights_path(prefix, weights_extension);

        // 1. Fail early with a clear message instead of deep in a parser.
        for path in [&topology_path, &weights_path] {
            if !path.is_file() {
                return Err(ModelError::MissingFile { path: path.clone() });
            }
        }

        // 2. Topology.
        let topology = ModelTopology::from_file(&topology_path)?;
        topology.validate()?;
        tracing::debug!(
            "topology '{}': {} layers, {} declared weights",
            topology.name,
            topology.layers.len(),
            topology.total_weight_count(),
        );

        // 3. Weights.
        let tensors = read_weight_tensors(&weights_path)?;

        // 4. Attach.
        let model = Model::new(&topology, tensors)?;
        tracing::info!("loaded {}", model.summary());
        Ok(model)
    }

    /// Builds a model from an in-memory topology and tensor map.
    ///
    /// Useful for testing without files on disk.
    pub fn from_topology_and_weights(
        topology: &ModelTopology,
        weights: BTreeMap<String, Tensor>,
    ) -> Result<Model, ModelError> {
        Model::new(topology, weights)
    }

    /// `<prefix>.json`
    pub fn topology_path(prefix: &Path) -> PathBuf {
        with_suffix(prefix, TOPOLOGY_EXTENSION)
    }

    /// `<prefix>.<extension>`
    pub fn weights_path(prefix: &Path, extension: &str) -> PathBuf {
        with_suffix(prefix, extension)
    }
}

/// Appends `.ext` to a path without replacing an existing extension, so
/// prefixes like `models/v1.2/net` keep their dots.
fn with_suffix(prefix: &Path, ext: &str) -> PathBuf {
    let mut s: OsString = prefix.as_os_str().to_owned();
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Reads every tensor of a SafeTensors file into owned [`Tensor`]s.
pub fn read_weight_tensors(path: &Path) -> Result<BTreeMap<String, Tensor>, ModelError> {
    let file = std::fs::File::open(path).map_err(|source| ModelError::WeightsRead {
        path: path.to_path_buf(),
        source,
    })?;

    // SAFETY: the mapping is read-only and dropped before this function
    // returns; tensor bytes are copied out while it is alive.
    let mmap = unsafe { memmap2::Mmap::map(&file) }.map_err(|source| ModelError::WeightsRead {
        path: path.to_path_buf(),
        source,
    })?;

    let st = safetensors::SafeTensors::deserialize(&mmap)
        .map_err(|e| ModelError::WeightsParse(format!("'{}': {e}", path.display())))?;

    let mut tensors = BTreeMap::new();
    for (name, view) in st.tensors() {
        let shape = Shape::new(view.shape().to_vec());
        let dtype = convert_safetensor_dtype(view.dtype())?;
        let tensor = Tensor::from_bytes(shape, dtype, view.data().to_vec())
            .map_err(|e| ModelError::WeightsParse(format!("tensor '{name}': {e}")))?;
        tensors.insert(name, tensor);
    }

    tracing::debug!(
        "read {} tensors ({:.2} MB) from {}",
        tensors.len(),
        mmap.len() as f64 / (1024.0 * 1024.0),
        path.display(),
    );
    Ok(tensors)
}

/// Converts a SafeTensors `Dtype` to our [`DType`].
fn convert_safetensor_dtype(st_dtype: safetensors::Dtype) -> Result<DType, ModelError> {
    match st_dtype {
        safetensors::Dtype::F32 => Ok(DType::F32),
        safetensors::Dtype::F16 => Ok(DType::F16),
        safetensors::Dtype::BF16 => Ok(DType::BF16),
        safetensors::Dtype::I8 => Ok(DType::I8),
        safetensors::Dtype::I32 => Ok(DType::I32),
        safetensors::Dtype::I64 => Ok(DType::I64),
        other => Err(ModelError::UnsupportedDType(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use safetensors::tensor::TensorView;

    const TOPOLOGY: &str = r#"{
        "name": "tiny",
        "inputs": [{ "name": "x", "shape": [1, 2] }],
        "layers": [{
            "name": "dense",
            "layer_type": "dense",
            "weights": [
                { "name": "dense/kernel", "shape": [2, 3] },
                { "name": "dense/bias", "shape": [3] }
            ],
            "config": { "activation": "relu" }
        }],
        "outputs": ["dense"]
    }"#;

    fn f32_bytes(values: &[f32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// Writes `<dir>/model.json` and `<dir>/model.safetensors`, returning the prefix.
    fn write_model(dir: &Path, kernel_shape: Vec<usize>) -> PathBuf {
        let prefix = dir.join("model");
        std::fs::write(ModelLoader::topology_path(&prefix), TOPOLOGY).unwrap();

        let n: usize = kernel_shape.iter().product();
        let kernel = f32_bytes(&vec![0.25; n]);
        let bias = f32_bytes(&[1.0, 2.0, 3.0]);
        let tensors = vec![
            (
                "dense/kernel",
                TensorView::new(safetensors::Dtype::F32, kernel_shape, &kernel).unwrap(),
            ),
            (
                "dense/bias",
                TensorView::new(safetensors::Dtype::F32, vec![3], &bias).unwrap(),
            ),
        ];
        let bytes = safetensors::serialize(tensors, &None).unwrap();
        std::fs::write(ModelLoader::weights_path(&prefix, "safetensors"), bytes).unwrap();
        prefix
    }

    #[test]
    fn test_load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = write_model(dir.path(), vec![2, 3]);

        let model = ModelLoader::load(&prefix).unwrap();
        assert_eq!(model.name(), "tiny");
        assert_eq!(model.num_weights(), 2);
        let bias = model.weight("dense/bias").unwrap();
        assert_eq!(bias.to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_hdf5_weights_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = write_model(dir.path(), vec![2, 3]);
        // HDF5 files start with this signature.
        std::fs::write(
            ModelLoader::weights_path(&prefix, "h5"),
            b"\x89HDF\r\n\x1a\n\0\0\0\0\0\0\0\0",
        )
        .unwrap();

        let result = ModelLoader::load_with_extension(&prefix, "h5");
        assert!(matches!(result, Err(ModelError::WeightsParse(_))));
    }

    #[test]
    fn test_shape_mismatch_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = write_model(dir.path(), vec![3, 2]);

        let result = ModelLoader::load(&prefix);
        assert!(matches!(
            result,
            Err(ModelError::ShapeMismatch { ref weight, .. }) if weight == "dense/kernel"
        ));
    }

    #[test]
    fn test_missing_weights_file() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("model");
        std::fs::write(ModelLoader::topology_path(&prefix), TOPOLOGY).unwrap();

        let result = ModelLoader::load(&prefix);
        assert!(matches!(result, Err(ModelError::MissingFile { .. })));
    }

    #[test]
    fn test_missing_topology_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = ModelLoader::load(&dir.path().join("absent"));
        assert!(matches!(result, Err(ModelError::MissingFile { path }) if path.ends_with("absent.json")));
    }

    #[test]
    fn test_malformed_topology_file() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = write_model(dir.path(), vec![2, 3]);
        std::fs::write(ModelLoader::topology_path(&prefix), "{ not json").unwrap();

        let result = ModelLoader::load(&prefix);
        assert!(matches!(result, Err(ModelError::TopologyParse(_))));
    }

    #[test]
    fn test_corrupt_weights_file() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = write_model(dir.path(), vec![2, 3]);
        std::fs::write(ModelLoader::weights_path(&prefix, "safetensors"), b"garbage").unwrap();

        let result = ModelLoader::load(&prefix);
        assert!(matches!(result, Err(ModelError::WeightsParse(_))));
    }

    #[test]
    fn test_custom_extension() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = write_model(dir.path(), vec![2, 3]);
        std::fs::rename(
            ModelLoader::weights_path(&prefix, "safetensors"),
            ModelLoader::weights_path(&prefix, "weights"),
        )
        .unwrap();

        assert!(ModelLoader::load(&prefix).is_err());
        ModelLoader::load_with_extension(&prefix, "weights").unwrap();
    }

    #[test]
    fn test_with_suffix_keeps_dots() {
        let p = ModelLoader::topology_path(Path::new("models/v1.2/net"));
        assert_eq!(p, PathBuf::from("models/v1.2/net.json"));
        let w = ModelLoader::weights_path(Path::new("a/b"), "h5");
        assert_eq!(w, PathBuf::from("a/b.h5"));
    }

    #[test]
    fn test_convert_dtype() {
        assert_eq!(convert_safetensor_dtype(safetensors::Dtype::F32).unwrap(), DType::F32);
        assert_eq!(convert_safetensor_dtype(safetensors::Dtype::BF16).unwrap(), DType::BF16);
        assert!(convert_safetensor_dtype(safetensors::Dtype::F64).is_err());
    }
}
