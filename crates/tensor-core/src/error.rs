// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Error types for tensor construction and access.

use crate::{DType, Shape};

/// Errors that can occur when building or reading tensors.
#[derive(Debug, thiserror::Error)]
pub enum TensorError {
    /// The provided buffer size does not match the expected size for the given shape and dtype.
    #[error("buffer size mismatch for {shape} {dtype}: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch {
        shape: Shape,
        dtype: DType,
        expected: usize,
        actual: usize,
    },

    /// The shape's byte size does not fit in `usize`.
    #[error("shape {shape} of {dtype} overflows the addressable size")]
    ShapeOverflow { shape: Shape, dtype: DType },

    /// Typed access was requested with the wrong element type.
    #[error("dtype mismatch in {op}: tensor is {actual}, requested {requested}")]
    DTypeMismatch {
        op: &'static str,
        actual: DType,
        requested: DType,
    },
}
