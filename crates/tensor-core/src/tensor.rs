// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Owned tensor type.

use crate::{DType, Shape, TensorError};

/// An owned, n-dimensional tensor stored in contiguous memory.
///
/// # Memory Layout
/// Data is stored in row-major (C) order as a flat **little-endian** byte
/// buffer, independent of the host. Typed access goes through
/// [`to_f32_vec`](Tensor::to_f32_vec), which decodes rather than
/// reinterprets, so the buffer never needs to be aligned.
///
/// Deserialization re-checks that the buffer length matches
/// `shape.size_bytes(dtype)`, so a decoded tensor upholds the same
/// invariant as one built through [`Tensor::from_bytes`].
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "RawTensor")]
pub struct Tensor {
    shape: Shape,
    dtype: DType,
    data: Vec<u8>,
}

/// Unchecked wire form of a [`Tensor`].
#[derive(serde::Deserialize)]
struct RawTensor {
    shape: Shape,
    dtype: DType,
    data: Vec<u8>,
}

impl TryFrom<RawTensor> for Tensor {
    type Error = TensorError;

    fn try_from(raw: RawTensor) -> Result<Self, Self::Error> {
        Tensor::from_bytes(raw.shape, raw.dtype, raw.data)
    }
}

impl Tensor {
    /// Creates a new tensor filled with zeros.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape, DType};
    /// let t = Tensor::zeros(Shape::matrix(2, 3), DType::F32);
    /// assert_eq!(t.size_bytes(), 24); // 2 * 3 * 4 bytes
    /// ```
    pub fn zeros(shape: Shape, dtype: DType) -> Self {
        let size = shape.size_bytes(dtype);
        Self {
            shape,
            dtype,
            data: vec![0u8; size],
        }
    }

    /// Creates a tensor from raw little-endian bytes.
    ///
    /// Returns an error if the buffer size does not match `shape.size_bytes(dtype)`
    /// or if that size overflows.
    pub fn from_bytes(shape: Shape, dtype: DType, data: Vec<u8>) -> Result<Self, TensorError> {
        let Some(expected) = shape.checked_size_bytes(dtype) else {
            return Err(TensorError::ShapeOverflow { shape, dtype });
        };
        if data.len() != expected {
            return Err(TensorError::BufferSizeMismatch {
                shape,
                dtype,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, dtype, data })
    }

    /// Creates an `F32` tensor from a slice of values.
    ///
    /// # Examples
    /// ```
    /// use tensor_core::{Tensor, Shape};
    /// let t = Tensor::from_f32(Shape::vector(3), &[1.0, 2.0, 3.0]).unwrap();
    /// assert_eq!(t.to_f32_vec().unwrap(), vec![1.0, 2.0, 3.0]);
    /// ```
    pub fn from_f32(shape: Shape, values: &[f32]) -> Result<Self, TensorError> {
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        Self::from_bytes(shape, DType::F32, data)
    }

    /// Creates a rank-0 `F32` tensor.
    pub fn scalar_f32(value: f32) -> Self {
        Self {
            shape: Shape::scalar(),
            dtype: DType::F32,
            data: value.to_le_bytes().to_vec(),
        }
    }

    /// Returns the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the raw byte slice backing this tensor.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Returns the memory footprint of this tensor in bytes.
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Decodes the buffer into `f32` values.
    pub fn to_f32_vec(&self) -> Result<Vec<f32>, TensorError> {
        if self.dtype != DType::F32 {
            return Err(TensorError::DTypeMismatch {
                op: "to_f32_vec",
                actual: self.dtype,
                requested: DType::F32,
            });
        }
        Ok(self
            .data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }
}
