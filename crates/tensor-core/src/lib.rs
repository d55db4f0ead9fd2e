// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! # tensor-core
//!
//! Value types shared by every stage of the freezing pipeline.
//!
//! This crate provides:
//! - [`Tensor`]: an owned, n-dimensional tensor stored as little-endian bytes.
//! - [`Shape`]: runtime shape descriptors.
//! - [`DType`]: supported element data types (f32, f16, bf16, i8, i32, i64).
//!
//! Tensors here are carriers, not compute objects: they hold parameter
//! values while a session is live and become the payload of constant nodes
//! once a graph is frozen. Byte layout is fixed to little-endian so that a
//! frozen graph encodes identically on every host.

mod dtype;
mod error;
mod shape;
mod tensor;

pub use dtype::DType;
pub use error::TensorError;
pub use shape::Shape;
pub use tensor::Tensor;
