// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Benchmarks for session lowering, freezing and graph encoding.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use freezer::{encode_graph, freeze_session, FreezeOptions, GraphFormat, Session, SessionOptions};
use model_ir::{Model, ModelLoader, ModelTopology, TopologyLayer, WeightSpec};
use std::collections::BTreeMap;
use tensor_core::{Shape, Tensor};

/// A stack of `depth` dense layers of width `width`.
fn mlp(depth: usize, width: usize) -> Model {
    let layers = (0..depth)
        .map(|i| TopologyLayer {
            name: format!("dense_{i}"),
            layer_type: "dense".into(),
            inputs: Vec::new(),
            weights: vec![
                WeightSpec {
                    name: format!("dense_{i}/kernel"),
                    shape: Shape::matrix(width, width),
                },
                WeightSpec {
                    name: format!("dense_{i}/bias"),
                    shape: Shape::vector(width),
                },
            ],
            config: model_ir::LayerConfig {
                activation: Some("relu".into()),
                ..Default::default()
            },
        })
        .collect();
    let topology = ModelTopology {
        name: format!("mlp_{depth}x{width}"),
        dtype: "f32".into(),
        inputs: vec![model_ir::InputSpec {
            name: "x".into(),
            shape: Shape::matrix(1, width),
        }],
        layers,
        outputs: vec![format!("dense_{}", depth - 1)],
    };

    let weights: BTreeMap<String, Tensor> = topology
        .weight_specs()
        .map(|spec| {
            let n = spec.shape.num_elements();
            (spec.name.clone(), Tensor::from_f32(spec.shape.clone(), &vec![0.01; n]).unwrap())
        })
        .collect();
    ModelLoader::from_topology_and_weights(&topology, weights).unwrap()
}

fn bench_lowering(c: &mut Criterion) {
    let mut group = c.benchmark_group("lower_model");
    for depth in [4, 16, 64] {
        let model = mlp(depth, 64);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &model, |b, model| {
            b.iter(|| Session::from_model(black_box(model), SessionOptions::default()).unwrap())
        });
    }
    group.finish();
}

fn bench_freeze(c: &mut Criterion) {
    let mut group = c.benchmark_group("freeze_session");
    for depth in [4, 16, 64] {
        let session = Session::from_model(&mlp(depth, 64), SessionOptions::default()).unwrap();
        let outputs = session.model_outputs().to_vec();
        let options = FreezeOptions::default();
        group.bench_with_input(BenchmarkId::from_parameter(depth), &session, |b, session| {
            b.iter(|| freeze_session(black_box(session), &outputs, &options).unwrap())
        });
    }
    group.finish();
}

fn bench_encode(c: &mut Criterion) {
    let session = Session::from_model(&mlp(16, 256), SessionOptions::default()).unwrap();
    let frozen =
        freeze_session(&session, session.model_outputs(), &FreezeOptions::default()).unwrap();

    let mut group = c.benchmark_group("encode_graph");
    for format in [GraphFormat::Binary, GraphFormat::Text] {
        group.bench_with_input(BenchmarkId::from_parameter(format), &frozen, |b, frozen| {
            b.iter(|| encode_graph(black_box(frozen), format).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_lowering, bench_freeze, bench_encode);
criterion_main!(benches);
