// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use nalgebra::Vector3;
use polyframe_script::geometry::{BooleanOp, GeometryKernel, MeshKernel, Primitive};
use polyframe_script::io::OfflineFetcher;
use polyframe_script::output::{PipelineMeta, ScriptMeta};
use polyframe_script::{ExecutionRequest, Runner, RunnerConfig, ScriptOutputPath, StatementParser};
use std::sync::Arc;

const WALL: &str = r#"
    const width = 4000;
    let wall = box(width, 200, 3000);
    let opening = box(900, 400, 2100).move(500, -100, 0);
    wall.subtract(opening);
    for (let i = 0; i < 4; i++) {
        sphere(50).move(i * 1000, 0, 3100);
    }
    calc.table('parts', [{ name: 'wall', qty: 1 }]);
    print('done');
"#;

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    let parser = StatementParser::new();

    let simple = "box(10, 10, 10)";
    group.bench_with_input(BenchmarkId::new("simple_box", ""), &simple, |b, source| {
        b.iter(|| parser.parse("bench", black_box(source)).unwrap())
    });
    group.bench_with_input(BenchmarkId::new("wall", ""), &WALL, |b, source| {
        b.iter(|| parser.parse("bench", black_box(source)).unwrap())
    });

    group.finish();
}

fn bench_output_paths(c: &mut Criterion) {
    let mut group = c.benchmark_group("output_paths");
    let mut meta = ScriptMeta::default();
    for pipeline in ["default", "cnc", "render"] {
        meta.add_pipeline(
            pipeline,
            PipelineMeta {
                tables: (0..10).map(|i| format!("table{i}")).collect(),
                metrics: vec!["area".into(), "volume".into()],
                ..PipelineMeta::default()
            },
        );
    }

    group.bench_function("parse", |b| {
        b.iter(|| ScriptOutputPath::parse(black_box("default/tables/parts/xlsx?sheet=BOM&header")))
    });
    group.bench_function("resolve_wildcards", |b| {
        let path = ScriptOutputPath::parse("*/tables/*/json");
        b.iter(|| path.resolve_verbose(black_box(&meta)))
    });
    group.bench_function("resolve_everything", |b| {
        let path = ScriptOutputPath::parse("*");
        b.iter(|| path.resolve_verbose(black_box(&meta)))
    });

    group.finish();
}

fn bench_kernel(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel");
    let kernel = MeshKernel::new();

    group.bench_function("sphere_32", |b| {
        b.iter(|| Primitive::sphere(black_box(10.0), black_box(32)).to_mesh())
    });

    let wall = Primitive::cuboid(Vector3::new(10.0, 10.0, 10.0)).to_mesh();
    let tool = Primitive::cuboid(Vector3::new(8.0, 8.0, 8.0)).to_mesh();
    group.bench_function("difference", |b| {
        b.iter(|| {
            kernel
                .boolean(black_box(&wall), black_box(&tool), BooleanOp::Difference)
                .unwrap()
        })
    });

    group.finish();
}

fn bench_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("run");
    let rt = tokio::runtime::Runtime::new().unwrap();
    let runner = Runner::builder(RunnerConfig::new())
        .fetcher(Arc::new(OfflineFetcher))
        .build();

    group.bench_function("wall_statements", |b| {
        b.to_async(&rt).iter(|| async {
            runner
                .execute(ExecutionRequest::new(WALL).with_outputs(["default/model/stl"]))
                .await
        })
    });
    group.bench_function("wall_glb_and_tables", |b| {
        b.to_async(&rt).iter(|| async {
            runner
                .execute(ExecutionRequest::new(WALL).with_outputs(["default/model/glb", "default/tables/*/json"]))
                .await
        })
    });

    group.finish();
}

criterion_group!(benches, bench_parse, bench_output_paths, bench_kernel, bench_run);
criterion_main!(benches);
