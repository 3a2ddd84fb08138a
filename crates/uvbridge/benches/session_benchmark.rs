//! # Session Benchmark
//!
//! Measures the full host round trip: marshal a mesh into engine memory,
//! generate, then pull the UVs back out.
//!
//! Run with: `cargo bench --package uvbridge`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uvbridge::{Atlas, IndexData, MeshInput, PackOptions, SoftEngine};

fn grid(cells: u32) -> (Vec<[f32; 3]>, Vec<u32>) {
    let positions = (0..=cells)
        .flat_map(|y| (0..=cells).map(move |x| [x as f32, y as f32, 0.0]))
        .collect();
    let mut indices = Vec::with_capacity((cells * cells * 6) as usize);
    for y in 0..cells {
        for x in 0..cells {
            let a = y * (cells + 1) + x;
            let c = a + cells + 1;
            indices.extend_from_slice(&[a, a + 1, c + 1, a, c + 1, c]);
        }
    }
    (positions, indices)
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_generate_copy_uv");
    group.sample_size(20);

    for cells in [8u32, 32, 96] {
        let (positions, indices) = grid(cells);
        let mesh = MeshInput {
            positions: &positions,
            indices: Some(IndexData::U32(&indices)),
            ..MeshInput::default()
        };
        let options = PackOptions { resolution: 1024, ..PackOptions::default() };

        group.bench_with_input(BenchmarkId::from_parameter(cells * cells * 2), &mesh, |b, mesh| {
            let mut engine = SoftEngine::with_pages(16, 4096).expect("engine");
            b.iter(|| {
                let mut atlas = Atlas::new(&mut engine).expect("create");
                atlas.add_mesh(mesh, 1).expect("add");
                atlas.generate(None, Some(&options)).expect("generate");
                black_box(atlas.copy_uv(0).expect("copy_uv"))
            });
        });
    }

    group.finish();
}

fn bench_repack(c: &mut Criterion) {
    let (positions, indices) = grid(32);
    let mesh = MeshInput {
        positions: &positions,
        indices: Some(IndexData::U32(&indices)),
        ..MeshInput::default()
    };
    let mut engine = SoftEngine::with_pages(16, 4096).expect("engine");
    let mut atlas = Atlas::new(&mut engine).expect("create");
    atlas.add_mesh(&mesh, 1).expect("add");
    atlas.compute_charts(None).expect("compute");
    let options = PackOptions { resolution: 512, ..PackOptions::default() };

    c.bench_function("repack_2k_triangles", |b| {
        b.iter(|| {
            atlas.pack_charts(Some(&options)).expect("pack");
            black_box(atlas.header().expect("header"))
        });
    });
}

criterion_group!(benches, bench_generate, bench_repack);
criterion_main!(benches);
