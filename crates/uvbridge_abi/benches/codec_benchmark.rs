//! # Codec Benchmark
//!
//! Measures the per-struct cost of fixed-offset encode and decode, and the
//! cost of decoding the output arrays a large atlas produces.
//!
//! Run with: `cargo bench --package uvbridge_abi`

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uvbridge_abi::{
    decode_array, encode_array, read_index_array, Address, AtlasHeader, ChartOptions, IndexFormat,
    MeshDecl, PackOptions, StructCodec, Vertex,
};
use uvbridge_memory::{HeapBuffer, MemoryViews};

const SCRATCH: Address = Address::new(64);

fn memory(pages: u32) -> MemoryViews<HeapBuffer> {
    MemoryViews::new(HeapBuffer::new(pages, pages).expect("valid page limits"))
}

fn bench_option_blocks(c: &mut Criterion) {
    let mut memory = memory(1);
    let chart = ChartOptions::default();
    let pack = PackOptions { resolution: 2048, ..PackOptions::default() };

    c.bench_function("chart_options_round_trip", |b| {
        b.iter(|| {
            chart.encode(&mut memory, SCRATCH).expect("encode");
            black_box(ChartOptions::decode(&memory, SCRATCH).expect("decode"))
        });
    });

    c.bench_function("pack_options_round_trip", |b| {
        b.iter(|| {
            pack.encode(&mut memory, SCRATCH).expect("encode");
            black_box(PackOptions::decode(&memory, SCRATCH).expect("decode"))
        });
    });
}

fn bench_mesh_decl_encode(c: &mut Criterion) {
    let mut memory = memory(1);
    let decl = MeshDecl {
        vertex_position_data: Address::new(0x1000),
        index_data: Address::new(0x2000),
        vertex_count: 1024,
        vertex_position_stride: 12,
        index_count: 3 * 2000,
        index_format: IndexFormat::UInt32,
        ..MeshDecl::default()
    };

    c.bench_function("mesh_decl_encode", |b| {
        b.iter(|| decl.encode(&mut memory, black_box(SCRATCH)).expect("encode"));
    });

    let header = AtlasHeader { width: 1024, height: 1024, mesh_count: 1, ..AtlasHeader::default() };
    header.encode(&mut memory, SCRATCH).expect("encode");
    c.bench_function("atlas_header_decode", |b| {
        b.iter(|| black_box(AtlasHeader::decode(&memory, SCRATCH).expect("decode")));
    });
}

fn bench_vertex_arrays(c: &mut Criterion) {
    let mut group = c.benchmark_group("vertex_array_decode");

    for count in [1_000u32, 10_000, 100_000] {
        let pages = (count * Vertex::SIZE) / 65_536 + 2;
        let mut memory = memory(pages);
        let vertices: Vec<Vertex> = (0..count)
            .map(|i| Vertex { chart_index: 0, uv: [i as f32, 0.5], xref: i, ..Vertex::default() })
            .collect();
        encode_array(&mut memory, SCRATCH, &vertices).expect("encode");

        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| black_box(decode_array::<Vertex, _>(&memory, SCRATCH, count).expect("decode")));
        });
    }

    group.finish();
}

fn bench_index_widening(c: &mut Criterion) {
    let mut memory = memory(4);
    let indices: Vec<u16> = (0..60_000u16).collect();
    memory.write_u16(SCRATCH, &indices).expect("write");

    c.bench_function("u16_index_widen_60k", |b| {
        b.iter(|| {
            black_box(read_index_array(&memory, SCRATCH, 60_000, IndexFormat::UInt16).expect("read"))
        });
    });
}

criterion_group!(
    benches,
    bench_option_blocks,
    bench_mesh_decl_encode,
    bench_vertex_arrays,
    bench_index_widening,
);
criterion_main!(benches);
