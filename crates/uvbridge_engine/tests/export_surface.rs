//! Raw export-surface tests for the software engine.
//!
//! Everything here goes through addresses and codes only, the way a host
//! drives a compiled module.
//!
//! Run with: cargo test -p uvbridge_engine --test export_surface

use std::cell::RefCell;
use std::rc::Rc;
use uvbridge_abi::{
    decode_array, AddMeshError, AtlasHeader, Chart, ChartOptions, IndexFormat, Mesh, MeshDecl,
    PackOptions, ProgressCategory, StructCodec, UvMeshDecl, Vertex,
};
use uvbridge_engine::SoftEngine;
use uvbridge_memory::Address;

fn engine() -> SoftEngine {
    SoftEngine::with_pages(2, 64).unwrap()
}

/// Writes positions and indices into fresh engine blocks and returns a decl address.
fn declare(engine: &mut SoftEngine, positions: &[f32], indices: &[u16]) -> Address {
    let vertex_data = engine.malloc(u32::try_from(positions.len() * 4).unwrap());
    engine.memory_mut().write_f32(vertex_data, positions).unwrap();
    let index_data = engine.malloc(u32::try_from(indices.len() * 2).unwrap());
    engine.memory_mut().write_u16(index_data, indices).unwrap();

    let decl = engine.malloc(MeshDecl::SIZE);
    engine.mesh_decl_init(decl);
    let mut record = MeshDecl::decode(engine.memory(), decl).unwrap();
    record.vertex_position_data = vertex_data;
    record.vertex_position_stride = 12;
    record.vertex_count = u32::try_from(positions.len() / 3).unwrap();
    record.index_data = index_data;
    record.index_count = u32::try_from(indices.len()).unwrap();
    record.index_format = IndexFormat::UInt16;
    record.encode(engine.memory_mut(), decl).unwrap();
    decl
}

const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

fn header(engine: &SoftEngine, atlas: Address) -> AtlasHeader {
    AtlasHeader::decode(engine.memory(), atlas).unwrap()
}

#[test]
fn test_single_triangle_round_trip() {
    let mut engine = engine();
    let atlas = engine.create();
    let decl = declare(&mut engine, &TRIANGLE, &[0, 1, 2]);

    assert_eq!(engine.add_mesh(atlas, decl, 1), AddMeshError::Success.as_raw());
    engine.add_mesh_join(atlas);
    engine.generate(atlas, Address::NULL, Address::NULL);

    let header = header(&engine, atlas);
    assert_eq!(header.mesh_count, 1);
    assert_eq!(header.chart_count, 1);
    assert_eq!(header.atlas_count, 0);
    assert!(header.width > 0 && header.height > 0);

    let mesh = Mesh::decode(engine.memory(), header.meshes).unwrap();
    assert_eq!((mesh.vertex_count, mesh.index_count, mesh.chart_count), (3, 3, 1));

    let vertices: Vec<Vertex> = decode_array(engine.memory(), mesh.vertex_array, 3).unwrap();
    let mut xrefs: Vec<u32> = vertices.iter().map(|v| v.xref).collect();
    xrefs.sort_unstable();
    assert_eq!(xrefs, vec![0, 1, 2]);
    assert!(vertices.iter().all(|v| v.chart_index == 0 && v.atlas_index == 0));
}

#[test]
fn test_rejected_meshes_leave_atlas_unchanged() {
    let mut engine = engine();
    let atlas = engine.create();

    let out_of_range = declare(&mut engine, &TRIANGLE, &[0, 1, 5]);
    assert_eq!(engine.add_mesh(atlas, out_of_range, 1), AddMeshError::IndexOutOfRange.as_raw());

    let bad_count = declare(&mut engine, &TRIANGLE, &[0, 1, 2, 0]);
    assert_eq!(engine.add_mesh(atlas, bad_count, 1), AddMeshError::InvalidIndexCount.as_raw());

    assert_eq!(header(&engine, atlas).mesh_count, 0);

    let good = declare(&mut engine, &TRIANGLE, &[0, 1, 2]);
    assert_eq!(engine.add_mesh(atlas, good, 1), AddMeshError::Success.as_raw());
    assert_eq!(header(&engine, atlas).mesh_count, 1);
}

#[test]
fn test_mixing_mesh_kinds_is_an_error() {
    let mut engine = engine();
    let atlas = engine.create();
    let decl = declare(&mut engine, &TRIANGLE, &[0, 1, 2]);
    engine.add_mesh(atlas, decl, 1);

    let uv_decl = engine.malloc(UvMeshDecl::SIZE);
    engine.uv_mesh_decl_init(uv_decl);
    assert_eq!(engine.add_uv_mesh(atlas, uv_decl), AddMeshError::Error.as_raw());
}

#[test]
fn test_repack_keeps_chart_count() {
    let mut engine = engine();
    let atlas = engine.create();
    let quad = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0];
    let first = declare(&mut engine, &quad, &[0, 1, 2, 0, 2, 3]);
    let second = declare(&mut engine, &TRIANGLE, &[0, 1, 2]);
    engine.add_mesh(atlas, first, 2);
    engine.add_mesh(atlas, second, 2);
    engine.compute_charts(atlas, Address::NULL);
    let charts = header(&engine, atlas).chart_count;

    let options = engine.malloc(PackOptions::SIZE);
    for resolution in [64, 256] {
        PackOptions { resolution, ..PackOptions::default() }
            .encode(engine.memory_mut(), options)
            .unwrap();
        engine.pack_charts(atlas, options);

        let header = header(&engine, atlas);
        assert_eq!(header.chart_count, charts);
        assert_eq!(header.mesh_count, 2);
        assert_eq!((header.width, header.height), (resolution, resolution));
        assert!(header.atlas_count >= 1);
    }
}

#[test]
fn test_failed_repack_drops_stale_output() {
    let mut engine = SoftEngine::with_pages(1, 1).unwrap();
    let atlas = engine.create();
    let decl = declare(&mut engine, &TRIANGLE, &[0, 1, 2]);
    engine.add_mesh(atlas, decl, 1);
    engine.generate(atlas, Address::NULL, Address::NULL);
    assert!(!header(&engine, atlas).meshes.is_null());
    let live = engine.heap().live_blocks();

    let options = engine.malloc(PackOptions::SIZE);
    PackOptions { create_image: true, texels_per_unit: 512.0, ..PackOptions::default() }
        .encode(engine.memory_mut(), options)
        .unwrap();
    engine.pack_charts(atlas, options);

    let header = header(&engine, atlas);
    assert_eq!(header.mesh_count, 1);
    assert_eq!(header.chart_count, 1);
    assert!(header.meshes.is_null());
    assert!(header.image.is_null());
    assert!(header.utilization.is_null());
    assert_eq!((header.width, header.height), (0, 0));
    assert!(engine.heap().live_blocks() < live);
}

#[test]
fn test_destroy_releases_every_block() {
    let mut engine = engine();
    let baseline = engine.heap().live_blocks();

    let atlas = engine.create();
    let decl = declare(&mut engine, &TRIANGLE, &[0, 1, 2]);
    engine.add_mesh(atlas, decl, 1);

    let options = engine.malloc(PackOptions::SIZE);
    PackOptions { create_image: true, texels_per_unit: 16.0, ..PackOptions::default() }
        .encode(engine.memory_mut(), options)
        .unwrap();
    engine.generate(atlas, Address::NULL, options);
    engine.pack_charts(atlas, options);

    // Host-side blocks: positions, indices, decl, options.
    assert!(engine.heap().live_blocks() > baseline + 4);
    engine.destroy(atlas);
    assert_eq!(engine.heap().live_blocks(), baseline + 4);
    assert_eq!(engine.atlas_count(), 0);
}

#[test]
fn test_copy_uv_normalizes_by_atlas_size() {
    let mut engine = engine();
    let atlas = engine.create();
    let decl = declare(&mut engine, &TRIANGLE, &[0, 1, 2]);
    engine.add_mesh(atlas, decl, 1);
    engine.generate(atlas, Address::NULL, Address::NULL);

    let header = header(&engine, atlas);
    let mesh_address = header.meshes;
    let mesh = Mesh::decode(engine.memory(), mesh_address).unwrap();
    let vertices: Vec<Vertex> = decode_array(engine.memory(), mesh.vertex_array, 3).unwrap();

    let output = engine.malloc(3 * 12);
    assert_eq!(engine.copy_uv(atlas, mesh_address, output), 3);

    let xrefs = engine.memory().read_u32(output, 3).unwrap().to_vec();
    let uvs = engine.memory().read_f32(Address::new(output.get() + 12), 6).unwrap().to_vec();
    for (i, vertex) in vertices.iter().enumerate() {
        assert_eq!(xrefs[i], vertex.xref);
        assert!((uvs[2 * i] - vertex.uv[0] / header.width as f32).abs() < 1e-6);
        assert!((uvs[2 * i + 1] - vertex.uv[1] / header.height as f32).abs() < 1e-6);
        assert!((0.0..=1.0).contains(&uvs[2 * i]));
    }
}

#[test]
fn test_debug_strings() {
    let engine = engine();
    let read = |address: Address| engine.memory().read_c_str(address).unwrap();

    assert_eq!(read(engine.add_mesh_error_string(0)), "Success");
    assert_eq!(read(engine.add_mesh_error_string(3)), "InvalidFaceVertexCount");
    assert_eq!(read(engine.progress_category_string(2)), "PackCharts");
    assert!(engine.progress_category_string(9).is_null());
}

#[test]
fn test_initializers_write_defaults() {
    let mut engine = engine();
    let chart = engine.malloc(ChartOptions::SIZE);
    let pack = engine.malloc(PackOptions::SIZE);
    engine.memory_mut().fill(chart, ChartOptions::SIZE as usize, 0xEE).unwrap();
    engine.chart_options_init(chart);
    engine.pack_options_init(pack);

    assert_eq!(ChartOptions::decode(engine.memory(), chart).unwrap(), ChartOptions::default());
    let pack = PackOptions::decode(engine.memory(), pack).unwrap();
    assert!(pack.bilinear && pack.rotate_charts && pack.rotate_charts_to_axis);
    assert_eq!(pack.resolution, 0);
}

#[test]
fn test_progress_reports_every_stage() {
    let mut engine = engine();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    engine.set_progress_callback(Some(Box::new(move |category, percent| {
        sink.borrow_mut().push((category, percent));
    })));

    let atlas = engine.create();
    let decl = declare(&mut engine, &TRIANGLE, &[0, 1, 2]);
    engine.add_mesh(atlas, decl, 1);
    engine.generate(atlas, Address::NULL, Address::NULL);

    let seen = seen.borrow();
    for category in ProgressCategory::ALL {
        assert!(seen.contains(&(category, 100)), "{category} never finished");
    }
}

#[test]
fn test_chart_faces_cover_the_mesh() {
    let mut engine = engine();
    let atlas = engine.create();
    // Two triangles on different planes.
    let positions = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
    let decl = declare(&mut engine, &positions, &[0, 1, 2, 0, 3, 1]);
    engine.add_mesh(atlas, decl, 1);
    engine.generate(atlas, Address::NULL, Address::NULL);

    let header = header(&engine, atlas);
    assert_eq!(header.chart_count, 2);
    let mesh = Mesh::decode(engine.memory(), header.meshes).unwrap();
    let charts: Vec<Chart> = decode_array(engine.memory(), mesh.chart_array, mesh.chart_count).unwrap();

    let mut faces: Vec<u32> = charts
        .iter()
        .flat_map(|c| engine.memory().read_u32(c.face_array, c.face_count as usize).unwrap().to_vec())
        .collect();
    faces.sort_unstable();
    assert_eq!(faces, vec![0, 1]);
}
