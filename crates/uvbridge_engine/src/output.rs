//! # Output Meshes
//!
//! Writes the packed result into linear memory: one [`Mesh`] per source
//! mesh with its [`Chart`], [`Vertex`] and index arrays, the utilization
//! array, and optionally the atlas image.
//!
//! Every block is recorded in [`OutputBlocks`]; the atlas frees them on
//! repack and destroy. A failed build frees what it allocated; the engine
//! then drops the previous output as well, so the header never describes a
//! stale pack.

use crate::charts::ChartPlan;
use crate::error::{EngineError, EngineResult};
use crate::heap::EngineHeap;
use crate::packer::PackLayout;
use crate::source::SourceMesh;
use std::collections::HashMap;
use uvbridge_abi::{encode_array, Chart, Mesh, StructCodec, Vertex};
use uvbridge_memory::{Address, LinearBuffer, MemoryViews};

/// Engine blocks owned by one build of the output.
#[derive(Debug, Default)]
pub struct OutputBlocks {
    /// Every allocation made for the output.
    pub blocks: Vec<Address>,
    /// `Mesh` array.
    pub meshes: Address,
    /// Per sub-atlas utilization.
    pub utilization: Address,
    /// Atlas image, or null.
    pub image: Address,
}

impl OutputBlocks {
    /// Returns every block to the heap.
    pub fn release(self, heap: &mut EngineHeap) {
        for block in self.blocks {
            heap.free(block);
        }
    }
}

/// Allocation context for one build.
struct Builder<'a, B: LinearBuffer> {
    memory: &'a mut MemoryViews<B>,
    heap: &'a mut EngineHeap,
    out: OutputBlocks,
}

impl<B: LinearBuffer> Builder<'_, B> {
    /// Allocates a zeroed array of `count` elements of `size` bytes.
    /// Empty arrays are null.
    fn array(&mut self, count: usize, size: u32) -> EngineResult<Address> {
        if count == 0 {
            return Ok(Address::NULL);
        }
        let bytes = u32::try_from(count)
            .ok()
            .and_then(|n| n.checked_mul(size))
            .ok_or(EngineError::OutOfMemory { requested: u32::MAX })?;
        let address = self.heap.calloc(self.memory, bytes);
        if address.is_null() {
            return Err(EngineError::OutOfMemory { requested: bytes });
        }
        self.out.blocks.push(address);
        Ok(address)
    }

    fn u32_array(&mut self, values: &[u32]) -> EngineResult<Address> {
        let address = self.array(values.len(), 4)?;
        if !address.is_null() {
            self.memory.write_u32(address, values)?;
        }
        Ok(address)
    }

    fn records<T: StructCodec>(&mut self, records: &[T]) -> EngineResult<Address> {
        let address = self.array(records.len(), T::SIZE)?;
        encode_array(self.memory, address, records)?;
        Ok(address)
    }
}

/// Output of one mesh before it is written.
#[derive(Default)]
struct MeshOutput {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    charts: Vec<(Chart, Vec<u32>)>,
}

fn signed(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

/// Lays out the vertices, indices and charts of mesh `mesh_index`.
fn assemble(
    mesh_index: u32,
    source: &SourceMesh,
    charts: &[ChartPlan],
    layout: &PackLayout,
) -> MeshOutput {
    let mut out = MeshOutput::default();
    let mut face_chart: Vec<Option<usize>> = vec![None; source.faces.len()];
    let mut chart_vertex: HashMap<(usize, u32), u32> = HashMap::new();

    for (global, plan) in charts.iter().enumerate().filter(|(_, c)| c.mesh == mesh_index) {
        let local_chart = out.charts.len();
        let placement = layout.placements[global];
        let extent = plan.extent();

        for (&source_vertex, coord) in plan.vertices.iter().zip(&plan.coords) {
            let local = [coord[0] - plan.min[0], coord[1] - plan.min[1]];
            chart_vertex.insert(
                (local_chart, source_vertex),
                u32::try_from(out.vertices.len()).unwrap_or(u32::MAX),
            );
            out.vertices.push(Vertex {
                atlas_index: signed(placement.atlas),
                chart_index: signed(u32::try_from(local_chart).unwrap_or(u32::MAX)),
                uv: placement.to_texels(local, extent),
                xref: source_vertex,
            });
        }
        for &face in &plan.faces {
            face_chart[face as usize] = Some(local_chart);
        }
        out.charts.push((
            Chart {
                face_array: Address::NULL,
                atlas_index: placement.atlas,
                face_count: u32::try_from(plan.faces.len()).unwrap_or(u32::MAX),
                chart_type: plan.chart_type,
                material: plan.material,
            },
            plan.faces.clone(),
        ));
    }

    let mut unplaced: HashMap<u32, u32> = HashMap::new();
    for (face, chart) in face_chart.iter().enumerate() {
        let mut corner = |v: u32| -> u32 {
            match chart {
                Some(c) => chart_vertex[&(*c, v)],
                None => *unplaced.entry(v).or_insert_with(|| {
                    out.vertices.push(Vertex {
                        atlas_index: -1,
                        chart_index: -1,
                        uv: [0.0, 0.0],
                        xref: v,
                    });
                    u32::try_from(out.vertices.len() - 1).unwrap_or(u32::MAX)
                }),
            }
        };
        let corners: Vec<u32> = source.face_corners(face).iter().map(|&v| corner(v)).collect();
        for i in 1..corners.len() - 1 {
            out.indices.extend_from_slice(&[corners[0], corners[i], corners[i + 1]]);
        }
    }
    out
}

/// Allocates the atlas image in engine memory, then paints every chart
/// rectangle into it row by row with a per-chart colour.
fn paint_image<B: LinearBuffer>(
    builder: &mut Builder<'_, B>,
    layout: &PackLayout,
) -> EngineResult<Address> {
    let (width, height) = (layout.width, layout.height);
    let overflow = EngineError::OutOfMemory { requested: u32::MAX };
    let texels = u64::from(width) * u64::from(height) * u64::from(layout.layers());
    let image = builder.array(usize::try_from(texels).map_err(|_| overflow.clone())?, 4)?;

    let mut row = Vec::new();
    for (chart, placement) in layout.placements.iter().enumerate() {
        let chart = u32::try_from(chart).unwrap_or(u32::MAX);
        let colour = 0xFF00_0000 | (chart.wrapping_add(1).wrapping_mul(0x9E37_79B1) >> 8);
        let x_end = placement.x.saturating_add(placement.width).min(width);
        let y_end = placement.y.saturating_add(placement.height).min(height);
        if placement.x >= x_end {
            continue;
        }
        row.clear();
        row.resize((x_end - placement.x) as usize, colour);

        for y in placement.y..y_end {
            let texel = (u64::from(placement.atlas) * u64::from(height) + u64::from(y))
                * u64::from(width)
                + u64::from(placement.x);
            let at = u32::try_from(texel)
                .ok()
                .and_then(|texel| image.element(texel, 4))
                .ok_or_else(|| overflow.clone())?;
            builder.memory.write_u32(at, &row)?;
        }
    }
    Ok(image)
}

/// Writes the whole output for `sources` packed as `layout`.
///
/// # Errors
///
/// Returns [`EngineError::OutOfMemory`] if any block cannot be allocated;
/// everything allocated so far is freed first.
pub fn build<B: LinearBuffer>(
    memory: &mut MemoryViews<B>,
    heap: &mut EngineHeap,
    sources: &[SourceMesh],
    charts: &[ChartPlan],
    layout: &PackLayout,
    create_image: bool,
) -> EngineResult<OutputBlocks> {
    let mut builder = Builder { memory, heap, out: OutputBlocks::default() };
    match write_all(&mut builder, sources, charts, layout, create_image) {
        Ok(()) => Ok(builder.out),
        Err(err) => {
            let Builder { heap, out, .. } = builder;
            out.release(heap);
            Err(err)
        }
    }
}

fn write_all<B: LinearBuffer>(
    builder: &mut Builder<'_, B>,
    sources: &[SourceMesh],
    charts: &[ChartPlan],
    layout: &PackLayout,
    create_image: bool,
) -> EngineResult<()> {
    let mut meshes = Vec::with_capacity(sources.len());
    for (index, source) in sources.iter().enumerate() {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        let assembled = assemble(index, source, charts, layout);

        let mut chart_records = Vec::with_capacity(assembled.charts.len());
        for (mut chart, faces) in assembled.charts {
            chart.face_array = builder.u32_array(&faces)?;
            chart_records.push(chart);
        }

        meshes.push(Mesh {
            chart_array: builder.records(&chart_records)?,
            index_array: builder.u32_array(&assembled.indices)?,
            vertex_array: builder.records(&assembled.vertices)?,
            chart_count: u32::try_from(chart_records.len()).unwrap_or(u32::MAX),
            index_count: u32::try_from(assembled.indices.len()).unwrap_or(u32::MAX),
            vertex_count: u32::try_from(assembled.vertices.len()).unwrap_or(u32::MAX),
        });
    }
    builder.out.meshes = builder.records(&meshes)?;

    builder.out.utilization = builder.array(layout.utilization.len(), 4)?;
    if !builder.out.utilization.is_null() {
        builder.memory.write_f32(builder.out.utilization, &layout.utilization)?;
    }

    if create_image && layout.width > 0 && layout.height > 0 {
        builder.out.image = paint_image(builder, layout)?;
    }
    Ok(())
}
