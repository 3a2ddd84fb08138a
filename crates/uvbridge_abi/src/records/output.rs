//! Engine-owned output structs.
//!
//! These are only ever decoded by the host. Encoding exists for engines
//! implemented on the host side and for tests; a host must never free or
//! reallocate the memory behind them, only call the engine's destroy.

use crate::codec::{FieldReader, FieldWriter, StructCodec};
use crate::enums::ChartType;
use crate::error::AbiResult;
use uvbridge_memory::{Address, LinearBuffer};

/// One output chart.
///
/// Size: 20 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Chart {
    /// `face_count` face indices (`u32`) into the source mesh.
    pub face_array: Address,
    /// Sub-atlas the chart was packed into.
    pub atlas_index: u32,
    /// Number of faces in the chart.
    pub face_count: u32,
    /// Parameterization used.
    pub chart_type: ChartType,
    /// Material shared by every face of the chart.
    pub material: u32,
}

impl StructCodec for Chart {
    const SIZE: u32 = 20;
    const NAME: &'static str = "Chart";

    fn read_fields<B: LinearBuffer>(f: &FieldReader<'_, B>) -> AbiResult<Self> {
        Ok(Self {
            face_array: f.address(0)?,
            atlas_index: f.u32(4)?,
            face_count: f.u32(8)?,
            chart_type: f.enumeration(12, "ChartType", ChartType::from_raw)?,
            material: f.u32(16)?,
        })
    }

    fn write_fields<B: LinearBuffer>(&self, f: &mut FieldWriter<'_, B>) -> AbiResult<()> {
        f.set_address(0, self.face_array)?;
        f.set_u32(4, self.atlas_index)?;
        f.set_u32(8, self.face_count)?;
        f.set_u32(12, self.chart_type.as_raw())?;
        f.set_u32(16, self.material)
    }
}

/// One output vertex.
///
/// Size: 20 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vertex {
    /// Sub-atlas index, -1 if the vertex is in no atlas.
    pub atlas_index: i32,
    /// Chart index, -1 if the vertex is in no chart.
    pub chart_index: i32,
    /// Texel coordinates, not normalized.
    pub uv: [f32; 2],
    /// Index of the source vertex this one was derived from.
    pub xref: u32,
}

impl StructCodec for Vertex {
    const SIZE: u32 = 20;
    const NAME: &'static str = "Vertex";

    fn read_fields<B: LinearBuffer>(f: &FieldReader<'_, B>) -> AbiResult<Self> {
        Ok(Self {
            atlas_index: f.i32(0)?,
            chart_index: f.i32(4)?,
            uv: [f.f32(8)?, f.f32(12)?],
            xref: f.u32(16)?,
        })
    }

    fn write_fields<B: LinearBuffer>(&self, f: &mut FieldWriter<'_, B>) -> AbiResult<()> {
        f.set_i32(0, self.atlas_index)?;
        f.set_i32(4, self.chart_index)?;
        f.set_f32(8, self.uv[0])?;
        f.set_f32(12, self.uv[1])?;
        f.set_u32(16, self.xref)
    }
}

/// One output mesh, produced per add-mesh call.
///
/// Size: 24 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Mesh {
    /// `chart_count` [`Chart`] structs.
    pub chart_array: Address,
    /// `index_count` `u32` indices into the vertex array.
    pub index_array: Address,
    /// `vertex_count` [`Vertex`] structs.
    pub vertex_array: Address,
    /// Number of charts.
    pub chart_count: u32,
    /// Number of indices.
    pub index_count: u32,
    /// Number of output vertices.
    pub vertex_count: u32,
}

impl StructCodec for Mesh {
    const SIZE: u32 = 24;
    const NAME: &'static str = "Mesh";

    fn read_fields<B: LinearBuffer>(f: &FieldReader<'_, B>) -> AbiResult<Self> {
        Ok(Self {
            chart_array: f.address(0)?,
            index_array: f.address(4)?,
            vertex_array: f.address(8)?,
            chart_count: f.u32(12)?,
            index_count: f.u32(16)?,
            vertex_count: f.u32(20)?,
        })
    }

    fn write_fields<B: LinearBuffer>(&self, f: &mut FieldWriter<'_, B>) -> AbiResult<()> {
        f.set_address(0, self.chart_array)?;
        f.set_address(4, self.index_array)?;
        f.set_address(8, self.vertex_array)?;
        f.set_u32(12, self.chart_count)?;
        f.set_u32(16, self.index_count)?;
        f.set_u32(20, self.vertex_count)
    }
}

/// The public prefix of the engine's atlas struct.
///
/// Size: 36 bytes. The engine-side struct is larger; never allocate this
/// struct directly, only decode it at a handle returned by create.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AtlasHeader {
    /// `width * height * max(atlas_count, 1)` `u32` texels, or null.
    pub image: Address,
    /// `mesh_count` [`Mesh`] structs.
    pub meshes: Address,
    /// One `f32` per sub-atlas: normalized used area.
    pub utilization: Address,
    /// Atlas width in texels.
    pub width: u32,
    /// Atlas height in texels.
    pub height: u32,
    /// Number of sub-atlases. 0 unless the pack resolution was fixed.
    pub atlas_count: u32,
    /// Total number of charts across all meshes.
    pub chart_count: u32,
    /// Number of meshes added.
    pub mesh_count: u32,
    /// Texel density the atlas was packed with.
    pub texels_per_unit: f32,
}

impl StructCodec for AtlasHeader {
    const SIZE: u32 = 36;
    const NAME: &'static str = "Atlas";

    fn read_fields<B: LinearBuffer>(f: &FieldReader<'_, B>) -> AbiResult<Self> {
        Ok(Self {
            image: f.address(0)?,
            meshes: f.address(4)?,
            utilization: f.address(8)?,
            width: f.u32(12)?,
            height: f.u32(16)?,
            atlas_count: f.u32(20)?,
            chart_count: f.u32(24)?,
            mesh_count: f.u32(28)?,
            texels_per_unit: f.f32(32)?,
        })
    }

    fn write_fields<B: LinearBuffer>(&self, f: &mut FieldWriter<'_, B>) -> AbiResult<()> {
        f.set_address(0, self.image)?;
        f.set_address(4, self.meshes)?;
        f.set_address(8, self.utilization)?;
        f.set_u32(12, self.width)?;
        f.set_u32(16, self.height)?;
        f.set_u32(20, self.atlas_count)?;
        f.set_u32(24, self.chart_count)?;
        f.set_u32(28, self.mesh_count)?;
        f.set_f32(32, self.texels_per_unit)
    }
}

impl AtlasHeader {
    /// Number of images in the image buffer.
    #[inline]
    #[must_use]
    pub const fn image_layers(&self) -> u32 {
        if self.atlas_count == 0 {
            1
        } else {
            self.atlas_count
        }
    }

    /// Number of entries in the utilization array.
    #[inline]
    #[must_use]
    pub const fn utilization_len(&self) -> u32 {
        self.image_layers()
    }
}
