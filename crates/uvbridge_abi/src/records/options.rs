//! Chart and pack option blocks.
//!
//! The `Default` impls mirror what the engine's `*Init` entry points write,
//! so a host can build option blocks without a round trip through the engine.

use crate::codec::{FieldReader, FieldWriter, StructCodec};
use crate::error::AbiResult;
use serde::{Deserialize, Serialize};
use uvbridge_memory::{Address, LinearBuffer};

/// Byte offsets of [`ChartOptions`].
mod chart_options {
    pub const PARAM_FUNC: u32 = 0;
    pub const MAX_CHART_AREA: u32 = 4;
    pub const MAX_BOUNDARY_LENGTH: u32 = 8;
    pub const NORMAL_DEVIATION_WEIGHT: u32 = 12;
    pub const ROUNDNESS_WEIGHT: u32 = 16;
    pub const STRAIGHTNESS_WEIGHT: u32 = 20;
    pub const NORMAL_SEAM_WEIGHT: u32 = 24;
    pub const TEXTURE_SEAM_WEIGHT: u32 = 28;
    pub const MAX_COST: u32 = 32;
    pub const MAX_ITERATIONS: u32 = 36;
    // Tail bytes.
    pub const USE_INPUT_MESH_UVS: u32 = 40;
    pub const FIX_WINDING: u32 = 41;
}

/// Byte offsets of [`PackOptions`].
mod pack_options {
    pub const MAX_CHART_SIZE: u32 = 0;
    pub const PADDING: u32 = 4;
    pub const TEXELS_PER_UNIT: u32 = 8;
    pub const RESOLUTION: u32 = 12;
    // Tail bytes.
    pub const BILINEAR: u32 = 16;
    pub const BLOCK_ALIGN: u32 = 17;
    pub const BRUTE_FORCE: u32 = 18;
    pub const CREATE_IMAGE: u32 = 19;
    pub const ROTATE_CHARTS_TO_AXIS: u32 = 20;
    pub const ROTATE_CHARTS: u32 = 21;
}

/// Weights controlling chart growth.
///
/// Size: 44 bytes (42 used, 2 padding)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartOptions {
    /// Custom parameterization callback (engine function index). Null uses the built-in.
    #[serde(skip)]
    pub param_func: Address,
    /// Don't grow charts larger than this. 0 means no limit.
    pub max_chart_area: f32,
    /// Don't grow charts with a longer boundary than this. 0 means no limit.
    pub max_boundary_length: f32,
    /// Angle between face and average chart normal.
    pub normal_deviation_weight: f32,
    /// Chart compactness.
    pub roundness_weight: f32,
    /// Boundary straightness.
    pub straightness_weight: f32,
    /// Cost of crossing a hard normal edge. Values above 1000 respect all hard edges.
    pub normal_seam_weight: f32,
    /// Cost of crossing an input UV seam.
    pub texture_seam_weight: f32,
    /// Charts stop growing above this cost.
    pub max_cost: f32,
    /// Number of chart growing iterations.
    pub max_iterations: u32,
    /// Use the input UVs instead of computing charts.
    pub use_input_mesh_uvs: bool,
    /// Enforce consistent texture coordinate winding.
    pub fix_winding: bool,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            param_func: Address::NULL,
            max_chart_area: 0.0,
            max_boundary_length: 0.0,
            normal_deviation_weight: 2.0,
            roundness_weight: 0.01,
            straightness_weight: 6.0,
            normal_seam_weight: 4.0,
            texture_seam_weight: 0.5,
            max_cost: 2.0,
            max_iterations: 1,
            use_input_mesh_uvs: false,
            fix_winding: false,
        }
    }
}

impl StructCodec for ChartOptions {
    const SIZE: u32 = 44;
    const NAME: &'static str = "ChartOptions";

    fn read_fields<B: LinearBuffer>(f: &FieldReader<'_, B>) -> AbiResult<Self> {
        use chart_options as at;
        Ok(Self {
            param_func: f.address(at::PARAM_FUNC)?,
            max_chart_area: f.f32(at::MAX_CHART_AREA)?,
            max_boundary_length: f.f32(at::MAX_BOUNDARY_LENGTH)?,
            normal_deviation_weight: f.f32(at::NORMAL_DEVIATION_WEIGHT)?,
            roundness_weight: f.f32(at::ROUNDNESS_WEIGHT)?,
            straightness_weight: f.f32(at::STRAIGHTNESS_WEIGHT)?,
            normal_seam_weight: f.f32(at::NORMAL_SEAM_WEIGHT)?,
            texture_seam_weight: f.f32(at::TEXTURE_SEAM_WEIGHT)?,
            max_cost: f.f32(at::MAX_COST)?,
            max_iterations: f.u32(at::MAX_ITERATIONS)?,
            use_input_mesh_uvs: f.flag(at::USE_INPUT_MESH_UVS)?,
            fix_winding: f.flag(at::FIX_WINDING)?,
        })
    }

    fn write_fields<B: LinearBuffer>(&self, f: &mut FieldWriter<'_, B>) -> AbiResult<()> {
        use chart_options as at;
        f.set_address(at::PARAM_FUNC, self.param_func)?;
        f.set_f32(at::MAX_CHART_AREA, self.max_chart_area)?;
        f.set_f32(at::MAX_BOUNDARY_LENGTH, self.max_boundary_length)?;
        f.set_f32(at::NORMAL_DEVIATION_WEIGHT, self.normal_deviation_weight)?;
        f.set_f32(at::ROUNDNESS_WEIGHT, self.roundness_weight)?;
        f.set_f32(at::STRAIGHTNESS_WEIGHT, self.straightness_weight)?;
        f.set_f32(at::NORMAL_SEAM_WEIGHT, self.normal_seam_weight)?;
        f.set_f32(at::TEXTURE_SEAM_WEIGHT, self.texture_seam_weight)?;
        f.set_f32(at::MAX_COST, self.max_cost)?;
        f.set_u32(at::MAX_ITERATIONS, self.max_iterations)?;
        f.set_flag(at::USE_INPUT_MESH_UVS, self.use_input_mesh_uvs)?;
        f.set_flag(at::FIX_WINDING, self.fix_winding)
    }
}

/// Parameters controlling rectangle packing.
///
/// Size: 24 bytes (22 used, 2 padding)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackOptions {
    /// Charts larger than this are scaled down. 0 means no limit.
    pub max_chart_size: u32,
    /// Pixels to pad charts with.
    pub padding: u32,
    /// Texels per world unit. 0 estimates a value from `resolution`.
    pub texels_per_unit: f32,
    /// Fixed atlas resolution. 0 lets the engine size the atlas; nonzero may split into sub-atlases.
    pub resolution: u32,
    /// Leave room for bilinear filtering.
    pub bilinear: bool,
    /// Align charts to 4x4 blocks.
    pub block_align: bool,
    /// Slower, tighter packing.
    pub brute_force: bool,
    /// Write the chart image into the atlas.
    pub create_image: bool,
    /// Rotate charts to their minimal-area bounding box axis.
    pub rotate_charts_to_axis: bool,
    /// Allow 90 degree rotations while packing.
    pub rotate_charts: bool,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            max_chart_size: 0,
            padding: 0,
            texels_per_unit: 0.0,
            resolution: 0,
            bilinear: true,
            block_align: false,
            brute_force: false,
            create_image: false,
            rotate_charts_to_axis: true,
            rotate_charts: true,
        }
    }
}

impl StructCodec for PackOptions {
    const SIZE: u32 = 24;
    const NAME: &'static str = "PackOptions";

    fn read_fields<B: LinearBuffer>(f: &FieldReader<'_, B>) -> AbiResult<Self> {
        use pack_options as at;
        Ok(Self {
            max_chart_size: f.u32(at::MAX_CHART_SIZE)?,
            padding: f.u32(at::PADDING)?,
            texels_per_unit: f.f32(at::TEXELS_PER_UNIT)?,
            resolution: f.u32(at::RESOLUTION)?,
            bilinear: f.flag(at::BILINEAR)?,
            block_align: f.flag(at::BLOCK_ALIGN)?,
            brute_force: f.flag(at::BRUTE_FORCE)?,
            create_image: f.flag(at::CREATE_IMAGE)?,
            rotate_charts_to_axis: f.flag(at::ROTATE_CHARTS_TO_AXIS)?,
            rotate_charts: f.flag(at::ROTATE_CHARTS)?,
        })
    }

    fn write_fields<B: LinearBuffer>(&self, f: &mut FieldWriter<'_, B>) -> AbiResult<()> {
        use pack_options as at;
        f.set_u32(at::MAX_CHART_SIZE, self.max_chart_size)?;
        f.set_u32(at::PADDING, self.padding)?;
        f.set_f32(at::TEXELS_PER_UNIT, self.texels_per_unit)?;
        f.set_u32(at::RESOLUTION, self.resolution)?;
        f.set_flag(at::BILINEAR, self.bilinear)?;
        f.set_flag(at::BLOCK_ALIGN, self.block_align)?;
        f.set_flag(at::BRUTE_FORCE, self.brute_force)?;
        f.set_flag(at::CREATE_IMAGE, self.create_image)?;
        f.set_flag(at::ROTATE_CHARTS_TO_AXIS, self.rotate_charts_to_axis)?;
        f.set_flag(at::ROTATE_CHARTS, self.rotate_charts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uvbridge_memory::{HeapBuffer, MemoryViews};

    #[test]
    fn test_flags_are_single_tail_bytes() {
        let mut memory = MemoryViews::new(HeapBuffer::new(1, 1).unwrap());
        let options = PackOptions {
            bilinear: false,
            create_image: true,
            rotate_charts: true,
            rotate_charts_to_axis: false,
            ..PackOptions::default()
        };
        options.encode(&mut memory, Address::new(128)).unwrap();

        assert_eq!(memory.read_u8(Address::new(128 + 16), 8).unwrap(), &[0, 0, 0, 1, 0, 1, 0, 0]);
    }

    #[test]
    fn test_nonzero_flag_bytes_read_as_true() {
        let mut memory = MemoryViews::new(HeapBuffer::new(1, 1).unwrap());
        ChartOptions::default().encode(&mut memory, Address::new(64)).unwrap();
        memory.store_u8(Address::new(64 + 41), 0x80).unwrap();

        let options = ChartOptions::decode(&memory, Address::new(64)).unwrap();
        assert!(options.fix_winding);
        assert!(!options.use_input_mesh_uvs);
    }

    #[test]
    fn test_chart_option_weights_land_on_fixed_offsets() {
        let mut memory = MemoryViews::new(HeapBuffer::new(1, 1).unwrap());
        ChartOptions::default().encode(&mut memory, Address::new(64)).unwrap();

        let floats = memory.read_f32(Address::new(64 + 4), 8).unwrap();
        assert_eq!(floats, &[0.0, 0.0, 2.0, 0.01, 6.0, 4.0, 0.5, 2.0]);
        assert_eq!(memory.load_u32(Address::new(64 + 36)).unwrap(), 1);
    }
}
