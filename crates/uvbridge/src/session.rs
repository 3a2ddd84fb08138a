//! # Atlas Session
//!
//! [`Atlas`] owns one engine handle over a borrowed [`AtlasExports`] and
//! turns host slices into engine memory and engine records back into host
//! values.
//!
//! ## Scratch memory
//!
//! Every call that needs engine memory allocates a single block, lays the
//! struct and its arrays out inside it on 4-byte boundaries, makes the call
//! and frees the block again, whatever the outcome. The engine copies what
//! it keeps, so nothing the session writes outlives the call.

use crate::config::{BindingConfig, ChartOverrides, PackOverrides};
use crate::error::{BindingError, BindingResult};
use crate::exports::{add_mesh_error_name, AtlasExports};
use uvbridge_abi::{
    decode_array, read_f32_array, read_index_array, read_u32_array, AddMeshError, AtlasHeader,
    Chart, ChartOptions, IndexFormat, Mesh, MeshDecl, PackOptions, StructCodec, UvMeshDecl,
    Vertex,
};
use std::mem::size_of_val;
use uvbridge_memory::{Address, MemoryViews};

/// Where a handle is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AtlasStage {
    /// Freshly created, no mesh accepted yet.
    Created,
    /// At least one mesh accepted.
    MeshesAdded,
    /// Charts computed, not packed.
    ChartsComputed,
    /// Packed at least once; output is readable.
    Packed,
}

/// Index buffer in either engine format.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum IndexData<'a> {
    /// 16-bit indices.
    U16(&'a [u16]),
    /// 32-bit indices.
    U32(&'a [u32]),
}

impl IndexData<'_> {
    /// Number of indices.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        match self {
            Self::U16(indices) => indices.len(),
            Self::U32(indices) => indices.len(),
        }
    }

    /// Whether there are no indices.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Engine format tag.
    #[inline]
    #[must_use]
    pub const fn format(&self) -> IndexFormat {
        match self {
            Self::U16(_) => IndexFormat::UInt16,
            Self::U32(_) => IndexFormat::UInt32,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        match self {
            Self::U16(indices) => bytemuck::cast_slice(indices),
            Self::U32(indices) => bytemuck::cast_slice(indices),
        }
    }
}

/// A geometry mesh held in host memory.
///
/// Only `positions` is required. Without `indices` every three consecutive
/// vertices form a triangle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeshInput<'a> {
    /// Vertex positions.
    pub positions: &'a [[f32; 3]],
    /// Vertex normals, one per position.
    pub normals: Option<&'a [[f32; 3]]>,
    /// Input UVs, one per position.
    pub uvs: Option<&'a [[f32; 2]]>,
    /// Corner indices.
    pub indices: Option<IndexData<'a>>,
    /// Polygon sizes. Triangles when absent.
    pub face_vertex_counts: Option<&'a [u8]>,
    /// Faces to leave out of the atlas.
    pub face_ignore: Option<&'a [bool]>,
    /// Material id per face.
    pub face_materials: Option<&'a [u32]>,
    /// Added to every index.
    pub index_offset: i32,
    /// Colocation epsilon. The engine default when absent.
    pub epsilon: Option<f32>,
}

/// A mesh that already carries UVs.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UvMeshInput<'a> {
    /// Vertex UVs.
    pub uvs: &'a [[f32; 2]],
    /// Corner indices.
    pub indices: Option<IndexData<'a>>,
    /// Material id per triangle.
    pub face_materials: Option<&'a [u32]>,
    /// Added to every index.
    pub index_offset: i32,
}

/// Output of [`Atlas::copy_uv`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct UvCopy {
    /// Source vertex of each output vertex.
    pub xrefs: Vec<u32>,
    /// UVs normalized to `0..=1` by the atlas size.
    pub uvs: Vec<[f32; 2]>,
}

fn check_len(what: &'static str, expected: usize, actual: usize) -> BindingResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(BindingError::LengthMismatch { what, expected, actual })
    }
}

fn to_u32(len: usize) -> BindingResult<u32> {
    u32::try_from(len).map_err(|_| BindingError::OutOfMemory { requested: u32::MAX })
}

/// Face count implied by the corner count and polygon sizes, if known.
///
/// An indivisible triangle corner count is left for the engine to reject.
fn implied_faces(corners: usize, face_vertex_counts: Option<&[u8]>) -> Option<usize> {
    match face_vertex_counts {
        Some(counts) => Some(counts.len()),
        None if corners % 3 == 0 => Some(corners / 3),
        None => None,
    }
}

impl MeshInput<'_> {
    fn corner_count(&self) -> usize {
        self.indices.map_or(self.positions.len(), |indices| indices.len())
    }

    /// Checks every per-vertex and per-face array against its owner.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::LengthMismatch`] for the first mismatch.
    pub fn validate(&self) -> BindingResult<()> {
        let vertices = self.positions.len();
        if let Some(normals) = self.normals {
            check_len("normals", vertices, normals.len())?;
        }
        if let Some(uvs) = self.uvs {
            check_len("uvs", vertices, uvs.len())?;
        }
        if let Some(faces) = implied_faces(self.corner_count(), self.face_vertex_counts) {
            if let Some(ignore) = self.face_ignore {
                check_len("face_ignore", faces, ignore.len())?;
            }
            if let Some(materials) = self.face_materials {
                check_len("face_materials", faces, materials.len())?;
            }
        }
        Ok(())
    }
}

impl UvMeshInput<'_> {
    fn corner_count(&self) -> usize {
        self.indices.map_or(self.uvs.len(), |indices| indices.len())
    }

    /// Checks the material array against the triangle count.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::LengthMismatch`] on a mismatch.
    pub fn validate(&self) -> BindingResult<()> {
        if let (Some(faces), Some(materials)) =
            (implied_faces(self.corner_count(), None), self.face_materials)
        {
            check_len("face_materials", faces, materials.len())?;
        }
        Ok(())
    }
}

/// Byte offsets of a struct and its arrays inside one scratch block.
struct ScratchLayout {
    size: u32,
}

impl ScratchLayout {
    const ALIGN: u32 = 4;

    const fn new(header: u32) -> Self {
        Self { size: header }
    }

    /// Reserves `bytes`, returning the offset, or `None` for an empty array.
    fn reserve(&mut self, bytes: usize) -> BindingResult<Option<u32>> {
        if bytes == 0 {
            return Ok(None);
        }
        let overflow = BindingError::OutOfMemory { requested: u32::MAX };
        let offset = self.size.next_multiple_of(Self::ALIGN);
        self.size = offset.checked_add(to_u32(bytes)?).ok_or(overflow)?;
        Ok(Some(offset))
    }
}

/// Places `bytes` at `offset` inside the block at `base`.
fn place<E: AtlasExports>(
    exports: &mut E,
    base: Address,
    offset: Option<u32>,
    bytes: &[u8],
) -> BindingResult<Address> {
    let Some(offset) = offset else {
        return Ok(Address::NULL);
    };
    // `offset` lies inside an allocated block, so this cannot wrap.
    let address = Address::new(base.get() + offset);
    exports.memory_mut().write_u8(address, bytes)?;
    Ok(address)
}

/// A typed session over one atlas handle.
///
/// Dropping the session destroys the handle.
pub struct Atlas<'e, E: AtlasExports> {
    exports: &'e mut E,
    handle: Address,
    stage: AtlasStage,
    chart_overrides: ChartOverrides,
    pack_overrides: PackOverrides,
}

impl<'e, E: AtlasExports> Atlas<'e, E> {
    /// Creates a new atlas handle.
    ///
    /// # Errors
    ///
    /// Returns [`BindingError::OutOfMemory`] if the engine returns null.
    pub fn new(exports: &'e mut E) -> BindingResult<Self> {
        let handle = exports.create();
        if handle.is_null() {
            return Err(BindingError::OutOfMemory { requested: AtlasHeader::SIZE });
        }
        tracing::debug!("atlas session opened on {}", handle);
        Ok(Self {
            exports,
            handle,
            stage: AtlasStage::Created,
            chart_overrides: ChartOverrides::default(),
            pack_overrides: PackOverrides::default(),
        })
    }

    /// Creates a handle whose default options carry `config`'s overrides.
    ///
    /// # Errors
    ///
    /// Same as [`Atlas::new`].
    pub fn with_config(exports: &'e mut E, config: &BindingConfig) -> BindingResult<Self> {
        let mut atlas = Self::new(exports)?;
        atlas.chart_overrides = config.chart;
        atlas.pack_overrides = config.pack;
        Ok(atlas)
    }

    /// The raw handle.
    #[inline]
    #[must_use]
    pub fn handle(&self) -> Address {
        self.handle
    }

    /// Current lifecycle stage.
    #[inline]
    #[must_use]
    pub fn stage(&self) -> AtlasStage {
        self.stage
    }

    /// The engine's memory views.
    #[inline]
    #[must_use]
    pub fn memory(&self) -> &MemoryViews<E::Buffer> {
        self.exports.memory()
    }

    /// Runs `f` on a fresh engine block of `size` bytes, freeing it afterwards.
    fn with_scratch<T>(
        &mut self,
        size: u32,
        f: impl FnOnce(&mut E, Address) -> BindingResult<T>,
    ) -> BindingResult<T> {
        let base = self.exports.malloc(size);
        if base.is_null() {
            tracing::warn!("scratch allocation of {} bytes failed", size);
            return Err(BindingError::OutOfMemory { requested: size });
        }
        let result = f(self.exports, base);
        self.exports.free(base);
        result
    }

    fn record_add(&mut self, code: AddMeshError, what: &str) -> AddMeshError {
        if code.is_success() {
            if self.stage == AtlasStage::Created {
                self.stage = AtlasStage::MeshesAdded;
            }
        } else {
            tracing::warn!("{} rejected by atlas {}: {}", what, self.handle, code);
        }
        code
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    /// Adds a geometry mesh.
    ///
    /// Declared input problems come back as `Ok` with the engine's code; the
    /// atlas stays usable.
    ///
    /// # Errors
    ///
    /// [`BindingError::LengthMismatch`] for inconsistent host arrays,
    /// [`BindingError::OutOfMemory`] if scratch memory is unavailable, or a
    /// memory fault.
    pub fn add_mesh(
        &mut self,
        mesh: &MeshInput<'_>,
        mesh_count_hint: u32,
    ) -> BindingResult<AddMeshError> {
        mesh.validate()?;

        let face_ignore: Option<Vec<u8>> =
            mesh.face_ignore.map(|flags| flags.iter().map(|&f| u8::from(f)).collect());

        let mut layout = ScratchLayout::new(MeshDecl::SIZE);
        let positions_at = layout.reserve(size_of_val(mesh.positions))?;
        let normals_at = layout.reserve(mesh.normals.map_or(0, size_of_val))?;
        let uvs_at = layout.reserve(mesh.uvs.map_or(0, size_of_val))?;
        let indices_at = layout.reserve(mesh.indices.map_or(0, |i| i.as_bytes().len()))?;
        let counts_at = layout.reserve(mesh.face_vertex_counts.map_or(0, <[u8]>::len))?;
        let ignore_at = layout.reserve(face_ignore.as_ref().map_or(0, Vec::len))?;
        let materials_at = layout.reserve(mesh.face_materials.map_or(0, size_of_val))?;

        let vertex_count = to_u32(mesh.positions.len())?;
        let corner_count = to_u32(mesh.corner_count())?;
        let face_count = match mesh.face_vertex_counts {
            Some(counts) => to_u32(counts.len())?,
            None => corner_count / 3,
        };

        let handle = self.handle;
        let code = self.with_scratch(layout.size, |exports, decl_at| {
            exports.mesh_decl_init(decl_at);
            let mut decl = MeshDecl::decode(exports.memory(), decl_at)?;

            decl.vertex_position_data =
                place(exports, decl_at, positions_at, bytemuck::cast_slice(mesh.positions))?;
            decl.vertex_position_stride = 12;
            decl.vertex_count = vertex_count;
            if let Some(normals) = mesh.normals {
                decl.vertex_normal_data =
                    place(exports, decl_at, normals_at, bytemuck::cast_slice(normals))?;
                decl.vertex_normal_stride = 12;
            }
            if let Some(uvs) = mesh.uvs {
                decl.vertex_uv_data = place(exports, decl_at, uvs_at, bytemuck::cast_slice(uvs))?;
                decl.vertex_uv_stride = 8;
            }
            if let Some(indices) = mesh.indices {
                decl.index_data = place(exports, decl_at, indices_at, indices.as_bytes())?;
                decl.index_count = corner_count;
                decl.index_format = indices.format();
            }
            if let Some(counts) = mesh.face_vertex_counts {
                decl.face_vertex_count = place(exports, decl_at, counts_at, counts)?;
            }
            if let Some(flags) = &face_ignore {
                decl.face_ignore_data = place(exports, decl_at, ignore_at, flags)?;
            }
            if let Some(materials) = mesh.face_materials {
                decl.face_material_data =
                    place(exports, decl_at, materials_at, bytemuck::cast_slice(materials))?;
            }
            decl.face_count = face_count;
            decl.index_offset = mesh.index_offset;
            if let Some(epsilon) = mesh.epsilon {
                decl.epsilon = epsilon;
            }
            decl.encode(exports.memory_mut(), decl_at)?;

            tracing::trace!("add_mesh {} vertices {} corners", vertex_count, corner_count);
            Ok(AddMeshError::from_raw(exports.add_mesh(handle, decl_at, mesh_count_hint)))
        })?;
        Ok(self.record_add(code, "mesh"))
    }

    /// Adds a UV mesh.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Atlas::add_mesh`].
    pub fn add_uv_mesh(&mut self, mesh: &UvMeshInput<'_>) -> BindingResult<AddMeshError> {
        mesh.validate()?;

        let mut layout = ScratchLayout::new(UvMeshDecl::SIZE);
        let uvs_at = layout.reserve(size_of_val(mesh.uvs))?;
        let indices_at = layout.reserve(mesh.indices.map_or(0, |i| i.as_bytes().len()))?;
        let materials_at = layout.reserve(mesh.face_materials.map_or(0, size_of_val))?;

        let vertex_count = to_u32(mesh.uvs.len())?;
        let corner_count = to_u32(mesh.corner_count())?;

        let handle = self.handle;
        let code = self.with_scratch(layout.size, |exports, decl_at| {
            exports.uv_mesh_decl_init(decl_at);
            let mut decl = UvMeshDecl::decode(exports.memory(), decl_at)?;

            decl.vertex_uv_data = place(exports, decl_at, uvs_at, bytemuck::cast_slice(mesh.uvs))?;
            decl.vertex_stride = 8;
            decl.vertex_count = vertex_count;
            if let Some(indices) = mesh.indices {
                decl.index_data = place(exports, decl_at, indices_at, indices.as_bytes())?;
                decl.index_count = corner_count;
                decl.index_format = indices.format();
            }
            if let Some(materials) = mesh.face_materials {
                decl.face_material_data =
                    place(exports, decl_at, materials_at, bytemuck::cast_slice(materials))?;
            }
            decl.index_offset = mesh.index_offset;
            decl.encode(exports.memory_mut(), decl_at)?;

            Ok(AddMeshError::from_raw(exports.add_uv_mesh(handle, decl_at)))
        })?;
        Ok(self.record_add(code, "uv mesh"))
    }

    /// Waits for pending mesh ingestion.
    pub fn join(&mut self) {
        self.exports.add_mesh_join(self.handle);
    }

    // ------------------------------------------------------------------
    // Options
    // ------------------------------------------------------------------

    /// Engine default chart options with this session's overrides applied.
    ///
    /// # Errors
    ///
    /// [`BindingError::OutOfMemory`] or a decode fault.
    pub fn chart_options(&mut self) -> BindingResult<ChartOptions> {
        let mut options = self.with_scratch(ChartOptions::SIZE, |exports, at| {
            exports.chart_options_init(at);
            Ok(ChartOptions::decode(exports.memory(), at)?)
        })?;
        self.chart_overrides.apply(&mut options);
        Ok(options)
    }

    /// Engine default pack options with this session's overrides applied.
    ///
    /// # Errors
    ///
    /// [`BindingError::OutOfMemory`] or a decode fault.
    pub fn pack_options(&mut self) -> BindingResult<PackOptions> {
        let mut options = self.with_scratch(PackOptions::SIZE, |exports, at| {
            exports.pack_options_init(at);
            Ok(PackOptions::decode(exports.memory(), at)?)
        })?;
        self.pack_overrides.apply(&mut options);
        Ok(options)
    }

    // ------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------

    /// Computes charts. `None` uses [`Atlas::chart_options`].
    ///
    /// # Errors
    ///
    /// [`BindingError::OutOfMemory`] or an encode fault.
    pub fn compute_charts(&mut self, options: Option<&ChartOptions>) -> BindingResult<()> {
        let options = match options {
            Some(options) => *options,
            None => self.chart_options()?,
        };
        self.join();
        let handle = self.handle;
        self.with_scratch(ChartOptions::SIZE, |exports, at| {
            options.encode(exports.memory_mut(), at)?;
            exports.compute_charts(handle, at);
            Ok(())
        })?;
        self.stage = AtlasStage::ChartsComputed;
        Ok(())
    }

    /// Packs the computed charts. Repeatable with different options.
    ///
    /// # Errors
    ///
    /// [`BindingError::ChartsNotComputed`] before any chart computation,
    /// [`BindingError::OutputMissing`] if the engine could not build the
    /// output meshes, otherwise as [`Atlas::compute_charts`].
    pub fn pack_charts(&mut self, options: Option<&PackOptions>) -> BindingResult<()> {
        if !matches!(self.stage, AtlasStage::ChartsComputed | AtlasStage::Packed) {
            return Err(BindingError::ChartsNotComputed);
        }
        let options = match options {
            Some(options) => *options,
            None => self.pack_options()?,
        };
        self.join();
        let handle = self.handle;
        self.with_scratch(PackOptions::SIZE, |exports, at| {
            options.encode(exports.memory_mut(), at)?;
            exports.pack_charts(handle, at);
            Ok(())
        })?;
        self.finish_pack()
    }

    /// Computes and packs in one engine call.
    ///
    /// # Errors
    ///
    /// As [`Atlas::pack_charts`].
    pub fn generate(
        &mut self,
        chart_options: Option<&ChartOptions>,
        pack_options: Option<&PackOptions>,
    ) -> BindingResult<()> {
        let chart_options = match chart_options {
            Some(options) => *options,
            None => self.chart_options()?,
        };
        let pack_options = match pack_options {
            Some(options) => *options,
            None => self.pack_options()?,
        };
        self.join();
        let handle = self.handle;
        self.with_scratch(ChartOptions::SIZE + PackOptions::SIZE, |exports, chart_at| {
            let pack_at = Address::new(chart_at.get() + ChartOptions::SIZE);
            chart_options.encode(exports.memory_mut(), chart_at)?;
            pack_options.encode(exports.memory_mut(), pack_at)?;
            exports.generate(handle, chart_at, pack_at);
            Ok(())
        })?;
        self.finish_pack()
    }

    /// The pack calls return nothing; an engine that ran out of memory while
    /// building output leaves the meshes pointer null.
    fn finish_pack(&mut self) -> BindingResult<()> {
        let header = self.header()?;
        if header.mesh_count > 0 && header.meshes.is_null() {
            self.stage = AtlasStage::ChartsComputed;
            tracing::warn!("atlas {} pack produced no output meshes", self.handle);
            return Err(BindingError::OutputMissing { meshes: header.mesh_count });
        }
        self.stage = AtlasStage::Packed;
        tracing::info!(
            "atlas {} packed: {}x{} texels, {} sub-atlases, {} charts",
            self.handle,
            header.width,
            header.height,
            header.atlas_count,
            header.chart_count
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// Decodes the public atlas header.
    ///
    /// # Errors
    ///
    /// Propagates decode faults.
    pub fn header(&self) -> BindingResult<AtlasHeader> {
        Ok(AtlasHeader::decode(self.exports.memory(), self.handle)?)
    }

    /// Address of output mesh `index`, checked against the mesh count.
    fn mesh_address(&self, index: u32) -> BindingResult<Address> {
        let header = self.header()?;
        if index >= header.mesh_count || header.meshes.is_null() {
            return Err(BindingError::MeshOutOfRange { index, count: header.mesh_count });
        }
        header
            .meshes
            .element(index, Mesh::SIZE)
            .ok_or(BindingError::MeshOutOfRange { index, count: header.mesh_count })
    }

    /// Decodes every output mesh. Empty before the first pack.
    ///
    /// # Errors
    ///
    /// Propagates decode faults.
    pub fn meshes(&self) -> BindingResult<Vec<Mesh>> {
        let header = self.header()?;
        if header.meshes.is_null() {
            return Ok(Vec::new());
        }
        Ok(decode_array(self.exports.memory(), header.meshes, header.mesh_count)?)
    }

    /// Decodes output mesh `index`.
    ///
    /// # Errors
    ///
    /// [`BindingError::MeshOutOfRange`] or a decode fault.
    pub fn mesh(&self, index: u32) -> BindingResult<Mesh> {
        Ok(Mesh::decode(self.exports.memory(), self.mesh_address(index)?)?)
    }

    /// Decodes the charts of output mesh `index`.
    ///
    /// # Errors
    ///
    /// As [`Atlas::mesh`].
    pub fn charts(&self, index: u32) -> BindingResult<Vec<Chart>> {
        let mesh = self.mesh(index)?;
        Ok(decode_array(self.exports.memory(), mesh.chart_array, mesh.chart_count)?)
    }

    /// Decodes the vertices of output mesh `index`.
    ///
    /// # Errors
    ///
    /// As [`Atlas::mesh`].
    pub fn vertices(&self, index: u32) -> BindingResult<Vec<Vertex>> {
        let mesh = self.mesh(index)?;
        Ok(decode_array(self.exports.memory(), mesh.vertex_array, mesh.vertex_count)?)
    }

    /// Reads the triangle indices of output mesh `index`.
    ///
    /// # Errors
    ///
    /// As [`Atlas::mesh`].
    pub fn indices(&self, index: u32) -> BindingResult<Vec<u32>> {
        let mesh = self.mesh(index)?;
        Ok(read_index_array(
            self.exports.memory(),
            mesh.index_array,
            mesh.index_count,
            IndexFormat::UInt32,
        )?)
    }

    /// Reads the source face indices of one chart.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    pub fn chart_faces(&self, chart: &Chart) -> BindingResult<Vec<u32>> {
        Ok(read_u32_array(self.exports.memory(), chart.face_array, chart.face_count)?)
    }

    /// Normalized used area per sub-atlas.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    pub fn utilization(&self) -> BindingResult<Vec<f32>> {
        let header = self.header()?;
        if header.utilization.is_null() {
            return Ok(Vec::new());
        }
        Ok(read_f32_array(self.exports.memory(), header.utilization, header.utilization_len())?)
    }

    /// The debug image, one `u32` per texel for every sub-atlas in turn.
    /// `None` unless packed with `create_image`.
    ///
    /// # Errors
    ///
    /// Propagates memory faults.
    pub fn image(&self) -> BindingResult<Option<Vec<u32>>> {
        let header = self.header()?;
        if header.image.is_null() {
            return Ok(None);
        }
        let texels =
            u64::from(header.width) * u64::from(header.height) * u64::from(header.image_layers());
        let texels =
            u32::try_from(texels).map_err(|_| BindingError::OutOfMemory { requested: u32::MAX })?;
        Ok(Some(read_u32_array(self.exports.memory(), header.image, texels)?))
    }

    /// Copies the xrefs and normalized UVs of output mesh `index` out of the
    /// engine.
    ///
    /// # Errors
    ///
    /// [`BindingError::MeshOutOfRange`], [`BindingError::OutOfMemory`], or
    /// [`BindingError::LengthMismatch`] if the engine copied a different
    /// vertex count than the mesh declares.
    pub fn copy_uv(&mut self, index: u32) -> BindingResult<UvCopy> {
        let mesh_at = self.mesh_address(index)?;
        let vertex_count = Mesh::decode(self.exports.memory(), mesh_at)?.vertex_count;
        if vertex_count == 0 {
            return Ok(UvCopy::default());
        }
        let size = vertex_count
            .checked_mul(12)
            .ok_or(BindingError::OutOfMemory { requested: u32::MAX })?;

        let handle = self.handle;
        self.with_scratch(size, |exports, output| {
            let copied = exports.copy_uv(handle, mesh_at, output);
            check_len("copy_uv output", vertex_count as usize, copied as usize)?;

            let memory = exports.memory();
            let xrefs = memory.read_u32(output, vertex_count as usize)?.to_vec();
            let uv_at = Address::new(output.get() + vertex_count * 4);
            let uvs: Vec<[f32; 2]> =
                bytemuck::cast_slice(memory.read_f32(uv_at, 2 * vertex_count as usize)?).to_vec();
            Ok(UvCopy { xrefs, uvs })
        })
    }

    /// The engine's name for an add-mesh code, or the host name when the
    /// engine does not export the lookup.
    ///
    /// # Errors
    ///
    /// Propagates memory faults reading the string.
    pub fn error_name(&self, code: AddMeshError) -> BindingResult<String> {
        Ok(add_mesh_error_name(&*self.exports, code)?.unwrap_or_else(|| code.name().to_owned()))
    }
}

impl<E: AtlasExports> Drop for Atlas<'_, E> {
    fn drop(&mut self) {
        self.exports.destroy(self.handle);
        tracing::debug!("atlas session on {} closed", self.handle);
    }
}

impl<E: AtlasExports> std::fmt::Debug for Atlas<'_, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atlas")
            .field("handle", &self.handle)
            .field("stage", &self.stage)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uvbridge_engine::SoftEngine;

    const TRIANGLE: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

    fn engine() -> SoftEngine {
        SoftEngine::with_pages(2, 64).unwrap()
    }

    #[test]
    fn test_scratch_layout_aligns_arrays() {
        let mut layout = ScratchLayout::new(MeshDecl::SIZE);
        assert_eq!(layout.reserve(6).unwrap(), Some(64));
        assert_eq!(layout.reserve(0).unwrap(), None);
        assert_eq!(layout.reserve(3).unwrap(), Some(72));
        assert_eq!(layout.reserve(4).unwrap(), Some(76));
        assert_eq!(layout.size, 80);
    }

    #[test]
    fn test_length_checks() {
        let normals = [[0.0, 0.0, 1.0]; 2];
        let mesh = MeshInput { positions: &TRIANGLE, normals: Some(&normals), ..MeshInput::default() };
        assert_eq!(
            mesh.validate(),
            Err(BindingError::LengthMismatch { what: "normals", expected: 3, actual: 2 })
        );

        let mesh = MeshInput {
            positions: &TRIANGLE,
            face_materials: Some(&[1, 2]),
            ..MeshInput::default()
        };
        assert_eq!(
            mesh.validate(),
            Err(BindingError::LengthMismatch { what: "face_materials", expected: 1, actual: 2 })
        );

        // Indivisible corner counts are left to the engine.
        let mesh = MeshInput {
            positions: &TRIANGLE,
            indices: Some(IndexData::U16(&[0, 1, 2, 0])),
            face_materials: Some(&[1, 2]),
            ..MeshInput::default()
        };
        assert!(mesh.validate().is_ok());
    }

    #[test]
    fn test_stage_transitions() {
        let mut engine = engine();
        let mut atlas = Atlas::new(&mut engine).unwrap();
        assert_eq!(atlas.stage(), AtlasStage::Created);
        assert_eq!(atlas.pack_charts(None), Err(BindingError::ChartsNotComputed));

        let mesh = MeshInput { positions: &TRIANGLE, ..MeshInput::default() };
        assert_eq!(atlas.add_mesh(&mesh, 1).unwrap(), AddMeshError::Success);
        assert_eq!(atlas.stage(), AtlasStage::MeshesAdded);

        atlas.compute_charts(None).unwrap();
        assert_eq!(atlas.stage(), AtlasStage::ChartsComputed);
        assert!(atlas.meshes().unwrap().is_empty());

        atlas.pack_charts(None).unwrap();
        atlas.pack_charts(None).unwrap();
        assert_eq!(atlas.stage(), AtlasStage::Packed);
    }

    #[test]
    fn test_scratch_is_always_freed() {
        let mut engine = engine();
        let baseline = engine.heap().live_blocks();
        {
            let mut atlas = Atlas::new(&mut engine).unwrap();
            let mesh = MeshInput {
                positions: &TRIANGLE,
                indices: Some(IndexData::U32(&[0, 1, 7])),
                ..MeshInput::default()
            };
            assert_eq!(atlas.add_mesh(&mesh, 1).unwrap(), AddMeshError::IndexOutOfRange);
            let mesh = MeshInput { positions: &TRIANGLE, ..MeshInput::default() };
            atlas.add_mesh(&mesh, 1).unwrap();
            atlas.generate(None, None).unwrap();
            atlas.copy_uv(0).unwrap();
        }
        assert_eq!(engine.heap().live_blocks(), baseline);
    }

    #[test]
    fn test_overrides_reach_the_engine() {
        let mut engine = engine();
        let config = BindingConfig {
            pack: PackOverrides { resolution: Some(128), ..PackOverrides::default() },
            ..BindingConfig::default()
        };
        let mut atlas = Atlas::with_config(&mut engine, &config).unwrap();
        let options = atlas.pack_options().unwrap();
        assert_eq!(options.resolution, 128);
        assert!(options.rotate_charts);

        let mesh = MeshInput { positions: &TRIANGLE, ..MeshInput::default() };
        atlas.add_mesh(&mesh, 1).unwrap();
        atlas.generate(None, None).unwrap();
        let header = atlas.header().unwrap();
        assert_eq!((header.width, header.height), (128, 128));
    }

    #[test]
    fn test_image_size_overflow_is_out_of_memory() {
        let mut engine = engine();
        let mut atlas = Atlas::new(&mut engine).unwrap();
        let mesh = MeshInput { positions: &TRIANGLE, ..MeshInput::default() };
        atlas.add_mesh(&mesh, 1).unwrap();
        let options =
            PackOptions { create_image: true, texels_per_unit: 4.0, ..PackOptions::default() };
        atlas.generate(None, Some(&options)).unwrap();
        assert!(atlas.image().unwrap().is_some());

        let mut header = atlas.header().unwrap();
        header.width = 65_536;
        header.height = 65_536;
        header.encode(atlas.exports.memory_mut(), atlas.handle).unwrap();
        assert_eq!(atlas.image(), Err(BindingError::OutOfMemory { requested: u32::MAX }));
    }

    #[test]
    fn test_error_names() {
        let mut engine = engine();
        let atlas = Atlas::new(&mut engine).unwrap();
        assert_eq!(atlas.error_name(AddMeshError::InvalidIndexCount).unwrap(), "InvalidIndexCount");
    }

    #[test]
    fn test_mesh_index_is_checked() {
        let mut engine = engine();
        let mut atlas = Atlas::new(&mut engine).unwrap();
        let mesh = MeshInput { positions: &TRIANGLE, ..MeshInput::default() };
        atlas.add_mesh(&mesh, 1).unwrap();
        atlas.generate(None, None).unwrap();
        assert_eq!(atlas.mesh(1), Err(BindingError::MeshOutOfRange { index: 1, count: 1 }));
        assert!(matches!(atlas.copy_uv(3), Err(BindingError::MeshOutOfRange { .. })));
    }
}
