//! # Software Engine
//!
//! [`SoftEngine`] owns a linear buffer and answers every exported call of
//! the atlas module with raw addresses and codes, exactly as the compiled
//! module would. Nothing here enforces call order: the engine logs and
//! ignores what a compiled engine would treat as undefined.

use crate::charts::{compute_charts, ChartPlan};
use crate::error::{EngineError, EngineResult};
use crate::heap::EngineHeap;
use crate::output::{self, OutputBlocks};
use crate::packer::pack;
use crate::source::{MeshKind, SourceMesh};
use std::collections::HashMap;
use uvbridge_abi::{
    decode_array, AddMeshError, AtlasHeader, ChartOptions, Mesh, MeshDecl, PackOptions,
    ProgressCategory, StructCodec, UvMeshDecl, Vertex,
};
use uvbridge_memory::{Address, HeapBuffer, LinearBuffer, MemoryError, MemoryViews};

/// Bytes reserved for the engine-side atlas struct; the public header is a prefix.
const ATLAS_STRUCT_SIZE: u32 = 64;

/// Progress observer: category and percent complete.
pub type ProgressFn = Box<dyn FnMut(ProgressCategory, u32)>;

/// Rust-side state of one atlas handle.
#[derive(Default)]
struct AtlasState {
    meshes: Vec<SourceMesh>,
    charts: Option<Vec<ChartPlan>>,
    output: OutputBlocks,
}

/// A pure-Rust atlas engine over a linear buffer.
pub struct SoftEngine<B: LinearBuffer = HeapBuffer> {
    memory: MemoryViews<B>,
    heap: EngineHeap,
    atlases: HashMap<Address, AtlasState>,
    error_strings: Vec<Address>,
    progress_strings: Vec<Address>,
    progress: Option<ProgressFn>,
}

impl SoftEngine<HeapBuffer> {
    /// Creates an engine over a fresh [`HeapBuffer`].
    ///
    /// # Errors
    ///
    /// Returns an error for inconsistent page limits, or if the debug strings
    /// do not fit.
    pub fn with_pages(initial_pages: u32, max_pages: u32) -> EngineResult<Self> {
        Self::new(HeapBuffer::new(initial_pages, max_pages)?)
    }
}

impl<B: LinearBuffer> SoftEngine<B> {
    /// Creates an engine that manages all of `buffer`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::OutOfMemory`] if the debug strings do not fit.
    pub fn new(buffer: B) -> EngineResult<Self> {
        let memory = MemoryViews::new(buffer);
        let heap = EngineHeap::new(&memory);
        let mut engine = Self {
            memory,
            heap,
            atlases: HashMap::new(),
            error_strings: Vec::new(),
            progress_strings: Vec::new(),
            progress: None,
        };

        for code in 0..=4 {
            let name = AddMeshError::from_raw(code).name();
            let address = engine.store_c_str(name)?;
            engine.error_strings.push(address);
        }
        for category in ProgressCategory::ALL {
            let address = engine.store_c_str(category.name())?;
            engine.progress_strings.push(address);
        }
        Ok(engine)
    }

    fn store_c_str(&mut self, text: &str) -> EngineResult<Address> {
        let len = u32::try_from(text.len() + 1).unwrap_or(u32::MAX);
        let address = self.heap.calloc(&mut self.memory, len);
        if address.is_null() {
            return Err(EngineError::OutOfMemory { requested: len });
        }
        self.memory.write_u8(address, text.as_bytes())?;
        Ok(address)
    }

    /// The engine's memory views.
    #[inline]
    #[must_use]
    pub fn memory(&self) -> &MemoryViews<B> {
        &self.memory
    }

    /// Mutable access to the engine's memory views.
    #[inline]
    pub fn memory_mut(&mut self) -> &mut MemoryViews<B> {
        &mut self.memory
    }

    /// The allocator, for inspecting live blocks.
    #[inline]
    #[must_use]
    pub fn heap(&self) -> &EngineHeap {
        &self.heap
    }

    /// Number of live atlas handles.
    #[inline]
    #[must_use]
    pub fn atlas_count(&self) -> usize {
        self.atlases.len()
    }

    /// Installs a progress observer, called at the start and end of each stage.
    pub fn set_progress_callback(&mut self, callback: Option<ProgressFn>) {
        self.progress = callback;
    }

    fn report(&mut self, category: ProgressCategory, percent: u32) {
        tracing::trace!("{} {}%", category, percent);
        if let Some(callback) = self.progress.as_mut() {
            callback(category, percent);
        }
    }

    fn header(&self, atlas: Address) -> EngineResult<AtlasHeader> {
        Ok(AtlasHeader::decode(&self.memory, atlas)?)
    }

    fn update_header(
        &mut self,
        atlas: Address,
        update: impl FnOnce(&mut AtlasHeader),
    ) -> EngineResult<()> {
        let mut header = self.header(atlas)?;
        update(&mut header);
        header.encode(&mut self.memory, atlas)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// `xatlasCreate`: returns a new atlas handle, or null when out of memory.
    pub fn create(&mut self) -> Address {
        let atlas = self.heap.calloc(&mut self.memory, ATLAS_STRUCT_SIZE);
        if atlas.is_null() {
            tracing::warn!("atlas create failed: out of engine memory");
            return atlas;
        }
        self.atlases.insert(atlas, AtlasState::default());
        tracing::info!("created atlas {}", atlas);
        atlas
    }

    /// `xatlasDestroy`: releases the atlas and everything reachable from it.
    pub fn destroy(&mut self, atlas: Address) {
        let Some(state) = self.atlases.remove(&atlas) else {
            tracing::warn!("destroy of unknown atlas {}", atlas);
            return;
        };
        state.output.release(&mut self.heap);
        self.heap.free(atlas);
        tracing::info!("destroyed atlas {}", atlas);
    }

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------

    fn add_source(
        &mut self,
        atlas: Address,
        kind: MeshKind,
        read: impl FnOnce(&MemoryViews<B>) -> EngineResult<SourceMesh>,
    ) -> EngineResult<u32> {
        let state = self.atlases.get(&atlas).ok_or(EngineError::UnknownAtlas(atlas))?;
        if state.charts.is_some() || state.meshes.first().is_some_and(|m| m.kind != kind) {
            return Err(EngineError::Rejected(AddMeshError::Error));
        }

        let mesh = read(&self.memory)?;
        let state = self.atlases.get_mut(&atlas).ok_or(EngineError::UnknownAtlas(atlas))?;
        state.meshes.push(mesh);
        let count = u32::try_from(state.meshes.len()).unwrap_or(u32::MAX);

        self.update_header(atlas, |header| header.mesh_count = count)?;
        Ok(count)
    }

    fn add_result(&mut self, result: EngineResult<u32>, what: &str) -> u32 {
        self.report(ProgressCategory::AddMesh, 100);
        match result {
            Ok(count) => {
                tracing::debug!("{} accepted, {} meshes", what, count);
                AddMeshError::Success.as_raw()
            }
            Err(err) => {
                tracing::warn!("{} rejected: {}", what, err);
                err.add_mesh_code().as_raw()
            }
        }
    }

    /// `xatlasAddMesh`: copies the mesh described at `decl` into the atlas.
    ///
    /// Returns an [`AddMeshError`] code. On failure the atlas is unchanged.
    pub fn add_mesh(&mut self, atlas: Address, decl: Address, mesh_count_hint: u32) -> u32 {
        tracing::trace!("add_mesh atlas={} decl={} hint={}", atlas, decl, mesh_count_hint);
        self.report(ProgressCategory::AddMesh, 0);
        let result = self.add_source(atlas, MeshKind::Geometry, |memory| {
            SourceMesh::from_mesh_decl(memory, decl)
        });
        self.add_result(result, "mesh")
    }

    /// `xatlasAddMeshJoin`: mesh ingestion is synchronous, nothing to wait for.
    pub fn add_mesh_join(&mut self, atlas: Address) {
        tracing::trace!("add_mesh_join atlas={}", atlas);
    }

    /// `xatlasAddUvMesh`: copies the UV mesh described at `decl`.
    pub fn add_uv_mesh(&mut self, atlas: Address, decl: Address) -> u32 {
        tracing::trace!("add_uv_mesh atlas={} decl={}", atlas, decl);
        self.report(ProgressCategory::AddMesh, 0);
        let result = self.add_source(atlas, MeshKind::Uv, |memory| {
            SourceMesh::from_uv_mesh_decl(memory, decl)
        });
        self.add_result(result, "uv mesh")
    }

    // ------------------------------------------------------------------
    // Charts and packing
    // ------------------------------------------------------------------

    fn read_options<T: StructCodec + Default>(&self, address: Address) -> EngineResult<T> {
        if address.is_null() {
            return Ok(T::default());
        }
        Ok(T::decode(&self.memory, address)?)
    }

    fn try_compute(&mut self, atlas: Address, options: Address) -> EngineResult<()> {
        let options: ChartOptions = self.read_options(options)?;
        self.report(ProgressCategory::ComputeCharts, 0);

        let state = self.atlases.get_mut(&atlas).ok_or(EngineError::UnknownAtlas(atlas))?;
        let charts = compute_charts(&state.meshes, &options);
        let chart_count = u32::try_from(charts.len()).unwrap_or(u32::MAX);
        state.charts = Some(charts);
        std::mem::take(&mut state.output).release(&mut self.heap);

        self.update_header(atlas, |header| {
            *header = AtlasHeader {
                mesh_count: header.mesh_count,
                chart_count,
                ..AtlasHeader::default()
            };
        })?;
        self.report(ProgressCategory::ComputeCharts, 100);
        Ok(())
    }

    fn try_pack(&mut self, atlas: Address, options: Address) -> EngineResult<()> {
        let options: PackOptions = self.read_options(options)?;
        self.report(ProgressCategory::PackCharts, 0);

        let state = self.atlases.get(&atlas).ok_or(EngineError::UnknownAtlas(atlas))?;
        let Some(charts) = state.charts.as_ref() else {
            tracing::warn!("pack_charts on atlas {} before compute_charts; ignored", atlas);
            return Ok(());
        };
        let layout = pack(charts, &options);
        self.report(ProgressCategory::PackCharts, 100);

        self.report(ProgressCategory::BuildOutputMeshes, 0);
        let state = self.atlases.get_mut(&atlas).ok_or(EngineError::UnknownAtlas(atlas))?;
        let charts = state.charts.as_deref().unwrap_or_default();
        let built = match output::build(
            &mut self.memory,
            &mut self.heap,
            &state.meshes,
            charts,
            &layout,
            options.create_image,
        ) {
            Ok(built) => built,
            Err(err) => {
                // The header must not point at output from an older pack.
                std::mem::take(&mut state.output).release(&mut self.heap);
                self.update_header(atlas, |header| {
                    header.image = Address::NULL;
                    header.meshes = Address::NULL;
                    header.utilization = Address::NULL;
                    header.width = 0;
                    header.height = 0;
                    header.atlas_count = 0;
                })?;
                return Err(err);
            }
        };
        let chart_count = u32::try_from(charts.len()).unwrap_or(u32::MAX);
        let previous = std::mem::replace(&mut state.output, built);
        let (meshes, utilization, image) =
            (state.output.meshes, state.output.utilization, state.output.image);
        previous.release(&mut self.heap);

        self.update_header(atlas, |header| {
            header.image = image;
            header.meshes = meshes;
            header.utilization = utilization;
            header.width = layout.width;
            header.height = layout.height;
            header.atlas_count = layout.atlas_count;
            header.chart_count = chart_count;
            header.texels_per_unit = layout.texels_per_unit;
        })?;
        self.report(ProgressCategory::BuildOutputMeshes, 100);
        tracing::info!(
            "packed atlas {}: {}x{} texels, {} sub-atlases, {} charts",
            atlas,
            layout.width,
            layout.height,
            layout.atlas_count,
            chart_count
        );
        Ok(())
    }

    /// `xatlasComputeCharts`: splits every added mesh into charts.
    ///
    /// A null `options` address uses the engine defaults.
    pub fn compute_charts(&mut self, atlas: Address, options: Address) {
        tracing::trace!("compute_charts atlas={} options={}", atlas, options);
        if let Err(err) = self.try_compute(atlas, options) {
            tracing::warn!("compute_charts on atlas {} failed: {}", atlas, err);
        }
    }

    /// `xatlasPackCharts`: packs the computed charts and rebuilds the output
    /// meshes. Repeatable with different options.
    pub fn pack_charts(&mut self, atlas: Address, options: Address) {
        tracing::trace!("pack_charts atlas={} options={}", atlas, options);
        if let Err(err) = self.try_pack(atlas, options) {
            tracing::warn!("pack_charts on atlas {} failed: {}", atlas, err);
        }
    }

    /// `xatlasGenerate`: compute then pack.
    pub fn generate(&mut self, atlas: Address, chart_options: Address, pack_options: Address) {
        self.compute_charts(atlas, chart_options);
        self.pack_charts(atlas, pack_options);
    }

    // ------------------------------------------------------------------
    // Debug strings and initializers
    // ------------------------------------------------------------------

    /// `xatlasAddMeshErrorString`: NUL-terminated name of an error code.
    #[must_use]
    pub fn add_mesh_error_string(&self, code: u32) -> Address {
        let index = AddMeshError::from_raw(code).as_raw() as usize;
        self.error_strings.get(index).copied().unwrap_or(Address::NULL)
    }

    /// `xatlasProgressCategoryString`: NUL-terminated name of a category.
    #[must_use]
    pub fn progress_category_string(&self, category: u32) -> Address {
        ProgressCategory::from_raw(category)
            .and_then(|c| self.progress_strings.get(c.as_raw() as usize).copied())
            .unwrap_or(Address::NULL)
    }

    fn init<T: StructCodec + Default>(&mut self, address: Address) {
        if let Err(err) = T::default().encode(&mut self.memory, address) {
            tracing::warn!("{} init at {} failed: {}", T::NAME, address, err);
        }
    }

    /// `xatlasMeshDeclInit`.
    pub fn mesh_decl_init(&mut self, address: Address) {
        self.init::<MeshDecl>(address);
    }

    /// `xatlasUvMeshDeclInit`.
    pub fn uv_mesh_decl_init(&mut self, address: Address) {
        self.init::<UvMeshDecl>(address);
    }

    /// `xatlasChartOptionsInit`.
    pub fn chart_options_init(&mut self, address: Address) {
        self.init::<ChartOptions>(address);
    }

    /// `xatlasPackOptionsInit`.
    pub fn pack_options_init(&mut self, address: Address) {
        self.init::<PackOptions>(address);
    }

    // ------------------------------------------------------------------
    // Allocator
    // ------------------------------------------------------------------

    /// `malloc`.
    pub fn malloc(&mut self, size: u32) -> Address {
        let address = self.heap.malloc(&mut self.memory, size);
        if address.is_null() {
            tracing::warn!("malloc({}) failed", size);
        }
        address
    }

    /// `realloc`.
    pub fn realloc(&mut self, address: Address, size: u32) -> Address {
        self.heap.realloc(&mut self.memory, address, size)
    }

    /// `free`.
    pub fn free(&mut self, address: Address) {
        self.heap.free(address);
    }

    // ------------------------------------------------------------------
    // UV export
    // ------------------------------------------------------------------

    fn try_copy_uv(&mut self, atlas: Address, mesh: Address, output: Address) -> EngineResult<u32> {
        let header = self.header(atlas)?;
        let mesh = Mesh::decode(&self.memory, mesh)?;
        let vertices: Vec<Vertex> = decode_array(&self.memory, mesh.vertex_array, mesh.vertex_count)?;

        #[allow(clippy::cast_precision_loss)]
        let (width, height) = (header.width as f32, header.height as f32);
        let xrefs: Vec<u32> = vertices.iter().map(|v| v.xref).collect();
        let uvs: Vec<f32> = vertices
            .iter()
            .flat_map(|v| [v.uv[0] / width, v.uv[1] / height])
            .collect();

        if !vertices.is_empty() {
            self.memory.write_u32(output, &xrefs)?;
            let uv_base = output.element(mesh.vertex_count, 4).ok_or(MemoryError::OutOfRange {
                address: output,
                len: mesh.vertex_count as usize * 12,
                size: self.memory.size(),
            })?;
            self.memory.write_f32(uv_base, &uvs)?;
        }
        Ok(mesh.vertex_count)
    }

    /// `copy_uv`: writes `vertex_count` xrefs then `vertex_count` normalized
    /// `(u, v)` pairs at `output`, returning the vertex count.
    pub fn copy_uv(&mut self, atlas: Address, mesh: Address, output: Address) -> u32 {
        match self.try_copy_uv(atlas, mesh, output) {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!("copy_uv failed: {}", err);
                0
            }
        }
    }
}

impl<B: LinearBuffer> std::fmt::Debug for SoftEngine<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoftEngine")
            .field("memory_bytes", &self.memory.size())
            .field("live_blocks", &self.heap.live_blocks())
            .field("atlases", &self.atlases.len())
            .finish_non_exhaustive()
    }
}
