//! # Engine Exports
//!
//! [`AtlasExports`] is the raw call surface of the compiled atlas module:
//! every method takes and returns plain addresses and codes, and nothing is
//! checked. Hosts either implement it over a wasm instance's exports or use
//! the bundled [`SoftEngine`].
//!
//! ## Call order per handle
//!
//! ```text
//! create ──► add_mesh* | add_uv_mesh* ──► compute_charts ──► pack_charts ──► pack_charts ...
//!    └──────────────────── generate ─────────────────────────────┘
//! destroy is terminal from any state.
//! ```

use uvbridge_abi::AddMeshError;
use uvbridge_engine::SoftEngine;
use uvbridge_memory::{Address, LinearBuffer, MemoryResult, MemoryViews};

/// One raw call per engine export.
pub trait AtlasExports {
    /// The linear buffer shared with the engine.
    type Buffer: LinearBuffer;

    /// Views over the engine's linear memory.
    fn memory(&self) -> &MemoryViews<Self::Buffer>;

    /// Mutable views over the engine's linear memory.
    fn memory_mut(&mut self) -> &mut MemoryViews<Self::Buffer>;

    /// Creates an empty atlas. Null when the engine is out of memory.
    fn create(&mut self) -> Address;

    /// Destroys an atlas and everything it owns.
    fn destroy(&mut self, atlas: Address);

    /// Adds a mesh; the declaration and its arrays are copied. Returns an
    /// [`AddMeshError`] code.
    fn add_mesh(&mut self, atlas: Address, decl: Address, mesh_count_hint: u32) -> u32;

    /// Waits for pending add-mesh work.
    fn add_mesh_join(&mut self, atlas: Address);

    /// Adds a UV mesh. Returns an [`AddMeshError`] code.
    fn add_uv_mesh(&mut self, atlas: Address, decl: Address) -> u32;

    /// Computes charts for every added mesh.
    fn compute_charts(&mut self, atlas: Address, chart_options: Address);

    /// Packs computed charts. Repeatable.
    fn pack_charts(&mut self, atlas: Address, pack_options: Address);

    /// Computes and packs in one call.
    fn generate(&mut self, atlas: Address, chart_options: Address, pack_options: Address);

    /// Name of an add-mesh error code. `None` if the module lacks the export.
    fn add_mesh_error_string(&self, _code: u32) -> Option<Address> {
        None
    }

    /// Name of a progress category. `None` if the module lacks the export.
    fn progress_category_string(&self, _category: u32) -> Option<Address> {
        None
    }

    /// Writes default mesh declaration fields at `decl`.
    fn mesh_decl_init(&mut self, decl: Address);

    /// Writes default UV mesh declaration fields at `decl`.
    fn uv_mesh_decl_init(&mut self, decl: Address);

    /// Writes default chart options at `options`.
    fn chart_options_init(&mut self, options: Address);

    /// Writes default pack options at `options`.
    fn pack_options_init(&mut self, options: Address);

    /// Allocates engine memory. Null on exhaustion.
    fn malloc(&mut self, size: u32) -> Address;

    /// Resizes an engine block. Null on exhaustion; the old block survives.
    fn realloc(&mut self, address: Address, size: u32) -> Address;

    /// Frees an engine block.
    fn free(&mut self, address: Address);

    /// Writes `vertex_count` xrefs and normalized UV pairs of `mesh` at
    /// `output`, returning the vertex count.
    fn copy_uv(&mut self, atlas: Address, mesh: Address, output: Address) -> u32;
}

/// Reads the engine's name for an add-mesh code, if it exports one.
///
/// # Errors
///
/// Propagates faults reading the string.
pub fn add_mesh_error_name<E: AtlasExports>(
    exports: &E,
    code: AddMeshError,
) -> MemoryResult<Option<String>> {
    match exports.add_mesh_error_string(code.as_raw()) {
        Some(address) if !address.is_null() => exports.memory().read_c_str(address).map(Some),
        _ => Ok(None),
    }
}

/// Reads the engine's name for a progress category, if it exports one.
///
/// # Errors
///
/// Propagates faults reading the string.
pub fn progress_category_name<E: AtlasExports>(
    exports: &E,
    category: uvbridge_abi::ProgressCategory,
) -> MemoryResult<Option<String>> {
    match exports.progress_category_string(category.as_raw()) {
        Some(address) if !address.is_null() => exports.memory().read_c_str(address).map(Some),
        _ => Ok(None),
    }
}

impl<B: LinearBuffer> AtlasExports for SoftEngine<B> {
    type Buffer = B;

    fn memory(&self) -> &MemoryViews<B> {
        SoftEngine::memory(self)
    }

    fn memory_mut(&mut self) -> &mut MemoryViews<B> {
        SoftEngine::memory_mut(self)
    }

    fn create(&mut self) -> Address {
        SoftEngine::create(self)
    }

    fn destroy(&mut self, atlas: Address) {
        SoftEngine::destroy(self, atlas);
    }

    fn add_mesh(&mut self, atlas: Address, decl: Address, mesh_count_hint: u32) -> u32 {
        SoftEngine::add_mesh(self, atlas, decl, mesh_count_hint)
    }

    fn add_mesh_join(&mut self, atlas: Address) {
        SoftEngine::add_mesh_join(self, atlas);
    }

    fn add_uv_mesh(&mut self, atlas: Address, decl: Address) -> u32 {
        SoftEngine::add_uv_mesh(self, atlas, decl)
    }

    fn compute_charts(&mut self, atlas: Address, chart_options: Address) {
        SoftEngine::compute_charts(self, atlas, chart_options);
    }

    fn pack_charts(&mut self, atlas: Address, pack_options: Address) {
        SoftEngine::pack_charts(self, atlas, pack_options);
    }

    fn generate(&mut self, atlas: Address, chart_options: Address, pack_options: Address) {
        SoftEngine::generate(self, atlas, chart_options, pack_options);
    }

    fn add_mesh_error_string(&self, code: u32) -> Option<Address> {
        Some(SoftEngine::add_mesh_error_string(self, code))
    }

    fn progress_category_string(&self, category: u32) -> Option<Address> {
        Some(SoftEngine::progress_category_string(self, category))
    }

    fn mesh_decl_init(&mut self, decl: Address) {
        SoftEngine::mesh_decl_init(self, decl);
    }

    fn uv_mesh_decl_init(&mut self, decl: Address) {
        SoftEngine::uv_mesh_decl_init(self, decl);
    }

    fn chart_options_init(&mut self, options: Address) {
        SoftEngine::chart_options_init(self, options);
    }

    fn pack_options_init(&mut self, options: Address) {
        SoftEngine::pack_options_init(self, options);
    }

    fn malloc(&mut self, size: u32) -> Address {
        SoftEngine::malloc(self, size)
    }

    fn realloc(&mut self, address: Address, size: u32) -> Address {
        SoftEngine::realloc(self, address, size)
    }

    fn free(&mut self, address: Address) {
        SoftEngine::free(self, address);
    }

    fn copy_uv(&mut self, atlas: Address, mesh: Address, output: Address) -> u32 {
        SoftEngine::copy_uv(self, atlas, mesh, output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uvbridge_abi::ProgressCategory;

    #[test]
    fn test_names_come_from_engine_memory() {
        let engine = SoftEngine::with_pages(1, 4).unwrap();
        assert_eq!(
            add_mesh_error_name(&engine, AddMeshError::IndexOutOfRange).unwrap().as_deref(),
            Some("IndexOutOfRange")
        );
        for category in ProgressCategory::ALL {
            assert_eq!(
                progress_category_name(&engine, category).unwrap().as_deref(),
                Some(category.name())
            );
        }
    }

    #[test]
    fn test_names_match_host_display() {
        let engine = SoftEngine::with_pages(1, 4).unwrap();
        for raw in 0..=4 {
            let code = AddMeshError::from_raw(raw);
            assert_eq!(add_mesh_error_name(&engine, code).unwrap(), Some(code.to_string()));
        }
    }
}
