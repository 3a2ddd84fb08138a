//! Input mesh declarations.
//!
//! Both declarations only carry addresses of caller-owned arrays. The engine
//! copies the referenced data during the add call, after which the caller may
//! free everything.

use crate::codec::{FieldReader, FieldWriter, StructCodec};
use crate::enums::IndexFormat;
use crate::error::AbiResult;
use uvbridge_memory::{Address, LinearBuffer};

/// Byte offsets of [`MeshDecl`].
mod mesh_decl {
    pub const VERTEX_POSITION_DATA: u32 = 0;
    pub const VERTEX_NORMAL_DATA: u32 = 4;
    pub const VERTEX_UV_DATA: u32 = 8;
    pub const INDEX_DATA: u32 = 12;
    pub const FACE_IGNORE_DATA: u32 = 16;
    pub const FACE_MATERIAL_DATA: u32 = 20;
    pub const FACE_VERTEX_COUNT: u32 = 24;
    pub const VERTEX_COUNT: u32 = 28;
    pub const VERTEX_POSITION_STRIDE: u32 = 32;
    pub const VERTEX_NORMAL_STRIDE: u32 = 36;
    pub const VERTEX_UV_STRIDE: u32 = 40;
    pub const INDEX_COUNT: u32 = 44;
    pub const INDEX_OFFSET: u32 = 48;
    pub const FACE_COUNT: u32 = 52;
    pub const INDEX_FORMAT: u32 = 56;
    pub const EPSILON: u32 = 60;
}

/// Byte offsets of [`UvMeshDecl`].
mod uv_mesh_decl {
    pub const VERTEX_UV_DATA: u32 = 0;
    pub const INDEX_DATA: u32 = 4;
    pub const FACE_MATERIAL_DATA: u32 = 8;
    pub const VERTEX_COUNT: u32 = 12;
    pub const VERTEX_STRIDE: u32 = 16;
    pub const INDEX_COUNT: u32 = 20;
    pub const INDEX_OFFSET: u32 = 24;
    pub const INDEX_FORMAT: u32 = 28;
}

/// Description of one input mesh.
///
/// Size: 64 bytes
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MeshDecl {
    /// `vertex_count` positions, 3 floats each, `vertex_position_stride` apart.
    pub vertex_position_data: Address,
    /// Optional normals.
    pub vertex_normal_data: Address,
    /// Optional UVs, 2 floats each.
    pub vertex_uv_data: Address,
    /// Optional index buffer in `index_format`.
    pub index_data: Address,
    /// Optional per-face ignore flags, one byte each.
    pub face_ignore_data: Address,
    /// Optional per-face material ids, `u32` each.
    pub face_material_data: Address,
    /// Optional per-face vertex counts, one byte each. Null means triangles.
    pub face_vertex_count: Address,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Byte stride between positions.
    pub vertex_position_stride: u32,
    /// Byte stride between normals.
    pub vertex_normal_stride: u32,
    /// Byte stride between UVs.
    pub vertex_uv_stride: u32,
    /// Number of indices.
    pub index_count: u32,
    /// Added to every index before use.
    pub index_offset: i32,
    /// Number of faces; only read when `face_vertex_count` is set.
    pub face_count: u32,
    /// Width of each index.
    pub index_format: IndexFormat,
    /// Vertex colocation epsilon.
    pub epsilon: f32,
}

impl MeshDecl {
    /// Default colocation epsilon written by the engine's initializer.
    pub const DEFAULT_EPSILON: f32 = f32::EPSILON;
}

impl Default for MeshDecl {
    fn default() -> Self {
        Self {
            vertex_position_data: Address::NULL,
            vertex_normal_data: Address::NULL,
            vertex_uv_data: Address::NULL,
            index_data: Address::NULL,
            face_ignore_data: Address::NULL,
            face_material_data: Address::NULL,
            face_vertex_count: Address::NULL,
            vertex_count: 0,
            vertex_position_stride: 0,
            vertex_normal_stride: 0,
            vertex_uv_stride: 0,
            index_count: 0,
            index_offset: 0,
            face_count: 0,
            index_format: IndexFormat::UInt16,
            epsilon: Self::DEFAULT_EPSILON,
        }
    }
}

impl StructCodec for MeshDecl {
    const SIZE: u32 = 64;
    const NAME: &'static str = "MeshDecl";

    fn read_fields<B: LinearBuffer>(f: &FieldReader<'_, B>) -> AbiResult<Self> {
        use mesh_decl as at;
        Ok(Self {
            vertex_position_data: f.address(at::VERTEX_POSITION_DATA)?,
            vertex_normal_data: f.address(at::VERTEX_NORMAL_DATA)?,
            vertex_uv_data: f.address(at::VERTEX_UV_DATA)?,
            index_data: f.address(at::INDEX_DATA)?,
            face_ignore_data: f.address(at::FACE_IGNORE_DATA)?,
            face_material_data: f.address(at::FACE_MATERIAL_DATA)?,
            face_vertex_count: f.address(at::FACE_VERTEX_COUNT)?,
            vertex_count: f.u32(at::VERTEX_COUNT)?,
            vertex_position_stride: f.u32(at::VERTEX_POSITION_STRIDE)?,
            vertex_normal_stride: f.u32(at::VERTEX_NORMAL_STRIDE)?,
            vertex_uv_stride: f.u32(at::VERTEX_UV_STRIDE)?,
            index_count: f.u32(at::INDEX_COUNT)?,
            index_offset: f.i32(at::INDEX_OFFSET)?,
            face_count: f.u32(at::FACE_COUNT)?,
            index_format: f.enumeration(at::INDEX_FORMAT, "IndexFormat", IndexFormat::from_raw)?,
            epsilon: f.f32(at::EPSILON)?,
        })
    }

    fn write_fields<B: LinearBuffer>(&self, f: &mut FieldWriter<'_, B>) -> AbiResult<()> {
        use mesh_decl as at;
        f.set_address(at::VERTEX_POSITION_DATA, self.vertex_position_data)?;
        f.set_address(at::VERTEX_NORMAL_DATA, self.vertex_normal_data)?;
        f.set_address(at::VERTEX_UV_DATA, self.vertex_uv_data)?;
        f.set_address(at::INDEX_DATA, self.index_data)?;
        f.set_address(at::FACE_IGNORE_DATA, self.face_ignore_data)?;
        f.set_address(at::FACE_MATERIAL_DATA, self.face_material_data)?;
        f.set_address(at::FACE_VERTEX_COUNT, self.face_vertex_count)?;
        f.set_u32(at::VERTEX_COUNT, self.vertex_count)?;
        f.set_u32(at::VERTEX_POSITION_STRIDE, self.vertex_position_stride)?;
        f.set_u32(at::VERTEX_NORMAL_STRIDE, self.vertex_normal_stride)?;
        f.set_u32(at::VERTEX_UV_STRIDE, self.vertex_uv_stride)?;
        f.set_u32(at::INDEX_COUNT, self.index_count)?;
        f.set_i32(at::INDEX_OFFSET, self.index_offset)?;
        f.set_u32(at::FACE_COUNT, self.face_count)?;
        f.set_u32(at::INDEX_FORMAT, self.index_format.as_raw())?;
        f.set_f32(at::EPSILON, self.epsilon)
    }
}

/// Description of one mesh that already carries UVs.
///
/// Size: 32 bytes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UvMeshDecl {
    /// `vertex_count` UVs, 2 floats each, `vertex_stride` apart.
    pub vertex_uv_data: Address,
    /// Optional index buffer in `index_format`.
    pub index_data: Address,
    /// Optional per-face material ids, `u32` each.
    pub face_material_data: Address,
    /// Number of vertices.
    pub vertex_count: u32,
    /// Byte stride between UVs.
    pub vertex_stride: u32,
    /// Number of indices.
    pub index_count: u32,
    /// Added to every index before use.
    pub index_offset: i32,
    /// Width of each index.
    pub index_format: IndexFormat,
}

impl StructCodec for UvMeshDecl {
    const SIZE: u32 = 32;
    const NAME: &'static str = "UvMeshDecl";

    fn read_fields<B: LinearBuffer>(f: &FieldReader<'_, B>) -> AbiResult<Self> {
        use uv_mesh_decl as at;
        Ok(Self {
            vertex_uv_data: f.address(at::VERTEX_UV_DATA)?,
            index_data: f.address(at::INDEX_DATA)?,
            face_material_data: f.address(at::FACE_MATERIAL_DATA)?,
            vertex_count: f.u32(at::VERTEX_COUNT)?,
            vertex_stride: f.u32(at::VERTEX_STRIDE)?,
            index_count: f.u32(at::INDEX_COUNT)?,
            index_offset: f.i32(at::INDEX_OFFSET)?,
            index_format: f.enumeration(at::INDEX_FORMAT, "IndexFormat", IndexFormat::from_raw)?,
        })
    }

    fn write_fields<B: LinearBuffer>(&self, f: &mut FieldWriter<'_, B>) -> AbiResult<()> {
        use uv_mesh_decl as at;
        f.set_address(at::VERTEX_UV_DATA, self.vertex_uv_data)?;
        f.set_address(at::INDEX_DATA, self.index_data)?;
        f.set_address(at::FACE_MATERIAL_DATA, self.face_material_data)?;
        f.set_u32(at::VERTEX_COUNT, self.vertex_count)?;
        f.set_u32(at::VERTEX_STRIDE, self.vertex_stride)?;
        f.set_u32(at::INDEX_COUNT, self.index_count)?;
        f.set_i32(at::INDEX_OFFSET, self.index_offset)?;
        f.set_u32(at::INDEX_FORMAT, self.index_format.as_raw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AbiError;
    use uvbridge_memory::{HeapBuffer, MemoryViews};

    fn memory() -> MemoryViews<HeapBuffer> {
        MemoryViews::new(HeapBuffer::new(1, 1).unwrap())
    }

    #[test]
    fn test_mesh_decl_field_offsets() {
        let mut memory = memory();
        let decl = MeshDecl {
            vertex_position_data: Address::new(0x100),
            index_data: Address::new(0x200),
            vertex_count: 3,
            vertex_position_stride: 12,
            index_count: 3,
            index_offset: -1,
            index_format: IndexFormat::UInt32,
            ..MeshDecl::default()
        };
        decl.encode(&mut memory, Address::new(64)).unwrap();

        assert_eq!(memory.load_u32(Address::new(64)).unwrap(), 0x100);
        assert_eq!(memory.load_u32(Address::new(64 + 12)).unwrap(), 0x200);
        assert_eq!(memory.load_u32(Address::new(64 + 28)).unwrap(), 3);
        assert_eq!(memory.load_i32(Address::new(64 + 48)).unwrap(), -1);
        assert_eq!(memory.load_u32(Address::new(64 + 56)).unwrap(), 1);
        assert_eq!(memory.load_f32(Address::new(64 + 60)).unwrap(), f32::EPSILON);
    }

    #[test]
    fn test_uv_mesh_decl_field_offsets() {
        let mut memory = memory();
        let decl = UvMeshDecl {
            vertex_uv_data: Address::new(0x40),
            vertex_count: 4,
            vertex_stride: 8,
            index_count: 6,
            index_format: IndexFormat::UInt32,
            ..UvMeshDecl::default()
        };
        decl.encode(&mut memory, Address::new(256)).unwrap();

        assert_eq!(memory.load_u32(Address::new(256)).unwrap(), 0x40);
        assert_eq!(memory.load_u32(Address::new(256 + 16)).unwrap(), 8);
        assert_eq!(memory.load_u32(Address::new(256 + 20)).unwrap(), 6);
        assert_eq!(memory.load_u32(Address::new(256 + 28)).unwrap(), 1);
        assert_eq!(UvMeshDecl::decode(&memory, Address::new(256)).unwrap(), decl);
    }

    #[test]
    fn test_unknown_index_format_is_rejected() {
        let mut memory = memory();
        MeshDecl::default().encode(&mut memory, Address::new(64)).unwrap();
        memory.store_u32(Address::new(64 + 56), 7).unwrap();
        assert_eq!(
            MeshDecl::decode(&memory, Address::new(64)).unwrap_err(),
            AbiError::InvalidEnum { kind: "IndexFormat", value: 7 }
        );
    }

    #[test]
    fn test_null_declaration_is_absent() {
        let memory = memory();
        assert_eq!(
            MeshDecl::decode(&memory, Address::NULL).unwrap_err(),
            AbiError::AbsentData { kind: "MeshDecl" }
        );
    }
}
