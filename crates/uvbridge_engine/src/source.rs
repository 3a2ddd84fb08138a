//! # Source Meshes
//!
//! Engine-side copies of the meshes handed to add-mesh / add-uv-mesh.
//!
//! Ingestion validates the declaration in the same order the compiled engine
//! does and copies every referenced array out of linear memory, so the caller
//! may free its buffers as soon as the call returns.

use crate::error::{EngineError, EngineResult};
use uvbridge_abi::{
    read_flags, read_index_array, read_u32_array, read_u8_array, AddMeshError, IndexFormat,
    MeshDecl, StructCodec, UvMeshDecl,
};
use uvbridge_memory::{Address, LinearBuffer, MemoryError, MemoryViews};

/// Default byte stride of tightly packed positions.
const POSITION_STRIDE: u32 = 12;
/// Default byte stride of tightly packed UVs.
const UV_STRIDE: u32 = 8;

/// Which add call produced a mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshKind {
    /// Added with positions; charts are computed from geometry.
    Geometry,
    /// Added with UVs only; charts are the existing UV islands.
    Uv,
}

/// One polygon of a source mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Face {
    /// First corner in [`SourceMesh::corners`].
    pub first: u32,
    /// Number of corners, at least 3.
    pub len: u32,
}

/// A validated copy of one input mesh.
#[derive(Clone, Debug)]
pub struct SourceMesh {
    /// How the mesh was added.
    pub kind: MeshKind,
    /// Vertex positions. UV meshes store `(u, v, 0)`.
    pub positions: Vec<[f32; 3]>,
    /// Input UVs, when supplied.
    pub uvs: Option<Vec<[f32; 2]>>,
    /// Vertex index of every face corner, offset applied.
    pub corners: Vec<u32>,
    /// Polygons in input order.
    pub faces: Vec<Face>,
    /// Material per face.
    pub materials: Vec<u32>,
    /// Ignore flag per face.
    pub ignored: Vec<bool>,
}

impl SourceMesh {
    /// Number of source vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Corner vertex indices of `face`.
    #[inline]
    #[must_use]
    pub fn face_corners(&self, face: usize) -> &[u32] {
        let Face { first, len } = self.faces[face];
        &self.corners[first as usize..(first + len) as usize]
    }

    /// Area-weighted normal of `face` (Newell's method).
    #[must_use]
    pub fn face_normal(&self, face: usize) -> [f32; 3] {
        let corners = self.face_corners(face);
        let mut n = [0.0f32; 3];
        for (i, &a) in corners.iter().enumerate() {
            let b = corners[(i + 1) % corners.len()];
            let p = self.positions[a as usize];
            let q = self.positions[b as usize];
            n[0] += (p[1] - q[1]) * (p[2] + q[2]);
            n[1] += (p[2] - q[2]) * (p[0] + q[0]);
            n[2] += (p[0] - q[0]) * (p[1] + q[1]);
        }
        n
    }

    /// Surface area of `face`.
    #[must_use]
    pub fn face_area(&self, face: usize) -> f32 {
        let [x, y, z] = self.face_normal(face);
        0.5 * (x * x + y * y + z * z).sqrt()
    }

    /// Reads and validates a [`MeshDecl`] at `address`.
    ///
    /// # Errors
    ///
    /// [`EngineError::Rejected`] carries the add-mesh code for invalid
    /// declarations; unreadable memory surfaces as an ABI or memory fault.
    pub fn from_mesh_decl<B: LinearBuffer>(
        memory: &MemoryViews<B>,
        address: Address,
    ) -> EngineResult<Self> {
        let decl = MeshDecl::decode(memory, address)?;

        let has_indices = !decl.index_data.is_null();
        let corner_count = if has_indices { decl.index_count } else { decl.vertex_count };
        let faces = read_faces(memory, decl.face_vertex_count, decl.face_count, corner_count)?;

        let corners = resolve_corners(
            memory,
            has_indices.then_some((decl.index_data, decl.index_format)),
            corner_count,
            decl.index_offset,
            decl.vertex_count,
        )?;

        let positions = read_strided::<3, B>(
            memory,
            decl.vertex_position_data,
            decl.vertex_count,
            stride_or(decl.vertex_position_stride, POSITION_STRIDE),
        )?;
        let uvs = if decl.vertex_uv_data.is_null() {
            None
        } else {
            Some(read_strided::<2, B>(
                memory,
                decl.vertex_uv_data,
                decl.vertex_count,
                stride_or(decl.vertex_uv_stride, UV_STRIDE),
            )?)
        };

        let face_count = u32::try_from(faces.len()).unwrap_or(u32::MAX);
        let materials = read_materials(memory, decl.face_material_data, face_count)?;
        let ignored = if decl.face_ignore_data.is_null() {
            vec![false; faces.len()]
        } else {
            read_flags(memory, decl.face_ignore_data, face_count)?
        };

        Ok(Self {
            kind: MeshKind::Geometry,
            positions,
            uvs,
            corners,
            faces,
            materials,
            ignored,
        })
    }

    /// Reads and validates a [`UvMeshDecl`] at `address`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`SourceMesh::from_mesh_decl`].
    pub fn from_uv_mesh_decl<B: LinearBuffer>(
        memory: &MemoryViews<B>,
        address: Address,
    ) -> EngineResult<Self> {
        let decl = UvMeshDecl::decode(memory, address)?;

        let has_indices = !decl.index_data.is_null();
        let corner_count = if has_indices { decl.index_count } else { decl.vertex_count };
        let faces = read_faces(memory, Address::NULL, 0, corner_count)?;

        let corners = resolve_corners(
            memory,
            has_indices.then_some((decl.index_data, decl.index_format)),
            corner_count,
            decl.index_offset,
            decl.vertex_count,
        )?;

        let uvs = read_strided::<2, B>(
            memory,
            decl.vertex_uv_data,
            decl.vertex_count,
            stride_or(decl.vertex_stride, UV_STRIDE),
        )?;
        let positions = uvs.iter().map(|&[u, v]| [u, v, 0.0]).collect();

        let face_count = u32::try_from(faces.len()).unwrap_or(u32::MAX);
        let materials = read_materials(memory, decl.face_material_data, face_count)?;

        Ok(Self {
            kind: MeshKind::Uv,
            positions,
            uvs: Some(uvs),
            corners,
            ignored: vec![false; faces.len()],
            faces,
            materials,
        })
    }
}

#[inline]
const fn stride_or(stride: u32, packed: u32) -> u32 {
    if stride == 0 {
        packed
    } else {
        stride
    }
}

/// Builds the face table, rejecting bad polygon sizes and corner counts.
fn read_faces<B: LinearBuffer>(
    memory: &MemoryViews<B>,
    face_vertex_count: Address,
    face_count: u32,
    corner_count: u32,
) -> EngineResult<Vec<Face>> {
    if face_vertex_count.is_null() {
        if corner_count % 3 != 0 {
            return Err(EngineError::Rejected(AddMeshError::InvalidIndexCount));
        }
        return Ok((0..corner_count / 3).map(|f| Face { first: f * 3, len: 3 }).collect());
    }

    let sizes = read_u8_array(memory, face_vertex_count, face_count)?;
    if sizes.iter().any(|&n| n < 3) {
        return Err(EngineError::Rejected(AddMeshError::InvalidFaceVertexCount));
    }
    let total: u64 = sizes.iter().map(|&n| u64::from(n)).sum();
    if total != u64::from(corner_count) {
        return Err(EngineError::Rejected(AddMeshError::InvalidIndexCount));
    }

    let mut first = 0u32;
    Ok(sizes
        .into_iter()
        .map(|n| {
            let face = Face { first, len: u32::from(n) };
            first += u32::from(n);
            face
        })
        .collect())
}

/// Resolves every corner to a vertex index, applying `index_offset`.
fn resolve_corners<B: LinearBuffer>(
    memory: &MemoryViews<B>,
    indices: Option<(Address, IndexFormat)>,
    corner_count: u32,
    index_offset: i32,
    vertex_count: u32,
) -> EngineResult<Vec<u32>> {
    let raw = match indices {
        Some((address, format)) => read_index_array(memory, address, corner_count, format)?,
        None => (0..corner_count).collect(),
    };
    raw.into_iter()
        .map(|index| {
            let resolved = i64::from(index) + i64::from(index_offset);
            u32::try_from(resolved)
                .ok()
                .filter(|&v| v < vertex_count)
                .ok_or(EngineError::Rejected(AddMeshError::IndexOutOfRange))
        })
        .collect()
}

fn read_materials<B: LinearBuffer>(
    memory: &MemoryViews<B>,
    address: Address,
    face_count: u32,
) -> EngineResult<Vec<u32>> {
    if address.is_null() {
        return Ok(vec![0; face_count as usize]);
    }
    Ok(read_u32_array(memory, address, face_count)?)
}

/// Reads `count` records of `N` floats, `stride` bytes apart.
fn read_strided<const N: usize, B: LinearBuffer>(
    memory: &MemoryViews<B>,
    base: Address,
    count: u32,
    stride: u32,
) -> EngineResult<Vec<[f32; N]>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    if base.is_null() {
        return Err(EngineError::Rejected(AddMeshError::Error));
    }
    (0..count)
        .map(|i| {
            let record = base.element(i, stride).ok_or(MemoryError::OutOfRange {
                address: base,
                len: count as usize * stride as usize,
                size: memory.size(),
            })?;
            let floats = memory.read_f32(record, N)?;
            let mut out = [0.0f32; N];
            out.copy_from_slice(floats);
            Ok(out)
        })
        .collect()
}
