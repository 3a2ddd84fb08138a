//! # Chart Computation
//!
//! Splits every source mesh into charts and flattens each chart to 2D.
//!
//! ## Algorithm
//!
//! 1. Faces are keyed by material and, for geometry, by the signed dominant
//!    axis of their normal
//! 2. Charts grow breadth-first across faces that share a vertex and a key,
//!    in input face order, until `max_chart_area` (if set) would be exceeded
//! 3. Each chart is projected onto the plane orthogonal to its axis, or takes
//!    its input UVs for UV meshes and when `use_input_mesh_uvs` is set
//!
//! Ignored faces never join a chart.

use crate::source::{MeshKind, SourceMesh};
use std::collections::{HashMap, VecDeque};
use uvbridge_abi::{ChartOptions, ChartType};

/// Normals closer than this (cosine) count as coplanar.
const PLANAR_COSINE: f32 = 0.9999;

/// One computed chart, in world units.
#[derive(Clone, Debug)]
pub struct ChartPlan {
    /// Index of the owning mesh.
    pub mesh: u32,
    /// Face indices into the source mesh, in growth order.
    pub faces: Vec<u32>,
    /// Material shared by every face.
    pub material: u32,
    /// Parameterization used.
    pub chart_type: ChartType,
    /// Source vertices used by the chart, in first-use order.
    pub vertices: Vec<u32>,
    /// Projected coordinate of each entry in `vertices`.
    pub coords: Vec<[f32; 2]>,
    /// Lower corner of the projected bounds.
    pub min: [f32; 2],
    /// Upper corner of the projected bounds.
    pub max: [f32; 2],
}

impl ChartPlan {
    /// Width and height of the projected bounds.
    #[inline]
    #[must_use]
    pub fn extent(&self) -> [f32; 2] {
        [self.max[0] - self.min[0], self.max[1] - self.min[1]]
    }

    /// Area of the projected bounds.
    #[inline]
    #[must_use]
    pub fn bounds_area(&self) -> f32 {
        let [w, h] = self.extent();
        w * h
    }
}

/// Grouping key of a face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct FaceKey {
    material: u32,
    /// Signed dominant axis, 0..6, or 6 for UV-driven charts.
    axis: u8,
}

const UV_AXIS: u8 = 6;

fn dominant_axis(n: [f32; 3]) -> u8 {
    let abs = [n[0].abs(), n[1].abs(), n[2].abs()];
    let axis = if abs[0] > abs[1] && abs[0] > abs[2] {
        0
    } else if abs[1] > abs[2] {
        1
    } else {
        2
    };
    let negative = n[axis] < 0.0;
    // `axis` is 0..3.
    #[allow(clippy::cast_possible_truncation)]
    let axis = axis as u8;
    axis * 2 + u8::from(negative)
}

fn project(p: [f32; 3], axis: u8) -> [f32; 2] {
    let a = usize::from(axis / 2);
    let u = p[(a + 1) % 3];
    let v = p[(a + 2) % 3];
    // Mirror negative-facing charts so their winding stays counter-clockwise.
    if axis % 2 == 1 {
        [v, u]
    } else {
        [u, v]
    }
}

fn normalize(n: [f32; 3]) -> Option<[f32; 3]> {
    let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
    (len > 0.0).then(|| [n[0] / len, n[1] / len, n[2] / len])
}

/// Computes the charts of every mesh, in mesh order.
#[must_use]
pub fn compute_charts(meshes: &[SourceMesh], options: &ChartOptions) -> Vec<ChartPlan> {
    let mut charts = Vec::new();
    for (index, mesh) in meshes.iter().enumerate() {
        let index = u32::try_from(index).unwrap_or(u32::MAX);
        charts.extend(mesh_charts(index, mesh, options));
    }
    tracing::debug!("computed {} charts over {} meshes", charts.len(), meshes.len());
    charts
}

fn mesh_charts(mesh_index: u32, mesh: &SourceMesh, options: &ChartOptions) -> Vec<ChartPlan> {
    let use_uvs = mesh.kind == MeshKind::Uv || (options.use_input_mesh_uvs && mesh.uvs.is_some());
    let face_count = mesh.faces.len();

    let normals: Vec<[f32; 3]> = (0..face_count).map(|f| mesh.face_normal(f)).collect();
    let keys: Vec<FaceKey> = (0..face_count)
        .map(|f| FaceKey {
            material: mesh.materials[f],
            axis: if use_uvs { UV_AXIS } else { dominant_axis(normals[f]) },
        })
        .collect();

    let mut vertex_faces: Vec<Vec<u32>> = vec![Vec::new(); mesh.vertex_count()];
    for f in 0..face_count {
        for &v in mesh.face_corners(f) {
            vertex_faces[v as usize].push(u32::try_from(f).unwrap_or(u32::MAX));
        }
    }

    let mut assigned = vec![false; face_count];
    let mut charts = Vec::new();
    let mut queue = VecDeque::new();

    for seed in 0..face_count {
        if assigned[seed] || mesh.ignored[seed] {
            continue;
        }
        assigned[seed] = true;
        queue.push_back(seed);

        let key = keys[seed];
        let mut faces = Vec::new();
        let mut area = 0.0f32;

        while let Some(face) = queue.pop_front() {
            area += mesh.face_area(face);
            faces.push(u32::try_from(face).unwrap_or(u32::MAX));

            for &v in mesh.face_corners(face) {
                for &next in &vertex_faces[v as usize] {
                    let next = next as usize;
                    if assigned[next] || mesh.ignored[next] || keys[next] != key {
                        continue;
                    }
                    if options.max_chart_area > 0.0
                        && area + mesh.face_area(next) > options.max_chart_area
                    {
                        continue;
                    }
                    assigned[next] = true;
                    queue.push_back(next);
                }
            }
        }

        charts.push(flatten(mesh_index, mesh, faces, key, &normals, use_uvs));
    }
    charts
}

fn flatten(
    mesh_index: u32,
    mesh: &SourceMesh,
    faces: Vec<u32>,
    key: FaceKey,
    normals: &[[f32; 3]],
    use_uvs: bool,
) -> ChartPlan {
    let mut local: HashMap<u32, usize> = HashMap::new();
    let mut vertices = Vec::new();
    let mut coords = Vec::new();

    for &face in &faces {
        for &v in mesh.face_corners(face as usize) {
            local.entry(v).or_insert_with(|| {
                vertices.push(v);
                let coord = match (&mesh.uvs, use_uvs) {
                    (Some(uvs), true) => uvs[v as usize],
                    _ => project(mesh.positions[v as usize], key.axis),
                };
                coords.push(coord);
                vertices.len() - 1
            });
        }
    }

    let mut min = [f32::INFINITY; 2];
    let mut max = [f32::NEG_INFINITY; 2];
    for c in &coords {
        for k in 0..2 {
            min[k] = min[k].min(c[k]);
            max[k] = max[k].max(c[k]);
        }
    }

    let reference = normalize(normals[faces[0] as usize]);
    let planar = faces.iter().all(|&f| match (reference, normalize(normals[f as usize])) {
        (Some(r), Some(n)) => r[0] * n[0] + r[1] * n[1] + r[2] * n[2] >= PLANAR_COSINE,
        _ => true,
    });
    let chart_type = if use_uvs || planar { ChartType::Planar } else { ChartType::Ortho };

    ChartPlan {
        mesh: mesh_index,
        material: key.material,
        faces,
        chart_type,
        vertices,
        coords,
        min,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Face;

    fn triangles(positions: Vec<[f32; 3]>, corners: Vec<u32>) -> SourceMesh {
        let face_count = corners.len() / 3;
        SourceMesh {
            kind: MeshKind::Geometry,
            positions,
            uvs: None,
            faces: (0..face_count as u32).map(|f| Face { first: f * 3, len: 3 }).collect(),
            corners,
            materials: vec![0; face_count],
            ignored: vec![false; face_count],
        }
    }

    fn quad() -> SourceMesh {
        triangles(
            vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [2.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn test_connected_quad_is_one_planar_chart() {
        let charts = compute_charts(&[quad()], &ChartOptions::default());
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].faces, vec![0, 1]);
        assert_eq!(charts[0].chart_type, ChartType::Planar);
        assert_eq!(charts[0].vertices.len(), 4);
        assert_eq!(charts[0].extent(), [2.0, 1.0]);
    }

    #[test]
    fn test_materials_split_charts() {
        let mut mesh = quad();
        mesh.materials = vec![0, 1];
        let charts = compute_charts(&[mesh], &ChartOptions::default());
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[1].material, 1);
    }

    #[test]
    fn test_ignored_faces_have_no_chart() {
        let mut mesh = quad();
        mesh.ignored = vec![true, false];
        let charts = compute_charts(&[mesh], &ChartOptions::default());
        assert_eq!(charts.len(), 1);
        assert_eq!(charts[0].faces, vec![1]);
    }

    #[test]
    fn test_max_chart_area_limits_growth() {
        let options = ChartOptions { max_chart_area: 1.5, ..ChartOptions::default() };
        let charts = compute_charts(&[quad()], &options);
        assert_eq!(charts.len(), 2);
    }

    #[test]
    fn test_folded_faces_split_by_axis() {
        // Floor triangle and a wall triangle sharing an edge.
        let mesh = triangles(
            vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            vec![0, 1, 2, 0, 3, 1],
        );
        let charts = compute_charts(&[mesh], &ChartOptions::default());
        assert_eq!(charts.len(), 2);
        assert!(charts.iter().all(|c| c.faces.len() == 1));
    }

    #[test]
    fn test_input_uvs_drive_projection() {
        let mut mesh = quad();
        mesh.uvs = Some(vec![[0.0, 0.0], [0.5, 0.0], [0.5, 0.5], [0.0, 0.5]]);
        let options = ChartOptions { use_input_mesh_uvs: true, ..ChartOptions::default() };
        let charts = compute_charts(&[mesh], &options);
        assert_eq!(charts[0].extent(), [0.5, 0.5]);
    }
}
