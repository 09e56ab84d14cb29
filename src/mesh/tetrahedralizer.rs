use std::collections::{HashMap, HashSet};

use crate::error::{BonkError, Result};
use crate::geometry::delaunay::Delaunay3;
use crate::types::{Vertex3, VertexIdx};

use super::surface::SurfaceMesh;

/// A direction unlikely to graze an axis-aligned mesh edge or vertex exactly.
const RAY_DIR: Vertex3 = [0.9153, 0.2871, 0.2791];

/// A volumetric tetrahedral mesh fitted inside a [`SurfaceMesh`], carrying both
/// the full cell complex the modal solver assembles matrices over and a
/// deduplicated boundary-facet mesh suitable for client-side rendering.
pub struct TetComplex {
    /// Vertex positions, indexed by the local vertex index used in `cells`.
    pub vertices: Vec<Vertex3>,
    /// Tetrahedral cells, as local vertex index quadruples.
    pub cells: Vec<[VertexIdx; 4]>,
    /// Boundary triangles, as indices into the deduplicated `three_to_local`
    /// vertex list (not into `vertices`).
    pub boundary_faces: Vec<[usize; 3]>,
    /// Maps a boundary-mesh ("three") vertex index back to its local index.
    pub three_to_local: Vec<VertexIdx>,
}

impl TetComplex {
    pub const fn vert_count(&self) -> usize {
        self.vertices.len()
    }
}

/// Builds a [`TetComplex`] from a repaired [`SurfaceMesh`] by Delaunay
/// refinement: tetrahedralize the boundary vertices, discard cells outside
/// the surface, then insert circumcenters of oversized or sliver cells until
/// every interior cell meets the size and quality criteria (or the iteration
/// budget runs out).
pub struct Tetrahedralizer {
    pub facet_size: f64,
    pub cell_size: f64,
    pub cell_radius_edge_ratio: f64,
    pub max_refine_iters: usize,
}

impl Tetrahedralizer {
    /// Derives size criteria from the mesh's bounding-box diagonal, mirroring
    /// a `facet_size = cell_size = 0.05 * diagonal` rule of thumb.
    pub fn for_mesh(mesh: &SurfaceMesh) -> Self {
        let diag = Self::bounding_diagonal(mesh);
        Self {
            facet_size: 0.05 * diag,
            cell_size: 0.05 * diag,
            cell_radius_edge_ratio: 2.0,
            max_refine_iters: 64,
        }
    }

    fn bounding_diagonal(mesh: &SurfaceMesh) -> f64 {
        let mut lo = [f64::MAX; 3];
        let mut hi = [f64::MIN; 3];
        for v in &mesh.vertices {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(v[axis]);
                hi[axis] = hi[axis].max(v[axis]);
            }
        }
        ((hi[0] - lo[0]).powi(2) + (hi[1] - lo[1]).powi(2) + (hi[2] - lo[2]).powi(2)).sqrt()
    }

    pub fn tetrahedralize(&self, mesh: &SurfaceMesh) -> Result<TetComplex> {
        let mut delaunay = Delaunay3::new_with_vert_capacity(None, mesh.vertices.len());
        delaunay
            .insert_vertices(&mesh.vertices, None, true)
            .map_err(|e| BonkError::ModalSetupFailure(e.to_string()))?;

        let mut skip: HashSet<[VertexIdx; 4]> = HashSet::new();
        for _ in 0..self.max_refine_iters {
            let cells = Self::casual_cells(&delaunay);
            let inside: Vec<[VertexIdx; 4]> = cells
                .into_iter()
                .filter(|c| self.is_inside(&delaunay, mesh, c))
                .collect();

            let mut worst: Option<([VertexIdx; 4], f64)> = None;
            for cell in &inside {
                let mut key = *cell;
                key.sort_unstable();
                if skip.contains(&key) {
                    continue;
                }
                let ratio = self.quality_deficit(&delaunay, cell);
                if ratio > 1.0 && worst.is_none_or(|(_, best)| ratio > best) {
                    worst = Some((*cell, ratio));
                }
            }

            let Some((cell, _)) = worst else {
                break;
            };

            let Some(center) = Self::circumcenter(&delaunay, &cell) else {
                let mut key = cell;
                key.sort_unstable();
                skip.insert(key);
                continue;
            };

            if !Self::point_in_mesh(mesh, center) {
                let mut key = cell;
                key.sort_unstable();
                skip.insert(key);
                continue;
            }

            delaunay
                .insert_vertex(center, None)
                .map_err(|e| BonkError::ModalSetupFailure(e.to_string()))?;
        }

        let vertices = delaunay.vertices().clone();
        let cells: Vec<[VertexIdx; 4]> = Self::casual_cells(&delaunay)
            .into_iter()
            .filter(|c| self.is_inside(&delaunay, mesh, c))
            .collect();

        if cells.is_empty() {
            return Err(BonkError::ModalSetupFailure(
                "no interior tetrahedra produced".into(),
            ));
        }

        let (boundary_faces, three_to_local) = Self::extract_boundary(&cells);

        Ok(TetComplex {
            vertices,
            cells,
            boundary_faces,
            three_to_local,
        })
    }

    fn casual_cells(delaunay: &Delaunay3) -> Vec<[VertexIdx; 4]> {
        (0..delaunay.num_tets())
            .filter_map(|idx| {
                let tet = delaunay.tds().get_tet(idx).ok()?;
                if tet.is_conceptual() {
                    return None;
                }
                let nodes = tet.nodes();
                Some([
                    nodes[0].idx()?,
                    nodes[1].idx()?,
                    nodes[2].idx()?,
                    nodes[3].idx()?,
                ])
            })
            .collect()
    }

    fn is_inside(&self, delaunay: &Delaunay3, mesh: &SurfaceMesh, cell: &[VertexIdx; 4]) -> bool {
        let verts = delaunay.vertices();
        let centroid = Self::centroid(cell.map(|i| verts[i]));
        Self::point_in_mesh(mesh, centroid)
    }

    fn centroid(pts: [Vertex3; 4]) -> Vertex3 {
        let mut c = [0.0; 3];
        for p in &pts {
            for axis in 0..3 {
                c[axis] += p[axis] / 4.0;
            }
        }
        c
    }

    /// Ratio of (actual quality) to (acceptable quality); values above 1.0
    /// mean the cell needs refining, by either a radius-edge-ratio or a
    /// plain size violation.
    fn quality_deficit(&self, delaunay: &Delaunay3, cell: &[VertexIdx; 4]) -> f64 {
        let verts = delaunay.vertices();
        let pts = cell.map(|i| verts[i]);

        let edges = [
            (0, 1),
            (0, 2),
            (0, 3),
            (1, 2),
            (1, 3),
            (2, 3),
        ];
        let min_edge = edges
            .iter()
            .map(|&(a, b)| Self::dist(pts[a], pts[b]))
            .fold(f64::MAX, f64::min);

        if min_edge <= 0.0 {
            return 0.0;
        }

        let radius_ratio = Self::circumcenter(delaunay, cell)
            .map(|c| Self::dist(c, pts[0]) / min_edge)
            .unwrap_or(0.0)
            / self.cell_radius_edge_ratio;

        let size_ratio = min_edge / self.cell_size;

        radius_ratio.max(size_ratio)
    }

    fn dist(a: Vertex3, b: Vertex3) -> f64 {
        ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2) + (a[2] - b[2]).powi(2)).sqrt()
    }

    /// Solves for the point equidistant from all four vertices of `cell` by
    /// intersecting the three perpendicular-bisector planes through vertex 0.
    fn circumcenter(delaunay: &Delaunay3, cell: &[VertexIdx; 4]) -> Option<Vertex3> {
        let verts = delaunay.vertices();
        let p = cell.map(|i| verts[i]);

        let a = nalgebra::Matrix3::from_rows(&[
            nalgebra::RowVector3::new(
                2.0 * (p[1][0] - p[0][0]),
                2.0 * (p[1][1] - p[0][1]),
                2.0 * (p[1][2] - p[0][2]),
            ),
            nalgebra::RowVector3::new(
                2.0 * (p[2][0] - p[0][0]),
                2.0 * (p[2][1] - p[0][1]),
                2.0 * (p[2][2] - p[0][2]),
            ),
            nalgebra::RowVector3::new(
                2.0 * (p[3][0] - p[0][0]),
                2.0 * (p[3][1] - p[0][1]),
                2.0 * (p[3][2] - p[0][2]),
            ),
        ]);

        let sq = |v: Vertex3| v[0] * v[0] + v[1] * v[1] + v[2] * v[2];
        let b = nalgebra::Vector3::new(
            sq(p[1]) - sq(p[0]),
            sq(p[2]) - sq(p[0]),
            sq(p[3]) - sq(p[0]),
        );

        let inv = a.try_inverse()?;
        let c = inv * b;
        Some([c[0], c[1], c[2]])
    }

    /// Parity ray cast against the surface mesh's triangles.
    fn point_in_mesh(mesh: &SurfaceMesh, point: Vertex3) -> bool {
        let mut crossings = 0usize;
        for &[a, b, c] in &mesh.faces {
            if Self::ray_crosses_triangle(
                point,
                RAY_DIR,
                mesh.vertices[a],
                mesh.vertices[b],
                mesh.vertices[c],
            ) {
                crossings += 1;
            }
        }
        crossings % 2 == 1
    }

    /// Moller-Trumbore ray-triangle intersection, forward-only along `dir`.
    fn ray_crosses_triangle(
        origin: Vertex3,
        dir: Vertex3,
        v0: Vertex3,
        v1: Vertex3,
        v2: Vertex3,
    ) -> bool {
        const EPS: f64 = 1e-12;
        let sub = |a: Vertex3, b: Vertex3| [a[0] - b[0], a[1] - b[1], a[2] - b[2]];
        let cross = |a: Vertex3, b: Vertex3| {
            [
                a[1] * b[2] - a[2] * b[1],
                a[2] * b[0] - a[0] * b[2],
                a[0] * b[1] - a[1] * b[0],
            ]
        };
        let dot = |a: Vertex3, b: Vertex3| a[0] * b[0] + a[1] * b[1] + a[2] * b[2];

        let edge1 = sub(v1, v0);
        let edge2 = sub(v2, v0);
        let h = cross(dir, edge2);
        let det = dot(edge1, h);
        if det.abs() < EPS {
            return false;
        }
        let inv_det = 1.0 / det;
        let s = sub(origin, v0);
        let u = inv_det * dot(s, h);
        if !(0.0..=1.0).contains(&u) {
            return false;
        }
        let q = cross(s, edge1);
        let v = inv_det * dot(dir, q);
        if v < 0.0 || u + v > 1.0 {
            return false;
        }
        let t = inv_det * dot(edge2, q);
        t > EPS
    }

    /// Extracts boundary triangles (faces shared by exactly one cell) with a
    /// consistent outward winding, and compacts the touched vertices into a
    /// dense `three_to_local` index space for client rendering.
    fn extract_boundary(cells: &[[VertexIdx; 4]]) -> (Vec<[usize; 3]>, Vec<VertexIdx>) {
        let mut counts: HashMap<[VertexIdx; 3], u32> = HashMap::new();
        let mut oriented: HashMap<[VertexIdx; 3], [VertexIdx; 3]> = HashMap::new();

        for cell in cells {
            for face in Self::cell_faces(*cell) {
                let mut key = face;
                key.sort_unstable();
                *counts.entry(key).or_insert(0) += 1;
                oriented.entry(key).or_insert(face);
            }
        }

        let mut three_to_local = Vec::new();
        let mut local_to_three: HashMap<VertexIdx, usize> = HashMap::new();
        let mut boundary_faces = Vec::new();

        for (key, count) in &counts {
            if *count != 1 {
                continue;
            }
            let face = oriented[key];
            let mut three_face = [0usize; 3];
            for (slot, &local) in three_face.iter_mut().zip(face.iter()) {
                *slot = *local_to_three.entry(local).or_insert_with(|| {
                    three_to_local.push(local);
                    three_to_local.len() - 1
                });
            }
            boundary_faces.push(three_face);
        }

        (boundary_faces, three_to_local)
    }

    /// The four triangular faces of a tetrahedron, each opposite one vertex,
    /// oriented outward by construction (flip the two non-apex-adjacent
    /// vertices when the opposite vertex's local index is odd).
    fn cell_faces(cell: [VertexIdx; 4]) -> [[VertexIdx; 3]; 4] {
        let mut faces = [[0usize; 3]; 4];
        for (opp, face) in faces.iter_mut().enumerate() {
            let i0 = (opp + 1) & 3;
            let i1 = (opp + 2) & 3;
            let i2 = (opp + 3) & 3;
            *face = [cell[i0], cell[i1], cell[i2]];
            if opp % 2 == 1 {
                face.swap(0, 1);
            }
        }
        faces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tetrahedron_mesh() -> SurfaceMesh {
        let vertices = vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
        ];
        let faces = vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]];
        SurfaceMesh::new(vertices, faces)
    }

    #[test]
    fn point_in_mesh_finds_centroid_inside() {
        let mesh = tetrahedron_mesh();
        assert!(Tetrahedralizer::point_in_mesh(&mesh, [0.2, 0.2, 0.2]));
        assert!(!Tetrahedralizer::point_in_mesh(&mesh, [5.0, 5.0, 5.0]));
    }

    #[test]
    fn cell_faces_are_four_distinct_triangles() {
        let faces = Tetrahedralizer::cell_faces([0, 1, 2, 3]);
        let mut flat: Vec<VertexIdx> = faces.iter().flatten().copied().collect();
        flat.sort_unstable();
        flat.dedup();
        assert_eq!(flat, vec![0, 1, 2, 3]);
    }

    #[test]
    fn tetrahedralize_single_tet_mesh_yields_closed_boundary() {
        let mesh = tetrahedron_mesh();
        let tetra = Tetrahedralizer::for_mesh(&mesh)
            .tetrahedralize(&mesh)
            .unwrap();
        assert!(!tetra.cells.is_empty());
        assert!(!tetra.boundary_faces.is_empty());
        assert!(tetra.three_to_local.len() >= 4);
    }
}
