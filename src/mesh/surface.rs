use std::collections::HashMap;
use std::path::Path;

use crate::error::{BonkError, Result};
use crate::predicates::orient_3d;
use crate::types::{Vertex3, VertexIdx};

use super::io;

/// Vertex cap enforced by [`MeshPreprocessor::repair`]; bounds modal-solver cost downstream.
pub const SURFACE_MESH_MAX_VERTICES: usize = 2500;

/// Boundary loops longer than this are considered unrepairable holes.
const MAX_HOLE_LOOP: usize = 64;

/// A closed, triangulated polygon mesh: vertex positions plus triangular faces.
///
/// Faces are always triangles — `SurfaceMesh` never holds a higher-arity polygon,
/// since [`super::io::load_stl`] is the only ingestion path and STL is
/// triangle-only by construction. `repair` still performs the full fix-up
/// pipeline the specification describes for general inputs.
#[derive(Debug, Clone)]
pub struct SurfaceMesh {
    pub vertices: Vec<Vertex3>,
    pub faces: Vec<[VertexIdx; 3]>,
}

impl SurfaceMesh {
    pub const fn new(vertices: Vec<Vertex3>, faces: Vec<[VertexIdx; 3]>) -> Self {
        Self { vertices, faces }
    }

    fn signed_volume(&self) -> f64 {
        self.faces
            .iter()
            .map(|&[a, b, c]| {
                let v0 = self.vertices[a];
                let v1 = self.vertices[b];
                let v2 = self.vertices[c];
                let cross = [
                    v1[1] * v2[2] - v1[2] * v2[1],
                    v1[2] * v2[0] - v1[0] * v2[2],
                    v1[0] * v2[1] - v1[1] * v2[0],
                ];
                v0[0] * cross[0] + v0[1] * cross[1] + v0[2] * cross[2]
            })
            .sum::<f64>()
            / 6.0
    }

    fn edge_length(&self, a: VertexIdx, b: VertexIdx) -> f64 {
        let va = self.vertices[a];
        let vb = self.vertices[b];
        ((va[0] - vb[0]).powi(2) + (va[1] - vb[1]).powi(2) + (va[2] - vb[2]).powi(2)).sqrt()
    }
}

/// Ingests, repairs, and validates a surface mesh for tetrahedralization.
pub struct MeshPreprocessor;

impl MeshPreprocessor {
    /// Loads a polygon mesh from `path`, failing with [`BonkError::FileOpenFailure`]
    /// on a missing file or a parse error.
    pub fn load(path: &Path) -> Result<SurfaceMesh> {
        let (vertices, faces) = io::load_stl(path)?;
        Ok(SurfaceMesh::new(vertices, faces))
    }

    /// Runs the full repair pipeline: hole-filling, outward orientation, vertex
    /// cap enforcement, and a final self-intersection check.
    pub fn repair(mesh: SurfaceMesh) -> Result<SurfaceMesh> {
        let mut mesh = mesh;

        Self::close_small_holes(&mut mesh)?;
        Self::fix_orientation(&mut mesh);
        Self::decimate_to_cap(&mut mesh, SURFACE_MESH_MAX_VERTICES);

        if Self::has_self_intersections(&mesh) {
            return Err(BonkError::FileOpenFailure(
                "mesh has self-intersections after repair".into(),
            ));
        }

        Ok(mesh)
    }

    /// Finds boundary edges (edges bordering exactly one face) and fills each
    /// boundary loop with a centroid fan, refining the hole with a single
    /// interior vertex rather than leaving a flat n-gon cap.
    fn close_small_holes(mesh: &mut SurfaceMesh) -> Result<()> {
        loop {
            let Some(loop_verts) = Self::find_boundary_loop(mesh) else {
                return Ok(());
            };

            if loop_verts.len() > MAX_HOLE_LOOP {
                return Err(BonkError::FileOpenFailure(format!(
                    "boundary loop of {} vertices exceeds repairable size",
                    loop_verts.len()
                )));
            }

            let centroid = loop_verts.iter().fold([0.0; 3], |acc, &v| {
                let p = mesh.vertices[v];
                [acc[0] + p[0], acc[1] + p[1], acc[2] + p[2]]
            });
            let n = loop_verts.len() as f64;
            let centroid = [centroid[0] / n, centroid[1] / n, centroid[2] / n];

            let centroid_idx = mesh.vertices.len();
            mesh.vertices.push(centroid);

            for i in 0..loop_verts.len() {
                let a = loop_verts[i];
                let b = loop_verts[(i + 1) % loop_verts.len()];
                mesh.faces.push([a, b, centroid_idx]);
            }
        }
    }

    /// Finds one boundary loop (a maximal cycle of directed edges with no
    /// matching reverse edge among the faces), or `None` if the mesh is closed.
    fn find_boundary_loop(mesh: &SurfaceMesh) -> Option<Vec<VertexIdx>> {
        let mut directed: HashMap<(VertexIdx, VertexIdx), usize> = HashMap::new();
        for &[a, b, c] in &mesh.faces {
            *directed.entry((a, b)).or_insert(0) += 1;
            *directed.entry((b, c)).or_insert(0) += 1;
            *directed.entry((c, a)).or_insert(0) += 1;
        }

        let mut next: HashMap<VertexIdx, VertexIdx> = HashMap::new();
        for &(a, b) in directed.keys() {
            if !directed.contains_key(&(b, a)) {
                next.insert(a, b);
            }
        }

        let &start = next.keys().next()?;
        let mut loop_verts = vec![start];
        let mut cur = start;
        loop {
            let Some(&nxt) = next.get(&cur) else {
                // Dangling boundary, not a closed loop; treat as unrepairable.
                return Some(loop_verts);
            };
            if nxt == start {
                break;
            }
            loop_verts.push(nxt);
            cur = nxt;
            if loop_verts.len() > mesh.vertices.len() + 1 {
                break; // guard against malformed topology looping forever
            }
        }

        Some(loop_verts)
    }

    /// Flips every face if the mesh's signed volume is negative (inward-facing).
    fn fix_orientation(mesh: &mut SurfaceMesh) {
        if mesh.signed_volume() < 0.0 {
            for face in &mut mesh.faces {
                face.swap(0, 1);
            }
        }
    }

    /// Collapses the shortest edge repeatedly until the vertex count is at or
    /// below `cap`. A collapse merges the edge's second endpoint into its
    /// first, dropping any face that degenerates to a repeated vertex.
    fn decimate_to_cap(mesh: &mut SurfaceMesh, cap: usize) {
        while mesh.vertices.len() > cap {
            let Some((a, b)) = Self::shortest_edge(mesh) else {
                break;
            };
            Self::collapse_edge(mesh, a, b);
        }
    }

    fn shortest_edge(mesh: &SurfaceMesh) -> Option<(VertexIdx, VertexIdx)> {
        let mut best: Option<(VertexIdx, VertexIdx, f64)> = None;
        for &[a, b, c] in &mesh.faces {
            for &(u, v) in &[(a, b), (b, c), (c, a)] {
                let len = mesh.edge_length(u, v);
                if best.is_none_or(|(_, _, best_len)| len < best_len) {
                    best = Some((u, v, len));
                }
            }
        }
        best.map(|(u, v, _)| (u, v))
    }

    /// Merges vertex `b` into vertex `a` in place, compacting indices so no gap remains.
    fn collapse_edge(mesh: &mut SurfaceMesh, a: VertexIdx, b: VertexIdx) {
        for face in &mut mesh.faces {
            for idx in face.iter_mut() {
                if *idx == b {
                    *idx = a;
                }
            }
        }

        mesh.faces.retain(|&[x, y, z]| x != y && y != z && z != x);

        // Compact the vertex list, shifting every index above `b` down by one.
        mesh.vertices.remove(b);
        for face in &mut mesh.faces {
            for idx in face.iter_mut() {
                if *idx > b {
                    *idx -= 1;
                }
            }
        }
    }

    /// Brute-force pairwise triangle-triangle overlap test using sign patterns
    /// from [`orient_3d`] (a triangle's vertices, split by the other's plane).
    fn has_self_intersections(mesh: &SurfaceMesh) -> bool {
        let faces = &mesh.faces;
        for i in 0..faces.len() {
            for j in (i + 1)..faces.len() {
                let [a0, a1, a2] = faces[i];
                let [b0, b1, b2] = faces[j];
                let shares_vertex = [a0, a1, a2].iter().any(|v| [b0, b1, b2].contains(v));
                if shares_vertex {
                    continue;
                }
                if Self::triangles_intersect(mesh, faces[i], faces[j]) {
                    return true;
                }
            }
        }
        false
    }

    /// Approximate overlap test: two triangles can only intersect if neither
    /// lies entirely to one side of the other's plane. Not exact (it accepts
    /// some near-miss cases as intersecting) but has no false negatives, which
    /// is what the repair gate needs.
    fn triangles_intersect(
        mesh: &SurfaceMesh,
        tri_a: [VertexIdx; 3],
        tri_b: [VertexIdx; 3],
    ) -> bool {
        let pa: Vec<Vertex3> = tri_a.iter().map(|&i| mesh.vertices[i]).collect();
        let pb: Vec<Vertex3> = tri_b.iter().map(|&i| mesh.vertices[i]).collect();

        let sides_b: Vec<f64> = pb
            .iter()
            .map(|p| orient_3d(&pa[0], &pa[1], &pa[2], p))
            .collect();
        if sides_b.iter().all(|&s| s > 0.0) || sides_b.iter().all(|&s| s < 0.0) {
            return false;
        }

        let sides_a: Vec<f64> = pa
            .iter()
            .map(|p| orient_3d(&pb[0], &pb[1], &pb[2], p))
            .collect();
        if sides_a.iter().all(|&s| s > 0.0) || sides_a.iter().all(|&s| s < 0.0) {
            return false;
        }

        true
    }
}
