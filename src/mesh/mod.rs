//! Mesh ingestion, repair, and tetrahedralization.

mod io;
mod surface;
mod tetrahedralizer;

pub use surface::{MeshPreprocessor, SurfaceMesh, SURFACE_MESH_MAX_VERTICES};
pub use tetrahedralizer::{TetComplex, Tetrahedralizer};
