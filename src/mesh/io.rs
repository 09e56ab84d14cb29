//! STL loading for [`super::surface::MeshPreprocessor::load`].

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{BonkError, Result};
use crate::types::{Vertex3, VertexIdx};

/// Reads an STL file (ASCII or binary) into raw vertex/triangle arrays.
///
/// `stl_io` deduplicates nothing for us: each triangle carries its own three
/// vertex copies, so the caller is responsible for merging coincident vertices
/// if a shared-vertex topology is required downstream.
pub fn load_stl(path: &Path) -> Result<(Vec<Vertex3>, Vec<[VertexIdx; 3]>)> {
    let file = File::open(path)
        .map_err(|e| BonkError::FileOpenFailure(format!("{}: {e}", path.display())))?;
    let mut reader = BufReader::new(file);

    let stl = stl_io::read_stl(&mut reader)
        .map_err(|e| BonkError::FileOpenFailure(format!("{}: {e}", path.display())))?;

    let vertices: Vec<Vertex3> = stl
        .vertices
        .iter()
        .map(|v| [f64::from(v[0]), f64::from(v[1]), f64::from(v[2])])
        .collect();

    let faces: Vec<[VertexIdx; 3]> = stl
        .faces
        .iter()
        .map(|f| [f.vertices[0], f.vertices[1], f.vertices[2]])
        .collect();

    if faces.is_empty() {
        return Err(BonkError::FileOpenFailure(format!(
            "{}: mesh has no faces",
            path.display()
        )));
    }

    Ok((vertices, faces))
}
