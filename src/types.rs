//! Type aliases for geometric data and data-structure indices.

pub type Vertex3 = [f64; 3];
pub type Triangle3 = [Vertex3; 3];
pub type Tetrahedron3 = [Vertex3; 4];

pub type VertexIdx = usize;

// Type aliases for data structure indices, so call sites can see at a glance
// what a bare `usize` means.
pub type HedgeIteratorIdx = usize;
pub type TetIteratorIdx = usize;
