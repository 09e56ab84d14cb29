//! DCEL-style tetrahedral data structure underlying [`super::delaunay::Delaunay3`].

pub mod half_tri_iterator;
pub mod hedge_iterator;
pub mod tet_data_structure;
pub mod tet_iterator;
