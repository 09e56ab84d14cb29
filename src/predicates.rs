//! Geometric predicates abstraction.
//!
//! Backed by [geogram_predicates] (FFI to the geogram C++ library), which gives exact
//! orientation and in-sphere tests via symbolic perturbation (SOS) so degenerate
//! configurations never produce a spurious zero.

#![allow(non_snake_case)] // match geogram_predicates API (in_sphere_3d_SOS, orient_3dlifted_SOS)

use crate::types::Vertex3;
use geogram_predicates as gp;

#[inline]
pub fn orient_3d(a: &Vertex3, b: &Vertex3, c: &Vertex3, d: &Vertex3) -> f64 {
    let r = gp::orient_3d(a, b, c, d);
    if r > 0i16 {
        1.0
    } else if r < 0i16 {
        -1.0
    } else {
        0.0
    }
}

#[inline]
pub fn in_sphere_3d_SOS(a: &Vertex3, b: &Vertex3, c: &Vertex3, d: &Vertex3, p: &Vertex3) -> f64 {
    let r = gp::in_sphere_3d_SOS(a, b, c, d, p);
    if r > 0i16 {
        1.0
    } else if r < 0i16 {
        -1.0
    } else {
        0.0
    }
}
