//! The local, synchronous facade a host embedding drives directly: load a
//! mesh, prepare it for rendering, build a modal context, excite it, and
//! pull samples back out. Distinct from the HTTP layer in `crate::http`,
//! which only drives the scalar streaming engine.

use std::path::Path;

use crate::error::{BonkError, Result};
use crate::mesh::{MeshPreprocessor, TetComplex, Tetrahedralizer};
use crate::modal::{ModalContext, ModalIntegrator, ModalSolver};
use crate::types::Vertex3;

/// Holds the pipeline state for one object: its tetrahedralization (once
/// `load_mesh` succeeds) and its modal context (once `init_modal_context`
/// succeeds). Operations that require a prerequisite step that hasn't run
/// yet fail with [`BonkError::BadInvocation`].
#[derive(Default)]
pub struct Modal {
    tet: Option<TetComplex>,
    ctx: Option<ModalContext>,
    results: Vec<f64>,
}

impl Modal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads, repairs, and tetrahedralizes a mesh file. Discards any
    /// previously built modal context, since it referred to the old mesh.
    pub fn load_mesh(&mut self, path: &Path) -> Result<()> {
        let surface = MeshPreprocessor::load(path)?;
        let repaired = MeshPreprocessor::repair(surface)?;
        let tetrahedralizer = Tetrahedralizer::for_mesh(&repaired);
        let tet = tetrahedralizer.tetrahedralize(&repaired)?;

        self.tet = Some(tet);
        self.ctx = None;
        Ok(())
    }

    /// Produces an interleaved vertex array and a triangle index list for
    /// client-side rendering, in the same compact "three index" space
    /// `bonk`'s impulse points are given in.
    pub fn prepare_surface(&self) -> Result<(Vec<f64>, Vec<usize>)> {
        let tet = self.require_tet()?;

        let mut vertices = Vec::with_capacity(tet.three_to_local.len() * 3);
        for &local in &tet.three_to_local {
            let v: Vertex3 = tet.vertices[local];
            vertices.extend_from_slice(&v);
        }

        let indices: Vec<usize> = tet.boundary_faces.iter().flatten().copied().collect();
        Ok((vertices, indices))
    }

    /// Assembles mass/stiffness matrices and solves for the object's modes.
    pub fn init_modal_context(
        &mut self,
        density: f64,
        k_spring: f64,
        dt: f64,
        damping: f64,
        freq_damping: f64,
    ) -> Result<()> {
        let tet = self.require_tet()?;
        let ctx = ModalSolver::build(tet, density, k_spring, dt, damping, freq_damping)?;
        self.ctx = Some(ctx);
        Ok(())
    }

    /// Projects an impulse (given as independent index/weight/direction
    /// arguments — no argument aliasing) onto the modal basis.
    pub fn bonk(&mut self, indices: &[usize], weights: &[f64], direction: [f64; 3]) -> Result<()> {
        let ctx = self.require_ctx_mut()?;
        ModalIntegrator::excite(ctx, indices, weights, direction)
    }

    /// Produces `count` samples. Returns `ModalCompleteExtinction` once every
    /// mode has fully decayed; `get_results` still returns the samples
    /// produced on the call that crossed into extinction.
    pub fn run_modal(&mut self, count: usize) -> Result<()> {
        let ctx = self.require_ctx_mut()?;
        self.results = ModalIntegrator::step_block(ctx, count);

        if ctx.is_extinct() {
            return Err(BonkError::ModalCompleteExtinction);
        }
        Ok(())
    }

    pub fn get_results(&self) -> &[f64] {
        &self.results
    }

    fn require_tet(&self) -> Result<&TetComplex> {
        self.tet
            .as_ref()
            .ok_or_else(|| BonkError::BadInvocation("loadMesh must run first".into()))
    }

    fn require_ctx_mut(&mut self) -> Result<&mut ModalContext> {
        self.ctx
            .as_mut()
            .ok_or_else(|| BonkError::BadInvocation("initModalContext must run first".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_surface_before_load_mesh_is_bad_invocation() {
        let modal = Modal::new();
        let err = modal.prepare_surface().unwrap_err();
        assert!(matches!(err, BonkError::BadInvocation(_)));
    }

    #[test]
    fn bonk_before_init_modal_context_is_bad_invocation() {
        let mut modal = Modal::new();
        let err = modal.bonk(&[0], &[1.0], [0.0, 0.0, 1.0]).unwrap_err();
        assert!(matches!(err, BonkError::BadInvocation(_)));
    }
}
