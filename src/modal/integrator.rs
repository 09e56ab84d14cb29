//! Impulse projection and time-domain mode summation.

use nalgebra::DVector;

use crate::error::{BonkError, Result};

use super::solver::ModalContext;

/// Projects impulses onto a modal basis and steps it forward in time,
/// producing decaying-sinusoid samples.
pub struct ModalIntegrator;

impl ModalIntegrator {
    /// Excites `ctx` with an impulse: `impulse_points` (in compact
    /// rendering-space) each carry a `weights` entry, and the impulse is
    /// applied along `direction`. Projects the resulting force vector onto
    /// the modal basis, overwriting the current amplitudes.
    pub fn excite(
        ctx: &mut ModalContext,
        impulse_points: &[usize],
        weights: &[f64],
        direction: [f64; 3],
    ) -> Result<()> {
        if impulse_points.len() != weights.len() {
            return Err(BonkError::BadInvocation(
                "impulse_points and weights must have equal length".into(),
            ));
        }

        let dof = ctx.modes.nrows();
        let mut force = DVector::zeros(dof);

        for (&three_idx, &weight) in impulse_points.iter().zip(weights) {
            let Some(&u) = ctx.three_to_local.get(three_idx) else {
                return Err(BonkError::BadInvocation(format!(
                    "impulse point {three_idx} out of range"
                )));
            };
            for a in 0..3 {
                force[3 * u + a] = direction[a] * weight;
            }
        }

        let amp = ctx.modes.transpose() * force;
        ctx.amp = amp.iter().copied().collect();

        Ok(())
    }

    /// Produces `count` successive samples, advancing every mode's phase and
    /// amplitude. The samples are always returned in full; the caller should
    /// additionally check [`ModalContext::is_extinct`] (true once every
    /// mode's amplitude has decayed to clamped zero) to decide whether to
    /// keep stepping.
    pub fn step_block(ctx: &mut ModalContext, count: usize) -> Vec<f64> {
        let mut samples = Vec::with_capacity(count);

        for _ in 0..count {
            let mut sample = 0.0;
            for i in 0..ctx.n_modes() {
                sample += ctx.amp[i] * ctx.phase[i].sin();
                ctx.phase[i] += ctx.phase_step[i];
                ctx.amp[i] *= ctx.damp[i];
                if ctx.amp[i].abs() <= 1e-8 {
                    ctx.amp[i] = 0.0;
                }
            }
            samples.push(sample);
        }

        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn trivial_ctx() -> ModalContext {
        ModalContext {
            freq: vec![100.0],
            phase_step: vec![0.1],
            phase: vec![0.0],
            amp: vec![0.0],
            damp: vec![0.5],
            modes: DMatrix::from_element(3, 1, 1.0),
            density: 1.0,
            dt: 1.0 / 44100.0,
            three_to_local: vec![0],
        }
    }

    #[test]
    fn excite_rejects_mismatched_lengths() {
        let mut ctx = trivial_ctx();
        let err = ModalIntegrator::excite(&mut ctx, &[0, 0], &[1.0], [0.0, 0.0, 1.0]).unwrap_err();
        assert!(matches!(err, BonkError::BadInvocation(_)));
    }

    #[test]
    fn excite_then_step_produces_decaying_samples() {
        let mut ctx = trivial_ctx();
        ModalIntegrator::excite(&mut ctx, &[0], &[1.0], [0.0, 0.0, 1.0]).unwrap();
        assert!(ctx.amp[0].abs() > 0.0);

        let samples = ModalIntegrator::step_block(&mut ctx, 4);
        assert_eq!(samples.len(), 4);
    }

    #[test]
    fn step_block_clamps_and_signals_extinction() {
        let mut ctx = trivial_ctx();
        ctx.amp = vec![1e-9];
        ModalIntegrator::step_block(&mut ctx, 1);
        assert!(ctx.is_extinct());
    }
}
