//! Mass/stiffness assembly and generalized-eigenproblem modal extraction.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

use crate::error::{BonkError, Result};
use crate::mesh::TetComplex;

use super::jnd;

/// Upper bound on the number of modes a [`ModalSolver`] will extract, mirroring
/// the original instrument's fixed mode budget.
pub const MODES: usize = 50;

/// Per-mode oscillator state plus the mode shapes needed to project impulses
/// onto the modal basis.
pub struct ModalContext {
    /// Natural frequency of each mode, in Hz.
    pub freq: Vec<f64>,
    /// Per-step phase increment (`freq * dt`, pre-baked into radians/step).
    pub phase_step: Vec<f64>,
    /// Current phase of each mode, in radians.
    pub phase: Vec<f64>,
    /// Current amplitude of each mode.
    pub amp: Vec<f64>,
    /// Per-step exponential damping factor, applied multiplicatively.
    pub damp: Vec<f64>,
    /// Mode shapes, `(3 * vert_count) x n_modes`, M-orthonormal up to solver tolerance.
    pub modes: DMatrix<f64>,
    /// Density the context was built with (persisted for introspection/reuse).
    pub density: f64,
    /// Physics timestep the context was built with.
    pub dt: f64,
    /// Maps a compact rendering-space vertex index to its dense tet-complex index.
    pub three_to_local: Vec<usize>,
}

impl ModalContext {
    pub fn n_modes(&self) -> usize {
        self.freq.len()
    }

    pub fn vert_count(&self) -> usize {
        self.modes.nrows() / 3
    }

    /// True once every mode's amplitude has decayed to (clamped) zero —
    /// normal end-of-sound, not a fault.
    pub fn is_extinct(&self) -> bool {
        self.amp.iter().all(|&a| a == 0.0)
    }
}

/// Builds a [`ModalContext`] for a tetrahedralized solid by assembling a
/// lumped mass matrix and a linear spring-network stiffness matrix, then
/// solving the generalized eigenproblem `Kφ = λMφ`.
pub struct ModalSolver;

impl ModalSolver {
    pub fn build(
        tet: &TetComplex,
        density: f64,
        k_spring: f64,
        dt: f64,
        damping: f64,
        freq_damping: f64,
    ) -> Result<ModalContext> {
        let vert_count = tet.vert_count();
        let dof = 3 * vert_count;

        let mut mass_diag = DVector::zeros(dof);
        let mut k = DMatrix::zeros(dof, dof);

        for cell in &tet.cells {
            let vol = Self::cell_volume(tet, cell).abs();
            let m = density * vol / 4.0;

            for &u in cell {
                for a in 0..3 {
                    mass_diag[3 * u + a] += m;
                }
            }

            for i in 0..4 {
                let u = cell[i];
                for &v in cell.iter().skip(i + 1) {
                    for a in 0..3 {
                        let ui = 3 * u + a;
                        let vi = 3 * v + a;
                        k[(ui, ui)] += k_spring;
                        k[(vi, vi)] += k_spring;
                        k[(ui, vi)] -= k_spring;
                        k[(vi, ui)] -= k_spring;
                    }
                }
            }
        }

        // M is diagonal (lumped); congruence-transform K by D^-1 = diag(1/sqrt(m_ii))
        // to turn the generalized problem Kφ=λMφ into a standard symmetric one.
        let inv_sqrt_mass: DVector<f64> = mass_diag.map(|m| if m > 0.0 { 1.0 / m.sqrt() } else { 0.0 });
        let mut a = k;
        for row in 0..dof {
            for col in 0..dof {
                a[(row, col)] *= inv_sqrt_mass[row] * inv_sqrt_mass[col];
            }
        }

        let eig = SymmetricEigen::new(a);

        let n_modes = MODES.min(vert_count).min(dof);
        if n_modes == 0 {
            return Err(BonkError::ModalSetupFailure(
                "no degrees of freedom to solve for".into(),
            ));
        }

        let mut order: Vec<usize> = (0..eig.eigenvalues.len()).collect();
        order.sort_by(|&i, &j| {
            eig.eigenvalues[i]
                .abs()
                .partial_cmp(&eig.eigenvalues[j].abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order.truncate(n_modes);

        let mut freqs: Vec<f64> = order
            .iter()
            .map(|&i| eig.eigenvalues[i].max(0.0).sqrt() / (2.0 * std::f64::consts::PI))
            .collect();

        let mut mode_cols = Vec::with_capacity(order.len());
        for &i in &order {
            // Undo the D^-1 congruence: physical mode shape = D^-1 * y.
            let y: DVector<f64> = eig.eigenvectors.column(i).into_owned();
            let phi = y.component_mul(&inv_sqrt_mass);
            mode_cols.push(phi);
        }

        let mut by_freq: Vec<usize> = (0..freqs.len()).collect();
        by_freq.sort_by(|&i, &j| freqs[i].partial_cmp(&freqs[j]).unwrap_or(std::cmp::Ordering::Equal));
        freqs = by_freq.iter().map(|&i| freqs[i]).collect();
        let sorted_cols: Vec<DVector<f64>> = by_freq.iter().map(|&i| mode_cols[i].clone()).collect();
        let mode_matrix = DMatrix::from_columns(&sorted_cols);

        let clusters = jnd::compress(&freqs, &mode_matrix);

        let n = clusters.len();
        let mut freq = Vec::with_capacity(n);
        let mut phase_step = Vec::with_capacity(n);
        let mut damp = Vec::with_capacity(n);
        let mut cols = Vec::with_capacity(n);
        for cluster in clusters {
            freq.push(cluster.frequency);
            phase_step.push(cluster.frequency * dt);
            damp.push((-(damping + freq_damping * cluster.frequency) * dt).exp());
            cols.push(cluster.eigenvector);
        }

        Ok(ModalContext {
            modes: DMatrix::from_columns(&cols),
            phase: vec![0.0; n],
            amp: vec![0.0; n],
            freq,
            phase_step,
            damp,
            density,
            dt,
            three_to_local: tet.three_to_local.clone(),
        })
    }

    fn cell_volume(tet: &TetComplex, cell: &[usize; 4]) -> f64 {
        let p = cell.map(|i| tet.vertices[i]);
        let e1 = [p[1][0] - p[0][0], p[1][1] - p[0][1], p[1][2] - p[0][2]];
        let e2 = [p[2][0] - p[0][0], p[2][1] - p[0][1], p[2][2] - p[0][2]];
        let e3 = [p[3][0] - p[0][0], p[3][1] - p[0][1], p[3][2] - p[0][2]];
        let cross = [
            e2[1] * e3[2] - e2[2] * e3[1],
            e2[2] * e3[0] - e2[0] * e3[2],
            e2[0] * e3[1] - e2[1] * e3[0],
        ];
        (e1[0] * cross[0] + e1[1] * cross[1] + e1[2] * cross[2]) / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_tet() -> TetComplex {
        TetComplex {
            vertices: vec![
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            cells: vec![[0, 1, 2, 3]],
            boundary_faces: vec![[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]],
            three_to_local: vec![0, 1, 2, 3],
        }
    }

    #[test]
    fn build_produces_nonnegative_nondecreasing_frequencies() {
        let tet = single_tet();
        let ctx = ModalSolver::build(&tet, 1.0, 1.0, 1.0 / 44100.0, 0.1, 0.001).unwrap();
        assert!(ctx.n_modes() <= MODES.min(tet.vert_count()));
        assert!(ctx.freq.iter().all(|&f| f >= 0.0));
        for w in ctx.freq.windows(2) {
            assert!(w[0] <= w[1]);
        }
    }
}
