//! Modal analysis: mass/stiffness assembly, eigenmode extraction, perceptual
//! compression, and impulse-driven time-domain synthesis.

pub mod integrator;
pub mod jnd;
pub mod solver;

pub use integrator::ModalIntegrator;
pub use solver::{ModalContext, ModalSolver, MODES};
