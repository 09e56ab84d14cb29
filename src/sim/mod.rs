//! The per-session simulation engine: scalar or modal integration, block
//! buffering, and decimation to audio/visualization rates.

pub mod engine;
pub mod params;

pub use engine::{BlockCallback, SimEngine};
pub use params::{SimParams, SimState};
