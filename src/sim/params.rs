//! Simulation configuration and state, as carried over the wire.

use serde::{Deserialize, Serialize};

/// Configuration for one session's scalar damped-oscillator simulation,
/// decimation rates, and block sizes. Deserialized from the JSON body of
/// `PUT /api/sim/config/:id`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimParams {
    pub physics_sample_rate: u32,
    pub physics_block_size: usize,
    pub audio_sample_rate: u32,
    pub audio_block_size: usize,
    pub viz_sample_rate: u32,
    pub viz_block_size: usize,
    pub mass: f64,
    pub stiffness: f64,
    pub damping: f64,
    pub area: f64,
}

/// The scalar oscillator's state. Deserialized from the JSON body of
/// `POST /api/sim/bonk/:id`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct SimState {
    pub x: f64,
    pub v: f64,
}
