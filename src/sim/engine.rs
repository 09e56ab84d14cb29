//! Drives either a scalar damped oscillator or a modal-synthesis context
//! forward in time, decimating the result to audio and visualization rates.

use crate::dsp::Decimator;
use crate::error::Result;
use crate::modal::{ModalContext, ModalIntegrator};

use super::params::{SimParams, SimState};

pub type BlockCallback = Box<dyn FnMut(&[f64]) + Send>;

fn noop_callback() -> BlockCallback {
    Box::new(|_| {})
}

/// Owns one session's simulation state and steps it at the physics rate,
/// invoking block callbacks once the physics/audio/viz buffers fill.
pub struct SimEngine {
    params: SimParams,
    state: SimState,
    modal: Option<ModalContext>,
    audio_decimator: Decimator,
    viz_decimator: Decimator,
    physics_block: Vec<f64>,
    audio_block: Vec<f64>,
    viz_block: Vec<f64>,
    physics_callback: BlockCallback,
    audio_callback: BlockCallback,
    viz_callback: BlockCallback,
    power: f64,
    stopped: bool,
}

impl SimEngine {
    pub fn new(params: SimParams, state: SimState) -> Result<Self> {
        let audio_decimator = Decimator::setup(
            f64::from(params.physics_sample_rate),
            f64::from(params.audio_sample_rate),
        )?;
        let viz_decimator = Decimator::setup(
            f64::from(params.physics_sample_rate),
            f64::from(params.viz_sample_rate),
        )?;

        Ok(Self {
            physics_block: Vec::with_capacity(params.physics_block_size),
            audio_block: Vec::with_capacity(params.audio_block_size),
            viz_block: Vec::with_capacity(params.viz_block_size),
            params,
            state,
            modal: None,
            audio_decimator,
            viz_decimator,
            physics_callback: noop_callback(),
            audio_callback: noop_callback(),
            viz_callback: noop_callback(),
            power: 1.0,
            stopped: false,
        })
    }

    /// Switches integration to variant B: draw samples from a modal context
    /// instead of integrating the scalar oscillator.
    #[must_use]
    pub fn with_modal_context(mut self, ctx: ModalContext) -> Self {
        self.modal = Some(ctx);
        self
    }

    pub fn set_physics_callback(&mut self, cb: BlockCallback) {
        self.physics_callback = cb;
    }

    pub fn set_audio_callback(&mut self, cb: BlockCallback) {
        self.audio_callback = cb;
    }

    pub fn set_viz_callback(&mut self, cb: BlockCallback) {
        self.viz_callback = cb;
    }

    /// Latches a flag so every subsequent `step` returns `false` without
    /// touching any other state.
    pub fn stop(&mut self) {
        self.stopped = true;
    }

    /// Advances the simulation by one physics tick. Returns whether the
    /// caller should keep stepping (`false` on an explicit `stop()` or once
    /// the audio power estimate decays below the silence gate).
    pub fn step(&mut self, dt: f64) -> bool {
        if self.stopped {
            return false;
        }

        let x = match &mut self.modal {
            Some(ctx) => ModalIntegrator::step_block(ctx, 1)[0],
            None => {
                let c = self.params.damping;
                let k = self.params.stiffness;
                let m = self.params.mass;
                self.state.v -= (c / m * self.state.v + k / m * self.state.x) * dt;
                self.state.x += self.state.v * dt;
                self.state.x
            }
        };

        self.physics_block.push(x);
        if self.physics_block.len() == self.params.physics_block_size {
            (self.physics_callback)(&self.physics_block);
            self.physics_block.clear();
        }

        if let Some(sample) = self.audio_decimator.filter(x) {
            self.audio_block.push(sample);
            self.power = 0.999 * self.power + 0.001 * sample * sample;
            if self.audio_block.len() == self.params.audio_block_size {
                (self.audio_callback)(&self.audio_block);
                self.audio_block.clear();
            }
        }

        if let Some(sample) = self.viz_decimator.filter(x) {
            self.viz_block.push(sample);
            if self.viz_block.len() == self.params.viz_block_size {
                (self.viz_callback)(&self.viz_block);
                self.viz_block.clear();
            }
        }

        self.power > 1e-6
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SimParams {
        SimParams {
            physics_sample_rate: 1_000_000,
            physics_block_size: 512,
            audio_sample_rate: 48_000,
            audio_block_size: 128,
            viz_sample_rate: 60,
            viz_block_size: 4,
            mass: 0.005,
            stiffness: 3000.0,
            damping: 0.12,
            area: 1.0,
        }
    }

    #[test]
    fn stop_latches_and_step_returns_false() {
        let mut engine = SimEngine::new(params(), SimState { x: 1.0, v: 0.0 }).unwrap();
        engine.stop();
        assert!(!engine.step(1e-6));
    }

    #[test]
    fn zero_force_reaches_silence_within_simulated_horizon() {
        let mut engine = SimEngine::new(params(), SimState { x: 2.0, v: 0.0 }).unwrap();
        let dt = 1.0 / f64::from(params().physics_sample_rate);
        let max_steps = (15.0 / dt) as usize;
        let mut steps = 0;
        while engine.step(dt) && steps < max_steps {
            steps += 1;
        }
        assert!(steps < max_steps, "did not reach silence within 15s of simulated time");
    }
}
