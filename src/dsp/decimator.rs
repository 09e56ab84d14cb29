//! Anti-aliasing decimation: an 8th-order Butterworth low-pass cascade plus
//! an integer countdown that emits every `decimation_factor`-th sample.

use biquad::{Biquad, Coefficients, DirectForm1, Hertz, ToHertz, Type};

use crate::error::{BonkError, Result};

/// Pole angles for a 4-section biquad cascade implementing an 8th-order
/// Butterworth response: `Q_k = 1 / (2 cos((2k-1)pi/16))` for k = 1..4.
fn butterworth_8_section_qs() -> [f64; 4] {
    std::array::from_fn(|k| {
        let theta = (2 * k + 1) as f64 * std::f64::consts::PI / 16.0;
        1.0 / (2.0 * theta.cos())
    })
}

/// Decimates a signal from `source_rate` to `target_rate`, anti-aliasing with
/// a cascaded 8th-order Butterworth low-pass at `target_rate / 2` before
/// dropping samples.
pub struct Decimator {
    stages: Vec<DirectForm1<f64>>,
    decimation_factor: i64,
    countdown: i64,
}

impl Decimator {
    pub fn setup(source_rate: f64, target_rate: f64) -> Result<Self> {
        let decimation_factor = (source_rate / target_rate).floor() as i64;
        if decimation_factor < 1 {
            return Err(BonkError::ModalSetupFailure(format!(
                "source rate {source_rate} must be >= target rate {target_rate}"
            )));
        }

        let fs: Hertz<f64> = source_rate.hz();
        let cutoff: Hertz<f64> = (target_rate / 2.0).hz();

        let stages = butterworth_8_section_qs()
            .into_iter()
            .map(|q| {
                Coefficients::<f64>::from_params(Type::LowPass, fs, cutoff, q)
                    .map(DirectForm1::<f64>::new)
                    .map_err(|e| BonkError::ModalSetupFailure(format!("filter design: {e:?}")))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            stages,
            decimation_factor,
            countdown: 0,
        })
    }

    /// Always runs `sample` through the anti-aliasing cascade. Returns the
    /// filtered value every `decimation_factor`-th call, `None` otherwise.
    /// The countdown decrements unconditionally every call, so the value it
    /// settles to right after an emission is `decimation_factor - 1`.
    pub fn filter(&mut self, sample: f64) -> Option<f64> {
        let mut y = sample;
        for stage in &mut self.stages {
            y = stage.run(y);
        }

        let out = if self.countdown <= 0 {
            self.countdown = self.decimation_factor;
            Some(y)
        } else {
            None
        };
        self.countdown -= 1;

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_every_decimation_factor_samples() {
        let mut dec = Decimator::setup(44100.0, 11025.0).unwrap();
        let mut emitted = 0;
        for i in 0..40 {
            if dec.filter(i as f64).is_some() {
                emitted += 1;
            }
        }
        assert_eq!(emitted, 10);
    }

    #[test]
    fn rejects_target_above_source() {
        assert!(Decimator::setup(8000.0, 44100.0).is_err());
    }
}
