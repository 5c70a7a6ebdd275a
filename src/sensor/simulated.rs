use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::poller::Poller;
use super::{Accelerometer, SamplingRate, SensorEvents};
use crate::error::SensorError;
use crate::types::Reading;

const GRAVITY: f64 = 9.81;

/// Synthetic device lying roughly flat: gravity on z, a slow sway on x/y
/// and a little sensor noise.
pub struct SimulatedAccelerometer {
    noise: f64,
    poller: Option<Poller>,
}

impl SimulatedAccelerometer {
    pub fn new() -> Self {
        Self::with_noise(0.05)
    }

    /// `noise` is the half-width of the uniform noise band, in m/s².
    pub fn with_noise(noise: f64) -> Self {
        Self {
            noise: noise.abs(),
            poller: None,
        }
    }
}

impl Default for SimulatedAccelerometer {
    fn default() -> Self {
        Self::new()
    }
}

fn sample(step: u64, period_secs: f64, noise: f64, rng: &mut impl Rng) -> Reading {
    let t = step as f64 * period_secs;
    let mut jitter = || {
        if noise > 0.0 {
            rng.random_range(-noise..noise)
        } else {
            0.0
        }
    };
    let x = (t * 0.5 * PI).sin() * 0.3 + jitter();
    let y = (t * 0.3 * PI).cos() * 0.2 + jitter();
    let z = GRAVITY + jitter();
    Reading::now(x, y, z)
}

impl Accelerometer for SimulatedAccelerometer {
    fn name(&self) -> &str {
        "simulated"
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn open(&mut self, rate: SamplingRate, events: SensorEvents) -> Result<(), SensorError> {
        let period = rate.period();
        let noise = self.noise;
        let mut rng = StdRng::from_rng(&mut rand::rng());
        let mut step = 0u64;

        let poller = Poller::spawn("simulated", period, u32::MAX, events, move || {
            step += 1;
            Ok(sample(step, period.as_secs_f64(), noise, &mut rng))
        })
        .map_err(|e| SensorError::StartFailure(e.to_string()))?;

        self.poller = Some(poller);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(mut poller) = self.poller.take() {
            poller.shutdown();
        }
    }
}
