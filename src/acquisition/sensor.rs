//! Optical sensor abstraction and a simulated MAX30102.
//!
//! Hardware drivers live outside this crate; anything that can report red,
//! IR and die temperature can drive the acquisition node.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

/// A pulse-oximetry front end.
pub trait OpticalSensor {
    /// Check that the device answers on its bus.
    fn probe(&mut self) -> bool;

    /// Latest red LED count.
    fn read_red(&mut self) -> i64;

    /// Latest IR LED count.
    fn read_ir(&mut self) -> i64;

    /// Die temperature in °C.
    fn read_temperature(&mut self) -> f64;
}

/// Configuration for [`SimulatedSensor`].
#[derive(Debug, Clone)]
pub struct SimulatedSensorConfig {
    /// Whether the device answers the probe
    pub present: bool,
    /// Whether a finger covers the LEDs
    pub finger_present: bool,
    /// Pulse rate of the synthetic waveform
    pub heart_rate_bpm: f64,
    /// Time between consecutive reads
    pub sample_period_secs: f64,
    /// Seed for the sample jitter
    pub seed: Option<u64>,
}

impl Default for SimulatedSensorConfig {
    fn default() -> Self {
        Self {
            present: true,
            finger_present: true,
            heart_rate_bpm: 72.0,
            sample_period_secs: 0.1,
            seed: None,
        }
    }
}

/// Synthetic PPG source with a pulse, slow breathing drift and jitter.
pub struct SimulatedSensor {
    config: SimulatedSensorConfig,
    rng: StdRng,
    t: f64,
}

/// DC levels with a finger on the sensor.
const RED_DC: f64 = 52_000.0;
const IR_DC: f64 = 90_000.0;

/// Ambient-light level with nothing on the sensor.
const AMBIENT: f64 = 1_500.0;

impl SimulatedSensor {
    pub fn new(config: SimulatedSensorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng, t: 0.0 }
    }

    pub fn set_finger_present(&mut self, present: bool) {
        self.config.finger_present = present;
    }

    fn waveform(&mut self, dc: f64, ac_ratio: f64) -> i64 {
        if !self.config.finger_present {
            return (AMBIENT + self.rng.gen_range(-200.0..200.0)) as i64;
        }
        let pulse = (2.0 * PI * self.config.heart_rate_bpm / 60.0 * self.t).sin();
        let breathing = (2.0 * PI * 0.25 * self.t).sin();
        let jitter = self.rng.gen_range(-0.004..0.004);
        (dc * (1.0 + ac_ratio * pulse + 0.01 * breathing + jitter)) as i64
    }
}

impl OpticalSensor for SimulatedSensor {
    fn probe(&mut self) -> bool {
        self.config.present
    }

    fn read_red(&mut self) -> i64 {
        self.waveform(RED_DC, 0.02)
    }

    // Each IR read advances simulated time by one sample period.
    fn read_ir(&mut self) -> i64 {
        let value = self.waveform(IR_DC, 0.03);
        self.t += self.config.sample_period_secs;
        value
    }

    fn read_temperature(&mut self) -> f64 {
        36.4 + 0.2 * (2.0 * PI * self.t / 600.0).sin() + self.rng.gen_range(-0.05..0.05)
    }
}
