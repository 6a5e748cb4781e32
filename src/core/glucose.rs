//! Synthetic glucose values derived from optical, thermal and motion inputs.
//!
//! The synthesizer is a pure function of its inputs. The only source of
//! nondeterminism is the noise sample, which is drawn separately from a
//! [`NoiseSource`] and passed in, so a fixed seed (or zero noise) gives
//! bit-for-bit reproducible output.

use chrono::{DateTime, TimeZone, Timelike, Utc};
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;
use std::f64::consts::PI;

use crate::core::source::SensorValues;

/// Minutes in a day; the circadian term has this period.
pub const MINUTES_PER_DAY: f64 = 1440.0;

/// Tuning constants for the glucose formula.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Output when every term is zero (mg/dL)
    pub baseline: f64,
    /// Sum of normalized red + IR at which the optical term is zero
    pub optical_reference: f64,
    /// mg/dL per unit of optical deviation (higher absorption lowers glucose)
    pub optical_gain: f64,
    /// mg/dL per °C above 36.5
    pub temperature_gain: f64,
    /// mg/dL removed at full motion
    pub motion_gain: f64,
    /// Half peak-to-trough swing of the daily rhythm (mg/dL)
    pub circadian_amplitude: f64,
    /// Minute of day at which the daily rhythm peaks
    pub circadian_peak_minute: f64,
    /// Standard deviation of the Gaussian noise (mg/dL)
    pub noise_std_dev: f64,
    /// Noise is clipped to ±this value (mg/dL)
    pub noise_bound: f64,
    /// Lower edge of the display band
    pub clamp_min: f64,
    /// Upper edge of the display band
    pub clamp_max: f64,
    /// IANA zone used for time of day
    pub timezone: String,
    /// Fixed seed for the noise generator
    pub noise_seed: Option<u64>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            baseline: 110.0,
            optical_reference: 1.3,
            optical_gain: 90.0,
            temperature_gain: 3.0,
            motion_gain: 40.0,
            circadian_amplitude: 6.0,
            circadian_peak_minute: 15.0 * 60.0,
            noise_std_dev: 1.0,
            noise_bound: 3.0,
            clamp_min: 50.0,
            clamp_max: 150.0,
            timezone: "UTC".to_string(),
            noise_seed: None,
        }
    }
}

impl SynthConfig {
    /// Resolve the configured zone, falling back to UTC for unknown names.
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or_else(|_| {
            tracing::warn!("Unknown timezone '{}', using UTC", self.timezone);
            chrono_tz::Tz::UTC
        })
    }
}

/// The four deterministic terms of one synthesis, before noise and clamping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlucoseTerms {
    pub optical: f64,
    pub temperature: f64,
    pub motion: f64,
    pub circadian: f64,
}

impl GlucoseTerms {
    pub fn sum(&self) -> f64 {
        self.optical + self.temperature + self.motion + self.circadian
    }
}

/// Maps sensor values and time of day to a glucose reading.
#[derive(Debug, Clone)]
pub struct GlucoseSynthesizer {
    config: SynthConfig,
}

impl GlucoseSynthesizer {
    pub fn new(config: SynthConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Compute the deterministic terms for the given inputs.
    pub fn terms(&self, values: &SensorValues, minute_of_day: f64) -> GlucoseTerms {
        let c = &self.config;
        let optical =
            (c.optical_reference - (values.red_signal + values.ir_signal)) * c.optical_gain;
        let temperature = (values.temperature - 36.5) * c.temperature_gain;
        let motion = -values.motion * c.motion_gain;
        let phase = 2.0 * PI * (minute_of_day - c.circadian_peak_minute) / MINUTES_PER_DAY;
        let circadian = c.circadian_amplitude * phase.cos();

        GlucoseTerms {
            optical,
            temperature,
            motion,
            circadian,
        }
    }

    /// Synthesize one glucose value in mg/dL.
    ///
    /// `noise` is clipped to the configured bound before it is added, and the
    /// result is clamped to the display band.
    pub fn synthesize(&self, values: &SensorValues, minute_of_day: f64, noise: f64) -> f64 {
        let c = &self.config;
        let noise = noise.clamp(-c.noise_bound, c.noise_bound);
        let raw = c.baseline + self.terms(values, minute_of_day).sum() + noise;
        raw.clamp(c.clamp_min, c.clamp_max)
    }
}

impl Default for GlucoseSynthesizer {
    fn default() -> Self {
        Self::new(SynthConfig::default())
    }
}

/// Minute of day (with fractional seconds) of `now` in `tz`.
pub fn minute_of_day<Tz: TimeZone>(now: DateTime<Utc>, tz: &Tz) -> f64 {
    let local = now.with_timezone(tz);
    local.hour() as f64 * 60.0 + local.minute() as f64 + local.second() as f64 / 60.0
}

/// Bounded zero-mean Gaussian noise.
pub struct NoiseSource {
    rng: StdRng,
    normal: Option<Normal>,
    bound: f64,
}

impl NoiseSource {
    /// Create a noise source; a non-positive `std_dev` yields silence.
    pub fn new(std_dev: f64, bound: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            normal: Normal::new(0.0, std_dev).ok(),
            bound: bound.abs(),
        }
    }

    pub fn from_config(config: &SynthConfig, stream: u64) -> Self {
        let seed = config.noise_seed.map(|s| s.wrapping_add(stream));
        Self::new(config.noise_std_dev, config.noise_bound, seed)
    }

    /// A source that always returns zero.
    pub fn silent() -> Self {
        Self::new(0.0, 0.0, Some(0))
    }

    pub fn sample(&mut self) -> f64 {
        match self.normal {
            Some(ref normal) => normal
                .sample(&mut self.rng)
                .clamp(-self.bound, self.bound),
            None => 0.0,
        }
    }
}

impl std::fmt::Debug for NoiseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseSource")
            .field("enabled", &self.normal.is_some())
            .field("bound", &self.bound)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn defaults() -> SensorValues {
        SensorValues::default()
    }

    #[test]
    fn test_synthesis_is_reproducible_without_noise() {
        let synth = GlucoseSynthesizer::default();
        let values = defaults();
        let first = synth.synthesize(&values, 612.5, 0.0);
        for _ in 0..10 {
            assert_eq!(synth.synthesize(&values, 612.5, 0.0).to_bits(), first.to_bits());
        }
    }

    #[test]
    fn test_reference_inputs_have_zero_optical_and_temperature_terms() {
        let synth = GlucoseSynthesizer::default();
        let terms = synth.terms(&defaults(), 0.0);
        assert!(terms.optical.abs() < 1e-9);
        assert!(terms.temperature.abs() < 1e-9);
        assert!((terms.motion + 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_circadian_peaks_afternoon_and_troughs_predawn() {
        let synth = GlucoseSynthesizer::default();
        let peak = synth.terms(&defaults(), 15.0 * 60.0).circadian;
        let trough = synth.terms(&defaults(), 3.0 * 60.0).circadian;
        assert!((peak - 6.0).abs() < 1e-9);
        assert!((trough + 6.0).abs() < 1e-9);

        // 24 hour period
        let a = synth.terms(&defaults(), 100.0).circadian;
        let b = synth.terms(&defaults(), 100.0 + MINUTES_PER_DAY).circadian;
        assert!((a - b).abs() < 1e-9);
    }

    #[test]
    fn test_output_is_clamped_to_display_band() {
        let synth = GlucoseSynthesizer::default();
        let dark = SensorValues {
            red_signal: 0.0,
            ir_signal: 0.0,
            temperature: 42.0,
            motion: 0.0,
        };
        assert_eq!(synth.synthesize(&dark, 900.0, 100.0), 150.0);

        let saturated = SensorValues {
            red_signal: 1.0,
            ir_signal: 1.0,
            temperature: 30.0,
            motion: 1.0,
        };
        assert_eq!(synth.synthesize(&saturated, 180.0, -100.0), 50.0);
    }

    #[test]
    fn test_noise_is_clipped_before_adding() {
        let synth = GlucoseSynthesizer::default();
        let values = defaults();
        let base = synth.synthesize(&values, 0.0, 0.0);
        let noisy = synth.synthesize(&values, 0.0, 50.0);
        assert!((noisy - base - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_seeded_noise_is_bounded_and_repeatable() {
        let mut a = NoiseSource::new(1.0, 3.0, Some(7));
        let mut b = NoiseSource::new(1.0, 3.0, Some(7));
        for _ in 0..1000 {
            let x = a.sample();
            assert!(x.abs() <= 3.0);
            assert_eq!(x.to_bits(), b.sample().to_bits());
        }
    }

    #[test]
    fn test_silent_noise() {
        let mut noise = NoiseSource::silent();
        assert_eq!(noise.sample(), 0.0);
    }

    #[test]
    fn test_minute_of_day_uses_timezone() {
        let now = Utc.with_ymd_and_hms(2024, 1, 22, 10, 30, 30).unwrap();
        assert!((minute_of_day(now, &Utc) - 630.5).abs() < 1e-9);
        let jakarta: chrono_tz::Tz = "Asia/Jakarta".parse().unwrap();
        assert!((minute_of_day(now, &jakarta) - (17.0 * 60.0 + 30.5)).abs() < 1e-9);
    }
}
