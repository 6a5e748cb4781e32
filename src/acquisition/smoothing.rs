//! Moving-average smoothing, motion estimation and normalization.

/// Number of slots in each smoothing window.
pub const SMOOTHING_SAMPLES: usize = 10;

/// Motion estimate before the first IR delta is seen.
pub const INITIAL_MOTION: f64 = 0.3;

/// IR delta that maps to full motion.
const MOTION_FULL_SCALE: f64 = 10_000.0;

/// Weight kept from the previous motion estimate.
const MOTION_RETAIN: f64 = 0.8;

/// Fixed-capacity circular window of raw counts.
///
/// The window always holds [`SMOOTHING_SAMPLES`] slots; before warm-up the
/// unwritten slots are zero, so early averages are pulled toward zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmoothingBuffer {
    slots: [i64; SMOOTHING_SAMPLES],
    index: usize,
}

impl SmoothingBuffer {
    pub fn new() -> Self {
        Self {
            slots: [0; SMOOTHING_SAMPLES],
            index: 0,
        }
    }

    /// Overwrite the slot at the write index, advance it and return the new mean.
    pub fn push(&mut self, value: i64) -> f64 {
        self.slots[self.index] = value;
        self.index = (self.index + 1) % SMOOTHING_SAMPLES;
        self.mean()
    }

    /// Arithmetic mean of all slots.
    pub fn mean(&self) -> f64 {
        self.slots.iter().map(|&v| v as f64).sum::<f64>() / SMOOTHING_SAMPLES as f64
    }

    pub fn slots(&self) -> &[i64; SMOOTHING_SAMPLES] {
        &self.slots
    }

    pub fn write_index(&self) -> usize {
        self.index
    }
}

impl Default for SmoothingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Exponential moving average of smoothed IR deltas, standing in for an accelerometer.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionEstimator {
    value: f64,
    last_ir: Option<f64>,
}

impl MotionEstimator {
    pub fn new() -> Self {
        Self {
            value: INITIAL_MOTION,
            last_ir: None,
        }
    }

    /// Feed the latest smoothed IR value and return the motion estimate.
    pub fn update(&mut self, smoothed_ir: f64) -> f64 {
        if let Some(prev) = self.last_ir {
            let variation = ((smoothed_ir - prev).abs() / MOTION_FULL_SCALE).clamp(0.0, 1.0);
            self.value =
                (MOTION_RETAIN * self.value + (1.0 - MOTION_RETAIN) * variation).clamp(0.0, 1.0);
        }
        self.last_ir = Some(smoothed_ir);
        self.value
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl Default for MotionEstimator {
    fn default() -> Self {
        Self::new()
    }
}

/// Affine map from a raw count range onto [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelDomain {
    pub min: f64,
    pub max: f64,
}

/// Red channel range of the MAX30102 at the configured LED current.
pub const RED_DOMAIN: ChannelDomain = ChannelDomain {
    min: 5_000.0,
    max: 100_000.0,
};

/// IR channel range of the MAX30102 at the configured LED current.
pub const IR_DOMAIN: ChannelDomain = ChannelDomain {
    min: 10_000.0,
    max: 150_000.0,
};

impl ChannelDomain {
    /// Map `value` into [0, 1], clamping outliers. NaN maps to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let scaled = (value - self.min) / (self.max - self.min);
        if scaled.is_nan() {
            0.0
        } else {
            scaled.clamp(0.0, 1.0)
        }
    }
}
