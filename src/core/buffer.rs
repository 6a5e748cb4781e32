//! Bounded, time-ordered record buffer kept per data source.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::core::source::SensorValues;

/// Default number of records retained per source.
pub const DEFAULT_CAPACITY: usize = 30;

/// One synthesized glucose point, as charted and exported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRecord {
    /// Wall-clock label (HH:MM:SS)
    #[serde(rename = "Time")]
    pub time: String,
    /// Glucose in mg/dL, rounded to 0.1
    #[serde(rename = "Glucose")]
    pub glucose: f64,
    #[serde(rename = "Red")]
    pub red: f64,
    #[serde(rename = "IR")]
    pub ir: f64,
    #[serde(rename = "Temperature")]
    pub temperature: f64,
    #[serde(rename = "Motion")]
    pub motion: f64,
}

impl DerivedRecord {
    pub fn new(time: impl Into<String>, glucose: f64, inputs: &SensorValues) -> Self {
        Self {
            time: time.into(),
            glucose: (glucose * 10.0).round() / 10.0,
            red: inputs.red_signal,
            ir: inputs.ir_signal,
            temperature: inputs.temperature,
            motion: inputs.motion,
        }
    }
}

/// Chart y-axis bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YRange {
    pub min: f64,
    pub max: f64,
}

impl YRange {
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// How the y-axis is derived from buffered values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RangePolicy {
    /// Added below the floored minimum and above the ceiled maximum
    pub margin: f64,
    /// The range is widened symmetrically to at least this span
    pub min_span: f64,
    /// Range reported for an empty buffer
    pub empty: YRange,
}

impl Default for RangePolicy {
    fn default() -> Self {
        Self {
            margin: 5.0,
            min_span: 20.0,
            empty: YRange {
                min: 50.0,
                max: 150.0,
            },
        }
    }
}

impl RangePolicy {
    pub fn range_for<I>(&self, values: I) -> YRange
    where
        I: IntoIterator<Item = f64>,
    {
        let (lo, hi) = values
            .into_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });

        if lo > hi {
            return self.empty;
        }

        let mut range = YRange {
            min: lo.floor() - self.margin,
            max: hi.ceil() + self.margin,
        };

        if range.span() < self.min_span {
            let center = (range.min + range.max) / 2.0;
            range.min = center - self.min_span / 2.0;
            range.max = center + self.min_span / 2.0;
        }

        range
    }
}

/// FIFO buffer of derived records with a fixed capacity.
///
/// Pushing past capacity evicts the oldest record; overflow is never an error.
#[derive(Debug, Clone)]
pub struct SourceBuffer {
    records: VecDeque<DerivedRecord>,
    capacity: usize,
}

impl SourceBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a record, evicting from the front if over capacity.
    ///
    /// Returns the evicted record, if any.
    pub fn push(&mut self, record: DerivedRecord) -> Option<DerivedRecord> {
        self.records.push_back(record);
        if self.records.len() > self.capacity {
            self.records.pop_front()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&DerivedRecord> {
        self.records.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DerivedRecord> {
        self.records.iter()
    }

    /// Copy out the records in insertion order.
    pub fn to_vec(&self) -> Vec<DerivedRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn y_range(&self, policy: &RangePolicy) -> YRange {
        policy.range_for(self.records.iter().map(|r| r.glucose))
    }
}

impl Default for SourceBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
