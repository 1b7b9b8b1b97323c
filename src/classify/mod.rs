//! Log-scale classification of county values into discrete color buckets.
//!
//! Values are mapped into log10 space and the range `[min, max]` is cut into
//! `colors.len() - 1` equal steps. Bucket `i` starts at `min + step * i`; the
//! last bucket is open-ended and also receives the maximum.

mod legend;

pub use legend::{bucket_labels, group_thousands, LegendEntry};

use crate::data::ValueRecord;
use thiserror::Error;

/// Divisor used for bucket lookup when every value has the same log.
pub const ZERO_STEP_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifyError {
    #[error("invalid input: cannot classify an empty value sequence")]
    EmptyInput,
    #[error("invalid input: a log scale needs at least 2 colors, got {0}")]
    TooFewColors(usize),
    #[error("invalid input: {0} is not a positive finite value")]
    InvalidValue(f64),
}

/// A color stop: the log10 threshold where a bucket begins.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    pub threshold: f64,
    pub color: String,
}

/// Equal-width log10 buckets spanning the values of one year.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorScale {
    /// log10 of the smallest value
    pub min: f64,
    /// log10 of the largest value
    pub max: f64,
    /// Width of one bucket in log10 space (0 when all values are equal)
    pub step: f64,
    pub stops: Vec<Stop>,
}

impl ColorScale {
    /// Build the scale for a clean sequence of positive values.
    pub fn new(values: &[f64], colors: &[String]) -> Result<Self, ClassifyError> {
        if colors.len() < 2 {
            return Err(ClassifyError::TooFewColors(colors.len()));
        }
        if values.is_empty() {
            return Err(ClassifyError::EmptyInput);
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for &value in values {
            if !value.is_finite() || value <= 0.0 {
                return Err(ClassifyError::InvalidValue(value));
            }
            let log = value.log10();
            min = min.min(log);
            max = max.max(log);
        }

        let step = (max - min) / (colors.len() - 1) as f64;
        let stops = colors
            .iter()
            .enumerate()
            .map(|(i, color)| Stop {
                threshold: min + step * i as f64,
                color: color.clone(),
            })
            .collect();

        tracing::debug!(min, max, "color scale log10 range");

        Ok(Self {
            min,
            max,
            step,
            stops,
        })
    }

    /// Number of buckets (equal to the number of colors).
    pub fn len(&self) -> usize {
        self.stops.len()
    }

    fn divisor(&self) -> f64 {
        if self.step == 0.0 {
            ZERO_STEP_EPSILON
        } else {
            self.step
        }
    }

    /// Bucket for a value. Values on a threshold go to the upper bucket; the
    /// maximum (and anything above it) clamps to the last one.
    pub fn bucket_index(&self, value: f64) -> usize {
        let log = value.log10();
        if self.step > 0.0 && log >= self.max {
            return self.len() - 1;
        }
        let raw = ((log - self.min) / self.divisor()).floor();
        if raw.is_nan() || raw <= 0.0 {
            return 0;
        }
        (raw as usize).min(self.len() - 1)
    }

    /// Linear-space bounds `(lower, upper)` of bucket `i`.
    pub fn bucket_bounds(&self, i: usize) -> (f64, f64) {
        let lower = 10f64.powf(self.min + self.step * i as f64);
        let upper = 10f64.powf(self.min + self.step * (i + 1) as f64);
        (lower, upper)
    }
}

/// Classify a bare value sequence into color stops and legend labels.
pub fn classify(values: &[f64], colors: &[String]) -> Result<(Vec<Stop>, Vec<String>), ClassifyError> {
    let scale = ColorScale::new(values, colors)?;
    let labels = bucket_labels(&scale);
    Ok((scale.stops, labels))
}

/// County key bound to its bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub key: String,
    pub bucket: usize,
}

/// Full classification of one year's records.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub scale: ColorScale,
    pub labels: Vec<String>,
    /// One entry per record, in record order
    pub assignments: Vec<Assignment>,
}

impl Classification {
    pub fn color_of(&self, assignment: &Assignment) -> &str {
        &self.scale.stops[assignment.bucket].color
    }

    /// Number of counties per bucket.
    pub fn bucket_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.scale.len()];
        for assignment in &self.assignments {
            counts[assignment.bucket] += 1;
        }
        counts
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        self.scale
            .stops
            .iter()
            .zip(&self.labels)
            .map(|(stop, label)| LegendEntry {
                color: stop.color.clone(),
                label: label.clone(),
            })
            .collect()
    }
}

/// Classify a year's records. Returns `Ok(None)` for an empty year so callers
/// can render nothing instead of failing.
pub fn classify_records(
    records: &[ValueRecord],
    colors: &[String],
) -> Result<Option<Classification>, ClassifyError> {
    if records.is_empty() {
        if colors.len() < 2 {
            return Err(ClassifyError::TooFewColors(colors.len()));
        }
        return Ok(None);
    }

    let values: Vec<f64> = records.iter().map(|r| r.value).collect();
    let scale = ColorScale::new(&values, colors)?;
    let labels = bucket_labels(&scale);
    let assignments = records
        .iter()
        .map(|r| Assignment {
            key: r.key.clone(),
            bucket: scale.bucket_index(r.value),
        })
        .collect();

    Ok(Some(Classification {
        scale,
        labels,
        assignments,
    }))
}
