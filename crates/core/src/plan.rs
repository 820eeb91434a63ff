//! Sampling plans: which timestamps of a video get turned into frames.
//!
//! A plan is `start`, optional `end`, and an interval expressed in the
//! caller's display unit. The emitted sequence is `start, start + i, ...`
//! inclusive while `<= end` (or a caller-supplied duration bound when the
//! plan has no end).

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Upper bound on the number of sample points a single plan may expand to.
pub const MAX_SAMPLE_POINTS: usize = 10_000;

/// Absorbs float error in `(end - start) / interval` so that e.g. a 0.1s
/// interval over one second yields 11 points rather than 10.
const COUNT_EPSILON: f64 = 1e-9;

/// Unit in which the caller expressed the sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    #[default]
    Seconds,
    Minutes,
}

impl IntervalUnit {
    pub fn to_seconds(self, value: f64) -> f64 {
        match self {
            Self::Seconds => value,
            Self::Minutes => value * 60.0,
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "seconds" => Ok(Self::Seconds),
            "minutes" => Ok(Self::Minutes),
            other => Err(CoreError::Validation(format!(
                "Unknown interval unit: '{other}'. Valid units: seconds, minutes"
            ))),
        }
    }
}

/// A validated sampling plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingPlan {
    start_time: f64,
    end_time: Option<f64>,
    interval: f64,
    interval_unit: IntervalUnit,
}

impl SamplingPlan {
    /// Build a plan, rejecting non-finite or out-of-range values.
    pub fn new(
        start_time: f64,
        end_time: Option<f64>,
        interval: f64,
        interval_unit: IntervalUnit,
    ) -> Result<Self, CoreError> {
        if !interval.is_finite() || interval <= 0.0 {
            return Err(CoreError::Validation(
                "Interval must be a positive number".to_string(),
            ));
        }
        if !start_time.is_finite() || start_time < 0.0 {
            return Err(CoreError::Validation(
                "Start time must be a non-negative number".to_string(),
            ));
        }
        if let Some(end) = end_time {
            if !end.is_finite() || end <= start_time {
                return Err(CoreError::Validation(
                    "End time must be greater than start time".to_string(),
                ));
            }
        }
        Ok(Self {
            start_time,
            end_time,
            interval,
            interval_unit,
        })
    }

    /// Convenience constructor for an interval already in seconds.
    pub fn in_seconds(
        start_time: f64,
        end_time: Option<f64>,
        interval_seconds: f64,
    ) -> Result<Self, CoreError> {
        Self::new(start_time, end_time, interval_seconds, IntervalUnit::Seconds)
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    pub fn interval_unit(&self) -> IntervalUnit {
        self.interval_unit
    }

    /// The interval normalized to seconds, whatever unit the caller used.
    pub fn interval_seconds(&self) -> f64 {
        self.interval_unit.to_seconds(self.interval)
    }

    /// Timestamp of the `index`-th sample point.
    pub fn timestamp_at(&self, index: usize) -> f64 {
        self.start_time + index as f64 * self.interval_seconds()
    }

    /// The end bound used for expansion: the plan's own end, else `known_duration`.
    pub fn effective_end(&self, known_duration: Option<f64>) -> Option<f64> {
        self.end_time.or(known_duration)
    }

    /// Number of sample points, without materializing them.
    pub fn sample_count(&self, known_duration: Option<f64>) -> Result<usize, CoreError> {
        let end = self.bounded_end(known_duration)?;
        if end < self.start_time {
            return Ok(0);
        }
        let steps = ((end - self.start_time) / self.interval_seconds() + COUNT_EPSILON).floor();
        if steps >= MAX_SAMPLE_POINTS as f64 {
            return Err(CoreError::Validation(format!(
                "Sampling plan expands to more than {MAX_SAMPLE_POINTS} frames; \
                 use a larger interval or a shorter range"
            )));
        }
        let mut count = steps as usize + 1;
        // The epsilon may admit a last point that lands just past `end`.
        while count > 1 && self.timestamp_at(count - 1) > end {
            count -= 1;
        }
        Ok(count)
    }

    /// Expand the plan into its strictly increasing timestamp sequence.
    ///
    /// Timestamps are computed from the index rather than by accumulation,
    /// so long runs do not drift.
    pub fn timestamps(&self, known_duration: Option<f64>) -> Result<Vec<f64>, CoreError> {
        let count = self.sample_count(known_duration)?;
        Ok((0..count).map(|i| self.timestamp_at(i)).collect())
    }

    /// Admission estimate: `ceil((end ?? known_duration) / interval_seconds)`.
    ///
    /// Returns `None` when neither an end time nor a duration is known.
    pub fn estimated_image_count(&self, known_duration: Option<f64>) -> Option<u64> {
        let end = self.effective_end(known_duration)?;
        if !end.is_finite() || end < 0.0 {
            return None;
        }
        Some((end / self.interval_seconds()).ceil() as u64)
    }

    fn bounded_end(&self, known_duration: Option<f64>) -> Result<f64, CoreError> {
        if let Some(d) = known_duration {
            if !d.is_finite() || d < 0.0 {
                return Err(CoreError::Validation(format!(
                    "Known duration must be a non-negative number, got {d}"
                )));
            }
        }
        self.effective_end(known_duration).ok_or_else(|| {
            CoreError::Validation(
                "An end time or a known video duration is required".to_string(),
            )
        })
    }
}

/// Format seconds as an `M:SS` label (minutes are not wrapped into hours).
pub fn format_time_label(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}
