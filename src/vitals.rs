//! Vitals samples and the per-document vitals ledger.
//!
//! The ledger is the `vitals_history` field of a [`Document`]: insertion
//! order is chronological order, timestamps never decrease, and samples are
//! never reordered or removed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::ValidationError;

/// One vitals reading.
///
/// Timestamps are stored as milliseconds since the Unix epoch. Every
/// measurement is optional: a missing reading makes the rules that need it
/// inapplicable instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsSample {
    /// Logical time of the reading; equal timestamps are allowed.
    #[serde(alias = "ts", with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    /// Body temperature in °C.
    #[serde(default, alias = "temp", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Beats per minute.
    #[serde(default, alias = "hr", skip_serializing_if = "Option::is_none")]
    pub heart_rate: Option<u32>,
    /// Body weight in kg.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    /// Daily feed intake in kg; nonnegative by convention.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_intake: Option<f64>,
}

impl VitalsSample {
    /// Creates a sample with no measurements.
    #[must_use]
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            temperature: None,
            heart_rate: None,
            weight: None,
            feed_intake: None,
        }
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn temperature(mut self, celsius: f64) -> Self {
        self.temperature = Some(celsius);
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn heart_rate(mut self, bpm: u32) -> Self {
        self.heart_rate = Some(bpm);
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn weight(mut self, kg: f64) -> Self {
        self.weight = Some(kg);
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn feed_intake(mut self, kg: f64) -> Self {
        self.feed_intake = Some(kg);
        self
    }

    /// Rejects NaN and infinite readings, which JSON cannot carry.
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        let fields = [
            ("temperature", self.temperature),
            ("weight", self.weight),
            ("feed_intake", self.feed_intake),
        ];
        for (field, value) in fields {
            if value.is_some_and(|v| !v.is_finite()) {
                return Err(ValidationError::NonFiniteValue {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Returns a new history with `sample` placed at the end.
///
/// The document's own history is left untouched.
///
/// # Errors
/// - `NonMonotonicTimestamp` if `sample` is older than the current latest sample
/// - `NonFiniteValue` if a reading is NaN or infinite
pub fn append(
    document: &Document,
    sample: VitalsSample,
) -> Result<Vec<VitalsSample>, ValidationError> {
    sample.validate()?;
    if let Some(last) = latest(document) {
        if sample.timestamp < last.timestamp {
            return Err(ValidationError::NonMonotonicTimestamp {
                previous: last.timestamp,
                next: sample.timestamp,
            });
        }
    }

    let mut history = Vec::with_capacity(document.vitals_history.len() + 1);
    history.extend_from_slice(&document.vitals_history);
    history.push(sample);
    Ok(history)
}

/// The most recent sample, or `None` when the ledger is empty.
#[must_use]
pub fn latest(document: &Document) -> Option<&VitalsSample> {
    document.vitals_history.last()
}

/// The last `n` samples in chronological order (fewer if the ledger is shorter).
#[must_use]
pub fn window(document: &Document, n: usize) -> &[VitalsSample] {
    let history = &document.vitals_history;
    &history[history.len().saturating_sub(n)..]
}
