//! Configuration for the store, the rule engine and the simulation driver.
//!
//! Every config type has production defaults and a consuming `validate()`
//! that returns the config back on success.

use crate::error::ValidationError;

fn invalid(field: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidConfig {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn ensure_finite_nonnegative(field: &str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(field, format!("must be finite and >= 0 (got {value})")));
    }
    Ok(())
}

/// Rejects keys that are not usable as plain file names.
pub(crate) fn check_storage_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(invalid("storage_key", "cannot be empty"));
    }
    if let Some(bad) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
    {
        return Err(invalid("storage_key", format!("unsupported character {bad:?}")));
    }
    if key.starts_with('.') {
        return Err(invalid("storage_key", "cannot start with '.'"));
    }
    Ok(())
}

/// Configuration for a [`RecordStore`](crate::storage::RecordStore).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Well-known key under which the snapshot is stored.
    pub storage_key: String,
    /// Prefix for generated document ids.
    pub id_prefix: String,
    /// Start empty (with a warning) instead of failing when the snapshot is corrupt.
    pub recover_corrupt_snapshot: bool,
    /// Default buffer size for channel-backed subscriptions.
    pub stream_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_key: "livestock_db_docs_v1".to_string(),
            id_prefix: "animal".to_string(),
            recover_corrupt_snapshot: false,
            stream_capacity: 1024,
        }
    }
}

impl StoreConfig {
    /// Validates the configuration.
    ///
    /// Storage keys double as file names for the file backend, so they are
    /// restricted to `[A-Za-z0-9_.-]`.
    pub fn validate(self) -> Result<Self, ValidationError> {
        check_storage_key(&self.storage_key)?;
        if self.id_prefix.trim().is_empty() {
            return Err(invalid("id_prefix", "cannot be empty"));
        }
        if self.stream_capacity == 0 {
            return Err(invalid("stream_capacity", "must be at least 1"));
        }
        Ok(self)
    }
}

/// Thresholds used by the built-in anomaly rules.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleThresholds {
    /// Fever when the latest temperature is strictly above this value (°C).
    pub fever_celsius: f64,
    /// Weight-loss alert when the drop since the first sample is strictly above this percentage.
    pub weight_loss_percent: f64,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            fever_celsius: 39.5,
            weight_loss_percent: 10.0,
        }
    }
}

impl RuleThresholds {
    #[allow(missing_docs)]
    pub fn validate(self) -> Result<Self, ValidationError> {
        if !self.fever_celsius.is_finite() {
            return Err(invalid("fever_celsius", "must be finite"));
        }
        ensure_finite_nonnegative("weight_loss_percent", self.weight_loss_percent)?;
        Ok(self)
    }
}

/// Vitals assumed when a document has no history yet.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineVitals {
    pub temperature: f64,
    pub heart_rate: u32,
    pub weight: f64,
    pub feed_intake: f64,
}

impl Default for BaselineVitals {
    fn default() -> Self {
        Self {
            temperature: 38.5,
            heart_rate: 75,
            weight: 300.0,
            feed_intake: 5.0,
        }
    }
}

/// Parameters of the fever simulation cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Lower bound of the synthesized temperature (°C).
    pub fever_base_celsius: f64,
    /// Width of the temperature range; the offset is drawn from `[0, spread)`.
    pub fever_spread_celsius: f64,
    /// Lower bound of the synthesized heart rate.
    pub heart_rate_base: u32,
    /// Heart-rate offset is drawn from `[0, spread)`.
    pub heart_rate_spread: u32,
    /// Amount subtracted from feed intake on each cycle.
    pub feed_decrement: f64,
    /// Feed intake never drops below this value.
    pub feed_floor: f64,
    /// Used when the document has no vitals yet.
    pub baseline: BaselineVitals,
    /// Thresholds for the rule engine run at the end of each cycle.
    pub thresholds: RuleThresholds,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fever_base_celsius: 40.0,
            fever_spread_celsius: 1.0,
            heart_rate_base: 90,
            heart_rate_spread: 20,
            feed_decrement: 0.5,
            feed_floor: 0.0,
            baseline: BaselineVitals::default(),
            thresholds: RuleThresholds::default(),
        }
    }
}

impl SimulationConfig {
    /// Validates the configuration.
    pub fn validate(self) -> Result<Self, ValidationError> {
        if !self.fever_base_celsius.is_finite() {
            return Err(invalid("fever_base_celsius", "must be finite"));
        }
        ensure_finite_nonnegative("fever_spread_celsius", self.fever_spread_celsius)?;
        if self.heart_rate_spread == 0 {
            return Err(invalid("heart_rate_spread", "must be at least 1"));
        }
        if self.heart_rate_base.checked_add(self.heart_rate_spread).is_none() {
            return Err(invalid("heart_rate_spread", "heart rate range overflows"));
        }
        ensure_finite_nonnegative("feed_decrement", self.feed_decrement)?;
        ensure_finite_nonnegative("feed_floor", self.feed_floor)?;

        let b = self.baseline;
        if !b.temperature.is_finite() {
            return Err(invalid("baseline.temperature", "must be finite"));
        }
        ensure_finite_nonnegative("baseline.weight", b.weight)?;
        ensure_finite_nonnegative("baseline.feed_intake", b.feed_intake)?;

        let thresholds = self.thresholds.validate()?;
        Ok(Self { thresholds, ..self })
    }
}
