//! Documents: one record per monitored animal.
//!
//! A document carries static descriptive attributes, an append-only vitals
//! ledger and the alerts most recently derived from that ledger.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::{Alert, Severity};
use crate::error::ValidationError;
use crate::vitals::VitalsSample;

/// Stable document identifier.
///
/// Identifiers are plain strings so snapshots written by other tools
/// (`animal_1`, `animal_1712345678901`, ...) load unchanged.
///
/// # Examples
///
/// ```
/// use vitalstore::DocumentId;
///
/// let id = DocumentId::generate("animal");
/// assert!(id.as_str().starts_with("animal_"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wraps an existing identifier, rejecting blank input.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::EmptyDocumentId);
        }
        Ok(Self(id))
    }

    /// Generates a fresh identifier of the form `<prefix>_<uuid>`.
    #[must_use]
    pub fn generate(prefix: &str) -> Self {
        Self(format!("{prefix}_{}", Uuid::new_v4().simple()))
    }

    /// Identifier assigned to the `position`-th (1-based) entry of a seed set.
    #[must_use]
    pub fn seeded(prefix: &str, position: usize) -> Self {
        Self(format!("{prefix}_{position}"))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the identifier is blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DocumentId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A monitored animal and its vitals history.
///
/// `alerts` is derived state: it is replaced wholesale whenever the rule
/// engine runs and is never edited independently. Unknown fields found in a
/// loaded snapshot are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    /// Identifier; assigned by the store when absent.
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<DocumentId>,
    /// Ear tag or other display label.
    #[serde(default)]
    pub tag: String,
    #[allow(missing_docs)]
    #[serde(default)]
    pub species: String,
    #[allow(missing_docs)]
    #[serde(default)]
    pub gender: String,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_months: Option<u32>,
    /// Chronological vitals ledger (append-only).
    #[serde(default)]
    pub vitals_history: Vec<VitalsSample>,
    /// Alerts computed from `vitals_history` at the last write.
    #[serde(default)]
    pub alerts: Vec<Alert>,
    /// Local "sync acknowledged" marker.
    #[serde(default)]
    pub synced: bool,
    /// Attributes this crate does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// Creates a document without an id and with an empty ledger.
    #[must_use]
    pub fn new(tag: impl Into<String>, species: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            species: species.into(),
            ..Self::default()
        }
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<DocumentId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = gender.into();
        self
    }

    #[allow(missing_docs)]
    #[must_use]
    pub fn with_age_months(mut self, age_months: u32) -> Self {
        self.age_months = Some(age_months);
        self
    }

    /// Replaces the vitals ledger (seeding and tests).
    #[must_use]
    pub fn with_vitals(mut self, history: Vec<VitalsSample>) -> Self {
        self.vitals_history = history;
        self
    }

    /// The most recent vitals sample, if any.
    #[must_use]
    pub fn latest_vitals(&self) -> Option<&VitalsSample> {
        crate::vitals::latest(self)
    }

    /// Returns true if the last rule evaluation produced any alert.
    #[must_use]
    pub fn has_alerts(&self) -> bool {
        !self.alerts.is_empty()
    }

    /// Overall status derived from the most severe current alert.
    #[must_use]
    pub fn health_status(&self) -> HealthStatus {
        match self.alerts.iter().map(|a| a.severity).max() {
            None => HealthStatus::Healthy,
            Some(Severity::Warning) => HealthStatus::Warning,
            Some(Severity::Critical) => HealthStatus::Critical,
        }
    }

    /// Checks the fields the store must be able to serialize faithfully.
    ///
    /// Sample ordering is not checked here: it is enforced when a sample is
    /// appended, and histories loaded from older snapshots are kept as found.
    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if let Some(id) = &self.id {
            if id.is_blank() {
                return Err(ValidationError::EmptyDocumentId);
            }
        }
        self.vitals_history.iter().try_for_each(VitalsSample::validate)
    }
}

/// Coarse health classification used by dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// No active alerts.
    Healthy,
    /// At least one warning, no critical alert.
    Warning,
    /// At least one critical alert.
    Critical,
}

/// Herd-level counters over a set of documents.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HerdSummary {
    pub total: usize,
    pub healthy: usize,
    pub with_alerts: usize,
    pub critical: usize,
    pub unsynced: usize,
}

impl HerdSummary {
    /// Tallies the given documents.
    #[must_use]
    pub fn from_documents<'a>(documents: impl IntoIterator<Item = &'a Document>) -> Self {
        let mut summary = Self::default();
        for doc in documents {
            summary.total += 1;
            match doc.health_status() {
                HealthStatus::Healthy => summary.healthy += 1,
                HealthStatus::Warning => summary.with_alerts += 1,
                HealthStatus::Critical => {
                    summary.with_alerts += 1;
                    summary.critical += 1;
                }
            }
            if !doc.synced {
                summary.unsynced += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::AlertKind;

    #[test]
    fn test_document_id_rejects_blank() {
        assert!(DocumentId::new("  ").is_err());
        assert_eq!(DocumentId::new("animal_1").unwrap().as_str(), "animal_1");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = DocumentId::generate("animal");
        let b = DocumentId::generate("animal");
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("animal_"));
    }

    #[test]
    fn test_seeded_id_format() {
        assert_eq!(DocumentId::seeded("animal", 3).as_str(), "animal_3");
    }

    #[test]
    fn test_health_status_uses_highest_severity() {
        let mut doc = Document::new("C-01", "cow");
        assert_eq!(doc.health_status(), HealthStatus::Healthy);

        doc.alerts.push(Alert::new(AlertKind::WeightLoss, Severity::Warning, "drop"));
        assert_eq!(doc.health_status(), HealthStatus::Warning);

        doc.alerts.push(Alert::new(AlertKind::Fever, Severity::Critical, "hot"));
        assert_eq!(doc.health_status(), HealthStatus::Critical);
    }

    #[test]
    fn test_legacy_fields_and_extras_survive_roundtrip() {
        let raw = r#"{
            "_id": "animal_7",
            "tag": "G-07",
            "species": "goat",
            "gender": "F",
            "age_months": 14,
            "breed": "Boer",
            "vitals_history": [
                {"ts": 1700000000000, "temp": 38.9, "hr": 80, "weight": 41.5, "feed_intake": 2.0}
            ],
            "alerts": [
                {"type": "fever", "severity": "critical", "message": "High temperature: 40.1 °C"}
            ],
            "synced": true
        }"#;

        let doc: Document = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.id, Some(DocumentId::from("animal_7")));
        assert_eq!(doc.vitals_history[0].temperature, Some(38.9));
        assert_eq!(doc.vitals_history[0].heart_rate, Some(80));
        assert_eq!(doc.alerts[0].kind, AlertKind::Fever);
        assert_eq!(doc.extra.get("breed").and_then(|v| v.as_str()), Some("Boer"));

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["id"], "animal_7");
        assert_eq!(json["breed"], "Boer");
        assert_eq!(json["vitals_history"][0]["temperature"], 38.9);

        let back: Document = serde_json::from_value(json).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_summary_counts() {
        let healthy = Document::new("A", "cow");
        let mut warn = Document::new("B", "cow");
        warn.alerts.push(Alert::new(AlertKind::WeightLoss, Severity::Warning, "drop"));
        let mut crit = Document::new("C", "cow");
        crit.alerts.push(Alert::new(AlertKind::Fever, Severity::Critical, "hot"));
        crit.synced = true;

        let summary = HerdSummary::from_documents([&healthy, &warn, &crit]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.healthy, 1);
        assert_eq!(summary.with_alerts, 2);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.unsynced, 2);
    }
}
