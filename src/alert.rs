//! Health alerts derived from the vitals ledger.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What an alert is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlertKind {
    /// Latest temperature above the fever threshold.
    Fever,
    /// Weight dropped more than the allowed percentage since the first sample.
    WeightLoss,
}

impl AlertKind {
    /// Wire name, as stored in snapshots.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fever => "fever",
            Self::WeightLoss => "weight-loss",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity. Ordered: `Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[allow(missing_docs)]
    Warning,
    #[allow(missing_docs)]
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => f.write_str("warning"),
            Self::Critical => f.write_str("critical"),
        }
    }
}

/// A single alert with a human-readable message carrying its evidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alert {
    #[allow(missing_docs)]
    #[serde(alias = "type")]
    pub kind: AlertKind,
    #[allow(missing_docs)]
    pub severity: Severity,
    #[allow(missing_docs)]
    pub message: String,
}

impl Alert {
    #[allow(missing_docs)]
    #[must_use]
    pub fn new(kind: AlertKind, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity,
            message: message.into(),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] {}", self.kind, self.severity, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn test_wire_names() {
        let alert = Alert::new(
            AlertKind::WeightLoss,
            Severity::Warning,
            "Weight drop of 11.0% detected",
        );
        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["kind"], "weight-loss");
        assert_eq!(json["severity"], "warning");
        assert_eq!(alert.to_string(), "[weight-loss/warning] Weight drop of 11.0% detected");
    }
}
