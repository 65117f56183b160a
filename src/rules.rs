//! Anomaly rule engine.
//!
//! Evaluation is a pure function of a document's vitals ledger. Rules run in
//! a fixed order and that order is the order of the returned alerts. A rule
//! whose inputs are missing is simply not applicable; evaluation never fails.

use std::fmt;
use std::sync::OnceLock;

use crate::alert::{Alert, AlertKind, Severity};
use crate::config::RuleThresholds;
use crate::document::Document;
use crate::vitals::VitalsSample;

/// A single anomaly rule over an ordered vitals history.
pub trait Rule: Send + Sync + fmt::Debug {
    /// Stable rule name, used in logs.
    fn name(&self) -> &'static str;

    /// Returns an alert if the rule fires. `history` is never empty.
    fn evaluate(&self, history: &[VitalsSample]) -> Option<Alert>;
}

/// Formats `value` with one decimal, rounding exact ties away from zero.
///
/// Non-tie values are correctly rounded by `{:.1}`; ties (values whose
/// fractional part is exactly `.x5` in binary) are bumped up so messages
/// match what other clients reading the same snapshot display.
#[must_use]
pub fn format_one_decimal(value: f64) -> String {
    if value.is_sign_negative() && value != 0.0 {
        return format!("-{}", format_one_decimal(-value));
    }
    let scaled = value * 10.0;
    let exact_tie = (value * 4.0).fract() == 0.0 && scaled.fract() == 0.5;
    if exact_tie {
        format!("{:.1}", (scaled.floor() + 1.0) / 10.0)
    } else {
        format!("{value:.1}")
    }
}

/// Critical alert when the latest temperature exceeds the threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeverRule {
    /// Strict lower bound for a fever (°C).
    pub threshold_celsius: f64,
}

impl Rule for FeverRule {
    fn name(&self) -> &'static str {
        "fever"
    }

    fn evaluate(&self, history: &[VitalsSample]) -> Option<Alert> {
        let temp = history.last()?.temperature?;
        if temp > self.threshold_celsius {
            Some(Alert::new(
                AlertKind::Fever,
                Severity::Critical,
                format!("High temperature detected: {} °C", format_one_decimal(temp)),
            ))
        } else {
            None
        }
    }
}

/// Warning when weight dropped by more than the allowed percentage since the first sample.
///
/// A missing first weight falls back to the latest one and vice versa. A
/// first weight of zero (or none at all) disables the rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightLossRule {
    /// Strict lower bound on the percentage drop.
    pub max_drop_percent: f64,
}

impl Rule for WeightLossRule {
    fn name(&self) -> &'static str {
        "weight-loss"
    }

    fn evaluate(&self, history: &[VitalsSample]) -> Option<Alert> {
        if history.len() < 2 {
            return None;
        }
        let first_sample = history.first()?;
        let last_sample = history.last()?;

        let first = first_sample.weight.or(last_sample.weight).unwrap_or(0.0);
        let latest = last_sample.weight.unwrap_or(first);
        if first <= 0.0 {
            return None;
        }

        let change = (latest - first) / first * 100.0;
        if change < -self.max_drop_percent {
            Some(Alert::new(
                AlertKind::WeightLoss,
                Severity::Warning,
                format!("Weight drop of {}% detected", format_one_decimal(change.abs())),
            ))
        } else {
            None
        }
    }
}

/// Ordered collection of rules.
#[derive(Debug)]
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    /// The built-in rules (fever, then weight loss) with the given thresholds.
    #[must_use]
    pub fn new(thresholds: RuleThresholds) -> Self {
        Self {
            rules: vec![
                Box::new(FeverRule {
                    threshold_celsius: thresholds.fever_celsius,
                }),
                Box::new(WeightLossRule {
                    max_drop_percent: thresholds.weight_loss_percent,
                }),
            ],
        }
    }

    /// An engine running exactly `rules`, in the given order.
    #[must_use]
    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Names of the configured rules, in evaluation order.
    #[must_use]
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Evaluates every rule against the document's vitals ledger.
    #[must_use]
    pub fn evaluate(&self, document: &Document) -> Vec<Alert> {
        let history = document.vitals_history.as_slice();
        if history.is_empty() {
            return Vec::new();
        }
        self.rules.iter().filter_map(|rule| rule.evaluate(history)).collect()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new(RuleThresholds::default())
    }
}

/// Evaluates the built-in rules with default thresholds.
#[must_use]
pub fn evaluate(document: &Document) -> Vec<Alert> {
    static DEFAULT_ENGINE: OnceLock<RuleEngine> = OnceLock::new();
    DEFAULT_ENGINE.get_or_init(RuleEngine::default).evaluate(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn history(points: &[(Option<f64>, Option<f64>)]) -> Document {
        let t0 = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let samples = points
            .iter()
            .enumerate()
            .map(|(i, (temp, weight))| VitalsSample {
                timestamp: t0 + Duration::minutes(i as i64),
                temperature: *temp,
                heart_rate: None,
                weight: *weight,
                feed_intake: None,
            })
            .collect();
        Document::new("C-1", "cow").with_vitals(samples)
    }

    #[test]
    fn test_empty_history_yields_nothing() {
        assert!(evaluate(&Document::new("C-1", "cow")).is_empty());
    }

    #[test]
    fn test_fever_boundary_is_exclusive() {
        let hot = history(&[(Some(38.0), None), (Some(39.6), None)]);
        let alerts = evaluate(&hot);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Fever);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].message, "High temperature detected: 39.6 °C");

        let edge = history(&[(Some(39.5), None)]);
        assert!(evaluate(&edge).is_empty());
    }

    #[test]
    fn test_fever_only_looks_at_latest() {
        let recovered = history(&[(Some(41.0), None), (Some(38.2), None)]);
        assert!(evaluate(&recovered).is_empty());
    }

    #[test]
    fn test_missing_temperature_is_not_applicable() {
        let doc = history(&[(None, Some(100.0))]);
        assert!(evaluate(&doc).is_empty());
    }

    #[test]
    fn test_weight_loss_boundary_is_exclusive() {
        let drop = history(&[(None, Some(100.0)), (None, Some(89.0))]);
        let alerts = evaluate(&drop);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::WeightLoss);
        assert_eq!(alerts[0].severity, Severity::Warning);
        assert_eq!(alerts[0].message, "Weight drop of 11.0% detected");

        let exact = history(&[(None, Some(100.0)), (None, Some(90.0))]);
        assert!(evaluate(&exact).is_empty());
    }

    #[test]
    fn test_weight_loss_needs_two_samples() {
        let single = history(&[(None, Some(50.0))]);
        assert!(evaluate(&single).is_empty());
    }

    #[test]
    fn test_zero_first_weight_disables_rule() {
        let doc = history(&[(None, Some(0.0)), (None, Some(5.0))]);
        assert!(evaluate(&doc).is_empty());
    }

    #[test]
    fn test_weight_fallbacks() {
        // Missing first weight falls back to latest: no change.
        let doc = history(&[(None, None), (None, Some(80.0))]);
        assert!(evaluate(&doc).is_empty());

        // Missing latest weight falls back to first: no change.
        let doc = history(&[(None, Some(80.0)), (None, None)]);
        assert!(evaluate(&doc).is_empty());

        // Neither present: rule disabled.
        let doc = history(&[(None, None), (None, None)]);
        assert!(evaluate(&doc).is_empty());
    }

    #[test]
    fn test_order_is_fever_then_weight_loss() {
        let doc = history(&[(Some(38.5), Some(300.0)), (Some(40.7), Some(250.0))]);
        let alerts = evaluate(&doc);
        let kinds: Vec<_> = alerts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![AlertKind::Fever, AlertKind::WeightLoss]);
        assert_eq!(alerts[1].message, "Weight drop of 16.7% detected");
    }

    #[test]
    fn test_evaluate_is_deterministic() {
        let doc = history(&[(Some(38.5), Some(300.0)), (Some(40.7), Some(250.0))]);
        assert_eq!(evaluate(&doc), evaluate(&doc));
    }

    #[test]
    fn test_custom_thresholds() {
        let engine = RuleEngine::new(RuleThresholds {
            fever_celsius: 41.0,
            weight_loss_percent: 5.0,
        });
        let doc = history(&[(Some(38.0), Some(100.0)), (Some(40.5), Some(94.0))]);
        let alerts = engine.evaluate(&doc);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::WeightLoss);
        assert_eq!(engine.rule_names(), vec!["fever", "weight-loss"]);
    }

    #[test]
    fn test_format_one_decimal_rounds_ties_up() {
        assert_eq!(format_one_decimal(40.25), "40.3");
        assert_eq!(format_one_decimal(40.75), "40.8");
        assert_eq!(format_one_decimal(39.96), "40.0");
        assert_eq!(format_one_decimal(11.0), "11.0");
        assert_eq!(format_one_decimal(-0.25), "-0.3");
        assert_eq!(format_one_decimal(0.0), "0.0");
    }
}
