//! The fever simulation cycle.
//!
//! One call to [`SimulationDriver::simulate`] moves the driver
//! `Idle → InFlight → Idle`: it appends a synthesized sample to a document,
//! marks it unsynced, replaces its alerts with a fresh rule evaluation and
//! persists the result. The whole cycle runs inside one
//! [`RecordStore::update`], so either the complete updated document is
//! persisted or nothing changes.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::config::SimulationConfig;
use crate::document::{Document, DocumentId};
use crate::error::{VitalsError, VitalsResult};
use crate::rules::RuleEngine;
use crate::simulation::source::{RandomSource, VitalsSource};
use crate::storage::RecordStore;
use crate::vitals::{self, VitalsSample};

/// Observable driver state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// No cycle running.
    Idle,
    /// At least one cycle is between fetch and persist.
    InFlight,
}

/// Builds the next sample from the last known one.
///
/// Temperature is drawn from `[fever_base, fever_base + spread)` and heart
/// rate from `[heart_rate_base, heart_rate_base + heart_rate_spread)`. Weight
/// carries forward unchanged and feed intake drops by `feed_decrement`,
/// floored at `feed_floor`. Without a previous sample the baseline vitals
/// stand in for it. A field missing from the previous sample stays missing.
///
/// The timestamp is `now`, or the previous timestamp if the clock is behind
/// it, so appending the sample never breaks chronological order.
pub fn synthesize<S>(
    config: &SimulationConfig,
    last: Option<&VitalsSample>,
    source: &mut S,
    now: DateTime<Utc>,
) -> VitalsSample
where
    S: VitalsSource + ?Sized,
{
    let temperature = config.fever_base_celsius + source.next_unit() * config.fever_spread_celsius;
    let heart_rate = config
        .heart_rate_base
        .saturating_add(source.next_below(config.heart_rate_spread));

    let (timestamp, weight, feed) = match last {
        Some(prev) => (prev.timestamp.max(now), prev.weight, prev.feed_intake),
        None => (
            now,
            Some(config.baseline.weight),
            Some(config.baseline.feed_intake),
        ),
    };

    VitalsSample {
        timestamp,
        temperature: Some(temperature),
        heart_rate: Some(heart_rate),
        weight,
        feed_intake: feed.map(|f| (f - config.feed_decrement).max(config.feed_floor)),
    }
}

/// Marks a cycle as in flight for as long as it lives.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs simulation cycles against a shared store.
#[derive(Debug)]
pub struct SimulationDriver<S = RandomSource> {
    store: Arc<RecordStore>,
    source: Mutex<S>,
    config: SimulationConfig,
    engine: RuleEngine,
    in_flight: AtomicUsize,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl SimulationDriver<RandomSource> {
    /// Driver with default configuration and an entropy-seeded source.
    #[must_use]
    pub fn new(store: Arc<RecordStore>) -> Self {
        let config = SimulationConfig::default();
        Self::build(store, RandomSource::new(), config)
    }
}

impl<S: VitalsSource> SimulationDriver<S> {
    /// Driver with an injected random source.
    ///
    /// # Errors
    /// `Validation` if `config` is invalid.
    pub fn with_source(
        store: Arc<RecordStore>,
        source: S,
        config: SimulationConfig,
    ) -> VitalsResult<Self> {
        let config = config.validate()?;
        Ok(Self::build(store, source, config))
    }

    fn build(store: Arc<RecordStore>, source: S, config: SimulationConfig) -> Self {
        let engine = RuleEngine::new(config.thresholds);
        Self {
            store,
            source: Mutex::new(source),
            config,
            engine,
            in_flight: AtomicUsize::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// The store this driver writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> DriverState {
        if self.in_flight.load(Ordering::SeqCst) == 0 {
            DriverState::Idle
        } else {
            DriverState::InFlight
        }
    }

    /// Cycles that persisted a document.
    #[must_use]
    pub fn completed_cycles(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    /// Cycles that reported a failure.
    #[must_use]
    pub fn failed_cycles(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Runs one fever cycle on document `id` and returns the persisted result.
    ///
    /// # Errors
    /// - `NotFound` if `id` is absent (nothing is written)
    /// - `PersistenceUnavailable` if the store cannot persist (state unchanged)
    /// - `ReentrantMutation` if called from inside a change handler
    pub fn simulate(&self, id: &DocumentId) -> VitalsResult<Document> {
        let _flight = InFlight::enter(&self.in_flight);

        let result = self.store.update(id, |doc| self.advance(doc));

        match &result {
            Ok(doc) => {
                self.completed.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    id = %id,
                    samples = doc.vitals_history.len(),
                    alerts = doc.alerts.len(),
                    "simulation cycle persisted"
                );
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(id = %id, error = %err, "simulation cycle failed");
            }
        }
        result
    }

    fn advance(&self, doc: &mut Document) -> VitalsResult<()> {
        let sample = {
            let mut source = self
                .source
                .lock()
                .map_err(|_| VitalsError::internal("poisoned lock: simulation.source"))?;
            synthesize(&self.config, vitals::latest(doc), &mut *source, Utc::now())
        };

        doc.vitals_history = vitals::append(doc, sample)?;
        doc.synced = false;
        doc.alerts = self.engine.evaluate(doc);
        Ok(())
    }
}
