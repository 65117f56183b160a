//! # vitalstore - Livestock vitals record store
//!
//! vitalstore keeps one document per animal (identity, a chronological
//! vitals ledger, the alerts derived from it and a sync flag), persists the
//! whole collection as a single snapshot and notifies subscribers after every
//! committed change.
//!
//! ## Core Concepts
//!
//! - **Document**: An animal record keyed by a stable [`DocumentId`]
//! - **Vitals ledger**: Append-only, time-ordered [`VitalsSample`]s
//! - **Rule engine**: Pure evaluation of a ledger into [`Alert`]s
//! - **Record store**: Copy-on-boundary document map with one notification per mutation
//! - **Simulation driver**: Synthesizes a fever sample, re-evaluates and persists
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vitalstore::{Document, RecordStore, SimulationDriver};
//!
//! let store = Arc::new(RecordStore::in_memory());
//! store.seed_if_empty(vec![Document::new("C-01", "cow")])?;
//!
//! let _sub = store.subscribe(|event| println!("changed: {:?}", event.changed_ids()));
//!
//! let driver = SimulationDriver::new(Arc::clone(&store));
//! let doc = driver.simulate(&"animal_1".into())?;
//! assert!(!doc.synced);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Data model
pub mod alert;
pub mod document;
pub mod error;
pub mod vitals;

// Behavior
pub mod config;
pub mod notify;
pub mod rules;
pub mod simulation;
pub mod storage;

pub use alert::{Alert, AlertKind, Severity};
pub use config::{BaselineVitals, RuleThresholds, SimulationConfig, StoreConfig};
pub use document::{Document, DocumentId, HealthStatus, HerdSummary};
pub use error::{ValidationError, VitalsError, VitalsResult};
pub use notify::{ChangeEvent, ChangeKind, ChangeNotifier, ChangeStream, SubscriptionId};
pub use rules::{evaluate, FeverRule, Rule, RuleEngine, WeightLossRule};
pub use simulation::{DriverState, FixedSource, RandomSource, SimulationDriver, VitalsSource};
pub use storage::{InMemoryBackend, KeyValueBackend, RecordStore, SeedOutcome, StorageError};
pub use vitals::VitalsSample;
