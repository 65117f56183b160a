//! Document storage.
//!
//! [`RecordStore`] owns the in-memory document map and persists it through a
//! [`KeyValueBackend`]. Backends provided here:
//! - [`InMemoryBackend`], always available
//! - [`persistent::FileBackend`], behind the `persistent` feature

mod memory;
mod record_store;
pub mod snapshot;
mod traits;

#[cfg(feature = "persistent")]
pub mod persistent;

pub use memory::InMemoryBackend;
pub use record_store::{RecordStore, SeedOutcome};
pub use snapshot::DocumentMap;
pub use traits::{KeyValueBackend, StorageError};
