//! Change notification for record store mutations.
//!
//! Each store owns one [`ChangeNotifier`]. Subscribers register either a
//! callback (run synchronously after every committed mutation) or a bounded
//! [`ChangeStream`]. Delivery to one subscriber never depends on another:
//! a panicking handler is caught and counted, and a full stream drops the
//! event instead of blocking the writer.

/// Change event types.
pub mod event;
/// Subscription registry and dispatch.
pub mod registry;
/// Channel-backed subscription handle.
pub mod stream;

pub use event::{ChangeEvent, ChangeKind, SubscriptionId};
pub use registry::ChangeNotifier;
pub use stream::ChangeStream;
