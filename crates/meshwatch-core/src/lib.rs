//! meshwatch-core — shared types and the pure reconciliation logic.
//! All other Meshwatch crates depend on this one.

pub mod classify;
pub mod config;
pub mod peer;
pub mod scan;
pub mod state;
pub mod status;

pub use classify::{classify, ClassifiedPort, Scheme};
pub use peer::{Peer, PortRecord, Snapshot};
pub use state::{changed, reduce, ComparisonKey, StateMemory};
