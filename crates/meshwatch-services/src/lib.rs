//! meshwatch-services — the reconciliation engine and its collaborators.
//!
//! The overlay status source and the port scanner are external commands
//! behind trait seams; the snapshot builder fans scans out over online
//! peers; the reconciler owns the cadence, the change verdict, and the
//! published snapshot.

pub mod builder;
pub mod overlay;
pub mod reconciler;
pub mod scanner;

pub use builder::SnapshotBuilder;
pub use overlay::{BuildError, CommandStatus, OverlayStatus};
pub use reconciler::{CycleStats, Reconciler, RefreshHandle, SnapshotReceiver};
pub use scanner::{NmapScanner, PortScanner};
