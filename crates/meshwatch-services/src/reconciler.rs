//! Reconciler — the scheduler that owns poll cadence and state memory.
//!
//! One logical loop triggers cycles: a fixed interval plus an on-demand
//! trigger. The trigger is rejected, not queued, while a cycle is in
//! flight. StateMemory is owned by this task alone — single-writer, no
//! concurrent cycle can touch it. Downstream consumers see snapshots
//! wholesale through a watch channel, and only when something changed:
//! re-rendering is expensive relative to polling, so no-op cycles stay
//! silent.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, watch, Notify};

use meshwatch_core::peer::Snapshot;
use meshwatch_core::state::{changed, StateMemory};

use crate::builder::SnapshotBuilder;

/// Receiver half of the published snapshot. `None` until the first
/// successful changed cycle.
pub type SnapshotReceiver = watch::Receiver<Option<Arc<Snapshot>>>;

// ── Cycle stats ───────────────────────────────────────────────────────────────

/// Counters for operator visibility, shared with the health endpoint.
pub struct CycleStats {
    started: Instant,
    cycles: AtomicU64,
    changes: AtomicU64,
    failures: AtomicU64,
}

impl CycleStats {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            started: Instant::now(),
            cycles: AtomicU64::new(0),
            changes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    pub fn changes(&self) -> u64 {
        self.changes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

// ── Refresh handle ────────────────────────────────────────────────────────────

/// On-demand trigger for an immediate cycle, debounced against in-flight
/// work. Cheap to clone; handed to the API layer.
#[derive(Clone)]
pub struct RefreshHandle {
    notify: Arc<Notify>,
    busy: Arc<AtomicBool>,
}

impl RefreshHandle {
    /// Request an immediate cycle. Returns false — and does nothing — if
    /// a cycle is already running.
    pub fn request(&self) -> bool {
        if self.busy.load(Ordering::Acquire) {
            return false;
        }
        self.notify.notify_one();
        true
    }
}

// ── Reconciler ────────────────────────────────────────────────────────────────

pub struct Reconciler {
    builder: SnapshotBuilder,
    interval: Duration,
    memory: StateMemory,
    publish: watch::Sender<Option<Arc<Snapshot>>>,
    notify: Arc<Notify>,
    busy: Arc<AtomicBool>,
    stats: Arc<CycleStats>,
}

impl Reconciler {
    pub fn new(builder: SnapshotBuilder, interval: Duration) -> Self {
        let (publish, _) = watch::channel(None);
        Self {
            builder,
            interval,
            memory: StateMemory::new(),
            publish,
            notify: Arc::new(Notify::new()),
            busy: Arc::new(AtomicBool::new(false)),
            stats: CycleStats::new(),
        }
    }

    /// Subscribe to published snapshots. The receiver sees every publish,
    /// never partial updates.
    pub fn subscribe(&self) -> SnapshotReceiver {
        self.publish.subscribe()
    }

    pub fn refresh_handle(&self) -> RefreshHandle {
        RefreshHandle {
            notify: self.notify.clone(),
            busy: self.busy.clone(),
        }
    }

    pub fn stats(&self) -> Arc<CycleStats> {
        self.stats.clone()
    }

    /// Last installed state memory. Exposed for tests.
    pub fn memory(&self) -> &StateMemory {
        &self.memory
    }

    /// Drive cycles until shutdown. The first interval tick fires
    /// immediately, so the daemon polls once right after startup.
    /// A shutdown between cycles returns right away; a shutdown during a
    /// cycle lets it finish — the result is applied atomically or not at
    /// all, never partially.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.notify.notified() => {
                    tracing::info!("on-demand refresh accepted");
                }
                _ = shutdown.recv() => {
                    tracing::info!("reconciler stopping");
                    return;
                }
            }

            self.busy.store(true, Ordering::Release);
            self.run_cycle().await;
            self.busy.store(false, Ordering::Release);
        }
    }

    /// One reconciliation cycle: build, compare, maybe publish.
    pub async fn run_cycle(&mut self) {
        self.stats.cycles.fetch_add(1, Ordering::Relaxed);

        let snapshot = match self.builder.build().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "cycle abandoned, keeping previous state");
                return;
            }
        };

        let (is_changed, next) = changed(&self.memory, &snapshot);
        if is_changed {
            self.stats.changes.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                peers = snapshot.len(),
                online = snapshot.online_count(),
                "state changed, publishing snapshot"
            );
            self.memory = next;
            self.publish.send_replace(Some(Arc::new(snapshot)));
        } else {
            tracing::debug!("no change, nothing published");
        }
    }
}
