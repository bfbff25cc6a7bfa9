//! Snapshot builder — one full poll of the mesh.
//!
//! Queries the overlay status once (cheap, local), then fans port scans
//! out over every online peer. Scan results are attached to their owning
//! peer only; there is no shared mutable state between scans.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use meshwatch_core::config::PortsConfig;
use meshwatch_core::peer::{PortRecord, Snapshot};

use crate::overlay::{BuildError, OverlayStatus};
use crate::scanner::PortScanner;

/// Builds a complete peer snapshot per cycle.
pub struct SnapshotBuilder {
    overlay: Arc<dyn OverlayStatus>,
    scanner: Arc<dyn PortScanner>,
    /// dns_name → extra port strings the host scan won't surface.
    extra_ports: HashMap<String, Vec<String>>,
    /// Global bound on concurrent scanner processes, held across cycles.
    scan_permits: Arc<Semaphore>,
}

impl SnapshotBuilder {
    pub fn new(
        overlay: Arc<dyn OverlayStatus>,
        scanner: Arc<dyn PortScanner>,
        ports: &PortsConfig,
        max_concurrent_scans: usize,
    ) -> Self {
        Self {
            overlay,
            scanner,
            extra_ports: ports.additional.clone(),
            scan_permits: Arc::new(Semaphore::new(max_concurrent_scans.max(1))),
        }
    }

    /// Run one full poll. Fails only on status-level problems; individual
    /// peer scans degrade to empty port lists instead.
    pub async fn build(&self) -> Result<Snapshot, BuildError> {
        let doc = self.overlay.query().await?;

        let peers = doc.all_records().iter().map(|r| r.to_peer()).collect();
        // Sort first so scan results land on their final positions.
        let mut snapshot = Snapshot::from_peers(peers);

        let mut scans: JoinSet<(usize, Vec<PortRecord>)> = JoinSet::new();
        for (index, peer) in snapshot.peers.iter().enumerate() {
            if !peer.online {
                continue;
            }
            let scanner = self.scanner.clone();
            let permits = self.scan_permits.clone();
            let dns_name = peer.dns_name.clone();
            let extra = self
                .extra_ports
                .get(&dns_name)
                .cloned()
                .unwrap_or_default();

            scans.spawn(async move {
                (index, scan_peer(scanner, permits, dns_name, extra).await)
            });
        }

        while let Some(joined) = scans.join_next().await {
            match joined {
                Ok((index, ports)) => snapshot.peers[index].ports = ports,
                Err(e) => tracing::warn!(error = %e, "peer scan task failed"),
            }
        }

        Ok(snapshot)
    }
}

/// Scan one online peer: full host scan, then every configured extra port
/// concurrently, results appended in extra-port order after the host
/// results. Each probe holds a permit only for its own duration.
async fn scan_peer(
    scanner: Arc<dyn PortScanner>,
    permits: Arc<Semaphore>,
    dns_name: String,
    extra: Vec<String>,
) -> Vec<PortRecord> {
    let mut ports = match permits.clone().acquire_owned().await {
        Ok(_permit) => scanner.scan_host(&dns_name).await,
        Err(_) => return Vec::new(),
    };

    let probes = extra.iter().map(|port| {
        let scanner = scanner.clone();
        let permits = permits.clone();
        let dns_name = dns_name.clone();
        let port = port.clone();
        async move {
            match permits.acquire_owned().await {
                Ok(_permit) => scanner.scan_port(&dns_name, &port).await,
                Err(_) => Vec::new(),
            }
        }
    });

    for extra_records in futures::future::join_all(probes).await {
        ports.extend(extra_records);
    }

    ports
}
