//! Peer and snapshot types — what one poll cycle knows about the mesh.

use serde::{Deserialize, Serialize};

/// One open port discovered on a peer.
///
/// Immutable once created. Duplicate port numbers within a peer's list are
/// possible when a configured extra-port scan overlaps the host scan;
/// consumers must tolerate repeats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    pub port: u16,
    pub service: String,
    pub protocol: String,
}

/// One mesh member, including the local node itself.
///
/// Built fresh every poll cycle — a new value replaces the old, nothing is
/// mutated in place. `dns_name` has its trailing separator already stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub hostname: String,
    pub dns_name: String,
    pub ip: String,
    pub online: bool,
    pub ports: Vec<PortRecord>,
}

/// The complete set of peer states produced by one poll cycle.
///
/// The unit of publication — subscribers receive it wholesale, never
/// partial updates. Ordering invariant: all online peers precede all
/// offline peers, ties broken by lexicographic IP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub peers: Vec<Peer>,
}

impl Snapshot {
    /// Build a snapshot from an unsorted peer list, applying the
    /// ordering invariant.
    pub fn from_peers(mut peers: Vec<Peer>) -> Self {
        peers.sort_by(|a, b| b.online.cmp(&a.online).then_with(|| a.ip.cmp(&b.ip)));
        Self { peers }
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn online_count(&self) -> usize {
        self.peers.iter().filter(|p| p.online).count()
    }
}
