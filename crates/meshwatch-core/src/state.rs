//! Change detection — canonical comparison keys over a snapshot.
//!
//! The reconciler only republishes when something meaningful moved:
//! a peer appeared or vanished, flipped its online flag, or changed its
//! open-port set. Hostname and DNS-name edits are deliberately invisible
//! here — they don't affect what a consumer can reach.

use std::collections::HashMap;

use crate::peer::{Peer, Snapshot};

/// Canonical reduced form of one peer's state.
///
/// `ports` is always sorted ascending so equality is order-independent,
/// and always empty for offline peers regardless of any scanned data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComparisonKey {
    pub ip: String,
    pub online: bool,
    pub ports: Vec<u16>,
}

/// Last published state, keyed by peer IP. Owned by the reconciler,
/// replaced wholesale on change, never partially updated.
pub type StateMemory = HashMap<String, ComparisonKey>;

/// Reduce one peer to its comparison key.
pub fn reduce(peer: &Peer) -> ComparisonKey {
    let mut ports: Vec<u16> = if peer.online {
        peer.ports.iter().map(|r| r.port).collect()
    } else {
        Vec::new()
    };
    ports.sort_unstable();

    ComparisonKey {
        ip: peer.ip.clone(),
        online: peer.online,
        ports,
    }
}

/// Compare a fresh snapshot against the previously held state.
///
/// Returns the change verdict together with the snapshot's own state map,
/// which the caller installs iff the verdict is true.
pub fn changed(previous: &StateMemory, snapshot: &Snapshot) -> (bool, StateMemory) {
    let current: StateMemory = snapshot
        .peers
        .iter()
        .map(|p| (p.ip.clone(), reduce(p)))
        .collect();

    (current != *previous, current)
}
