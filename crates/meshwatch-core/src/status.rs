//! Overlay status document — the JSON shape produced by the overlay
//! network's status command.
//!
//! Untrusted-shape input: every field is optional and defaulted, extra
//! fields are ignored. The raw document never travels past this module —
//! records are converted into typed [`Peer`] values with defaults applied
//! exactly once.

use serde::Deserialize;

use crate::peer::Peer;

/// Top-level status document: a peer map plus the local node's own record.
///
/// A `Self` entry is materialized even when the document omits it, so the
/// local node always appears in the snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatusDocument {
    #[serde(rename = "Peer")]
    pub peers: std::collections::HashMap<String, PeerStatus>,

    #[serde(rename = "Self")]
    pub self_node: PeerStatus,
}

/// One peer record as the status command reports it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PeerStatus {
    #[serde(rename = "HostName")]
    pub host_name: Option<String>,

    /// Trailing-separator-terminated, e.g. `nas.example.ts.net.`.
    #[serde(rename = "DNSName")]
    pub dns_name: Option<String>,

    #[serde(rename = "Online")]
    pub online: bool,

    #[serde(rename = "TailscaleIPs")]
    pub tailscale_ips: Vec<String>,
}

impl StatusDocument {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// All peer records plus the self record, self last. Unordered beyond
    /// that — the snapshot sort happens later.
    pub fn all_records(&self) -> Vec<&PeerStatus> {
        let mut records: Vec<&PeerStatus> = self.peers.values().collect();
        records.push(&self.self_node);
        records
    }
}

impl PeerStatus {
    /// Convert into a typed peer, applying defaults. The port list starts
    /// empty; scans fill it in afterwards.
    pub fn to_peer(&self) -> Peer {
        Peer {
            hostname: self
                .host_name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            dns_name: strip_trailing_separator(self.dns_name.as_deref().unwrap_or("")),
            ip: self
                .tailscale_ips
                .first()
                .cloned()
                .unwrap_or_default(),
            online: self.online,
            ports: Vec::new(),
        }
    }
}

/// Strip exactly one trailing character — the status command terminates
/// DNS names with a dot. An already-stripped name would lose a real
/// character here; kept as-is to match the observed output.
fn strip_trailing_separator(name: &str) -> String {
    let mut chars = name.chars();
    chars.next_back();
    chars.as_str().to_string()
}
