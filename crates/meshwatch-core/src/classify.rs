//! Port classification — is a discovered port a navigable web endpoint?
//!
//! Pure policy, applied at presentation time. Classification never feeds
//! back into change detection; the comparison key is port numbers only.

use serde::{Deserialize, Serialize};

use crate::peer::{Peer, PortRecord};

/// URL scheme for a navigable port. Opaque ports have no scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Https,
    Http,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
        }
    }
}

/// Classify one port. First matching rule wins:
///
/// 1. port configured as https        → `Some(Https)`
/// 2. port configured as http, or the
///    service name mentions "http"    → `Some(Http)`
/// 3. anything else                   → `None` (opaque)
pub fn classify(
    port: u16,
    service: &str,
    https_ports: &[u16],
    http_ports: &[u16],
) -> Option<Scheme> {
    if https_ports.contains(&port) {
        Some(Scheme::Https)
    } else if http_ports.contains(&port) || service.to_lowercase().contains("http") {
        Some(Scheme::Http)
    } else {
        None
    }
}

/// One classified port, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedPort {
    pub port: u16,
    pub service: String,
    pub scheme: Option<Scheme>,
}

impl ClassifiedPort {
    pub fn from_record(
        record: &PortRecord,
        https_ports: &[u16],
        http_ports: &[u16],
    ) -> Self {
        Self {
            port: record.port,
            service: record.service.clone(),
            scheme: classify(record.port, &record.service, https_ports, http_ports),
        }
    }

    /// Clickable URL for navigable ports, None for opaque ones.
    pub fn url(&self, ip: &str) -> Option<String> {
        self.scheme
            .map(|s| format!("{}://{}:{}", s.as_str(), ip, self.port))
    }
}

/// Classify all of a peer's ports and order them for display:
/// navigable ports first, then ascending by port number within each group.
///
/// Display ordering only — it does not affect change detection.
pub fn classify_ports(peer: &Peer, https_ports: &[u16], http_ports: &[u16]) -> Vec<ClassifiedPort> {
    let mut classified: Vec<ClassifiedPort> = peer
        .ports
        .iter()
        .map(|r| ClassifiedPort::from_record(r, https_ports, http_ports))
        .collect();

    classified.sort_by_key(|c| (c.scheme.is_none(), c.port));
    classified
}
