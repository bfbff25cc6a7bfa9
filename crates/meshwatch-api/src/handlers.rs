//! /status, /peers, /refresh, /health handlers.
//!
//! Classification happens here, at presentation time — the engine stores
//! raw port records; the scheme and URL are derived per request.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use meshwatch_core::classify::classify_ports;
use meshwatch_core::config::PortsConfig;
use meshwatch_core::peer::Snapshot;
use meshwatch_services::{CycleStats, RefreshHandle, SnapshotReceiver};

#[derive(Clone)]
pub struct ApiState {
    pub snapshot: SnapshotReceiver,
    pub refresh: RefreshHandle,
    pub stats: Arc<CycleStats>,
    pub ports: PortsConfig,
}

impl ApiState {
    fn current_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot.borrow().clone()
    }
}

// ── /status ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    pub published: bool,
    pub peers_total: usize,
    pub peers_online: usize,
    pub cycles: u64,
    pub changes: u64,
    pub failures: u64,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let snapshot = state.current_snapshot();
    let (peers_total, peers_online) = snapshot
        .as_deref()
        .map(|s| (s.len(), s.online_count()))
        .unwrap_or((0, 0));

    Json(StatusResponse {
        published: snapshot.is_some(),
        peers_total,
        peers_online,
        cycles: state.stats.cycles(),
        changes: state.stats.changes(),
        failures: state.stats.failures(),
    })
}

// ── /peers ────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct PeersResponse {
    pub peers: Vec<PeerView>,
}

#[derive(Serialize)]
pub struct PeerView {
    pub hostname: String,
    pub dns_name: String,
    pub ip: String,
    pub online: bool,
    pub ports: Vec<PortView>,
}

#[derive(Serialize)]
pub struct PortView {
    pub port: u16,
    pub service: String,
    /// "https", "http", or null for opaque services.
    pub scheme: Option<&'static str>,
    /// Clickable target for navigable ports, null otherwise.
    pub url: Option<String>,
}

pub async fn handle_peers(State(state): State<ApiState>) -> Json<PeersResponse> {
    let Some(snapshot) = state.current_snapshot() else {
        return Json(PeersResponse { peers: Vec::new() });
    };

    let peers = snapshot
        .peers
        .iter()
        .map(|peer| {
            let ports = classify_ports(peer, &state.ports.https, &state.ports.http)
                .into_iter()
                .map(|c| PortView {
                    port: c.port,
                    service: c.service.clone(),
                    scheme: c.scheme.map(|s| s.as_str()),
                    url: c.url(&peer.ip),
                })
                .collect();

            PeerView {
                hostname: peer.hostname.clone(),
                dns_name: peer.dns_name.clone(),
                ip: peer.ip.clone(),
                online: peer.online,
                ports,
            }
        })
        .collect();

    Json(PeersResponse { peers })
}

// ── /refresh ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct RefreshResponse {
    /// False when a cycle was already in flight — the request is dropped,
    /// not queued.
    pub accepted: bool,
}

pub async fn handle_refresh(State(state): State<ApiState>) -> Json<RefreshResponse> {
    let accepted = state.refresh.request();
    if accepted {
        tracing::info!("refresh requested via API");
    } else {
        tracing::debug!("refresh rejected, cycle already running");
    }
    Json(RefreshResponse { accepted })
}

// ── /health ───────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub uptime_secs: u64,
    pub cycles: u64,
    pub changes: u64,
    pub failures: u64,
}

pub async fn handle_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        uptime_secs: state.stats.uptime_secs(),
        cycles: state.stats.cycles(),
        changes: state.stats.changes(),
        failures: state.stats.failures(),
    })
}
