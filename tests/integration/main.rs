//! Meshwatch integration test harness.
//!
//! Drives full reconciliation cycles in-process against scripted
//! collaborators: the overlay source replays canned status documents, and
//! the scanner answers with canned tool output fed through the real
//! parser. No external binaries are involved — what's under test is the
//! engine end to end: status query → scan fan-out → snapshot → change
//! verdict → publish.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use meshwatch_core::classify::{classify_ports, Scheme};
use meshwatch_core::config::PortsConfig;
use meshwatch_core::peer::PortRecord;
use meshwatch_core::scan::parse_scan_output;
use meshwatch_core::status::StatusDocument;
use meshwatch_services::{
    BuildError, OverlayStatus, PortScanner, Reconciler, SnapshotBuilder,
};

// ── Harness ───────────────────────────────────────────────────────────────────

/// Replays a scripted sequence of status documents. A `None` step
/// simulates a failed status query (missing binary). The final step
/// repeats once the script runs out.
struct ScriptedOverlay {
    steps: Mutex<VecDeque<Option<String>>>,
    last: Mutex<Option<String>>,
}

impl ScriptedOverlay {
    fn new<I: IntoIterator<Item = Option<String>>>(steps: I) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.into_iter().collect()),
            last: Mutex::new(None),
        })
    }
}

#[async_trait]
impl OverlayStatus for ScriptedOverlay {
    async fn query(&self) -> Result<StatusDocument, BuildError> {
        let step = {
            let mut steps = self.steps.lock().unwrap();
            match steps.pop_front() {
                Some(step) => {
                    *self.last.lock().unwrap() = step.clone();
                    step
                }
                None => self.last.lock().unwrap().clone(),
            }
        };

        match step {
            Some(raw) => Ok(StatusDocument::parse(&raw)?),
            None => Err(BuildError::Spawn {
                command: "tailscale".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            }),
        }
    }
}

/// Answers probes from canned scanner text, run through the real parser.
#[derive(Default)]
struct TextScanner {
    hosts: HashMap<String, String>,
    singles: HashMap<(String, String), String>,
}

impl TextScanner {
    fn host(mut self, target: &str, raw: &str) -> Self {
        self.hosts.insert(target.to_string(), raw.to_string());
        self
    }

    fn single(mut self, target: &str, port: &str, raw: &str) -> Self {
        self.singles
            .insert((target.to_string(), port.to_string()), raw.to_string());
        self
    }
}

#[async_trait]
impl PortScanner for TextScanner {
    async fn scan_host(&self, target: &str) -> Vec<PortRecord> {
        parse_scan_output(self.hosts.get(target).map(String::as_str).unwrap_or(""))
    }

    async fn scan_port(&self, target: &str, port: &str) -> Vec<PortRecord> {
        parse_scan_output(
            self.singles
                .get(&(target.to_string(), port.to_string()))
                .map(String::as_str)
                .unwrap_or(""),
        )
    }
}

/// One-peer status document, the peer's liveness parameterized.
fn one_peer_doc(online: bool) -> String {
    format!(
        r#"{{
            "Self": {{
                "HostName": "gateway",
                "DNSName": "gateway.mesh.",
                "Online": true,
                "TailscaleIPs": ["100.64.0.1"]
            }},
            "Peer": {{
                "nodekey:aa": {{
                    "HostName": "nas",
                    "DNSName": "nas.mesh.",
                    "Online": {online},
                    "TailscaleIPs": ["100.64.0.7"]
                }}
            }}
        }}"#
    )
}

const NAS_SCAN: &str = "\
Starting scan
PORT    STATE SERVICE
22/tcp  open  ssh
443/tcp open  https
";

const NAS_SCAN_REORDERED: &str = "\
Starting scan
PORT    STATE SERVICE
443/tcp open  https
22/tcp  open  ssh
";

fn reconciler_with(
    overlay: Arc<dyn OverlayStatus>,
    scanner: Arc<dyn PortScanner>,
    ports: &PortsConfig,
) -> Reconciler {
    let builder = SnapshotBuilder::new(overlay, scanner, ports, 4);
    Reconciler::new(builder, Duration::from_secs(3600))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

/// Two cycles over byte-identical collaborator output: the first publishes,
/// the second is a silent no-op.
#[tokio::test]
async fn identical_cycles_publish_exactly_once() {
    let overlay = ScriptedOverlay::new([Some(one_peer_doc(true))]);
    let scanner = Arc::new(TextScanner::default().host("nas.mesh", NAS_SCAN));
    let mut reconciler =
        reconciler_with(overlay, scanner, &PortsConfig::default());
    let mut rx = reconciler.subscribe();

    reconciler.run_cycle().await;
    assert!(rx.has_changed().unwrap());
    let first = rx.borrow_and_update().clone().expect("snapshot published");
    assert_eq!(first.len(), 2);

    reconciler.run_cycle().await;
    assert!(!rx.has_changed().unwrap(), "identical cycle must stay silent");
}

/// Same open-port set in a different order is not a change.
#[tokio::test]
async fn reordered_scan_output_is_not_a_change() {
    let overlay = ScriptedOverlay::new([
        Some(one_peer_doc(true)),
        Some(one_peer_doc(true)),
    ]);
    // First cycle sees 22,443; second sees 443,22.
    let swap = Arc::new(SwappingScanner {
        outputs: Mutex::new(VecDeque::from([
            NAS_SCAN.to_string(),
            NAS_SCAN_REORDERED.to_string(),
        ])),
    });
    let mut reconciler = reconciler_with(overlay, swap, &PortsConfig::default());
    let mut rx = reconciler.subscribe();

    reconciler.run_cycle().await;
    assert!(rx.has_changed().unwrap());
    rx.borrow_and_update();

    reconciler.run_cycle().await;
    assert!(!rx.has_changed().unwrap());
}

struct SwappingScanner {
    outputs: Mutex<VecDeque<String>>,
}

#[async_trait]
impl PortScanner for SwappingScanner {
    async fn scan_host(&self, _target: &str) -> Vec<PortRecord> {
        let raw = self.outputs.lock().unwrap().pop_front().unwrap_or_default();
        parse_scan_output(&raw)
    }

    async fn scan_port(&self, _target: &str, _port: &str) -> Vec<PortRecord> {
        Vec::new()
    }
}

/// A peer flipping offline republishes: same IP, but its comparison key
/// collapses to an empty port list.
#[tokio::test]
async fn peer_going_offline_republishes() {
    let overlay = ScriptedOverlay::new([
        Some(one_peer_doc(true)),
        Some(one_peer_doc(false)),
    ]);
    let scanner = Arc::new(TextScanner::default().host("nas.mesh", NAS_SCAN));
    let mut reconciler =
        reconciler_with(overlay, scanner, &PortsConfig::default());
    let mut rx = reconciler.subscribe();

    reconciler.run_cycle().await;
    rx.borrow_and_update();

    reconciler.run_cycle().await;
    assert!(rx.has_changed().unwrap());

    let snapshot = rx.borrow_and_update().clone().unwrap();
    let nas = snapshot.peers.iter().find(|p| p.ip == "100.64.0.7").unwrap();
    assert!(!nas.online);
    assert!(nas.ports.is_empty());
    // Offline peers sort behind online ones.
    assert_eq!(snapshot.peers.last().unwrap().ip, "100.64.0.7");
}

/// A failed status query abandons the cycle: state memory is untouched
/// and nothing is published, but the reconciler keeps going and the next
/// successful cycle behaves as if the failure never happened.
#[tokio::test]
async fn failed_status_query_preserves_state() {
    let overlay = ScriptedOverlay::new([
        Some(one_peer_doc(true)),
        None,
        Some(one_peer_doc(true)),
    ]);
    let scanner = Arc::new(TextScanner::default().host("nas.mesh", NAS_SCAN));
    let mut reconciler =
        reconciler_with(overlay, scanner, &PortsConfig::default());
    let mut rx = reconciler.subscribe();
    let stats = reconciler.stats();

    reconciler.run_cycle().await;
    rx.borrow_and_update();
    let memory_before = reconciler.memory().clone();

    reconciler.run_cycle().await; // fails
    assert_eq!(*reconciler.memory(), memory_before);
    assert!(!rx.has_changed().unwrap());
    assert_eq!(stats.failures(), 1);

    reconciler.run_cycle().await; // recovers, identical state
    assert!(!rx.has_changed().unwrap());
    assert_eq!(stats.cycles(), 3);
}

/// Configured extra ports are probed and feed the comparison key: dropping
/// the extra service later is detected as a change.
#[tokio::test]
async fn extra_port_feeds_change_detection() {
    let overlay = ScriptedOverlay::new([Some(one_peer_doc(true))]);

    let with_extra = Arc::new(
        TextScanner::default()
            .host("nas.mesh", NAS_SCAN)
            .single("nas.mesh", "8096", "PORT STATE SERVICE\n8096/tcp open http\n"),
    );
    let without_extra = Arc::new(TextScanner::default().host("nas.mesh", NAS_SCAN));

    let mut ports = PortsConfig::default();
    ports
        .additional
        .insert("nas.mesh".to_string(), vec!["8096".to_string()]);

    let mut reconciler = reconciler_with(overlay.clone(), with_extra, &ports);
    reconciler.run_cycle().await;
    let nas_key = &reconciler.memory()["100.64.0.7"];
    assert_eq!(nas_key.ports, vec![22, 443, 8096]);

    // Same overlay state, but the extra service no longer answers.
    let builder = SnapshotBuilder::new(overlay, without_extra, &ports, 4);
    let snapshot = builder.build().await.unwrap();
    let (is_changed, _) =
        meshwatch_core::state::changed(reconciler.memory(), &snapshot);
    assert!(is_changed);
}

/// The published snapshot classifies at presentation time: configured
/// https beats the service heuristic, navigable ports display first.
#[tokio::test]
async fn published_snapshot_classifies_for_display() {
    let overlay = ScriptedOverlay::new([Some(one_peer_doc(true))]);
    let scanner = Arc::new(TextScanner::default().host("nas.mesh", NAS_SCAN));
    let ports = PortsConfig::default(); // https = [443]
    let mut reconciler = reconciler_with(overlay, scanner, &ports);
    let rx = reconciler.subscribe();

    reconciler.run_cycle().await;
    let snapshot = rx.borrow().clone().unwrap();
    let nas = snapshot.peers.iter().find(|p| p.ip == "100.64.0.7").unwrap();

    let classified = classify_ports(nas, &ports.https, &ports.http);
    let view: Vec<(u16, Option<Scheme>)> =
        classified.iter().map(|c| (c.port, c.scheme)).collect();
    assert_eq!(view, vec![(443, Some(Scheme::Https)), (22, None)]);
    assert_eq!(
        classified[0].url(&nas.ip).as_deref(),
        Some("https://100.64.0.7:443")
    );
    assert_eq!(classified[1].url(&nas.ip), None);
}

/// An on-demand refresh during an in-flight cycle is rejected, not queued.
#[tokio::test]
async fn refresh_is_rejected_while_cycle_runs() {
    struct SlowScanner;

    #[async_trait]
    impl PortScanner for SlowScanner {
        async fn scan_host(&self, _target: &str) -> Vec<PortRecord> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Vec::new()
        }

        async fn scan_port(&self, _target: &str, _port: &str) -> Vec<PortRecord> {
            Vec::new()
        }
    }

    let overlay = ScriptedOverlay::new([Some(one_peer_doc(true))]);
    let reconciler = reconciler_with(
        overlay,
        Arc::new(SlowScanner),
        &PortsConfig::default(),
    );
    let refresh = reconciler.refresh_handle();

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let task = tokio::spawn(reconciler.run(shutdown_tx.subscribe()));

    // The first interval tick fires immediately; give the cycle time to
    // reach the slow scan, then poke it.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(!refresh.request(), "mid-cycle refresh must be rejected");

    let _ = shutdown_tx.send(());
    tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("reconciler should stop after the in-flight cycle")
        .unwrap();
}
