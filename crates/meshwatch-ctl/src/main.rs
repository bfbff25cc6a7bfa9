//! meshwatch-ctl — command-line interface for the Meshwatch daemon.

use anyhow::{Context, Result};
use serde::Deserialize;

const DEFAULT_PORT: u16 = 9400;

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct StatusResponse {
    published:    bool,
    peers_total:  usize,
    peers_online: usize,
    cycles:       u64,
    changes:      u64,
    failures:     u64,
}

#[derive(Deserialize)]
struct PeersResponse {
    peers: Vec<PeerView>,
}

#[derive(Deserialize)]
struct PeerView {
    hostname: String,
    dns_name: String,
    ip:       String,
    online:   bool,
    ports:    Vec<PortView>,
}

#[derive(Deserialize)]
struct PortView {
    port:    u16,
    service: String,
    url:     Option<String>,
}

#[derive(Deserialize)]
struct RefreshResponse {
    accepted: bool,
}

#[derive(Deserialize)]
struct HealthResponse {
    uptime_secs: u64,
    cycles:      u64,
    changes:     u64,
    failures:    u64,
}

// ── HTTP helpers ──────────────────────────────────────────────────────────────

fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/api", port)
}

async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::get(url)
    .await
    .with_context(|| format!("failed to connect to meshwatchd at {} — is it running?", url))?
    .json::<T>()
    .await
    .context("failed to parse response")
}

async fn post_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::Client::new()
    .post(url)
    .send()
    .await
    .with_context(|| format!("failed to connect to meshwatchd at {} — is it running?", url))?
    .json::<T>()
    .await
    .context("failed to parse response")
}

// ── Subcommand handlers ───────────────────────────────────────────────────────

async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Meshwatch Daemon Status");
    println!("═══════════════════════════════════════");
    println!("  Snapshot published : {}", if resp.published { "yes" } else { "not yet" });
    println!("  Peers tracked      : {}", resp.peers_total);
    println!("  Peers online       : {}", resp.peers_online);
    println!("  Cycles run         : {}", resp.cycles);
    println!("  Changes published  : {}", resp.changes);
    println!("  Cycles failed      : {}", resp.failures);

    Ok(())
}

async fn cmd_peers(port: u16) -> Result<()> {
    let resp: PeersResponse = get_json(&format!("{}/peers", base_url(port))).await?;

    if resp.peers.is_empty() {
        println!("No snapshot published yet — try `meshwatch-ctl refresh`.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Mesh Peers ({})", resp.peers.len());
    println!("═══════════════════════════════════════");

    for p in &resp.peers {
        println!("  ┌─ {}", p.hostname);
        println!("  │  dns    : {}", p.dns_name);
        println!("  │  ip     : {}", p.ip);
        println!("  │  state  : {}", if p.online { "online" } else { "offline" });
        if p.ports.is_empty() {
            println!("  └─ ports  : none");
        } else {
            println!("  └─ ports  :");
            for port_view in &p.ports {
                match &port_view.url {
                    Some(url) => println!("       {} ({}) → {}", port_view.port, port_view.service, url),
                    None      => println!("       {} ({})", port_view.port, port_view.service),
                }
            }
        }
    }

    Ok(())
}

async fn cmd_refresh(port: u16) -> Result<()> {
    let resp: RefreshResponse = post_json(&format!("{}/refresh", base_url(port))).await?;
    if resp.accepted {
        println!("Refresh started.");
    } else {
        println!("A cycle is already running — request dropped.");
    }
    Ok(())
}

async fn cmd_health(port: u16) -> Result<()> {
    let resp: HealthResponse = get_json(&format!("{}/health", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Meshwatch Health");
    println!("═══════════════════════════════════════");
    println!("  Uptime   : {}s", resp.uptime_secs);
    println!("  Cycles   : {}", resp.cycles);
    println!("  Changes  : {}", resp.changes);
    println!("  Failures : {}", resp.failures);

    Ok(())
}

fn print_usage() {
    println!("Usage: meshwatch-ctl [--port <port>] <command>");
    println!();
    println!("Commands:");
    println!("  status    Show daemon status and cycle counters");
    println!("  peers     List mesh peers from the published snapshot");
    println!("  refresh   Trigger an immediate reconciliation cycle");
    println!("  health    Show daemon health counters");
    println!();
    println!("Options:");
    println!("  --port <port>   Daemon API port (default: {})", DEFAULT_PORT);
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Parse --port option
    let mut port = DEFAULT_PORT;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--port" {
            i += 1;
            port = args.get(i)
            .context("--port requires a value")?
            .parse()
            .context("--port must be a number")?;
        } else {
            remaining.push(&args[i]);
        }
        i += 1;
    }

    match remaining.as_slice() {
        ["status"] | []                => cmd_status(port).await,
        ["peers"]                      => cmd_peers(port).await,
        ["refresh"]                    => cmd_refresh(port).await,
        ["health"]                     => cmd_health(port).await,
        ["help"] | ["--help"] | ["-h"] => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
