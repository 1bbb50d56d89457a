//! Gateway status and neighbour table.

use anyhow::Result;
use serde::Deserialize;

use super::http::{base_url, get_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusResponse {
    node_id: u32,
    node_name: String,
    gateway_id: String,
    prefix: String,
    uptime_secs: u64,
    bus_connected: bool,
    stats: Counters,
    neighbors: Vec<Neighbor>,
    subscriptions: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Counters {
    packets_received: u32,
    packets_sent: u32,
    packets_forwarded: u32,
    packets_failed: u32,
}

#[derive(Deserialize)]
struct NeighborsResponse {
    count: usize,
    neighbors: Vec<Neighbor>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Neighbor {
    node_id: u32,
    name: String,
    rssi: i32,
    snr: f32,
    latitude: f64,
    longitude: f64,
    last_seen: u64,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_status(port: u16) -> Result<()> {
    let resp: StatusResponse = get_json(&format!("{}/status", base_url(port))).await?;

    println!("═══════════════════════════════════════");
    println!("  Meshgate Status");
    println!("═══════════════════════════════════════");
    println!("  Node         : {} ({:08X})", resp.node_name, resp.node_id);
    println!("  Gateway id   : {}", resp.gateway_id);
    println!("  Prefix       : {}", resp.prefix);
    println!("  Uptime       : {}s", resp.uptime_secs);
    println!(
        "  Bus          : {}",
        if resp.bus_connected { "connected" } else { "offline" }
    );
    println!("  Neighbors    : {}", resp.neighbors.len());
    println!();
    println!("  Received     : {}", resp.stats.packets_received);
    println!("  Sent         : {}", resp.stats.packets_sent);
    println!("  Forwarded    : {}", resp.stats.packets_forwarded);
    println!("  Failed       : {}", resp.stats.packets_failed);

    if !resp.subscriptions.is_empty() {
        println!("\n  Subscriptions:");
        for s in &resp.subscriptions {
            println!("    {}", s);
        }
    }

    Ok(())
}

pub async fn cmd_neighbors(port: u16) -> Result<()> {
    let resp: NeighborsResponse = get_json(&format!("{}/neighbors", base_url(port))).await?;

    if resp.neighbors.is_empty() {
        println!("No neighbors heard yet.");
        return Ok(());
    }

    println!("═══════════════════════════════════════");
    println!("  Neighbors ({})", resp.count);
    println!("═══════════════════════════════════════");

    for n in &resp.neighbors {
        println!("  ┌─ {:08X} {}", n.node_id, n.name);
        println!("  │  rssi      : {} dBm", n.rssi);
        println!("  │  snr       : {:.1} dB", n.snr);
        println!("  │  position  : {:.6}, {:.6}", n.latitude, n.longitude);
        println!("  └─ last seen : {} ms", n.last_seen);
    }

    Ok(())
}
