//! meshgated — LoRa mesh to pub/sub bus gateway daemon.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use meshgate_core::config::GatewayConfig;
use meshgate_services::bus::LoopbackBus;
use meshgate_services::{Gateway, GatewayHandle, HostControl, RelayCore};

mod radio;

/// Asks the supervisor loop in `main` to rebuild everything.
#[derive(Clone, Default)]
struct RestartSignal(Arc<Notify>);

impl HostControl for RestartSignal {
    fn request_restart(&self) {
        tracing::warn!("restart requested");
        self.0.notify_one();
    }
}

enum Exit {
    Shutdown,
    Restart,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    loop {
        match run().await? {
            Exit::Shutdown => break,
            Exit::Restart => {
                tracing::info!("restarting gateway");
                // Let the old sockets close before rebinding.
                tokio::time::sleep(Duration::from_millis(250)).await;
            }
        }
    }
    Ok(())
}

fn load_config() -> GatewayConfig {
    if let Err(e) = GatewayConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let mut config = GatewayConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        GatewayConfig::default()
    });

    if config.ensure_node_id() {
        let path = GatewayConfig::file_path();
        match config.save_to(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "generated node id saved"),
            Err(e) => tracing::warn!(error = %e, "failed to persist generated node id"),
        }
    }
    config
}

async fn run() -> Result<Exit> {
    let config = load_config();
    let core = RelayCore::from_config(&config);

    tracing::info!(
        node_id = format_args!("{:08X}", config.repeater.node_id),
        node_name = %config.repeater.node_name,
        gateway = %config.gateway_id(),
        prefix = %core.router().prefix(),
        max_hops = config.repeater.max_hops,
        bus = config.bus.enabled,
        "meshgated starting"
    );
    if config.access.deny_enabled {
        tracing::info!(entries = config.denied_node_ids().len(), "denylist active");
    }

    let (radio_tx, radio_rx) = radio::open(&config.radio)?;

    let (bus, deliveries) = if config.bus.enabled {
        let (bus, rx) = LoopbackBus::new();
        (Some(bus), Some(rx))
    } else {
        (None, None)
    };

    let restart = RestartSignal::default();
    let (gateway, handle) = Gateway::new(core, radio_tx, bus.clone(), restart.clone());

    // ── Spawn tasks ──────────────────────────────────────────────────────────

    let mut gateway_task = tokio::spawn(gateway.run());
    let mut tasks: Vec<JoinHandle<()>> = Vec::new();

    tasks.push(tokio::spawn(radio::receive_loop(radio_rx, handle.clone())));

    if let Some(mut deliveries) = deliveries {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            while let Some(msg) = deliveries.recv().await {
                let payload = Bytes::from(msg.payload.into_bytes());
                if handle.bus_message(msg.topic, payload).await.is_err() {
                    break;
                }
            }
        }));
    }

    if config.bus.enabled {
        tasks.push(spawn_ticker(
            handle.clone(),
            Duration::from_secs(config.bus.stats_interval_secs.max(1)),
            Tick::Stats,
        ));
    }

    if config.discovery.advert_enabled {
        tasks.push(spawn_ticker(
            handle.clone(),
            Duration::from_secs(config.discovery.advert_interval_secs.max(1)),
            Tick::Advert,
        ));
    }

    {
        let state = meshgate_api::ApiState {
            gateway: handle.clone(),
            bus: bus.clone(),
        };
        let port = config.api.port;
        tasks.push(tokio::spawn(async move {
            if let Err(e) = meshgate_api::serve(state, port).await {
                tracing::error!(error = %e, "API server failed");
            }
        }));
    }

    // ── Wait for exit ────────────────────────────────────────────────────────

    let exit = tokio::select! {
        r = tokio::signal::ctrl_c() => {
            r.context("failed to listen for ctrl-c")?;
            tracing::info!("shutdown signal received");
            Exit::Shutdown
        }
        _ = restart.0.notified() => Exit::Restart,
        r = &mut gateway_task => {
            tracing::error!("gateway task exited: {:?}", r);
            Exit::Shutdown
        }
    };

    for task in &tasks {
        task.abort();
    }
    if !gateway_task.is_finished() {
        let _ = handle.shutdown().await;
        if tokio::time::timeout(Duration::from_secs(2), &mut gateway_task)
            .await
            .is_err()
        {
            tracing::warn!("gateway did not stop in time");
            gateway_task.abort();
        }
    }

    Ok(exit)
}

#[derive(Clone, Copy)]
enum Tick {
    Stats,
    Advert,
}

fn spawn_ticker(handle: GatewayHandle, period: Duration, tick: Tick) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // First tick fires immediately; the first report is due one period in.
        interval.tick().await;
        loop {
            interval.tick().await;
            let sent = match tick {
                Tick::Stats => handle.publish_stats().await,
                Tick::Advert => handle.send_advert().await,
            };
            if sent.is_err() {
                return;
            }
        }
    })
}
