mod ack;
mod alarm;
mod background;
mod cells;
mod config;
mod counting;
mod curves;
mod error;
mod fault;
mod hardware;
mod passage;
mod relay;
mod speed;
mod state;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use config::{SystemConfig, TomlConfigStore};
use hardware::{HardwarePort, PhysicalPort, SimulatedPort};
use state::{AlarmEventKind, SystemState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "portal_core=info".into()),
        )
        .init();

    info!("portal monitor core v{} starting", env!("CARGO_PKG_VERSION"));

    let store = TomlConfigStore::load("config.toml")?;
    let config = Arc::new(SystemConfig::resolve(&store));

    let hardware = Arc::new(if config.sim {
        info!("hardware backend: simulated");
        HardwarePort::Simulated(SimulatedPort::new())
    } else {
        info!(
            "hardware backend: physical ({}:{})",
            config.hardware_host, config.hardware_port
        );
        HardwarePort::Physical(PhysicalPort::new(&config.hardware_host, config.hardware_port))
    });

    let (state, mut alarm_events) = SystemState::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(cells::run(state.clone(), hardware.clone(), shutdown_rx.clone()));
    tokio::spawn(passage::run(state.clone(), config.clone(), shutdown_rx.clone()));
    tokio::spawn(counting::run(
        state.clone(),
        hardware.clone(),
        config.clone(),
        shutdown_rx.clone(),
    ));
    tokio::spawn(background::run(state.clone(), config.clone(), shutdown_rx.clone()));
    tokio::spawn(alarm::run(state.clone(), config.clone(), shutdown_rx.clone()));
    tokio::spawn(fault::run(state.clone(), config.clone(), shutdown_rx.clone()));
    tokio::spawn(ack::run(
        state.clone(),
        hardware.clone(),
        config.clone(),
        shutdown_rx.clone(),
    ));
    tokio::spawn(speed::run(state.clone(), config.clone(), shutdown_rx.clone()));
    tokio::spawn(relay::run(state.clone(), hardware.clone(), shutdown_rx.clone()));
    tokio::spawn(curves::run(state.clone(), shutdown_rx.clone()));

    // Drains the redesigned email/fault event channel (§9) — logged here
    // since PDF/email/SMS delivery is an external collaborator out of scope.
    tokio::spawn(async move {
        while let Some(event) = alarm_events.recv().await {
            match event.kind {
                AlarmEventKind::AlarmRaised => warn!("alarm raised on channel {}", event.channel),
                AlarmEventKind::FaultRaised => warn!("fault raised on channel {}", event.channel),
            }
        }
    });

    info!(
        "portal monitor core running, {} channels active",
        portal_wire::ChannelId::MAX
    );

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    Ok(())
}
