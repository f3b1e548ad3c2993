//! Fault detector (spec.md §4.G): classifies raw counts against per-channel
//! low/high bounds at ~1 Hz. Also publishes the raw value that triggered the
//! classification (§11 supplemented feature, grounded on `defauts.py`'s
//! `defaut_valeur`) for display/debugging.

use std::sync::Arc;
use std::time::Duration;

use portal_wire::{ChannelId, FaultState};
use tokio::sync::watch;

use crate::config::SystemConfig;
use crate::state::{AlarmEvent, AlarmEventKind, SystemState};

pub async fn run(state: Arc<SystemState>, config: Arc<SystemConfig>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { return; }
            }
        }

        let raw_counts = state.channels.raw_counts.read().await.clone();

        for id in ChannelId::all() {
            let Some(channel_cfg) = config.channels.get(&id) else { continue };

            if !channel_cfg.enabled {
                state.channels.fault_states.write().await.insert(id, FaultState::Ok);
                state.channels.fault_raws.write().await.insert(id, 0.0);
                continue;
            }

            let raw = *raw_counts.get(&id).unwrap_or(&0.0);
            let thresholds = &channel_cfg.thresholds;
            let classified = if raw < thresholds.low {
                FaultState::Low
            } else if raw > thresholds.high {
                FaultState::High
            } else {
                FaultState::Ok
            };

            let mut fault_states = state.channels.fault_states.write().await;
            let current = *fault_states.get(&id).unwrap_or(&FaultState::Ok);
            if current == FaultState::Ok && classified != FaultState::Ok {
                let _ = state.alarm_events.try_send(AlarmEvent {
                    channel: id,
                    kind: AlarmEventKind::FaultRaised,
                });
            }
            fault_states.insert(id, classified);
            drop(fault_states);

            state.channels.fault_raws.write().await.insert(id, raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portal_wire::Thresholds;
    use std::collections::HashMap;

    fn test_config() -> Arc<SystemConfig> {
        let mut channels = HashMap::new();
        channels.insert(
            ChannelId::new(1).unwrap(),
            crate::config::ChannelConfig {
                enabled: true,
                thresholds: Thresholds {
                    low: 10.0,
                    high: 1000.0,
                    n1: 10000.0,
                    n2_factor: 1.5,
                    reset_ratio: 0.8,
                    multiple: 1.5,
                },
            },
        );
        Arc::new(SystemConfig {
            sample_time_s: 0.1,
            distance_cellules_m: 0.75,
            mode_sans_cellules: false,
            sim: true,
            hardware_host: "localhost".into(),
            hardware_port: 8080,
            arm_delay_s: 2.0,
            min_off_s: 0.2,
            stable_s: 0.2,
            confirm_timeout_s: 15.0,
            channels,
        })
    }

    #[tokio::test]
    async fn classifies_low_when_raw_below_bound() {
        let (state, _rx) = SystemState::new();
        let ch1 = ChannelId::new(1).unwrap();
        state.channels.raw_counts.write().await.insert(ch1, 2.0);

        let config = test_config();
        let (_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(state.clone(), config, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let fault = *state.channels.fault_states.read().await.get(&ch1).unwrap();
        assert_eq!(fault, FaultState::Low);
    }

    #[tokio::test]
    async fn classifies_ok_within_bounds() {
        let (state, _rx) = SystemState::new();
        let ch1 = ChannelId::new(1).unwrap();
        state.channels.raw_counts.write().await.insert(ch1, 100.0);

        let config = test_config();
        let (_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(state.clone(), config, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        let fault = *state.channels.fault_states.read().await.get(&ch1).unwrap();
        assert_eq!(fault, FaultState::Ok);
    }
}
