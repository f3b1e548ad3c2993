//! Background tracker (spec.md §4.E): per-channel slow average of rate when
//! not in passage and not alarming. Reads `is_passage()` and `alarm_state`
//! but never writes them — no circularity with the passage service or the
//! alarm evaluator (spec.md §3 Invariant 2).
//!
//! Time constant: the spec wants "~1% weight per second" (minutes-scale).
//! Implemented as a per-tick weight of `0.01 × sample_time_s`, so the
//! cumulative weight over one second of ticks is ≈ 1%, recorded in
//! DESIGN.md.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use portal_wire::{AlarmState, ChannelId};
use tokio::sync::watch;

use crate::config::SystemConfig;
use crate::state::SystemState;

pub async fn run(state: Arc<SystemState>, config: Arc<SystemConfig>, mut shutdown: watch::Receiver<bool>) {
    let beta = 0.01 * config.sample_time_s;
    let mut initialized: HashMap<ChannelId, bool> = ChannelId::all().map(|id| (id, false)).collect();
    let mut interval = tokio::time::interval(Duration::from_secs_f64(config.sample_time_s));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { return; }
            }
        }

        let is_passage = state.passage.is_passage().await;
        let rates = state.channels.rates.read().await.clone();
        let alarm_states = state.channels.alarm_states.read().await.clone();

        for id in ChannelId::all() {
            let eligible = !is_passage
                && *alarm_states.get(&id).unwrap_or(&AlarmState::Ok) == AlarmState::Ok;
            if !eligible {
                continue;
            }

            let rate = *rates.get(&id).unwrap_or(&0.0);
            let mut backgrounds = state.channels.backgrounds.write().await;
            let was_initialized = *initialized.get(&id).unwrap_or(&false);
            if !was_initialized {
                backgrounds.insert(id, rate);
                initialized.insert(id, true);
            } else {
                let current = *backgrounds.get(&id).unwrap_or(&0.0);
                backgrounds.insert(id, current + beta * (rate - current));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap as StdHashMap;

    fn test_config() -> Arc<SystemConfig> {
        Arc::new(SystemConfig {
            sample_time_s: 0.02,
            distance_cellules_m: 0.75,
            mode_sans_cellules: false,
            sim: true,
            hardware_host: "localhost".into(),
            hardware_port: 8080,
            arm_delay_s: 2.0,
            min_off_s: 0.2,
            stable_s: 0.2,
            confirm_timeout_s: 15.0,
            channels: StdHashMap::new(),
        })
    }

    #[tokio::test]
    async fn background_drifts_toward_rate_when_quiescent() {
        let (state, _rx) = SystemState::new();
        let ch1 = ChannelId::new(1).unwrap();
        state.channels.rates.write().await.insert(ch1, 100.0);

        let config = test_config();
        let (_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(state.clone(), config, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(60)).await;
        let bg = *state.channels.backgrounds.read().await.get(&ch1).unwrap();
        assert!(bg > 0.0, "background should have started tracking toward 100, got {bg}");
    }

    #[tokio::test]
    async fn background_holds_during_passage() {
        let (state, _rx) = SystemState::new();
        let ch1 = ChannelId::new(1).unwrap();
        state.channels.rates.write().await.insert(ch1, 100.0);
        state.channels.backgrounds.write().await.insert(ch1, 50.0);

        // Force passage active by writing the shared passage state directly
        // via cell levels is out of scope for this unit test; instead
        // simulate by holding alarm_state at N1 so the eligibility gate
        // closes regardless of passage.
        state.channels.alarm_states.write().await.insert(ch1, AlarmState::N1);

        let config = test_config();
        let (_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(state.clone(), config, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(60)).await;
        let bg = *state.channels.backgrounds.read().await.get(&ch1).unwrap();
        assert_eq!(bg, 50.0, "background must hold while alarm_state != OK");
    }
}
