//! Alarm evaluator (spec.md §4.F): compares rate against N1/N2 and the
//! follower threshold with hysteresis and passage gating, latches upward,
//! and raises one-shot alarm events on an upward edge (§9 "email/SMS edge
//! flags" redesign — a bounded channel, not a boolean).
//!
//! Coalesced into one task iterating all twelve channels per tick (§9).

use std::sync::Arc;
use std::time::Duration;

use portal_wire::{AlarmState, ChannelId};
use tokio::sync::watch;

use crate::config::SystemConfig;
use crate::state::{AlarmEvent, AlarmEventKind, SystemState};

pub async fn run(state: Arc<SystemState>, config: Arc<SystemConfig>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_secs_f64(config.sample_time_s));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { return; }
            }
        }

        // passage_gate() is bound to the passage service only when cells are
        // in play; Mode_sans_cellules == 1 means the gate is simply absent.
        let gate_open = if config.mode_sans_cellules {
            true
        } else {
            state.passage.is_passage().await
        };

        let rates = state.channels.rates.read().await.clone();
        let backgrounds = state.channels.backgrounds.read().await.clone();

        for id in ChannelId::all() {
            let Some(channel_cfg) = config.channels.get(&id) else { continue };

            if !channel_cfg.enabled {
                state.channels.alarm_states.write().await.insert(id, AlarmState::Ok);
                continue;
            }

            let rate = *rates.get(&id).unwrap_or(&0.0);
            let background = *backgrounds.get(&id).unwrap_or(&0.0);
            let thresholds = &channel_cfg.thresholds;
            let n2 = thresholds.n2();
            let follower = thresholds.follower(background);

            let prospective = if rate >= n2 && gate_open {
                AlarmState::N2
            } else if (rate >= thresholds.n1 || rate >= follower) && gate_open {
                AlarmState::N1
            } else {
                AlarmState::Ok
            };

            let mut alarm_states = state.channels.alarm_states.write().await;
            let current = *alarm_states.get(&id).unwrap_or(&AlarmState::Ok);
            // Compare-and-set: never write a state lower than observed (§5);
            // only Acknowledge may lower it.
            let new_state = current.max(prospective);
            if new_state > current {
                let _ = state.alarm_events.try_send(AlarmEvent {
                    channel: id,
                    kind: AlarmEventKind::AlarmRaised,
                });
            }
            alarm_states.insert(id, new_state);
            drop(alarm_states);

            state.channels.alarm_measures.write().await.insert(id, rate);
        }
    }
}
