//! Counting subsystem (spec.md §4.C): turns per-channel pulse streams into
//! smoothed rates. One worker iterates all twelve channels each tick rather
//! than twelve separate tasks (§9 REDESIGN FLAG on per-channel proliferation)
//! — the contract per channel is identical to the spec's.
//!
//! Smoothing coefficient: the spec leaves τ free within "a few sample
//! periods" (§9 Open Questions). This implementation fixes τ = 3 ×
//! `sample_time` and derives α = 1 − e^(−sample_time/τ), recorded in
//! DESIGN.md.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use portal_wire::ChannelId;
use tokio::sync::watch;

use crate::config::SystemConfig;
use crate::hardware::HardwarePort;
use crate::state::SystemState;

struct ChannelCounter {
    previous_pulses: u64,
    rate_prev: f64,
    initialized: bool,
}

impl ChannelCounter {
    fn new() -> Self {
        Self {
            previous_pulses: 0,
            rate_prev: 0.0,
            initialized: false,
        }
    }
}

pub async fn run(
    state: Arc<SystemState>,
    hardware: Arc<HardwarePort>,
    config: Arc<SystemConfig>,
    mut shutdown: watch::Receiver<bool>,
) {
    let tau = 3.0 * config.sample_time_s;
    let alpha = 1.0 - (-config.sample_time_s / tau).exp();

    let mut counters: HashMap<ChannelId, ChannelCounter> =
        ChannelId::all().map(|id| (id, ChannelCounter::new())).collect();

    let mut interval = tokio::time::interval(Duration::from_secs_f64(config.sample_time_s));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { return; }
            }
        }

        for id in ChannelId::all() {
            let enabled = config.channels.get(&id).map(|c| c.enabled).unwrap_or(true);
            let counter = counters.get_mut(&id).expect("all channels pre-populated");

            if !enabled {
                counter.rate_prev = 0.0;
                counter.initialized = false;
                state.channels.raw_counts.write().await.insert(id, 0.0);
                state.channels.rates.write().await.insert(id, 0.0);
                continue;
            }

            let current = hardware.read_pulse_counter(id).await;
            let raw = if current < counter.previous_pulses {
                // Counter restart: treat delta as zero and resync.
                counter.previous_pulses = current;
                0.0
            } else {
                let delta = (current - counter.previous_pulses) as f64;
                counter.previous_pulses = current;
                delta
            };

            let rate = if counter.initialized {
                alpha * raw + (1.0 - alpha) * counter.rate_prev
            } else {
                counter.initialized = true;
                raw
            };
            counter.rate_prev = rate;

            state.channels.raw_counts.write().await.insert(id, raw);
            state.channels.rates.write().await.insert(id, rate);
        }
    }
}
