//! In-process simulator hardware backend (spec.md §4.A, §9 "global mutable
//! state for simulator inputs"). Holds cell levels, the ACK level, relay
//! setpoints, and a per-channel pulse rate model explicitly in memory —
//! no global statics, no registration magic.
//!
//! Pulse generation is lazy rather than ticked by its own background task:
//! each `read_pulse_counter` call computes the wall-clock delta since the
//! previous call and accumulates `rate_cps × dt` (spec.md §4.C), carrying a
//! fractional remainder so slow polling still converges on the right count.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use portal_wire::{CellId, ChannelId};
use tokio::sync::Mutex;

struct ChannelPulseModel {
    rate_cps: f64,
    counter: u64,
    fractional: f64,
    last_read: Instant,
}

struct State {
    cells: [u8; 2],
    ack: u8,
    relays: [u8; 8],
    channels: HashMap<ChannelId, ChannelPulseModel>,
}

/// Cheaply cloneable handle onto the shared simulator state — cloned into
/// every task that needs to read the port, and into whichever test or
/// scenario driver injects inputs.
#[derive(Clone)]
pub struct SimulatedPort {
    inner: Arc<Mutex<State>>,
}

impl SimulatedPort {
    pub fn new() -> Self {
        let now = Instant::now();
        let mut channels = HashMap::new();
        for id in ChannelId::all() {
            channels.insert(
                id,
                ChannelPulseModel {
                    rate_cps: 0.0,
                    counter: 0,
                    fractional: 0.0,
                    last_read: now,
                },
            );
        }
        Self {
            inner: Arc::new(Mutex::new(State {
                cells: [0, 0],
                ack: 0,
                relays: [0; 8],
                channels,
            })),
        }
    }

    pub async fn read_digital(&self, index: u32) -> u8 {
        let state = self.inner.lock().await;
        match index {
            crate::hardware::CELL_S1_LINE => state.cells[0],
            crate::hardware::CELL_S2_LINE => state.cells[1],
            crate::hardware::ACK_LINE => state.ack,
            _ => 0,
        }
    }

    pub async fn write_digital(&self, index: u32, value: u8) {
        let mut state = self.inner.lock().await;
        if (1..=8).contains(&index) {
            state.relays[(index - 1) as usize] = value;
        }
    }

    pub async fn read_pulse_counter(&self, channel: ChannelId) -> u64 {
        let mut state = self.inner.lock().await;
        let now = Instant::now();
        if let Some(model) = state.channels.get_mut(&channel) {
            let dt = now.duration_since(model.last_read).as_secs_f64();
            model.last_read = now;
            let accrued = model.rate_cps * dt + model.fractional;
            let whole = accrued.floor();
            model.fractional = accrued - whole;
            model.counter = model.counter.wrapping_add(whole as u64);
            model.counter
        } else {
            0
        }
    }

    // ── Scenario injection (test-facing, no GUI per spec.md §1 Non-goals) ──

    pub async fn set_cell(&self, cell: CellId, value: u8) {
        let mut state = self.inner.lock().await;
        match cell {
            CellId::S1 => state.cells[0] = value,
            CellId::S2 => state.cells[1] = value,
        }
    }

    pub async fn set_ack(&self, value: u8) {
        self.inner.lock().await.ack = value;
    }

    pub async fn set_channel_rate(&self, channel: ChannelId, rate_cps: f64) {
        let mut state = self.inner.lock().await;
        if let Some(model) = state.channels.get_mut(&channel) {
            model.rate_cps = rate_cps;
        }
    }

    pub async fn relay(&self, index: u32) -> u8 {
        let state = self.inner.lock().await;
        if (1..=8).contains(&index) {
            state.relays[(index - 1) as usize]
        } else {
            0
        }
    }
}

impl Default for SimulatedPort {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pulse_counter_accumulates_rate_over_time() {
        let port = SimulatedPort::new();
        port.set_channel_rate(ChannelId::new(1).unwrap(), 1000.0).await;
        let _ = port.read_pulse_counter(ChannelId::new(1).unwrap()).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let count = port.read_pulse_counter(ChannelId::new(1).unwrap()).await;
        assert!(count > 0, "expected pulses to accrue, got {count}");
    }

    #[tokio::test]
    async fn cell_and_ack_levels_round_trip() {
        let port = SimulatedPort::new();
        port.set_cell(CellId::S1, 1).await;
        port.set_ack(1).await;
        assert_eq!(port.read_digital(crate::hardware::CELL_S1_LINE).await, 1);
        assert_eq!(port.read_digital(crate::hardware::ACK_LINE).await, 1);
    }

    #[tokio::test]
    async fn relay_writes_are_observable() {
        let port = SimulatedPort::new();
        port.write_digital(3, 1).await;
        assert_eq!(port.relay(3).await, 1);
    }
}
