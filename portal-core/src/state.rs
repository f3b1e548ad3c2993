//! Process-resident data model (spec.md §3) and the `SystemState` façade
//! (§9 "a single `SystemState` façade holds references to each component and
//! offers copying accessors"). Every published map has exactly one writer —
//! the owning component — and arbitrary concurrent readers; whole values are
//! published per channel, never partial updates (§5 shared resource policy).

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use portal_wire::{
    AckStatus, AlarmState, CellId, ChannelId, ChannelSnapshot, FaultState, SpeedReading,
    SystemSnapshot,
};
use tokio::sync::{mpsc, RwLock};

use crate::passage::PassageShared;

/// Bound on the curve ring (spec.md §3 Invariant 4, §4.L).
pub const CURVE_CAPACITY: usize = 3600;

/// Redesign from one-shot booleans to a bounded event channel per severity
/// (spec.md §9 "Email/SMS edge flags"). Consumers (out of scope here) drain
/// it; within this crate, `main.rs` drains and logs.
#[derive(Debug, Clone, Copy)]
pub enum AlarmEventKind {
    AlarmRaised,
    FaultRaised,
}

#[derive(Debug, Clone, Copy)]
pub struct AlarmEvent {
    pub channel: ChannelId,
    pub kind: AlarmEventKind,
}

pub struct ChannelMaps {
    pub raw_counts: RwLock<HashMap<ChannelId, f64>>,
    pub rates: RwLock<HashMap<ChannelId, f64>>,
    pub backgrounds: RwLock<HashMap<ChannelId, f64>>,
    pub alarm_states: RwLock<HashMap<ChannelId, AlarmState>>,
    pub alarm_measures: RwLock<HashMap<ChannelId, f64>>,
    pub fault_states: RwLock<HashMap<ChannelId, FaultState>>,
    pub fault_raws: RwLock<HashMap<ChannelId, f64>>,
    pub curves: RwLock<HashMap<ChannelId, VecDeque<f64>>>,
}

impl ChannelMaps {
    fn new() -> Self {
        let ids: Vec<ChannelId> = ChannelId::all().collect();
        let mut raw_counts = HashMap::new();
        let mut rates = HashMap::new();
        let mut backgrounds = HashMap::new();
        let mut alarm_states = HashMap::new();
        let mut alarm_measures = HashMap::new();
        let mut fault_states = HashMap::new();
        let mut fault_raws = HashMap::new();
        let mut curves = HashMap::new();
        for id in ids {
            raw_counts.insert(id, 0.0);
            rates.insert(id, 0.0);
            backgrounds.insert(id, 0.0);
            alarm_states.insert(id, AlarmState::Ok);
            alarm_measures.insert(id, 0.0);
            fault_states.insert(id, FaultState::Ok);
            fault_raws.insert(id, 0.0);
            curves.insert(id, VecDeque::with_capacity(CURVE_CAPACITY));
        }
        Self {
            raw_counts: RwLock::new(raw_counts),
            rates: RwLock::new(rates),
            backgrounds: RwLock::new(backgrounds),
            alarm_states: RwLock::new(alarm_states),
            alarm_measures: RwLock::new(alarm_measures),
            fault_states: RwLock::new(fault_states),
            fault_raws: RwLock::new(fault_raws),
            curves: RwLock::new(curves),
        }
    }
}

pub struct SystemState {
    pub channels: Arc<ChannelMaps>,
    pub cells: Arc<RwLock<HashMap<CellId, u8>>>,
    pub passage: Arc<PassageShared>,
    pub ack: Arc<RwLock<AckStatus>>,
    pub speed: Arc<RwLock<SpeedReading>>,
    pub alarm_events: mpsc::Sender<AlarmEvent>,
}

impl SystemState {
    /// Builds the façade and returns the receiving end of the alarm/fault
    /// event channel for whoever drains it (`main.rs`, in this crate).
    pub fn new() -> (Arc<Self>, mpsc::Receiver<AlarmEvent>) {
        let mut cells = HashMap::new();
        cells.insert(CellId::S1, 0);
        cells.insert(CellId::S2, 0);

        let (tx, rx) = mpsc::channel(64);

        let state = SystemState {
            channels: Arc::new(ChannelMaps::new()),
            cells: Arc::new(RwLock::new(cells)),
            passage: Arc::new(PassageShared::new()),
            ack: Arc::new(RwLock::new(AckStatus::default())),
            speed: Arc::new(RwLock::new(SpeedReading::default())),
            alarm_events: tx,
        };
        (Arc::new(state), rx)
    }

    /// §4.K: read-only snapshot, O(channels), no long-held locks — each map
    /// is locked, copied, and released independently, so snapshots are
    /// point-in-time per map rather than globally atomic (spec.md §5
    /// ordering guarantees explicitly allow this).
    pub async fn snapshot(&self) -> SystemSnapshot {
        let raw_counts = self.channels.raw_counts.read().await.clone();
        let rates = self.channels.rates.read().await.clone();
        let backgrounds = self.channels.backgrounds.read().await.clone();
        let alarm_states = self.channels.alarm_states.read().await.clone();
        let alarm_measures = self.channels.alarm_measures.read().await.clone();
        let fault_states = self.channels.fault_states.read().await.clone();
        let fault_raws = self.channels.fault_raws.read().await.clone();
        let curves = self.channels.curves.read().await.clone();

        let mut channels = HashMap::new();
        for id in ChannelId::all() {
            channels.insert(
                id,
                ChannelSnapshot {
                    rate: *rates.get(&id).unwrap_or(&0.0),
                    raw_count: *raw_counts.get(&id).unwrap_or(&0.0),
                    alarm_state: *alarm_states.get(&id).unwrap_or(&AlarmState::Ok),
                    alarm_measure: *alarm_measures.get(&id).unwrap_or(&0.0),
                    background: *backgrounds.get(&id).unwrap_or(&0.0),
                    fault_state: *fault_states.get(&id).unwrap_or(&FaultState::Ok),
                    fault_raw: *fault_raws.get(&id).unwrap_or(&0.0),
                    curve: curves.get(&id).cloned().unwrap_or_default().into(),
                },
            );
        }

        SystemSnapshot {
            channels,
            passage: self.passage.state().await,
            ack_status: self.ack.read().await.clone(),
            speed: *self.speed.read().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_state_snapshot_has_all_twelve_channels_at_ok() {
        let (state, _rx) = SystemState::new();
        let snap = state.snapshot().await;
        assert_eq!(snap.channels.len(), 12);
        for ch in snap.channels.values() {
            assert_eq!(ch.alarm_state, AlarmState::Ok);
            assert_eq!(ch.fault_state, FaultState::Ok);
            assert!(ch.curve.is_empty());
        }
    }
}
