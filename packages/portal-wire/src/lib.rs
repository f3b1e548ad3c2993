//! # portal-wire
//!
//! Shared data model for the portal monitor core: channel/cell identifiers,
//! threshold and state enums, and the read-only snapshot DTOs published for
//! supervision (HTTP API, PDF reporting, Modbus gateway — external
//! collaborators outside this workspace, all out of scope here).
//!
//! Kept as its own leaf crate, the way `uwb-types` is shared between
//! `backend-rust` and the hardware-facing crates in the Regatta Suite, so a
//! future supervision layer can depend on the data model without pulling in
//! the Tokio task graph that drives it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ── Identifiers ────────────────────────────────────────────────────────────

/// One of the twelve radiation detectors. Valid range 1..=12.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChannelId(u8);

impl ChannelId {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 12;

    /// Builds a channel id, returning `None` outside 1..=12.
    pub fn new(n: u8) -> Option<Self> {
        if (Self::MIN..=Self::MAX).contains(&n) {
            Some(Self(n))
        } else {
            None
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }

    /// All twelve channel ids, in order.
    pub fn all() -> impl Iterator<Item = ChannelId> {
        (Self::MIN..=Self::MAX).map(Self)
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "D{}", self.0)
    }
}

/// One of the two optical barriers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellId {
    S1,
    S2,
}

impl CellId {
    pub fn other(self) -> CellId {
        match self {
            CellId::S1 => CellId::S2,
            CellId::S2 => CellId::S1,
        }
    }
}

// ── Alarm / fault state ────────────────────────────────────────────────────

/// Radiological alarm state. Latched upward; only Acknowledge moves it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlarmState {
    #[default]
    Ok,
    N1,
    N2,
}

impl AlarmState {
    pub fn as_u8(self) -> u8 {
        match self {
            AlarmState::Ok => 0,
            AlarmState::N1 => 1,
            AlarmState::N2 => 2,
        }
    }
}

/// Technical fault state. Not latched — follows instantaneous classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FaultState {
    #[default]
    Ok,
    Low,
    High,
}

impl FaultState {
    pub fn as_u8(self) -> u8 {
        match self {
            FaultState::Ok => 0,
            FaultState::Low => 1,
            FaultState::High => 2,
        }
    }
}

// ── Passage ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PassageState {
    #[default]
    Idle,
    Active,
}

// ── Speed / direction ──────────────────────────────────────────────────────

/// Speed estimate: a numeric km/h value, or one of the documented tags.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind", content = "value")]
pub enum SpeedEstimate {
    Kmh(f64),
    Na,
    NoMeasure,
    Fault,
}

impl Default for SpeedEstimate {
    fn default() -> Self {
        SpeedEstimate::Na
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    #[default]
    None,
    OneToTwo,
    TwoToOne,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Direction::None => "NONE",
            Direction::OneToTwo => "1\u{2192}2",
            Direction::TwoToOne => "2\u{2192}1",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeedReading {
    pub speed: SpeedEstimate,
    pub direction: Direction,
}

// ── Acknowledge ────────────────────────────────────────────────────────────

/// Why the acknowledge FSM is in its current state, surfaced to supervision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckReason {
    /// No latched alarm to acknowledge.
    NoActiveAlarm,
    /// Cells are not both free and stable.
    CellsUnstable,
    /// First press accepted, waiting on the confirming press.
    AwaitingConfirm,
    /// Second press arrived within the confirmation window.
    Confirmed,
    /// Confirmation window elapsed before the second press.
    Timeout,
    /// Nothing pending — idle quiescent state.
    Idle,
}

impl std::fmt::Display for AckReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AckReason::NoActiveAlarm => "no active alarm to acknowledge",
            AckReason::CellsUnstable => "cells unstable, acknowledge ignored",
            AckReason::AwaitingConfirm => "first press, awaiting confirm",
            AckReason::Confirmed => "acknowledged",
            AckReason::Timeout => "timeout",
            AckReason::Idle => "idle",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckStatus {
    pub ack: bool,
    pub message: String,
}

impl Default for AckStatus {
    fn default() -> Self {
        AckStatus {
            ack: false,
            message: AckReason::Idle.to_string(),
        }
    }
}

// ── Thresholds ─────────────────────────────────────────────────────────────

/// Per-channel threshold configuration (spec §3 Invariant 1: n1 > 0,
/// 0 < reset_ratio < 1, n2_factor >= 1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
    pub n1: f64,
    pub n2_factor: f64,
    pub reset_ratio: f64,
    pub multiple: f64,
}

impl Thresholds {
    pub fn n2(&self) -> f64 {
        self.n1 * self.n2_factor
    }

    pub fn follower(&self, background: f64) -> f64 {
        background * self.multiple
    }
}

// ── Snapshot DTOs (spec §6 core-published read-only state) ───────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub rate: f64,
    pub raw_count: f64,
    pub alarm_state: AlarmState,
    pub alarm_measure: f64,
    pub background: f64,
    pub fault_state: FaultState,
    pub fault_raw: f64,
    pub curve: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub channels: HashMap<ChannelId, ChannelSnapshot>,
    pub passage: PassageState,
    pub ack_status: AckStatus,
    pub speed: SpeedReading,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_id_rejects_out_of_range() {
        assert!(ChannelId::new(0).is_none());
        assert!(ChannelId::new(13).is_none());
        assert!(ChannelId::new(1).is_some());
        assert!(ChannelId::new(12).is_some());
    }

    #[test]
    fn channel_id_all_covers_1_to_12() {
        let ids: Vec<u8> = ChannelId::all().map(ChannelId::get).collect();
        assert_eq!(ids, (1..=12).collect::<Vec<_>>());
    }

    #[test]
    fn alarm_state_ordering_is_ok_lt_n1_lt_n2() {
        assert!(AlarmState::Ok < AlarmState::N1);
        assert!(AlarmState::N1 < AlarmState::N2);
    }

    #[test]
    fn thresholds_n2_and_follower() {
        let t = Thresholds {
            low: 10.0,
            high: 1000.0,
            n1: 10000.0,
            n2_factor: 1.5,
            reset_ratio: 0.8,
            multiple: 2.0,
        };
        assert_eq!(t.n2(), 15000.0);
        assert_eq!(t.follower(100.0), 200.0);
    }
}
