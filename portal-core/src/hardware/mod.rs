//! Hardware abstraction port (spec.md §4.A): a uniform capability set over
//! digital inputs/outputs, with two concrete backends. Modeled as an enum
//! rather than a trait object — two fixed variants, no dynamic dispatch, no
//! circular "lazy import" wiring (§9): the simulator is constructed directly
//! and handed to whatever owns it, the physical backend is constructed with
//! its endpoint up front.

pub mod physical;
pub mod simulated;

use portal_wire::{CellId, ChannelId};

pub use physical::PhysicalPort;
pub use simulated::SimulatedPort;

/// Logical cell → digital input mapping (spec.md §4.A): cell 1 ↔ DI3, cell 2
/// ↔ DI4. ACK lives on DI5.
pub const CELL_S1_LINE: u32 = 3;
pub const CELL_S2_LINE: u32 = 4;
pub const ACK_LINE: u32 = 5;

pub enum HardwarePort {
    Physical(PhysicalPort),
    Simulated(SimulatedPort),
}

impl HardwarePort {
    /// Reads a digital input. Any transport failure resolves to 0 — the core
    /// never blocks or fails on an I/O hiccup (§4.A, §7 transient I/O).
    pub async fn read_digital(&self, index: u32) -> u8 {
        match self {
            HardwarePort::Physical(p) => p.read_digital(index).await,
            HardwarePort::Simulated(s) => s.read_digital(index).await,
        }
    }

    /// Writes a digital (relay) output. Failures are dropped silently.
    pub async fn write_digital(&self, index: u32, value: u8) {
        match self {
            HardwarePort::Physical(p) => p.write_digital(index, value).await,
            HardwarePort::Simulated(s) => s.write_digital(index, value).await,
        }
    }

    pub async fn read_cell(&self, cell: CellId) -> u8 {
        let line = match cell {
            CellId::S1 => CELL_S1_LINE,
            CellId::S2 => CELL_S2_LINE,
        };
        self.read_digital(line).await
    }

    pub async fn read_ack(&self) -> u8 {
        self.read_digital(ACK_LINE).await
    }

    /// Reads the monotonic pulse counter for a detector channel. Not part of
    /// spec.md §4.A's named triple, but the same capability set: GPIO edges
    /// on a channel's input are distinct lines from the three named digital
    /// indices, and counting (§4.C) needs a monotonic source to diff against.
    pub async fn read_pulse_counter(&self, channel: ChannelId) -> u64 {
        match self {
            HardwarePort::Physical(p) => p.read_pulse_counter(channel).await,
            HardwarePort::Simulated(s) => s.read_pulse_counter(channel).await,
        }
    }
}
