//! Relay driver (spec.md §4.J): maps aggregate alarm/fault/cell state onto
//! eight relay setpoints, safety-positive on the fault line. Writes are only
//! emitted on aggregate change, to avoid spamming the transport.

use std::sync::Arc;
use std::time::Duration;

use portal_wire::{AlarmState, CellId, FaultState};
use tokio::sync::watch;

use crate::hardware::HardwarePort;
use crate::state::SystemState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Aggregate {
    any_n1: bool,
    any_n2: bool,
    any_fault: bool,
    any_cell: bool,
}

fn setpoints(agg: Aggregate) -> [(u32, u8); 8] {
    let b = |v: bool| if v { 1 } else { 0 };
    [
        (1, b(!agg.any_fault)),
        (2, b(agg.any_cell)),
        (3, b(agg.any_n1)),
        (4, b(agg.any_n2)),
        (5, b(agg.any_n1)),
        (6, b(agg.any_n1)),
        (7, b(agg.any_n2)),
        (8, b(agg.any_cell)),
    ]
}

pub async fn run(state: Arc<SystemState>, hardware: Arc<HardwarePort>, mut shutdown: watch::Receiver<bool>) {
    let mut last: Option<Aggregate> = None;
    let mut interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { return; }
            }
        }

        let alarm_states = state.channels.alarm_states.read().await.clone();
        let fault_states = state.channels.fault_states.read().await.clone();
        let cells = state.cells.read().await.clone();

        let agg = Aggregate {
            any_n1: alarm_states.values().any(|s| *s >= AlarmState::N1),
            any_n2: alarm_states.values().any(|s| *s == AlarmState::N2),
            any_fault: fault_states.values().any(|s| *s != FaultState::Ok),
            any_cell: *cells.get(&CellId::S1).unwrap_or(&0) == 1
                || *cells.get(&CellId::S2).unwrap_or(&0) == 1,
        };

        if last == Some(agg) {
            continue;
        }
        last = Some(agg);

        for (circuit, value) in setpoints(agg) {
            hardware.write_digital(circuit, value).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay1_energised_iff_no_fault() {
        let healthy = Aggregate { any_n1: false, any_n2: false, any_fault: false, any_cell: false };
        let faulted = Aggregate { any_n1: false, any_n2: false, any_fault: true, any_cell: false };
        assert_eq!(setpoints(healthy)[0], (1, 1));
        assert_eq!(setpoints(faulted)[0], (1, 0));
    }

    #[test]
    fn n2_implies_n1_relays_also_driven() {
        let n2 = Aggregate { any_n1: true, any_n2: true, any_fault: false, any_cell: false };
        let sp = setpoints(n2);
        assert_eq!(sp[2], (3, 1));
        assert_eq!(sp[4], (5, 1));
        assert_eq!(sp[5], (6, 1));
        assert_eq!(sp[3], (4, 1));
        assert_eq!(sp[6], (7, 1));
    }

    #[tokio::test]
    async fn relay_driver_writes_once_per_aggregate_change() {
        let (state, _rx) = SystemState::new();
        let sim = crate::hardware::simulated::SimulatedPort::new();
        let hardware = Arc::new(HardwarePort::Simulated(sim.clone()));

        let (_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(state.clone(), hardware, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(sim.relay(1).await, 1, "relay 1 should be energised while healthy");
        assert_eq!(sim.relay(3).await, 0);
    }
}
