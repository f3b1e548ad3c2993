//! Cell watchers (spec.md §4.B): publish the instantaneous 0/1 state of S1
//! and S2 at 50 Hz. Side-effect free beyond that write — no debounce, no
//! interpretation (that's the passage service's job, §4.D).
//!
//! Coalesced into one task iterating both cells per tick rather than two
//! identical tasks, per the REDESIGN FLAG in spec.md §9.

use std::sync::Arc;
use std::time::Duration;

use portal_wire::CellId;
use tokio::sync::watch;

use crate::hardware::HardwarePort;
use crate::state::SystemState;

pub async fn run(state: Arc<SystemState>, hardware: Arc<HardwarePort>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_millis(20)); // 50 Hz
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { return; }
            }
        }

        let s1 = hardware.read_cell(CellId::S1).await;
        let s2 = hardware.read_cell(CellId::S2).await;

        let mut cells = state.cells.write().await;
        cells.insert(CellId::S1, s1);
        cells.insert(CellId::S2, s2);
    }
}
