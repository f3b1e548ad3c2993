//! Passage service (spec.md §4.D): debounced edge detection over (S1, S2).
//! Reads the shared `cells` map written by the cell watchers (§4.B) rather
//! than the hardware port directly — data flow A → B → D.

use std::sync::Arc;
use std::time::{Duration, Instant};

use portal_wire::{CellId, PassageState};
use tokio::sync::{watch, RwLock};

use crate::config::SystemConfig;
use crate::state::SystemState;

struct Inner {
    state: PassageState,
    start_t: Option<Instant>,
    stop_t: Option<Instant>,
    last_levels: [u8; 2],
    last_change: [Instant; 2],
    both_zero_since: Option<Instant>,
}

/// Owned by the passage ticker, read by the alarm evaluator (gate), the
/// acknowledge FSM (stability precondition), and the speed estimator.
pub struct PassageShared {
    inner: RwLock<Inner>,
}

impl PassageShared {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            inner: RwLock::new(Inner {
                state: PassageState::Idle,
                start_t: None,
                stop_t: None,
                last_levels: [0, 0],
                last_change: [now, now],
                both_zero_since: Some(now),
            }),
        }
    }

    pub async fn state(&self) -> PassageState {
        self.inner.read().await.state
    }

    pub async fn is_passage(&self) -> bool {
        self.inner.read().await.state == PassageState::Active
    }

    pub async fn start_t(&self) -> Option<Instant> {
        self.inner.read().await.start_t
    }

    pub async fn stop_t(&self) -> Option<Instant> {
        self.inner.read().await.stop_t
    }

    /// Both cells are 0 and their last change was at least `stable_s` ago.
    pub async fn are_cells_free_and_stable(&self, stable_s: f64) -> bool {
        let inner = self.inner.read().await;
        if inner.last_levels != [0, 0] {
            return false;
        }
        let now = Instant::now();
        inner
            .last_change
            .iter()
            .all(|t| now.duration_since(*t).as_secs_f64() >= stable_s)
    }
}

impl Default for PassageShared {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the passage state machine at ~100 Hz (spec.md §5).
pub async fn run(state: Arc<SystemState>, config: Arc<SystemConfig>, mut shutdown: watch::Receiver<bool>) {
    let boot = Instant::now();
    let mut interval = tokio::time::interval(Duration::from_millis(10));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { return; }
            }
        }

        let levels = {
            let cells = state.cells.read().await;
            [
                *cells.get(&CellId::S1).unwrap_or(&0),
                *cells.get(&CellId::S2).unwrap_or(&0),
            ]
        };

        let armed = boot.elapsed().as_secs_f64() >= config.arm_delay_s;
        let now = Instant::now();
        let mut inner = state.passage.inner.write().await;

        let prev_levels = inner.last_levels;
        let prev_both_zero_since = inner.both_zero_since;

        for i in 0..2 {
            if levels[i] != prev_levels[i] {
                inner.last_change[i] = now;
            }
        }
        inner.last_levels = levels;

        if levels == [0, 0] {
            if inner.both_zero_since.is_none() {
                inner.both_zero_since = Some(now);
            }
        } else {
            inner.both_zero_since = None;
        }

        if !armed {
            // Arming window: track levels with no event generation (spec.md §4.D).
            continue;
        }

        let rising = |i: usize| prev_levels[i] == 0 && levels[i] == 1;

        match inner.state {
            PassageState::Idle => {
                if rising(0) || rising(1) {
                    let quiescent_ok = prev_both_zero_since
                        .map(|t| now.duration_since(t).as_secs_f64() >= config.min_off_s)
                        .unwrap_or(false);
                    if quiescent_ok {
                        inner.state = PassageState::Active;
                        inner.start_t = Some(now);
                    }
                }
            }
            PassageState::Active => {
                if levels == [0, 0] {
                    inner.state = PassageState::Idle;
                    inner.stop_t = Some(now);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_config() -> Arc<SystemConfig> {
        Arc::new(SystemConfig {
            sample_time_s: 0.1,
            distance_cellules_m: 0.75,
            mode_sans_cellules: false,
            sim: true,
            hardware_host: "localhost".into(),
            hardware_port: 8080,
            arm_delay_s: 0.0,
            min_off_s: 0.02,
            stable_s: 0.02,
            confirm_timeout_s: 15.0,
            channels: HashMap::new(),
        })
    }

    #[tokio::test]
    async fn idle_without_edges_stays_idle() {
        let (state, _rx) = SystemState::new();
        assert!(!state.passage.is_passage().await);
    }

    #[tokio::test]
    async fn rising_edge_after_quiescence_starts_passage() {
        let (state, _rx) = SystemState::new();
        let config = test_config();

        let passage_state = state.clone();
        let passage_cfg = config.clone();
        let (_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        tokio::spawn(run(passage_state, passage_cfg, shutdown_rx));

        // Let the quiescence window elapse with both cells at 0.
        tokio::time::sleep(Duration::from_millis(60)).await;

        {
            let mut cells = state.cells.write().await;
            cells.insert(CellId::S1, 1);
        }

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(state.passage.is_passage().await);
    }
}
