//! Speed/direction estimator (spec.md §4.I, grounded on
//! `hardware/vitesse_chargement.py`). Times the first S1 vs S2 rising edge
//! after each reset and derives a km/h estimate from the configured
//! inter-cell distance.

use std::sync::Arc;
use std::time::{Duration, Instant};

use portal_wire::{AlarmState, CellId, Direction, SpeedEstimate, SpeedReading};
use tokio::sync::watch;

use crate::config::SystemConfig;
use crate::state::SystemState;

const REBOUND_THRESHOLD: Duration = Duration::from_millis(30);
const SINGLE_EDGE_TIMEOUT: Duration = Duration::from_secs(5);

pub async fn run(state: Arc<SystemState>, config: Arc<SystemConfig>, mut shutdown: watch::Receiver<bool>) {
    if config.mode_sans_cellules {
        let mut speed = state.speed.write().await;
        speed.speed = SpeedEstimate::Na;
        speed.direction = Direction::None;
        return;
    }

    let mut t1: Option<Instant> = None;
    let mut t2: Option<Instant> = None;
    let mut prev = [0u8; 2];
    let mut interval = tokio::time::interval(Duration::from_millis(10)); // 100 Hz

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { return; }
            }
        }

        let now = Instant::now();
        let levels = {
            let cells = state.cells.read().await;
            [
                *cells.get(&CellId::S1).unwrap_or(&0),
                *cells.get(&CellId::S2).unwrap_or(&0),
            ]
        };

        if prev[0] == 0 && levels[0] == 1 && t1.is_none() {
            t1 = Some(now);
        }
        if prev[1] == 0 && levels[1] == 1 && t2.is_none() {
            t2 = Some(now);
        }
        prev = levels;

        if let (Some(a), Some(b)) = (t1, t2) {
            let delta = if a > b { a - b } else { b - a };
            let any_n2 = state
                .channels
                .alarm_states
                .read()
                .await
                .values()
                .any(|s| *s == AlarmState::N2);

            if delta <= REBOUND_THRESHOLD || any_n2 {
                // Rebound or invalid during a heavy event: discard (§7 arithmetic degenerate).
            } else {
                let v_kmh = (config.distance_cellules_m / delta.as_secs_f64()) * 3.6;
                let direction = if a < b { Direction::OneToTwo } else { Direction::TwoToOne };
                let speed_estimate = if v_kmh > 10.0 {
                    SpeedEstimate::Fault
                } else {
                    SpeedEstimate::Kmh((v_kmh * 10.0).round() / 10.0)
                };
                let mut speed = state.speed.write().await;
                speed.speed = speed_estimate;
                speed.direction = direction;
            }
            t1 = None;
            t2 = None;
        } else if let Some(single) = t1.or(t2) {
            if now.duration_since(single) >= SINGLE_EDGE_TIMEOUT {
                let mut speed = state.speed.write().await;
                speed.speed = SpeedEstimate::NoMeasure;
                speed.direction = Direction::None;
                t1 = None;
                t2 = None;
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
            arm_delay_s: 2.0,
            min_off_s: 0.2,
            stable_s: 0.2,
            confirm_timeout_s: 15.0,
            channels: HashMap::new(),
        })
    }

    #[tokio::test]
    async fn mode_sans_cellules_publishes_na_and_exits() {
        let (state, _rx) = SystemState::new();
        let mut config = (*test_config()).clone();
        config.mode_sans_cellules = true;
        run(state.clone(), Arc::new(config), watch::channel(false).1).await;
        let speed = *state.speed.read().await;
        assert_eq!(speed.speed, SpeedEstimate::Na);
    }

    #[tokio::test]
    async fn legitimate_passage_computes_expected_speed() {
        let (state, _rx) = SystemState::new();
        let config = test_config();
        let (_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(state.clone(), config, shutdown_rx));

        state.cells.write().await.insert(CellId::S1, 1);
        tokio::time::sleep(Duration::from_millis(450)).await; // 0.75m / 0.45s = 6 km/h
        state.cells.write().await.insert(CellId::S2, 1);
        tokio::time::sleep(Duration::from_millis(40)).await;

        let speed = *state.speed.read().await;
        match speed.speed {
            SpeedEstimate::Kmh(v) => assert!((v - 6.0).abs() < 0.5, "expected ~6 km/h, got {v}"),
            other => panic!("expected a numeric speed, got {other:?}"),
        }
        assert_eq!(speed.direction, Direction::OneToTwo);
    }

    #[tokio::test]
    async fn fast_crossing_reports_fault() {
        let (state, _rx) = SystemState::new();
        let config = test_config();
        let (_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(state.clone(), config, shutdown_rx));

        state.cells.write().await.insert(CellId::S1, 1);
        tokio::time::sleep(Duration::from_millis(125)).await; // 0.75m / 0.125s = 21.6 km/h
        state.cells.write().await.insert(CellId::S2, 1);
        tokio::time::sleep(Duration::from_millis(40)).await;

        let speed = *state.speed.read().await;
        assert_eq!(speed.speed, SpeedEstimate::Fault);
    }
}
