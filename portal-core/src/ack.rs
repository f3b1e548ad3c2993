//! Acknowledge FSM (spec.md §4.H, grounded on `core/acquittement/acquittement.py`).
//! Validates a double-press of the ACK input under safety preconditions and
//! is the sole component, besides the owning evaluator, permitted to lower a
//! latched alarm state — and it does so unconditionally (§5 compare-and-set
//! discipline).

use std::sync::Arc;
use std::time::{Duration, Instant};

use portal_wire::{AckReason, AlarmState, ChannelId};
use tokio::sync::watch;

use crate::config::SystemConfig;
use crate::state::SystemState;

/// Status display holds for this long after the alarm set clears, matching
/// `acquittement.py`'s `run()` grace hold (§11 supplemented feature).
const DISPLAY_HOLD: Duration = Duration::from_secs(2);

enum FsmState {
    Idle,
    AwaitingConfirm { deadline: Instant },
}

/// Entry point for the acknowledge ticker. Unlike the counting/alarm/fault
/// workers, this one needs direct hardware access to read the ACK line.
pub async fn run(
    state: Arc<SystemState>,
    hardware: Arc<crate::hardware::HardwarePort>,
    config: Arc<SystemConfig>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut fsm = FsmState::Idle;
    let mut last_level: u8 = 0;
    let mut held_until: Option<Instant> = None;
    let mut interval = tokio::time::interval(Duration::from_secs_f64(config.sample_time_s));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { return; }
            }
        }

        let level = hardware.read_ack().await;
        let rising = last_level == 0 && level == 1;
        last_level = level;

        let now = Instant::now();
        let any_alarm = state
            .channels
            .alarm_states
            .read()
            .await
            .values()
            .any(|s| *s != AlarmState::Ok);
        let cells_ok = state.passage.are_cells_free_and_stable(config.stable_s).await;

        match &fsm {
            FsmState::Idle => {
                if rising {
                    if !any_alarm {
                        publish(&state, false, AckReason::NoActiveAlarm).await;
                    } else if !cells_ok {
                        publish(&state, false, AckReason::CellsUnstable).await;
                    } else {
                        fsm = FsmState::AwaitingConfirm {
                            deadline: now + Duration::from_secs_f64(config.confirm_timeout_s),
                        };
                        publish(&state, false, AckReason::AwaitingConfirm).await;
                    }
                } else if !any_alarm {
                    if let Some(deadline) = held_until {
                        if now >= deadline {
                            publish(&state, false, AckReason::Idle).await;
                            held_until = None;
                        }
                    }
                }
            }
            FsmState::AwaitingConfirm { deadline } => {
                if now >= *deadline {
                    fsm = FsmState::Idle;
                    publish(&state, false, AckReason::Timeout).await;
                } else if !cells_ok {
                    fsm = FsmState::Idle;
                    publish(&state, false, AckReason::CellsUnstable).await;
                } else if rising {
                    for id in ChannelId::all() {
                        state.channels.alarm_states.write().await.insert(id, AlarmState::Ok);
                    }
                    fsm = FsmState::Idle;
                    publish(&state, true, AckReason::Confirmed).await;
                    held_until = Some(now + DISPLAY_HOLD);
                }
            }
        }
    }
}

async fn publish(state: &Arc<SystemState>, ack: bool, reason: AckReason) {
    let mut status = state.ack.write().await;
    status.ack = ack;
    status.message = reason.to_string();
}
