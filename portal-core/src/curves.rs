//! Curves ring (spec.md §4.L): 1 Hz, per channel, bounded to 3600 samples
//! (spec.md §3 Invariant 4). One task iterates all channels per tick (§9).

use std::sync::Arc;
use std::time::Duration;

use portal_wire::ChannelId;
use tokio::sync::watch;

use crate::state::{SystemState, CURVE_CAPACITY};

pub async fn run(state: Arc<SystemState>, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() { return; }
            }
        }

        let rates = state.channels.rates.read().await.clone();
        let mut curves = state.channels.curves.write().await;
        for id in ChannelId::all() {
            let rate = *rates.get(&id).unwrap_or(&0.0);
            let deque = curves.entry(id).or_default();
            if deque.len() >= CURVE_CAPACITY {
                deque.pop_front();
            }
            deque.push_back(rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn curve_never_exceeds_capacity() {
        let (state, _rx) = SystemState::new();
        let ch1 = ChannelId::new(1).unwrap();
        {
            let mut curves = state.channels.curves.write().await;
            let deque = curves.get_mut(&ch1).unwrap();
            for i in 0..CURVE_CAPACITY {
                deque.push_back(i as f64);
            }
        }

        let (_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(run(state.clone(), shutdown_rx));
        tokio::time::sleep(Duration::from_millis(1100)).await;

        let curves = state.channels.curves.read().await;
        assert_eq!(curves.get(&ch1).unwrap().len(), CURVE_CAPACITY);
    }
}
