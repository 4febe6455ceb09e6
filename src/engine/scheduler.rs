use chrono::Utc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::learning::LearningLoop;

/// Interval driver for the learning loop. The tick cadence belongs to the
/// pipeline, not to any UI refresh.
pub struct LearningScheduler;

impl LearningScheduler {
    /// Spawn the periodic pass. The task runs until the handle is aborted;
    /// a failed pass is logged and the ticker keeps going.
    pub fn spawn(learning: Arc<LearningLoop>, interval_secs: u64) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = learning.run_once(Utc::now()).await {
                    log::error!("learning pass failed: {}", e);
                }
            }
        })
    }
}

/// Event-count alternative to the interval: callers report each appended
/// MaintenanceEvent and run the loop when `record` says so.
pub struct EventStride {
    every: u32,
    seen: AtomicU32,
}

impl EventStride {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            seen: AtomicU32::new(0),
        }
    }

    /// Count one event; true on every `every`-th call.
    pub fn record(&self) -> bool {
        let n = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        n % self.every == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_fires_every_nth() {
        let stride = EventStride::new(3);
        let fired: Vec<bool> = (0..7).map(|_| stride.record()).collect();
        assert_eq!(fired, vec![false, false, true, false, false, true, false]);
    }

    #[test]
    fn test_zero_stride_clamps_to_one() {
        let stride = EventStride::new(0);
        assert!(stride.record());
        assert!(stride.record());
    }
}
