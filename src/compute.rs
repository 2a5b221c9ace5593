//! # Compute Worker
//! Wakes on its own interval and recomputes the derived result, but only when
//! at least one source committed a change since the last run. The dirty check,
//! the snapshot copy, and the flag clear happen in one critical section inside
//! the store; the derivation itself runs on the private copy, outside the
//! lock.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::policy::DerivationPolicy;
use crate::store::{DerivedValue, StateStore};

pub fn spawn_compute_worker(
    interval: Duration,
    policy: Arc<dyn DerivationPolicy>,
    store: Arc<StateStore>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately; consume it so
        // the first computation waits one full interval, like every later one.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                res = shutdown.changed() => {
                    if res.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let Some(snapshot) = store.take_snapshot_if_dirty() else {
                counter!("compute_skipped_total").increment(1);
                tracing::debug!(target: "compute", "no changes to compute");
                continue;
            };

            match policy.derive(&snapshot) {
                Ok(value) => {
                    store.set_computed(DerivedValue {
                        value,
                        computed_at: Utc::now(),
                    });
                    counter!("compute_runs_total").increment(1);
                    gauge!("compute_last_run_ts").set(Utc::now().timestamp().max(0) as f64);
                    tracing::info!(
                        target: "compute",
                        sources = snapshot.len(),
                        "derived result updated"
                    );
                }
                Err(e) => {
                    // Keep the last-known-good result and retry these changes
                    // on the next tick.
                    store.mark_dirty();
                    counter!("compute_errors_total").increment(1);
                    tracing::warn!(target: "compute", error = ?e, "derivation failed");
                }
            }
        }

        tracing::debug!(target: "compute", "compute worker stopped");
    })
}
