//! # Poll Worker
//! One independent scheduling loop per registered source: fetch, commit if the
//! value materially changed, sleep for the source's own interval, repeat. A
//! fetch failure is logged and the loop continues; nothing escapes it. The
//! loop exits only on the engine-wide shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use metrics::counter;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::source::Source;
use crate::store::StateStore;
use crate::value::diff_fields;

pub fn spawn_poll_worker(
    key: String,
    source: Arc<dyn Source>,
    interval: Duration,
    fetch_timeout: Option<Duration>,
    store: Arc<StateStore>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // A slow fetch must not cause a burst of catch-up ticks afterwards.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

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

            let fetched = match fetch_timeout {
                Some(limit) => match tokio::time::timeout(limit, source.fetch()).await {
                    Ok(res) => res,
                    Err(_) => Err(anyhow!("fetch timed out after {limit:?}")),
                },
                None => source.fetch().await,
            };

            match fetched {
                Ok(value) => {
                    let prev = store.get(&key);
                    let changed_fields = if value.changed_from(prev.as_ref()) {
                        prev.as_ref().map(|p| diff_fields(p.export(), value.export()))
                    } else {
                        None
                    };
                    if store.commit(&key, value) {
                        counter!("poll_commits_total", "source" => key.clone()).increment(1);
                        match changed_fields {
                            Some(fields) => tracing::info!(
                                target: "poll",
                                key = %key,
                                fields = ?fields,
                                "source changed"
                            ),
                            None => tracing::info!(target: "poll", key = %key, "first value"),
                        }
                    } else {
                        counter!("poll_no_change_total", "source" => key.clone()).increment(1);
                        tracing::debug!(target: "poll", key = %key, "no change");
                    }
                }
                Err(e) => {
                    counter!("poll_fetch_errors_total", "source" => key.clone()).increment(1);
                    tracing::warn!(target: "poll", key = %key, error = ?e, "fetch failed");
                }
            }
        }

        tracing::debug!(target: "poll", key = %key, "poll worker stopped");
    })
}
