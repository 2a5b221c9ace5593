//! # Engine
//! Façade that owns the shared [`StateStore`], spawns one poll worker per
//! registered source and a single compute worker, and exposes the read
//! accessors consumers use. Workers are tracked by handle and observe one
//! engine-wide shutdown signal at their sleep boundaries.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Result};
use metrics::{describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::compute::spawn_compute_worker;
use crate::policy::DerivationPolicy;
use crate::poller::spawn_poll_worker;
use crate::source::Source;
use crate::store::{DerivedValue, LatestView, Snapshot, StateStore};

/// Key reserved for the derived result in the consumer view.
const COMPUTED_KEY: &str = "computed";

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_commits_total", "Committed material changes, per source.");
        describe_counter!("poll_no_change_total", "Fetches discarded as unchanged, per source.");
        describe_counter!("poll_fetch_errors_total", "Fetch failures, per source.");
        describe_counter!("compute_runs_total", "Successful derivation runs.");
        describe_counter!("compute_skipped_total", "Compute ticks skipped because nothing changed.");
        describe_counter!("compute_errors_total", "Derivation failures (last-known-good kept).");
        describe_gauge!("engine_registered_sources", "Sources currently registered.");
        describe_gauge!("compute_last_run_ts", "Unix ts of the last successful derivation.");
    });
}

pub struct Engine {
    store: Arc<StateStore>,
    policy: Arc<dyn DerivationPolicy>,
    compute_interval: Duration,
    fetch_timeout: Option<Duration>,
    registered: Mutex<HashSet<String>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Engine {
    pub fn new(compute_interval: Duration, policy: impl DerivationPolicy + 'static) -> Self {
        ensure_metrics_described();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            store: Arc::new(StateStore::new()),
            policy: Arc::new(policy),
            compute_interval,
            fetch_timeout: None,
            registered: Mutex::new(HashSet::new()),
            workers: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Deadline applied to every fetch by the poll workers. An elapsed
    /// deadline counts as a fetch failure for that cycle.
    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Register a source under a unique key and start polling it immediately.
    /// Valid before or after `start()`.
    pub fn register(&self, key: &str, source: Arc<dyn Source>, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            bail!("refresh interval for '{key}' must be positive");
        }
        if key == COMPUTED_KEY {
            bail!("source key '{COMPUTED_KEY}' is reserved");
        }

        let count = {
            let mut registered = self.registered.lock().expect("engine registry mutex poisoned");
            if !registered.insert(key.to_string()) {
                bail!("source key already registered: {key}");
            }
            registered.len()
        };
        gauge!("engine_registered_sources").set(count as f64);

        tracing::info!(
            target: "engine",
            key = %key,
            source = source.name(),
            interval = ?interval,
            "source registered"
        );
        let handle = spawn_poll_worker(
            key.to_string(),
            source,
            interval,
            self.fetch_timeout,
            Arc::clone(&self.store),
            self.shutdown_rx.clone(),
        );
        self.workers.lock().expect("engine workers mutex poisoned").push(handle);
        Ok(())
    }

    /// Start the compute worker. Idempotent; a second call is a no-op.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let handle = spawn_compute_worker(
            self.compute_interval,
            Arc::clone(&self.policy),
            Arc::clone(&self.store),
            self.shutdown_rx.clone(),
        );
        self.workers.lock().expect("engine workers mutex poisoned").push(handle);
        tracing::info!(target: "engine", interval = ?self.compute_interval, "compute worker started");
    }

    /// Signal all workers to stop at their next sleep boundary and wait for
    /// them to finish.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<JoinHandle<()>> =
            std::mem::take(&mut *self.workers.lock().expect("engine workers mutex poisoned"));
        for handle in handles {
            let _ = handle.await;
        }
        tracing::info!(target: "engine", "engine stopped");
    }

    // ---- Read accessors (never block beyond the store's brief lock) ----

    pub fn latest_view(&self) -> LatestView {
        self.store.latest_view()
    }

    pub fn computed(&self) -> Option<DerivedValue> {
        self.store.computed()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn store(&self) -> Arc<StateStore> {
        Arc::clone(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::DigestFold;
    use crate::value::Value;
    use anyhow::anyhow;
    use async_trait::async_trait;

    struct NeverSource;

    #[async_trait]
    impl Source for NeverSource {
        async fn fetch(&self) -> Result<Value> {
            Err(anyhow!("unreachable in this test"))
        }
        fn name(&self) -> &str {
            "never"
        }
    }

    #[tokio::test]
    async fn duplicate_keys_are_rejected() {
        let engine = Engine::new(Duration::from_secs(5), DigestFold);
        engine
            .register("ip", Arc::new(NeverSource), Duration::from_secs(1))
            .unwrap();
        let err = engine
            .register("ip", Arc::new(NeverSource), Duration::from_secs(1))
            .unwrap_err();
        assert!(err.to_string().contains("already registered"));
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn zero_interval_and_reserved_key_are_rejected() {
        let engine = Engine::new(Duration::from_secs(5), DigestFold);
        assert!(engine
            .register("ip", Arc::new(NeverSource), Duration::ZERO)
            .is_err());
        assert!(engine
            .register("computed", Arc::new(NeverSource), Duration::from_secs(1))
            .is_err());
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn start_is_idempotent() {
        let engine = Engine::new(Duration::from_secs(5), DigestFold);
        engine.start();
        engine.start();
        assert_eq!(
            engine.workers.lock().unwrap().len(),
            1,
            "second start must not spawn a second compute loop"
        );
        engine.shutdown().await;
    }

    #[tokio::test]
    async fn empty_engine_has_empty_view() {
        let engine = Engine::new(Duration::from_secs(5), DigestFold);
        let view = engine.latest_view();
        assert!(view.sources.is_empty());
        assert!(view.computed.is_none());
    }
}
