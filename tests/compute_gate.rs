// tests/compute_gate.rs
//
// Compute-worker gating: the derivation policy only runs when something
// committed since the last run, a policy failure keeps the last-known-good
// result, and an engine with no sources never computes at all.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;
use sourcepulse::{DigestFold, Engine, Snapshot, Source, Value};

struct ScriptedSource {
    script: Mutex<VecDeque<serde_json::Value>>,
    last: Mutex<Option<serde_json::Value>>,
}

impl ScriptedSource {
    fn new(script: Vec<serde_json::Value>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Source for ScriptedSource {
    async fn fetch(&self) -> Result<Value> {
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        let payload = match next {
            Some(p) => {
                *last = Some(p.clone());
                p
            }
            None => last.clone().ok_or_else(|| anyhow!("empty script"))?,
        };
        Ok(Value::new(payload))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A source whose payload changes on every single fetch.
struct CountingSource {
    n: AtomicUsize,
}

#[async_trait]
impl Source for CountingSource {
    async fn fetch(&self) -> Result<Value> {
        let n = self.n.fetch_add(1, Ordering::SeqCst);
        Ok(Value::new(json!({"n": n})))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

#[tokio::test]
async fn no_sources_means_no_computation_ever() {
    let runs = Arc::new(AtomicUsize::new(0));
    let policy = {
        let runs = Arc::clone(&runs);
        move |_snap: &Snapshot| -> Result<serde_json::Value> {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(json!(0))
        }
    };

    let engine = Engine::new(Duration::from_millis(20), policy);
    engine.start();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(runs.load(Ordering::SeqCst), 0);
    assert!(engine.computed().is_none());

    engine.shutdown().await;
}

#[tokio::test]
async fn one_change_yields_exactly_one_computation() {
    let runs = Arc::new(AtomicUsize::new(0));
    let policy = {
        let runs = Arc::clone(&runs);
        move |snap: &Snapshot| -> Result<serde_json::Value> {
            runs.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"inputs": snap.len()}))
        }
    };

    let engine = Engine::new(Duration::from_millis(30), policy);
    engine
        .register(
            "x",
            Arc::new(ScriptedSource::new(vec![json!({"v": 1})])),
            Duration::from_millis(10),
        )
        .unwrap();
    engine.start();

    tokio::time::sleep(Duration::from_millis(400)).await;

    // the single material change was computed once; every later tick skipped
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    let computed = engine.computed().expect("one computation happened");
    assert_eq!(computed.value, json!({"inputs": 1}));

    engine.shutdown().await;
}

#[tokio::test]
async fn continuous_changes_keep_recomputing() {
    let engine = Engine::new(Duration::from_millis(20), DigestFold);
    engine
        .register(
            "ticker",
            Arc::new(CountingSource {
                n: AtomicUsize::new(0),
            }),
            Duration::from_millis(10),
        )
        .unwrap();
    engine.start();

    tokio::time::sleep(Duration::from_millis(200)).await;
    let first = engine.computed().expect("computed at least once");

    tokio::time::sleep(Duration::from_millis(200)).await;
    let second = engine.computed().expect("still computing");

    assert_ne!(
        first.value["digest"], second.value["digest"],
        "new commits must produce new derived results"
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn a_failing_policy_keeps_the_last_known_good_result() {
    let runs = Arc::new(AtomicUsize::new(0));
    let policy = {
        let runs = Arc::clone(&runs);
        move |_snap: &Snapshot| -> Result<serde_json::Value> {
            let n = runs.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Ok(json!({"generation": 1}))
            } else {
                Err(anyhow!("derivation backend unavailable"))
            }
        }
    };

    let engine = Engine::new(Duration::from_millis(20), policy);
    engine
        .register(
            "ticker",
            Arc::new(CountingSource {
                n: AtomicUsize::new(0),
            }),
            Duration::from_millis(10),
        )
        .unwrap();
    engine.start();

    tokio::time::sleep(Duration::from_millis(400)).await;

    // failures after the first run were reported, not committed
    assert!(runs.load(Ordering::SeqCst) >= 2, "policy was retried");
    let computed = engine.computed().expect("first result survived");
    assert_eq!(computed.value, json!({"generation": 1}));

    engine.shutdown().await;
}

#[tokio::test]
async fn registration_after_start_polls_immediately() {
    let engine = Engine::new(Duration::from_millis(20), DigestFold);
    engine.start();

    engine
        .register(
            "late",
            Arc::new(ScriptedSource::new(vec![json!({"v": 1})])),
            Duration::from_millis(10),
        )
        .unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(engine.store().get("late").is_some());
    assert!(engine.computed().is_some());

    engine.shutdown().await;
}
