#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use failover_pool::common::clock::ManualClock;
use failover_pool::pool::connector::with_deadline;
use failover_pool::prelude::*;

#[derive(Debug, Clone, Copy)]
pub enum Outcome {
    Up,
    Down,
    /// Fails this many dials, then succeeds.
    FlakyFor(usize),
    /// Never answers; the dial times out after `HANG_TIMEOUT`.
    Hang,
}

pub const HANG_TIMEOUT: Duration = Duration::from_secs(5);

/// Connector whose result per host is scripted. Unknown hosts are down.
#[derive(Clone, Default)]
pub struct ScriptedConnector {
    outcomes: Arc<Mutex<HashMap<String, Outcome>>>,
    calls: Arc<Mutex<Vec<Endpoint>>>,
}

impl ScriptedConnector {
    pub fn new(outcomes: &[(&str, Outcome)]) -> Self {
        let connector = Self::default();
        for (host, outcome) in outcomes {
            connector.set(host, *outcome);
        }
        connector
    }

    pub fn set(&self, host: &str, outcome: Outcome) {
        self.outcomes
            .lock()
            .unwrap()
            .insert(host.to_string(), outcome);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|endpoint| endpoint.host.clone())
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Connector for ScriptedConnector {
    type Connection = Endpoint;

    async fn open(&self, endpoint: &Endpoint) -> Result<Endpoint, ConnectionError> {
        self.calls.lock().unwrap().push(endpoint.clone());

        let outcome = {
            let mut outcomes = self.outcomes.lock().unwrap();
            match outcomes.get_mut(&endpoint.host) {
                Some(Outcome::FlakyFor(remaining)) if *remaining > 0 => {
                    *remaining -= 1;
                    Outcome::Down
                }
                Some(Outcome::FlakyFor(_)) => Outcome::Up,
                Some(outcome) => *outcome,
                None => Outcome::Down,
            }
        };

        match outcome {
            Outcome::Up => Ok(endpoint.clone()),
            Outcome::Hang => {
                with_deadline(
                    endpoint,
                    HANG_TIMEOUT,
                    std::future::pending::<std::io::Result<Endpoint>>(),
                )
                .await
            }
            _ => Err(ConnectionError::new(
                endpoint.clone(),
                ConnectionErrorKind::Other("scripted failure".into()),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Get(FailureKind, String),
    Set(FailureKind, String, u64),
    Delete(FailureKind, String),
    Increment(String),
}

/// Memory store that also logs every operation.
#[derive(Clone)]
pub struct RecordingStore {
    pub inner: MemoryFailureStore,
    ops: Arc<Mutex<Vec<StoreOp>>>,
}

impl RecordingStore {
    pub fn new(clock: &ManualClock) -> Self {
        Self {
            inner: MemoryFailureStore::with_clock(Arc::new(clock.clone())),
            ops: Arc::default(),
        }
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn last_failure(&self, host: &str, port: u16) -> Option<u64> {
        self.inner
            .get(&FailureKey::last_failure(&Endpoint::new(host, port)))
            .unwrap()
    }

    pub fn consecutive_failures(&self, host: &str, port: u16) -> Option<u64> {
        self.inner
            .get(&FailureKey::consecutive_failures(&Endpoint::new(host, port)))
            .unwrap()
    }

    fn record(&self, op: StoreOp) {
        self.ops.lock().unwrap().push(op);
    }
}

impl FailureStore for RecordingStore {
    fn get(&self, key: &FailureKey) -> Result<Option<u64>, StoreError> {
        self.record(StoreOp::Get(key.kind, key.endpoint.host.clone()));
        self.inner.get(key)
    }

    fn set(&self, key: &FailureKey, value: u64, ttl: Option<Duration>) -> Result<(), StoreError> {
        self.record(StoreOp::Set(key.kind, key.endpoint.host.clone(), value));
        self.inner.set(key, value, ttl)
    }

    fn delete(&self, key: &FailureKey) -> Result<(), StoreError> {
        self.record(StoreOp::Delete(key.kind, key.endpoint.host.clone()));
        self.inner.delete(key)
    }

    fn increment(&self, key: &FailureKey, ttl: Option<Duration>) -> Result<u64, StoreError> {
        self.record(StoreOp::Increment(key.endpoint.host.clone()));
        self.inner.increment(key, ttl)
    }
}

pub const START: u64 = 1_700_000_000;

pub struct Harness {
    pub clock: ManualClock,
    pub connector: ScriptedConnector,
    pub store: RecordingStore,
    pub selector: FailoverSelector<ScriptedConnector, RecordingStore>,
}

/// Selector over `servers` with in-order traversal and a manual clock.
pub fn harness(
    servers: &[&str],
    outcomes: &[(&str, Outcome)],
    options: SelectorOptions,
) -> Harness {
    let clock = ManualClock::new(START);
    let connector = ScriptedConnector::new(outcomes);
    let store = RecordingStore::new(&clock);
    let registry = Arc::new(EndpointRegistry::from_servers(servers.iter().copied()));
    let selector = FailoverSelector::new(registry, connector.clone(), store.clone())
        .with_options(options)
        .with_clock(Arc::new(clock.clone()));

    Harness {
        clock,
        connector,
        store,
        selector,
    }
}

pub fn in_order() -> SelectorOptions {
    SelectorOptions {
        randomize: false,
        ..SelectorOptions::default()
    }
}
