//! Shared fixtures for engine integration tests.
//!
//! - [`ScriptedActivator`] answers activations from a queue of results
//! - [`RecordingSink`] stamps every event with the (paused) Tokio clock
//!
//! Timing tests run with `#[tokio::test(start_paused = true)]`, so offsets
//! recorded by the sink are exact simulated seconds.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use portico_core::{
    ActivationResult, Activator, DeviceIdentity, DeviceKind, DeviceRef, DurationConfig,
};
use portico_engine::{DeviceEvent, DeviceStateMachine, EventSink, StateUpdate};
use tokio::time::Instant;

/// Activator returning scripted results, success once the script runs out.
#[derive(Debug, Default)]
pub struct ScriptedActivator {
    results: Mutex<VecDeque<ActivationResult>>,
    latency: Duration,
    calls: AtomicUsize,
}

impl ScriptedActivator {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn with_results(results: impl IntoIterator<Item = ActivationResult>) -> Self {
        Self {
            results: Mutex::new(results.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Simulated round trip to the bridge.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Activator for ScriptedActivator {
    async fn activate(&self, _device: &DeviceRef) -> ActivationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(ActivationResult::succeeded)
    }
}

/// One published event with its offset from the sink's creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recorded {
    pub at: Duration,
    pub device: DeviceIdentity,
    pub event: DeviceEvent,
}

#[derive(Debug)]
pub struct RecordingSink {
    origin: Instant,
    events: Mutex<Vec<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            origin: Instant::now(),
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_for(&self, device: DeviceIdentity) -> Vec<Recorded> {
        self.events()
            .into_iter()
            .filter(|r| r.device == device)
            .collect()
    }

    /// `(second, update)` pairs, failures excluded.
    pub fn timeline(&self) -> Vec<(u64, StateUpdate)> {
        self.events()
            .into_iter()
            .filter_map(|r| r.event.update().map(|u| (r.at.as_secs(), *u)))
            .collect()
    }

    pub fn failures(&self) -> Vec<DeviceEvent> {
        self.events()
            .into_iter()
            .map(|r| r.event)
            .filter(DeviceEvent::is_failure)
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, device: DeviceIdentity, event: DeviceEvent) {
        self.events.lock().unwrap().push(Recorded {
            at: self.origin.elapsed(),
            device,
            event,
        });
    }
}

pub fn durations(
    name: &str,
    kind: DeviceKind,
    opening: u64,
    closing: u64,
    opened: u64,
) -> DurationConfig {
    DurationConfig {
        name: name.to_string(),
        kind,
        opening_time: opening,
        closing_time: closing,
        opened_time: opened,
        temporized: true,
    }
}

pub fn device(name: &str) -> DeviceRef {
    DeviceRef::new(name, "SB100001", 1, portico_core::DeviceSource::Door)
}

/// Machine named `name` with a single duration entry.
pub fn machine(
    config: DurationConfig,
    activator: Arc<ScriptedActivator>,
    sink: Arc<RecordingSink>,
) -> DeviceStateMachine<ScriptedActivator> {
    let kind = config.kind;
    let device = device(&config.name);
    DeviceStateMachine::new(device, kind, Arc::from(vec![config]), activator, sink)
}

/// Advance the paused clock by `secs` seconds.
pub async fn advance(secs: u64) {
    tokio::time::sleep(Duration::from_secs(secs)).await;
}
