//! Device state machine.
//!
//! One machine per device identity. The only externally triggered operation is
//! [`DeviceStateMachine::request_activation`]:
//!
//! 1. cancel every pending transition of this device
//! 2. resolve the duration config
//! 3. call the activator
//! 4. on failure publish a single [`DeviceEvent::ActivationFailed`] and stop
//! 5. on success apply stage 0 immediately and schedule the rest of the
//!    kind's [`TransitionTable`] on one task
//!
//! The activator call is the only suspension point of a request. Requests on
//! the same machine are serialized; machines share no state with each other.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use portico_core::duration;
use portico_core::{
    ActivationResult, Activator, DeviceIdentity, DeviceKind, DeviceRef, DurationConfig,
};
use serde::Serialize;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, trace, warn};

use crate::event::{DeviceEvent, EventSink, LockState, StateUpdate};
use crate::timer::{TimerSet, TimerToken};
use crate::transition::{Phase, Stage, TransitionTable};

/// Live state of one device.
#[derive(Debug)]
pub(crate) struct DeviceRuntimeState {
    phase: Phase,
    /// Last emitted lock state, answers reads before any activation.
    lock_state: LockState,
    timers: TimerSet,
}

impl DeviceRuntimeState {
    fn new() -> Self {
        Self {
            phase: Phase::Closed,
            lock_state: LockState::Secured,
            timers: TimerSet::new(),
        }
    }

    fn apply(&mut self, stage: &Stage, identity: DeviceIdentity, sink: &dyn EventSink) {
        for update in &stage.updates {
            if let StateUpdate::LockState(state) = update {
                self.lock_state = *state;
            }
            sink.publish(identity, DeviceEvent::StateChanged(*update));
        }
        self.phase = stage.phase;
    }
}

fn runtime_state(runtime: &Mutex<DeviceRuntimeState>) -> MutexGuard<'_, DeviceRuntimeState> {
    runtime.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Point-in-time view of a machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceSnapshot {
    pub identity: DeviceIdentity,
    pub display_name: String,
    pub kind: DeviceKind,
    pub phase: Phase,
    pub lock_state: LockState,
    pub pending: bool,
}

/// Simulated lifecycle of one remotely actuated device.
pub struct DeviceStateMachine<A: Activator> {
    identity: DeviceIdentity,
    device: DeviceRef,
    kind: DeviceKind,
    display_name: String,
    durations: Arc<[DurationConfig]>,
    activator: Arc<A>,
    sink: Arc<dyn EventSink>,
    runtime: Arc<Mutex<DeviceRuntimeState>>,
    serial: tokio::sync::Mutex<()>,
}

impl<A: Activator> DeviceStateMachine<A> {
    pub fn new(
        device: DeviceRef,
        kind: DeviceKind,
        durations: Arc<[DurationConfig]>,
        activator: Arc<A>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let display_name = device.display_name();
        Self::with_display_name(device, kind, display_name, durations, activator, sink)
    }

    /// Build a machine keeping a display name restored from the cache.
    pub fn with_display_name(
        device: DeviceRef,
        kind: DeviceKind,
        display_name: String,
        durations: Arc<[DurationConfig]>,
        activator: Arc<A>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            identity: device.identity(),
            device,
            kind,
            display_name,
            durations,
            activator,
            sink,
            runtime: Arc::new(Mutex::new(DeviceRuntimeState::new())),
            serial: tokio::sync::Mutex::new(()),
        }
    }

    pub fn identity(&self) -> DeviceIdentity {
        self.identity
    }

    pub fn device(&self) -> &DeviceRef {
        &self.device
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Timings this machine uses on its next activation.
    pub fn durations(&self) -> DurationConfig {
        duration::resolve(&self.durations, &self.device.name, self.kind)
    }

    pub fn phase(&self) -> Phase {
        runtime_state(&self.runtime).phase
    }

    /// Last emitted lock state. `Secured` until the first activation.
    pub fn lock_state(&self) -> LockState {
        runtime_state(&self.runtime).lock_state
    }

    pub fn has_pending_timers(&self) -> bool {
        runtime_state(&self.runtime).timers.has_pending()
    }

    /// Back in the initial phase with nothing scheduled.
    pub fn is_idle(&self) -> bool {
        let state = runtime_state(&self.runtime);
        state.phase == Phase::Closed && !state.timers.has_pending()
    }

    /// Wait until no transition is scheduled.
    ///
    /// Resolves once the running cycle finished or was cancelled. The phase
    /// is not required to be `Closed`: a failed activation that pre-empted a
    /// cycle leaves the device settled where that cycle stopped.
    pub async fn wait_settled(&self) {
        let mut pending = runtime_state(&self.runtime).timers.subscribe();
        // The sender lives as long as the runtime state we hold
        let _ = pending.wait_for(|scheduled| !*scheduled).await;
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        let state = runtime_state(&self.runtime);
        DeviceSnapshot {
            identity: self.identity,
            display_name: self.display_name.clone(),
            kind: self.kind,
            phase: state.phase,
            lock_state: state.lock_state,
            pending: state.timers.has_pending(),
        }
    }

    /// Cancel every scheduled transition without emitting anything.
    ///
    /// Idempotent. The phase stays wherever the last applied stage left it.
    pub fn cancel_pending(&self) {
        let cancelled = runtime_state(&self.runtime).timers.cancel_all();
        if cancelled > 0 {
            debug!(device = %self.display_name, cancelled, "Cancelled pending transitions");
        }
    }

    /// Activate the device and, on success, run its simulated cycle.
    pub async fn request_activation(&self) -> ActivationResult {
        let _serial = self.serial.lock().await;

        self.cancel_pending();
        let durations = self.durations();

        info!(device = %self.display_name, kind = %self.kind, "Activation requested");
        let result = self.activator.activate(&self.device).await;

        if !result.success() {
            let message = result
                .error_message()
                .unwrap_or_else(|| "activation failed".to_string());
            warn!(
                device = %self.display_name,
                code = result.code,
                "Activation failed: {}",
                message
            );
            self.sink.publish(
                self.identity,
                DeviceEvent::ActivationFailed {
                    code: result.code,
                    message,
                },
            );
            return result;
        }

        self.start_cycle(&durations);
        result
    }

    fn start_cycle(&self, durations: &DurationConfig) {
        let mut stages = TransitionTable::for_device(self.kind, durations)
            .into_stages()
            .into_iter();
        let started = Instant::now();

        let mut state = runtime_state(&self.runtime);
        if let Some(first) = stages.next() {
            state.apply(&first, self.identity, self.sink.as_ref());
        }

        let remaining: Vec<Stage> = stages.collect();
        if remaining.is_empty() {
            return;
        }

        debug!(
            device = %self.display_name,
            stages = remaining.len(),
            "Scheduling transitions"
        );
        let token = state.timers.token();
        let task = tokio::spawn(run_cycle(
            Arc::clone(&self.runtime),
            Arc::clone(&self.sink),
            self.identity,
            token,
            started,
            remaining,
        ));
        state.timers.track(task.abort_handle());
    }
}

/// Apply `stages` at their cumulative offsets from `started`.
async fn run_cycle(
    runtime: Arc<Mutex<DeviceRuntimeState>>,
    sink: Arc<dyn EventSink>,
    identity: DeviceIdentity,
    token: TimerToken,
    started: Instant,
    stages: Vec<Stage>,
) {
    let last = stages.len().saturating_sub(1);
    let mut deadline = started;

    for (index, stage) in stages.into_iter().enumerate() {
        deadline += stage.delay;
        sleep_until(deadline).await;

        let mut state = runtime_state(&runtime);
        if !state.timers.is_current(token) {
            trace!(device = %identity, "Dropping cancelled transition");
            return;
        }
        state.apply(&stage, identity, sink.as_ref());
        if index == last {
            state.timers.complete(token);
        }
    }
}

impl<A: Activator> std::fmt::Debug for DeviceStateMachine<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStateMachine")
            .field("identity", &self.identity)
            .field("device", &self.device)
            .field("kind", &self.kind)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}
