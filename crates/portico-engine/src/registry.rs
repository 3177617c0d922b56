//! Device registry.
//!
//! Owns one [`DeviceStateMachine`] per [`DeviceIdentity`]. Constructed once per
//! process and shared by reference with whoever triggers activations.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use portico_core::{
    Activator, DeviceIdentity, DeviceKind, DeviceRef, DeviceSource, DurationConfig, Error,
    PlatformConfig, Result,
};
use portico_protocol::AddressBook;
use tracing::{debug, info};

use crate::cache::{AccessoryCache, CachedAccessory};
use crate::event::EventSink;
use crate::machine::DeviceStateMachine;

struct RegistryInner<A: Activator> {
    machines: BTreeMap<DeviceIdentity, Arc<DeviceStateMachine<A>>>,
    /// Accessories known from earlier runs.
    cached: BTreeMap<DeviceIdentity, CachedAccessory>,
}

/// Registry of device state machines keyed by identity.
pub struct DeviceRegistry<A: Activator> {
    durations: Arc<[DurationConfig]>,
    activator: Arc<A>,
    sink: Arc<dyn EventSink>,
    inner: Mutex<RegistryInner<A>>,
}

impl<A: Activator> DeviceRegistry<A> {
    pub fn new(
        durations: impl Into<Arc<[DurationConfig]>>,
        activator: Arc<A>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            durations: durations.into(),
            activator,
            sink,
            inner: Mutex::new(RegistryInner {
                machines: BTreeMap::new(),
                cached: BTreeMap::new(),
            }),
        }
    }

    pub fn from_config(
        config: &PlatformConfig,
        activator: Arc<A>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self::new(config.devices.clone(), activator, sink)
    }

    fn inner(&self) -> MutexGuard<'_, RegistryInner<A>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Identity for a remote device descriptor. Pure.
    pub fn resolve_identity(
        name: &str,
        remote_address: &str,
        output_index: u32,
    ) -> DeviceIdentity {
        DeviceIdentity::resolve(name, remote_address, output_index)
    }

    /// Machine for `device`, created in its initial state on first sight.
    ///
    /// The kind of an existing machine never changes; `kind` only applies
    /// when the machine is created.
    pub fn get_or_create(
        &self,
        device: &DeviceRef,
        kind: DeviceKind,
    ) -> Arc<DeviceStateMachine<A>> {
        let identity = device.identity();
        let mut inner = self.inner();

        if let Some(machine) = inner.machines.get(&identity) {
            return Arc::clone(machine);
        }

        let machine = match inner.cached.get(&identity) {
            Some(cached) => {
                info!(
                    device = %cached.display_name,
                    identity = %identity,
                    "Restoring existing accessory from cache"
                );
                DeviceStateMachine::with_display_name(
                    device.clone(),
                    kind,
                    cached.display_name.clone(),
                    Arc::clone(&self.durations),
                    Arc::clone(&self.activator),
                    Arc::clone(&self.sink),
                )
            }
            None => {
                info!(
                    device = %device.display_name(),
                    identity = %identity,
                    kind = %kind,
                    "Adding new accessory"
                );
                DeviceStateMachine::new(
                    device.clone(),
                    kind,
                    Arc::clone(&self.durations),
                    Arc::clone(&self.activator),
                    Arc::clone(&self.sink),
                )
            }
        };

        let machine = Arc::new(machine);
        inner.machines.insert(identity, Arc::clone(&machine));
        machine
    }

    pub fn get(&self, identity: DeviceIdentity) -> Option<Arc<DeviceStateMachine<A>>> {
        self.inner().machines.get(&identity).cloned()
    }

    /// Look a machine up by remote or display name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<DeviceStateMachine<A>>> {
        let name = name.trim();
        self.inner()
            .machines
            .values()
            .find(|m| {
                m.device().name.eq_ignore_ascii_case(name)
                    || m.display_name().eq_ignore_ascii_case(name)
            })
            .cloned()
    }

    /// Like [`Self::find_by_name`], failing with `DeviceNotFound`.
    pub fn require_by_name(&self, name: &str) -> Result<Arc<DeviceStateMachine<A>>> {
        self.find_by_name(name)
            .ok_or_else(|| Error::DeviceNotFound(name.trim().to_string()))
    }

    pub fn machines(&self) -> Vec<Arc<DeviceStateMachine<A>>> {
        self.inner().machines.values().cloned().collect()
    }

    /// Kind a device gets when it is registered from the address book.
    ///
    /// An explicit duration entry decides; otherwise doors are plain doors
    /// and actuators are gates.
    pub fn kind_for(&self, device: &DeviceRef) -> DeviceKind {
        self.durations
            .iter()
            .find(|d| d.name == device.name)
            .map(|d| d.kind)
            .unwrap_or(match device.source {
                DeviceSource::Door => DeviceKind::Door,
                DeviceSource::Actuator => DeviceKind::Gate,
            })
    }

    /// Register every device of a discovered address book.
    pub fn register_address_book(&self, book: &AddressBook) -> Vec<DeviceIdentity> {
        let identities: Vec<DeviceIdentity> = book
            .device_refs()
            .iter()
            .map(|device| {
                let kind = self.kind_for(device);
                self.get_or_create(device, kind).identity()
            })
            .collect();
        debug!(count = identities.len(), "Registered address book");
        identities
    }

    /// Remember accessories from an earlier run. Returns how many were loaded.
    pub fn restore(&self, cache: AccessoryCache) -> usize {
        let mut inner = self.inner();
        let before = inner.cached.len();
        inner.cached.extend(cache.into_map());
        let restored = inner.cached.len() - before;
        debug!(restored, "Loaded cached accessories");
        restored
    }

    pub fn is_cached(&self, identity: DeviceIdentity) -> bool {
        self.inner().cached.contains_key(&identity)
    }

    /// Cache content describing every known accessory.
    ///
    /// Cached accessories that were not rediscovered this run are kept.
    pub fn snapshot_cache(&self) -> AccessoryCache {
        let inner = self.inner();
        let mut entries = inner.cached.clone();
        for (identity, machine) in &inner.machines {
            entries.insert(
                *identity,
                CachedAccessory::new(
                    machine.device().clone(),
                    machine.kind(),
                    machine.display_name(),
                ),
            );
        }
        entries.into_values().collect()
    }

    /// Wait until no registered device has a transition scheduled.
    pub async fn wait_settled(&self) {
        for machine in self.machines() {
            machine.wait_settled().await;
        }
    }

    pub fn len(&self) -> usize {
        self.inner().machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner().machines.is_empty()
    }
}

impl<A: Activator> std::fmt::Debug for DeviceRegistry<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("devices", &self.len())
            .finish_non_exhaustive()
    }
}
