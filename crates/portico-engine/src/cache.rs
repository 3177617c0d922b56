//! Persistent accessory cache.
//!
//! Remembers which devices were registered in earlier runs so rediscovered
//! devices keep their identity and display name.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use portico_core::{DeviceIdentity, DeviceKind, DeviceRef, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One registered device as stored on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAccessory {
    pub identity: DeviceIdentity,
    pub display_name: String,
    pub kind: DeviceKind,
    pub device: DeviceRef,
}

impl CachedAccessory {
    pub fn new(device: DeviceRef, kind: DeviceKind, display_name: impl Into<String>) -> Self {
        Self {
            identity: device.identity(),
            display_name: display_name.into(),
            kind,
            device,
        }
    }
}

/// Accessories keyed by identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryCache {
    #[serde(default)]
    accessories: Vec<CachedAccessory>,
}

impl AccessoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the cache at `path`. A missing file is an empty cache.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No accessory cache yet");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let cache: Self = serde_json::from_str(&content)?;
        info!(path = %path.display(), count = cache.len(), "Loaded accessory cache");
        Ok(cache)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), count = self.len(), "Saved accessory cache");
        Ok(())
    }

    /// Insert or replace the entry for the accessory's identity.
    pub fn insert(&mut self, accessory: CachedAccessory) {
        match self
            .accessories
            .iter_mut()
            .find(|a| a.identity == accessory.identity)
        {
            Some(existing) => *existing = accessory,
            None => self.accessories.push(accessory),
        }
    }

    pub fn get(&self, identity: DeviceIdentity) -> Option<&CachedAccessory> {
        self.accessories.iter().find(|a| a.identity == identity)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachedAccessory> {
        self.accessories.iter()
    }

    pub fn len(&self) -> usize {
        self.accessories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accessories.is_empty()
    }

    /// Entries keyed by identity.
    pub fn into_map(self) -> BTreeMap<DeviceIdentity, CachedAccessory> {
        self.accessories
            .into_iter()
            .map(|a| (a.identity, a))
            .collect()
    }
}

impl FromIterator<CachedAccessory> for AccessoryCache {
    fn from_iter<T: IntoIterator<Item = CachedAccessory>>(iter: T) -> Self {
        let mut cache = Self::new();
        for accessory in iter {
            cache.insert(accessory);
        }
        cache
    }
}
