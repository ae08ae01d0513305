// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The authoritative device registry, mirrored to a durable JSON document.
//!
//! The registry holds the full device list in memory and rewrites the backing
//! file in full on every committed mutation. [`DeviceRegistry::mutate`] is the
//! only path by which a device's state changes; reconciliation and action
//! handling both compose through it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};

use crate::error::{Error, Result, StoreError};
use crate::state::{as_object_or_empty, deep_equal};
use crate::Device;

/// In-memory cache of device records, keyed for O(1) lookup.
#[derive(Debug, Default)]
struct Cache {
    devices: Vec<Device>,
    index: HashMap<String, usize>,
}

impl Cache {
    fn new(devices: Vec<Device>) -> Self {
        let index = devices
            .iter()
            .enumerate()
            .map(|(position, device)| (device.id.clone(), position))
            .collect();
        Self { devices, index }
    }

    fn get(&self, id: &str) -> Option<&Device> {
        self.index.get(id).map(|&position| &self.devices[position])
    }
}

/// Authoritative device registry backed by a JSON document on disk.
///
/// The document is an array of device records, pretty-printed with a
/// trailing newline so it diffs well under version control. It is loaded
/// once at startup and rewritten in full (atomically, via a temp file and
/// rename) whenever a mutation commits.
///
/// # Examples
///
/// ```no_run
/// use homefleet::registry::DeviceRegistry;
///
/// #[tokio::main]
/// async fn main() {
///     // Fail-open: a corrupt or missing store logs and starts empty.
///     let registry = DeviceRegistry::open("devices.json").await;
///     for device in registry.list().await {
///         println!("{} ({})", device.name, device.id);
///     }
/// }
/// ```
#[derive(Debug)]
pub struct DeviceRegistry {
    path: PathBuf,
    cache: RwLock<Cache>,
    /// Per-device mutation locks. Two concurrent `mutate` calls for the same
    /// id serialize here; different ids proceed independently.
    mutation_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl DeviceRegistry {
    /// Loads the registry from the durable store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the file cannot be read and
    /// [`StoreError::Malformed`] if its content is not a JSON array of
    /// device records.
    pub async fn load(path: impl AsRef<Path>) -> std::result::Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let contents = tokio::fs::read(&path).await.map_err(StoreError::Read)?;
        let devices: Vec<Device> =
            serde_json::from_slice(&contents).map_err(StoreError::Malformed)?;

        Ok(Self::with_devices(path, devices))
    }

    /// Opens the registry, substituting an empty one if the store cannot be
    /// loaded.
    ///
    /// Load failures are logged and recovered here; they never propagate to
    /// callers.
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        match Self::load(&path).await {
            Ok(registry) => registry,
            Err(error) => {
                tracing::error!(path = %path.display(), %error, "failed to load device store, starting empty");
                Self::with_devices(path, Vec::new())
            }
        }
    }

    fn with_devices(path: PathBuf, devices: Vec<Device>) -> Self {
        Self {
            path,
            cache: RwLock::new(Cache::new(devices)),
            mutation_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Returns deep copies of all devices, in storage order.
    pub async fn list(&self) -> Vec<Device> {
        self.cache.read().await.devices.clone()
    }

    /// Returns a deep copy of the device with the given id. Absence is a
    /// normal value, not an error.
    pub async fn find_by_id(&self, id: &str) -> Option<Device> {
        self.cache.read().await.get(id).cloned()
    }

    /// Applies a state mutation to the device with the given id.
    ///
    /// The patch function receives a deep, independent copy of the device's
    /// current state as a map (empty when state is absent or not an object)
    /// and returns the candidate next state. When the candidate is deeply
    /// structurally equal to the previous state, the device is returned
    /// unchanged and the durable store is not touched. Otherwise the record
    /// is replaced in memory and the full device array is rewritten to disk.
    ///
    /// Mutations for the same device id serialize on a per-id lock, so
    /// concurrent callers cannot silently lose each other's updates.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] for unknown ids and
    /// [`Error::Store`] when the rewrite fails.
    pub async fn mutate<F>(&self, id: &str, patch_fn: F) -> Result<Device>
    where
        F: FnOnce(Map<String, Value>) -> Value,
    {
        let id_lock = self.mutation_lock(id).await;
        let _mutation = id_lock.lock().await;

        let (previous, working_copy) = {
            let cache = self.cache.read().await;
            let device = cache.get(id).ok_or(Error::DeviceNotFound)?;
            (device.state.clone(), as_object_or_empty(device.state.as_ref()))
        };

        let candidate = patch_fn(working_copy);

        let unchanged = previous
            .as_ref()
            .is_some_and(|state| deep_equal(state, &candidate));
        if unchanged {
            // Skipping the write is a contract, not an optimization: callers
            // rely on no-op mutations leaving the store untouched.
            let cache = self.cache.read().await;
            return cache.get(id).cloned().ok_or(Error::DeviceNotFound);
        }

        // Hold the write lock across persistence so the file never reflects
        // a snapshot older than the cache.
        let mut cache = self.cache.write().await;
        let position = *cache.index.get(id).ok_or(Error::DeviceNotFound)?;
        cache.devices[position].state = Some(candidate);
        let updated = cache.devices[position].clone();

        self.persist(&cache.devices).await?;
        Ok(updated)
    }

    async fn mutation_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.mutation_locks.lock().await;
        Arc::clone(locks.entry(id.to_owned()).or_default())
    }

    /// Rewrites the durable store in full: serialized to a temp file first,
    /// then renamed over the live document so readers never see a torn write.
    async fn persist(&self, devices: &[Device]) -> std::result::Result<(), StoreError> {
        let mut serialized = serde_json::to_vec_pretty(devices).map_err(|error| {
            StoreError::Persist(std::io::Error::new(std::io::ErrorKind::InvalidData, error))
        })?;
        serialized.push(b'\n');

        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &serialized)
            .await
            .map_err(StoreError::Persist)?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(StoreError::Persist)
    }
}
