// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state service: reconciliation against live integrations and
//! dispatch of user-issued actions.
//!
//! This is the public surface a transport layer consumes. Listing devices
//! first reconciles the registry against every readable integration, so
//! callers observe best-effort freshness; actions validate against the
//! device's capability and, for two-way integrations, follow the
//! read-confirm-write protocol (the physical device is the source of truth
//! for on/off state).

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::task::JoinSet;

use crate::device::{Device, DeviceKind, Integration};
use crate::error::{Error, Result};
use crate::integration::{self, IntegrationClient};
use crate::registry::DeviceRegistry;
use crate::state::{as_object_or_empty, merge_patch, state_differs};

/// Coordinates the registry, the integration adapters, and action handling.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use homefleet::{DeviceRegistry, DeviceService, IntegrationClient};
///
/// #[tokio::main]
/// async fn main() -> homefleet::Result<()> {
///     let registry = Arc::new(DeviceRegistry::open("devices.json").await);
///     let service = DeviceService::new(registry, IntegrationClient::new()?);
///
///     for device in service.list_devices().await {
///         println!("{}: {:?}", device.name, device.state);
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct DeviceService {
    registry: Arc<DeviceRegistry>,
    client: IntegrationClient,
}

impl DeviceService {
    /// Creates a service over the given registry and integration client.
    #[must_use]
    pub fn new(registry: Arc<DeviceRegistry>, client: IntegrationClient) -> Self {
        Self { registry, client }
    }

    /// Returns deep copies of all devices after a reconciliation pass.
    pub async fn list_devices(&self) -> Vec<Device> {
        self.refresh_all_devices().await;
        self.registry.list().await
    }

    /// Returns a deep copy of the device with the given id, if present.
    pub async fn find_device_by_id(&self, id: &str) -> Option<Device> {
        self.registry.find_by_id(id).await
    }

    /// Pulls live physical state for every device with a readable
    /// integration and merges it into the registry.
    ///
    /// Devices are refreshed concurrently with no ordering guarantee. A
    /// failure (unreachable device, protocol error) skips that device only
    /// and never synthesizes error state: stale-but-correct beats invented
    /// values.
    pub async fn refresh_all_devices(&self) {
        let mut refreshes = JoinSet::new();

        for device in self.registry.list().await {
            let Some(integration) = device.integration.clone() else {
                continue;
            };
            if !integration.is_readable() {
                continue;
            }

            let registry = Arc::clone(&self.registry);
            let client = self.client.clone();
            refreshes.spawn(async move {
                refresh_device(&registry, &client, &device.id, &integration).await;
            });
        }

        while let Some(joined) = refreshes.join_next().await {
            if let Err(error) = joined {
                tracing::warn!(%error, "device refresh task failed");
            }
        }
    }

    /// Validates and executes a user-issued action against a device.
    ///
    /// The committed device record is returned. Validation failures are
    /// client-class errors; adapter failures on the command path propagate
    /// as server-class errors.
    ///
    /// # Errors
    ///
    /// [`Error::Validation`] for a payload the device's capability rejects,
    /// [`Error::Integration`] when the physical command fails,
    /// [`Error::DeviceNotFound`] if the device vanished from the registry.
    pub async fn perform_action(&self, device: &Device, payload: &Value) -> Result<Device> {
        match device.kind {
            DeviceKind::Switch => self.handle_switch_action(device, payload).await,
            DeviceKind::Dimmer => self.handle_dimmer_action(device, payload).await,
            DeviceKind::Sensor => Err(Error::validation("Sensor devices are read-only")),
            DeviceKind::Camera => Err(Error::validation(
                "Device type \"camera\" does not support actions",
            )),
        }
    }

    async fn handle_switch_action(&self, device: &Device, payload: &Value) -> Result<Device> {
        let request = SwitchRequest::parse(payload)?;
        let desired_on = self.resolve_desired_on(device, request).await;

        if let Some(Integration::RelaySwitch { host, channel }) = &device.integration {
            return self
                .apply_relay_update(device, host, *channel, desired_on)
                .await;
        }

        self.registry
            .mutate(&device.id, move |mut state| {
                state.insert("on".into(), Value::Bool(desired_on));
                Value::Object(state)
            })
            .await
    }

    /// Computes the on/off value the action asks for. A toggle against a
    /// live relay re-reads the physical state first, because toggling
    /// against a stale cached value flips the wrong way; the cached value
    /// is only the fallback.
    async fn resolve_desired_on(&self, device: &Device, request: SwitchRequest) -> bool {
        if let SwitchRequest::Set(on) = request {
            return on;
        }

        let mut current_on = cached_on(device).unwrap_or(false);

        if let Some(integration @ Integration::RelaySwitch { .. }) = &device.integration {
            match integration::read_state(&self.client, integration).await {
                Ok(patch) => {
                    if let Some(on) = patch.get("on").and_then(Value::as_bool) {
                        current_on = on;
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        device = %device.id, %error,
                        "failed to read current relay state before toggle, using cached value"
                    );
                }
            }
        }

        !current_on
    }

    /// Read-confirm-write commit for a relay-backed switch: the write
    /// response patch first, the confirmation read merged on top (the
    /// confirmation wins on disagreement), and the locally desired value
    /// only when neither reported on/off.
    async fn apply_relay_update(
        &self,
        device: &Device,
        host: &str,
        channel: Option<u32>,
        desired_on: bool,
    ) -> Result<Device> {
        let write_patch =
            integration::set_switch(&self.client, host, channel, desired_on).await?;

        let mut patch = write_patch;
        match integration::read_state(
            &self.client,
            &Integration::RelaySwitch {
                host: host.to_owned(),
                channel,
            },
        )
        .await
        {
            Ok(confirm_patch) => {
                patch = merge_patch(patch, &confirm_patch);
            }
            Err(error) => {
                tracing::warn!(
                    device = %device.id, %error,
                    "failed to confirm relay state after update"
                );
            }
        }

        if !matches!(patch.get("on"), Some(Value::Bool(_))) {
            patch.insert("on".into(), Value::Bool(desired_on));
        }

        self.registry
            .mutate(&device.id, move |state| {
                Value::Object(merge_patch(state, &patch))
            })
            .await
    }

    async fn handle_dimmer_action(&self, device: &Device, payload: &Value) -> Result<Device> {
        let level = payload
            .as_object()
            .and_then(|object| object.get("level"))
            .and_then(Value::as_i64)
            .filter(|level| (0..=100).contains(level))
            .ok_or_else(|| Error::validation("Dimmer actions require a level between 0 and 100"))?;

        self.registry
            .mutate(&device.id, move |mut state| {
                state.insert("level".into(), json!(level));
                Value::Object(state)
            })
            .await
    }
}

/// One reconciliation step: read physical state, merge shallowly over the
/// registry's current document, and commit only when something differs.
async fn refresh_device(
    registry: &DeviceRegistry,
    client: &IntegrationClient,
    device_id: &str,
    integration: &Integration,
) {
    let patch = match integration::read_state(client, integration).await {
        Ok(patch) => patch,
        Err(error) => {
            tracing::warn!(device = device_id, %error, "failed to refresh device state, skipping");
            return;
        }
    };
    if patch.is_empty() {
        return;
    }

    let Some(current) = registry.find_by_id(device_id).await else {
        return;
    };
    let current_state = as_object_or_empty(current.state.as_ref());
    let next_state = merge_patch(current_state.clone(), &patch);
    if !state_differs(&current_state, &next_state) {
        return;
    }

    let result = registry
        .mutate(device_id, move |state| {
            Value::Object(merge_patch(state, &patch))
        })
        .await;
    if let Err(error) = result {
        tracing::warn!(device = device_id, %error, "failed to persist refreshed device state");
    }
}

fn cached_on(device: &Device) -> Option<bool> {
    device
        .state
        .as_ref()
        .and_then(|state| state.get("on"))
        .and_then(Value::as_bool)
}

/// Parsed switch action payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SwitchRequest {
    Toggle,
    Set(bool),
}

impl SwitchRequest {
    fn parse(payload: &Value) -> Result<Self> {
        if let Some(object) = payload.as_object() {
            if object.get("action").and_then(Value::as_str) == Some("toggle") {
                return Ok(Self::Toggle);
            }
            if let Some(on) = object.get("on").and_then(Value::as_bool) {
                return Ok(Self::Set(on));
            }
        }

        Err(Error::validation(
            "Switch actions require { action: \"toggle\" } or { on: boolean }",
        ))
    }
}
