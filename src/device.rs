// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device records as stored in the registry.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A registry entry representing one controllable or observable physical
/// endpoint.
///
/// The record's identity (`id`, `name`, `kind`, `integration`) is fixed for
/// the process lifetime; only `state` mutates, and only through
/// [`DeviceRegistry::mutate`](crate::registry::DeviceRegistry::mutate).
///
/// # Examples
///
/// ```
/// use homefleet::{Device, DeviceKind, Integration};
///
/// let device: Device = serde_json::from_value(serde_json::json!({
///     "id": "office-lamp",
///     "name": "Office Lamp",
///     "type": "switch",
///     "integration": { "type": "relay-switch", "host": "192.168.1.40", "channel": 0 },
///     "state": { "on": false }
/// }))?;
///
/// assert_eq!(device.kind, DeviceKind::Switch);
/// assert!(matches!(device.integration, Some(Integration::RelaySwitch { .. })));
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Unique, stable identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Device capability, drives action dispatch.
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    /// Binding to a physical integration, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integration: Option<Integration>,
    /// Open state document. Opaque to the registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Value>,
}

/// Device capability.
///
/// Closed set: action dispatch matches exhaustively over these, so adding a
/// capability is a compile-time-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// On/off relay, accepts toggle and explicit on/off actions.
    Switch,
    /// Brightness level 0-100, accepts level actions.
    Dimmer,
    /// Read-only measurement source, accepts no actions.
    Sensor,
    /// Snapshot/stream endpoint, proxied outside this crate.
    Camera,
}

/// Integration binding for a device.
///
/// The tag and field names match the durable store document. A device
/// without an integration carries no `integration` key at all
/// (`Option::None` on [`Device`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Integration {
    /// Relay switch speaking the Shelly-style JSON-RPC API.
    #[serde(rename = "relay-switch")]
    RelaySwitch {
        /// Hostname or IP address of the relay.
        host: String,
        /// Relay channel identifier. Optional in the store; the adapter
        /// rejects records without one instead of failing the whole load.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        channel: Option<u32>,
    },
    /// Environmental sensor exposing a single JSON status endpoint.
    #[serde(rename = "environmental-sensor")]
    EnvironmentalSensor {
        /// Fully-qualified status URL.
        #[serde(rename = "baseUrl")]
        base_url: String,
    },
    /// Camera proxied by an external collaborator. Carried in the data
    /// model only; this crate never dials it.
    #[serde(rename = "camera-proxy")]
    CameraProxy {
        /// Hostname or IP address of the camera.
        host: String,
        /// Path of the still-snapshot endpoint.
        #[serde(rename = "snapshotPath")]
        snapshot_path: String,
        /// Path of the RTSP stream.
        #[serde(rename = "streamPath")]
        stream_path: String,
    },
}

impl Integration {
    /// Whether this integration has a read path the reconciliation engine
    /// can pull state from.
    #[must_use]
    pub fn is_readable(&self) -> bool {
        matches!(
            self,
            Self::RelaySwitch { .. } | Self::EnvironmentalSensor { .. }
        )
    }
}
