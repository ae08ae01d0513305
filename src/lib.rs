// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `homefleet` - maintain a small fleet of smart-home devices.
//!
//! The crate keeps an authoritative device registry, durable in a single
//! JSON document, and reconciles it on demand against the live state
//! reported by physical integrations (relay switches speaking a JSON-RPC
//! API, environmental sensors exposing a status endpoint). User-issued
//! actions are validated per device capability, applied to the physical
//! device, and the confirmed state is reflected back into the registry.
//!
//! # Architecture
//!
//! - [`registry::DeviceRegistry`] — the persisted device store. Its
//!   [`mutate`](registry::DeviceRegistry::mutate) primitive is the only
//!   path by which device state changes, and it only rewrites the store
//!   when the new state actually differs.
//! - [`integration`] — one adapter per integration kind, mapping device
//!   responses into sparse state patches.
//! - [`DeviceService`] — reconciliation fan-out and action dispatch on top
//!   of the two.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use homefleet::{DeviceRegistry, DeviceService, IntegrationClient};
//!
//! #[tokio::main]
//! async fn main() -> homefleet::Result<()> {
//!     let registry = Arc::new(DeviceRegistry::open("devices.json").await);
//!     let service = DeviceService::new(registry, IntegrationClient::new()?);
//!
//!     // Reconciles against every live integration, then lists.
//!     for device in service.list_devices().await {
//!         println!("{}: {:?}", device.name, device.state);
//!     }
//!
//!     // Toggle a switch (read-confirm-write against the physical relay).
//!     if let Some(device) = service.find_device_by_id("office-lamp").await {
//!         let updated = service
//!             .perform_action(&device, &serde_json::json!({"action": "toggle"}))
//!             .await?;
//!         println!("now: {:?}", updated.state);
//!     }
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod error;
pub mod integration;
pub mod registry;
pub mod service;
pub mod state;

pub use device::{Device, DeviceKind, Integration};
pub use error::{Error, IntegrationError, Result, StatusClass, StoreError};
pub use integration::IntegrationClient;
pub use registry::DeviceRegistry;
pub use service::DeviceService;
