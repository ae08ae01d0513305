// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration adapters: outbound HTTP to physical devices.
//!
//! Each adapter translates a device's [`Integration`] configuration into
//! requests against the physical endpoint and maps the response into a
//! sparse [`StatePatch`]. Adapters validate configuration before dialing
//! ([`IntegrationError::Configuration`]) so callers can tell a broken record
//! from a broken network.

mod env_sensor;
mod relay_switch;

use std::time::Duration;

use serde_json::{Map, Value};

use crate::device::Integration;
use crate::error::IntegrationError;
use crate::state::StatePatch;

pub(crate) use relay_switch::set_switch;

/// HTTP client shared by all integration adapters.
///
/// Requests carry a bounded timeout; a request past its deadline classifies
/// as [`IntegrationError::Unreachable`], same as a connect failure.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use homefleet::IntegrationClient;
///
/// let client = IntegrationClient::with_timeout(Duration::from_secs(3)).unwrap();
/// # let _ = client;
/// ```
#[derive(Debug, Clone)]
pub struct IntegrationClient {
    client: reqwest::Client,
}

impl IntegrationClient {
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a client with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self, IntegrationError> {
        Self::with_timeout(Self::DEFAULT_TIMEOUT)
    }

    /// Creates a client with a custom per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self, IntegrationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| IntegrationError::Protocol(error.to_string()))?;
        Ok(Self { client })
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }
}

/// Reads the current physical state for a device's integration.
///
/// The returned patch is sparse: fields the device did not report are
/// absent, never null-filled.
///
/// # Errors
///
/// [`IntegrationError::Configuration`] for invalid or non-readable
/// configurations, [`IntegrationError::Unreachable`] when the device cannot
/// be dialed, [`IntegrationError::Protocol`] for non-success responses or
/// unusable payloads.
pub async fn read_state(
    client: &IntegrationClient,
    integration: &Integration,
) -> Result<StatePatch, IntegrationError> {
    match integration {
        Integration::RelaySwitch { host, channel } => {
            relay_switch::read_state(client, host, *channel).await
        }
        Integration::EnvironmentalSensor { base_url } => {
            env_sensor::read_state(client, base_url).await
        }
        Integration::CameraProxy { .. } => Err(IntegrationError::Configuration(
            "camera-proxy integration has no state read path".into(),
        )),
    }
}

/// Sends a request and returns the response body as a JSON object, applying
/// the shared failure taxonomy: connect/timeout failures are `Unreachable`,
/// non-success statuses and unusable payloads are `Protocol`.
async fn fetch_json_object(
    request: reqwest::RequestBuilder,
    endpoint: &str,
) -> Result<Map<String, Value>, IntegrationError> {
    let response = request
        .send()
        .await
        .map_err(|error| IntegrationError::from_request(&error))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(IntegrationError::Protocol(format!(
            "{endpoint} responded with {status}: {body}"
        )));
    }

    let payload: Value = response.json().await.map_err(|error| {
        IntegrationError::Protocol(format!("{endpoint} returned invalid JSON: {error}"))
    })?;

    tracing::debug!(endpoint, %payload, "integration response");

    match payload {
        Value::Object(object) => Ok(object),
        other => Err(IntegrationError::Protocol(format!(
            "{endpoint} returned an unexpected payload: {other}"
        ))),
    }
}

/// Prefixes a bare host with `http://`, leaving explicit schemes alone.
fn base_url_for(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_owned()
    } else {
        format!("http://{host}")
    }
}
