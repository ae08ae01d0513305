// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Relay-switch adapter.
//!
//! Speaks the Shelly-style JSON-RPC API: `Switch.GetStatus` for reads,
//! `Switch.Set` for commands, both POSTed to `/rpc/<method>` with the
//! channel id in the body.
//!
//! The `Switch.Set` response only echoes the previous state (`was_on`), so
//! its patch is typically empty; callers confirm with an explicit read.

use serde_json::{Map, Value, json};

use crate::error::IntegrationError;
use crate::state::StatePatch;

use super::{base_url_for, fetch_json_object, IntegrationClient};

#[derive(Debug)]
struct RelayEndpoint {
    base_url: String,
    channel: u32,
}

impl RelayEndpoint {
    fn resolve(host: &str, channel: Option<u32>) -> Result<Self, IntegrationError> {
        let host = host.trim();
        if host.is_empty() {
            return Err(IntegrationError::Configuration(
                "relay-switch integration is missing the device host".into(),
            ));
        }
        let channel = channel.ok_or_else(|| {
            IntegrationError::Configuration(
                "relay-switch integration is missing the channel identifier".into(),
            )
        })?;

        Ok(Self {
            base_url: base_url_for(host),
            channel,
        })
    }

    fn rpc_url(&self, method: &str) -> String {
        format!("{}/rpc/{method}", self.base_url)
    }
}

/// Reads the relay's current status and maps it to a sparse state patch.
pub(crate) async fn read_state(
    client: &IntegrationClient,
    host: &str,
    channel: Option<u32>,
) -> Result<StatePatch, IntegrationError> {
    let endpoint = RelayEndpoint::resolve(host, channel)?;
    let url = endpoint.rpc_url("Switch.GetStatus");

    tracing::debug!(%url, channel = endpoint.channel, "reading relay status");

    let payload = fetch_json_object(
        client.http().post(&url).json(&json!({ "id": endpoint.channel })),
        &url,
    )
    .await?;

    Ok(extract_switch_patch(&payload))
}

/// Commands the relay on or off.
///
/// The returned patch carries whatever the write response could be mapped
/// to, which for this API is usually nothing; the caller is expected to
/// follow up with [`read_state`] to confirm.
pub(crate) async fn set_switch(
    client: &IntegrationClient,
    host: &str,
    channel: Option<u32>,
    on: bool,
) -> Result<StatePatch, IntegrationError> {
    let endpoint = RelayEndpoint::resolve(host, channel)?;
    let url = endpoint.rpc_url("Switch.Set");

    tracing::debug!(%url, channel = endpoint.channel, on, "setting relay state");

    let payload = fetch_json_object(
        client
            .http()
            .post(&url)
            .json(&json!({ "id": endpoint.channel, "on": on })),
        &url,
    )
    .await?;

    Ok(extract_switch_patch(&payload))
}

/// Maps a relay status object to a state patch. Fields the relay did not
/// report are omitted.
fn extract_switch_patch(payload: &Map<String, Value>) -> StatePatch {
    let mut patch = StatePatch::new();

    if let Some(output) = payload.get("output").and_then(Value::as_bool) {
        patch.insert("on".into(), Value::Bool(output));
    }
    for (source, target) in [
        ("apower", "powerW"),
        ("voltage", "voltageV"),
        ("current", "currentA"),
    ] {
        if let Some(value) = payload.get(source).filter(|value| value.is_number()) {
            patch.insert(target.into(), value.clone());
        }
    }
    if let Some(celsius) = payload
        .get("temperature")
        .and_then(Value::as_object)
        .and_then(|temperature| temperature.get("tC"))
        .filter(|value| value.is_number())
    {
        patch.insert("temperatureC".into(), celsius.clone());
    }

    patch
}
