// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Environmental-sensor adapter.
//!
//! The sensor exposes one JSON status endpoint at a configured base URL.
//! Its snake_case telemetry fields map to the camelCase keys the registry
//! stores; anything missing or mistyped is left out of the patch.

use serde_json::{Map, Value};

use crate::error::IntegrationError;
use crate::state::StatePatch;

use super::{IntegrationClient, fetch_json_object};

/// Reads the sensor's status document and maps it to a sparse state patch.
pub(crate) async fn read_state(
    client: &IntegrationClient,
    base_url: &str,
) -> Result<StatePatch, IntegrationError> {
    let base_url = base_url.trim();
    if base_url.is_empty() {
        return Err(IntegrationError::Configuration(
            "environmental-sensor integration requires a baseUrl".into(),
        ));
    }

    tracing::debug!(%base_url, "reading environmental sensor status");

    let payload = fetch_json_object(
        client
            .http()
            .get(base_url)
            .header(reqwest::header::ACCEPT, "application/json"),
        base_url,
    )
    .await?;

    Ok(extract_sensor_patch(&payload))
}

/// Maps the sensor's status object to a state patch.
fn extract_sensor_patch(payload: &Map<String, Value>) -> StatePatch {
    let mut patch = StatePatch::new();

    for (source, target) in [
        ("temperature_c", "temperatureC"),
        ("humidity_pct", "humidityPercent"),
        ("temperature_avg_c", "temperatureAvgC"),
        ("humidity_avg_pct", "humidityAvgPercent"),
        ("avg_window", "avgWindow"),
        ("avg_samples", "avgSamples"),
        ("uptime_ms", "uptimeMs"),
    ] {
        if let Some(value) = payload.get(source).filter(|value| value.is_number()) {
            patch.insert(target.into(), value.clone());
        }
    }
    if let Some(stale) = payload.get("stale").and_then(Value::as_bool) {
        patch.insert("stale".into(), Value::Bool(stale));
    }
    for key in ["sensor", "pin"] {
        if let Some(text) = payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
        {
            patch.insert(key.into(), Value::String(text.to_owned()));
        }
    }

    patch
}
