// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for reconciliation and action dispatch using wiremock.

use std::sync::Arc;
use std::time::Duration;

use homefleet::{
    Device, DeviceRegistry, DeviceService, Error, IntegrationClient, StatusClass,
};
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn service_with(devices: Value) -> (TempDir, Arc<DeviceRegistry>, DeviceService) {
    let dir = tempfile::tempdir().unwrap();
    let store_path = dir.path().join("devices.json");
    std::fs::write(
        &store_path,
        format!("{}\n", serde_json::to_string_pretty(&devices).unwrap()),
    )
    .unwrap();

    let registry = Arc::new(DeviceRegistry::load(&store_path).await.unwrap());
    let client = IntegrationClient::with_timeout(Duration::from_secs(2)).unwrap();
    let service = DeviceService::new(Arc::clone(&registry), client);
    (dir, registry, service)
}

fn relay_device(id: &str, host: &str, state: Value) -> Value {
    json!({
        "id": id,
        "name": id,
        "type": "switch",
        "integration": { "type": "relay-switch", "host": host, "channel": 0 },
        "state": state
    })
}

fn find(devices: &[Device], id: &str) -> Device {
    devices.iter().find(|d| d.id == id).cloned().unwrap()
}

// ============================================================================
// Reconciliation
// ============================================================================

mod reconciliation {
    use super::*;

    #[tokio::test]
    async fn relay_state_is_pulled_into_registry() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rpc/Switch.GetStatus"))
            .and(body_json(json!({ "id": 0 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 0,
                "output": true,
                "apower": 8.4,
                "voltage": 230.1,
                "current": 0.04
            })))
            .mount(&mock_server)
            .await;

        let (_dir, _registry, service) = service_with(json!([relay_device(
            "office-lamp",
            &mock_server.uri(),
            json!({ "on": false, "label": "keep-me" })
        )]))
        .await;

        let devices = service.list_devices().await;
        let state = find(&devices, "office-lamp").state.unwrap();

        assert_eq!(state["on"], json!(true));
        assert_eq!(state["powerW"], json!(8.4));
        // Shallow merge preserves keys the integration does not report.
        assert_eq!(state["label"], json!("keep-me"));
    }

    #[tokio::test]
    async fn sensor_state_merges_sparsely() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sensor": "dht22",
                "temperature_c": 23.9,
                "humidity_pct": 44.1,
                "stale": false
            })))
            .mount(&mock_server)
            .await;

        let (_dir, _registry, service) = service_with(json!([{
            "id": "rack-sensor",
            "name": "Rack Sensor",
            "type": "sensor",
            "integration": {
                "type": "environmental-sensor",
                "baseUrl": format!("{}/status", mock_server.uri())
            },
            "state": { "temperatureC": 20.0, "location": "rack-2" }
        }]))
        .await;

        let devices = service.list_devices().await;
        let state = find(&devices, "rack-sensor").state.unwrap();

        assert_eq!(state["temperatureC"], json!(23.9));
        assert_eq!(state["humidityPercent"], json!(44.1));
        assert_eq!(state["sensor"], json!("dht22"));
        assert_eq!(state["location"], json!("rack-2"));
    }

    #[tokio::test]
    async fn unreachable_device_is_skipped_while_others_refresh() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rpc/Switch.GetStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 0,
                "output": true
            })))
            .mount(&mock_server)
            .await;

        let (_dir, _registry, service) = service_with(json!([
            // Closed port: connect fails immediately.
            relay_device("dead-relay", "127.0.0.1:9", json!({ "on": false })),
            relay_device("live-relay", &mock_server.uri(), json!({ "on": false })),
        ]))
        .await;

        let devices = service.list_devices().await;

        assert_eq!(
            find(&devices, "dead-relay").state.unwrap(),
            json!({ "on": false })
        );
        assert_eq!(
            find(&devices, "live-relay").state.unwrap()["on"],
            json!(true)
        );
    }

    #[tokio::test]
    async fn protocol_error_never_mutates_state() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rpc/Switch.GetStatus"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let (_dir, _registry, service) = service_with(json!([relay_device(
            "flaky-relay",
            &mock_server.uri(),
            json!({ "on": true, "powerW": 3.0 })
        )]))
        .await;

        let devices = service.list_devices().await;
        assert_eq!(
            find(&devices, "flaky-relay").state.unwrap(),
            json!({ "on": true, "powerW": 3.0 })
        );
    }

    #[tokio::test]
    async fn unchanged_physical_state_triggers_no_write() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rpc/Switch.GetStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 0,
                "output": true
            })))
            .mount(&mock_server)
            .await;

        let (dir, _registry, service) = service_with(json!([relay_device(
            "steady-relay",
            &mock_server.uri(),
            json!({ "on": true })
        )]))
        .await;

        // Removing the store makes any durable write observable.
        let store_path = dir.path().join("devices.json");
        std::fs::remove_file(&store_path).unwrap();

        service.list_devices().await;
        assert!(
            !store_path.exists(),
            "reconciliation must not rewrite the store when nothing changed"
        );
    }
}

// ============================================================================
// Actions
// ============================================================================

mod actions {
    use super::*;

    #[tokio::test]
    async fn toggle_without_integration_round_trips() {
        let (_dir, _registry, service) = service_with(json!([{
            "id": "plain-switch",
            "name": "Plain Switch",
            "type": "switch",
            "state": { "on": false }
        }]))
        .await;

        let device = service.find_device_by_id("plain-switch").await.unwrap();
        let updated = service
            .perform_action(&device, &json!({ "action": "toggle" }))
            .await
            .unwrap();
        assert_eq!(updated.state.unwrap()["on"], json!(true));

        let device = service.find_device_by_id("plain-switch").await.unwrap();
        let updated = service
            .perform_action(&device, &json!({ "action": "toggle" }))
            .await
            .unwrap();
        assert_eq!(updated.state.unwrap()["on"], json!(false));
    }

    #[tokio::test]
    async fn relay_toggle_reads_current_state_before_flipping() {
        let mock_server = MockServer::start().await;

        // Registry believes "off", the physical relay reports "on": the
        // toggle must trust the relay and switch it off.
        Mock::given(method("POST"))
            .and(path("/rpc/Switch.GetStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 0,
                "output": true
            })))
            .mount(&mock_server)
            .await;
        let set_mock = Mock::given(method("POST"))
            .and(path("/rpc/Switch.Set"))
            .and(body_json(json!({ "id": 0, "on": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "was_on": true })))
            .expect(1)
            .mount_as_scoped(&mock_server)
            .await;

        let (_dir, _registry, service) = service_with(json!([relay_device(
            "office-lamp",
            &mock_server.uri(),
            json!({ "on": false })
        )]))
        .await;

        let device = service.find_device_by_id("office-lamp").await.unwrap();
        service
            .perform_action(&device, &json!({ "action": "toggle" }))
            .await
            .unwrap();

        drop(set_mock);
    }

    #[tokio::test]
    async fn confirmation_read_wins_over_write_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rpc/Switch.Set"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "was_on": false,
                "output": false
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rpc/Switch.GetStatus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 0,
                "output": true,
                "apower": 6.1
            })))
            .mount(&mock_server)
            .await;

        let (_dir, _registry, service) = service_with(json!([relay_device(
            "office-lamp",
            &mock_server.uri(),
            json!({ "on": false })
        )]))
        .await;

        let device = service.find_device_by_id("office-lamp").await.unwrap();
        let updated = service
            .perform_action(&device, &json!({ "on": true }))
            .await
            .unwrap();

        let state = updated.state.unwrap();
        assert_eq!(state["on"], json!(true));
        assert_eq!(state["powerW"], json!(6.1));
    }

    #[tokio::test]
    async fn failed_confirmation_falls_back_to_desired_value() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rpc/Switch.Set"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "was_on": false })))
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rpc/Switch.GetStatus"))
            .respond_with(ResponseTemplate::new(500).set_body_string("busy"))
            .mount(&mock_server)
            .await;

        let (_dir, _registry, service) = service_with(json!([relay_device(
            "office-lamp",
            &mock_server.uri(),
            json!({ "on": false })
        )]))
        .await;

        let device = service.find_device_by_id("office-lamp").await.unwrap();
        let updated = service
            .perform_action(&device, &json!({ "on": true }))
            .await
            .unwrap();

        assert_eq!(updated.state.unwrap()["on"], json!(true));
    }

    #[tokio::test]
    async fn failed_write_surfaces_as_server_error_and_leaves_state() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/rpc/Switch.Set"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overload"))
            .mount(&mock_server)
            .await;

        let (_dir, _registry, service) = service_with(json!([relay_device(
            "office-lamp",
            &mock_server.uri(),
            json!({ "on": false })
        )]))
        .await;

        let device = service.find_device_by_id("office-lamp").await.unwrap();
        let error = service
            .perform_action(&device, &json!({ "on": true }))
            .await
            .unwrap_err();

        assert!(matches!(error, Error::Integration(_)));
        assert_eq!(error.status_class(), StatusClass::ServerError);
        assert_eq!(
            service
                .find_device_by_id("office-lamp")
                .await
                .unwrap()
                .state
                .unwrap(),
            json!({ "on": false })
        );
    }

    #[tokio::test]
    async fn dimmer_commits_level() {
        let (_dir, _registry, service) = service_with(json!([{
            "id": "hall-dimmer",
            "name": "Hall Dimmer",
            "type": "dimmer",
            "state": { "level": 10 }
        }]))
        .await;

        let device = service.find_device_by_id("hall-dimmer").await.unwrap();
        let updated = service
            .perform_action(&device, &json!({ "level": 65 }))
            .await
            .unwrap();
        assert_eq!(updated.state.unwrap()["level"], json!(65));
    }

    #[tokio::test]
    async fn dimmer_rejects_invalid_levels_without_touching_state() {
        let (_dir, _registry, service) = service_with(json!([{
            "id": "hall-dimmer",
            "name": "Hall Dimmer",
            "type": "dimmer",
            "state": { "level": 10 }
        }]))
        .await;

        let device = service.find_device_by_id("hall-dimmer").await.unwrap();
        for payload in [
            json!({ "level": 150 }),
            json!({ "level": -1 }),
            json!({ "level": "x" }),
            json!({}),
        ] {
            let error = service.perform_action(&device, &payload).await.unwrap_err();
            assert_eq!(error.status_class(), StatusClass::ClientError, "{payload}");
        }

        assert_eq!(
            service
                .find_device_by_id("hall-dimmer")
                .await
                .unwrap()
                .state
                .unwrap(),
            json!({ "level": 10 })
        );
    }

    #[tokio::test]
    async fn sensor_rejects_every_action() {
        let (_dir, _registry, service) = service_with(json!([{
            "id": "rack-sensor",
            "name": "Rack Sensor",
            "type": "sensor",
            "state": { "temperatureC": 21.0 }
        }]))
        .await;

        let device = service.find_device_by_id("rack-sensor").await.unwrap();
        for payload in [json!({}), json!({ "on": true }), json!({ "action": "toggle" })] {
            let error = service.perform_action(&device, &payload).await.unwrap_err();
            assert!(matches!(error, Error::Validation { .. }), "{payload}");
            assert_eq!(error.to_string(), "Sensor devices are read-only");
        }
    }

    #[tokio::test]
    async fn camera_actions_name_the_unsupported_type() {
        let (_dir, _registry, service) = service_with(json!([{
            "id": "front-door",
            "name": "Front Door",
            "type": "camera",
            "integration": {
                "type": "camera-proxy",
                "host": "cam.local",
                "snapshotPath": "/snapshot",
                "streamPath": "/stream"
            }
        }]))
        .await;

        let device = service.find_device_by_id("front-door").await.unwrap();
        let error = service
            .perform_action(&device, &json!({ "action": "toggle" }))
            .await
            .unwrap_err();

        assert_eq!(
            error.to_string(),
            "Device type \"camera\" does not support actions"
        );
        assert_eq!(error.status_class(), StatusClass::ClientError);
    }

    #[tokio::test]
    async fn switch_payload_validation_is_a_client_error() {
        let (_dir, _registry, service) = service_with(json!([{
            "id": "plain-switch",
            "name": "Plain Switch",
            "type": "switch"
        }]))
        .await;

        let device = service.find_device_by_id("plain-switch").await.unwrap();
        let error = service
            .perform_action(&device, &json!({ "on": "yes" }))
            .await
            .unwrap_err();

        assert_eq!(error.status_class(), StatusClass::ClientError);
        assert_eq!(
            error.to_string(),
            "Switch actions require { action: \"toggle\" } or { on: boolean }"
        );
    }
}
