// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests driving the UDP stack against a fake unit on loopback.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use amberac_lib::discovery::{Discovery, DiscoveryListener, DiscoveryOptions};
use amberac_lib::polling::{Availability, PollError, PollingConfig, PollingCoordinator};
use amberac_lib::types::{DeviceInfo, Mode};
use amberac_lib::{CipherVersion, Device, Error};
use common::{FIRMWARE_ID, FakeAppliance, MAC, SESSION_KEY, fast_config};
use serde_json::{Value, json};

fn command_pairs(payload: &Value) -> Vec<(String, Value)> {
    let names = payload["opt"].as_array().cloned().unwrap_or_default();
    let values = payload["p"].as_array().cloned().unwrap_or_default();
    names
        .into_iter()
        .map(|name| name.as_str().unwrap().to_string())
        .zip(values)
        .collect()
}

// ============================================================================
// Binding
// ============================================================================

mod binding {
    use super::*;

    #[tokio::test]
    async fn negotiates_v1_session_key() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let device = Device::new(fake.info(), fast_config());

        let version = device.bind(None).await.unwrap();

        assert_eq!(version, CipherVersion::V1);
        assert_eq!(device.cipher().unwrap().key(), SESSION_KEY);
        assert_eq!(fake.received("bind")[0]["mac"], MAC);
    }

    #[tokio::test]
    async fn falls_back_to_v2_after_v1_times_out() {
        let fake = FakeAppliance::start(&[CipherVersion::V2]).await;
        let device = Device::new(fake.info(), fast_config());

        let version = device.bind(None).await.unwrap();

        assert_eq!(version, CipherVersion::V2);
        assert_eq!(device.cipher().unwrap().version(), CipherVersion::V2);
    }

    #[tokio::test]
    async fn explicit_variant_does_not_fall_back() {
        let fake = FakeAppliance::start(&[CipherVersion::V2]).await;
        let device = Device::new(fake.info(), fast_config());

        let err = device.bind(Some(CipherVersion::V1)).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(!device.is_bound());
    }

    #[tokio::test]
    async fn second_bind_is_rejected() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let device = Device::new(fake.info(), fast_config());
        device.bind(None).await.unwrap();

        assert!(matches!(device.bind(None).await, Err(Error::AlreadyBound)));
        assert_eq!(fake.received("bind").len(), 1);
    }

    #[tokio::test]
    async fn explicit_key_sends_nothing() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let device = Device::new(fake.info(), fast_config());

        device.bind_with_key(CipherVersion::V1, SESSION_KEY).unwrap();

        assert!(device.is_bound());
        assert!(fake.state().received.is_empty());
    }
}

// ============================================================================
// Reads and pushes
// ============================================================================

mod round_trips {
    use super::*;

    #[tokio::test]
    async fn update_state_binds_and_reads() {
        let fake = FakeAppliance::start(&[CipherVersion::V2]).await;
        let device = Device::new(fake.info(), fast_config());
        let updates = Arc::new(AtomicUsize::new(0));
        let updates_clone = Arc::clone(&updates);
        device.on_state_updated(move |_| {
            updates_clone.fetch_add(1, Ordering::SeqCst);
        });

        device.update_state().await.unwrap();

        assert!(device.is_bound());
        assert_eq!(updates.load(Ordering::SeqCst), 1);
        let state = device.state();
        assert!(state.power());
        assert_eq!(state.mode(), Some(Mode::Cool));
        assert_eq!(state.target_temperature(), Some(24));
        assert_eq!(state.current_temperature(), Some(25));
        assert_eq!(state.firmware_id(), Some(FIRMWARE_ID));
        assert_eq!(state.version().unwrap().as_str(), "3.31");
        assert!(state.is_clean());
    }

    #[tokio::test]
    async fn firmware_id_is_requested_until_obtained() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let device = Device::new(fake.info(), fast_config());
        device.bind_with_key(CipherVersion::V1, SESSION_KEY).unwrap();

        device.update_state().await.unwrap();
        device.update_state().await.unwrap();

        let reads = fake.received("status");
        let asked_hid = |payload: &Value| {
            payload["cols"]
                .as_array()
                .unwrap()
                .iter()
                .any(|col| col == "hid")
        };
        assert!(asked_hid(&reads[0]));
        assert!(!asked_hid(&reads[1]));
    }

    #[tokio::test]
    async fn request_version_asks_only_for_firmware_id() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let device = Device::new(fake.info(), fast_config());
        device.bind_with_key(CipherVersion::V1, SESSION_KEY).unwrap();

        device.request_version().await.unwrap();

        assert_eq!(fake.received("status")[0]["cols"], json!(["hid"]));
        assert_eq!(device.state().firmware_id(), Some(FIRMWARE_ID));
    }

    #[tokio::test]
    async fn push_sends_dirty_properties_and_clears_them() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let device = Device::new(fake.info(), fast_config());
        device.bind_with_key(CipherVersion::V1, SESSION_KEY).unwrap();
        device.update_state().await.unwrap();
        let results = Arc::new(AtomicUsize::new(0));
        let results_clone = Arc::clone(&results);
        device.on_command_result(move |values| {
            assert!(!values.contains_key("Buzzer_ON_OFF"));
            results_clone.fetch_add(1, Ordering::SeqCst);
        });

        device
            .modify_state(|state| {
                state.set_mode(Mode::Heat);
                state.set_target_temperature(22)
            })
            .unwrap();
        device.push_state_update().await.unwrap();

        let pairs = command_pairs(&fake.received("cmd")[0]);
        assert_eq!(
            pairs,
            vec![
                ("Mod".to_string(), json!(4)),
                ("SetTem".to_string(), json!(22)),
                ("TemRec".to_string(), json!(0)),
                ("TemUn".to_string(), json!(0)),
                ("Buzzer_ON_OFF".to_string(), json!(1)),
            ]
        );
        assert!(device.state().is_clean());
        assert_eq!(results.load(Ordering::SeqCst), 1);
        assert_eq!(fake.state().properties["SetTem"], json!(22));
    }

    #[tokio::test]
    async fn beep_suppresses_buzzer_flag() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let device = Device::new(fake.info(), fast_config());
        device.bind_with_key(CipherVersion::V1, SESSION_KEY).unwrap();

        device.modify_state(|state| {
            state.set_beep(true);
            state.set_light(false);
        });
        device.push_state_update().await.unwrap();

        let pairs = command_pairs(&fake.received("cmd")[0]);
        assert_eq!(pairs, vec![("Lig".to_string(), json!(0))]);
    }

    #[tokio::test]
    async fn unknown_property_survives_round_trip() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        fake.state().extra.insert("AntiDirectBlow".to_string(), json!(0));
        let device = Device::new(fake.info(), fast_config());
        device.bind_with_key(CipherVersion::V1, SESSION_KEY).unwrap();

        device.update_state().await.unwrap();
        assert_eq!(device.state().property("AntiDirectBlow"), Some(&json!(0)));

        device.modify_state(|state| state.set_property("AntiDirectBlow", 1));
        device.push_state_update().await.unwrap();

        let pairs = command_pairs(&fake.received("cmd")[0]);
        assert_eq!(pairs[0], ("AntiDirectBlow".to_string(), json!(1)));
    }

    #[tokio::test]
    async fn timed_out_push_still_clears_dirty_set() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let device = Device::new(fake.info(), fast_config());
        device.bind_with_key(CipherVersion::V1, SESSION_KEY).unwrap();
        fake.stop();

        device.modify_state(|state| state.set_power(false));
        let err = device.push_state_update().await.unwrap_err();

        assert!(err.is_timeout());
        assert!(device.state().is_clean());
    }

    #[tokio::test]
    async fn pending_change_is_not_overwritten_by_read() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let device = Device::new(fake.info(), fast_config());
        device.bind_with_key(CipherVersion::V1, SESSION_KEY).unwrap();

        device.modify_state(|state| state.set_power(false));
        device.update_state().await.unwrap();

        assert!(!device.state().power());
        assert_eq!(device.state().dirty().len(), 1);
    }
}

// ============================================================================
// Polling
// ============================================================================

mod polling {
    use super::*;

    #[tokio::test]
    async fn silent_device_becomes_unavailable_at_threshold() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let device = Arc::new(Device::new(fake.info(), fast_config()));
        device.bind_with_key(CipherVersion::V1, SESSION_KEY).unwrap();
        let coordinator =
            PollingCoordinator::new(device, PollingConfig::new().with_error_threshold(3));

        let store = coordinator.refresh().await.unwrap();
        assert_eq!(store.get_int(amberac_lib::Property::Power), Some(1));

        fake.stop();
        assert!(coordinator.refresh().await.is_ok());
        assert!(coordinator.refresh().await.is_ok());
        assert_eq!(coordinator.availability(), Availability::Available);

        let err = coordinator.refresh().await.unwrap_err();
        assert!(matches!(err, PollError::Unavailable { errors: 3, .. }));
        assert_eq!(coordinator.availability(), Availability::Unavailable);
    }

    #[tokio::test]
    async fn answer_resets_error_count() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let device = Arc::new(Device::new(fake.info(), fast_config()));
        device.bind_with_key(CipherVersion::V1, SESSION_KEY).unwrap();
        let coordinator =
            PollingCoordinator::new(device, PollingConfig::new().with_error_threshold(3));

        fake.state().silent = true;
        coordinator.refresh().await.unwrap();
        coordinator.refresh().await.unwrap();
        assert_eq!(coordinator.health().error_count, 2);

        fake.state().silent = false;
        coordinator.refresh().await.unwrap();
        assert_eq!(coordinator.health().error_count, 0);

        // Three fresh timeouts are needed again
        fake.state().silent = true;
        coordinator.refresh().await.unwrap();
        coordinator.refresh().await.unwrap();
        assert!(coordinator.refresh().await.is_err());
    }

    #[tokio::test]
    async fn spawned_loop_polls_until_dropped() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let device = Arc::new(Device::new(fake.info(), fast_config()));
        device.bind_with_key(CipherVersion::V1, SESSION_KEY).unwrap();
        let coordinator = Arc::new(PollingCoordinator::new(
            device,
            PollingConfig::new().with_interval(Duration::from_millis(50)),
        ));

        let task = coordinator.spawn();
        tokio::time::sleep(Duration::from_millis(180)).await;
        drop(task);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let reads = fake.received("status").len();
        assert!(reads >= 2, "expected repeated reads, got {reads}");
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(fake.received("status").len(), reads);
    }
}

// ============================================================================
// Discovery
// ============================================================================

mod discovery {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        found: parking_lot::Mutex<Vec<DeviceInfo>>,
        updated: parking_lot::Mutex<Vec<DeviceInfo>>,
    }

    #[async_trait::async_trait]
    impl DiscoveryListener for Recorder {
        async fn device_found(&self, info: &DeviceInfo) {
            self.found.lock().push(info.clone());
        }

        async fn device_update(&self, info: &DeviceInfo) {
            self.updated.lock().push(info.clone());
        }
    }

    fn options(port: u16) -> DiscoveryOptions {
        DiscoveryOptions::new()
            .with_port(port)
            .with_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn scan_reports_new_device_once() {
        let fake = FakeAppliance::start(&[CipherVersion::V1]).await;
        let discovery = Discovery::new(options(fake.addr().port()));
        let recorder = Arc::new(Recorder::default());
        discovery.add_listener(Arc::clone(&recorder) as Arc<dyn DiscoveryListener>);

        let found = discovery.scan(&[fake.addr().ip()]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].mac(), MAC);
        assert_eq!(found[0].name(), "Living room");
        assert_eq!(found[0].addr(), fake.addr());

        discovery.scan(&[fake.addr().ip()]).await.unwrap();
        assert_eq!(recorder.found.lock().len(), 1);
        assert!(recorder.updated.lock().is_empty());
        assert_eq!(discovery.devices().len(), 1);
    }

    #[tokio::test]
    async fn moved_device_is_reported_as_update() {
        let first = FakeAppliance::start(&[CipherVersion::V1]).await;
        let port = first.addr().port();
        let discovery = Discovery::new(options(port));
        let recorder = Arc::new(Recorder::default());
        discovery.add_listener(Arc::clone(&recorder) as Arc<dyn DiscoveryListener>);
        discovery.scan(&[first.addr().ip()]).await.unwrap();
        drop(first);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second =
            FakeAppliance::start_on(format!("127.0.0.2:{port}").parse().unwrap(), &[]).await;
        discovery.scan(&[second.addr().ip()]).await.unwrap();

        let updated = recorder.updated.lock();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].ip().to_string(), "127.0.0.2");
        assert_eq!(recorder.found.lock().len(), 1);
    }

    #[tokio::test]
    async fn manager_binds_and_polls_discovered_device() {
        use amberac_lib::manager::{DeviceManager, ManagerConfig};

        let fake = FakeAppliance::start(&[CipherVersion::V2]).await;
        let config = ManagerConfig::new()
            .with_device(fast_config())
            .with_discovery(options(fake.addr().port()));
        let manager = Arc::new(DeviceManager::new(config));
        let added = Arc::new(AtomicUsize::new(0));
        let added_clone = Arc::clone(&added);
        manager.on_device_added(move |coordinator| {
            assert!(coordinator.device().is_bound());
            added_clone.fetch_add(1, Ordering::SeqCst);
        });

        manager.discovery().scan(&[fake.addr().ip()]).await.unwrap();

        assert_eq!(added.load(Ordering::SeqCst), 1);
        let coordinator = manager.coordinator(MAC).unwrap();
        assert_eq!(coordinator.availability(), Availability::Available);
        assert!(coordinator.device().state().power());
    }
}
