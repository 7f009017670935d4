#![allow(clippy::unwrap_used)]
// Integration tests for `DeviceHandle` against a fake device.

use std::sync::Arc;
use std::time::Instant;

use pretty_assertions::assert_eq;
use serde_json::json;

use kasa_core::{DeviceHandle, DeviceKind, ErrorKind};
use kasa_core::testing::{FakeDevice, closed_port, fast_config};

async fn online_handle(device: &FakeDevice) -> DeviceHandle {
    let handle = DeviceHandle::new(device.addr, fast_config().transport);
    handle.discover().await.unwrap();
    handle
}

// ── Handshake ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_discover_bulb_fills_record() {
    let device = FakeDevice::bulb("BULB01").await;
    let handle = DeviceHandle::new(device.addr, fast_config().transport);

    let record = handle.discover().await.unwrap();

    assert_eq!(record.device_id, "BULB01");
    assert_eq!(record.name, "BULB01 alias");
    assert_eq!(record.model, "KL130(US)");
    assert_eq!(record.kind, DeviceKind::Bulb);
    assert_eq!(record.brightness, 50);
    assert!(record.is_online);
    assert!(record.last_seen.is_some());
    assert_eq!(handle.record(), record);
}

#[tokio::test]
async fn test_discover_plug_reports_zero_brightness() {
    let device = FakeDevice::plug("PLUG01").await;
    device.set_on(true);

    let record = online_handle(&device).await.record();

    assert_eq!(record.kind, DeviceKind::Plug);
    assert_eq!(record.brightness, 0);
    assert!(record.is_on);
}

#[tokio::test]
async fn test_discover_closed_port_is_bounded_and_offline() {
    let addr = closed_port().await;
    let config = fast_config().transport;
    let handle = DeviceHandle::new(addr, config.clone());

    let started = Instant::now();
    let err = handle.discover().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(started.elapsed() < config.connect_timeout * 2);
    assert!(!handle.is_online());
    assert!(handle.device_id().is_empty());
}

#[tokio::test]
async fn test_failed_probe_keeps_identity() {
    let device = FakeDevice::bulb("BULB02").await;
    let handle = online_handle(&device).await;

    device.set_failing(true);
    let err = handle.discover().await.unwrap_err();

    assert!(err.is_unreachable());
    let record = handle.record();
    assert!(!record.is_online);
    assert_eq!(record.device_id, "BULB02");
    assert_eq!(record.brightness, 50);
}

#[tokio::test]
async fn test_address_answering_as_another_device_is_rejected() {
    let first = FakeDevice::bulb("FIRST").await;
    let second = FakeDevice::bulb("SECOND").await;
    let handle = online_handle(&first).await;

    let mut moved = handle.record();
    moved.set_addr(second.addr);
    let handle = DeviceHandle::from_record(moved, fast_config().transport);

    let err = handle.discover().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
    assert_eq!(handle.device_id(), "FIRST");
}

// ── Validation ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_brightness_out_of_range_sends_nothing() {
    let device = FakeDevice::bulb("BULB03").await;
    let handle = online_handle(&device).await;
    let frames = device.frames();

    for bad in [-1, 101] {
        let err = handle.set_brightness(bad).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
    assert_eq!(device.frames(), frames);

    assert_eq!(handle.set_brightness(0).await.unwrap().brightness, 0);
    assert_eq!(handle.set_brightness(100).await.unwrap().brightness, 100);
    assert_eq!(device.frames(), frames + 2);
}

#[tokio::test]
async fn test_color_validation_and_update() {
    let device = FakeDevice::bulb("BULB04").await;
    let handle = online_handle(&device).await;
    let frames = device.frames();

    let err = handle.set_color(400, 50, 75).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(device.frames(), frames);

    let record = handle.set_color(180, 50, 75).await.unwrap();
    assert_eq!((record.hue, record.saturation, record.brightness), (180, 50, 75));
    assert!(record.is_on);
    assert_eq!(
        device.last_request().unwrap(),
        json!({"smartlife.iot.smartbulb.lightingservice": {"set_light_state": {
            "brightness": 75, "hue": 180, "saturation": 50, "on_off": 1
        }}})
    );
}

#[tokio::test]
async fn test_color_temp_bounds() {
    let device = FakeDevice::bulb("BULB05").await;
    let handle = online_handle(&device).await;

    assert_eq!(
        handle.set_color_temp(2000).await.unwrap_err().kind(),
        ErrorKind::Validation
    );
    let record = handle.set_color_temp(2700).await.unwrap();
    assert_eq!(record.color_temp, 2700);
    assert!(record.is_on);
}

#[tokio::test]
async fn test_brightness_zero_switches_off() {
    let device = FakeDevice::bulb("BULB06").await;
    let handle = online_handle(&device).await;
    handle.set_power(true).await.unwrap();

    let record = handle.set_brightness(0).await.unwrap();
    assert!(!record.is_on);
    assert!(!device.is_on());
}

#[tokio::test]
async fn test_light_commands_unsupported_on_plug() {
    let device = FakeDevice::plug("PLUG02").await;
    let handle = online_handle(&device).await;
    let frames = device.frames();

    let err = handle.set_brightness(40).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    let err = handle.set_color(10, 10, 10).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
    assert_eq!(device.frames(), frames);
}

// ── Power ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_toggle_flips_both_ways() {
    let device = FakeDevice::plug("PLUG03").await;
    let handle = online_handle(&device).await;
    assert!(!handle.record().is_on);

    assert!(handle.toggle_power().await.unwrap().is_on);
    assert!(device.is_on());
    assert!(!handle.toggle_power().await.unwrap().is_on);
    assert!(!device.is_on());
}

#[tokio::test]
async fn test_set_power_sends_relay_state() {
    let device = FakeDevice::plug("PLUG04").await;
    let handle = online_handle(&device).await;

    let record = handle.set_power(true).await.unwrap();

    assert!(record.is_on);
    assert_eq!(
        device.last_request().unwrap(),
        json!({"system": {"set_relay_state": {"state": 1}}})
    );
}

#[tokio::test]
async fn test_rejected_command_keeps_state_and_online() {
    let device = FakeDevice::plug("PLUG05").await;
    let handle = online_handle(&device).await;
    device.reject_with(Some(-3));

    let err = handle.set_power(true).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Rejected);
    let record = handle.record();
    assert!(!record.is_on);
    assert!(record.is_online);
}

#[tokio::test]
async fn test_failed_command_marks_offline_and_keeps_state() {
    let device = FakeDevice::bulb("BULB07").await;
    let handle = online_handle(&device).await;
    device.set_failing(true);

    let err = handle.set_brightness(80).await.unwrap_err();

    assert!(err.is_unreachable());
    let record = handle.record();
    assert!(!record.is_online);
    assert_eq!(record.brightness, 50);

    device.set_failing(false);
    assert!(handle.set_brightness(80).await.unwrap().is_online);
}

#[tokio::test]
async fn test_subscribers_see_updates() {
    let device = FakeDevice::plug("PLUG06").await;
    let handle = online_handle(&device).await;
    let mut rx = handle.subscribe();

    handle.set_power(true).await.unwrap();

    rx.changed().await.unwrap();
    assert!(rx.borrow_and_update().is_on);
}

// ── Concurrency ─────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_control_and_probe_keep_framing_intact() {
    let device = FakeDevice::bulb("BULB08").await;
    device.set_delay(std::time::Duration::from_millis(2));
    let handle = Arc::new(online_handle(&device).await);

    let mut tasks = Vec::new();
    for i in 0..20 {
        let h = Arc::clone(&handle);
        tasks.push(tokio::spawn(async move {
            if i % 2 == 0 {
                h.set_power(i % 4 == 0).await.map(|_| ())
            } else {
                h.discover().await.map(|_| ())
            }
        }));
    }

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }
    assert_eq!(device.decode_errors(), 0);
    assert_eq!(device.accepted(), 1);
    assert!(handle.is_online());
}
