#![allow(clippy::unwrap_used)]
// Integration tests for the reachability monitor.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use kasa_core::{DeviceRegistry, Monitor};
use kasa_core::testing::{FakeDevice, fast_config};

#[tokio::test]
async fn test_monitor_brings_device_back_online() {
    let device = FakeDevice::plug("P").await;
    let registry = Arc::new(DeviceRegistry::new(fast_config()));
    registry.discover(&[device.addr]).await;

    device.set_failing(true);
    assert!(registry.toggle_power("P").await.is_err());
    assert_eq!(registry.list_offline().await.len(), 1);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let cancel = CancellationToken::new();
    let task = Monitor::new(Arc::clone(&registry), cancel.clone())
        .spawn(move |outcome| sink.lock().unwrap().push(outcome.is_success()));

    device.set_failing(false);
    let handle = registry.get_device("P").await.unwrap();
    let mut rx = handle.subscribe();
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(|r| r.is_online))
        .await
        .unwrap()
        .unwrap();

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();

    assert!(seen.lock().unwrap().contains(&true));
    assert_eq!(registry.list_online().await.len(), 1);
}

#[tokio::test]
async fn test_monitor_ignores_online_devices() {
    let device = FakeDevice::bulb("B").await;
    let registry = Arc::new(DeviceRegistry::new(fast_config()));
    registry.discover(&[device.addr]).await;
    let frames = device.frames();

    let cancel = CancellationToken::new();
    let task = Monitor::new(Arc::clone(&registry), cancel.clone()).spawn(|_| {});
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    task.await.unwrap();

    assert_eq!(device.frames(), frames);
}

#[tokio::test]
async fn test_cancel_interrupts_long_interval() {
    let registry = Arc::new(DeviceRegistry::new(fast_config()));
    let cancel = CancellationToken::new();
    let task = Monitor::new(registry, cancel.clone())
        .with_interval(Duration::from_secs(3600))
        .spawn(|_| {});

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_cancel_interrupts_in_flight_probe() {
    let device = FakeDevice::plug("SLOW").await;
    let registry = Arc::new(DeviceRegistry::new(fast_config()));
    registry.discover(&[device.addr]).await;

    device.set_failing(true);
    assert!(registry.set_power("SLOW", true).await.is_err());
    device.set_failing(false);
    device.set_delay(Duration::from_millis(250));

    let cancel = CancellationToken::new();
    let task = Monitor::new(Arc::clone(&registry), cancel.clone()).spawn(|_| {});
    tokio::time::sleep(Duration::from_millis(80)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_millis(150), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_first_sweep_runs_at_start() {
    let device = FakeDevice::plug("EARLY").await;
    let registry = Arc::new(DeviceRegistry::new(fast_config()));
    registry.discover(&[device.addr]).await;

    device.set_failing(true);
    assert!(registry.toggle_power("EARLY").await.is_err());
    device.set_failing(false);

    let cancel = CancellationToken::new();
    let task = Monitor::new(Arc::clone(&registry), cancel.clone())
        .with_interval(Duration::from_secs(3600))
        .spawn(|_| {});

    let mut rx = registry.get_device("EARLY").await.unwrap().subscribe();
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|r| r.is_online))
        .await
        .unwrap()
        .unwrap();

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_handle_stays_usable_after_cancelled_probe() {
    let device = FakeDevice::plug("SLOW2").await;
    let registry = Arc::new(DeviceRegistry::new(fast_config()));
    registry.discover(&[device.addr]).await;

    device.set_failing(true);
    assert!(registry.set_power("SLOW2", true).await.is_err());
    device.set_failing(false);
    device.set_delay(Duration::from_millis(150));

    let cancel = CancellationToken::new();
    let task = Monitor::new(Arc::clone(&registry), cancel.clone()).spawn(|_| {});
    tokio::time::sleep(Duration::from_millis(80)).await;
    cancel.cancel();
    task.await.unwrap();

    // The sysinfo reply to the abandoned probe must not be read as this ack.
    device.set_delay(Duration::ZERO);
    let record = registry.set_power("SLOW2", true).await.unwrap();

    assert!(record.is_on);
    assert!(record.is_online);
    assert!(device.is_on());
    assert_eq!(device.decode_errors(), 0);
}
