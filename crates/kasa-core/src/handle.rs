// ── Per-device handle ──
//
// One handle owns one transport and one record. The transport mutex
// serializes every exchange with the device and every mutation of the
// record, so replies can never interleave on the socket. The record is
// published through a `watch` channel: reading it never waits on I/O.

use std::net::SocketAddr;

use chrono::Utc;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use kasa_proto::{LightStateUpdate, RelayState, Request, Transport, TransportConfig};

use crate::error::CoreError;
use crate::model::{Brightness, ColorTemp, DeviceRecord, Hue, Saturation};

/// Exclusive owner of one device connection and its cached state.
#[derive(Debug)]
pub struct DeviceHandle {
    transport: Mutex<Transport>,
    record: watch::Sender<DeviceRecord>,
}

impl DeviceHandle {
    /// A handle for an address that has not been probed yet.
    pub fn new(addr: SocketAddr, config: TransportConfig) -> Self {
        Self::from_record(DeviceRecord::new(addr), config)
    }

    /// A handle seeded with a previously known record (e.g. from a store).
    /// The device is treated as offline until the next successful exchange.
    pub fn from_record(mut record: DeviceRecord, config: TransportConfig) -> Self {
        record.is_online = false;
        let transport = Transport::new(record.addr(), config);
        let (record, _) = watch::channel(record);
        Self {
            transport: Mutex::new(transport),
            record,
        }
    }

    // ── Cached reads ─────────────────────────────────────────────────

    /// Snapshot of the cached record. Never performs I/O.
    pub fn record(&self) -> DeviceRecord {
        self.record.borrow().clone()
    }

    pub fn device_id(&self) -> String {
        self.record.borrow().device_id.clone()
    }

    pub fn addr(&self) -> SocketAddr {
        self.record.borrow().addr()
    }

    pub fn is_online(&self) -> bool {
        self.record.borrow().is_online
    }

    /// Observe every change to the record.
    pub fn subscribe(&self) -> watch::Receiver<DeviceRecord> {
        self.record.subscribe()
    }

    // ── Handshake ────────────────────────────────────────────────────

    /// Connect if needed, fetch sysinfo and refresh identity and state.
    ///
    /// On failure the device is marked offline, the socket is dropped and
    /// the last known identity is kept.
    pub async fn discover(&self) -> Result<DeviceRecord, CoreError> {
        let mut transport = self.transport.lock().await;
        self.probe(&mut transport).await
    }

    /// Take over the connection and state of `fresh`, a handle that just
    /// completed a handshake with the same device at a possibly new address.
    pub async fn relocate(&self, fresh: DeviceHandle) -> DeviceRecord {
        let DeviceHandle { transport, record } = fresh;
        let replacement = record.borrow().clone();

        let mut current = self.transport.lock().await;
        let previous = current.addr();
        *current = transport.into_inner();

        if previous != replacement.addr() {
            info!(
                device_id = %replacement.device_id,
                from = %previous,
                to = %replacement.addr(),
                "device moved"
            );
        }
        self.record.send_replace(replacement.clone());
        replacement
    }

    async fn probe(&self, transport: &mut Transport) -> Result<DeviceRecord, CoreError> {
        let response = match transport.request(&Request::GetSysinfo).await {
            Ok(response) => response,
            Err(e) => return Err(self.fail(transport, e.into())),
        };

        let known_id = self.device_id();
        let reported = response.sysinfo().map(|info| info.device_id.as_str());
        if let Some(reported) = reported.filter(|id| !known_id.is_empty() && *id != known_id) {
            let err = CoreError::Protocol {
                reason: format!(
                    "{} now answers as {reported} instead of {known_id}",
                    transport.addr()
                ),
            };
            return Err(self.fail(transport, err));
        }

        let now = Utc::now();
        self.record.send_modify(|r| r.apply_sysinfo(&response, now));
        let record = self.record();
        debug!(
            device_id = %record.device_id,
            addr = %record.addr(),
            kind = %record.kind,
            "handshake ok"
        );
        Ok(record)
    }

    // ── Control ──────────────────────────────────────────────────────

    pub async fn set_power(&self, on: bool) -> Result<DeviceRecord, CoreError> {
        self.command(Request::SetRelayState(RelayState::from(on)), |r| {
            r.is_on = on;
        })
        .await
    }

    /// Flip the relay on the device side. The cached `is_on` is inverted on
    /// acknowledgement.
    pub async fn toggle_power(&self) -> Result<DeviceRecord, CoreError> {
        self.command(Request::SetRelayState(RelayState::Toggle), |r| {
            r.is_on = !r.is_on;
        })
        .await
    }

    /// Set brightness in percent. 0 switches the light off.
    pub async fn set_brightness(&self, brightness: i64) -> Result<DeviceRecord, CoreError> {
        let brightness = Brightness::try_from(brightness)?.get();
        self.ensure_light("set_brightness")?;

        let on = brightness > 0;
        let update = LightStateUpdate {
            brightness: Some(brightness),
            on_off: u8::from(on),
            ..LightStateUpdate::default()
        };
        self.command(Request::SetLightState(update), |r| {
            r.brightness = brightness;
            r.is_on = on;
        })
        .await
    }

    pub async fn set_color_temp(&self, kelvin: i64) -> Result<DeviceRecord, CoreError> {
        let kelvin = ColorTemp::try_from(kelvin)?.get();
        self.ensure_light("set_color_temp")?;

        let update = LightStateUpdate {
            color_temp: Some(kelvin),
            on_off: 1,
            ..LightStateUpdate::default()
        };
        self.command(Request::SetLightState(update), |r| {
            r.color_temp = kelvin;
            r.is_on = true;
        })
        .await
    }

    /// Set hue, saturation and brightness (`value`) in one call.
    pub async fn set_color(
        &self,
        hue: i64,
        saturation: i64,
        value: i64,
    ) -> Result<DeviceRecord, CoreError> {
        let hue = Hue::try_from(hue)?.get();
        let saturation = Saturation::try_from(saturation)?.get();
        let value = Brightness::try_from(value)?.get();
        self.ensure_light("set_color")?;

        let update = LightStateUpdate {
            hue: Some(hue),
            saturation: Some(saturation),
            brightness: Some(value),
            on_off: 1,
            ..LightStateUpdate::default()
        };
        self.command(Request::SetLightState(update), |r| {
            r.hue = hue;
            r.saturation = saturation;
            r.brightness = value;
            r.is_on = true;
        })
        .await
    }

    fn ensure_light(&self, operation: &'static str) -> Result<(), CoreError> {
        let record = self.record.borrow();
        if record.kind.supports_light() {
            Ok(())
        } else {
            Err(CoreError::Unsupported {
                operation,
                device_id: record.device_id.clone(),
                kind: record.kind,
            })
        }
    }

    /// Run one setter under the transport lock and apply `update` to the
    /// record only once the device has acknowledged it.
    async fn command(
        &self,
        request: Request,
        update: impl FnOnce(&mut DeviceRecord),
    ) -> Result<DeviceRecord, CoreError> {
        let mut transport = self.transport.lock().await;

        match transport.request(&request).await {
            Ok(_) => {
                let now = Utc::now();
                self.record.send_modify(|r| {
                    update(r);
                    r.mark_seen(now);
                });
                Ok(self.record())
            }
            Err(e) if e.is_device_rejection() => {
                warn!(
                    device_id = %self.device_id(),
                    method = request.method(),
                    error = %e,
                    "command rejected"
                );
                Err(e.into())
            }
            Err(e) => Err(self.fail(&mut transport, e.into())),
        }
    }

    /// Mark the device offline after a failed exchange. State fields keep
    /// their last known values.
    fn fail(&self, transport: &mut Transport, err: CoreError) -> CoreError {
        transport.disconnect();
        let was_online = self.record.send_if_modified(|r| {
            let changed = r.is_online;
            r.is_online = false;
            changed
        });

        let record = self.record.borrow();
        let (device_id, addr) = (&record.device_id, record.addr());
        if was_online {
            warn!(%device_id, %addr, error = %err, "device went offline");
        } else {
            debug!(%device_id, %addr, error = %err, "device unreachable");
        }
        err
    }
}
