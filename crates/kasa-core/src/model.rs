// ── Device domain types ──

use std::net::{IpAddr, SocketAddr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use kasa_proto::message::DEFAULT_COLOR_TEMP;
use kasa_proto::{DEFAULT_PORT, Response};

use crate::error::CoreError;

/// Device class, learned from the shape of the handshake reply.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceKind {
    /// No successful handshake yet.
    #[default]
    Unknown,
    /// Relay only: power on/off.
    Plug,
    /// Dimmable, tunable and color-capable light.
    Bulb,
}

impl DeviceKind {
    pub fn supports_light(self) -> bool {
        !matches!(self, Self::Plug)
    }
}

/// Canonical snapshot of one device.
///
/// `device_id` comes from the device itself and is empty until the first
/// successful handshake. Light fields are only meaningful for bulbs; plugs
/// always report a brightness of 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub device_id: String,
    pub name: String,
    pub model: String,
    pub mac: String,
    pub ip: IpAddr,
    pub port: u16,
    pub is_online: bool,
    pub is_on: bool,
    pub brightness: u8,
    pub color_temp: u16,
    pub hue: u16,
    pub saturation: u8,
    #[serde(default)]
    pub kind: DeviceKind,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl DeviceRecord {
    /// A record for an address nothing is known about yet.
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            device_id: String::new(),
            name: String::new(),
            model: String::new(),
            mac: String::new(),
            ip: addr.ip(),
            port: addr.port(),
            is_online: false,
            is_on: false,
            brightness: 0,
            color_temp: DEFAULT_COLOR_TEMP,
            hue: 0,
            saturation: 0,
            kind: DeviceKind::Unknown,
            last_seen: None,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    pub fn set_addr(&mut self, addr: SocketAddr) {
        self.ip = addr.ip();
        self.port = addr.port();
    }

    pub fn has_identity(&self) -> bool {
        !self.device_id.is_empty()
    }

    /// Overwrite identity and state from a sysinfo reply and mark the
    /// device online. Other replies are ignored.
    pub(crate) fn apply_sysinfo(&mut self, response: &Response, now: DateTime<Utc>) {
        let Some(info) = response.sysinfo() else {
            return;
        };

        self.device_id.clone_from(&info.device_id);
        self.name.clone_from(&info.alias);
        self.model.clone_from(&info.model);
        self.mac.clone_from(&info.mac);

        match response {
            Response::BulbInfo { light, .. } => {
                self.kind = DeviceKind::Bulb;
                self.is_on = light.on_off == 1;
                self.brightness = light.brightness;
                self.color_temp = light.color_temp;
                self.hue = light.hue;
                self.saturation = light.saturation;
            }
            Response::PlugInfo { relay_on, .. } => {
                self.kind = DeviceKind::Plug;
                self.is_on = *relay_on;
                self.brightness = 0;
            }
            Response::Ack => {}
        }

        self.mark_seen(now);
    }

    pub(crate) fn mark_seen(&mut self, now: DateTime<Utc>) {
        self.is_online = true;
        self.last_seen = Some(now);
    }
}

/// Totals across the registry or the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCounts {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
}

impl DeviceCounts {
    pub fn tally<'a>(records: impl IntoIterator<Item = &'a DeviceRecord>) -> Self {
        records.into_iter().fold(Self::default(), |mut acc, r| {
            acc.total += 1;
            if r.is_online {
                acc.online += 1;
            } else {
                acc.offline += 1;
            }
            acc
        })
    }
}

// ── Validated control values ─────────────────────────────────────────

macro_rules! ranged {
    ($(#[$meta:meta])* $name:ident($inner:ty), $field:literal, $min:literal..=$max:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
        pub struct $name($inner);

        impl $name {
            pub const MIN: $inner = $min;
            pub const MAX: $inner = $max;

            pub fn get(self) -> $inner {
                self.0
            }
        }

        impl TryFrom<i64> for $name {
            type Error = CoreError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                <$inner>::try_from(value)
                    .ok()
                    .filter(|v| (Self::MIN..=Self::MAX).contains(v))
                    .map(Self)
                    .ok_or(CoreError::OutOfRange {
                        field: $field,
                        value,
                        min: i64::from(Self::MIN),
                        max: i64::from(Self::MAX),
                    })
            }
        }
    };
}

ranged!(
    /// Bulb brightness in percent. 0 switches the light off.
    Brightness(u8), "brightness", 0..=100
);
ranged!(
    /// White color temperature in kelvin.
    ColorTemp(u16), "color temperature", 2700..=6500
);
ranged!(
    /// Hue in degrees.
    Hue(u16), "hue", 0..=360
);
ranged!(Saturation(u8), "saturation", 0..=100);

// ── Addresses ────────────────────────────────────────────────────────

/// Parse `"ip"` or `"ip:port"`. A bare IP gets `default_port`.
pub fn parse_address(input: &str, default_port: u16) -> Result<SocketAddr, CoreError> {
    let trimmed = input.trim();
    if let Ok(addr) = trimmed.parse::<SocketAddr>() {
        return Ok(addr);
    }
    trimmed
        .parse::<IpAddr>()
        .map(|ip| SocketAddr::new(ip, default_port))
        .map_err(|e| CoreError::InvalidAddress {
            input: input.to_owned(),
            reason: e.to_string(),
        })
}

/// [`parse_address`] with the protocol's standard port.
pub fn parse_device_address(input: &str) -> Result<SocketAddr, CoreError> {
    parse_address(input, DEFAULT_PORT)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use kasa_proto::{LightState, SysInfo};
    use pretty_assertions::assert_eq;

    fn info(id: &str) -> SysInfo {
        SysInfo {
            device_id: id.into(),
            alias: "Desk".into(),
            model: "KL130".into(),
            mac: "50:C7".into(),
        }
    }

    #[test]
    fn new_record_has_observed_defaults() {
        let record = DeviceRecord::new("10.0.0.5:9999".parse().unwrap());
        assert!(!record.has_identity());
        assert!(!record.is_online);
        assert!(!record.is_on);
        assert_eq!(record.brightness, 0);
        assert_eq!(record.color_temp, 4000);
        assert_eq!(record.kind, DeviceKind::Unknown);
    }

    #[test]
    fn bulb_sysinfo_fills_light_state() {
        let mut record = DeviceRecord::new("10.0.0.5:9999".parse().unwrap());
        let light = LightState {
            on_off: 1,
            brightness: 70,
            color_temp: 2700,
            hue: 20,
            saturation: 90,
        };
        let now = Utc::now();
        record.apply_sysinfo(&Response::BulbInfo { info: info("B1"), light }, now);

        assert_eq!(record.device_id, "B1");
        assert_eq!(record.name, "Desk");
        assert_eq!(record.kind, DeviceKind::Bulb);
        assert!(record.is_on && record.is_online);
        assert_eq!((record.brightness, record.color_temp), (70, 2700));
        assert_eq!((record.hue, record.saturation), (20, 90));
        assert_eq!(record.last_seen, Some(now));
    }

    #[test]
    fn plug_sysinfo_zeroes_brightness() {
        let mut record = DeviceRecord::new("10.0.0.5:9999".parse().unwrap());
        record.brightness = 55;
        record.apply_sysinfo(
            &Response::PlugInfo {
                info: info("P1"),
                relay_on: true,
            },
            Utc::now(),
        );
        assert_eq!(record.kind, DeviceKind::Plug);
        assert_eq!(record.brightness, 0);
        assert!(record.is_on);
    }

    #[test]
    fn ranged_values_enforce_bounds() {
        assert_eq!(Brightness::try_from(0).unwrap().get(), 0);
        assert_eq!(Brightness::try_from(100).unwrap().get(), 100);
        assert!(Brightness::try_from(-1).is_err());
        assert!(Brightness::try_from(101).is_err());
        assert!(Hue::try_from(360).is_ok());
        assert!(Hue::try_from(400).is_err());
        assert!(ColorTemp::try_from(2699).is_err());
        assert!(ColorTemp::try_from(6500).is_ok());
        assert!(Saturation::try_from(i64::MAX).is_err());
    }

    #[test]
    fn out_of_range_reports_bounds() {
        let err = Brightness::try_from(101).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid brightness: 101 (expected 0..=100)"
        );
    }

    #[test]
    fn addresses_accept_optional_port() {
        assert_eq!(
            parse_device_address("192.168.1.20").unwrap(),
            "192.168.1.20:9999".parse().unwrap()
        );
        assert_eq!(
            parse_device_address(" 10.0.0.7:10000 ").unwrap(),
            "10.0.0.7:10000".parse().unwrap()
        );
        assert!(parse_device_address("kitchen").is_err());
    }

    #[test]
    fn counts_tally_online_and_offline() {
        let mut a = DeviceRecord::new("10.0.0.1:9999".parse().unwrap());
        let b = DeviceRecord::new("10.0.0.2:9999".parse().unwrap());
        a.is_online = true;
        assert_eq!(
            DeviceCounts::tally([&a, &b]),
            DeviceCounts {
                total: 2,
                online: 1,
                offline: 1
            }
        );
    }

    #[test]
    fn record_serializes_camel_case() {
        let record = DeviceRecord::new("10.0.0.1:9999".parse().unwrap());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["deviceId"], "");
        assert_eq!(json["colorTemp"], 4000);
        assert_eq!(json["kind"], "unknown");
        assert_eq!(json["isOnline"], false);
    }
}
