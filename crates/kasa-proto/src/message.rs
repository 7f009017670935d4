// ── Typed requests and responses ──
//
// The wire format is a nested `{module: {method: params}}` object. Requests
// are built from a closed enum; replies are parsed once, here, into one
// variant per observed shape instead of being probed field by field later.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Error;

pub const SYSTEM_MODULE: &str = "system";
pub const LIGHTING_MODULE: &str = "smartlife.iot.smartbulb.lightingservice";

/// Color temperature reported when a bulb omits the field.
pub const DEFAULT_COLOR_TEMP: u16 = 4000;

// ── Requests ─────────────────────────────────────────────────────────

/// Relay (power) target for `set_relay_state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Off,
    On,
    Toggle,
}

impl RelayState {
    pub fn wire_value(self) -> i8 {
        match self {
            Self::Off => 0,
            Self::On => 1,
            Self::Toggle => -1,
        }
    }
}

impl From<bool> for RelayState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// Parameters of a `set_light_state` call. Unset fields are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LightStateUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temp: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<u8>,
    pub on_off: u8,
}

/// Every command this client knows how to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// The handshake: identity plus current state.
    GetSysinfo,
    SetRelayState(RelayState),
    SetLightState(LightStateUpdate),
}

impl Request {
    pub fn module(&self) -> &'static str {
        match self {
            Self::GetSysinfo | Self::SetRelayState(_) => SYSTEM_MODULE,
            Self::SetLightState(_) => LIGHTING_MODULE,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            Self::GetSysinfo => "get_sysinfo",
            Self::SetRelayState(_) => "set_relay_state",
            Self::SetLightState(_) => "set_light_state",
        }
    }

    /// Build the command tree handed to the codec.
    pub fn to_value(&self) -> Value {
        let params = match self {
            Self::GetSysinfo => Value::Null,
            Self::SetRelayState(state) => json!({ "state": state.wire_value() }),
            Self::SetLightState(update) => json!(update),
        };
        json!({ self.module(): { self.method(): params } })
    }
}

// ── Responses ────────────────────────────────────────────────────────

/// Identity block common to every device class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysInfo {
    pub device_id: String,
    pub alias: String,
    pub model: String,
    pub mac: String,
}

/// Light state as reported by a bulb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LightState {
    #[serde(default)]
    pub on_off: u8,
    #[serde(default)]
    pub brightness: u8,
    #[serde(default = "default_color_temp")]
    pub color_temp: u16,
    #[serde(default)]
    pub hue: u16,
    #[serde(default)]
    pub saturation: u8,
}

fn default_color_temp() -> u16 {
    DEFAULT_COLOR_TEMP
}

/// A parsed device reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `get_sysinfo` from a bulb (carries `light_state`).
    BulbInfo { info: SysInfo, light: LightState },
    /// `get_sysinfo` from a plug (carries `relay_state`).
    PlugInfo { info: SysInfo, relay_on: bool },
    /// Acknowledgement of a setter with `err_code == 0`.
    Ack,
}

#[derive(Deserialize)]
struct RawSysInfo {
    #[serde(rename = "deviceId", default)]
    device_id: String,
    #[serde(default)]
    alias: String,
    #[serde(default)]
    model: String,
    #[serde(default)]
    mac: String,
    light_state: Option<LightState>,
    relay_state: Option<i64>,
}

impl Response {
    /// Interpret a decoded reply to `request`.
    ///
    /// The reply must echo the request's module and method. A non-zero
    /// `err_code` becomes [`Error::Device`]; a sysinfo reply must carry a
    /// device id and either a light or a relay state.
    pub fn parse(request: &Request, reply: &Value) -> Result<Self, Error> {
        let (module, method) = (request.module(), request.method());
        let body = reply
            .get(module)
            .and_then(|m| m.get(method))
            .filter(|b| b.is_object())
            .ok_or_else(|| {
                Error::protocol(format!("reply has no {module}.{method} object"), reply.to_string())
            })?;

        let err_code = body.get("err_code").and_then(Value::as_i64).unwrap_or(0);
        if err_code != 0 {
            let message = body
                .get("err_msg")
                .and_then(Value::as_str)
                .unwrap_or("unspecified")
                .to_owned();
            return Err(Error::Device { err_code, message });
        }

        match request {
            Request::GetSysinfo => Self::parse_sysinfo(body),
            Request::SetRelayState(_) | Request::SetLightState(_) => Ok(Self::Ack),
        }
    }

    fn parse_sysinfo(body: &Value) -> Result<Self, Error> {
        let raw = RawSysInfo::deserialize(body)
            .map_err(|e| Error::protocol(format!("invalid sysinfo: {e}"), body.to_string()))?;

        if raw.device_id.is_empty() {
            return Err(Error::protocol("sysinfo carries no deviceId", body.to_string()));
        }

        let info = SysInfo {
            device_id: raw.device_id,
            alias: raw.alias,
            model: raw.model,
            mac: raw.mac,
        };

        match (raw.light_state, raw.relay_state) {
            (Some(light), _) => Ok(Self::BulbInfo { info, light }),
            (None, Some(relay)) => Ok(Self::PlugInfo {
                info,
                relay_on: relay == 1,
            }),
            (None, None) => Err(Error::protocol(
                "sysinfo carries neither light_state nor relay_state",
                body.to_string(),
            )),
        }
    }

    /// Identity block, if this is a sysinfo reply.
    pub fn sysinfo(&self) -> Option<&SysInfo> {
        match self {
            Self::BulbInfo { info, .. } | Self::PlugInfo { info, .. } => Some(info),
            Self::Ack => None,
        }
    }
}
