// ── Payload codec ──
//
// Command trees travel as compact JSON text, XOR-ed byte by byte with a
// fixed 16-byte repeating key. The transform is stateless and self-inverse.
// It is an obfuscation, not a cipher: there is no nonce, no chaining and no
// integrity check.

use serde_json::Value;

use crate::error::Error;

/// Repeating key applied to every payload byte.
pub const KEY: [u8; 16] = [
    0x09, 0x76, 0x28, 0x34, 0x3f, 0xe9, 0x9e, 0x23, 0x76, 0x5c, 0x15, 0x13, 0xac, 0xcf, 0x8b, 0x02,
];

/// Initialization vector shipped alongside [`KEY`] by the devices' firmware
/// tooling. The observed transform never consumes it; it is kept so the
/// constant is documented in one place. Wiring it in would break
/// compatibility with deployed devices.
pub const IV: [u8; 16] = [
    0x56, 0x2e, 0x17, 0x99, 0x6d, 0x09, 0x3d, 0x20, 0x56, 0x2e, 0x17, 0x99, 0x6d, 0x09, 0x3d, 0x20,
];

/// Apply the keyed XOR transform. Calling it twice yields the input.
pub fn transform(data: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(KEY.iter().cycle())
        .map(|(byte, key)| byte ^ key)
        .collect()
}

/// Serialize a command tree to compact JSON and obfuscate it.
pub fn encode(command: &Value) -> Vec<u8> {
    transform(command.to_string().as_bytes())
}

/// De-obfuscate a payload and parse it back into a command tree.
pub fn decode(payload: &[u8]) -> Result<Value, Error> {
    let plain = transform(payload);
    serde_json::from_slice(&plain).map_err(|e| {
        Error::protocol(
            format!("payload is not valid JSON: {e}"),
            String::from_utf8_lossy(&plain),
        )
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn transform_is_self_inverse_for_edge_lengths() {
        let all_bytes: Vec<u8> = (0..=255).collect();
        let long: Vec<u8> = (0..1000u32).map(|i| u8::try_from(i * 7 % 256).unwrap()).collect();

        for input in [Vec::new(), vec![0x42], long, all_bytes] {
            assert_eq!(transform(&transform(&input)), input);
        }
    }

    #[test]
    fn transform_repeats_key_every_sixteen_bytes() {
        let zeros = [0u8; 40];
        let out = transform(&zeros);
        assert_eq!(&out[..16], &KEY);
        assert_eq!(&out[16..32], &KEY);
        assert_eq!(&out[32..], &KEY[..8]);
    }

    #[test]
    fn encode_uses_compact_json() {
        let cmd = json!({"system": {"get_sysinfo": null}});
        let plain = transform(&encode(&cmd));
        assert_eq!(plain, br#"{"system":{"get_sysinfo":null}}"#);
    }

    #[test]
    fn decode_inverts_encode() {
        let trees = [
            json!({}),
            json!({"system": {"set_relay_state": {"state": -1}}}),
            json!({
                "system": {"get_sysinfo": {
                    "deviceId": "8006".repeat(64),
                    "alias": "Living Room \u{1F4A1}",
                    "light_state": {"on_off": 1, "brightness": 100, "hue": 360}
                }}
            }),
        ];

        for tree in trees {
            assert_eq!(decode(&encode(&tree)).unwrap(), tree);
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = decode(&transform(b"{not json")).unwrap_err();
        match err {
            Error::Protocol { body, .. } => assert_eq!(body, "{not json"),
            other => panic!("expected Protocol error, got {other:?}"),
        }
    }

    #[test]
    fn decode_rejects_empty_payload() {
        assert!(decode(&[]).unwrap_err().is_protocol());
    }
}
