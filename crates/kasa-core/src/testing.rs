//! Fake Kasa device for tests: a local TCP listener speaking the real
//! framing and codec, with switches for failure modes.
//!
//! Compiled for this crate's tests and, through the `testing` feature, for
//! downstream crates that want a device to talk to.
#![allow(clippy::unwrap_used)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use kasa_proto::{TransportConfig, codec, frame};

use crate::config::RegistryConfig;

const LIGHTING: &str = "smartlife.iot.smartbulb.lightingservice";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Bulb,
    Plug,
}

#[derive(Debug)]
struct State {
    class: Class,
    id: String,
    alias: String,
    on: bool,
    brightness: i64,
    color_temp: i64,
    hue: i64,
    saturation: i64,
    /// Close every connection right after reading a request.
    failing: bool,
    /// Answer setters with this `err_code`.
    reject: Option<i64>,
    /// Delay before each reply.
    delay: Duration,
    frames: usize,
    accepted: usize,
    decode_errors: usize,
    last_request: Option<Value>,
}

#[derive(Debug)]
pub struct FakeDevice {
    pub addr: SocketAddr,
    state: Arc<Mutex<State>>,
    stopped: Arc<AtomicBool>,
    accept: JoinHandle<()>,
}

impl FakeDevice {
    pub async fn bulb(id: &str) -> Self {
        Self::spawn(Class::Bulb, id).await
    }

    pub async fn plug(id: &str) -> Self {
        Self::spawn(Class::Plug, id).await
    }

    async fn spawn(class: Class, id: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(State {
            class,
            id: id.to_owned(),
            alias: format!("{id} alias"),
            on: false,
            brightness: if class == Class::Bulb { 50 } else { 0 },
            color_temp: 4000,
            hue: 0,
            saturation: 0,
            failing: false,
            reject: None,
            delay: Duration::ZERO,
            frames: 0,
            accepted: 0,
            decode_errors: 0,
            last_request: None,
        }));
        let stopped = Arc::new(AtomicBool::new(false));

        let (shared, flag) = (Arc::clone(&state), Arc::clone(&stopped));
        let accept = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                shared.lock().unwrap().accepted += 1;
                tokio::spawn(serve(socket, Arc::clone(&shared), Arc::clone(&flag)));
            }
        });

        Self {
            addr,
            state,
            stopped,
            accept,
        }
    }

    /// Stop answering for good: the listener goes away and open
    /// connections close on their next request.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.accept.abort();
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    pub fn reject_with(&self, err_code: Option<i64>) {
        self.state.lock().unwrap().reject = err_code;
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = delay;
    }

    pub fn set_on(&self, on: bool) {
        self.state.lock().unwrap().on = on;
    }

    /// Request frames read so far, across all connections.
    pub fn frames(&self) -> usize {
        self.state.lock().unwrap().frames
    }

    pub fn accepted(&self) -> usize {
        self.state.lock().unwrap().accepted
    }

    pub fn decode_errors(&self) -> usize {
        self.state.lock().unwrap().decode_errors
    }

    pub fn is_on(&self) -> bool {
        self.state.lock().unwrap().on
    }

    pub fn last_request(&self) -> Option<Value> {
        self.state.lock().unwrap().last_request.clone()
    }
}

impl Drop for FakeDevice {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

async fn serve(mut socket: TcpStream, state: Arc<Mutex<State>>, stopped: Arc<AtomicBool>) {
    while let Ok(payload) = frame::read_frame(&mut socket, 64 * 1024).await {
        if stopped.load(Ordering::SeqCst) {
            return;
        }
        let (reply, delay) = {
            let mut state = state.lock().unwrap();
            state.frames += 1;
            let Ok(request) = codec::decode(&payload) else {
                state.decode_errors += 1;
                return;
            };
            if state.failing {
                return;
            }
            let reply = respond(&mut state, &request);
            state.last_request = Some(request);
            (reply, state.delay)
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if frame::write_frame(&mut socket, &codec::encode(&reply))
            .await
            .is_err()
        {
            return;
        }
    }
}

fn respond(state: &mut State, request: &Value) -> Value {
    if request["system"].get("get_sysinfo").is_some() {
        let mut info = json!({
            "deviceId": state.id,
            "alias": state.alias,
            "model": if state.class == Class::Bulb { "KL130(US)" } else { "HS100(US)" },
            "mac": "50:C7:BF:00:00:01",
            "err_code": 0,
        });
        match state.class {
            Class::Bulb => {
                info["light_state"] = json!({
                    "on_off": u8::from(state.on),
                    "brightness": state.brightness,
                    "color_temp": state.color_temp,
                    "hue": state.hue,
                    "saturation": state.saturation,
                });
            }
            Class::Plug => info["relay_state"] = json!(u8::from(state.on)),
        }
        return json!({"system": {"get_sysinfo": info}});
    }

    let ack = |module: &str, method: &str, code: i64| {
        json!({ module: { method: { "err_code": code, "err_msg": "rejected by fake" } } })
    };

    if let Some(params) = request["system"].get("set_relay_state") {
        if let Some(code) = state.reject {
            return ack("system", "set_relay_state", code);
        }
        match params["state"].as_i64() {
            Some(-1) => state.on = !state.on,
            Some(v) => state.on = v == 1,
            None => {}
        }
        return ack("system", "set_relay_state", 0);
    }

    if let Some(params) = request[LIGHTING].get("set_light_state") {
        if let Some(code) = state.reject {
            return ack(LIGHTING, "set_light_state", code);
        }
        if let Some(v) = params["brightness"].as_i64() {
            state.brightness = v;
        }
        if let Some(v) = params["color_temp"].as_i64() {
            state.color_temp = v;
        }
        if let Some(v) = params["hue"].as_i64() {
            state.hue = v;
        }
        if let Some(v) = params["saturation"].as_i64() {
            state.saturation = v;
        }
        if let Some(v) = params["on_off"].as_i64() {
            state.on = v == 1;
        }
        return ack(LIGHTING, "set_light_state", 0);
    }

    json!({"err_code": -1})
}

/// Short timeouts so failure tests finish quickly.
pub fn fast_config() -> RegistryConfig {
    RegistryConfig {
        transport: TransportConfig {
            connect_timeout: Duration::from_millis(300),
            io_timeout: Duration::from_millis(300),
            ..TransportConfig::default()
        },
        monitor_interval: Duration::from_millis(50),
        ..RegistryConfig::default()
    }
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
