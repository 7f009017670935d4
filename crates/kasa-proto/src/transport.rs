// Framed request/response exchange with one device over TCP.
//
// The socket lives in an `Option<TcpStream>` owned by the transport. An
// exchange takes it out and puts it back only after a complete reply, so an
// error or a dropped future never leaves a half-used connection behind and
// the next call reconnects from scratch.

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::codec;
use crate::error::Error;
use crate::frame::{self, DEFAULT_MAX_FRAME_LEN};
use crate::message::{Request, Response};

/// Timeouts and limits applied to every exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Upper bound on establishing the TCP connection.
    pub connect_timeout: Duration,
    /// Upper bound on each frame write and each frame read.
    pub io_timeout: Duration,
    /// Largest incoming frame accepted.
    pub max_frame_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(2),
            io_timeout: Duration::from_secs(5),
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

/// One TCP connection to one device.
///
/// The protocol is strict request/response with no correlation id, so a
/// transport must never be driven by two callers at once. Every method that
/// touches the socket takes `&mut self`; callers that share a transport put
/// it behind a lock.
#[derive(Debug)]
pub struct Transport {
    addr: SocketAddr,
    config: TransportConfig,
    stream: Option<TcpStream>,
}

impl Transport {
    pub fn new(addr: SocketAddr, config: TransportConfig) -> Self {
        Self {
            addr,
            config,
            stream: None,
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Point the transport at a new endpoint. Drops any open connection
    /// when the address actually changes.
    pub fn set_addr(&mut self, addr: SocketAddr) {
        if addr != self.addr {
            self.disconnect();
            self.addr = addr;
        }
    }

    /// Open the connection. A no-op when already connected.
    pub async fn connect(&mut self) -> Result<(), Error> {
        if self.stream.is_none() {
            self.stream = Some(self.open().await?);
        }
        Ok(())
    }

    /// Close the connection. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            trace!(addr = %self.addr, "connection closed");
        }
    }

    /// Send one framed payload and read one framed reply.
    ///
    /// Connects first if needed. The socket is held outside the transport
    /// until the reply is complete: any failure, or dropping the returned
    /// future midway, closes the connection. Nothing is retried here.
    pub async fn send_receive(&mut self, payload: &[u8]) -> Result<Vec<u8>, Error> {
        let io_timeout = self.config.io_timeout;
        let max_frame_len = self.config.max_frame_len;
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => self.open().await?,
        };

        let result = async {
            bounded(io_timeout, "writing request", frame::write_frame(&mut stream, payload))
                .await?;
            bounded(
                io_timeout,
                "reading reply",
                frame::read_frame(&mut stream, max_frame_len),
            )
            .await
        }
        .await;

        match result {
            Ok(reply) => {
                self.stream = Some(stream);
                Ok(reply)
            }
            Err(e) => {
                trace!(addr = %self.addr, error = %e, "exchange failed, connection closed");
                Err(e)
            }
        }
    }

    /// Encode, exchange, decode and parse one typed request.
    pub async fn request(&mut self, request: &Request) -> Result<Response, Error> {
        let payload = codec::encode(&request.to_value());
        let reply = self.send_receive(&payload).await?;

        let parsed = codec::decode(&reply).and_then(|tree| Response::parse(request, &tree));
        match parsed {
            Ok(response) => Ok(response),
            Err(e) => {
                // A reply we cannot read leaves the stream position in doubt.
                if e.is_protocol() {
                    self.disconnect();
                }
                Err(e)
            }
        }
    }

    async fn open(&self) -> Result<TcpStream, Error> {
        let addr = self.addr;
        let timeout = self.config.connect_timeout;

        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectTimeout {
                addr,
                timeout_ms: millis(timeout),
            })?
            .map_err(|source| Error::Connect { addr, source })?;

        // Frames are tiny and latency matters more than throughput.
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%addr, error = %e, "failed to set TCP_NODELAY");
        }
        debug!(%addr, "connected");
        Ok(stream)
    }
}

async fn bounded<T>(
    limit: Duration,
    operation: &'static str,
    fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::Timeout {
            operation,
            timeout_ms: millis(limit),
        })?
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
