//! Transport abstraction (§4.1): a uniform bidirectional byte channel over
//! whichever physical or network medium a master or output link actually
//! uses (async, `Result` returns, a `name()` for logging), narrowed to one
//! connection per transport — this proxy has no notion of a multi-client
//! server, only point-to-point links to a vehicle or a consumer.

pub mod child;
pub mod serial;
pub mod tcp;
pub mod udp;

use anyhow::Result;
use async_trait::async_trait;

pub use child::ChildTransport;
pub use serial::SerialTransport;
pub use tcp::TcpTransport;
pub use udp::UdpTransport;

/// Uniform bidirectional byte channel. Implementations must never block in
/// `recv` and must mark repeated failures rather than panicking, per §4.1.
#[async_trait]
pub trait Transport: Send {
    /// Non-blocking receive of whatever bytes are currently available.
    /// Returns an empty vector on "nothing to read right now"; an `Err`
    /// signals a transport fault the caller should count against the
    /// owning link's error state.
    async fn recv(&mut self) -> Result<Vec<u8>>;

    /// Best-effort write of a complete frame's bytes.
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Wait until bytes are likely available. Used by the engine's poll
    /// step (§4.4) for transports that expose a real readiness handle.
    /// Transports without one (see [`Transport::bytes_waiting`]) should
    /// implement this as a short sleep so the `select!` arm still yields
    /// control periodically.
    async fn readable(&mut self);

    /// For transports without a pollable readiness handle, lets the engine
    /// fall back to "is there anything buffered right now" (§4.4 step 2).
    /// Default: always claims a handle exists, so step 2 is a no-op for
    /// socket-backed transports.
    fn bytes_waiting(&self) -> usize {
        0
    }

    fn has_readiness_handle(&self) -> bool {
        true
    }

    /// Idempotent teardown releasing OS resources.
    async fn close(&mut self) -> Result<()>;

    fn name(&self) -> &str;
}

/// Parses a `--master` URI per §6 into a constructor the caller can await.
#[derive(Debug, Clone)]
pub enum MasterUri {
    Tcp { host: String, port: u16 },
    Udp { addr: String },
    Child { path: String },
    Serial { path: String },
}

impl MasterUri {
    pub fn parse(uri: &str) -> Self {
        if let Some(rest) = uri.strip_prefix("tcp:") {
            let (host, port) = split_host_port(rest);
            return MasterUri::Tcp { host, port };
        }
        if uri.ends_with(".elf") {
            return MasterUri::Child { path: uri.to_string() };
        }
        if looks_like_host_port(uri) {
            return MasterUri::Udp { addr: uri.to_string() };
        }
        MasterUri::Serial { path: uri.to_string() }
    }
}

fn split_host_port(s: &str) -> (String, u16) {
    match s.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(5760)),
        None => (s.to_string(), 5760),
    }
}

fn looks_like_host_port(s: &str) -> bool {
    match s.rsplit_once(':') {
        Some((_, port)) => port.chars().all(|c| c.is_ascii_digit()) && !port.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tcp_uri() {
        match MasterUri::parse("tcp:127.0.0.1:5760") {
            MasterUri::Tcp { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 5760);
            }
            other => panic!("expected Tcp, got {other:?}"),
        }
    }

    #[test]
    fn parses_bare_host_port_as_udp() {
        match MasterUri::parse("127.0.0.1:14550") {
            MasterUri::Udp { addr } => assert_eq!(addr, "127.0.0.1:14550"),
            other => panic!("expected Udp, got {other:?}"),
        }
    }

    #[test]
    fn parses_elf_as_child() {
        match MasterUri::parse("sim_vehicle.elf") {
            MasterUri::Child { path } => assert_eq!(path, "sim_vehicle.elf"),
            other => panic!("expected Child, got {other:?}"),
        }
    }

    #[test]
    fn parses_anything_else_as_serial() {
        match MasterUri::parse("/dev/ttyACM0") {
            MasterUri::Serial { path } => assert_eq!(path, "/dev/ttyACM0"),
            other => panic!("expected Serial, got {other:?}"),
        }
    }
}
