//! Data-store reachability probe.
//!
//! Opens a TCP connection to the configured host and reads the MySQL server
//! greeting. Credentials are not sent. The whole attempt (lookup, connect,
//! greeting) is bounded by one timeout and the probe never returns an error:
//! every outcome is folded into a `ProbeResult`.

use crate::models::{DataStore, ProbeFailure, ProbeResult};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{lookup_host, TcpStream};

/// Greeting payloads past this size are truncated; only the head matters.
const MAX_GREETING_BYTES: usize = 1024;

const HANDSHAKE_V10: u8 = 0x0a;
const ERROR_PACKET: u8 = 0xff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityProbe {
    port: u16,
    timeout: Duration,
}

impl ConnectivityProbe {
    pub fn new(port: u16, timeout: Duration) -> Self {
        ConnectivityProbe { port, timeout }
    }

    /// Check whether the data store answers like a MySQL server.
    pub async fn probe(&self, data_store: &DataStore) -> ProbeResult {
        let target = format!("{}:{}", data_store.host, self.port);
        log::info!("[Probe] Checking {} (timeout {:?})", target, self.timeout);

        let result = match tokio::time::timeout(self.timeout, self.attempt(data_store)).await {
            Ok(result) => result,
            Err(_) => ProbeResult::failed(
                ProbeFailure::TimedOut,
                format!(
                    "no answer from {} within {}s: host unreachable, firewalled, or the data store is not up yet",
                    target,
                    self.timeout.as_secs_f32()
                ),
            ),
        };

        if result.succeeded {
            log::info!("[Probe] {}", result.detail);
        } else {
            log::warn!("[Probe] {}", result.detail);
        }
        result
    }

    async fn attempt(&self, data_store: &DataStore) -> ProbeResult {
        let host = data_store.host.as_str();
        let target = format!("{}:{}", host, self.port);

        // Runs getaddrinfo on the blocking pool; the outer timeout stops waiting
        // for it but cannot cancel it.
        let addrs: Vec<SocketAddr> = match lookup_host((host, self.port)).await {
            Ok(addrs) => addrs.collect(),
            Err(e) => {
                return ProbeResult::failed(
                    ProbeFailure::Resolve,
                    format!("cannot resolve host '{}': {}. Check the configured host", host, e),
                )
            }
        };
        if addrs.is_empty() {
            return ProbeResult::failed(
                ProbeFailure::Resolve,
                format!("host '{}' resolved to no addresses. Check the configured host", host),
            );
        }

        let mut stream = match TcpStream::connect(&addrs[..]).await {
            Ok(stream) => stream,
            Err(e) => return connect_failure(&target, e),
        };

        match read_packet(&mut stream).await {
            Ok(payload) => interpret_greeting(&target, &payload),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => ProbeResult::failed(
                ProbeFailure::Network,
                format!("{} closed the connection before sending a greeting", target),
            ),
            Err(e) => ProbeResult::failed(
                ProbeFailure::Network,
                format!("reading greeting from {} failed: {}", target, e),
            ),
        }
    }
}

fn connect_failure(target: &str, e: io::Error) -> ProbeResult {
    match e.kind() {
        io::ErrorKind::ConnectionRefused => ProbeResult::failed(
            ProbeFailure::Refused,
            format!(
                "connection to {} refused: the data store is not listening there (yet)",
                target
            ),
        ),
        io::ErrorKind::TimedOut => ProbeResult::failed(
            ProbeFailure::TimedOut,
            format!("connection to {} timed out", target),
        ),
        _ => ProbeResult::failed(
            ProbeFailure::Network,
            format!("cannot connect to {}: {}", target, e),
        ),
    }
}

/// Read one MySQL packet: 3-byte little-endian length, sequence id, payload.
async fn read_packet(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;

    let mut payload = vec![0u8; len.min(MAX_GREETING_BYTES)];
    stream.read_exact(&mut payload).await?;
    Ok(payload)
}

fn interpret_greeting(target: &str, payload: &[u8]) -> ProbeResult {
    match payload.first() {
        Some(&HANDSHAKE_V10) => {
            let version_bytes = &payload[1..];
            let end = version_bytes
                .iter()
                .position(|b| *b == 0)
                .unwrap_or(version_bytes.len());
            let version = String::from_utf8_lossy(&version_bytes[..end]);
            ProbeResult::success(format!(
                "data store reachable at {} (server {}); credentials not verified",
                target, version
            ))
        }
        Some(&ERROR_PACKET) => {
            let (code, message) = parse_error_packet(payload);
            ProbeResult::failed(
                ProbeFailure::Rejected,
                format!(
                    "{} refused this device (error {}: {}). Grant access for this host on the server",
                    target, code, message
                ),
            )
        }
        Some(other) => ProbeResult::failed(
            ProbeFailure::Protocol,
            format!(
                "{} answered with an unexpected greeting (0x{:02x}). Is this a MySQL port?",
                target, other
            ),
        ),
        None => ProbeResult::failed(
            ProbeFailure::Protocol,
            format!("{} sent an empty greeting", target),
        ),
    }
}

fn parse_error_packet(payload: &[u8]) -> (u16, String) {
    if payload.len() < 3 {
        return (0, "malformed error packet".to_string());
    }
    let code = u16::from_le_bytes([payload[1], payload[2]]);
    let mut rest = &payload[3..];
    // Optional SQL state marker: '#' plus five characters
    if rest.first() == Some(&b'#') && rest.len() >= 6 {
        rest = &rest[6..];
    }
    (code, String::from_utf8_lossy(rest).trim().to_string())
}
