//! ICMP echo primitive.
//!
//! [`EchoProber`] sends one echo request and waits for the matching reply.
//! [`SurgePinger`] implements it over `surge-ping`, which needs either an
//! unprivileged ICMP datagram socket (Linux `net.ipv4.ping_group_range`) or
//! raw socket access.

use crate::error::{ScanError, ScanResult};
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use surge_ping::{Client, Config, PingIdentifier, PingSequence, SurgeError};

/// Size of the echo payload, matching the classic `ping` default.
const PAYLOAD_SIZE: usize = 56;

/// Sends a single ICMP echo and reports the round-trip time.
#[async_trait]
pub trait EchoProber: Send + Sync {
    /// Send echo `seq` to `target` and wait up to `timeout` for the reply.
    async fn echo(&self, target: Ipv4Addr, seq: u16, timeout: Duration) -> ScanResult<Duration>;
}

/// Echo prober backed by a shared `surge-ping` client.
pub struct SurgePinger {
    client: Client,
    payload: [u8; PAYLOAD_SIZE],
}

impl SurgePinger {
    /// Open the ICMP socket.
    ///
    /// # Errors
    /// Fails when the process may not open ICMP sockets.
    pub fn new() -> ScanResult<Self> {
        let client = Client::new(&Config::default()).map_err(|e| {
            let err_str = e.to_string().to_lowercase();
            if err_str.contains("permission") || err_str.contains("operation not permitted") {
                ScanError::PermissionDenied(
                    "ICMP echo requires root/sudo or an allowed ping group".to_string(),
                )
            } else {
                ScanError::RawSocketError(e.to_string())
            }
        })?;

        Ok(Self {
            client,
            payload: [0u8; PAYLOAD_SIZE],
        })
    }
}

#[async_trait]
impl EchoProber for SurgePinger {
    async fn echo(&self, target: Ipv4Addr, seq: u16, timeout: Duration) -> ScanResult<Duration> {
        let mut pinger = self
            .client
            .pinger(IpAddr::V4(target), PingIdentifier(rand::random()))
            .await;
        pinger.timeout(timeout);

        match pinger.ping(PingSequence(seq), &self.payload).await {
            Ok((_packet, rtt)) => Ok(rtt),
            Err(SurgeError::Timeout { .. }) => Err(ScanError::Timeout),
            Err(e) => Err(ScanError::RawSocketError(e.to_string())),
        }
    }
}
