//! Passive traffic observation.
//!
//! Listens on an interface without sending anything and records every peer
//! seen sending IPv4 traffic to one of this host's addresses.

use crate::capture::{CaptureConfig, CaptureHandle, Datalink};
use crate::error::{ScanError, ScanResult};
use crate::storage::{PassiveResult, PassiveStore, ScanSession};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::Packet;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Every non-loopback IPv4 address bound to any interface.
pub fn local_addresses(datalink: &dyn Datalink) -> ScanResult<HashSet<Ipv4Addr>> {
    let addrs = datalink
        .interfaces()?
        .iter()
        .flat_map(|iface| iface.non_loopback_addrs().collect::<Vec<_>>())
        .filter_map(|ip| match ip {
            IpAddr::V4(v4) => Some(v4),
            IpAddr::V6(_) => None,
        })
        .collect();
    Ok(addrs)
}

/// Inspect one frame. Returns the record if it revealed a new peer.
pub fn inspect_frame(
    frame: &[u8],
    local: &HashSet<Ipv4Addr>,
    store: &PassiveStore,
) -> Option<PassiveResult> {
    let ethernet = EthernetPacket::new(frame)?;
    if ethernet.get_ethertype() != EtherTypes::Ipv4 {
        return None;
    }
    let ipv4 = Ipv4Packet::new(ethernet.payload())?;

    if !local.contains(&ipv4.get_destination()) {
        return None;
    }

    let src_ip = ipv4.get_source();
    if store.contains(&src_ip) {
        return None;
    }

    let result = PassiveResult {
        src_ip,
        protocol: format!("{}", ipv4.get_next_level_protocol()),
        src_mac: ethernet.get_source().to_string(),
        dst_mac: ethernet.get_destination().to_string(),
        ether_type: format!("{}", ethernet.get_ethertype()),
    };

    if !store.insert(src_ip, result.clone()) {
        return None;
    }

    info!(
        "Discovered new asset: {} (protocol {}, {} -> {}, ethertype {})",
        result.src_ip, result.protocol, result.src_mac, result.dst_mac, result.ether_type
    );
    Some(result)
}

fn capture_loop(
    handle: &CaptureHandle,
    local: &HashSet<Ipv4Addr>,
    store: &PassiveStore,
    scope: &CancellationToken,
    deadline: Instant,
) -> Vec<PassiveResult> {
    let mut found = Vec::new();

    while !scope.is_cancelled() && Instant::now() < deadline {
        match handle.read() {
            Ok(Some(frame)) => found.extend(inspect_frame(&frame, local, store)),
            Ok(None) => {}
            Err(ScanError::CaptureClosed) => break,
            Err(e) => {
                warn!("capture on {} failed: {}", handle.device(), e);
                break;
            }
        }
    }

    found
}

/// Observe `interface` for `duration`, or until `cancel` fires.
///
/// Both the capture worker and the closer are joined before this returns,
/// and the capture handle is closed.
pub async fn passive_capture(
    session: &ScanSession,
    datalink: Arc<dyn Datalink>,
    interface: &str,
    duration: Duration,
    cancel: &CancellationToken,
) -> ScanResult<Vec<PassiveResult>> {
    let local = Arc::new(local_addresses(datalink.as_ref())?);
    debug!("local addresses: {:?}", local);

    let handle = Arc::new(datalink.open(interface, CaptureConfig::passive())?);
    info!("Listening on {} for {:?}", interface, duration);

    let scope = cancel.child_token();
    let deadline = Instant::now() + duration;

    let capture = tokio::task::spawn_blocking({
        let handle = Arc::clone(&handle);
        let store = Arc::clone(&session.passive);
        let scope = scope.clone();
        let local = Arc::clone(&local);
        move || capture_loop(&handle, &local, &store, &scope, deadline)
    });

    let closer = tokio::spawn({
        let handle = Arc::clone(&handle);
        let scope = scope.clone();
        async move {
            scope.cancelled().await;
            tokio::task::spawn_blocking(move || handle.close()).await
        }
    });

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = scope.cancelled() => info!("Passive capture interrupted"),
    }
    scope.cancel();

    let (captured, closed) = tokio::join!(capture, closer);
    closed??;
    let found = captured?;

    info!("Passive capture on {} complete: {} peers", interface, found.len());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureDevice, LinkInterface};
    use crate::testing::{ipv4_frame, FakeDatalink};
    use pnet::util::MacAddr;

    const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 5);

    fn datalink() -> FakeDatalink {
        FakeDatalink::new()
            .with_interface(LinkInterface {
                name: "eth0".to_string(),
                mac: Some(MacAddr::new(2, 0, 0, 0, 0, 5)),
                ips: vec!["10.0.0.5/24".parse().unwrap()],
                is_up: true,
                is_loopback: false,
            })
            .with_interface(LinkInterface {
                name: "lo".to_string(),
                mac: None,
                ips: vec!["127.0.0.1/8".parse().unwrap()],
                is_up: true,
                is_loopback: true,
            })
            .with_device(CaptureDevice {
                name: "eth0".to_string(),
                addresses: vec![IpAddr::V4(LOCAL)],
            })
    }

    #[test]
    fn test_local_addresses_skip_loopback() {
        let local = local_addresses(&datalink()).unwrap();
        assert_eq!(local, HashSet::from([LOCAL]));
    }

    #[test]
    fn test_inspect_frame_records_new_peers_once() {
        let local = HashSet::from([LOCAL]);
        let store = PassiveStore::new();
        let peer = Ipv4Addr::new(10, 0, 0, 40);

        let frame = ipv4_frame(peer, LOCAL);
        let result = inspect_frame(&frame, &local, &store).unwrap();
        assert_eq!(result.src_ip, peer);
        assert_eq!(result.ether_type, "Ipv4");
        assert_eq!(result.protocol, "Tcp");

        assert!(inspect_frame(&frame, &local, &store).is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_inspect_frame_ignores_traffic_to_others() {
        let local = HashSet::from([LOCAL]);
        let store = PassiveStore::new();
        let frame = ipv4_frame(Ipv4Addr::new(10, 0, 0, 40), Ipv4Addr::new(10, 0, 0, 41));
        assert!(inspect_frame(&frame, &local, &store).is_none());
        assert!(inspect_frame(&[0u8; 4], &local, &store).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_capture_joins_workers_and_closes_handle() {
        let peer = Ipv4Addr::new(10, 0, 0, 40);
        let datalink = Arc::new(
            datalink()
                .with_unsolicited(ipv4_frame(peer, LOCAL))
                .with_unsolicited(ipv4_frame(peer, LOCAL))
                .with_unsolicited(ipv4_frame(Ipv4Addr::new(10, 0, 0, 41), Ipv4Addr::new(10, 0, 0, 42))),
        );
        let session = ScanSession::new();

        let found = passive_capture(
            &session,
            datalink.clone(),
            "eth0",
            Duration::from_millis(100),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(session.passive_results()[0].src_ip, peer);
        assert_eq!(datalink.live_handles(), 0);
        assert!(datalink.last_handle_closed());
    }

    #[tokio::test]
    async fn test_cancel_ends_capture_early() {
        let datalink = Arc::new(datalink());
        let session = ScanSession::new();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        passive_capture(&session, datalink.clone(), "eth0", Duration::from_secs(30), &cancel)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(datalink.live_handles(), 0);
    }

    #[tokio::test]
    async fn test_open_failure_is_fatal() {
        let datalink = Arc::new(datalink().failing_open());
        let result = passive_capture(
            &ScanSession::new(),
            datalink,
            "eth0",
            Duration::from_millis(10),
            &CancellationToken::new(),
        )
        .await;
        assert!(matches!(result, Err(ScanError::CaptureOpen { .. })));
    }
}
