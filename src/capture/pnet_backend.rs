//! `pnet::datalink` backed capture.
//!
//! Requires raw socket access (root, or CAP_NET_RAW on Linux).

use super::{CaptureConfig, CaptureDevice, CaptureHandle, Datalink, FrameSink, FrameSource, LinkInterface};
use crate::error::{ScanError, ScanResult};
use pnet::datalink::{self, Channel, DataLinkReceiver, DataLinkSender, NetworkInterface};
use std::io;

/// Capture backend over the operating system's datalink layer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PnetDatalink;

impl PnetDatalink {
    pub fn new() -> Self {
        Self
    }
}

impl From<NetworkInterface> for LinkInterface {
    fn from(iface: NetworkInterface) -> Self {
        let is_up = iface.is_up();
        let is_loopback = iface.is_loopback();
        Self {
            name: iface.name,
            mac: iface.mac,
            ips: iface.ips,
            is_up,
            is_loopback,
        }
    }
}

impl Datalink for PnetDatalink {
    fn interfaces(&self) -> ScanResult<Vec<LinkInterface>> {
        Ok(datalink::interfaces().into_iter().map(LinkInterface::from).collect())
    }

    fn devices(&self) -> ScanResult<Vec<CaptureDevice>> {
        // Every datalink interface is a capture device; only those carrying
        // an address can be matched to a scan.
        Ok(datalink::interfaces()
            .into_iter()
            .filter(|iface| !iface.ips.is_empty())
            .map(|iface| CaptureDevice {
                addresses: iface.ips.iter().map(|net| net.ip()).collect(),
                name: iface.name,
            })
            .collect())
    }

    fn open(&self, device: &str, config: CaptureConfig) -> ScanResult<CaptureHandle> {
        let interface = datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == device)
            .ok_or_else(|| ScanError::CaptureOpen {
                device: device.to_string(),
                reason: "no such device".to_string(),
            })?;

        let channel_config = datalink::Config {
            read_timeout: Some(config.read_timeout),
            promiscuous: config.promiscuous,
            ..Default::default()
        };

        match datalink::channel(&interface, channel_config) {
            Ok(Channel::Ethernet(tx, rx)) => Ok(CaptureHandle::new(
                device,
                Box::new(PnetSink(tx)),
                Box::new(PnetSource(rx)),
            )),
            Ok(_) => Err(ScanError::CaptureOpen {
                device: device.to_string(),
                reason: "unsupported channel type".to_string(),
            }),
            Err(e) => {
                let err_str = e.to_string().to_lowercase();
                if err_str.contains("permission") || err_str.contains("operation not permitted") {
                    return Err(ScanError::PermissionDenied(format!(
                        "opening a capture on {} requires root/sudo privileges",
                        device
                    )));
                }
                Err(ScanError::CaptureOpen {
                    device: device.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }
}

struct PnetSink(Box<dyn DataLinkSender>);

impl FrameSink for PnetSink {
    fn send(&mut self, frame: &[u8]) -> ScanResult<()> {
        self.0
            .send_to(frame, None)
            .ok_or_else(|| ScanError::RawSocketError("Failed to send packet".to_string()))?
            .map_err(|e| ScanError::RawSocketError(e.to_string()))
    }
}

struct PnetSource(Box<dyn DataLinkReceiver>);

impl FrameSource for PnetSource {
    fn next_frame(&mut self) -> ScanResult<Option<Vec<u8>>> {
        match self.0.next() {
            Ok(frame) => Ok(Some(frame.to_vec())),
            Err(e) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {
                Ok(None)
            }
            Err(e) => Err(ScanError::Io(e)),
        }
    }
}
