//! libpcap-backed packet source.

use std::net::{IpAddr, UdpSocket};

use bytes::Bytes;
use pcap::{Active, Capture, Device};
use tracing::{debug, info};

use super::{CaptureError, LinkType, LiveOptions, PacketSource};

/// Snapshot length large enough for any TCP segment.
const SNAPLEN: i32 = 65_535;
/// Read timeout letting the capture loop observe shutdown.
const READ_TIMEOUT_MS: i32 = 200;
/// Address used only to select the outbound route; nothing is sent.
const ROUTE_PROBE: &str = "8.8.8.8:80";

/// Live capture on one interface.
pub struct LiveSource {
    capture: Capture<Active>,
    link: LinkType,
    interface: String,
}

impl std::fmt::Debug for LiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveSource")
            .field("interface", &self.interface)
            .field("link", &self.link)
            .finish_non_exhaustive()
    }
}

impl LiveSource {
    /// Open the configured (or discovered) interface and install the filter.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError`] if no interface is found, the device cannot
    /// be opened, the filter does not compile or the link type is unknown.
    pub fn open(options: &LiveOptions) -> Result<Self, CaptureError> {
        let interface = match &options.interface {
            Some(name) => name.clone(),
            None => active_interface()?,
        };
        let mut capture = Capture::from_device(interface.as_str())?
            .promisc(options.promiscuous)
            .snaplen(SNAPLEN)
            .timeout(READ_TIMEOUT_MS)
            .immediate_mode(true)
            .open()?;
        capture.filter(&options.bpf, true)?;
        let dlt = capture.get_datalink().0;
        let link = LinkType::from_dlt(dlt).ok_or(CaptureError::UnsupportedLinkType(dlt))?;
        info!(%interface, bpf = %options.bpf, ?link, "capture opened");
        Ok(Self {
            capture,
            link,
            interface,
        })
    }

    #[must_use]
    pub fn interface(&self) -> &str { &self.interface }
}

impl PacketSource for LiveSource {
    fn link_type(&self) -> LinkType { self.link }

    fn next_packet(&mut self) -> Result<Option<Bytes>, CaptureError> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(Some(Bytes::copy_from_slice(packet.data))),
            Err(pcap::Error::TimeoutExpired) => Ok(None),
            Err(pcap::Error::NoMorePackets) => Err(CaptureError::SourceClosed),
            Err(err) => Err(err.into()),
        }
    }
}

/// Name of the interface carrying the host's default-route address.
///
/// # Errors
///
/// Returns [`CaptureError::NoInterface`] when no device has that address.
pub fn active_interface() -> Result<String, CaptureError> {
    let local = outbound_address()?;
    debug!(%local, "outbound address");
    Device::list()?
        .into_iter()
        .find(|device| device.addresses.iter().any(|addr| addr.addr == local))
        .map(|device| device.name)
        .ok_or(CaptureError::NoInterface)
}

fn outbound_address() -> Result<IpAddr, CaptureError> {
    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.connect(ROUTE_PROBE)?;
    Ok(socket.local_addr()?.ip())
}
