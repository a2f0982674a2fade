//! Packet sources and the blocking capture loop.
//!
//! A [`PacketSource`] yields raw link-layer packets. [`run_capture`] strips
//! headers, applies the [`CaptureFilter`] and forwards TCP payloads to the
//! reassembly task as [`Segment`]s. Live capture through libpcap lives in
//! [`live`] and is only compiled with the `capture` feature.

mod error;
#[cfg(feature = "capture")]
pub mod live;
pub mod packet;

use std::{fmt, net::IpAddr, str::FromStr};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use error::CaptureError;
pub use packet::{LinkType, TcpSegment, parse_packet};

use crate::flow::ConnectionKey;

/// Ports watched when none are configured.
pub const DEFAULT_PORTS: PortRange = PortRange { min: 11001, max: 11003 };

/// A producer of raw captured packets.
///
/// `next_packet` blocks for at most a short read timeout. It returns
/// `Ok(None)` when the timeout elapses without traffic, so the caller can
/// observe shutdown, and [`CaptureError::SourceClosed`] once exhausted.
pub trait PacketSource: Send {
    /// Link layer of every packet this source yields.
    fn link_type(&self) -> LinkType;

    /// Read the next packet.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::SourceClosed`] when no packets remain, or the
    /// underlying read error.
    fn next_packet(&mut self) -> Result<Option<Bytes>, CaptureError>;
}

impl<S: PacketSource + ?Sized> PacketSource for Box<S> {
    fn link_type(&self) -> LinkType { (**self).link_type() }

    fn next_packet(&mut self) -> Result<Option<Bytes>, CaptureError> { (**self).next_packet() }
}

/// An inclusive TCP port range.
///
/// # Examples
///
/// ```
/// use chatlens::capture::PortRange;
///
/// let range: PortRange = "11001-11003".parse().expect("valid range");
/// assert!(range.contains(11002));
/// assert_eq!(range.to_string(), "11001-11003");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortRange {
    pub min: u16,
    pub max: u16,
}

impl PortRange {
    #[must_use]
    pub fn contains(self, port: u16) -> bool { (self.min..=self.max).contains(&port) }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

impl FromStr for PortRange {
    type Err = CaptureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CaptureError::InvalidFilter(format!("port range `{s}`"));
        let (min, max) = s.split_once('-').unwrap_or((s, s));
        let min: u16 = min.trim().parse().map_err(|_| invalid())?;
        let max: u16 = max.trim().parse().map_err(|_| invalid())?;
        if min > max {
            return Err(invalid());
        }
        Ok(Self { min, max })
    }
}

/// Which segments are forwarded to reassembly.
///
/// A host matches either endpoint; a port range matches either port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureFilter {
    pub host: Option<IpAddr>,
    pub ports: Option<PortRange>,
}

impl Default for CaptureFilter {
    fn default() -> Self {
        Self {
            host: None,
            ports: Some(DEFAULT_PORTS),
        }
    }
}

impl CaptureFilter {
    /// Filter accepting every TCP segment.
    #[must_use]
    pub fn any() -> Self {
        Self {
            host: None,
            ports: None,
        }
    }

    /// Whether a segment on `key` should be kept.
    #[must_use]
    pub fn matches(&self, key: &ConnectionKey) -> bool {
        let host_ok = self
            .host
            .is_none_or(|host| key.src_addr == host || key.dst_addr == host);
        let ports_ok = self
            .ports
            .is_none_or(|ports| ports.contains(key.src_port) || ports.contains(key.dst_port));
        host_ok && ports_ok
    }

    /// Kernel filter expression equivalent to this filter, with an optional
    /// user expression ANDed in.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatlens::capture::CaptureFilter;
    ///
    /// let filter = CaptureFilter::default();
    /// assert_eq!(filter.bpf_expression(None), "tcp and portrange 11001-11003");
    /// assert_eq!(
    ///     filter.bpf_expression(Some("not port 22")),
    ///     "(tcp and portrange 11001-11003) and (not port 22)"
    /// );
    /// ```
    #[must_use]
    pub fn bpf_expression(&self, extra: Option<&str>) -> String {
        let mut expr = String::from("tcp");
        if let Some(host) = self.host {
            expr.push_str(&format!(" and host {host}"));
        }
        if let Some(ports) = self.ports {
            expr.push_str(&format!(" and portrange {ports}"));
        }
        match extra.map(str::trim).filter(|extra| !extra.is_empty()) {
            Some(extra) => format!("({expr}) and ({extra})"),
            None => expr,
        }
    }
}

/// A TCP payload ready for reassembly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segment {
    pub key: ConnectionKey,
    pub payload: Bytes,
}

/// Packet counts reported when the capture loop ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Packets read from the source.
    pub packets: u64,
    /// Segments forwarded to reassembly.
    pub segments: u64,
    /// Packets that were not TCP, carried no payload or failed the filter.
    pub ignored: u64,
}

/// Options for opening a live capture.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LiveOptions {
    /// Interface to open; discovered from the default route when `None`.
    pub interface: Option<String>,
    pub promiscuous: bool,
    /// Kernel filter expression.
    pub bpf: String,
}

/// Open a live capture, returning the source and the interface name.
///
/// # Errors
///
/// Returns [`CaptureError::Unsupported`] when built without the `capture`
/// feature, [`CaptureError::NoInterface`] when discovery fails, or the
/// libpcap error raised while opening the device.
#[cfg(feature = "capture")]
pub fn open_live(options: &LiveOptions) -> Result<(Box<dyn PacketSource>, String), CaptureError> {
    let source = live::LiveSource::open(options)?;
    let interface = source.interface().to_owned();
    Ok((Box::new(source), interface))
}

/// Open a live capture, returning the source and the interface name.
///
/// # Errors
///
/// Always returns [`CaptureError::Unsupported`]: this build has no libpcap
/// support.
#[cfg(not(feature = "capture"))]
pub fn open_live(_options: &LiveOptions) -> Result<(Box<dyn PacketSource>, String), CaptureError> {
    Err(CaptureError::Unsupported)
}

/// Read packets until shutdown, source exhaustion or the receiver closing.
///
/// Runs on a blocking thread; segments are sent with
/// [`mpsc::Sender::blocking_send`], so a slow reassembly task applies
/// backpressure to the capture.
///
/// # Errors
///
/// Returns any source error other than [`CaptureError::SourceClosed`].
pub fn run_capture<S>(
    source: &mut S,
    filter: &CaptureFilter,
    tx: &mpsc::Sender<Segment>,
    shutdown: &CancellationToken,
) -> Result<CaptureStats, CaptureError>
where
    S: PacketSource + ?Sized,
{
    let link = source.link_type();
    let mut stats = CaptureStats::default();
    while !shutdown.is_cancelled() {
        let packet = match source.next_packet() {
            Ok(Some(packet)) => packet,
            Ok(None) => continue,
            Err(CaptureError::SourceClosed) => {
                debug!("packet source closed");
                break;
            }
            Err(err) => return Err(err),
        };
        stats.packets += 1;

        let Some(segment) = parse_packet(link, &packet) else {
            stats.ignored += 1;
            continue;
        };
        if segment.payload.is_empty() || !filter.matches(&segment.key) {
            stats.ignored += 1;
            continue;
        }
        let segment = Segment {
            key: segment.key,
            payload: packet.slice_ref(segment.payload),
        };
        if tx.blocking_send(segment).is_err() {
            debug!("reassembly channel closed; stopping capture");
            break;
        }
        stats.segments += 1;
    }
    debug!(
        packets = stats.packets,
        segments = stats.segments,
        ignored = stats.ignored,
        "capture loop finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests;
