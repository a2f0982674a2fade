//! Capture error types.

use std::io;

use thiserror::Error;

/// Errors raised while opening or reading a packet source.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// No interface carries the host's outbound address.
    #[error("no active network interface found")]
    NoInterface,
    /// Live capture was requested from a build without the `capture` feature.
    #[error("packet capture support not compiled in; rebuild with the `capture` feature")]
    Unsupported,
    /// The source reports a link layer this crate cannot strip.
    #[error("unsupported link type: {0}")]
    UnsupportedLinkType(i32),
    /// A filter argument could not be parsed.
    #[error("invalid capture filter: {0}")]
    InvalidFilter(String),
    /// The source has no more packets.
    #[error("packet source closed")]
    SourceClosed,
    #[error("capture I/O error: {0}")]
    Io(#[from] io::Error),
    #[cfg(feature = "capture")]
    #[error("pcap error: {0}")]
    Pcap(#[from] pcap::Error),
}
