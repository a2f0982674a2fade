//! Per-direction TCP byte buffers feeding the frame decoder.
//!
//! Each [`ConnectionKey`] owns one [`FlowBuffer`]. Payload bytes are appended
//! at the tail and frames are consumed from the head by a
//! [`FrameDecoder`]. Flows that stop receiving data are purged after an idle
//! timeout, and a flow that grows without ever yielding a frame is cleared.

use std::{
    fmt,
    net::{IpAddr, SocketAddr},
    time::{Duration, Instant},
};

use bytes::BytesMut;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::{frame::FrameDecoder, metrics, protocol::DecodedMessage};

/// Default time a flow may go without payload before it is purged.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Default ceiling on unconsumed bytes held for one flow.
pub const DEFAULT_MAX_FLOW_BYTES: usize = 4 * 1024 * 1024;

/// One direction of a TCP connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub src_addr: IpAddr,
    pub dst_addr: IpAddr,
    pub src_port: u16,
    pub dst_port: u16,
}

impl ConnectionKey {
    #[must_use]
    pub fn new(src: SocketAddr, dst: SocketAddr) -> Self {
        Self {
            src_addr: src.ip(),
            dst_addr: dst.ip(),
            src_port: src.port(),
            dst_port: dst.port(),
        }
    }

    #[must_use]
    pub fn source(&self) -> SocketAddr { SocketAddr::new(self.src_addr, self.src_port) }

    #[must_use]
    pub fn destination(&self) -> SocketAddr { SocketAddr::new(self.dst_addr, self.dst_port) }

    /// The key of the opposite direction.
    #[must_use]
    pub fn reversed(&self) -> Self { Self::new(self.destination(), self.source()) }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source(), self.destination())
    }
}

/// Limits applied by a [`FlowBufferStore`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlowConfig {
    pub idle_timeout: Duration,
    pub max_flow_bytes: usize,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            max_flow_bytes: DEFAULT_MAX_FLOW_BYTES,
        }
    }
}

/// Unconsumed bytes of one flow.
#[derive(Debug)]
pub struct FlowBuffer {
    bytes: BytesMut,
    last_seen: Instant,
}

impl FlowBuffer {
    fn new(now: Instant) -> Self {
        Self {
            bytes: BytesMut::new(),
            last_seen: now,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize { self.bytes.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

    #[must_use]
    pub fn last_seen(&self) -> Instant { self.last_seen }
}

/// Concurrent map from [`ConnectionKey`] to [`FlowBuffer`].
///
/// Access to a single flow is serialised by the map's entry lock, so
/// payloads for one key are appended and decoded atomically.
#[derive(Debug, Default)]
pub struct FlowBufferStore {
    flows: DashMap<ConnectionKey, FlowBuffer>,
    config: FlowConfig,
}

impl FlowBufferStore {
    #[must_use]
    pub fn new(config: FlowConfig) -> Self {
        Self {
            flows: DashMap::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> FlowConfig { self.config }

    /// Append `payload` to the flow for `key` and extract every complete
    /// message.
    pub fn on_payload(
        &self,
        key: ConnectionKey,
        payload: &[u8],
        decoder: &FrameDecoder,
    ) -> Vec<DecodedMessage> {
        self.on_payload_at(key, payload, decoder, Instant::now())
    }

    /// Like [`on_payload`](Self::on_payload) with an explicit clock reading.
    pub fn on_payload_at(
        &self,
        key: ConnectionKey,
        payload: &[u8],
        decoder: &FrameDecoder,
        now: Instant,
    ) -> Vec<DecodedMessage> {
        if payload.is_empty() {
            return Vec::new();
        }
        let mut entry = self.flows.entry(key).or_insert_with(|| {
            debug!(flow = %key, "flow opened");
            metrics::inc_flows();
            FlowBuffer::new(now)
        });
        let flow = entry.value_mut();
        flow.last_seen = now;
        flow.bytes.extend_from_slice(payload);
        let messages = decoder.decode_all(&mut flow.bytes);

        if flow.bytes.len() > self.config.max_flow_bytes {
            warn!(
                flow = %key,
                buffered = flow.bytes.len(),
                max = self.config.max_flow_bytes,
                "flow buffer exceeded limit; clearing"
            );
            flow.bytes.clear();
        }
        messages
    }

    /// Remove flows idle for at least the configured timeout.
    ///
    /// Returns the keys of evicted flows.
    pub fn purge_idle(&self) -> Vec<ConnectionKey> { self.purge_idle_at(Instant::now()) }

    /// Like [`purge_idle`](Self::purge_idle) with an explicit clock reading.
    pub fn purge_idle_at(&self, now: Instant) -> Vec<ConnectionKey> {
        let timeout = self.config.idle_timeout;
        let mut evicted = Vec::new();
        self.flows.retain(|key, flow| {
            let idle = now.saturating_duration_since(flow.last_seen) >= timeout;
            if idle {
                evicted.push(*key);
            }
            !idle
        });
        for key in &evicted {
            debug!(flow = %key, "idle flow purged");
            metrics::dec_flows();
        }
        evicted
    }

    /// Bytes currently buffered for `key`.
    #[must_use]
    pub fn buffered(&self, key: &ConnectionKey) -> Option<usize> {
        self.flows.get(key).map(|flow| flow.len())
    }

    /// Number of tracked flows.
    #[must_use]
    pub fn len(&self) -> usize { self.flows.len() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.flows.is_empty() }
}
