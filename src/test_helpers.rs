#![cfg(any(test, feature = "test-helpers"))]
//! Builders and doubles shared by unit and integration tests.

use std::{
    collections::VecDeque,
    net::{Ipv4Addr, SocketAddrV4},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use bytes::Bytes;
use prost::Message;

use crate::{
    byte_order::write_network_u16,
    capture::{CaptureError, LinkType, PacketSource},
    display::{DisplayError, DisplaySink},
    protocol::{COMPRESSION_SNAPPY, ChatContent, FrameHeader, WorldChatNotify},
    translate::{ProviderError, Translator},
};

/// Message id bound to `WorldChatNotify` in the built-in registry.
pub const WORLD_CHAT_ID: u32 = 2601;

/// Encode a raw frame from a header and an already-encoded body.
#[must_use]
pub fn encode_frame(header: &FrameHeader, body: &[u8]) -> Vec<u8> {
    let header_bytes = header.encode_to_vec();
    let header_len = u16::try_from(header_bytes.len()).expect("test header fits in u16");
    let mut frame = Vec::with_capacity(2 + header_bytes.len() + body.len());
    frame.extend_from_slice(&write_network_u16(header_len));
    frame.extend_from_slice(&header_bytes);
    frame.extend_from_slice(body);
    frame
}

/// Encode a `WorldChatNotify` body.
#[must_use]
pub fn chat_body(name: &str, text: &str) -> Vec<u8> {
    WorldChatNotify {
        msg: Some(ChatContent {
            name: name.to_owned(),
            text: text.to_owned(),
            ..ChatContent::default()
        }),
        channel: 1,
    }
    .encode_to_vec()
}

/// Header declaring `body` under `message_id`.
#[must_use]
pub fn header_for(message_id: u32, body: &[u8], compressed: bool) -> FrameHeader {
    FrameHeader {
        message_id,
        compression_flag: if compressed { COMPRESSION_SNAPPY } else { 0 },
        body_length: u32::try_from(body.len()).expect("test body fits in u32"),
        sequence_id: 0,
    }
}

/// A complete uncompressed world-chat frame.
#[must_use]
pub fn chat_frame(name: &str, text: &str) -> Vec<u8> {
    let body = chat_body(name, text);
    encode_frame(&header_for(WORLD_CHAT_ID, &body, false), &body)
}

/// A complete Snappy-compressed world-chat frame.
#[must_use]
pub fn compressed_chat_frame(name: &str, text: &str) -> Vec<u8> {
    let body = snap::raw::Encoder::new()
        .compress_vec(&chat_body(name, text))
        .expect("compress test body");
    encode_frame(&header_for(WORLD_CHAT_ID, &body, true), &body)
}

/// Wrap a TCP payload in Ethernet, IPv4 and TCP headers.
#[must_use]
pub fn ethernet_tcp_packet(src: SocketAddrV4, dst: SocketAddrV4, payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(14 + 20 + 20 + payload.len());
    packet.extend_from_slice(&[0x02, 0, 0, 0, 0, 0x01, 0x02, 0, 0, 0, 0, 0x02]);
    packet.extend_from_slice(&write_network_u16(0x0800));
    let total_len = u16::try_from(20 + 20 + payload.len()).expect("test packet fits in u16");
    packet.extend_from_slice(&[0x45, 0]);
    packet.extend_from_slice(&write_network_u16(total_len));
    packet.extend_from_slice(&[0, 0, 0x40, 0, 64, 6, 0, 0]);
    packet.extend_from_slice(&src.ip().octets());
    packet.extend_from_slice(&dst.ip().octets());
    packet.extend_from_slice(&write_network_u16(src.port()));
    packet.extend_from_slice(&write_network_u16(dst.port()));
    packet.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0, 0x50, 0x18, 0xff, 0xff, 0, 0, 0, 0]);
    packet.extend_from_slice(payload);
    packet
}

/// Address pair used by tests that do not care about endpoints.
#[must_use]
pub fn game_endpoints() -> (SocketAddrV4, SocketAddrV4) {
    (
        SocketAddrV4::new(Ipv4Addr::new(203, 0, 113, 7), 11002),
        SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 20), 50432),
    )
}

/// Packet source replaying a fixed list of Ethernet frames, then closing.
#[derive(Debug, Default)]
pub struct ReplaySource {
    packets: VecDeque<Bytes>,
}

impl ReplaySource {
    #[must_use]
    pub fn new<I, P>(packets: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Bytes>,
    {
        Self {
            packets: packets.into_iter().map(Into::into).collect(),
        }
    }
}

impl PacketSource for ReplaySource {
    fn link_type(&self) -> LinkType { LinkType::Ethernet }

    fn next_packet(&mut self) -> Result<Option<Bytes>, CaptureError> {
        self.packets.pop_front().map(Some).ok_or(CaptureError::SourceClosed)
    }
}

/// Shared, ordered record of provider invocations.
#[derive(Clone, Debug, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn record(&self, entry: String) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
    }

    /// Entries recorded so far, formatted as `"<label>:<text>"`.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

type Script = dyn Fn(&str) -> (Duration, Option<String>) + Send + Sync;

/// Provider double whose latency and answer are computed from the input.
///
/// A `None` answer is reported as a transport-style failure.
#[derive(Clone)]
pub struct ScriptedTranslator {
    label: String,
    log: CallLog,
    script: Arc<Script>,
}

impl ScriptedTranslator {
    /// Provider answering via `script`.
    pub fn new<F>(label: &str, log: &CallLog, script: F) -> Self
    where
        F: Fn(&str) -> (Duration, Option<String>) + Send + Sync + 'static,
    {
        Self {
            label: label.to_owned(),
            log: log.clone(),
            script: Arc::new(script),
        }
    }

    /// Provider that immediately answers with `answer`.
    #[must_use]
    pub fn replying(label: &str, log: &CallLog, answer: &str) -> Self {
        let answer = answer.to_owned();
        Self::new(label, log, move |_| (Duration::ZERO, Some(answer.clone())))
    }

    /// Provider that immediately fails.
    #[must_use]
    pub fn failing(label: &str, log: &CallLog) -> Self {
        Self::new(label, log, |_| (Duration::ZERO, None))
    }

    /// Provider that answers only after `delay`.
    #[must_use]
    pub fn stalling(label: &str, log: &CallLog, delay: Duration) -> Self {
        Self::new(label, log, move |text| (delay, Some(format!("late {text}"))))
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    async fn translate(&self, text: &str, _timeout: Duration) -> Result<String, ProviderError> {
        self.log.record(format!("{}:{text}", self.label));
        let (delay, answer) = (self.script)(text);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        answer.ok_or_else(|| ProviderError::Response(format!("{} failed", self.label)))
    }
}

/// Display sink keeping every line in memory.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink(Arc<Mutex<Vec<String>>>);

impl RecordingSink {
    /// Lines currently shown.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl DisplaySink for RecordingSink {
    fn append(&self, line: &str) -> Result<(), DisplayError> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_owned());
        Ok(())
    }

    fn clear(&self) -> Result<(), DisplayError> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }
}
