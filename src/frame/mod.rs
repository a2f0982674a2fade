//! Length-prefixed frame extraction with resynchronisation.
//!
//! The wire layout is `[u16 BE header length][header][body]`. The header is a
//! [`FrameHeader`](crate::protocol::FrameHeader) record declaring the body
//! length, whether the body is Snappy-compressed and which schema decodes it.
//!
//! [`FrameDecoder`] works on the head of a flow buffer. It is stateless
//! between calls: "awaiting header" and "awaiting body" are simply the two
//! places where [`Step::NeedMore`] is returned, and the next call restarts
//! from the buffer head. Malformed input never stalls the decoder; each
//! [`FrameError`] carries the [`Recovery`] that was applied.

pub mod compression;
pub mod error;

use std::sync::Arc;

use bytes::{Buf, Bytes, BytesMut};
use prost::Message;

pub use compression::{MAX_DECOMPRESSED_LEN, decompress_snappy};
pub use error::{DecompressError, FrameError, Recovery};

use crate::{
    byte_order::read_network_u16_at,
    metrics,
    protocol::{DecodedMessage, FrameHeader, MessageRegistry},
};

/// Size of the header length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Largest header length accepted before the prefix is treated as corrupt.
pub const MAX_HEADER_LENGTH: usize = 20 * 1024;

/// Bytes discarded by a resync.
pub const RESYNC_STEP: usize = 2;

/// Outcome of one extraction attempt.
#[derive(Debug)]
pub enum Step {
    /// The buffer head does not yet hold a complete frame.
    NeedMore,
    /// A frame yielded a chat message.
    Message(DecodedMessage),
    /// A frame or prefix was discarded; scanning may continue.
    Discarded(FrameError),
}

/// Extracts chat messages from a flow buffer.
#[derive(Clone, Debug)]
pub struct FrameDecoder {
    registry: Arc<MessageRegistry>,
    max_decompressed_len: usize,
}

impl FrameDecoder {
    /// Create a decoder resolving message ids through `registry`.
    #[must_use]
    pub fn new(registry: MessageRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            max_decompressed_len: MAX_DECOMPRESSED_LEN,
        }
    }

    /// Override the ceiling on decompressed body size.
    #[must_use]
    pub fn with_max_decompressed_len(mut self, max: usize) -> Self {
        self.max_decompressed_len = max;
        self
    }

    /// The registry used to resolve message ids.
    #[must_use]
    pub fn registry(&self) -> &MessageRegistry { &self.registry }

    /// Attempt to extract one frame from the head of `buf`.
    ///
    /// Bytes are removed from `buf` only when a frame completes or a resync
    /// applies; on [`Step::NeedMore`] the buffer is left untouched.
    pub fn decode_next(&self, buf: &mut BytesMut) -> Step {
        let Some(header_len) = read_network_u16_at(buf, 0) else {
            return Step::NeedMore;
        };
        let header_len = usize::from(header_len);
        if header_len > MAX_HEADER_LENGTH {
            buf.advance(RESYNC_STEP);
            return Step::Discarded(FrameError::HeaderTooLong {
                len: header_len,
                max: MAX_HEADER_LENGTH,
            });
        }

        let header_end = LENGTH_PREFIX_SIZE + header_len;
        if buf.len() < header_end {
            return Step::NeedMore;
        }
        let header = match FrameHeader::decode(&buf[LENGTH_PREFIX_SIZE..header_end]) {
            Ok(header) => header,
            Err(err) => {
                buf.advance(RESYNC_STEP);
                return Step::Discarded(FrameError::InvalidHeader(err));
            }
        };

        let body_len = usize::try_from(header.body_length).unwrap_or(usize::MAX);
        let total = header_end.saturating_add(body_len);
        if buf.len() < total {
            return Step::NeedMore;
        }

        // The slot is consumed whatever the body turns out to be.
        let frame = buf.split_to(total).freeze();
        let body = frame.slice(header_end..);

        match self.decode_body(&header, body) {
            Ok(message) => Step::Message(message),
            Err(err) => {
                if err.recovery() == Recovery::DropFrameAndResync {
                    buf.advance(buf.len().min(RESYNC_STEP));
                }
                Step::Discarded(err)
            }
        }
    }

    fn decode_body(&self, header: &FrameHeader, body: Bytes) -> Result<DecodedMessage, FrameError> {
        let body = if header.is_compressed() {
            Bytes::from(decompress_snappy(&body, self.max_decompressed_len)?)
        } else {
            body
        };
        let schema = self
            .registry
            .resolve(header.message_id)
            .ok_or(FrameError::UnknownMessageId(header.message_id))?;
        let message = schema
            .decode(&body)
            .map_err(|source| FrameError::InvalidBody {
                schema: schema.name(),
                source,
            })?;
        if message.text.is_empty() {
            return Err(FrameError::EmptyText);
        }
        Ok(message)
    }

    /// Extract every complete frame from `buf`, leaving any incomplete tail.
    ///
    /// Discarded frames are logged at debug level and counted.
    pub fn decode_all(&self, buf: &mut BytesMut) -> Vec<DecodedMessage> {
        let mut messages = Vec::new();
        loop {
            match self.decode_next(buf) {
                Step::NeedMore => break,
                Step::Message(message) => {
                    metrics::inc_frames_decoded();
                    messages.push(message);
                }
                Step::Discarded(err) => {
                    tracing::debug!(
                        reason = err.reason(),
                        recovery = ?err.recovery(),
                        error = %err,
                        remaining = buf.len(),
                        "frame discarded"
                    );
                    metrics::inc_frames_discarded(err.reason());
                }
            }
        }
        messages
    }
}

impl Default for FrameDecoder {
    fn default() -> Self { Self::new(MessageRegistry::builtin()) }
}
