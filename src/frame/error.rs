//! Framing corruption taxonomy.
//!
//! Every variant is expected noise from observing live traffic. None of them
//! propagate past the decoder: each maps to a [`Recovery`] action that decides
//! how many bytes are discarded before scanning resumes.

use prost::DecodeError;
use thiserror::Error;

/// Errors for which the decoder's recovery action is chosen.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The length prefix declares a header larger than the protocol allows.
    #[error("declared header length {len} exceeds {max}")]
    HeaderTooLong { len: usize, max: usize },

    /// The header bytes are not a valid header record.
    #[error("malformed frame header: {0}")]
    InvalidHeader(#[source] DecodeError),

    /// A compressed body could not be expanded.
    #[error("body decompression failed: {0}")]
    Decompress(#[from] DecompressError),

    /// The header names a message id with no registered schema.
    #[error("unknown message id {0}")]
    UnknownMessageId(u32),

    /// The body does not match the resolved schema.
    #[error("malformed {schema} body: {source}")]
    InvalidBody {
        schema: &'static str,
        #[source]
        source: DecodeError,
    },

    /// The body decoded but carries no text.
    #[error("frame carries no chat text")]
    EmptyText,
}

/// Failures while expanding a compressed body.
#[derive(Debug, Error)]
pub enum DecompressError {
    /// The bytes are not a valid Snappy block.
    #[error("snappy: {0}")]
    Snappy(#[from] snap::Error),

    /// The block declares an expansion beyond the configured ceiling.
    #[error("decompressed length {len} exceeds {max}")]
    TooLarge { len: usize, max: usize },
}

/// Bytes discarded in response to a [`FrameError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Recovery {
    /// Nothing was consumed yet; drop the two length bytes and rescan.
    Resync,
    /// The whole frame slot was consumed; continue with the next frame.
    DropFrame,
    /// The frame slot was consumed and two further bytes are dropped.
    DropFrameAndResync,
}

impl FrameError {
    /// Recovery applied by the decoder for this error.
    #[must_use]
    pub fn recovery(&self) -> Recovery {
        match self {
            Self::HeaderTooLong { .. } | Self::InvalidHeader(_) => Recovery::Resync,
            Self::Decompress(_) => Recovery::DropFrameAndResync,
            Self::UnknownMessageId(_) | Self::InvalidBody { .. } | Self::EmptyText => {
                Recovery::DropFrame
            }
        }
    }

    /// Short label used for log fields and metric labels.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::HeaderTooLong { .. } => "header_too_long",
            Self::InvalidHeader(_) => "invalid_header",
            Self::Decompress(_) => "decompress",
            Self::UnknownMessageId(_) => "unknown_message_id",
            Self::InvalidBody { .. } => "invalid_body",
            Self::EmptyText => "empty_text",
        }
    }
}
