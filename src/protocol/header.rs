//! Frame header record.

use prost::Message;

/// Value of [`FrameHeader::compression_flag`] marking a Snappy-compressed body.
pub const COMPRESSION_SNAPPY: u32 = 1;

/// Header preceding every frame body.
///
/// Only `message_id`, `compression_flag` and `body_length` influence decoding;
/// `sequence_id` is carried for diagnostics.
#[derive(Clone, PartialEq, Message)]
pub struct FrameHeader {
    #[prost(uint32, tag = "1")]
    pub message_id: u32,
    #[prost(uint32, tag = "2")]
    pub compression_flag: u32,
    #[prost(uint32, tag = "3")]
    pub body_length: u32,
    #[prost(uint64, tag = "4")]
    pub sequence_id: u64,
}

impl FrameHeader {
    /// Whether the body must be decompressed before schema decoding.
    #[must_use]
    pub fn is_compressed(&self) -> bool { self.compression_flag == COMPRESSION_SNAPPY }
}
