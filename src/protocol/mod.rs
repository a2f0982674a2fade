//! Protocol definitions for the observed chat traffic.
//!
//! Frames carry a protobuf [`FrameHeader`] followed by a protobuf body whose
//! schema is selected by the header's message id. The id→name→schema table
//! lives in [`MessageRegistry`]; it is static data, optionally re-keyed from
//! configuration, and never generated at runtime.

pub mod chat;
pub mod header;
pub mod registry;

pub use chat::{
    ChatContent,
    ChatEnvelope,
    GuildChatNotify,
    PrivateChatNotify,
    TeamChatNotify,
    WorldChatNotify,
};
pub use header::{COMPRESSION_SNAPPY, FrameHeader};
pub use registry::{MessageRegistry, MessageSchema, RegistryError};

/// A chat line extracted from one frame body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Display name of the sender.
    pub sender_name: String,
    /// Chat text as sent.
    pub text: String,
}

impl DecodedMessage {
    /// Construct a message from its parts.
    #[must_use]
    pub fn new(sender_name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            sender_name: sender_name.into(),
            text: text.into(),
        }
    }
}
