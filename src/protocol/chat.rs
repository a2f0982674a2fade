//! Chat notification bodies.
//!
//! Every chat schema nests the sender and text under a `msg` sub-record of
//! type [`ChatContent`]; the surrounding fields differ per channel.

use prost::Message;

/// Sender and text shared by all chat notifications.
#[derive(Clone, PartialEq, Message)]
pub struct ChatContent {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, tag = "2")]
    pub text: String,
    #[prost(uint64, tag = "3")]
    pub sender_uid: u64,
    #[prost(int64, tag = "4")]
    pub timestamp: i64,
}

/// Body schemas that wrap a [`ChatContent`].
pub trait ChatEnvelope: Message + Default {
    /// Move the nested chat record out of the envelope.
    fn into_content(self) -> Option<ChatContent>;
}

#[derive(Clone, PartialEq, Message)]
pub struct WorldChatNotify {
    #[prost(message, optional, tag = "1")]
    pub msg: Option<ChatContent>,
    #[prost(uint32, tag = "2")]
    pub channel: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct TeamChatNotify {
    #[prost(message, optional, tag = "1")]
    pub msg: Option<ChatContent>,
    #[prost(uint64, tag = "2")]
    pub team_id: u64,
}

#[derive(Clone, PartialEq, Message)]
pub struct GuildChatNotify {
    #[prost(uint64, tag = "1")]
    pub guild_id: u64,
    #[prost(message, optional, tag = "2")]
    pub msg: Option<ChatContent>,
}

#[derive(Clone, PartialEq, Message)]
pub struct PrivateChatNotify {
    #[prost(message, optional, tag = "1")]
    pub msg: Option<ChatContent>,
    #[prost(uint64, tag = "2")]
    pub target_uid: u64,
}

macro_rules! chat_envelope {
    ($($ty:ty),+ $(,)?) => {
        $(impl ChatEnvelope for $ty {
            fn into_content(self) -> Option<ChatContent> { self.msg }
        })+
    };
}

chat_envelope!(WorldChatNotify, TeamChatNotify, GuildChatNotify, PrivateChatNotify);
