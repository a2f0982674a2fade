//! Static message-id table mapping ids to named body schemas.

use std::collections::HashMap;

use prost::DecodeError;
use thiserror::Error;

use super::{
    ChatEnvelope,
    DecodedMessage,
    GuildChatNotify,
    PrivateChatNotify,
    TeamChatNotify,
    WorldChatNotify,
};

type DecodeFn = fn(&[u8]) -> Result<DecodedMessage, DecodeError>;

/// Known schemas, addressed by name.
const SCHEMAS: &[(&str, DecodeFn)] = &[
    ("WorldChatNotify", decode_chat::<WorldChatNotify>),
    ("TeamChatNotify", decode_chat::<TeamChatNotify>),
    ("GuildChatNotify", decode_chat::<GuildChatNotify>),
    ("PrivateChatNotify", decode_chat::<PrivateChatNotify>),
];

/// Default message ids for the known schemas.
pub const DEFAULT_MESSAGE_IDS: &[(u32, &str)] = &[
    (2601, "WorldChatNotify"),
    (2603, "TeamChatNotify"),
    (2605, "GuildChatNotify"),
    (2611, "PrivateChatNotify"),
];

fn decode_chat<T: ChatEnvelope>(body: &[u8]) -> Result<DecodedMessage, DecodeError> {
    let content = T::decode(body)?.into_content().unwrap_or_default();
    Ok(DecodedMessage {
        sender_name: content.name,
        text: content.text,
    })
}

/// Errors raised while building a [`MessageRegistry`].
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The named schema is not compiled into this build.
    #[error("unknown message schema: {0}")]
    UnknownSchema(String),
}

/// A resolved body schema.
#[derive(Clone, Copy, Debug)]
pub struct MessageSchema {
    name: &'static str,
    decode: DecodeFn,
}

impl MessageSchema {
    fn by_name(name: &str) -> Option<Self> {
        SCHEMAS
            .iter()
            .find(|(schema, _)| *schema == name)
            .map(|&(name, decode)| Self { name, decode })
    }

    /// Schema name as it appears in the protocol definition.
    #[must_use]
    pub fn name(&self) -> &'static str { self.name }

    /// Decode a (decompressed) body with this schema.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] when the body is not a valid instance of the
    /// schema.
    pub fn decode(&self, body: &[u8]) -> Result<DecodedMessage, DecodeError> { (self.decode)(body) }
}

/// Lookup table from message id to body schema.
#[derive(Clone, Debug, Default)]
pub struct MessageRegistry {
    by_id: HashMap<u32, MessageSchema>,
}

impl MessageRegistry {
    /// A registry that resolves no ids.
    #[must_use]
    pub fn empty() -> Self { Self::default() }

    /// The registry populated from [`DEFAULT_MESSAGE_IDS`].
    #[must_use]
    pub fn builtin() -> Self {
        let by_id = DEFAULT_MESSAGE_IDS
            .iter()
            .filter_map(|&(id, name)| MessageSchema::by_name(name).map(|schema| (id, schema)))
            .collect();
        Self { by_id }
    }

    /// Start from the built-in table and re-key the named schemas.
    ///
    /// Each override replaces every id previously bound to that schema.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownSchema`] if an override names a schema
    /// that does not exist.
    pub fn with_overrides<'a, I>(overrides: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = (&'a str, u32)>,
    {
        let mut registry = Self::builtin();
        for (name, id) in overrides {
            registry.by_id.retain(|_, schema| schema.name != name);
            registry.register(id, name)?;
        }
        Ok(registry)
    }

    /// Bind `id` to the schema called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownSchema`] if `name` is not a known schema.
    pub fn register(&mut self, id: u32, name: &str) -> Result<(), RegistryError> {
        let schema =
            MessageSchema::by_name(name).ok_or_else(|| RegistryError::UnknownSchema(name.to_owned()))?;
        self.by_id.insert(id, schema);
        Ok(())
    }

    /// Resolve a header's message id.
    #[must_use]
    pub fn resolve(&self, id: u32) -> Option<&MessageSchema> { self.by_id.get(&id) }

    /// Number of bound ids.
    #[must_use]
    pub fn len(&self) -> usize { self.by_id.len() }

    /// Whether no ids are bound.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.by_id.is_empty() }
}
