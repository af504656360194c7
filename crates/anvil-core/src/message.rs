//! Inbound message model.
//!
//! These types are the narrow view of the messaging platform that the
//! dispatch core consumes: who sent a message, where, and what it says.
//! Adapters convert their protocol events into an [`InboundMessage`].

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Creates a new identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Platform identifier of a user.
    UserId
);
id_type!(
    /// Platform identifier of a channel.
    ChannelId
);
id_type!(
    /// Platform identifier of a guild (server).
    GuildId
);

/// The author of a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// User identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Whether the author is an automated account.
    #[serde(default)]
    pub is_bot: bool,
}

impl User {
    /// Creates a human user.
    pub fn new(id: impl Into<UserId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_bot: false,
        }
    }
}

/// Whether a channel belongs to a guild or is a direct conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelKind {
    /// A text channel inside a guild.
    Guild,
    /// A direct (private) conversation.
    Direct,
}

/// The channel a message was posted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel identifier.
    pub id: ChannelId,
    /// Channel kind.
    pub kind: ChannelKind,
}

impl Channel {
    /// Creates a guild text channel.
    pub fn guild(id: impl Into<ChannelId>) -> Self {
        Self {
            id: id.into(),
            kind: ChannelKind::Guild,
        }
    }

    /// Creates a direct conversation channel.
    pub fn direct(id: impl Into<ChannelId>) -> Self {
        Self {
            id: id.into(),
            kind: ChannelKind::Direct,
        }
    }

    /// Returns `true` for direct conversations.
    pub fn is_direct(&self) -> bool {
        self.kind == ChannelKind::Direct
    }
}

/// A message received from the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Platform message identifier.
    pub id: String,
    /// Raw text content.
    pub content: String,
    /// Author identity.
    pub author: User,
    /// Channel the message was posted in.
    pub channel: Channel,
    /// Guild the channel belongs to, if any.
    pub guild: Option<GuildId>,
    /// Time the platform reported for the message.
    pub timestamp: SystemTime,
}

impl InboundMessage {
    /// Creates a message posted in a guild channel.
    pub fn in_guild(
        content: impl Into<String>,
        author: User,
        channel: impl Into<ChannelId>,
        guild: impl Into<GuildId>,
    ) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            author,
            channel: Channel::guild(channel),
            guild: Some(guild.into()),
            timestamp: SystemTime::now(),
        }
    }

    /// Creates a message posted in a direct conversation.
    pub fn direct(content: impl Into<String>, author: User, channel: impl Into<ChannelId>) -> Self {
        Self {
            id: String::new(),
            content: content.into(),
            author,
            channel: Channel::direct(channel),
            guild: None,
            timestamp: SystemTime::now(),
        }
    }

    /// Sets the platform message identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Returns `true` if the message was posted in a guild.
    pub fn in_guild_channel(&self) -> bool {
        self.guild.is_some() && !self.channel.is_direct()
    }
}

/// A message the platform accepted from the bot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    /// Platform message identifier.
    pub id: String,
    /// Channel the message was delivered to.
    pub channel: ChannelId,
    /// Delivered content.
    pub content: String,
}
