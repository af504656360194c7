//! Platform permissions checked by command constraints.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A permission a user (or the bot itself) may hold in a channel.
///
/// Serialized in kebab-case (`"manage-messages"`), which is also the form
/// accepted by [`FromStr`] and used in fragment manifests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    Administrator,
    ManageGuild,
    ManageChannels,
    ManageRoles,
    ManageMessages,
    KickMembers,
    BanMembers,
    SendMessages,
    EmbedLinks,
    AttachFiles,
    AddReactions,
    MentionEveryone,
    ReadMessageHistory,
    ViewChannel,
}

impl Permission {
    /// All known permissions.
    pub const ALL: [Permission; 14] = [
        Permission::Administrator,
        Permission::ManageGuild,
        Permission::ManageChannels,
        Permission::ManageRoles,
        Permission::ManageMessages,
        Permission::KickMembers,
        Permission::BanMembers,
        Permission::SendMessages,
        Permission::EmbedLinks,
        Permission::AttachFiles,
        Permission::AddReactions,
        Permission::MentionEveryone,
        Permission::ReadMessageHistory,
        Permission::ViewChannel,
    ];

    /// Returns the kebab-case name of the permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Administrator => "administrator",
            Permission::ManageGuild => "manage-guild",
            Permission::ManageChannels => "manage-channels",
            Permission::ManageRoles => "manage-roles",
            Permission::ManageMessages => "manage-messages",
            Permission::KickMembers => "kick-members",
            Permission::BanMembers => "ban-members",
            Permission::SendMessages => "send-messages",
            Permission::EmbedLinks => "embed-links",
            Permission::AttachFiles => "attach-files",
            Permission::AddReactions => "add-reactions",
            Permission::MentionEveryone => "mention-everyone",
            Permission::ReadMessageHistory => "read-message-history",
            Permission::ViewChannel => "view-channel",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown permission name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown permission '{0}'")]
pub struct UnknownPermission(pub String);

impl FromStr for Permission {
    type Err = UnknownPermission;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Permission::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| UnknownPermission(s.to_string()))
    }
}
