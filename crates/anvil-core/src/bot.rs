//! Bot trait and related types.
//!
//! This module defines the `Bot` trait, the single capability object through
//! which the framework talks back to the messaging platform: sending replies
//! and answering permission questions for the constraint gate.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ApiResult;
use crate::message::{Channel, GuildId, SentMessage, UserId};
use crate::permission::Permission;

/// The core Bot trait.
///
/// A Bot is an active, connected platform client. Concrete implementations
/// live in adapter crates; the framework only relies on this surface.
///
/// # API Design
///
/// - `send`: deliver text to a channel, `None` when the platform accepted the
///   request but returned no message
/// - `has_permission` / `bot_has_permission`: permission lookups for the
///   issuer and for the bot itself
#[async_trait]
pub trait Bot: Send + Sync + 'static {
    /// Returns the bot's own user identifier.
    ///
    /// Used to recognise mention prefixes (`<@id>`).
    fn id(&self) -> &str;

    /// Sends a text message to a channel.
    async fn send(&self, channel: &Channel, content: &str) -> ApiResult<Option<SentMessage>>;

    /// Returns whether `user` holds `permission` in `channel`.
    async fn has_permission(
        &self,
        user: &UserId,
        channel: &Channel,
        guild: Option<&GuildId>,
        permission: Permission,
    ) -> bool;

    /// Returns whether the bot itself holds `permission` in `channel`.
    async fn bot_has_permission(
        &self,
        channel: &Channel,
        guild: Option<&GuildId>,
        permission: Permission,
    ) -> bool;

    /// Returns self as an `Arc<dyn Any>` for safe downcasting.
    ///
    /// Implementors should simply return `self`.
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// A shared Bot trait object.
pub type BoxedBot = Arc<dyn Bot>;
