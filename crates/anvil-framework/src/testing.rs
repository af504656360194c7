//! In-memory bot used by the unit tests.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use anvil_core::{
    ApiResult, Bot, Channel, GuildId, InboundMessage, Permission, SentMessage, User, UserId,
};
use async_trait::async_trait;
use parking_lot::Mutex;

pub(crate) const BOT_ID: &str = "42";

pub(crate) struct MockBot {
    sent: Mutex<Vec<(Channel, String)>>,
    granted: HashSet<(String, Permission)>,
    granted_self: HashSet<Permission>,
}

impl MockBot {
    pub(crate) fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            granted: HashSet::new(),
            granted_self: HashSet::new(),
        }
    }

    pub(crate) fn grant(mut self, user: &str, permission: Permission) -> Self {
        self.granted.insert((user.to_string(), permission));
        self
    }

    pub(crate) fn grant_self(mut self, permission: Permission) -> Self {
        self.granted_self.insert(permission);
        self
    }

    /// Contents of every sent message, in order.
    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(_, c)| c.clone()).collect()
    }
}

#[async_trait]
impl Bot for MockBot {
    fn id(&self) -> &str {
        BOT_ID
    }

    async fn send(&self, channel: &Channel, content: &str) -> ApiResult<Option<SentMessage>> {
        let mut sent = self.sent.lock();
        sent.push((channel.clone(), content.to_string()));
        Ok(Some(SentMessage {
            id: sent.len().to_string(),
            channel: channel.id.clone(),
            content: content.to_string(),
        }))
    }

    async fn has_permission(
        &self,
        user: &UserId,
        _channel: &Channel,
        _guild: Option<&GuildId>,
        permission: Permission,
    ) -> bool {
        self.granted
            .contains(&(user.as_str().to_string(), permission))
    }

    async fn bot_has_permission(
        &self,
        _channel: &Channel,
        _guild: Option<&GuildId>,
        permission: Permission,
    ) -> bool {
        self.granted_self.contains(&permission)
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A guild message from `author`.
pub(crate) fn guild_message(author: &str, content: &str) -> Arc<InboundMessage> {
    Arc::new(InboundMessage::in_guild(
        content,
        User::new(author, author),
        "c1",
        "g1",
    ))
}
