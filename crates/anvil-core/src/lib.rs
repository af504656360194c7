//! # Anvil Core
//!
//! The collaborator boundary of the Anvil bot framework.
//!
//! Anvil never talks to a chat platform directly. Everything the command core
//! needs from the outside world is described here:
//!
//! - **Inbound**: [`InboundMessage`] with its [`User`], [`Channel`] and optional [`GuildId`]
//! - **Outbound**: [`Bot::send`]
//! - **Permissions**: [`Bot::has_permission`] / [`Bot::bot_has_permission`] over [`Permission`]
//!
//! ```text
//! ┌─────────────┐  InboundMessage  ┌────────────┐     ┌──────────┐
//! │   Adapter   │─────────────────▶│ Dispatcher │────▶│ Command  │
//! │ (platform)  │◀─────────────────│  (Anvil)   │     │   body   │
//! └─────────────┘   Bot::send      └────────────┘     └──────────┘
//! ```

pub mod bot;
pub mod error;
pub mod message;
pub mod permission;

pub use bot::{Bot, BoxedBot};
pub use error::{ApiError, ApiResult};
pub use message::{Channel, ChannelId, ChannelKind, GuildId, InboundMessage, SentMessage, User, UserId};
pub use permission::{Permission, UnknownPermission};

/// Prelude for common imports.
pub mod prelude {
    pub use super::bot::{Bot, BoxedBot};
    pub use super::message::*;
    pub use super::permission::Permission;
}
