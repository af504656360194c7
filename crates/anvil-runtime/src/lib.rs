//! Anvil Runtime - Orchestration layer for the Anvil bot framework.
//!
//! This crate provides:
//! - Layered configuration (`anvil.toml`, profiles, `ANVIL_*` environment)
//! - Runtime orchestration (`AnvilRuntime`): fragment loading, task loops,
//!   message routing and shutdown
//! - An operator console
//! - Logging configuration
//!
//! ```ignore
//! use anvil_runtime::AnvilRuntime;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runtime = AnvilRuntime::builder(bot, catalog).build()?;
//!
//!     // Adapter feeds messages through `runtime.handle_message(..)`.
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{AnvilConfig, BotConfig, ConfigError, ConfigLoader, ConfigResult, Profile};
pub use console::{ConsoleReply, run_console};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{AnvilRuntime, RuntimeBuilder};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
