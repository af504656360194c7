//! # Anvil
//!
//! A fragment-based chat bot framework: commands, services and periodic
//! tasks are declared in Rust, described by `*.fragment.toml` manifests and
//! loaded, reloaded and released at runtime.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌────────────┐     ┌───────────────────┐     ┌─────────┐
//! │   Adapter   │────▶│  Runtime   │────▶│    Dispatcher     │────▶│ Command │
//! │ (your code) │     │            │     │ parse → gate →    │     └─────────┘
//! └─────────────┘     │ task loops │     │ args → guards →   │
//!                     │ console    │     │ run → relays      │
//!                     └────────────┘     └───────────────────┘
//!                           │
//!                           ▼
//!                     ┌────────────┐     ┌────────────┐
//!                     │  Manager   │────▶│   Loader   │──▶ manifests + catalog
//!                     └────────────┘     └────────────┘
//! ```
//!
//! - **Core**: the `Bot` capability trait and message types
//! - **Framework**: fragments, commands, constraints, dispatch
//! - **Runtime**: configuration, logging, lifecycle, console
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use anvil::prelude::*;
//!
//! let catalog = Catalog::new().command("ping", || {
//!     Command::from_fn(CommandSpec::new("ping"), |ctx| async move {
//!         ctx.reply("pong").await?;
//!         Ok(())
//!     })
//! });
//!
//! let runtime = AnvilRuntime::builder(bot, catalog).build()?;
//! runtime.run().await?;
//! ```
//!
//! ## Features
//!
//! - `builtin`: the built-in `help` command (default)
//! - `toml-config`: TOML configuration files (default)
//! - `yaml-config`: YAML configuration files
//! - `json-log`: JSON log output

pub use anvil_core as core;
pub use anvil_framework as framework;
pub use anvil_runtime as runtime;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use anvil::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use anvil_runtime::{AnvilConfig, AnvilRuntime};

    // Fragments, commands, services and tasks
    pub use anvil_framework::prelude::*;
    pub use anvil_framework::{DispatchOutcome, FragmentManager};

    // Bot types - for talking back to the platform
    pub use anvil_core::{Bot, BoxedBot, InboundMessage, Permission, User};
}
