//! Configuration module for the Anvil runtime.
//!
//! Layered loading through figment (see [`loader`]) into the [`AnvilConfig`]
//! schema, followed by [`validate_config`].

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    AnvilConfig, BotConfig, FragmentsConfig, LogFormat, LogLevel, LogOutput, LogRotation,
    LoggingConfig, SpanEventConfig,
};
pub use validation::validate_config;
