//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use anvil_framework::ConstraintDefaults;
use anvil_framework::loader::DEFAULT_PATTERN;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnvilConfig {
    /// Command recognition and reply behaviour.
    pub bot: BotConfig,

    /// Constraint defaults merged under every command.
    pub constraints: ConstraintDefaults,

    /// Named user groups: group name → user ids.
    pub groups: BTreeMap<String, Vec<String>>,

    /// Where fragments are loaded from.
    pub fragments: FragmentsConfig,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Command recognition settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Message prefixes that introduce a command.
    pub prefixes: Vec<String>,

    /// Accept a mention of the bot as a prefix.
    pub mention_prefix: bool,

    /// Names internal commands are allowed to have.
    pub internal_commands: Vec<String>,

    /// Reply to constraint, argument, guard and execution failures.
    pub reply_errors: bool,

    /// Reply to unknown commands.
    pub reply_unknown: bool,

    /// Ignore messages from other bots.
    pub ignore_bots: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefixes: vec!["!".to_string()],
            mention_prefix: true,
            internal_commands: vec!["help".to_string()],
            reply_errors: true,
            reply_unknown: false,
            ignore_bots: true,
        }
    }
}

/// Fragment discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FragmentsConfig {
    /// Directories of user fragments.
    pub directories: Vec<PathBuf>,

    /// Directories of internal fragments.
    pub internal_directories: Vec<PathBuf>,

    /// Descend into subdirectories.
    pub recursive: bool,

    /// File name pattern of fragment manifests.
    pub pattern: String,
}

impl Default for FragmentsConfig {
    fn default() -> Self {
        Self {
            directories: vec![PathBuf::from("fragments")],
            internal_directories: Vec::new(),
            recursive: true,
            pattern: DEFAULT_PATTERN.to_string(),
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Returns the lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to a `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

/// Log destination.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// Rotation of the log file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    /// Span created.
    pub new: bool,
    /// Span entered.
    pub enter: bool,
    /// Span exited.
    pub exit: bool,
    /// Span closed, with its timings.
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level.
    pub level: LogLevel,

    /// Line format.
    pub format: LogFormat,

    /// Destination.
    pub output: LogOutput,

    /// Span events to log.
    pub span_events: SpanEventConfig,

    /// Include thread ids.
    pub thread_ids: bool,

    /// Include file and line.
    pub file_location: bool,

    /// Log file, used when `output` is `file`.
    pub file_path: Option<PathBuf>,

    /// Log file rotation.
    pub rotation: LogRotation,

    /// Per-module levels, e.g. `anvil_framework = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::Never,
            filters: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_core::Permission;

    #[test]
    fn test_defaults() {
        let config = AnvilConfig::default();
        assert_eq!(config.bot.prefixes, vec!["!"]);
        assert!(config.bot.mention_prefix);
        assert_eq!(config.bot.internal_commands, vec!["help"]);
        assert_eq!(config.fragments.pattern, DEFAULT_PATTERN);
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_partial_toml() {
        let config: AnvilConfig = toml::from_str(
            r#"
            [bot]
            prefixes = ["?", "bot "]

            [constraints]
            cooldown_secs = 2
            issuer_permissions = ["send-messages"]

            [groups]
            admins = ["100", "200"]

            [logging]
            level = "debug"
            filters = { anvil_framework = "trace" }
            "#,
        )
        .unwrap();

        assert_eq!(config.bot.prefixes, vec!["?", "bot "]);
        assert!(config.bot.reply_errors);
        assert_eq!(config.constraints.cooldown_secs, 2);
        assert!(
            config
                .constraints
                .issuer_permissions
                .contains(&Permission::SendMessages)
        );
        assert_eq!(config.groups["admins"], vec!["100", "200"]);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filters["anvil_framework"], LogLevel::Trace);
    }
}
