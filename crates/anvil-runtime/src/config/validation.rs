//! Configuration validation utilities.

use regex::Regex;

use super::error::{ConfigError, ConfigResult};
use super::schema::{AnvilConfig, BotConfig, FragmentsConfig, LogOutput, LoggingConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &AnvilConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_groups(config)?;
    validate_fragments_config(&config.fragments)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

/// Validates command recognition settings.
fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.prefixes.is_empty() && !bot.mention_prefix {
        return Err(ConfigError::validation(
            "At least one prefix is required when mention prefixes are disabled",
        ));
    }

    for prefix in &bot.prefixes {
        if prefix.trim().is_empty() {
            return Err(ConfigError::invalid_prefix(prefix, "prefix is empty"));
        }
        if prefix.starts_with(char::is_whitespace) {
            return Err(ConfigError::invalid_prefix(
                prefix,
                "prefix may not start with whitespace",
            ));
        }
        if prefix.trim_end().chars().any(char::is_whitespace) {
            return Err(ConfigError::invalid_prefix(
                prefix,
                "prefix may not contain whitespace",
            ));
        }
    }

    for name in &bot.internal_commands {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Invalid internal command name: {name:?}"
            )));
        }
    }

    Ok(())
}

/// Validates that every group referenced by the defaults exists.
fn validate_groups(config: &AnvilConfig) -> ConfigResult<()> {
    for group in &config.constraints.user_groups {
        if !config.groups.contains_key(group) {
            return Err(ConfigError::validation(format!(
                "Default user group '{group}' is not defined in [groups]"
            )));
        }
    }
    for (group, members) in &config.groups {
        if members.iter().any(|id| id.trim().is_empty()) {
            return Err(ConfigError::validation(format!(
                "Group '{group}' contains an empty user id"
            )));
        }
    }
    Ok(())
}

/// Validates fragment discovery settings.
fn validate_fragments_config(fragments: &FragmentsConfig) -> ConfigResult<()> {
    Regex::new(&fragments.pattern).map_err(|e| ConfigError::InvalidPattern {
        pattern: fragments.pattern.clone(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Validates logging settings.
fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::validation(
            "logging.file_path is required when logging.output is \"file\"",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&AnvilConfig::default()).is_ok());
    }

    #[test]
    fn test_no_prefix_without_mention() {
        let mut config = AnvilConfig::default();
        config.bot.prefixes.clear();
        assert!(validate_config(&config).is_ok());

        config.bot.mention_prefix = false;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_prefix_whitespace() {
        let mut config = AnvilConfig::default();

        config.bot.prefixes = vec!["bot ".into()];
        assert!(validate_config(&config).is_ok());

        for bad in ["", "  ", " !", "a b"] {
            config.bot.prefixes = vec![bad.into()];
            assert!(
                matches!(validate_config(&config), Err(ConfigError::InvalidPrefix { .. })),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn test_invalid_pattern() {
        let mut config = AnvilConfig::default();
        config.fragments.pattern = "(".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_undefined_default_group() {
        let mut config = AnvilConfig::default();
        config.constraints.user_groups.insert("admins".into());
        assert!(validate_config(&config).is_err());

        config.groups.insert("admins".into(), vec!["100".into()]);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_file_output_requires_path() {
        let mut config = AnvilConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some(PathBuf::from("anvil.log"));
        assert!(validate_config(&config).is_ok());
    }
}
