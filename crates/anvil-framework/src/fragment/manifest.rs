//! Fragment manifest files (`*.fragment.toml`).
//!
//! A manifest names a [`Catalog`](super::Catalog) entry and the kind it is
//! expected to be. Optional `[meta]` and `[command]` tables override what the
//! entry declares; they are turned into decorators and layered on top.
//!
//! ```toml
//! kind = "command"
//! entry = "ping"
//!
//! [meta]
//! description = "Replies with pong."
//!
//! [command]
//! aliases = ["p"]
//! cooldown_secs = 5
//! environment = "guild"
//! ```
//!
//! The whole document may also be nested under a `[default]` table.

use std::collections::BTreeSet;
use std::time::Duration;

use anvil_core::Permission;
use serde::{Deserialize, Serialize};

use super::FragmentKind;
use crate::command::constraint::Environment;
use crate::command::decorator::{self, Decorator};

/// Overrides of the fragment metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetaOverrides {
    /// Fragment name.
    pub name: Option<String>,
    /// Description.
    pub description: Option<String>,
    /// Author.
    pub author: Option<String>,
    /// Version string.
    pub version: Option<String>,
}

/// Overrides that only apply to commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CommandOverrides {
    /// Extra aliases.
    pub aliases: Vec<String>,
    /// Cooldown in seconds.
    pub cooldown_secs: Option<u64>,
    /// Required environment.
    pub environment: Option<Environment>,
    /// Allowed user groups.
    pub user_groups: Vec<String>,
    /// Permissions the issuer must hold.
    pub issuer_permissions: Vec<Permission>,
    /// Permissions the bot must hold.
    pub self_permissions: Vec<Permission>,
    /// Required services.
    pub depends_on: Vec<String>,
    /// Registers the command disabled.
    pub disabled: bool,
}

/// A parsed fragment manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Expected kind of the catalog entry.
    pub kind: FragmentKind,
    /// Catalog entry name.
    pub entry: String,
    /// `[meta]` table.
    #[serde(default)]
    pub meta: MetaOverrides,
    /// `[command]` table; only valid for commands.
    #[serde(default)]
    pub command: Option<CommandOverrides>,
}

impl Manifest {
    /// Parses a manifest, unwrapping a `[default]` table when present.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let mut table: toml::Table = text.parse()?;
        if let Some(toml::Value::Table(inner)) = table.get("default").cloned() {
            table = inner;
        }
        toml::Value::Table(table).try_into()
    }

    /// Translates the overrides into decorators, meta first.
    pub fn decorators(&self) -> Vec<Decorator> {
        let mut decorators = Vec::new();

        let meta = &self.meta;
        if let Some(name) = &meta.name {
            decorators.push(decorator::name(name.clone()));
        }
        if let Some(desc) = &meta.description {
            decorators.push(decorator::description(desc.clone()));
        }
        if let Some(author) = &meta.author {
            decorators.push(decorator::author(author.clone()));
        }
        if let Some(version) = &meta.version {
            decorators.push(decorator::version(version.clone()));
        }

        let Some(cmd) = &self.command else {
            return decorators;
        };

        if !cmd.aliases.is_empty() {
            decorators.push(decorator::aliases(cmd.aliases.iter().cloned()));
        }
        if let Some(secs) = cmd.cooldown_secs {
            decorators.push(decorator::cooldown(Duration::from_secs(secs)));
        }
        if let Some(env) = cmd.environment {
            decorators.push(decorator::environment(env));
        }
        if !cmd.user_groups.is_empty() {
            decorators.push(decorator::user_groups(cmd.user_groups.iter().cloned()));
        }
        if !cmd.issuer_permissions.is_empty() {
            decorators.push(Decorator::IssuerPermissions(
                cmd.issuer_permissions.iter().copied().collect::<BTreeSet<_>>(),
            ));
        }
        if !cmd.self_permissions.is_empty() {
            decorators.push(Decorator::SelfPermissions(
                cmd.self_permissions.iter().copied().collect::<BTreeSet<_>>(),
            ));
        }
        if !cmd.depends_on.is_empty() {
            decorators.push(decorator::depends_on(cmd.depends_on.iter().cloned()));
        }
        if cmd.disabled {
            decorators.push(decorator::disabled());
        }

        decorators
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_manifest() {
        let manifest = Manifest::parse("kind = \"command\"\nentry = \"ping\"\n").unwrap();
        assert_eq!(manifest.kind, FragmentKind::Command);
        assert_eq!(manifest.entry, "ping");
        assert!(manifest.command.is_none());
        assert!(manifest.decorators().is_empty());
    }

    #[test]
    fn test_default_table_is_unwrapped() {
        let text = r#"
            [default]
            kind = "forked-service"
            entry = "stats"

            [default.meta]
            description = "Counts things."
        "#;
        let manifest = Manifest::parse(text).unwrap();
        assert_eq!(manifest.kind, FragmentKind::ForkedService);
        assert_eq!(manifest.meta.description.as_deref(), Some("Counts things."));
    }

    #[test]
    fn test_command_overrides_become_decorators() {
        let text = r#"
            kind = "command"
            entry = "ban"

            [meta]
            version = "2.0.0"

            [command]
            aliases = ["b"]
            cooldown_secs = 10
            environment = "guild"
            issuer_permissions = ["ban-members"]
            depends_on = ["audit"]
            disabled = true
        "#;
        let manifest = Manifest::parse(text).unwrap();
        let labels: Vec<_> = manifest.decorators().iter().map(Decorator::label).collect();
        assert_eq!(
            labels,
            vec![
                "version",
                "aliases",
                "cooldown",
                "environment",
                "issuer_permissions",
                "depends_on",
                "disabled"
            ]
        );
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(Manifest::parse("kind = \"command\"\nentry = \"x\"\ncooldown = 3\n").is_err());
        assert!(Manifest::parse("kind = \"widget\"\nentry = \"x\"\n").is_err());
        assert!(Manifest::parse("entry = \"x\"\n").is_err());
    }
}
