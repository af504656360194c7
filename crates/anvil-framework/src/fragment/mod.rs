//! Fragments: the unit the loader discovers and the manager enables.
//!
//! Every fragment carries [`FragmentMeta`]. What else it carries depends on
//! its [`FragmentKind`]:
//!
//! - **Command**: a [`CommandSpec`](crate::command::CommandSpec) plus handler
//! - **Service**: a long-lived object built with the shared bot reference
//! - **ForkedService**: a detached service built without a bot reference
//! - **Task**: a periodic job
//!
//! The kind is an explicit discriminant on every [`Package`] and manifest so
//! the manager can match on it exhaustively.

use std::fmt;
use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod manifest;
pub mod package;

pub use catalog::Catalog;
pub use manifest::{CommandOverrides, Manifest, MetaOverrides};
pub use package::{
    CommandFactory, CommandPackage, ForkedServiceFactory, ForkedServicePackage, Package,
    ServiceFactory, ServicePackage, TaskFactory, TaskPackage,
};

/// Maximum length (in characters) of a fragment name.
pub const MAX_NAME_LENGTH: usize = 100;

/// Maximum length (in characters) of a fragment description.
pub const MAX_DESCRIPTION_LENGTH: usize = 100;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"^(?:[a-z]*[a-z0-9\-_]+){2,50}$")
        .case_insensitive(true)
        .build()
        .expect("fragment name pattern is valid")
});

static DESCRIPTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\P{Cc}*$").expect("description pattern is valid"));

/// Descriptive metadata shared by every fragment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FragmentMeta {
    /// Unique name within the fragment's registry.
    pub name: String,
    /// One-line description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl FragmentMeta {
    /// Creates metadata with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Sets the version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// The fragment variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FragmentKind {
    /// A chat command.
    Command,
    /// A service sharing the bot reference.
    Service,
    /// A detached service with no bot reference.
    ForkedService,
    /// A periodic task.
    Task,
}

impl FragmentKind {
    /// Returns the kebab-case name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FragmentKind::Command => "command",
            FragmentKind::Service => "service",
            FragmentKind::ForkedService => "forked-service",
            FragmentKind::Task => "task",
        }
    }
}

impl fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Checks fragment metadata against the naming rules.
///
/// Returns `false` when the name is empty, longer than [`MAX_NAME_LENGTH`],
/// or fails the name pattern (letters, digits, `-` and `_`, at least two
/// characters, no whitespace), or when the description is longer than
/// [`MAX_DESCRIPTION_LENGTH`] or contains control characters.
pub fn validate(meta: &FragmentMeta) -> bool {
    let name = meta.name.as_str();
    if name.is_empty() || name.chars().count() > MAX_NAME_LENGTH || !NAME_PATTERN.is_match(name) {
        return false;
    }

    match &meta.description {
        Some(desc) => {
            desc.chars().count() <= MAX_DESCRIPTION_LENGTH && DESCRIPTION_PATTERN.is_match(desc)
        }
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_valid() {
        assert!(validate(&FragmentMeta::new("ping")));
        assert!(validate(&FragmentMeta::new("Server-Info_2")));
    }

    #[test]
    fn test_empty_name() {
        assert!(!validate(&FragmentMeta::new("")));
    }

    #[test]
    fn test_single_char_name() {
        assert!(!validate(&FragmentMeta::new("p")));
    }

    #[test]
    fn test_name_too_long() {
        assert!(!validate(&FragmentMeta::new("a".repeat(101))));
        assert!(validate(&FragmentMeta::new("a".repeat(100))));
    }

    #[test]
    fn test_name_with_whitespace() {
        assert!(!validate(&FragmentMeta::new("ping pong")));
        assert!(!validate(&FragmentMeta::new("ping\t")));
    }

    #[test]
    fn test_name_with_symbols() {
        assert!(!validate(&FragmentMeta::new("ping!")));
        assert!(!validate(&FragmentMeta::new("pïng")));
    }

    #[test]
    fn test_description_rules() {
        let ok = FragmentMeta::new("ping").with_description("Replies with pong.");
        assert!(validate(&ok));

        let long = FragmentMeta::new("ping").with_description("x".repeat(101));
        assert!(!validate(&long));

        let control = FragmentMeta::new("ping").with_description("line\nbreak");
        assert!(!validate(&control));
    }
}
