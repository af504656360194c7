//! Decorators: single-field transforms folded over a spec.
//!
//! Each constructor in this module returns a [`Decorator`] value. Applying it
//! with [`Decoratable::decorate`] yields a new spec with exactly one property
//! overridden (meta fields, environment, cooldown, `disabled`) or appended to
//! (aliases, arguments, list constraints, dependencies, guards, relays).
//!
//! Because every application receives the fully merged result of the layers
//! before it, additive fields always equal the concatenation of every layer
//! and single-value fields always hold the last applied value.
//!
//! Meta decorators (`name`, `description`, `author`, `version`) apply to every
//! fragment kind. Everything else only applies to commands.

use std::collections::BTreeSet;
use std::time::Duration;

use anvil_core::Permission;

use super::argument::{Argument, validate_schema};
use super::constraint::{Environment, ExclusiveCheck};
use super::guard::{Guard, Relay};
use super::CommandSpec;
use crate::error::DecoratorError;
use crate::fragment::{FragmentKind, FragmentMeta};

/// One field transform.
#[derive(Debug, Clone)]
pub enum Decorator {
    /// Replaces the name.
    Name(String),
    /// Replaces the description.
    Description(String),
    /// Replaces the author.
    Author(String),
    /// Replaces the version.
    Version(String),
    /// Adds aliases, skipping ones already present.
    Aliases(Vec<String>),
    /// Appends arguments and revalidates the schema.
    Arguments(Vec<Argument>),
    /// Sets the environment.
    Environment(Environment),
    /// Sets the cooldown.
    Cooldown(Duration),
    /// Adds allowed user groups.
    UserGroups(BTreeSet<String>),
    /// Adds a custom predicate.
    Exclusive(ExclusiveCheck),
    /// Adds issuer permissions.
    IssuerPermissions(BTreeSet<Permission>),
    /// Adds bot permissions.
    SelfPermissions(BTreeSet<Permission>),
    /// Adds required services.
    DependsOn(BTreeSet<String>),
    /// Adds a guard unless one with the same name exists.
    Guard(Guard),
    /// Appends a relay.
    Connect(Relay),
    /// Marks the command disabled.
    Disabled,
}

impl Decorator {
    /// Label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Decorator::Name(_) => "name",
            Decorator::Description(_) => "description",
            Decorator::Author(_) => "author",
            Decorator::Version(_) => "version",
            Decorator::Aliases(_) => "aliases",
            Decorator::Arguments(_) => "arguments",
            Decorator::Environment(_) => "environment",
            Decorator::Cooldown(_) => "cooldown",
            Decorator::UserGroups(_) => "user_groups",
            Decorator::Exclusive(_) => "exclusive",
            Decorator::IssuerPermissions(_) => "issuer_permissions",
            Decorator::SelfPermissions(_) => "self_permissions",
            Decorator::DependsOn(_) => "depends_on",
            Decorator::Guard(_) => "guard",
            Decorator::Connect(_) => "connect",
            Decorator::Disabled => "disabled",
        }
    }

    /// Returns `true` for decorators that apply to every fragment kind.
    pub fn is_meta(&self) -> bool {
        matches!(
            self,
            Decorator::Name(_)
                | Decorator::Description(_)
                | Decorator::Author(_)
                | Decorator::Version(_)
        )
    }

    /// Applies a meta decorator to a non-command fragment.
    pub(crate) fn apply_meta_only(
        self,
        meta: &mut FragmentMeta,
        target: FragmentKind,
    ) -> Result<(), DecoratorError> {
        match self {
            Decorator::Name(name) => meta.name = name,
            Decorator::Description(desc) => meta.description = Some(desc),
            Decorator::Author(author) => meta.author = Some(author),
            Decorator::Version(version) => meta.version = Some(version),
            other => {
                return Err(DecoratorError::InvalidDecoratorTarget {
                    decorator: other.label(),
                    target,
                });
            }
        }
        Ok(())
    }
}

/// Something decorators can be folded over.
pub trait Decoratable: Sized {
    /// Kind of fragment, for error reporting.
    fn kind(&self) -> FragmentKind;

    /// Applies one decorator.
    fn decorate(self, decorator: Decorator) -> Result<Self, DecoratorError>;

    /// Applies decorators left to right.
    fn decorate_all<I>(self, decorators: I) -> Result<Self, DecoratorError>
    where
        I: IntoIterator<Item = Decorator>,
    {
        decorators
            .into_iter()
            .try_fold(self, |spec, decorator| spec.decorate(decorator))
    }
}

fn extend_set<T: Ord>(slot: &mut Option<BTreeSet<T>>, values: BTreeSet<T>) {
    slot.get_or_insert_with(BTreeSet::new).extend(values);
}

impl Decoratable for CommandSpec {
    fn kind(&self) -> FragmentKind {
        FragmentKind::Command
    }

    fn decorate(mut self, decorator: Decorator) -> Result<Self, DecoratorError> {
        match decorator {
            Decorator::Name(name) => self.meta.name = name,
            Decorator::Description(desc) => self.meta.description = Some(desc),
            Decorator::Author(author) => self.meta.author = Some(author),
            Decorator::Version(version) => self.meta.version = Some(version),
            Decorator::Aliases(aliases) => {
                for alias in aliases {
                    if !self.aliases.iter().any(|a| a.eq_ignore_ascii_case(&alias)) {
                        self.aliases.push(alias);
                    }
                }
            }
            Decorator::Arguments(args) => {
                self.args.extend(args);
                validate_schema(&self.args)?;
            }
            Decorator::Environment(env) => self.constraints.environment = Some(env),
            Decorator::Cooldown(duration) => self.constraints.cooldown = Some(duration),
            Decorator::UserGroups(groups) => extend_set(&mut self.constraints.user_groups, groups),
            Decorator::Exclusive(check) => self
                .constraints
                .exclusive
                .get_or_insert_with(Vec::new)
                .push(check),
            Decorator::IssuerPermissions(perms) => {
                extend_set(&mut self.constraints.issuer_permissions, perms)
            }
            Decorator::SelfPermissions(perms) => {
                extend_set(&mut self.constraints.self_permissions, perms)
            }
            Decorator::DependsOn(services) => self.depends_on.extend(services),
            Decorator::Guard(guard) => {
                if !self.guards.iter().any(|g| g.name() == guard.name()) {
                    self.guards.push(guard);
                }
            }
            Decorator::Connect(relay) => self.connections.push(relay),
            Decorator::Disabled => self.enabled = false,
        }

        Ok(self)
    }
}

// =============================================================================
// Constructors
// =============================================================================

/// Overrides the fragment name.
pub fn name(name: impl Into<String>) -> Decorator {
    Decorator::Name(name.into())
}

/// Overrides the description.
pub fn description(description: impl Into<String>) -> Decorator {
    Decorator::Description(description.into())
}

/// Overrides the author.
pub fn author(author: impl Into<String>) -> Decorator {
    Decorator::Author(author.into())
}

/// Overrides the version.
pub fn version(version: impl Into<String>) -> Decorator {
    Decorator::Version(version.into())
}

/// Appends aliases.
pub fn aliases<I, S>(aliases: I) -> Decorator
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Decorator::Aliases(aliases.into_iter().map(Into::into).collect())
}

/// Appends arguments.
pub fn arguments(args: impl IntoIterator<Item = Argument>) -> Decorator {
    Decorator::Arguments(args.into_iter().collect())
}

/// Restricts where the command may be used.
pub fn environment(environment: Environment) -> Decorator {
    Decorator::Environment(environment)
}

/// Sets the per-user cooldown.
pub fn cooldown(duration: Duration) -> Decorator {
    Decorator::Cooldown(duration)
}

/// Appends user groups.
pub fn user_groups<I, S>(groups: I) -> Decorator
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Decorator::UserGroups(groups.into_iter().map(Into::into).collect())
}

/// Appends an exclusive predicate.
pub fn exclusive(check: ExclusiveCheck) -> Decorator {
    Decorator::Exclusive(check)
}

/// Appends permissions the issuer must hold.
pub fn issuer_permissions(permissions: impl IntoIterator<Item = Permission>) -> Decorator {
    Decorator::IssuerPermissions(permissions.into_iter().collect())
}

/// Appends permissions the bot must hold.
pub fn self_permissions(permissions: impl IntoIterator<Item = Permission>) -> Decorator {
    Decorator::SelfPermissions(permissions.into_iter().collect())
}

/// Appends required services.
pub fn depends_on<I, S>(services: I) -> Decorator
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Decorator::DependsOn(services.into_iter().map(Into::into).collect())
}

/// Appends a guard.
pub fn guard(guard: Guard) -> Decorator {
    Decorator::Guard(guard)
}

/// Appends a relay.
pub fn connect(relay: Relay) -> Decorator {
    Decorator::Connect(relay)
}

/// Disables the command.
pub fn disabled() -> Decorator {
    Decorator::Disabled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::argument::ArgumentType;
    use crate::error::SchemaError;
    use crate::task::TaskSpec;

    fn layers() -> Vec<Decorator> {
        vec![
            aliases(["p"]),
            depends_on(["stats"]),
            guard(Guard::sync("owner", |_| true)),
            connect(Relay::new("log", |_| async { Ok(()) })),
            aliases(["pg", "P"]),
            depends_on(["db"]),
            guard(Guard::sync("staff", |_| true)),
            connect(Relay::new("log", |_| async { Ok(()) })),
        ]
    }

    #[test]
    fn test_additive_fields_concatenate() {
        let spec = CommandSpec::new("ping").decorate_all(layers()).unwrap();
        assert_eq!(spec.aliases, vec!["p", "pg"]);
        assert_eq!(
            spec.depends_on,
            BTreeSet::from(["stats".to_string(), "db".to_string()])
        );
        let guards: Vec<_> = spec.guards.iter().map(Guard::name).collect();
        assert_eq!(guards, vec!["owner", "staff"]);
        assert_eq!(spec.connections.len(), 2);
    }

    #[test]
    fn test_additive_fields_independent_of_order() {
        let forward = CommandSpec::new("ping").decorate_all(layers()).unwrap();
        let mut reversed_layers = layers();
        reversed_layers.reverse();
        let reversed = CommandSpec::new("ping")
            .decorate_all(reversed_layers)
            .unwrap();

        let sorted = |v: &[String]| {
            let mut v: Vec<String> = v.iter().map(|a| a.to_lowercase()).collect();
            v.sort();
            v
        };
        assert_eq!(sorted(&forward.aliases), sorted(&reversed.aliases));
        assert_eq!(forward.depends_on, reversed.depends_on);
        assert_eq!(forward.guards.len(), reversed.guards.len());
        assert_eq!(forward.connections.len(), reversed.connections.len());
    }

    #[test]
    fn test_duplicate_guard_names_collapse() {
        let spec = CommandSpec::new("ping")
            .decorate_all([
                guard(Guard::sync("owner", |_| true)),
                guard(Guard::sync("owner", |_| false)),
            ])
            .unwrap();
        assert_eq!(spec.guards.len(), 1);
    }

    #[test]
    fn test_single_value_last_wins() {
        let spec = CommandSpec::new("ping")
            .decorate_all([
                cooldown(Duration::from_secs(5)),
                environment(Environment::Guild),
                cooldown(Duration::from_secs(2)),
                environment(Environment::Direct),
            ])
            .unwrap();
        assert_eq!(spec.constraints.cooldown, Some(Duration::from_secs(2)));
        assert_eq!(spec.constraints.environment, Some(Environment::Direct));
    }

    #[test]
    fn test_list_constraints_append() {
        let spec = CommandSpec::new("ban")
            .decorate_all([
                issuer_permissions([Permission::BanMembers]),
                user_groups(["mods"]),
                issuer_permissions([Permission::KickMembers]),
                user_groups(["admins"]),
            ])
            .unwrap();
        assert_eq!(
            spec.constraints.issuer_permissions,
            Some(BTreeSet::from([Permission::KickMembers, Permission::BanMembers]))
        );
        assert_eq!(spec.constraints.user_groups.as_ref().map(BTreeSet::len), Some(2));
    }

    #[test]
    fn test_meta_and_disabled() {
        let spec = CommandSpec::new("ping")
            .decorate_all([
                name("pong"),
                description("Replies."),
                author("anvil"),
                version("1.0.0"),
                disabled(),
            ])
            .unwrap();
        assert_eq!(spec.name(), "pong");
        assert_eq!(spec.meta.description.as_deref(), Some("Replies."));
        assert_eq!(spec.meta.version.as_deref(), Some("1.0.0"));
        assert!(!spec.enabled);
    }

    #[test]
    fn test_arguments_append_and_validate() {
        let spec = CommandSpec::new("give")
            .decorate_all([
                arguments([Argument::required("amount", ArgumentType::NUMBER)]),
                arguments([Argument::optional("unit", ArgumentType::STRING)]),
            ])
            .unwrap();
        assert_eq!(spec.usage(), "give <amount:number> [unit:string]");

        let err = CommandSpec::new("give")
            .decorate(arguments([Argument::required(
                "target",
                ArgumentType::any_of([ArgumentType::NUMBER, ArgumentType::STRING]),
            )]))
            .unwrap_err();
        assert!(matches!(
            err,
            DecoratorError::Schema(SchemaError::RequiredAnyOf(_))
        ));
    }

    #[test]
    fn test_command_decorator_on_task_is_rejected() {
        let task = TaskSpec::new("cleanup", Duration::from_secs(60));
        let err = task.decorate(cooldown(Duration::from_secs(1))).unwrap_err();
        assert!(matches!(
            err,
            DecoratorError::InvalidDecoratorTarget {
                decorator: "cooldown",
                target: FragmentKind::Task
            }
        ));

        let task = TaskSpec::new("cleanup", Duration::from_secs(60))
            .decorate(description("Deletes stale data."))
            .unwrap();
        assert_eq!(task.meta.description.as_deref(), Some("Deletes stale data."));
    }
}
