//! Declarative command constraints and the gate that evaluates them.
//!
//! Decorators accumulate a [`ConstraintSpec`] in which every field is
//! optional. When a command is enabled the manager resolves it over the
//! configured [`ConstraintDefaults`] into effective [`Constraints`]; a
//! property set by a decorator always wins over the default.
//!
//! The [`ConstraintGate`] evaluates effective constraints in a fixed order
//! and stops at the first violation:
//!
//! ```text
//! environment → enabled → cooldown → user groups → exclusive
//!             → issuer permissions → bot permissions
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anvil_core::{Bot, InboundMessage, Permission, UserId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Where a command may be invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Environment {
    /// Guild channels and direct messages.
    #[default]
    Anywhere,
    /// Guild channels only.
    Guild,
    /// Direct messages only.
    Direct,
}

impl Environment {
    /// Returns `true` if a message posted in the given place satisfies this environment.
    pub fn allows(&self, message: &InboundMessage) -> bool {
        match self {
            Environment::Anywhere => true,
            Environment::Guild => message.in_guild_channel(),
            Environment::Direct => !message.in_guild_channel(),
        }
    }

    /// Returns the kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Anywhere => "anywhere",
            Environment::Guild => "guild",
            Environment::Direct => "direct",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate restricting a command to specific issuers or places.
#[derive(Clone)]
pub struct ExclusiveCheck {
    label: String,
    predicate: Arc<dyn Fn(&InboundMessage) -> bool + Send + Sync>,
}

impl ExclusiveCheck {
    /// Creates a check from a predicate.
    pub fn new<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&InboundMessage) -> bool + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            predicate: Arc::new(predicate),
        }
    }

    /// Accepts messages authored by one of `ids`.
    pub fn users<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: HashSet<String> = ids.into_iter().map(Into::into).collect();
        Self::new("users", move |msg| ids.contains(msg.author.id.as_str()))
    }

    /// Accepts messages posted in one of `ids`.
    pub fn channels<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: HashSet<String> = ids.into_iter().map(Into::into).collect();
        Self::new("channels", move |msg| ids.contains(msg.channel.id.as_str()))
    }

    /// Accepts messages posted in one of the guilds `ids`.
    pub fn guilds<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: HashSet<String> = ids.into_iter().map(Into::into).collect();
        Self::new("guilds", move |msg| {
            msg.guild
                .as_ref()
                .is_some_and(|guild| ids.contains(guild.as_str()))
        })
    }

    /// Label used in diagnostics.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Evaluates the predicate.
    pub fn accepts(&self, message: &InboundMessage) -> bool {
        (self.predicate)(message)
    }
}

impl fmt::Debug for ExclusiveCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ExclusiveCheck").field(&self.label).finish()
    }
}

/// Constraints as accumulated by decorators.
///
/// `None` means no decorator touched the property.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSpec {
    /// Where the command may run.
    pub environment: Option<Environment>,
    /// Per-user cooldown.
    pub cooldown: Option<Duration>,
    /// Groups allowed to invoke; empty allows everyone.
    pub user_groups: Option<BTreeSet<String>>,
    /// Custom predicates; one accepting is enough.
    pub exclusive: Option<Vec<ExclusiveCheck>>,
    /// Permissions the issuer must hold.
    pub issuer_permissions: Option<BTreeSet<Permission>>,
    /// Permissions the bot must hold.
    pub self_permissions: Option<BTreeSet<Permission>>,
}

impl ConstraintSpec {
    /// Resolves the spec over configured defaults.
    pub fn resolve(&self, defaults: &ConstraintDefaults) -> Constraints {
        Constraints {
            environment: self.environment.unwrap_or(defaults.environment),
            cooldown: self
                .cooldown
                .unwrap_or(Duration::from_secs(defaults.cooldown_secs)),
            user_groups: self
                .user_groups
                .clone()
                .unwrap_or_else(|| defaults.user_groups.clone()),
            exclusive: self.exclusive.clone().unwrap_or_default(),
            issuer_permissions: self
                .issuer_permissions
                .clone()
                .unwrap_or_else(|| defaults.issuer_permissions.clone()),
            self_permissions: self
                .self_permissions
                .clone()
                .unwrap_or_else(|| defaults.self_permissions.clone()),
        }
    }
}

/// Constraint values applied to every command that does not set its own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConstraintDefaults {
    /// Default environment.
    pub environment: Environment,
    /// Default cooldown in seconds; `0` disables it.
    pub cooldown_secs: u64,
    /// Default user groups.
    pub user_groups: BTreeSet<String>,
    /// Permissions the issuer must hold.
    pub issuer_permissions: BTreeSet<Permission>,
    /// Permissions the bot must hold.
    pub self_permissions: BTreeSet<Permission>,
}

/// Effective constraints of an enabled command.
#[derive(Debug, Clone, Default)]
pub struct Constraints {
    /// Required environment.
    pub environment: Environment,
    /// Per-user cooldown; zero disables it.
    pub cooldown: Duration,
    /// Allowed groups; empty allows everyone.
    pub user_groups: BTreeSet<String>,
    /// Custom predicates; one accepting is enough.
    pub exclusive: Vec<ExclusiveCheck>,
    /// Permissions the issuer must hold.
    pub issuer_permissions: BTreeSet<Permission>,
    /// Permissions the bot must hold.
    pub self_permissions: BTreeSet<Permission>,
}

/// Why the gate rejected an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintViolation {
    /// Wrong place.
    Environment {
        /// Environment the command requires.
        required: Environment,
    },
    /// The command is disabled.
    Disabled,
    /// The issuer is still on cooldown.
    Cooldown {
        /// Time until the next allowed invocation.
        remaining: Duration,
    },
    /// The issuer belongs to none of the required groups.
    UserGroup {
        /// Groups that would have granted access.
        required: BTreeSet<String>,
    },
    /// No exclusive predicate accepted the invocation.
    Exclusive,
    /// The issuer lacks permissions.
    IssuerPermissions {
        /// Missing permissions.
        missing: Vec<Permission>,
    },
    /// The bot lacks permissions.
    SelfPermissions {
        /// Missing permissions.
        missing: Vec<Permission>,
    },
}

fn join_permissions(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(Permission::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl ConstraintViolation {
    /// Short machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            ConstraintViolation::Environment { .. } => "environment",
            ConstraintViolation::Disabled => "disabled",
            ConstraintViolation::Cooldown { .. } => "cooldown",
            ConstraintViolation::UserGroup { .. } => "user-group",
            ConstraintViolation::Exclusive => "exclusive",
            ConstraintViolation::IssuerPermissions { .. } => "issuer-permissions",
            ConstraintViolation::SelfPermissions { .. } => "self-permissions",
        }
    }

    /// User-facing explanation.
    pub fn message(&self) -> String {
        match self {
            ConstraintViolation::Environment { required } => match required {
                Environment::Guild => "This command can only be used in a server.".to_string(),
                Environment::Direct => {
                    "This command can only be used in direct messages.".to_string()
                }
                Environment::Anywhere => "This command cannot be used here.".to_string(),
            },
            ConstraintViolation::Disabled => "This command is currently disabled.".to_string(),
            ConstraintViolation::Cooldown { remaining } => format!(
                "Please wait {:.1}s before using this command again.",
                remaining.as_secs_f64()
            ),
            ConstraintViolation::UserGroup { .. } | ConstraintViolation::Exclusive => {
                "You are not allowed to use this command.".to_string()
            }
            ConstraintViolation::IssuerPermissions { missing } => {
                format!("You are missing permissions: {}.", join_permissions(missing))
            }
            ConstraintViolation::SelfPermissions { missing } => {
                format!("I am missing permissions: {}.", join_permissions(missing))
            }
        }
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// Per `(command, user)` timestamps of the last successful invocation.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    last: Mutex<HashMap<(String, UserId), Instant>>,
}

impl CooldownTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the time left before `user` may invoke `command` again.
    pub fn remaining(&self, command: &str, user: &UserId, cooldown: Duration) -> Option<Duration> {
        if cooldown.is_zero() {
            return None;
        }
        let last = self.last.lock();
        let at = last.get(&(command.to_lowercase(), user.clone()))?;
        let elapsed = at.elapsed();
        (elapsed < cooldown).then(|| cooldown - elapsed)
    }

    /// Records a successful invocation.
    pub fn record(&self, command: &str, user: &UserId) {
        self.last
            .lock()
            .insert((command.to_lowercase(), user.clone()), Instant::now());
    }

    /// Forgets every timestamp of `command`.
    pub fn clear(&self, command: &str) {
        let command = command.to_lowercase();
        self.last.lock().retain(|(name, _), _| *name != command);
    }
}

/// Named groups of user ids.
#[derive(Debug, Clone, Default)]
pub struct UserGroups {
    groups: HashMap<String, HashSet<UserId>>,
}

impl UserGroups {
    /// Creates an empty set of groups.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds groups from a `group → user ids` map (the configuration form).
    pub fn from_map(map: &BTreeMap<String, Vec<String>>) -> Self {
        let mut groups = Self::new();
        for (group, users) in map {
            for user in users {
                groups.add(group, UserId::new(user.clone()));
            }
        }
        groups
    }

    /// Adds a user to a group.
    pub fn add(&mut self, group: &str, user: UserId) -> &mut Self {
        self.groups
            .entry(group.to_lowercase())
            .or_default()
            .insert(user);
        self
    }

    /// Returns `true` if `user` is a member of `group`.
    pub fn is_member(&self, group: &str, user: &UserId) -> bool {
        self.groups
            .get(&group.to_lowercase())
            .is_some_and(|members| members.contains(user))
    }
}

/// Evaluates effective constraints against an invocation.
#[derive(Debug, Default)]
pub struct ConstraintGate {
    cooldowns: CooldownTracker,
    groups: UserGroups,
}

impl ConstraintGate {
    /// Creates a gate with the given user groups.
    pub fn new(groups: UserGroups) -> Self {
        Self {
            cooldowns: CooldownTracker::new(),
            groups,
        }
    }

    /// The cooldown tracker.
    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    /// The configured user groups.
    pub fn groups(&self) -> &UserGroups {
        &self.groups
    }

    /// Runs every check in order, returning the first violation.
    pub async fn check(
        &self,
        command: &str,
        constraints: &Constraints,
        enabled: bool,
        message: &InboundMessage,
        bot: &dyn Bot,
    ) -> Result<(), ConstraintViolation> {
        if !constraints.environment.allows(message) {
            return Err(ConstraintViolation::Environment {
                required: constraints.environment,
            });
        }

        if !enabled {
            return Err(ConstraintViolation::Disabled);
        }

        if let Some(remaining) =
            self.cooldowns
                .remaining(command, &message.author.id, constraints.cooldown)
        {
            return Err(ConstraintViolation::Cooldown { remaining });
        }

        if !constraints.user_groups.is_empty()
            && !constraints
                .user_groups
                .iter()
                .any(|group| self.groups.is_member(group, &message.author.id))
        {
            return Err(ConstraintViolation::UserGroup {
                required: constraints.user_groups.clone(),
            });
        }

        if !constraints.exclusive.is_empty()
            && !constraints.exclusive.iter().any(|check| check.accepts(message))
        {
            return Err(ConstraintViolation::Exclusive);
        }

        // Permissions only exist inside guilds.
        if !message.in_guild_channel() {
            return Ok(());
        }
        let guild = message.guild.as_ref();

        let mut missing = Vec::new();
        for permission in &constraints.issuer_permissions {
            if !bot
                .has_permission(&message.author.id, &message.channel, guild, *permission)
                .await
            {
                missing.push(*permission);
            }
        }
        if !missing.is_empty() {
            return Err(ConstraintViolation::IssuerPermissions { missing });
        }

        for permission in &constraints.self_permissions {
            if !bot
                .bot_has_permission(&message.channel, guild, *permission)
                .await
            {
                missing.push(*permission);
            }
        }
        if !missing.is_empty() {
            return Err(ConstraintViolation::SelfPermissions { missing });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBot;
    use anvil_core::User;

    fn guild_message(author: &str) -> InboundMessage {
        InboundMessage::in_guild("!x", User::new(author, author), "c1", "g1")
    }

    fn direct_message(author: &str) -> InboundMessage {
        InboundMessage::direct("!x", User::new(author, author), "d1")
    }

    #[test]
    fn test_resolve_decorator_values_win() {
        let defaults = ConstraintDefaults {
            environment: Environment::Guild,
            cooldown_secs: 3,
            issuer_permissions: BTreeSet::from([Permission::SendMessages]),
            ..Default::default()
        };
        let spec = ConstraintSpec {
            cooldown: Some(Duration::from_secs(10)),
            ..Default::default()
        };

        let resolved = spec.resolve(&defaults);
        assert_eq!(resolved.environment, Environment::Guild);
        assert_eq!(resolved.cooldown, Duration::from_secs(10));
        assert_eq!(
            resolved.issuer_permissions,
            BTreeSet::from([Permission::SendMessages])
        );
    }

    #[test]
    fn test_environment_allows() {
        assert!(Environment::Guild.allows(&guild_message("u")));
        assert!(!Environment::Guild.allows(&direct_message("u")));
        assert!(Environment::Direct.allows(&direct_message("u")));
        assert!(Environment::Anywhere.allows(&direct_message("u")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_tracker() {
        let tracker = CooldownTracker::new();
        let user = UserId::new("u1");
        let cooldown = Duration::from_secs(5);

        assert_eq!(tracker.remaining("ping", &user, cooldown), None);
        tracker.record("ping", &user);
        assert_eq!(
            tracker.remaining("PING", &user, cooldown),
            Some(Duration::from_secs(5))
        );

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(
            tracker.remaining("ping", &user, cooldown),
            Some(Duration::from_secs(3))
        );
        assert_eq!(tracker.remaining("ping", &UserId::new("u2"), cooldown), None);

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(tracker.remaining("ping", &user, cooldown), None);
    }

    #[tokio::test]
    async fn test_gate_order_environment_before_disabled() {
        let gate = ConstraintGate::default();
        let bot = MockBot::new();
        let constraints = Constraints {
            environment: Environment::Guild,
            ..Default::default()
        };
        let err = gate
            .check("x", &constraints, false, &direct_message("u"), &bot)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "environment");

        let err = gate
            .check("x", &constraints, false, &guild_message("u"), &bot)
            .await
            .unwrap_err();
        assert_eq!(err, ConstraintViolation::Disabled);
    }

    #[tokio::test]
    async fn test_gate_user_groups() {
        let mut groups = UserGroups::new();
        groups.add("Staff", UserId::new("alice"));
        let gate = ConstraintGate::new(groups);
        let bot = MockBot::new();
        let constraints = Constraints {
            user_groups: BTreeSet::from(["staff".to_string()]),
            ..Default::default()
        };

        assert!(
            gate.check("x", &constraints, true, &guild_message("alice"), &bot)
                .await
                .is_ok()
        );
        let err = gate
            .check("x", &constraints, true, &guild_message("bob"), &bot)
            .await
            .unwrap_err();
        assert_eq!(err.reason(), "user-group");
    }

    #[tokio::test]
    async fn test_gate_exclusive_any_of() {
        let gate = ConstraintGate::default();
        let bot = MockBot::new();
        let constraints = Constraints {
            exclusive: vec![
                ExclusiveCheck::users(["alice"]),
                ExclusiveCheck::channels(["d1"]),
            ],
            ..Default::default()
        };

        assert!(
            gate.check("x", &constraints, true, &guild_message("alice"), &bot)
                .await
                .is_ok()
        );
        assert!(
            gate.check("x", &constraints, true, &direct_message("bob"), &bot)
                .await
                .is_ok()
        );
        let err = gate
            .check("x", &constraints, true, &guild_message("bob"), &bot)
            .await
            .unwrap_err();
        assert_eq!(err, ConstraintViolation::Exclusive);
    }

    #[tokio::test]
    async fn test_gate_permissions() {
        let gate = ConstraintGate::default();
        let bot = MockBot::new()
            .grant("alice", Permission::BanMembers)
            .grant_self(Permission::SendMessages);
        let constraints = Constraints {
            issuer_permissions: BTreeSet::from([Permission::BanMembers]),
            self_permissions: BTreeSet::from([Permission::SendMessages, Permission::BanMembers]),
            ..Default::default()
        };

        let err = gate
            .check("ban", &constraints, true, &guild_message("bob"), &bot)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ConstraintViolation::IssuerPermissions {
                missing: vec![Permission::BanMembers]
            }
        );

        let err = gate
            .check("ban", &constraints, true, &guild_message("alice"), &bot)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ConstraintViolation::SelfPermissions {
                missing: vec![Permission::BanMembers]
            }
        );
        assert!(err.message().contains("ban-members"));

        // Direct messages skip permission checks.
        assert!(
            gate.check("ban", &constraints, true, &direct_message("bob"), &bot)
                .await
                .is_ok()
        );
    }
}
