//! The command model.
//!
//! A command is a [`CommandSpec`] (metadata, aliases, argument schema,
//! constraints, dependencies, guards and relays) plus a [`CommandHandler`].
//! Specs are built by folding [`Decorator`]s over [`CommandSpec::new`]:
//!
//! ```rust,ignore
//! use anvil_framework::command::decorator::*;
//! use anvil_framework::prelude::*;
//!
//! let spec = CommandSpec::new("ping").decorate_all([
//!     description("Replies with pong."),
//!     aliases(["p"]),
//!     cooldown(Duration::from_secs(5)),
//! ])?;
//!
//! let ping = Command::new(spec, handler_fn(|ctx: CommandContext| async move {
//!     ctx.reply("pong").await?;
//!     Ok(())
//! }));
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anvil_core::{ApiResult, BoxedBot, InboundMessage, SentMessage};
use async_trait::async_trait;

use crate::error::{BoxError, DecoratorError};
use crate::fragment::FragmentMeta;
use crate::interaction::Interactions;
use crate::manager::FragmentManager;
use crate::parser::Invocation;

pub mod argument;
pub mod constraint;
pub mod decorator;
pub mod guard;
pub mod resolver;
pub mod split;

pub use argument::{Argument, ArgumentType, Primitive, validate_schema};
pub use constraint::{
    ConstraintDefaults, ConstraintGate, ConstraintSpec, ConstraintViolation, Constraints,
    CooldownTracker, Environment, ExclusiveCheck, UserGroups,
};
pub use decorator::{Decoratable, Decorator};
pub use guard::{Guard, Relay};
pub use resolver::{ArgumentError, Arguments, PatternResolver, TypeRegistry, TypeResolver};

// =============================================================================
// CommandSpec
// =============================================================================

/// Everything declared about a command except its body.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    /// Name, description, author and version.
    pub meta: FragmentMeta,
    /// Alternative names, unique case-insensitively.
    pub aliases: Vec<String>,
    /// Argument schema in declaration order.
    pub args: Vec<Argument>,
    /// Constraints set by decorators.
    pub constraints: ConstraintSpec,
    /// Services that must be registered before the command enables.
    pub depends_on: BTreeSet<String>,
    /// Run before the body; unique by name.
    pub guards: Vec<Guard>,
    /// Run after a successful body.
    pub connections: Vec<Relay>,
    /// `false` rejects every invocation.
    pub enabled: bool,
}

impl CommandSpec {
    /// Creates an enabled spec with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            meta: FragmentMeta::new(name),
            aliases: Vec::new(),
            args: Vec::new(),
            constraints: ConstraintSpec::default(),
            depends_on: BTreeSet::new(),
            guards: Vec::new(),
            connections: Vec::new(),
            enabled: true,
        }
    }

    /// The command name.
    pub fn name(&self) -> &str {
        &self.meta.name
    }

    /// Renders a usage line such as `ban <target:user> [reason:string...]`.
    pub fn usage(&self) -> String {
        let mut line = self.meta.name.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.usage());
        }
        line
    }
}

// =============================================================================
// CommandHandler
// =============================================================================

/// The body of a command.
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    /// Runs the command.
    async fn run(&self, ctx: CommandContext) -> Result<(), BoxError>;

    /// Gate consulted once per enable; returning `false` keeps the command
    /// out of the registry.
    async fn enabled(&self) -> bool {
        true
    }
}

/// A [`CommandHandler`] backed by an async closure.
pub struct HandlerFn<F> {
    f: F,
}

/// Wraps an async closure into a [`CommandHandler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    HandlerFn { f }
}

#[async_trait]
impl<F, Fut> CommandHandler for HandlerFn<F>
where
    F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn run(&self, ctx: CommandContext) -> Result<(), BoxError> {
        (self.f)(ctx).await
    }
}

// =============================================================================
// Command
// =============================================================================

/// A live command: spec, effective constraints and handler.
#[derive(Clone)]
pub struct Command {
    spec: CommandSpec,
    constraints: Constraints,
    handler: Arc<dyn CommandHandler>,
}

impl Command {
    /// Creates a command. Constraints resolve over empty defaults until the
    /// manager enables it.
    pub fn new(spec: CommandSpec, handler: impl CommandHandler) -> Self {
        Self::with_handler(spec, Arc::new(handler))
    }

    /// Creates a command from a shared handler.
    pub fn with_handler(spec: CommandSpec, handler: Arc<dyn CommandHandler>) -> Self {
        let constraints = spec.constraints.resolve(&ConstraintDefaults::default());
        Self {
            spec,
            constraints,
            handler,
        }
    }

    /// Creates a command from an async closure.
    pub fn from_fn<F, Fut>(spec: CommandSpec, f: F) -> Self
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self::new(spec, handler_fn(f))
    }

    /// The command name.
    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// Metadata.
    pub fn meta(&self) -> &FragmentMeta {
        &self.spec.meta
    }

    /// The declared spec.
    pub fn spec(&self) -> &CommandSpec {
        &self.spec
    }

    /// Effective constraints.
    pub fn constraints(&self) -> &Constraints {
        &self.constraints
    }

    /// The cooldown in effect.
    pub fn cooldown(&self) -> Duration {
        self.constraints.cooldown
    }

    /// The handler.
    pub fn handler(&self) -> &Arc<dyn CommandHandler> {
        &self.handler
    }

    pub(crate) fn apply_defaults(&mut self, defaults: &ConstraintDefaults) {
        self.constraints = self.spec.constraints.resolve(defaults);
    }
}

impl Decoratable for Command {
    fn kind(&self) -> crate::fragment::FragmentKind {
        crate::fragment::FragmentKind::Command
    }

    fn decorate(mut self, decorator: Decorator) -> Result<Self, DecoratorError> {
        self.spec = self.spec.decorate(decorator)?;
        self.constraints = self.spec.constraints.resolve(&ConstraintDefaults::default());
        Ok(self)
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("spec", &self.spec)
            .field("constraints", &self.constraints)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CommandContext
// =============================================================================

struct ContextInner {
    message: Arc<InboundMessage>,
    bot: BoxedBot,
    manager: Arc<FragmentManager>,
    interactions: Arc<Interactions>,
    command: String,
    invoked_as: String,
    prefix: String,
    args: Arguments,
}

/// Per-invocation context handed to handlers, guards and relays.
///
/// Cloning is cheap; all clones share the same invocation.
#[derive(Clone)]
pub struct CommandContext {
    inner: Arc<ContextInner>,
}

impl CommandContext {
    pub(crate) fn new(
        message: Arc<InboundMessage>,
        bot: BoxedBot,
        manager: Arc<FragmentManager>,
        interactions: Arc<Interactions>,
        command: &str,
        invocation: &Invocation,
        args: Arguments,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                message,
                bot,
                manager,
                interactions,
                command: command.to_string(),
                invoked_as: invocation.invoked.clone(),
                prefix: invocation.prefix.clone(),
                args,
            }),
        }
    }

    /// The triggering message.
    pub fn message(&self) -> &Arc<InboundMessage> {
        &self.inner.message
    }

    /// The bot that received the message.
    pub fn bot(&self) -> &BoxedBot {
        &self.inner.bot
    }

    /// The fragment manager, for commands that inspect or manage fragments.
    pub fn manager(&self) -> &Arc<FragmentManager> {
        &self.inner.manager
    }

    /// Primary name of the running command.
    pub fn command(&self) -> &str {
        &self.inner.command
    }

    /// The name or alias the user typed.
    pub fn invoked_as(&self) -> &str {
        &self.inner.invoked_as
    }

    /// The prefix the user typed.
    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    /// Resolved arguments.
    pub fn args(&self) -> &Arguments {
        &self.inner.args
    }

    /// Sends `content` to the channel the command was invoked in.
    pub async fn reply(&self, content: impl AsRef<str>) -> ApiResult<Option<SentMessage>> {
        self.inner
            .bot
            .send(&self.inner.message.channel, content.as_ref())
            .await
    }

    /// Waits for the next message from the same author in the same channel.
    ///
    /// Returns `None` on timeout.
    pub async fn await_response(&self, timeout: Duration) -> Option<Arc<InboundMessage>> {
        let author = self.inner.message.author.id.clone();
        let channel = self.inner.message.channel.id.clone();
        self.inner
            .interactions
            .await_response(
                move |msg: &InboundMessage| msg.author.id == author && msg.channel.id == channel,
                timeout,
            )
            .await
    }
}

impl fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("command", &self.inner.command)
            .field("invoked_as", &self.inner.invoked_as)
            .field("args", &self.inner.args)
            .finish_non_exhaustive()
    }
}
