//! Message dispatch for the Anvil framework.
//!
//! The [`Dispatcher`] turns one inbound message into one [`DispatchOutcome`]:
//!
//! ```text
//! message ─▶ parse ─▶ lookup ─▶ constraints ─▶ arguments ─▶ guards ─▶ run ─▶ relays
//!              │         │            │             │           │        │
//!       NotACommand  Unknown   ConstraintRejected  ArgumentError │  ExecutionFailed
//!                                                         GuardRejected
//! ```
//!
//! Guards, bodies and relays run under `catch_unwind`; a panic counts as an
//! error of that step. A released command is revived on lookup. Cooldowns are recorded only after
//! the body succeeds, and relays run only then; a failing relay is logged and
//! does not change the outcome.
//!
//! With `reply_errors` on, every failure past lookup sends a reason-specific
//! reply; `reply_unknown` does the same for unknown commands. A message that
//! is not a command never produces a reply.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use anvil_core::{BoxedBot, InboundMessage};
use futures::FutureExt;
use tracing::{Instrument, Level, debug, error, span, warn};

use crate::command::{
    ArgumentError, ConstraintGate, ConstraintViolation, CommandContext, UserGroups,
    resolver,
};
use crate::error::{BoxError, PanicError};
use crate::interaction::Interactions;
use crate::manager::FragmentManager;
use crate::parser::{CommandParser, Invocation};
use crate::registry::Lookup;

/// Reply sent when a command body fails.
pub const EXECUTION_FAILED_REPLY: &str = "Something went wrong while running this command.";

/// How a dispatch ended.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// No prefix or mention, or the author is an ignored bot.
    NotACommand,
    /// Nothing is registered under the invoked name.
    UnknownCommand {
        /// The invoked name.
        base: String,
    },
    /// The constraint gate said no.
    ConstraintRejected(ConstraintViolation),
    /// The tail did not fit the argument schema.
    ArgumentError(ArgumentError),
    /// A guard said no.
    GuardRejected {
        /// Name of the rejecting guard.
        guard: String,
    },
    /// The command body returned an error or panicked.
    ExecutionFailed {
        /// Command name.
        command: String,
        /// What the body returned, or the caught panic.
        error: BoxError,
    },
    /// The command ran.
    Completed {
        /// Command name.
        command: String,
    },
}

impl DispatchOutcome {
    /// Returns `true` for [`Completed`](Self::Completed).
    pub fn is_completed(&self) -> bool {
        matches!(self, DispatchOutcome::Completed { .. })
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            DispatchOutcome::NotACommand => "not-a-command",
            DispatchOutcome::UnknownCommand { .. } => "unknown-command",
            DispatchOutcome::ConstraintRejected(_) => "constraint-rejected",
            DispatchOutcome::ArgumentError(_) => "argument-error",
            DispatchOutcome::GuardRejected { .. } => "guard-rejected",
            DispatchOutcome::ExecutionFailed { .. } => "execution-failed",
            DispatchOutcome::Completed { .. } => "completed",
        }
    }

    /// The user-facing reply for a failed dispatch.
    pub fn reply_text(&self) -> Option<String> {
        match self {
            DispatchOutcome::NotACommand | DispatchOutcome::Completed { .. } => None,
            DispatchOutcome::UnknownCommand { base } => Some(format!("Unknown command `{base}`.")),
            DispatchOutcome::ConstraintRejected(violation) => Some(violation.message()),
            DispatchOutcome::ArgumentError(e) => Some(format!("Invalid arguments: {e}.")),
            DispatchOutcome::GuardRejected { .. } => {
                Some("You are not allowed to use this command.".to_string())
            }
            DispatchOutcome::ExecutionFailed { .. } => Some(EXECUTION_FAILED_REPLY.to_string()),
        }
    }
}

/// Reply behaviour of the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Reply to constraint, argument, guard and execution failures.
    pub reply_errors: bool,
    /// Reply to unknown commands.
    pub reply_unknown: bool,
    /// Treat messages from bot accounts as non-commands.
    pub ignore_bots: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            reply_errors: true,
            reply_unknown: false,
            ignore_bots: true,
        }
    }
}

/// Routes inbound messages to registered commands.
pub struct Dispatcher {
    parser: CommandParser,
    manager: Arc<FragmentManager>,
    gate: ConstraintGate,
    interactions: Arc<Interactions>,
    options: DispatchOptions,
}

impl Dispatcher {
    /// Creates a dispatcher with no user groups and default options.
    pub fn new(parser: CommandParser, manager: Arc<FragmentManager>) -> Self {
        Self {
            parser,
            manager,
            gate: ConstraintGate::new(UserGroups::new()),
            interactions: Arc::new(Interactions::new()),
            options: DispatchOptions::default(),
        }
    }

    /// Sets the user groups consulted by the constraint gate.
    pub fn with_groups(mut self, groups: UserGroups) -> Self {
        self.gate = ConstraintGate::new(groups);
        self
    }

    /// Shares an interaction table with the caller.
    pub fn with_interactions(mut self, interactions: Arc<Interactions>) -> Self {
        self.interactions = interactions;
        self
    }

    /// Sets the reply options.
    pub fn with_options(mut self, options: DispatchOptions) -> Self {
        self.options = options;
        self
    }

    /// The parser.
    pub fn parser(&self) -> &CommandParser {
        &self.parser
    }

    /// The fragment manager commands are looked up in.
    pub fn manager(&self) -> &Arc<FragmentManager> {
        &self.manager
    }

    /// The constraint gate, holding cooldown state.
    pub fn gate(&self) -> &ConstraintGate {
        &self.gate
    }

    /// The interaction table handed to command contexts.
    pub fn interactions(&self) -> &Arc<Interactions> {
        &self.interactions
    }

    /// Dispatches one message and sends any reply the outcome calls for.
    pub async fn dispatch(&self, message: Arc<InboundMessage>, bot: BoxedBot) -> DispatchOutcome {
        if self.options.ignore_bots && message.author.is_bot {
            return DispatchOutcome::NotACommand;
        }
        let Some(invocation) = self.parser.parse(&message.content, bot.id()) else {
            return DispatchOutcome::NotACommand;
        };

        let span = span!(
            Level::DEBUG,
            "dispatch",
            base = %invocation.base,
            author = %message.author.id,
            channel = %message.channel.id,
        );
        let outcome = self
            .execute(&invocation, &message, &bot)
            .instrument(span)
            .await;

        debug!(base = %invocation.base, outcome = outcome.label(), "Dispatch finished");
        self.send_reply(&outcome, &message, &bot).await;
        outcome
    }

    async fn send_reply(&self, outcome: &DispatchOutcome, message: &InboundMessage, bot: &BoxedBot) {
        let wanted = match outcome {
            DispatchOutcome::UnknownCommand { .. } => self.options.reply_unknown,
            _ => self.options.reply_errors,
        };
        if !wanted {
            return;
        }
        if let Some(text) = outcome.reply_text()
            && let Err(e) = bot.send(&message.channel, &text).await
        {
            warn!(error = %e, "Failed to send dispatch reply");
        }
    }

    async fn execute(
        &self,
        invocation: &Invocation,
        message: &Arc<InboundMessage>,
        bot: &BoxedBot,
    ) -> DispatchOutcome {
        let command = match self.manager.commands().resolve(&invocation.base) {
            Some(Lookup::Live(command)) => command,
            Some(Lookup::Released { name }) => match self.manager.revive(&name).await {
                Some(command) => command,
                None => {
                    return DispatchOutcome::UnknownCommand {
                        base: invocation.base.clone(),
                    };
                }
            },
            None => {
                return DispatchOutcome::UnknownCommand {
                    base: invocation.base.clone(),
                };
            }
        };
        let name = command.name().to_string();

        if let Err(violation) = self
            .gate
            .check(
                &name,
                command.constraints(),
                command.spec().enabled,
                message,
                bot.as_ref(),
            )
            .await
        {
            debug!(command = %name, reason = violation.reason(), "Constraint rejected invocation");
            return DispatchOutcome::ConstraintRejected(violation);
        }

        let args = match resolver::resolve(
            &command.spec().args,
            &invocation.tail,
            self.manager.types(),
        ) {
            Ok(args) => args,
            Err(e) => {
                debug!(command = %name, reason = e.reason(), "Argument resolution failed");
                return DispatchOutcome::ArgumentError(e);
            }
        };

        let ctx = CommandContext::new(
            message.clone(),
            bot.clone(),
            self.manager.clone(),
            self.interactions.clone(),
            &name,
            invocation,
            args,
        );

        for guard in &command.spec().guards {
            let passed = match catch_panic(guard.check(ctx.clone())).await {
                Ok(passed) => passed,
                Err(e) => {
                    warn!(command = %name, guard = guard.name(), error = %e, "Guard failed");
                    false
                }
            };
            if !passed {
                return DispatchOutcome::GuardRejected {
                    guard: guard.name().to_string(),
                };
            }
        }

        if let Err(e) = catch_panic(command.handler().run(ctx.clone())).await {
            error!(command = %name, error = %e, "Command failed");
            return DispatchOutcome::ExecutionFailed {
                command: name,
                error: e,
            };
        }

        self.gate.cooldowns().record(&name, &message.author.id);

        for relay in &command.spec().connections {
            if let Err(e) = catch_panic(relay.run(ctx.clone())).await {
                warn!(command = %name, relay = relay.label(), error = %e, "Relay failed");
            }
        }

        DispatchOutcome::Completed { command: name }
    }
}

/// Runs user code, turning a panic into an error.
async fn catch_panic<T, F>(fut: F) -> Result<T, BoxError>
where
    F: Future<Output = Result<T, BoxError>>,
{
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(PanicError::from_payload(payload).into()))
}
