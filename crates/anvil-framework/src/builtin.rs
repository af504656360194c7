//! Built-in commands shipped with the Anvil framework.
//!
//! Enabled by the `builtin` feature flag (on by default).
//!
//! | Command | Aliases | Description |
//! |---------|---------|-------------|
//! | `help`  | `commands` | Lists commands, or shows the details of one |
//!
//! Built-ins are enabled as internal commands, so their names must be in the
//! manager's internal allow-list:
//!
//! ```rust,ignore
//! manager.enable(&Package::from(help_package()), true, true).await;
//! ```

use std::fmt::Write as _;

use crate::command::decorator::{Decoratable, aliases, arguments, description};
use crate::command::{Argument, ArgumentType, Command, CommandContext, CommandSpec};
use crate::error::BoxError;
use crate::fragment::CommandPackage;
use crate::registry::Lookup;

/// Name of the help command.
pub const HELP_COMMAND: &str = "help";

fn help_spec() -> CommandSpec {
    let spec = CommandSpec::new(HELP_COMMAND);
    let decorated = spec.clone().decorate_all([
        description("Lists commands, or shows the details of one."),
        aliases(["commands"]),
        arguments([Argument::optional("command", ArgumentType::STRING)
            .describe("Command to show the details of")]),
    ]);
    // The decorators above are constant and valid.
    decorated.unwrap_or(spec)
}

async fn help(ctx: CommandContext) -> Result<(), BoxError> {
    let text = match ctx.args().str("command") {
        Some(name) => describe(&ctx, name).await,
        None => list(&ctx),
    };
    ctx.reply(text).await?;
    Ok(())
}

fn list(ctx: &CommandContext) -> String {
    let mut text = String::from("Available commands:");
    for entry in ctx.manager().commands().all() {
        let usage = match &entry.instance {
            Some(command) => command.spec().usage(),
            None => entry.name.clone(),
        };
        let _ = write!(text, "\n  {}{usage}", ctx.prefix());
    }
    text
}

async fn describe(ctx: &CommandContext, name: &str) -> String {
    let command = match ctx.manager().commands().resolve(name) {
        Some(Lookup::Live(command)) => Some(command),
        Some(Lookup::Released { name }) => ctx.manager().revive(&name).await,
        None => None,
    };
    let Some(command) = command else {
        return format!("No command named `{name}`.");
    };

    let mut text = format!("{}{}", ctx.prefix(), command.spec().usage());
    if let Some(desc) = &command.meta().description {
        let _ = write!(text, "\n{desc}");
    }
    if !command.spec().aliases.is_empty() {
        let _ = write!(text, "\nAliases: {}", command.spec().aliases.join(", "));
    }
    for arg in &command.spec().args {
        if let Some(desc) = &arg.description {
            let _ = write!(text, "\n  {}: {desc}", arg.name);
        }
    }
    text
}

/// The `help` command package.
pub fn help_package() -> CommandPackage {
    CommandPackage::new(|| Command::from_fn(help_spec(), help))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::decorator::{aliases as alias_decorator, arguments as args_decorator};
    use crate::dispatcher::Dispatcher;
    use crate::fragment::{Catalog, Package};
    use crate::loader::FragmentLoader;
    use crate::manager::FragmentManager;
    use crate::parser::CommandParser;
    use crate::testing::{MockBot, guild_message};
    use std::sync::Arc;

    async fn setup() -> (Dispatcher, Arc<MockBot>) {
        let bot = Arc::new(MockBot::new());
        let manager = Arc::new(FragmentManager::new(
            bot.clone(),
            Arc::new(FragmentLoader::new(Catalog::new())),
        ));
        assert!(manager.enable(&Package::from(help_package()), true, true).await);

        let ban = CommandPackage::new(|| {
            let spec = CommandSpec::new("ban")
                .decorate_all([
                    description("Bans a user."),
                    alias_decorator(["b"]),
                    args_decorator([
                        Argument::required("target", ArgumentType::custom("user"))
                            .describe("Who to ban"),
                    ]),
                ])
                .unwrap();
            Command::from_fn(spec, |_ctx| async { Ok(()) })
        });
        assert!(manager.enable(&Package::from(ban), false, true).await);

        (
            Dispatcher::new(CommandParser::new(["!"], false), manager),
            bot,
        )
    }

    #[test]
    fn test_help_spec_is_valid() {
        let spec = help_spec();
        assert_eq!(spec.aliases, vec!["commands"]);
        assert_eq!(spec.usage(), "help [command:string]");
    }

    #[tokio::test]
    async fn test_help_lists_commands() {
        let (dispatcher, bot) = setup().await;
        assert!(
            dispatcher
                .dispatch(guild_message("u1", "!help"), bot.clone())
                .await
                .is_completed()
        );
        assert_eq!(
            bot.sent(),
            vec!["Available commands:\n  !ban <target:user>\n  !help [command:string]"]
        );
    }

    #[tokio::test]
    async fn test_help_describes_one_command() {
        let (dispatcher, bot) = setup().await;
        dispatcher
            .dispatch(guild_message("u1", "!help b"), bot.clone())
            .await;
        dispatcher
            .dispatch(guild_message("u1", "!help nope"), bot.clone())
            .await;
        assert_eq!(
            bot.sent(),
            vec![
                "!ban <target:user>\nBans a user.\nAliases: b\n  target: Who to ban",
                "No command named `nope`.",
            ]
        );
    }
}
