//! Operator console.
//!
//! A line-oriented control surface over any async reader/writer pair
//! (usually stdin/stdout). Each line is parsed with clap, so `help` and
//! malformed input produce clap's usual output.
//!
//! ```text
//! > commands
//! help (internal)
//! ping
//! > reload ping
//! Reloaded `ping`.
//! > stop
//! ```

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::error::RuntimeResult;
use crate::runtime::AnvilRuntime;

#[derive(Debug, Parser)]
#[command(name = "anvil", no_binary_name = true, disable_version_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    action: Action,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Action {
    /// Check that the console is responsive.
    Ping,
    /// Reload one command's fragment file, or every loaded file.
    Reload {
        /// Command name; all files when omitted.
        name: Option<String>,
    },
    /// Drop a command's instance until its next use.
    Release { name: String },
    /// Remove a command.
    Remove { name: String },
    /// List registered commands.
    Commands,
    /// List running services.
    Services,
    /// List scheduled tasks.
    Tasks,
    /// Show how long the runtime has been up.
    Uptime,
    /// Stop the runtime.
    #[command(alias = "exit", alias = "quit")]
    Stop,
}

/// Result of one console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleReply {
    /// Text to print.
    pub output: String,
    /// Whether the console should stop reading.
    pub stop: bool,
}

impl ConsoleReply {
    fn text(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            stop: false,
        }
    }
}

/// Executes one console line against the runtime.
pub async fn execute(runtime: &AnvilRuntime, line: &str) -> ConsoleReply {
    let words: Vec<&str> = line.split_whitespace().collect();
    if words.is_empty() {
        return ConsoleReply::text("");
    }

    let action = match ConsoleLine::try_parse_from(words) {
        Ok(parsed) => parsed.action,
        Err(e) => return ConsoleReply::text(e.to_string().trim_end()),
    };
    debug!(?action, "Console command");

    let manager = runtime.manager();
    match action {
        Action::Ping => ConsoleReply::text("pong"),
        Action::Reload { name: Some(name) } => {
            if runtime.reload(&name).await {
                ConsoleReply::text(format!("Reloaded `{name}`."))
            } else {
                ConsoleReply::text(format!("Could not reload `{name}`."))
            }
        }
        Action::Reload { name: None } => {
            let count = runtime.reload_all().await;
            ConsoleReply::text(format!("Reloaded {count} fragment file(s)."))
        }
        Action::Release { name } => {
            if manager.release(&name) {
                ConsoleReply::text(format!("Released `{name}`."))
            } else {
                ConsoleReply::text(format!("No command named `{name}`."))
            }
        }
        Action::Remove { name } => {
            if manager.remove_command(&name) {
                ConsoleReply::text(format!("Removed `{name}`."))
            } else {
                ConsoleReply::text(format!("No command named `{name}`."))
            }
        }
        Action::Commands => {
            let lines: Vec<String> = manager
                .commands()
                .all()
                .into_iter()
                .map(|entry| {
                    let mut line = entry.name.clone();
                    if entry.internal {
                        line.push_str(" (internal)");
                    }
                    if entry.is_released() {
                        line.push_str(" (released)");
                    }
                    line
                })
                .collect();
            ConsoleReply::text(lines.join("\n"))
        }
        Action::Services => ConsoleReply::text(manager.services().names().join("\n")),
        Action::Tasks => ConsoleReply::text(manager.tasks().names().join("\n")),
        Action::Uptime => match runtime.uptime() {
            Some(uptime) => ConsoleReply::text(format!("Up for {}s.", uptime.as_secs())),
            None => ConsoleReply::text("Not started."),
        },
        Action::Stop => ConsoleReply {
            output: "Stopping.".into(),
            stop: true,
        },
    }
}

/// Reads lines from `input` until `stop` or end of input, writing each reply
/// to `output`.
///
/// Stopping the runtime itself is left to the caller.
pub async fn run_console<R, W>(runtime: &AnvilRuntime, input: R, mut output: W) -> RuntimeResult<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let reply = execute(runtime, &line).await;
        if !reply.output.is_empty() {
            output.write_all(reply.output.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }
        if reply.stop {
            info!("Stop requested from console");
            runtime.request_stop();
            break;
        }
    }
    Ok(())
}
