//! Main runtime orchestration.
//!
//! [`AnvilRuntime`] wires configuration into the framework: it builds the
//! loader, manager and dispatcher, enables the built-in commands, loads the
//! configured fragment directories, drives one interval loop per task and
//! feeds inbound messages through interactions and dispatch.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use anvil_runtime::AnvilRuntime;
//!
//! let runtime = AnvilRuntime::builder(bot, catalog)
//!     .config_file("anvil.toml")
//!     .build()?;
//!
//! runtime.start().await?;
//! // adapter: for every message
//! runtime.handle_message(message).await;
//! runtime.stop().await;
//! ```

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anvil_core::{BoxedBot, InboundMessage};
use anvil_framework::command::UserGroups;
use anvil_framework::task::TaskEntry;
use anvil_framework::{
    Catalog, CommandParser, DispatchOptions, DispatchOutcome, Dispatcher, FragmentLoader,
    FragmentManager, Interactions, ManagerConfig, PanicError, ScanOptions,
};
use futures::FutureExt;
use regex::Regex;
use tokio::signal;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{AnvilConfig, ConfigError, ConfigLoader, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Running task loops and the token that stops them.
#[derive(Default)]
struct TaskLoops {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

/// The Anvil runtime.
pub struct AnvilRuntime {
    config: AnvilConfig,
    bot: BoxedBot,
    manager: Arc<FragmentManager>,
    dispatcher: Dispatcher,
    interactions: Arc<Interactions>,
    shutdown: CancellationToken,
    loops: Mutex<TaskLoops>,
    started_at: OnceLock<Instant>,
    running: AtomicBool,
}

impl AnvilRuntime {
    /// Creates a runtime builder.
    pub fn builder(bot: BoxedBot, catalog: Catalog) -> RuntimeBuilder {
        RuntimeBuilder::new(bot, catalog)
    }

    /// Creates a runtime from an already loaded configuration.
    ///
    /// Validates the configuration and initializes logging from it.
    pub fn from_config(config: &AnvilConfig, bot: BoxedBot, catalog: Catalog) -> RuntimeResult<Self> {
        validate_config(config)?;
        logging::init_from_config(&config.logging);

        let pattern = Regex::new(&config.fragments.pattern).map_err(|e| {
            ConfigError::InvalidPattern {
                pattern: config.fragments.pattern.clone(),
                reason: e.to_string(),
            }
        })?;
        let loader = FragmentLoader::with_options(
            catalog,
            ScanOptions {
                recursive: config.fragments.recursive,
                pattern,
            },
        );

        let manager = Arc::new(
            FragmentManager::new(bot.clone(), Arc::new(loader)).with_config(ManagerConfig {
                internal_commands: config.bot.internal_commands.iter().cloned().collect(),
                defaults: config.constraints.clone(),
            }),
        );

        let interactions = Arc::new(Interactions::new());
        let dispatcher = Dispatcher::new(
            CommandParser::new(config.bot.prefixes.iter().cloned(), config.bot.mention_prefix),
            manager.clone(),
        )
        .with_groups(UserGroups::from_map(&config.groups))
        .with_interactions(interactions.clone())
        .with_options(DispatchOptions {
            reply_errors: config.bot.reply_errors,
            reply_unknown: config.bot.reply_unknown,
            ignore_bots: config.bot.ignore_bots,
        });

        info!(
            prefixes = ?config.bot.prefixes,
            mention = config.bot.mention_prefix,
            log_level = %config.logging.level,
            "Runtime initialized from configuration"
        );

        Ok(Self {
            config: config.clone(),
            bot,
            manager,
            dispatcher,
            interactions,
            shutdown: CancellationToken::new(),
            loops: Mutex::new(TaskLoops::default()),
            started_at: OnceLock::new(),
            running: AtomicBool::new(false),
        })
    }

    /// The configuration.
    pub fn config(&self) -> &AnvilConfig {
        &self.config
    }

    /// The bot messages are answered through.
    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    /// The fragment manager.
    pub fn manager(&self) -> &Arc<FragmentManager> {
        &self.manager
    }

    /// The dispatcher.
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Returns whether the runtime is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Time since [`start`](Self::start), `None` before it.
    pub fn uptime(&self) -> Option<Duration> {
        self.started_at.get().map(Instant::elapsed)
    }

    /// A token cancelled by [`request_stop`](Self::request_stop).
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Enables the built-ins, loads the configured fragment directories and
    /// starts the task loops.
    pub async fn start(&self) -> RuntimeResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyRunning);
        }
        info!("Starting Anvil runtime");

        #[cfg(feature = "builtin")]
        {
            use anvil_framework::Package;
            use anvil_framework::builtin::help_package;

            if !self.manager.enable(&Package::from(help_package()), true, true).await {
                warn!("Built-in help command was not enabled");
            }
        }

        let mut enabled = 0;
        for dir in &self.config.fragments.internal_directories {
            enabled += self.load_directory(dir, true).await;
        }
        for dir in &self.config.fragments.directories {
            enabled += self.load_directory(dir, false).await;
        }

        self.restart_tasks().await;
        let _ = self.started_at.set(Instant::now());

        info!(
            fragments = enabled,
            commands = self.manager.commands().len(),
            services = self.manager.services().len(),
            tasks = self.manager.tasks().names().len(),
            "Runtime started"
        );
        Ok(())
    }

    async fn load_directory(&self, dir: &Path, internal: bool) -> usize {
        if !dir.exists() {
            debug!(directory = %dir.display(), "Fragment directory does not exist, skipping");
            return 0;
        }
        self.manager.load_directory(dir, internal).await
    }

    /// Stops task loops and services. Calling it twice is harmless.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            debug!("Runtime is not running");
            return;
        }
        info!("Stopping Anvil runtime");

        let loops = std::mem::take(&mut *self.loops.lock().await);
        loops.token.cancel();
        for handle in loops.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Task loop panicked");
            }
        }

        self.manager.stop_services().await;
        info!("Runtime stopped");
    }

    /// Starts, waits for Ctrl+C (or SIGTERM on unix), then stops.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.start().await?;
        info!("Anvil runtime is now running. Press Ctrl+C to stop.");
        tokio::select! {
            _ = wait_for_signal() => {}
            _ = self.shutdown.cancelled() => {}
        }
        self.stop().await;
        Ok(())
    }

    /// Starts, waits for `shutdown` or [`request_stop`](Self::request_stop),
    /// then stops.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: std::future::Future<Output = ()>,
    {
        self.start().await?;
        tokio::select! {
            _ = shutdown => {}
            _ = self.shutdown.cancelled() => {}
        }
        self.stop().await;
        Ok(())
    }

    /// Asks [`run`](Self::run) / [`run_until`](Self::run_until) to return.
    pub fn request_stop(&self) {
        self.shutdown.cancel();
    }

    // =========================================================================
    // Messages
    // =========================================================================

    /// Routes one inbound message.
    ///
    /// Pending response listeners see the message first; a consumed message
    /// yields `None`. Adapters should call this from a spawned task per
    /// message so a command awaiting a response does not block the next one.
    pub async fn handle_message(&self, message: InboundMessage) -> Option<DispatchOutcome> {
        let message = Arc::new(message);
        if self.interactions.offer(&message) {
            debug!(author = %message.author.id, "Message consumed by a pending interaction");
            return None;
        }
        Some(self.dispatcher.dispatch(message, self.bot.clone()).await)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Reloads every loaded fragment file and restarts the task loops.
    pub async fn reload_all(&self) -> usize {
        let reloaded = self.manager.reload_all().await;
        self.restart_tasks().await;
        reloaded
    }

    /// Reloads the file a command came from.
    pub async fn reload(&self, name: &str) -> bool {
        self.manager.reload(name).await
    }

    /// Stops the current task loops and spawns one per registered task.
    pub async fn restart_tasks(&self) {
        let mut loops = self.loops.lock().await;
        let previous = std::mem::take(&mut *loops);
        previous.token.cancel();
        for handle in previous.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "Task loop panicked");
            }
        }

        loops.token = CancellationToken::new();
        for entry in self.manager.tasks().snapshot() {
            let token = loops.token.clone();
            loops.handles.push(spawn_task_loop(entry, token));
        }
    }
}

fn spawn_task_loop(entry: TaskEntry, token: CancellationToken) -> JoinHandle<()> {
    let period = entry.spec.interval;
    let name = entry.spec.name().to_string();
    debug!(task = %name, interval = ?period, "Starting task loop");

    tokio::spawn(async move {
        let first = if entry.spec.run_immediately {
            Instant::now()
        } else {
            Instant::now() + period
        };
        let mut ticker = tokio::time::interval_at(first, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    match AssertUnwindSafe(entry.handler.run()).catch_unwind().await {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => warn!(task = %name, error = %e, "Task iteration failed"),
                        Err(payload) => error!(
                            task = %name,
                            error = %PanicError::from_payload(payload),
                            "Task iteration panicked"
                        ),
                    }
                }
            }
        }
        debug!(task = %name, "Task loop stopped");
    })
}

async fn wait_for_signal() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Cannot listen for SIGTERM"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Cannot listen for Ctrl+C"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for an [`AnvilRuntime`] with layered configuration.
pub struct RuntimeBuilder {
    bot: BoxedBot,
    catalog: Catalog,
    config_loader: ConfigLoader,
}

impl RuntimeBuilder {
    /// Creates a builder that searches the current directory.
    pub fn new(bot: BoxedBot, catalog: Catalog) -> Self {
        Self {
            bot,
            catalog,
            config_loader: ConfigLoader::new().with_current_dir(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Disables loading environment variables.
    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: AnvilConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Loads the configuration and builds the runtime.
    pub fn build(self) -> RuntimeResult<AnvilRuntime> {
        let config = self.config_loader.load()?;
        AnvilRuntime::from_config(&config, self.bot, self.catalog)
    }
}
