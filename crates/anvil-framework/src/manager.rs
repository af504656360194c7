//! Fragment lifecycle management.
//!
//! [`FragmentManager`] owns the command, service and task registries and is
//! the only place fragments enter them. It:
//!
//! - Instantiates [`Package`]s and matches on their kind.
//! - Rejects fragments whose metadata fails validation, internal commands
//!   missing from the allow-list, commands with unmet service dependencies
//!   or unregistered argument types, and commands whose `enabled()` gate
//!   says no.
//! - Resolves each command's constraints over the configured defaults.
//! - Reloads, releases and revives commands.
//!
//! Every rejection is a `false` plus a log line; nothing here panics or
//! returns an error for an expected outcome.
//!
//! ```text
//! Package ──► instantiate ──► validate ──► internal? ──► depends_on ──► types
//!                                                                        │
//!                   register ◄── overwrite? ◄── enabled() ◄── defaults ◄─┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = Arc::new(FragmentManager::new(bot, loader));
//! manager.load_directory(Path::new("fragments"), false).await;
//! manager.enable(&Package::from(help_package()), true, true).await;
//! ```

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anvil_core::BoxedBot;
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::command::{Command, ConstraintDefaults, TypeRegistry};
use crate::fragment::{self, CommandPackage, FragmentMeta, Package};
use crate::loader::{FragmentLoader, Module};
use crate::registry::{CommandRegistry, RegistryEntry};
use crate::service::{Service, ServiceRegistry};
use crate::task::TaskRegistry;

/// Manager settings.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Lower-cased names internal commands must have.
    pub internal_commands: BTreeSet<String>,
    /// Constraint defaults merged under every command.
    pub defaults: ConstraintDefaults,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            internal_commands: BTreeSet::from(["help".to_string()]),
            defaults: ConstraintDefaults::default(),
        }
    }
}

/// Owns the fragment registries.
pub struct FragmentManager {
    bot: BoxedBot,
    loader: Arc<FragmentLoader>,
    config: ManagerConfig,
    types: Arc<TypeRegistry>,
    commands: CommandRegistry,
    services: ServiceRegistry,
    tasks: TaskRegistry,
    /// Held from reading a file until its fragment is registered.
    reloads: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl FragmentManager {
    /// Creates a manager with the default configuration and the built-in
    /// argument types.
    pub fn new(bot: BoxedBot, loader: Arc<FragmentLoader>) -> Self {
        Self {
            bot,
            loader,
            config: ManagerConfig::default(),
            types: Arc::new(TypeRegistry::with_builtins()),
            commands: CommandRegistry::new(),
            services: ServiceRegistry::new(),
            tasks: TaskRegistry::new(),
            reloads: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ManagerConfig) -> Self {
        self.config = ManagerConfig {
            internal_commands: config
                .internal_commands
                .iter()
                .map(|name| name.to_lowercase())
                .collect(),
            ..config
        };
        self
    }

    /// Replaces the argument type registry.
    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = Arc::new(types);
        self
    }

    /// The bot fragments are enabled against.
    pub fn bot(&self) -> &BoxedBot {
        &self.bot
    }

    /// The fragment loader.
    pub fn loader(&self) -> &Arc<FragmentLoader> {
        &self.loader
    }

    /// The configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Registered argument types.
    pub fn types(&self) -> &Arc<TypeRegistry> {
        &self.types
    }

    /// The command registry.
    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// The service registry.
    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// The task registry.
    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    // =========================================================================
    // Enabling
    // =========================================================================

    /// Enables a fragment.
    ///
    /// With `overwrite`, a fragment of the same name is replaced; without it
    /// the new one is rejected.
    pub async fn enable(&self, package: &Package, internal: bool, overwrite: bool) -> bool {
        self.enable_from(package, None, internal, overwrite).await
    }

    /// Enables a loaded module, remembering its path for reloads.
    pub async fn enable_module(&self, module: &Module, internal: bool) -> bool {
        self.enable_from(&module.package, Some(&module.path), internal, true)
            .await
    }

    /// Enables every package, returning how many succeeded.
    pub async fn enable_multiple(&self, packages: &[Package], internal: bool) -> usize {
        let mut enabled = 0;
        for package in packages {
            if self.enable(package, internal, true).await {
                enabled += 1;
            }
        }
        enabled
    }

    /// Discovers and enables every fragment under `directory`.
    pub async fn load_directory(&self, directory: &Path, internal: bool) -> usize {
        let modules = match self.loader.discover(directory).await {
            Ok(modules) => modules,
            Err(e) => {
                warn!(directory = %directory.display(), error = %e, "Cannot load fragment directory");
                return 0;
            }
        };

        let mut enabled = 0;
        for module in &modules {
            if self.enable_module(module, internal).await {
                enabled += 1;
            }
        }
        info!(
            directory = %directory.display(),
            found     = modules.len(),
            enabled,
            "Fragment directory loaded"
        );
        enabled
    }

    async fn enable_from(
        &self,
        package: &Package,
        path: Option<&Path>,
        internal: bool,
        overwrite: bool,
    ) -> bool {
        match package {
            Package::Command(pkg) => self.enable_command(pkg, path, internal, overwrite).await,
            Package::Service(pkg) => {
                if !self.admit(&pkg.meta, self.services.contains(&pkg.meta.name), overwrite) {
                    return false;
                }
                let service = pkg.build(self.bot.clone());
                self.install_service(&pkg.meta, service).await
            }
            Package::ForkedService(pkg) => {
                if !self.admit(&pkg.meta, self.services.contains(&pkg.meta.name), overwrite) {
                    return false;
                }
                let service = pkg.build();
                self.install_service(&pkg.meta, service).await
            }
            Package::Task(pkg) => {
                let meta = &pkg.spec.meta;
                if !self.admit(meta, self.tasks.contains(&meta.name), overwrite) {
                    return false;
                }
                if pkg.spec.interval.is_zero() {
                    warn!(task = %meta.name, "Task interval must be non-zero");
                    return false;
                }
                self.tasks.register(pkg.build());
                info!(task = %meta.name, interval = ?pkg.spec.interval, "Task registered");
                true
            }
        }
    }

    /// Validation and overwrite checks shared by services and tasks.
    fn admit(&self, meta: &FragmentMeta, exists: bool, overwrite: bool) -> bool {
        if !fragment::validate(meta) {
            warn!(fragment = %meta.name, "Fragment failed metadata validation");
            return false;
        }
        if exists && !overwrite {
            warn!(fragment = %meta.name, "Fragment already registered");
            return false;
        }
        true
    }

    async fn install_service(&self, meta: &FragmentMeta, service: Arc<dyn Service>) -> bool {
        if let Some(previous) = self.services.get(&meta.name) {
            previous.stop().await;
            debug!(service = %meta.name, "Previous service stopped");
        }
        self.services.register(&meta.name, service.clone());

        if let Err(e) = service.start().await {
            error!(service = %meta.name, error = %e, "Service failed to start");
        } else {
            info!(service = %meta.name, "Service registered");
        }
        true
    }

    async fn enable_command(
        &self,
        package: &CommandPackage,
        path: Option<&Path>,
        internal: bool,
        overwrite: bool,
    ) -> bool {
        let mut command = match package.instantiate() {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Cannot instantiate command");
                return false;
            }
        };
        let name = command.name().to_string();

        if !fragment::validate(command.meta()) {
            warn!(command = %name, "Command failed metadata validation");
            return false;
        }

        if internal && !self.config.internal_commands.contains(&name.to_lowercase()) {
            warn!(command = %name, "Internal command not in allow-list");
            return false;
        }

        let missing: Vec<&String> = command
            .spec()
            .depends_on
            .iter()
            .filter(|service| !self.services.contains(service))
            .collect();
        if !missing.is_empty() {
            warn!(command = %name, missing = ?missing, "Command dependencies not satisfied");
            return false;
        }

        for arg in &command.spec().args {
            if let Some(kind) = arg
                .kind
                .custom_names()
                .into_iter()
                .find(|kind| !self.types.contains(kind))
            {
                warn!(
                    command  = %name,
                    argument = %arg.name,
                    kind,
                    "Command argument uses an unregistered type"
                );
                return false;
            }
        }

        command.apply_defaults(&self.config.defaults);

        if !command.handler().enabled().await {
            info!(command = %name, "Command declined to enable");
            return false;
        }

        if self.commands.contains(&name) && !overwrite {
            warn!(command = %name, "Command already registered");
            return false;
        }

        let mut entry = RegistryEntry::new(command)
            .package(package.clone())
            .internal(internal);
        if let Some(path) = path {
            entry = entry.path(path);
        }

        let registered = if overwrite {
            self.commands.replace(entry)
        } else {
            self.commands.register(entry)
        };
        if registered {
            info!(command = %name, internal, "Command registered");
        } else {
            warn!(command = %name, "Command name or alias already taken");
        }
        registered
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Reloads the file `name` was loaded from and re-enables it.
    pub async fn reload(&self, name: &str) -> bool {
        let Some(path) = self.commands.path_of(name) else {
            warn!(command = %name, "Command has no backing file to reload");
            return false;
        };
        let internal = self.commands.is_internal(name);
        self.reload_path(&path, internal).await
    }

    /// Reloads every loaded file, returning how many fragments re-enabled.
    pub async fn reload_all(&self) -> usize {
        let mut enabled = 0;
        for path in self.loader.cached_paths() {
            let internal = self
                .commands
                .names_from(&path)
                .iter()
                .any(|name| self.commands.is_internal(name));
            if self.reload_path(&path, internal).await {
                enabled += 1;
            }
        }
        enabled
    }

    /// Reloads and re-enables one file. Reloads of the same path register in
    /// the order they read the file.
    async fn reload_path(&self, path: &Path, internal: bool) -> bool {
        let lock = self
            .reloads
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone();
        let _held = lock.lock().await;

        let Some(module) = self.loader.reload(path).await else {
            return false;
        };
        self.enable_module(&module, internal).await
    }

    /// Removes a command and its aliases.
    pub fn remove_command(&self, name: &str) -> bool {
        let removed = self.commands.unregister(name);
        if removed {
            info!(command = %name, "Command removed");
        }
        removed
    }

    /// Drops the live instance of a command; it is revived on next use.
    pub fn release(&self, name: &str) -> bool {
        let released = self.commands.release(name);
        if released {
            info!(command = %name, "Command released");
        } else {
            debug!(command = %name, "Command cannot be released");
        }
        released
    }

    /// Returns the live instance of `name`, rebuilding it if released.
    pub async fn revive(&self, name: &str) -> Option<Arc<Command>> {
        if !self.commands.is_released(name) {
            return self.commands.get(name);
        }

        let package = self.commands.package_of(name)?;
        let mut command = match package.instantiate() {
            Ok(command) => command,
            Err(e) => {
                error!(command = %name, error = %e, "Cannot revive command");
                return None;
            }
        };
        command.apply_defaults(&self.config.defaults);
        let command = Arc::new(command);

        if self.commands.restore(name, command.clone()) {
            info!(command = %name, "Command revived");
            Some(command)
        } else {
            // Revived concurrently.
            self.commands.get(name)
        }
    }

    /// Stops and removes every service.
    pub async fn stop_services(&self) {
        for (name, service) in self.services.drain() {
            service.stop().await;
            debug!(service = %name, "Service stopped");
        }
    }
}
