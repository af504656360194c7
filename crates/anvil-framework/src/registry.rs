//! The command registry.
//!
//! Names and aliases share one case-insensitive namespace. A registration
//! that collides with any existing name or alias is rejected as a whole, and
//! every mutation happens under a single write guard so a concurrent lookup
//! never sees a half-applied change.
//!
//! A *released* command keeps its names and package but drops the live
//! instance; the manager revives it from the package on next use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::command::Command;
use crate::fragment::CommandPackage;

/// A registration request.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    /// Primary name.
    pub name: String,
    /// Alternative names.
    pub aliases: Vec<String>,
    /// The live command.
    pub instance: Arc<Command>,
    /// Package used to rebuild the command after a release.
    pub package: Option<CommandPackage>,
    /// Manifest the command was loaded from.
    pub path: Option<PathBuf>,
    /// Enabled from an internal directory.
    pub internal: bool,
}

impl RegistryEntry {
    /// Creates an entry for a live command, taking name and aliases from it.
    pub fn new(command: impl Into<Arc<Command>>) -> Self {
        let instance = command.into();
        Self {
            name: instance.name().to_string(),
            aliases: instance.spec().aliases.clone(),
            instance,
            package: None,
            path: None,
            internal: false,
        }
    }

    /// Attaches the package the command was built from.
    pub fn package(mut self, package: CommandPackage) -> Self {
        self.package = Some(package);
        self
    }

    /// Attaches the manifest path the command was loaded from.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Marks the command as internal.
    pub fn internal(mut self, internal: bool) -> Self {
        self.internal = internal;
        self
    }
}

/// Read-only view of one registration.
#[derive(Debug, Clone)]
pub struct RegisteredCommand {
    /// Primary name.
    pub name: String,
    /// Alternative names.
    pub aliases: Vec<String>,
    /// `None` while released.
    pub instance: Option<Arc<Command>>,
    /// Manifest path, if loaded from a file.
    pub path: Option<PathBuf>,
    /// Enabled as an internal command.
    pub internal: bool,
}

impl RegisteredCommand {
    /// Returns `true` while the command is released.
    pub fn is_released(&self) -> bool {
        self.instance.is_none()
    }
}

/// Result of resolving an invoked name.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The command is live.
    Live(Arc<Command>),
    /// The command is registered but released; `name` is its primary name.
    Released { name: String },
}

struct Slot {
    name: String,
    aliases: Vec<String>,
    instance: Option<Arc<Command>>,
    package: Option<CommandPackage>,
    path: Option<PathBuf>,
    internal: bool,
}

#[derive(Default)]
struct Tables {
    /// Lower-cased primary name → slot.
    commands: HashMap<String, Slot>,
    /// Lower-cased alias → lower-cased primary name.
    aliases: HashMap<String, String>,
}

impl Tables {
    /// Returns `true` if `key` is unused, or used only by the command `owner`.
    fn is_free(&self, key: &str, owner: Option<&str>) -> bool {
        if self.commands.contains_key(key) {
            return owner == Some(key);
        }
        match self.aliases.get(key) {
            Some(primary) => owner == Some(primary.as_str()),
            None => true,
        }
    }

    fn primary_of(&self, key: &str) -> Option<&str> {
        if let Some((primary, _)) = self.commands.get_key_value(key) {
            return Some(primary.as_str());
        }
        self.aliases.get(key).map(String::as_str)
    }
}

/// Name/alias → command.
#[derive(Default)]
pub struct CommandRegistry {
    tables: RwLock<Tables>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command.
    ///
    /// Fails without changing anything if the name or any alias is already
    /// taken (as a name or as an alias), or if the entry repeats itself.
    pub fn register(&self, entry: RegistryEntry) -> bool {
        self.put(entry, false)
    }

    /// Registers a command in place of the one with the same name.
    ///
    /// The old registration and its aliases are dropped in the same step the
    /// new one is inserted. Fails without changing anything if a name or
    /// alias of the entry belongs to a different command.
    pub fn replace(&self, entry: RegistryEntry) -> bool {
        self.put(entry, true)
    }

    fn put(&self, entry: RegistryEntry, replace: bool) -> bool {
        let key = entry.name.to_lowercase();
        let mut alias_keys: Vec<String> = Vec::with_capacity(entry.aliases.len());
        for alias in &entry.aliases {
            let alias = alias.to_lowercase();
            if alias == key || alias_keys.contains(&alias) {
                return false;
            }
            alias_keys.push(alias);
        }

        let mut tables = self.tables.write();
        let owner = replace.then_some(key.as_str());
        if !tables.is_free(&key, owner) || alias_keys.iter().any(|a| !tables.is_free(a, owner)) {
            return false;
        }

        if replace {
            tables.aliases.retain(|_, primary| *primary != key);
            tables.commands.remove(&key);
        }
        for alias in &alias_keys {
            tables.aliases.insert(alias.clone(), key.clone());
        }
        tables.commands.insert(
            key,
            Slot {
                name: entry.name,
                aliases: entry.aliases,
                instance: Some(entry.instance),
                package: entry.package,
                path: entry.path,
                internal: entry.internal,
            },
        );
        true
    }

    /// Removes `name` together with `aliases`.
    ///
    /// All-or-nothing: if `name` is not registered, or any given alias is not
    /// mapped to `name`, nothing changes and `false` is returned. Aliases of
    /// the command that were not listed are removed as well.
    pub fn remove(&self, name: &str, aliases: &[String]) -> bool {
        let key = name.to_lowercase();
        let mut tables = self.tables.write();
        if !tables.commands.contains_key(&key) {
            return false;
        }
        let consistent = aliases
            .iter()
            .all(|alias| tables.aliases.get(&alias.to_lowercase()) == Some(&key));
        if !consistent {
            return false;
        }

        tables.aliases.retain(|_, primary| *primary != key);
        tables.commands.remove(&key);
        true
    }

    /// Removes `name` with its own aliases.
    pub fn unregister(&self, name: &str) -> bool {
        let key = name.to_lowercase();
        let mut tables = self.tables.write();
        if tables.commands.remove(&key).is_none() {
            return false;
        }
        tables.aliases.retain(|_, primary| *primary != key);
        true
    }

    /// Returns `true` if `name` is a registered primary name.
    pub fn contains(&self, name: &str) -> bool {
        self.tables.read().commands.contains_key(&name.to_lowercase())
    }

    /// Returns the live command registered under the primary `name`.
    pub fn get(&self, name: &str) -> Option<Arc<Command>> {
        self.tables
            .read()
            .commands
            .get(&name.to_lowercase())
            .and_then(|slot| slot.instance.clone())
    }

    /// Resolves a name or alias.
    pub fn resolve(&self, base: &str) -> Option<Lookup> {
        let tables = self.tables.read();
        let key = tables.primary_of(&base.to_lowercase())?;
        let slot = tables.commands.get(key)?;
        Some(match &slot.instance {
            Some(command) => Lookup::Live(command.clone()),
            None => Lookup::Released {
                name: slot.name.clone(),
            },
        })
    }

    /// Snapshot of every registration, sorted by name.
    pub fn all(&self) -> Vec<RegisteredCommand> {
        let tables = self.tables.read();
        let mut all: Vec<RegisteredCommand> = tables
            .commands
            .values()
            .map(|slot| RegisteredCommand {
                name: slot.name.clone(),
                aliases: slot.aliases.clone(),
                instance: slot.instance.clone(),
                path: slot.path.clone(),
                internal: slot.internal,
            })
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.tables.read().commands.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.tables.read().commands.is_empty()
    }

    /// Drops the live instance of `name`, keeping its registration.
    ///
    /// Only commands with a stored package can be released, since revival
    /// rebuilds from it.
    pub fn release(&self, name: &str) -> bool {
        let mut tables = self.tables.write();
        match tables.commands.get_mut(&name.to_lowercase()) {
            Some(slot) if slot.package.is_some() && slot.instance.is_some() => {
                slot.instance = None;
                true
            }
            _ => false,
        }
    }

    /// Returns `true` if `name` is registered and released.
    pub fn is_released(&self, name: &str) -> bool {
        self.tables
            .read()
            .commands
            .get(&name.to_lowercase())
            .is_some_and(|slot| slot.instance.is_none())
    }

    /// Puts a live instance back into a released registration.
    pub fn restore(&self, name: &str, instance: Arc<Command>) -> bool {
        let mut tables = self.tables.write();
        match tables.commands.get_mut(&name.to_lowercase()) {
            Some(slot) if slot.instance.is_none() => {
                slot.instance = Some(instance);
                true
            }
            _ => false,
        }
    }

    /// The package `name` was built from.
    pub fn package_of(&self, name: &str) -> Option<CommandPackage> {
        self.tables
            .read()
            .commands
            .get(&name.to_lowercase())
            .and_then(|slot| slot.package.clone())
    }

    /// The manifest path `name` was loaded from.
    pub fn path_of(&self, name: &str) -> Option<PathBuf> {
        self.tables
            .read()
            .commands
            .get(&name.to_lowercase())
            .and_then(|slot| slot.path.clone())
    }

    /// Returns `true` if `name` was enabled as internal.
    pub fn is_internal(&self, name: &str) -> bool {
        self.tables
            .read()
            .commands
            .get(&name.to_lowercase())
            .is_some_and(|slot| slot.internal)
    }

    /// Primary names of commands loaded from `path`.
    pub fn names_from(&self, path: &Path) -> Vec<String> {
        self.tables
            .read()
            .commands
            .values()
            .filter(|slot| slot.path.as_deref() == Some(path))
            .map(|slot| slot.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::decorator::{Decoratable, aliases};
    use crate::command::CommandSpec;

    fn command(name: &str, alias_list: &[&str]) -> Command {
        let spec = CommandSpec::new(name)
            .decorate(aliases(alias_list.iter().copied()))
            .unwrap();
        Command::from_fn(spec, |_ctx| async { Ok(()) })
    }

    fn package(name: &'static str) -> CommandPackage {
        CommandPackage::new(move || command(name, &[]))
    }

    #[test]
    fn test_double_register_fails() {
        let registry = CommandRegistry::new();
        assert!(registry.register(RegistryEntry::new(command("ping", &[]))));
        assert!(!registry.register(RegistryEntry::new(command("ping", &[]))));
        assert!(!registry.register(RegistryEntry::new(command("PING", &[]))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove_then_register() {
        let registry = CommandRegistry::new();
        assert!(registry.register(RegistryEntry::new(command("ping", &["p"]))));
        assert!(registry.remove("ping", &["p".to_string()]));
        assert!(!registry.contains("ping"));
        assert!(registry.resolve("p").is_none());
        assert!(registry.register(RegistryEntry::new(command("ping", &["p"]))));
    }

    #[test]
    fn test_alias_namespace_is_shared() {
        let registry = CommandRegistry::new();
        assert!(registry.register(RegistryEntry::new(command("ping", &["p"]))));

        // Alias colliding with a name.
        assert!(!registry.register(RegistryEntry::new(command("pong", &["ping"]))));
        // Name colliding with an alias.
        assert!(!registry.register(RegistryEntry::new(command("p", &[]))));
        // Nothing partially applied.
        assert!(!registry.contains("pong"));
        assert!(registry.register(RegistryEntry::new(command("pong", &["po"]))));
    }

    #[test]
    fn test_remove_is_all_or_nothing() {
        let registry = CommandRegistry::new();
        registry.register(RegistryEntry::new(command("ping", &["p"])));
        registry.register(RegistryEntry::new(command("pong", &["po"])));

        assert!(!registry.remove("ping", &["p".to_string(), "po".to_string()]));
        assert!(registry.contains("ping"));
        assert!(matches!(registry.resolve("p"), Some(Lookup::Live(_))));
        assert!(matches!(registry.resolve("po"), Some(Lookup::Live(_))));

        assert!(!registry.remove("missing", &[]));
        assert!(registry.unregister("pong"));
        assert!(registry.resolve("po").is_none());
    }

    #[test]
    fn test_resolve_by_alias_case_insensitive() {
        let registry = CommandRegistry::new();
        registry.register(RegistryEntry::new(command("Ping", &["P"])));
        match registry.resolve("p") {
            Some(Lookup::Live(cmd)) => assert_eq!(cmd.name(), "Ping"),
            other => panic!("unexpected lookup: {other:?}"),
        }
        assert!(registry.get("PING").is_some());
        assert!(registry.get("p").is_none());
    }

    #[test]
    fn test_release_and_restore() {
        let registry = CommandRegistry::new();
        let pkg = package("ping");
        let instance = pkg.instantiate().unwrap();
        assert!(registry.register(RegistryEntry::new(instance).package(pkg.clone())));

        assert!(registry.release("ping"));
        assert!(registry.is_released("ping"));
        assert!(!registry.release("ping"));
        assert!(registry.contains("ping"));
        assert!(registry.get("ping").is_none());
        assert!(matches!(
            registry.resolve("ping"),
            Some(Lookup::Released { ref name }) if name == "ping"
        ));

        let revived = Arc::new(registry.package_of("ping").unwrap().instantiate().unwrap());
        assert!(registry.restore("ping", revived));
        assert!(!registry.is_released("ping"));
        assert!(registry.get("ping").is_some());
    }

    #[test]
    fn test_replace_is_atomic() {
        let registry = CommandRegistry::new();
        registry.register(RegistryEntry::new(command("ping", &["p"])));
        registry.register(RegistryEntry::new(command("pong", &["po"])));

        // New aliases may reuse the old command's aliases.
        assert!(registry.replace(RegistryEntry::new(command("ping", &["p", "pi"]))));
        assert!(matches!(registry.resolve("pi"), Some(Lookup::Live(_))));

        // Colliding with another command leaves the old registration intact.
        assert!(!registry.replace(RegistryEntry::new(command("ping", &["po"]))));
        assert!(matches!(registry.resolve("pi"), Some(Lookup::Live(_))));
        match registry.resolve("po") {
            Some(Lookup::Live(cmd)) => assert_eq!(cmd.name(), "pong"),
            other => panic!("unexpected lookup: {other:?}"),
        }

        // Replacing a name that does not exist behaves like register.
        assert!(registry.replace(RegistryEntry::new(command("pang", &[]))));
    }

    #[test]
    fn test_release_requires_package() {
        let registry = CommandRegistry::new();
        registry.register(RegistryEntry::new(command("ping", &[])));
        assert!(!registry.release("ping"));
        assert!(!registry.is_released("ping"));
    }

    #[test]
    fn test_all_snapshot() {
        let registry = CommandRegistry::new();
        registry.register(
            RegistryEntry::new(command("pong", &[]))
                .path("/tmp/pong.fragment.toml")
                .internal(true),
        );
        registry.register(RegistryEntry::new(command("ping", &["p"])));

        let all = registry.all();
        let names: Vec<_> = all.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["ping", "pong"]);
        assert!(all[1].internal);
        assert!(registry.is_internal("pong"));
        assert_eq!(
            registry.names_from(Path::new("/tmp/pong.fragment.toml")),
            vec!["pong"]
        );
    }
}
