//! Packages: what a fragment entry point produces before it is enabled.
//!
//! A package knows how to build a fresh instance of its fragment. Commands
//! are built on every enable (and on revival after a release), so a command
//! package stores a factory plus any decorators layered on top of it by a
//! manifest.

use std::fmt;
use std::sync::Arc;

use anvil_core::BoxedBot;

use super::{FragmentKind, FragmentMeta};
use crate::command::Command;
use crate::command::decorator::{Decoratable, Decorator};
use crate::error::DecoratorError;
use crate::service::Service;
use crate::task::{TaskEntry, TaskHandler, TaskSpec};

/// Builds a fresh command.
pub type CommandFactory = Arc<dyn Fn() -> Command + Send + Sync>;

/// Builds a service that shares the bot reference.
pub type ServiceFactory = Arc<dyn Fn(BoxedBot) -> Arc<dyn Service> + Send + Sync>;

/// Builds a detached service.
pub type ForkedServiceFactory = Arc<dyn Fn() -> Arc<dyn Service> + Send + Sync>;

/// Builds a task body.
pub type TaskFactory = Arc<dyn Fn() -> Arc<dyn TaskHandler> + Send + Sync>;

/// A command entry point.
#[derive(Clone)]
pub struct CommandPackage {
    factory: CommandFactory,
    overrides: Vec<Decorator>,
}

impl CommandPackage {
    /// Creates a package from a factory.
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Command + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            overrides: Vec::new(),
        }
    }

    /// Layers decorators on top of whatever the factory builds.
    pub fn with_decorators(mut self, decorators: impl IntoIterator<Item = Decorator>) -> Self {
        self.overrides.extend(decorators);
        self
    }

    /// Decorators applied on instantiation.
    pub fn overrides(&self) -> &[Decorator] {
        &self.overrides
    }

    /// Builds a fresh command with the overrides applied.
    pub fn instantiate(&self) -> Result<Command, DecoratorError> {
        (self.factory)().decorate_all(self.overrides.iter().cloned())
    }
}

impl fmt::Debug for CommandPackage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandPackage")
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

/// A service entry point.
#[derive(Clone)]
pub struct ServicePackage {
    /// Service metadata.
    pub meta: FragmentMeta,
    factory: ServiceFactory,
}

impl ServicePackage {
    /// Creates a package.
    pub fn new<F>(meta: FragmentMeta, factory: F) -> Self
    where
        F: Fn(BoxedBot) -> Arc<dyn Service> + Send + Sync + 'static,
    {
        Self {
            meta,
            factory: Arc::new(factory),
        }
    }

    /// Builds the service.
    pub fn build(&self, bot: BoxedBot) -> Arc<dyn Service> {
        (self.factory)(bot)
    }
}

impl Decoratable for ServicePackage {
    fn kind(&self) -> FragmentKind {
        FragmentKind::Service
    }

    fn decorate(mut self, decorator: Decorator) -> Result<Self, DecoratorError> {
        decorator.apply_meta_only(&mut self.meta, FragmentKind::Service)?;
        Ok(self)
    }
}

/// A detached service entry point.
#[derive(Clone)]
pub struct ForkedServicePackage {
    /// Service metadata.
    pub meta: FragmentMeta,
    factory: ForkedServiceFactory,
}

impl ForkedServicePackage {
    /// Creates a package.
    pub fn new<F>(meta: FragmentMeta, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Service> + Send + Sync + 'static,
    {
        Self {
            meta,
            factory: Arc::new(factory),
        }
    }

    /// Builds the service.
    pub fn build(&self) -> Arc<dyn Service> {
        (self.factory)()
    }
}

impl Decoratable for ForkedServicePackage {
    fn kind(&self) -> FragmentKind {
        FragmentKind::ForkedService
    }

    fn decorate(mut self, decorator: Decorator) -> Result<Self, DecoratorError> {
        decorator.apply_meta_only(&mut self.meta, FragmentKind::ForkedService)?;
        Ok(self)
    }
}

/// A task entry point.
#[derive(Clone)]
pub struct TaskPackage {
    /// Name and schedule.
    pub spec: TaskSpec,
    factory: TaskFactory,
}

impl TaskPackage {
    /// Creates a package.
    pub fn new<F>(spec: TaskSpec, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn TaskHandler> + Send + Sync + 'static,
    {
        Self {
            spec,
            factory: Arc::new(factory),
        }
    }

    /// Builds a registry entry.
    pub fn build(&self) -> TaskEntry {
        TaskEntry {
            spec: self.spec.clone(),
            handler: (self.factory)(),
        }
    }
}

impl Decoratable for TaskPackage {
    fn kind(&self) -> FragmentKind {
        FragmentKind::Task
    }

    fn decorate(mut self, decorator: Decorator) -> Result<Self, DecoratorError> {
        self.spec = self.spec.decorate(decorator)?;
        Ok(self)
    }
}

/// Any fragment entry point, tagged with its kind.
#[derive(Clone)]
pub enum Package {
    /// A command, instantiated on every enable and revive.
    Command(CommandPackage),
    /// A service built against the bot.
    Service(ServicePackage),
    /// A service built without the bot.
    ForkedService(ForkedServicePackage),
    /// A periodic task.
    Task(TaskPackage),
}

impl Package {
    /// The fragment kind.
    pub fn kind(&self) -> FragmentKind {
        match self {
            Package::Command(_) => FragmentKind::Command,
            Package::Service(_) => FragmentKind::Service,
            Package::ForkedService(_) => FragmentKind::ForkedService,
            Package::Task(_) => FragmentKind::Task,
        }
    }

    /// Metadata of the fragment this package builds.
    ///
    /// Command packages are instantiated to read it, which also surfaces any
    /// error in their overrides.
    pub fn meta(&self) -> Result<FragmentMeta, DecoratorError> {
        match self {
            Package::Command(pkg) => pkg.instantiate().map(|cmd| cmd.meta().clone()),
            Package::Service(pkg) => Ok(pkg.meta.clone()),
            Package::ForkedService(pkg) => Ok(pkg.meta.clone()),
            Package::Task(pkg) => Ok(pkg.spec.meta.clone()),
        }
    }

    /// Layers decorators over the package.
    ///
    /// Command overrides are kept and applied on every instantiation; other
    /// kinds are decorated immediately.
    pub fn with_decorators(self, decorators: Vec<Decorator>) -> Result<Self, DecoratorError> {
        Ok(match self {
            Package::Command(pkg) => Package::Command(pkg.with_decorators(decorators)),
            Package::Service(pkg) => Package::Service(pkg.decorate_all(decorators)?),
            Package::ForkedService(pkg) => Package::ForkedService(pkg.decorate_all(decorators)?),
            Package::Task(pkg) => Package::Task(pkg.decorate_all(decorators)?),
        })
    }
}

impl From<CommandPackage> for Package {
    fn from(pkg: CommandPackage) -> Self {
        Package::Command(pkg)
    }
}

impl From<ServicePackage> for Package {
    fn from(pkg: ServicePackage) -> Self {
        Package::Service(pkg)
    }
}

impl From<ForkedServicePackage> for Package {
    fn from(pkg: ForkedServicePackage) -> Self {
        Package::ForkedService(pkg)
    }
}

impl From<TaskPackage> for Package {
    fn from(pkg: TaskPackage) -> Self {
        Package::Task(pkg)
    }
}

impl fmt::Debug for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Package::Command(pkg) => f.debug_tuple("Command").field(pkg).finish(),
            Package::Service(pkg) => f.debug_tuple("Service").field(&pkg.meta).finish(),
            Package::ForkedService(pkg) => f.debug_tuple("ForkedService").field(&pkg.meta).finish(),
            Package::Task(pkg) => f.debug_tuple("Task").field(&pkg.spec).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandSpec;
    use crate::command::decorator::{aliases, cooldown, description};
    use std::time::Duration;

    fn ping() -> CommandPackage {
        CommandPackage::new(|| {
            Command::from_fn(CommandSpec::new("ping"), |_ctx| async { Ok(()) })
        })
    }

    #[test]
    fn test_instantiate_is_fresh_and_decorated() {
        let pkg = ping().with_decorators([aliases(["p"]), cooldown(Duration::from_secs(5))]);
        let a = pkg.instantiate().unwrap();
        let b = pkg.instantiate().unwrap();
        assert_eq!(a.spec().aliases, vec!["p"]);
        assert_eq!(a.cooldown(), Duration::from_secs(5));
        assert!(!Arc::ptr_eq(a.handler(), b.handler()));
    }

    #[test]
    fn test_package_kind_and_meta() {
        let pkg = Package::from(ping());
        assert_eq!(pkg.kind(), FragmentKind::Command);
        assert_eq!(pkg.meta().unwrap().name, "ping");

        let pkg = pkg.with_decorators(vec![description("Pong!")]).unwrap();
        assert_eq!(pkg.meta().unwrap().description.as_deref(), Some("Pong!"));
    }

    #[test]
    fn test_command_override_on_service_fails() {
        struct Noop;
        #[async_trait::async_trait]
        impl Service for Noop {
            fn as_any(self: Arc<Self>) -> Arc<dyn std::any::Any + Send + Sync> {
                self
            }
        }

        let pkg = Package::from(ForkedServicePackage::new(FragmentMeta::new("noop"), || {
            Arc::new(Noop) as Arc<dyn Service>
        }));
        let err = pkg
            .with_decorators(vec![cooldown(Duration::from_secs(1))])
            .unwrap_err();
        assert!(matches!(
            err,
            DecoratorError::InvalidDecoratorTarget {
                target: FragmentKind::ForkedService,
                ..
            }
        ));
    }
}
