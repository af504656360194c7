//! # Anvil Framework
//!
//! The fragment lifecycle and dispatch core of the Anvil bot framework.
//!
//! This layer provides:
//! - Decorator-built command specs with typed arguments and constraints
//! - A loader that discovers `*.fragment.toml` manifests and resolves them
//!   against a [`Catalog`] of entry points
//! - A manager that validates and enables commands, services and tasks
//! - A dispatcher that parses messages, checks constraints, resolves
//!   arguments and runs commands
//!
//! The chat platform is reached only through [`anvil_core::Bot`].

#[cfg(feature = "builtin")]
pub mod builtin;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod fragment;
pub mod interaction;
pub mod loader;
pub mod manager;
pub mod parser;
pub mod registry;
pub mod service;
pub mod task;

#[cfg(test)]
mod testing;

pub use command::{
    Argument, ArgumentError, ArgumentType, Arguments, Command, CommandContext, CommandHandler,
    CommandSpec, ConstraintDefaults, ConstraintViolation, Decoratable, Decorator, Environment,
    Guard, Relay, TypeRegistry, handler_fn,
};
pub use dispatcher::{DispatchOptions, DispatchOutcome, Dispatcher};
pub use error::{BoxError, DecoratorError, LoaderError, LoaderResult, PanicError, SchemaError};
pub use fragment::{Catalog, FragmentKind, FragmentMeta, Manifest, Package};
pub use interaction::Interactions;
pub use loader::{FragmentLoader, Module, ScanOptions};
pub use manager::{FragmentManager, ManagerConfig};
pub use parser::{CommandParser, Invocation};
pub use registry::{CommandRegistry, Lookup, RegisteredCommand};
pub use service::{Service, ServiceRegistry};
pub use task::{TaskHandler, TaskRegistry, TaskSpec, task_fn};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::command::decorator::*;
    pub use crate::command::{
        Argument, ArgumentType, Arguments, Command, CommandContext, CommandHandler, CommandSpec,
        Decoratable, Environment, ExclusiveCheck, Guard, Relay, handler_fn,
    };
    pub use crate::error::BoxError;
    pub use crate::fragment::{
        Catalog, CommandPackage, ForkedServicePackage, FragmentMeta, Package, ServicePackage,
        TaskPackage,
    };
    pub use crate::service::Service;
    pub use crate::task::{TaskHandler, TaskSpec, task_fn};
}
