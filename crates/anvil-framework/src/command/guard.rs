//! Guards and relays: the imperative hooks around a command body.
//!
//! A [`Guard`] runs after argument resolution and may veto execution. A
//! [`Relay`] runs after a successful execution; its errors are logged and
//! never reach the caller.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::CommandContext;
use crate::error::BoxError;

type GuardFn = dyn Fn(CommandContext) -> BoxFuture<'static, Result<bool, BoxError>> + Send + Sync;
type RelayFn = dyn Fn(CommandContext) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;

/// A named pre-execution predicate.
///
/// Guards are unique by name on a command: applying a guard whose name is
/// already present keeps the first one.
#[derive(Clone)]
pub struct Guard {
    name: String,
    check: Arc<GuardFn>,
}

impl Guard {
    /// Creates a guard from an async predicate.
    ///
    /// An `Err` from the predicate is treated as a rejection.
    pub fn new<F, Fut>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<bool, BoxError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(move |ctx| check(ctx).boxed()),
        }
    }

    /// Creates a guard from a synchronous predicate.
    pub fn sync<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&CommandContext) -> bool + Send + Sync + 'static,
    {
        let check = Arc::new(check);
        Self::new(name, move |ctx: CommandContext| {
            let check = check.clone();
            async move { Ok(check(&ctx)) }
        })
    }

    /// The guard name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the predicate.
    pub async fn check(&self, ctx: CommandContext) -> Result<bool, BoxError> {
        (self.check)(ctx).await
    }
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guard").field("name", &self.name).finish()
    }
}

/// A post-execution side effect.
#[derive(Clone)]
pub struct Relay {
    label: String,
    run: Arc<RelayFn>,
}

impl Relay {
    /// Creates a relay from an async function.
    pub fn new<F, Fut>(label: impl Into<String>, run: F) -> Self
    where
        F: Fn(CommandContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            run: Arc::new(move |ctx| run(ctx).boxed()),
        }
    }

    /// Label used in log lines.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Runs the relay.
    pub async fn run(&self, ctx: CommandContext) -> Result<(), BoxError> {
        (self.run)(ctx).await
    }
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay").field("label", &self.label).finish()
    }
}
