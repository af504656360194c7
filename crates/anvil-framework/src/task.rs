//! Periodic tasks.
//!
//! The framework only keeps the table; the runtime drives one interval loop
//! per registered task.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::command::decorator::{Decoratable, Decorator};
use crate::error::{BoxError, DecoratorError};
use crate::fragment::{FragmentKind, FragmentMeta};

/// Declared shape of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    /// Task metadata.
    pub meta: FragmentMeta,
    /// Time between runs.
    pub interval: Duration,
    /// Run once right away instead of waiting a full interval.
    pub run_immediately: bool,
}

impl TaskSpec {
    /// Creates a task spec.
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        Self {
            meta: FragmentMeta::new(name),
            interval,
            run_immediately: false,
        }
    }

    /// Runs the task once at startup.
    pub fn immediately(mut self) -> Self {
        self.run_immediately = true;
        self
    }

    /// The task name.
    pub fn name(&self) -> &str {
        &self.meta.name
    }
}

impl Decoratable for TaskSpec {
    fn kind(&self) -> FragmentKind {
        FragmentKind::Task
    }

    fn decorate(mut self, decorator: Decorator) -> Result<Self, DecoratorError> {
        decorator.apply_meta_only(&mut self.meta, FragmentKind::Task)?;
        Ok(self)
    }
}

/// The body of a task.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Runs one iteration.
    async fn run(&self) -> Result<(), BoxError>;
}

/// A [`TaskHandler`] backed by an async closure.
pub struct TaskFn<F> {
    f: F,
}

/// Wraps an async closure into a [`TaskHandler`].
pub fn task_fn<F, Fut>(f: F) -> TaskFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    TaskFn { f }
}

#[async_trait]
impl<F, Fut> TaskHandler for TaskFn<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn run(&self) -> Result<(), BoxError> {
        (self.f)().await
    }
}

/// A registered task.
#[derive(Clone)]
pub struct TaskEntry {
    /// Name and schedule.
    pub spec: TaskSpec,
    /// Body run on every tick.
    pub handler: Arc<dyn TaskHandler>,
}

impl fmt::Debug for TaskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskEntry")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// Name → task.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<String, TaskEntry>>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task, returning the one it replaced.
    pub fn register(&self, entry: TaskEntry) -> Option<TaskEntry> {
        let key = entry.spec.name().to_lowercase();
        self.tasks.write().insert(key, entry)
    }

    /// Removes a task.
    pub fn remove(&self, name: &str) -> Option<TaskEntry> {
        self.tasks.write().remove(&name.to_lowercase())
    }

    /// Returns `true` if a task is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.read().contains_key(&name.to_lowercase())
    }

    /// Returns a task.
    pub fn get(&self, name: &str) -> Option<TaskEntry> {
        self.tasks.read().get(&name.to_lowercase()).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Snapshot of every task.
    pub fn snapshot(&self) -> Vec<TaskEntry> {
        self.tasks.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_register_replace_and_run() {
        let registry = TaskRegistry::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = counter.clone();
        let entry = TaskEntry {
            spec: TaskSpec::new("Cleanup", Duration::from_secs(60)).immediately(),
            handler: Arc::new(task_fn(move || {
                let c = c.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })),
        };

        assert!(registry.register(entry.clone()).is_none());
        assert!(registry.contains("cleanup"));
        assert!(registry.register(entry).is_some());
        assert_eq!(registry.names(), vec!["cleanup"]);

        let task = registry.get("cleanup").unwrap();
        assert!(task.spec.run_immediately);
        task.handler.run().await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        assert!(registry.remove("CLEANUP").is_some());
        assert!(registry.snapshot().is_empty());
    }
}
