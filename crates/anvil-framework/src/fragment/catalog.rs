//! The bootstrap table of fragment entry points.
//!
//! Fragment manifests on disk refer to code by entry name; the application
//! registers every entry here before the loader runs.
//!
//! ```rust,ignore
//! let catalog = Catalog::new()
//!     .command("ping", || ping_command())
//!     .forked_service("stats", FragmentMeta::new("stats"), || Arc::new(Stats::default()));
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anvil_core::BoxedBot;

use super::FragmentMeta;
use super::package::{
    CommandPackage, ForkedServicePackage, Package, ServicePackage, TaskPackage,
};
use crate::command::Command;
use crate::service::Service;
use crate::task::{TaskHandler, TaskSpec};

/// Entry name → package.
#[derive(Clone, Default, Debug)]
pub struct Catalog {
    entries: HashMap<String, Package>,
}

impl Catalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a command entry.
    pub fn command<F>(self, entry: &str, factory: F) -> Self
    where
        F: Fn() -> Command + Send + Sync + 'static,
    {
        self.insert(entry, CommandPackage::new(factory))
    }

    /// Adds a service entry.
    pub fn service<F>(self, entry: &str, meta: FragmentMeta, factory: F) -> Self
    where
        F: Fn(BoxedBot) -> Arc<dyn Service> + Send + Sync + 'static,
    {
        self.insert(entry, ServicePackage::new(meta, factory))
    }

    /// Adds a detached service entry.
    pub fn forked_service<F>(self, entry: &str, meta: FragmentMeta, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn Service> + Send + Sync + 'static,
    {
        self.insert(entry, ForkedServicePackage::new(meta, factory))
    }

    /// Adds a task entry.
    pub fn task<F>(self, entry: &str, spec: TaskSpec, factory: F) -> Self
    where
        F: Fn() -> Arc<dyn TaskHandler> + Send + Sync + 'static,
    {
        self.insert(entry, TaskPackage::new(spec, factory))
    }

    /// Adds (or replaces) an entry.
    pub fn insert(mut self, entry: &str, package: impl Into<Package>) -> Self {
        self.entries.insert(entry.to_string(), package.into());
        self
    }

    /// Looks an entry up.
    pub fn get(&self, entry: &str) -> Option<&Package> {
        self.entries.get(entry)
    }

    /// Returns `true` if the entry exists.
    pub fn contains(&self, entry: &str) -> bool {
        self.entries.contains_key(entry)
    }

    /// Entry names, sorted.
    pub fn entries(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the catalog has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
