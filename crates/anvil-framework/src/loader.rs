//! Fragment discovery and loading.
//!
//! The loader turns manifest files into [`Module`]s:
//!
//! ```text
//! scan(dir) ──▶ [*.fragment.toml] ──▶ load(path) ──▶ Module { package, meta, generation }
//!                                          │
//!                                   Catalog lookup by `entry`
//! ```
//!
//! Loaded modules are kept in a table keyed by path. `load` answers from the
//! table when it can; `reload` evicts the entry first, so it always produces
//! a new module with a new generation. Loads of the same path serialize on a
//! per-path lock.
//!
//! Failures never leave the loader: they are logged and become `None`.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{LoaderError, LoaderResult};
use crate::fragment::{Catalog, FragmentMeta, Manifest, Package};

pub use crate::fragment::validate;

/// File name pattern of fragment manifests.
pub const DEFAULT_PATTERN: &str = r"\.fragment\.toml$";

static DEFAULT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(DEFAULT_PATTERN).expect("default fragment pattern is valid"));

/// How directories are scanned.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Descend into subdirectories.
    pub recursive: bool,
    /// File names to pick up.
    pub pattern: Regex,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            pattern: DEFAULT_REGEX.clone(),
        }
    }
}

/// A loaded fragment file.
#[derive(Debug)]
pub struct Module {
    /// Manifest path.
    pub path: PathBuf,
    /// The parsed manifest.
    pub manifest: Manifest,
    /// Catalog package with the manifest overrides layered on.
    pub package: Package,
    /// Validated metadata.
    pub meta: FragmentMeta,
    /// Increases on every load of any path.
    pub generation: u64,
}

/// Names starting with `@` are private, names starting with `.` are hidden.
fn is_skipped(name: &str) -> bool {
    name.starts_with('@') || name.starts_with('.')
}

/// Loads fragment manifests against a [`Catalog`].
pub struct FragmentLoader {
    catalog: Catalog,
    options: ScanOptions,
    modules: RwLock<HashMap<PathBuf, Arc<Module>>>,
    locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
    generation: AtomicU64,
}

impl FragmentLoader {
    /// Creates a loader with default scan options.
    pub fn new(catalog: Catalog) -> Self {
        Self::with_options(catalog, ScanOptions::default())
    }

    /// Creates a loader with custom scan options.
    pub fn with_options(catalog: Catalog, options: ScanOptions) -> Self {
        Self {
            catalog,
            options,
            modules: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// The catalog manifests are resolved against.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Scan options used by [`discover`](Self::discover).
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Walks `directory` breadth-first and returns the files whose name
    /// matches `pattern`.
    ///
    /// Entries whose name starts with `@` or `.` are skipped, directories
    /// included. Each directory's entries are visited in name order.
    pub async fn scan(
        directory: &Path,
        recursive: bool,
        pattern: &Regex,
    ) -> LoaderResult<Vec<PathBuf>> {
        let root = tokio::fs::metadata(directory)
            .await
            .map_err(|e| LoaderError::io(directory, e))?;
        if !root.is_dir() {
            return Err(LoaderError::NotFound(directory.to_path_buf()));
        }

        let mut found = Vec::new();
        let mut queue = VecDeque::from([directory.to_path_buf()]);

        while let Some(dir) = queue.pop_front() {
            let mut reader = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| LoaderError::io(&dir, e))?;

            let mut entries = Vec::new();
            while let Some(entry) = reader
                .next_entry()
                .await
                .map_err(|e| LoaderError::io(&dir, e))?
            {
                entries.push(entry);
            }
            entries.sort_by_key(|entry| entry.file_name());

            for entry in entries {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if is_skipped(&name) {
                    continue;
                }
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| LoaderError::io(entry.path(), e))?;
                if file_type.is_dir() {
                    if recursive {
                        queue.push_back(entry.path());
                    }
                } else if pattern.is_match(&name) {
                    found.push(entry.path());
                }
            }
        }

        Ok(found)
    }

    fn lock_for(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    /// Loads a manifest, answering from the module table when possible.
    pub async fn load(&self, path: &Path) -> Option<Arc<Module>> {
        let lock = self.lock_for(path);
        let _held = lock.lock().await;

        if let Some(module) = self.modules.read().get(path) {
            return Some(module.clone());
        }
        self.load_fresh(path).await
    }

    /// Evicts `path` and loads it again.
    ///
    /// Always yields a new module; on failure the old one stays evicted.
    pub async fn reload(&self, path: &Path) -> Option<Arc<Module>> {
        let lock = self.lock_for(path);
        let _held = lock.lock().await;

        self.modules.write().remove(path);
        self.load_fresh(path).await
    }

    /// Loads every path, dropping the ones that fail.
    pub async fn load_multiple<P: AsRef<Path>>(&self, paths: &[P]) -> Vec<Arc<Module>> {
        let mut modules = Vec::with_capacity(paths.len());
        for path in paths {
            if let Some(module) = self.load(path.as_ref()).await {
                modules.push(module);
            }
        }
        modules
    }

    /// Scans `directory` with the loader's options and loads what it finds.
    pub async fn discover(&self, directory: &Path) -> LoaderResult<Vec<Arc<Module>>> {
        let paths = Self::scan(directory, self.options.recursive, &self.options.pattern).await?;
        debug!(directory = %directory.display(), count = paths.len(), "Scanned fragment directory");
        Ok(self.load_multiple(&paths).await)
    }

    /// Drops a module from the table.
    pub fn evict(&self, path: &Path) -> bool {
        self.modules.write().remove(path).is_some()
    }

    /// Returns the cached module of `path`.
    pub fn get(&self, path: &Path) -> Option<Arc<Module>> {
        self.modules.read().get(path).cloned()
    }

    /// Paths currently in the module table, sorted.
    pub fn cached_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.modules.read().keys().cloned().collect();
        paths.sort();
        paths
    }

    async fn load_fresh(&self, path: &Path) -> Option<Arc<Module>> {
        match self.read_module(path).await {
            Ok(module) => {
                let module = Arc::new(module);
                self.modules
                    .write()
                    .insert(path.to_path_buf(), module.clone());
                info!(
                    fragment = %module.meta.name,
                    kind = %module.package.kind(),
                    generation = module.generation,
                    path = %path.display(),
                    "Fragment loaded"
                );
                Some(module)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load fragment");
                None
            }
        }
    }

    async fn read_module(&self, path: &Path) -> LoaderResult<Module> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LoaderError::io(path, e))?;
        let manifest = Manifest::parse(&text).map_err(|e| LoaderError::manifest(path, e))?;

        let package = self
            .catalog
            .get(&manifest.entry)
            .cloned()
            .ok_or_else(|| LoaderError::UnknownEntry {
                path: path.to_path_buf(),
                entry: manifest.entry.clone(),
            })?;

        if package.kind() != manifest.kind {
            return Err(LoaderError::KindMismatch {
                path: path.to_path_buf(),
                declared: manifest.kind,
                actual: package.kind(),
            });
        }

        let decorator_err = |source| LoaderError::Decorator {
            path: path.to_path_buf(),
            source,
        };
        let package = package
            .with_decorators(manifest.decorators())
            .map_err(decorator_err)?;
        let meta = package.meta().map_err(decorator_err)?;

        if !validate(&meta) {
            return Err(LoaderError::InvalidMetadata {
                path: path.to_path_buf(),
                name: meta.name,
            });
        }

        Ok(Module {
            path: path.to_path_buf(),
            manifest,
            package,
            meta,
            generation: self.generation.fetch_add(1, Ordering::Relaxed) + 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, CommandSpec};
    use crate::fragment::FragmentKind;
    use std::fs;

    fn catalog() -> Catalog {
        Catalog::new().command("ping", || {
            Command::from_fn(CommandSpec::new("ping"), |_ctx| async { Ok(()) })
        })
    }

    fn write(dir: &Path, rel: &str, body: &str) -> PathBuf {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, body).unwrap();
        path
    }

    const PING: &str = "kind = \"command\"\nentry = \"ping\"\n";

    #[tokio::test]
    async fn test_scan_breadth_first_and_skips() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.fragment.toml", PING);
        write(dir.path(), "a.fragment.toml", PING);
        write(dir.path(), "notes.toml", PING);
        write(dir.path(), "@private.fragment.toml", PING);
        write(dir.path(), ".hidden.fragment.toml", PING);
        write(dir.path(), "sub/c.fragment.toml", PING);
        write(dir.path(), "sub/deeper/d.fragment.toml", PING);
        write(dir.path(), "@drafts/e.fragment.toml", PING);
        write(dir.path(), ".git/f.fragment.toml", PING);

        let found = FragmentLoader::scan(dir.path(), true, &DEFAULT_REGEX)
            .await
            .unwrap();
        let rel: Vec<_> = found
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(
            rel,
            vec![
                "a.fragment.toml",
                "b.fragment.toml",
                "sub/c.fragment.toml",
                "sub/deeper/d.fragment.toml"
            ]
        );

        let shallow = FragmentLoader::scan(dir.path(), false, &DEFAULT_REGEX)
            .await
            .unwrap();
        assert_eq!(shallow.len(), 2);
    }

    #[tokio::test]
    async fn test_scan_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = FragmentLoader::scan(&dir.path().join("nope"), true, &DEFAULT_REGEX)
            .await
            .unwrap_err();
        assert!(matches!(err, LoaderError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_load_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "ping.fragment.toml", PING);
        let loader = FragmentLoader::new(catalog());

        let first = loader.load(&path).await.unwrap();
        let second = loader.load(&path).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.package.kind(), FragmentKind::Command);
        assert_eq!(loader.cached_paths(), vec![path]);
    }

    #[tokio::test]
    async fn test_reload_yields_fresh_module_with_same_meta() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            dir.path(),
            "ping.fragment.toml",
            "kind = \"command\"\nentry = \"ping\"\n[meta]\ndescription = \"Pong.\"\n",
        );
        let loader = FragmentLoader::new(catalog());

        let first = loader.load(&path).await.unwrap();
        let reloaded = loader.reload(&path).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &reloaded));
        assert!(reloaded.generation > first.generation);
        assert_eq!(first.meta, reloaded.meta);
        assert!(validate(&reloaded.meta));
        assert!(Arc::ptr_eq(&reloaded, &loader.load(&path).await.unwrap()));
    }

    #[tokio::test]
    async fn test_load_failures_become_none() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FragmentLoader::new(catalog());

        let missing = dir.path().join("missing.fragment.toml");
        let garbage = write(dir.path(), "garbage.fragment.toml", "kind = [");
        let unknown = write(
            dir.path(),
            "unknown.fragment.toml",
            "kind = \"command\"\nentry = \"nope\"\n",
        );
        let mismatch = write(
            dir.path(),
            "mismatch.fragment.toml",
            "kind = \"service\"\nentry = \"ping\"\n",
        );
        let invalid = write(
            dir.path(),
            "invalid.fragment.toml",
            "kind = \"command\"\nentry = \"ping\"\n[meta]\nname = \"bad name\"\n",
        );
        let good = write(dir.path(), "good.fragment.toml", PING);

        for path in [&missing, &garbage, &unknown, &mismatch, &invalid] {
            assert!(loader.load(path).await.is_none(), "{}", path.display());
        }

        let loaded = loader
            .load_multiple(&[missing, garbage, good.clone(), unknown, mismatch, invalid])
            .await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].path, good);
    }

    #[tokio::test]
    async fn test_evict_and_discover() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "ping.fragment.toml", PING);
        write(dir.path(), "nested/ping2.fragment.toml", PING);
        let loader = FragmentLoader::new(catalog());

        let modules = loader.discover(dir.path()).await.unwrap();
        assert_eq!(modules.len(), 2);
        assert!(loader.evict(&path));
        assert!(!loader.evict(&path));
        assert_eq!(loader.cached_paths().len(), 1);
    }
}
