//! Template source resolution (spec.md §6). The loader interface only
//! resolves raw source text; parsing and caching the resulting [Template]
//! is [crate::Environment::from_loader]'s job, so a loader stays a narrow
//! seam a user can implement without pulling in the rest of the engine.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
};

/// Resolves a template name to source text.
pub trait Loader {
    /// Load and return the raw source for `name`.
    fn get_source(&self, name: &str) -> Result<String, String>;

    /// Resolve `name` to a filesystem path, if this loader is backed by one.
    /// Used for diagnostics (e.g. reporting where a template came from);
    /// returns `None` for loaders with no path concept (in-memory, chain).
    fn path(&self, name: &str) -> Option<PathBuf> {
        let _ = name;
        None
    }
}

/// A loader with nothing registered; the default for a freshly constructed
/// [crate::Environment] that only ever renders templates built with
/// `from_string`.
pub struct NullLoader;

impl Loader for NullLoader {
    fn get_source(&self, name: &str) -> Result<String, String> {
        Err(format!("no loader configured; can't resolve {name:?}"))
    }
}

/// Resolves template names relative to a root directory on disk.
pub struct FsLoader {
    root: PathBuf,
}

impl FsLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Loader for FsLoader {
    fn get_source(&self, name: &str) -> Result<String, String> {
        let path = self.root.join(name);
        fs::read_to_string(&path).map_err(|error| format!("{}: {error}", path.display()))
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        Some(self.root.join(name))
    }
}

/// Resolves template names from an in-memory map, for tests and embedded
/// templates compiled into a binary.
#[derive(Default)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, source: impl Into<String>) -> Self {
        self.templates.insert(name.into(), source.into());
        self
    }
}

impl Loader for MemoryLoader {
    fn get_source(&self, name: &str) -> Result<String, String> {
        self.templates
            .get(name)
            .cloned()
            .ok_or_else(|| format!("no such template: {name:?}"))
    }
}

/// Tries each loader in order, returning the first successful resolution.
pub struct ChainLoader {
    loaders: Vec<Box<dyn Loader>>,
}

impl ChainLoader {
    pub fn new(loaders: Vec<Box<dyn Loader>>) -> Self {
        Self { loaders }
    }
}

impl Loader for ChainLoader {
    fn get_source(&self, name: &str) -> Result<String, String> {
        let mut last_error = format!("no loaders configured; can't resolve {name:?}");
        for loader in &self.loaders {
            match loader.get_source(name) {
                Ok(source) => return Ok(source),
                Err(error) => last_error = error,
            }
        }
        Err(last_error)
    }

    fn path(&self, name: &str) -> Option<PathBuf> {
        self.loaders.iter().find_map(|loader| loader.path(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_loader_resolves_known_name() {
        let loader = MemoryLoader::new().with("greeting.txt", "hello {{ name }}");
        assert_eq!(loader.get_source("greeting.txt").unwrap(), "hello {{ name }}");
    }

    #[test]
    fn test_memory_loader_errors_on_unknown_name() {
        let loader = MemoryLoader::new();
        assert!(loader.get_source("missing.txt").is_err());
    }

    #[test]
    fn test_chain_loader_tries_in_order() {
        let first = MemoryLoader::new();
        let second = MemoryLoader::new().with("a.txt", "from second");
        let chain = ChainLoader::new(vec![Box::new(first), Box::new(second)]);
        assert_eq!(chain.get_source("a.txt").unwrap(), "from second");
    }

    #[test]
    fn test_fs_loader_path() {
        let loader = FsLoader::new("/templates");
        assert_eq!(loader.path("a.txt"), Some(Path::new("/templates/a.txt").to_path_buf()));
    }
}
