use std::{collections::HashMap, fs, io::Write, path::{Path, PathBuf}, sync::Arc};

use anyhow::{anyhow, Context, Result};
use tempfile::NamedTempFile;

/// Read-only access to datasets by store-relative path, e.g.
/// "2024_05/intersections/new_urban_intersections.geojson".
pub trait DatasetSource: Send + Sync {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>>;
    fn has(&self, rel: &str) -> bool;
}

/// Write access to datasets by store-relative path.
/// A dataset visible through [`DatasetSource::has`] is always complete.
pub trait DatasetSink: Send + Sync {
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()>;
}

/// Datasets under a root directory.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

    #[inline] pub fn root(&self) -> &Path { &self.root }

    pub fn path(&self, rel: &str) -> PathBuf { self.root.join(rel) }
}

impl DatasetSource for DiskStore {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>> {
        let path = self.path(rel);
        let bytes = fs::read(&path)
            .with_context(|| format!("[io::store::get] Failed to read {}", path.display()))?;
        Ok(Arc::from(bytes))
    }

    fn has(&self, rel: &str) -> bool { self.path(rel).is_file() }
}

impl DatasetSink for DiskStore {
    /// Write to a temp file next to the target, then rename over it.
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()> {
        let target = self.path(rel);
        let dir = target.parent().unwrap_or(&self.root).to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("[io::store::put] Failed to create {}", dir.display()))?;

        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("[io::store::put] Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(bytes)
            .with_context(|| format!("[io::store::put] Failed to write {}", target.display()))?;
        tmp.as_file().sync_all()
            .with_context(|| format!("[io::store::put] Failed to sync {}", target.display()))?;
        tmp.persist(&target)
            .with_context(|| format!("[io::store::put] Failed to rename into {}", target.display()))?;
        Ok(())
    }
}

/// In-memory datasets, keyed by store-relative path.
#[derive(Debug, Default, Clone)]
pub struct MemStore {
    files: HashMap<String, Arc<[u8]>>,
}

impl MemStore {
    pub fn new() -> Self { Self::default() }

    /// Stored paths, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys = self.files.keys().map(String::as_str).collect::<Vec<_>>();
        keys.sort_unstable();
        keys
    }
}

impl DatasetSource for MemStore {
    fn get(&self, rel: &str) -> Result<Arc<[u8]>> {
        self.files.get(rel).cloned()
            .ok_or_else(|| anyhow!("[io::store::get] Missing dataset: {rel}"))
    }

    fn has(&self, rel: &str) -> bool { self.files.contains_key(rel) }
}

impl DatasetSink for MemStore {
    fn put(&mut self, rel: &str, bytes: &[u8]) -> Result<()> {
        self.files.insert(rel.to_string(), Arc::from(bytes));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_store_creates_parents_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = DiskStore::new(dir.path());
        assert!(!store.has("a/b/c.json"));

        store.put("a/b/c.json", b"first").unwrap();
        store.put("a/b/c.json", b"second").unwrap();
        assert!(store.has("a/b/c.json"));
        assert_eq!(&*store.get("a/b/c.json").unwrap(), b"second");

        // Only the target remains; no temp files left behind.
        let entries = fs::read_dir(dir.path().join("a/b")).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn mem_store_round_trip() {
        let mut store = MemStore::new();
        store.put("x.csv", b"a,b\n").unwrap();
        assert!(store.has("x.csv"));
        assert!(store.get("y.csv").is_err());
        assert_eq!(store.keys(), vec!["x.csv"]);
    }
}
