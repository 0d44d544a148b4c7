//! File-backed implementation of the [`LocalStore`] port.
//!
//! All keys live in a single flat TOML table. Every mutation rewrites the
//! whole file through a temporary sibling followed by a rename, so a crash
//! mid-write leaves either the old or the new contents on disk.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::domain::ports::LocalStore;

pub struct TomlFileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl TomlFileStore {
    /// Opens the store at `path`, starting empty when the file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, String> {
        let path = path.into();
        let entries = load(&path)?;
        debug!(path = %path.display(), keys = entries.len(), "local state loaded");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate<F>(&self, f: F) -> Result<(), String>
    where
        F: FnOnce(&mut BTreeMap<String, String>) -> bool,
    {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| "local state lock poisoned".to_string())?;

        // Work on a copy so a failed write leaves the cache matching the file.
        let mut next = entries.clone();
        if !f(&mut next) {
            return Ok(());
        }
        save(&self.path, &next)?;
        *entries = next;
        Ok(())
    }
}

impl LocalStore for TomlFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| "local state lock poisoned".to_string())?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.mutate(|entries| {
            entries.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        })
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        self.mutate(|entries| entries.remove(key).is_some())
    }
}

fn load(path: &Path) -> Result<BTreeMap<String, String>, String> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let content = fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {err}", path.display()))?;
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }

    toml::from_str(&content).map_err(|err| format!("failed to parse {}: {err}", path.display()))
}

fn save(path: &Path, entries: &BTreeMap<String, String>) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .map_err(|err| format!("failed to create {}: {err}", parent.display()))?;
        }
    }

    let content = toml::to_string(entries).map_err(|err| format!("failed to encode state: {err}"))?;

    let tmp_path = temp_path(path);
    let write = || -> std::io::Result<()> {
        let mut file = File::create(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp_path, path)
    };
    write().map_err(|err| {
        let _ = fs::remove_file(&tmp_path);
        format!("failed to write {}: {err}", path.display())
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "state".into());
    name.push(".tmp");
    path.with_file_name(name)
}
