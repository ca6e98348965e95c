use async_trait::async_trait;
use newsbadge_core::{Error, Result, SettingsStore};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Settings persisted as one JSON object on disk.
///
/// `set` is a read-modify-write of the whole file, so writers from one store (and its
/// clones) are serialized, and each write goes through its own temp file.
#[derive(Debug, Clone)]
pub struct FsSettingsStore {
    path: PathBuf,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl FsSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(Error::Store(format!("{}: {e}", self.path.display()))),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(BTreeMap::new());
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::Store(format!("{}: {e}", self.path.display())))
    }
}

fn replace_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl SettingsStore for FsSettingsStore {
    async fn get(&self, keys: &[&str]) -> Result<BTreeMap<String, Value>> {
        let mut all = self.read_all().await?;
        all.retain(|k, _| keys.contains(&k.as_str()));
        Ok(all)
    }

    async fn set(&self, entries: BTreeMap<String, Value>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut all = self.read_all().await?;
        all.extend(entries);
        let bytes = serde_json::to_vec_pretty(&all).map_err(|e| Error::Store(e.to_string()))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || replace_file(&path, &bytes))
            .await
            .map_err(|e| Error::Store(e.to_string()))?
            .map_err(|e| Error::Store(format!("{}: {e}", self.path.display())))
    }
}

/// In-process store for tests and one-shot scans.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SettingsStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<BTreeMap<String, Value>> {
        let m = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(m
            .iter()
            .filter(|(k, _)| keys.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn set(&self, entries: BTreeMap<String, Value>) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend(entries);
        Ok(())
    }
}
