use anyhow::{Context, Result};
use chrono::Local;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Named string records, the way a browser's local storage holds them.
pub trait StorageBackend: Send {
    fn read(&self, key: &str) -> Result<Option<String>>;

    fn write(&mut self, key: &str, value: &str) -> Result<()>;

    /// Moves an unreadable record out of the way so the next write does not
    /// destroy it.
    fn quarantine(&mut self, _key: &str) -> Result<()> {
        Ok(())
    }
}

/// One `<key>.json` file per record under a data directory.
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create data dir: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.record_path(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("failed to read record: {}", path.display()))
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        let target = self.record_path(key);
        let tmp_path = self.root.join(format!("{key}.json.tmp"));

        fs::write(&tmp_path, value)
            .with_context(|| format!("failed to write temp record: {}", tmp_path.display()))?;
        if target.exists() {
            fs::remove_file(&target)
                .with_context(|| format!("failed to remove old record: {}", target.display()))?;
        }
        fs::rename(&tmp_path, &target)
            .with_context(|| format!("failed to replace record: {}", target.display()))
    }

    fn quarantine(&mut self, key: &str) -> Result<()> {
        let source = self.record_path(key);
        if !source.exists() {
            return Ok(());
        }
        let now_tag = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let backup = self.root.join(format!("{key}.broken.{now_tag}.json"));
        fs::rename(&source, &backup)
            .with_context(|| format!("failed to back up broken record: {}", source.display()))?;
        log::warn!("moved unreadable record to {}", backup.display());
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    records: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(key: &str, value: &str) -> Self {
        let mut records = HashMap::new();
        records.insert(key.to_string(), value.to_string());
        Self { records }
    }
}

impl StorageBackend for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.records.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<()> {
        self.records.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FileStorage, StorageBackend};
    use std::fs;

    #[test]
    fn file_storage_overwrites_whole_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(dir.path().join("data")).expect("storage");

        assert_eq!(storage.read("k").expect("read missing"), None);
        storage.write("k", "[1,2,3]").expect("first write");
        storage.write("k", "[]").expect("second write");
        assert_eq!(storage.read("k").expect("read").as_deref(), Some("[]"));
        assert!(!dir.path().join("data").join("k.json.tmp").exists());
    }

    #[test]
    fn quarantine_keeps_broken_record_aside() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut storage = FileStorage::new(dir.path().to_path_buf()).expect("storage");
        storage.write("k", "{not json").expect("write");

        storage.quarantine("k").expect("quarantine");

        assert_eq!(storage.read("k").expect("read"), None);
        let backups: Vec<String> = fs::read_dir(dir.path())
            .expect("list dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("k.broken."))
            .collect();
        assert_eq!(backups.len(), 1);
    }
}
