use crate::domain::ports::Cache;
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    value: Value,
    /// Unix timestamp; the entry is expired once `now >= expires_at`.
    expires_at: i64,
}

/// Single-file JSON cache with per-entry TTL. Writes go to a sibling
/// temporary file and are renamed into place, so a concurrent reader never
/// sees a half-written document.
pub struct FileCache {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn load(&self) -> Result<HashMap<String, CacheEntry>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(doc) => Ok(doc),
                Err(e) => {
                    tracing::warn!("Cache file {:?} is corrupt ({}), starting fresh", self.path, e);
                    Ok(HashMap::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, doc: &HashMap<String, CacheEntry>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if parent != Path::new("") {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        let text = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl Cache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let _guard = self.lock.lock().await;
        let doc = self.load().await?;
        match doc.get(key) {
            Some(entry) if Utc::now().timestamp() < entry.expires_at => {
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                tracing::debug!("Cache entry '{}' expired", key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl_secs: i64) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        doc.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Utc::now().timestamp() + ttl_secs,
            },
        );
        self.store(&doc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache.json"));

        cache.set("active_terms", json!([{"id": 3}]), 3600).await.unwrap();
        let value = cache.get("active_terms").await.unwrap();
        assert_eq!(value, Some(json!([{"id": 3}])));
    }

    #[tokio::test]
    async fn test_zero_ttl_entry_is_expired_on_next_read() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("cache.json"));

        cache.set("flash", json!("gone"), 0).await.unwrap();
        assert_eq!(cache.get("flash").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("nonexistent.json"));
        assert_eq!(cache.get("anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_replaced_not_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        tokio::fs::write(&path, "not json{{{").await.unwrap();

        let cache = FileCache::new(&path);
        assert_eq!(cache.get("anything").await.unwrap(), None);
        cache.set("key", json!(1), 60).await.unwrap();
        assert_eq!(cache.get("key").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_entries_survive_new_handle() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        FileCache::new(&path).set("key", json!("v"), 600).await.unwrap();
        let reopened = FileCache::new(&path);
        assert_eq!(reopened.get("key").await.unwrap(), Some(json!("v")));
    }

    #[tokio::test]
    async fn test_no_leftover_temp_file_after_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let cache = FileCache::new(&path);
        cache.set("key", json!(1), 60).await.unwrap();
        assert!(!path.with_extension("tmp").exists());
    }
}
