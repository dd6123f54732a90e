//! Annotation store: a key/value side-channel per stage attempt.
//!
//! Writes are last-write-wins per (attempt, name). The file store keeps one
//! JSON object per attempt and replaces it atomically on every write, so a
//! `put_many` lands all of its entries or none of them.

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::domain::AttemptKey;

/// Key/value annotations addressed by attempt key
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Set `name` to `value` for one attempt, replacing any previous value
    async fn put(&self, key: &AttemptKey, name: &str, value: &str) -> Result<()> {
        self.put_many(key, &[(name, value)]).await
    }

    /// Set several annotations for one attempt in a single write
    async fn put_many(&self, key: &AttemptKey, entries: &[(&str, &str)]) -> Result<()>;

    /// All annotations recorded for one attempt
    async fn get_all(&self, key: &AttemptKey) -> Result<BTreeMap<String, String>>;

    /// One annotation, if present
    async fn get(&self, key: &AttemptKey, name: &str) -> Result<Option<String>> {
        Ok(self.get_all(key).await?.remove(name))
    }
}

/// Directory-backed annotation store
#[derive(Debug, Clone)]
pub struct FileAnnotationStore {
    root: PathBuf,
}

impl FileAnnotationStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an attempt's annotation file
    pub fn path_for(&self, key: &AttemptKey) -> PathBuf {
        self.root.join(format!("{}.json", key.relative_path()))
    }

    async fn load(path: &Path) -> Result<BTreeMap<String, String>> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read annotations: {}", path.display()))
            }
        };

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse annotations: {}", path.display()))
    }
}

#[async_trait]
impl AnnotationStore for FileAnnotationStore {
    async fn put_many(&self, key: &AttemptKey, entries: &[(&str, &str)]) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create annotation directory: {}", parent.display())
            })?;
        }

        let mut annotations = Self::load(&path).await?;
        for (name, value) in entries {
            annotations.insert(name.to_string(), value.to_string());
        }

        let json =
            serde_json::to_string_pretty(&annotations).context("Failed to serialize annotations")?;

        // Write then rename so readers never see a half-written file
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json)
            .await
            .with_context(|| format!("Failed to write annotations: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to replace annotations: {}", path.display()))?;

        Ok(())
    }

    async fn get_all(&self, key: &AttemptKey) -> Result<BTreeMap<String, String>> {
        Self::load(&self.path_for(key)).await
    }
}

/// In-memory annotation store
#[derive(Debug, Default)]
pub struct MemoryAnnotationStore {
    entries: RwLock<HashMap<AttemptKey, BTreeMap<String, String>>>,
}

impl MemoryAnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of attempts with at least one annotation
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl AnnotationStore for MemoryAnnotationStore {
    async fn put_many(&self, key: &AttemptKey, entries: &[(&str, &str)]) -> Result<()> {
        let mut all = self.entries.write().await;
        let annotations = all.entry(key.clone()).or_default();
        for (name, value) in entries {
            annotations.insert(name.to_string(), value.to_string());
        }
        Ok(())
    }

    async fn get_all(&self, key: &AttemptKey) -> Result<BTreeMap<String, String>> {
        Ok(self
            .entries
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_default())
    }
}
