//! Per-attempt stage log storage.
//!
//! Logs live at a location derived from the attempt key alone, so the
//! reader never has to search:
//! `{root}/dag_id={pipeline}/run_id={run}/task_id={stage}/attempt={n}.log`

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::domain::AttemptKey;

/// Append-only log sink, addressed by attempt key
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Human-readable location of an attempt's log (for diagnostics)
    fn locate(&self, key: &AttemptKey) -> String;

    /// Read the full log of one attempt.
    ///
    /// `Ok(None)` means nothing was ever written there; `Err` means the log
    /// exists but could not be read.
    async fn read(&self, key: &AttemptKey) -> Result<Option<String>>;

    /// Append text to an attempt's log (pipeline engine side)
    async fn append(&self, key: &AttemptKey, text: &str) -> Result<()>;
}

/// Directory-backed log store
#[derive(Debug, Clone)]
pub struct FileLogStore {
    root: PathBuf,
}

impl FileLogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an attempt's log file
    pub fn path_for(&self, key: &AttemptKey) -> PathBuf {
        self.root.join(format!("{}.log", key.relative_path()))
    }
}

#[async_trait]
impl LogStore for FileLogStore {
    fn locate(&self, key: &AttemptKey) -> String {
        self.path_for(key).display().to_string()
    }

    async fn read(&self, key: &AttemptKey) -> Result<Option<String>> {
        let path = self.path_for(key);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read log file: {}", path.display()))
            }
        };

        let text = String::from_utf8(bytes)
            .with_context(|| format!("Log file is not valid UTF-8: {}", path.display()))?;

        Ok(Some(text))
    }

    async fn append(&self, key: &AttemptKey, text: &str) -> Result<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("Failed to open log file: {}", path.display()))?;

        file.write_all(text.as_bytes())
            .await
            .context("Failed to write log")?;
        file.flush().await.context("Failed to flush log")?;

        Ok(())
    }
}

/// In-memory log store
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    logs: RwLock<HashMap<AttemptKey, String>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    fn locate(&self, key: &AttemptKey) -> String {
        format!("memory://{}", key.relative_path())
    }

    async fn read(&self, key: &AttemptKey) -> Result<Option<String>> {
        Ok(self.logs.read().await.get(key).cloned())
    }

    async fn append(&self, key: &AttemptKey, text: &str) -> Result<()> {
        self.logs
            .write()
            .await
            .entry(key.clone())
            .or_default()
            .push_str(text);
        Ok(())
    }
}
