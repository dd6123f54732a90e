//! Log fetcher: reads the log of one failed attempt.
//!
//! Never retries and never errors; every outcome is a `LogRecord`.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{error, info, instrument, warn};

use crate::adapters::LogStore;
use crate::domain::{ExecutionContext, LogAbsence, LogRecord};

/// Fetches attempt logs from a log store with a bounded read
pub struct LogFetcher {
    store: Arc<dyn LogStore>,
    read_timeout: Duration,
}

impl LogFetcher {
    pub fn new(store: Arc<dyn LogStore>, read_timeout: Duration) -> Self {
        Self {
            store,
            read_timeout,
        }
    }

    /// Fetch the log for the attempt described by `context`
    #[instrument(skip_all, fields(attempt_key = %context.key()))]
    pub async fn fetch(&self, context: &ExecutionContext) -> LogRecord {
        let key = context.key();
        let location = self.store.locate(key);

        match timeout(self.read_timeout, self.store.read(key)).await {
            Ok(Ok(Some(text))) => {
                info!(%location, bytes = text.len(), "Log fetched");
                LogRecord::present(text)
            }
            Ok(Ok(None)) => {
                warn!(%location, kind = "not_found", "Log not found");
                LogRecord::absent(LogAbsence::NotFound { location })
            }
            Ok(Err(e)) => {
                let cause = format!("{:#}", e);
                error!(%location, kind = "read_error", %cause, "Failed to read log");
                LogRecord::absent(LogAbsence::ReadError { location, cause })
            }
            Err(_) => {
                let cause = format!("log read timed out after {:?}", self.read_timeout);
                error!(%location, kind = "read_error", %cause, "Failed to read log");
                LogRecord::absent(LogAbsence::ReadError { location, cause })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FileLogStore, MemoryLogStore};
    use crate::domain::AttemptKey;
    use anyhow::Result;
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Store whose reads hang far longer than any test timeout
    struct HangingStore;

    #[async_trait]
    impl LogStore for HangingStore {
        fn locate(&self, key: &AttemptKey) -> String {
            format!("hanging://{}", key.relative_path())
        }

        async fn read(&self, _key: &AttemptKey) -> Result<Option<String>> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(Some("too late".to_string()))
        }

        async fn append(&self, _key: &AttemptKey, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    fn context() -> ExecutionContext {
        ExecutionContext::new("etl_pipeline", "load_data", "manual__1", 1, 1).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_present() {
        let store = Arc::new(MemoryLogStore::new());
        store
            .append(context().key(), "Temporary disconnection with the target!")
            .await
            .unwrap();

        let fetcher = LogFetcher::new(store, Duration::from_secs(1));
        let record = fetcher.fetch(&context()).await;

        assert_eq!(
            record.text(),
            Some("Temporary disconnection with the target!")
        );
    }

    #[tokio::test]
    async fn test_fetch_not_found() {
        let store = Arc::new(MemoryLogStore::new());
        let fetcher = LogFetcher::new(store, Duration::from_secs(1));

        let record = fetcher.fetch(&context()).await;
        match record.absence() {
            Some(LogAbsence::NotFound { location }) => {
                assert!(location.ends_with("attempt=1"));
            }
            other => panic!("Expected NotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_read_error_keeps_cause() {
        let temp = TempDir::new().unwrap();
        let store = FileLogStore::new(temp.path());
        std::fs::create_dir_all(store.path_for(context().key())).unwrap();

        let fetcher = LogFetcher::new(Arc::new(store), Duration::from_secs(1));
        let record = fetcher.fetch(&context()).await;

        match record.absence() {
            Some(LogAbsence::ReadError { cause, .. }) => {
                assert!(cause.contains("Failed to read log file"));
            }
            other => panic!("Expected ReadError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout_is_read_error() {
        let fetcher = LogFetcher::new(Arc::new(HangingStore), Duration::from_millis(100));

        let record = fetcher.fetch(&context()).await;

        match record.absence() {
            Some(LogAbsence::ReadError { location, cause }) => {
                assert!(location.starts_with("hanging://"));
                assert!(cause.contains("timed out"));
            }
            other => panic!("Expected ReadError, got {:?}", other),
        }
        assert_eq!(
            record.absence().unwrap().placeholder(),
            "Error: Unable to read log file."
        );
    }
}
