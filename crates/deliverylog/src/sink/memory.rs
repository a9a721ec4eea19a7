//! In-memory sink.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::RemoteSink;
use crate::error::{Error, Result};

/// A sink that keeps rows in memory.
///
/// Failures can be injected with [`MemorySink::fail_with`] to exercise the
/// recorder's offline path.
#[derive(Debug, Default)]
pub struct MemorySink {
    rows: Mutex<Vec<Vec<String>>>,
    failure: Mutex<Option<String>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *lock(&self.failure) = Some(message.into());
    }

    /// Stop failing.
    pub fn recover(&self) {
        *lock(&self.failure) = None;
    }

    /// Snapshot of all rows, header included.
    #[must_use]
    pub fn rows(&self) -> Vec<Vec<String>> {
        lock(&self.rows).clone()
    }

    /// Number of rows, header included.
    #[must_use]
    pub fn row_count(&self) -> usize {
        lock(&self.rows).len()
    }

    fn check(&self) -> Result<()> {
        match lock(&self.failure).as_ref() {
            Some(message) => Err(Error::remote(self.name(), message.clone())),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl RemoteSink for MemorySink {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn is_empty(&self) -> Result<bool> {
        self.check()?;
        Ok(lock(&self.rows).is_empty())
    }

    async fn append_row(&self, values: &[String]) -> Result<()> {
        self.check()?;
        lock(&self.rows).push(values.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let sink = MemorySink::new();
        assert!(sink.is_empty().await.unwrap());

        sink.append_row(&["a".to_string(), "b".to_string()]).await.unwrap();
        assert!(!sink.is_empty().await.unwrap());
        assert_eq!(sink.rows(), vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[tokio::test]
    async fn test_fail_and_recover() {
        let sink = MemorySink::new();
        sink.fail_with("network unreachable");

        let err = sink.append_row(&["a".to_string()]).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "remote sink 'memory' failed: network unreachable"
        );
        assert_eq!(sink.row_count(), 0);

        sink.recover();
        sink.append_row(&["a".to_string()]).await.unwrap();
        assert_eq!(sink.row_count(), 1);
    }
}
