use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use cairn_core::{StorageError, StorageResult};

use crate::engine::{Engine, OpenOutcome};

/// Engine wrapper that counts requests
#[derive(Debug)]
pub struct CountingEngine<E> {
    inner: E,
    opens: AtomicUsize,
    deletes: AtomicUsize,
}

impl<E: Engine> CountingEngine<E> {
    /// Wrap `inner`
    pub fn new(inner: E) -> Self {
        CountingEngine {
            inner,
            opens: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
        }
    }

    /// The wrapped engine
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Number of `open` calls so far
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of `delete_namespace` calls so far
    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<E: Engine> Engine for CountingEngine<E> {
    fn is_available(&self) -> bool {
        self.inner.is_available()
    }

    async fn open(&self, namespace: &str, version: Option<u32>) -> StorageResult<OpenOutcome> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.inner.open(namespace, version).await
    }

    async fn delete_namespace(&self, namespace: &str) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_namespace(namespace).await
    }

    async fn namespace_version(&self, namespace: &str) -> StorageResult<Option<u32>> {
        self.inner.namespace_version(namespace).await
    }
}

/// Engine that is never available
#[derive(Debug, Default)]
pub struct UnavailableEngine;

impl UnavailableEngine {
    fn error() -> StorageError {
        StorageError::Unavailable {
            reason: "engine disabled".to_string(),
        }
    }
}

#[async_trait]
impl Engine for UnavailableEngine {
    fn is_available(&self) -> bool {
        false
    }

    async fn open(&self, _namespace: &str, _version: Option<u32>) -> StorageResult<OpenOutcome> {
        Err(Self::error())
    }

    async fn delete_namespace(&self, _namespace: &str) -> StorageResult<()> {
        Err(Self::error())
    }

    async fn namespace_version(&self, _namespace: &str) -> StorageResult<Option<u32>> {
        Err(Self::error())
    }
}
