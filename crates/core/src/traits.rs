//! Capability traits
//!
//! Sources advertise what they can do by implementing these traits rather
//! than inheriting from a common base. A record source is `Pushable`,
//! `Pullable` and `Syncable`; a bucket implements `Bucket`.
//!
//! Thread safety: implementations are shared across tasks, so every trait
//! requires `Send + Sync`.

use async_trait::async_trait;

use crate::error::Result;
use crate::transform::{Query, Transform};
use crate::value::Value;

/// Accepts transforms and applies them
#[async_trait]
pub trait Pushable: Send + Sync {
    /// Apply `transform` in order
    ///
    /// Returns the transforms that were applied (the input, on success).
    ///
    /// # Errors
    ///
    /// Fails on the first operation that fails; earlier operations remain
    /// applied.
    async fn push(&self, transform: Transform) -> Result<Vec<Transform>>;
}

/// Answers queries with transforms
#[async_trait]
pub trait Pullable: Send + Sync {
    /// Evaluate `query`
    ///
    /// Returns one transform of `addRecord` operations describing the result.
    async fn pull(&self, query: Query) -> Result<Vec<Transform>>;
}

/// Applies transforms produced elsewhere
#[async_trait]
pub trait Syncable: Send + Sync {
    /// Apply `transform` in order
    async fn sync(&self, transform: Transform) -> Result<()>;
}

/// Flat key/value storage
#[async_trait]
pub trait Bucket: Send + Sync {
    /// Read an item; absent items are `None`
    async fn get_item(&self, key: &str) -> Result<Option<Value>>;

    /// Write an item, overwriting any existing one
    async fn set_item(&self, key: &str, value: Value) -> Result<()>;

    /// Remove an item; removing an absent item succeeds
    async fn remove_item(&self, key: &str) -> Result<()>;
}
