//! Schema collaborator
//!
//! The schema knows the record types (models) and a version. Upgrading it
//! publishes the new state to every subscriber over a `tokio::sync::watch`
//! channel; record sources use that to reopen their store at the new version.

use std::collections::BTreeSet;
use tokio::sync::watch;

/// Snapshot of the schema at one version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaState {
    /// Known record types
    pub models: BTreeSet<String>,
    /// Schema version (>= 1)
    pub version: u32,
}

/// Known models and version, with upgrade notification
#[derive(Debug)]
pub struct Schema {
    state: watch::Sender<SchemaState>,
}

impl Schema {
    /// Create a schema at version 1
    pub fn new<I, S>(models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Schema::with_version(models, 1)
    }

    /// Create a schema at a given version
    pub fn with_version<I, S>(models: I, version: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let state = SchemaState {
            models: models.into_iter().map(Into::into).collect(),
            version,
        };
        let (state, _) = watch::channel(state);
        Schema { state }
    }

    /// Known record types
    pub fn models(&self) -> BTreeSet<String> {
        self.state.borrow().models.clone()
    }

    /// Whether `model` is a known record type
    pub fn contains(&self, model: &str) -> bool {
        self.state.borrow().models.contains(model)
    }

    /// Current version
    pub fn version(&self) -> u32 {
        self.state.borrow().version
    }

    /// Replace the models and bump the version, notifying subscribers
    ///
    /// Returns `false` (and changes nothing) unless `version` is greater than
    /// the current one.
    pub fn upgrade<I, S>(&self, models: I, version: u32) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if version <= self.version() {
            return false;
        }
        self.state.send_replace(SchemaState {
            models: models.into_iter().map(Into::into).collect(),
            version,
        });
        true
    }

    /// Receiver that wakes on every upgrade
    pub fn subscribe(&self) -> watch::Receiver<SchemaState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upgrade_requires_higher_version() {
        let schema = Schema::new(["planet"]);
        assert_eq!(schema.version(), 1);
        assert!(!schema.upgrade(["planet", "moon"], 1));
        assert!(!schema.contains("moon"));
        assert!(schema.upgrade(["planet", "moon"], 2));
        assert!(schema.contains("moon"));
        assert_eq!(schema.version(), 2);
    }

    #[tokio::test]
    async fn test_subscribers_see_upgrades() {
        let schema = Schema::new(["planet"]);
        let mut rx = schema.subscribe();
        schema.upgrade(["planet", "moon"], 2);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().version, 2);
    }
}
