//! Key-value storage trait (Port)
//!
//! Values are raw strings with no schema versioning. Numbers are stored as
//! the text the user typed, lock flags as `"true"` / `"false"`.

use crate::error::StoreError;
use async_trait::async_trait;

/// Durable key-value storage
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value (`None` if the key was never written)
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
