//! Position Sizer Storage Layer
//!
//! Durable key-value storage for field values and lock flags.
//!
//! # Architecture
//!
//! - **`KeyValueStore` trait**: the storage interface (port)
//! - **In-memory store**: fast implementation for tests and ephemeral sessions
//! - **File store**: one JSON document on disk
//!
//! # Usage
//!
//! ```rust
//! use sizer_store::{KeyValueStore, MemoryStore};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = MemoryStore::new();
//!
//!     store.set("risk-percent", "1.5").await.unwrap();
//!     store.set("risk-percent.lock", "true").await.unwrap();
//!
//!     let risk = store.get("risk-percent").await.unwrap();
//!     println!("Stored risk: {:?}", risk);
//! }
//! ```

#![warn(clippy::all)]

// Modules
mod error;
mod file;
mod memory;
mod repository;

// Re-exports
pub use error::{StoreError, StoreResult};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use repository::KeyValueStore;
