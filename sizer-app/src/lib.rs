//! Position Sizer Application Library
//!
//! Reactive runtime for the position-size calculator.
//!
//! # Architecture
//!
//! ```text
//! Console → Field State Store ──► compute debounce ──► Calculator → Graph
//!              │    Lock State Store                        │
//!              │         │                                  ▼
//!              └─────────┴──► persistence debounce ──► KeyValueStore
//!
//!                    Event Bus (edits, toggles, derived values, reset)
//! ```
//!
//! # Components
//!
//! - **App**: Starts, serves and shuts down everything below
//! - **Field State Store**: Raw field values, one watch cell per field
//! - **Lock State Store**: Lock flags of the lockable fields
//! - **Calculator**: Single owner of the computation graph
//! - **Debounce**: Quiet-period coalescing of cell updates
//! - **Persistence**: Best-effort load and save through `KeyValueStore`
//! - **Event Bus**: Broadcast notifications for the front end
//! - **Console**: Line-oriented terminal front end
//! - **Config**: Environment-based configuration
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sizer_app::{App, Config};
//! use sizer_domain::FieldId;
//! use sizer_store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = App::start(Config::test(), Arc::new(MemoryStore::new()))
//!         .await
//!         .expect("Failed to start");
//!     app.fields().write(FieldId::EntryPrice, "95000");
//!     app.shutdown().await.expect("Shutdown error");
//! }
//! ```

#![warn(clippy::all)]

pub mod app;
pub mod calculator;
pub mod config;
pub mod console;
pub mod debounce;
pub mod error;
pub mod event_bus;
pub mod persistence;
pub mod state;

// Re-exports for convenience
pub use app::App;
pub use calculator::{DerivedChannels, FieldSettled};
pub use config::{Config, Environment, StoreConfig, TimingConfig, MEMORY_STORE};
pub use console::{execute, render_derived, render_fields, run_session, spawn_renderer, Command};
pub use error::{AppError, AppResult};
pub use event_bus::{AppEvent, EventBus, EventReceiver};
pub use state::{FieldStateStore, LockStateStore};
