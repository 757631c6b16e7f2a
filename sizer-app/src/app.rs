//! App: runtime orchestrator.
//!
//! The App ties together all components:
//! - Field State Store (raw edits)
//! - Lock State Store (reset protection)
//! - Calculator (derived values)
//! - Event Bus (notifications)
//!
//! # Lifecycle
//!
//! 1. Load persisted field values and lock flags
//! 2. Build the computation graph and spawn the calculator
//! 3. Spawn one compute and one persistence debounce task per field,
//!    and one persistence task per lock flag
//! 4. Serve reads, writes, toggles and resets
//! 5. On shutdown close every cell, flush pending writes and join the tasks

use std::collections::BTreeMap;
use std::future::ready;
use std::sync::Arc;

use sizer_domain::{registry, DerivedValue, DomainError, FieldId, FieldValue};
use sizer_engine::{DerivedNode, DerivedSnapshot, Graph};
use sizer_store::KeyValueStore;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::calculator::{Calculator, DerivedChannels, FieldSettled};
use crate::config::Config;
use crate::debounce::spawn_debounced;
use crate::error::{AppError, AppResult};
use crate::event_bus::{AppEvent, EventBus, EventReceiver};
use crate::persistence::{encode_lock, load_field_values, load_lock_flags, persist};
use crate::state::{FieldCell, FieldStateStore, LockStateStore};

// =============================================================================
// App
// =============================================================================

/// Running calculator application.
pub struct App {
    /// Configuration
    config: Config,
    /// Field values
    fields: FieldStateStore,
    /// Lock flags
    locks: LockStateStore,
    /// Calculator outputs
    derived: DerivedChannels,
    /// Event bus
    event_bus: Arc<EventBus>,
    /// Background tasks, joined on shutdown
    tasks: Vec<JoinHandle<()>>,
}

impl App {
    /// Load state from `store` and start the background tasks.
    ///
    /// Storage failures while loading are logged and fall back to defaults.
    ///
    /// # Errors
    /// Returns `AppError::Engine` if the computation graph is invalid
    pub async fn start(config: Config, store: Arc<dyn KeyValueStore>) -> AppResult<Self> {
        let event_bus = Arc::new(EventBus::new(config.event_capacity));
        let timing = config.timing;

        let values = load_field_values(store.as_ref()).await;
        let flags = load_lock_flags(store.as_ref()).await;

        let graph = Graph::new(values.clone())?;
        let (calc_tx, calc_rx) = mpsc::unbounded_channel();
        let (calculator, derived) = Calculator::new(graph, calc_rx, event_bus.clone());

        let mut tasks = vec![tokio::spawn(calculator.run())];
        let mut cells = BTreeMap::new();

        for (field, value) in values {
            let (cell, settled_tx) = FieldCell::new(value);

            let calc_tx = calc_tx.clone();
            tasks.push(spawn_debounced(
                cell.subscribe(),
                timing.compute_debounce,
                move |value: FieldValue| {
                    settled_tx.send_replace(value.clone());
                    // Closed only once the calculator is gone, i.e. during shutdown
                    let _ = calc_tx.send(FieldSettled { field, value });
                    ready(())
                },
            ));

            let store = store.clone();
            tasks.push(spawn_debounced(
                cell.subscribe(),
                timing.persist_debounce,
                move |value: FieldValue| {
                    let store = store.clone();
                    async move { persist(store.as_ref(), field.value_key(), value.as_str()).await }
                },
            ));

            cells.insert(field, cell);
        }
        drop(calc_tx);

        let locks = LockStateStore::new(&flags, event_bus.clone());
        for field in FieldId::ALL {
            let (Some(rx), Some(key)) = (locks.subscribe(field), field.lock_key()) else {
                continue;
            };

            let store = store.clone();
            tasks.push(spawn_debounced(rx, timing.persist_debounce, move |locked: bool| {
                let store = store.clone();
                let key = key.clone();
                async move { persist(store.as_ref(), &key, encode_lock(locked)).await }
            }));
        }

        let fields = FieldStateStore::new(cells, event_bus.clone());

        info!(
            fields = registry().len(),
            tasks = tasks.len(),
            environment = %config.environment,
            "App started"
        );

        Ok(Self {
            config,
            fields,
            locks,
            derived,
            event_bus,
            tasks,
        })
    }

    /// Configuration the app was started with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Field State Store
    pub fn fields(&self) -> &FieldStateStore {
        &self.fields
    }

    /// Lock State Store
    pub fn locks(&self) -> &LockStateStore {
        &self.locks
    }

    /// Latest settled derived values
    pub fn derived(&self) -> DerivedSnapshot {
        self.derived.snapshot()
    }

    /// Receiver notified after every propagation through the graph
    pub fn subscribe_derived(&self) -> watch::Receiver<DerivedSnapshot> {
        self.derived.subscribe()
    }

    /// Receiver for a single derived node
    pub fn on_derived(&self, node: DerivedNode) -> watch::Receiver<DerivedValue> {
        self.derived.node(node)
    }

    /// Subscribe to application events
    pub fn events(&self) -> EventReceiver {
        self.event_bus.subscribe()
    }

    /// Whether the field's input is disabled (it has a lock and it is set)
    ///
    /// # Errors
    /// Returns `DomainError::UnknownField` for unregistered names
    pub fn is_disabled(&self, name: &str) -> Result<bool, DomainError> {
        Ok(self.locks.is_locked(FieldId::from_name(name)?))
    }

    /// Write every unlocked field back to its default (or empty).
    ///
    /// Returns the fields that were reset. Resetting twice is the same as
    /// resetting once.
    pub fn reset_all(&self) -> Vec<FieldId> {
        let (kept, reset): (Vec<FieldId>, Vec<FieldId>) =
            FieldId::ALL.into_iter().partition(|field| self.locks.is_locked(*field));

        for field in &reset {
            self.fields.write(*field, field.spec().default_field_value());
        }

        info!(reset = reset.len(), kept = kept.len(), "Fields reset");
        self.event_bus.send(AppEvent::ResetApplied {
            reset: reset.clone(),
            kept,
        });
        reset
    }

    /// Close every cell, flush pending writes and wait for the tasks.
    ///
    /// # Errors
    /// Returns `AppError::Task` if a background task panicked
    pub async fn shutdown(self) -> AppResult<()> {
        let Self {
            fields,
            locks,
            derived,
            event_bus,
            tasks,
            ..
        } = self;

        info!("Shutting down, flushing pending writes");

        // Dropping the senders ends the debounce loops, which in turn
        // release the calculator inbox.
        drop(fields);
        drop(locks);
        drop(derived);

        let mut first_error = None;
        for task in tasks {
            if let Err(e) = task.await {
                debug!(error = %e, "Background task failed");
                first_error.get_or_insert(AppError::Task(e.to_string()));
            }
        }

        event_bus.send(AppEvent::Shutdown);

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Shutdown complete");
                Ok(())
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sizer_store::MemoryStore;
    use std::time::Duration;

    async fn start(store: Arc<MemoryStore>) -> App {
        App::start(Config::test(), store).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_with_defaults() {
        let app = start(Arc::new(MemoryStore::new())).await;

        assert_eq!(app.fields().read(FieldId::AccountBalance).as_str(), "1000");
        assert_eq!(app.derived().number(DerivedNode::RiskInUsd), 20.0);
        assert!(app.derived().get(DerivedNode::Trend).is_undefined());

        app.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_reaches_derived_after_debounce() {
        let app = start(Arc::new(MemoryStore::new())).await;

        app.fields().write(FieldId::RiskPercent, "5");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(app.derived().number(DerivedNode::RiskInUsd), 20.0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(app.derived().number(DerivedNode::RiskInUsd), 50.0);

        app.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_respects_locks() {
        let app = start(Arc::new(MemoryStore::new())).await;

        app.fields().write(FieldId::AccountBalance, "5000");
        app.fields().write(FieldId::RiskPercent, "3");
        app.locks().toggle(FieldId::RiskPercent).unwrap();

        let reset = app.reset_all();

        assert!(!reset.contains(&FieldId::RiskPercent));
        assert_eq!(app.fields().read(FieldId::AccountBalance).as_str(), "1000");
        assert_eq!(app.fields().read(FieldId::RiskPercent).as_str(), "3");
        assert!(app.is_disabled("risk-percent").unwrap());
        assert!(!app.is_disabled("account-balance").unwrap());

        app.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_flushes_pending_writes() {
        let store = Arc::new(MemoryStore::new());
        let app = start(store.clone()).await;

        app.fields().write(FieldId::EntryPrice, "95000");
        app.shutdown().await.unwrap();

        assert_eq!(store.get("entry-price").await.unwrap().as_deref(), Some("95000"));
    }
}
