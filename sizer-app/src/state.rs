//! Field and Lock State Stores.
//!
//! One `watch` cell per field (and per lockable field's lock flag). The cell
//! is the single writer path for its value; background tasks subscribe to it
//! for debounced computation and persistence.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use sizer_domain::{DomainError, FieldId, FieldValue};
use tokio::sync::watch;
use tracing::debug;

use crate::event_bus::{AppEvent, EventBus};

// =============================================================================
// Field State
// =============================================================================

/// Reactive cell for one field.
pub(crate) struct FieldCell {
    /// Latest raw value
    value: watch::Sender<FieldValue>,
    /// Latest value that made it through the compute debounce
    settled: watch::Receiver<FieldValue>,
}

impl FieldCell {
    /// Create a cell; the returned sender feeds the settled stream.
    pub(crate) fn new(initial: FieldValue) -> (Self, watch::Sender<FieldValue>) {
        let (value, _) = watch::channel(initial.clone());
        let (settled_tx, settled) = watch::channel(initial);
        (Self { value, settled }, settled_tx)
    }

    /// Subscribe to raw (undebounced) values
    pub(crate) fn subscribe(&self) -> watch::Receiver<FieldValue> {
        self.value.subscribe()
    }
}

/// Current value of every field.
pub struct FieldStateStore {
    cells: BTreeMap<FieldId, FieldCell>,
    event_bus: Arc<EventBus>,
}

impl FieldStateStore {
    pub(crate) fn new(cells: BTreeMap<FieldId, FieldCell>, event_bus: Arc<EventBus>) -> Self {
        Self { cells, event_bus }
    }

    /// Latest written value (not debounced)
    pub fn read(&self, field: FieldId) -> FieldValue {
        self.cells
            .get(&field)
            .map(|cell| cell.value.borrow().clone())
            .unwrap_or_default()
    }

    /// Latest written value of the field called `name`
    ///
    /// # Errors
    /// Returns `DomainError::UnknownField` for unregistered names
    pub fn read_by_name(&self, name: &str) -> Result<FieldValue, DomainError> {
        Ok(self.read(FieldId::from_name(name)?))
    }

    /// Store a raw edited value. No parsing or validation happens here.
    pub fn write(&self, field: FieldId, raw: impl Into<FieldValue>) {
        let value = raw.into();
        let Some(cell) = self.cells.get(&field) else {
            return;
        };

        debug!(field = %field, value = %value, "Field written");
        cell.value.send_replace(value.clone());
        self.event_bus.send(AppEvent::FieldChanged {
            field,
            value,
            timestamp: Utc::now(),
        });
    }

    /// Store a raw edited value for the field called `name`
    ///
    /// # Errors
    /// Returns `DomainError::UnknownField` for unregistered names
    pub fn write_by_name(&self, name: &str, raw: impl Into<FieldValue>) -> Result<(), DomainError> {
        self.write(FieldId::from_name(name)?, raw);
        Ok(())
    }

    /// Values as they reach the computation graph (compute-debounced)
    pub fn on_change(&self, field: FieldId) -> watch::Receiver<FieldValue> {
        match self.cells.get(&field) {
            Some(cell) => cell.settled.clone(),
            // Every registered field has a cell
            None => watch::channel(FieldValue::empty()).1,
        }
    }
}

// =============================================================================
// Lock State
// =============================================================================

/// Lock flags of the lockable fields.
///
/// Calling lock operations for a field without a lock is a caller bug; it is
/// reported as `DomainError::NotLockable` and changes nothing.
pub struct LockStateStore {
    locks: BTreeMap<FieldId, watch::Sender<bool>>,
    event_bus: Arc<EventBus>,
}

impl LockStateStore {
    /// Build one flag per lockable field from the initial values.
    ///
    /// Flags missing from `initial` start unlocked; entries for fields
    /// without a lock are ignored.
    pub(crate) fn new(initial: &BTreeMap<FieldId, bool>, event_bus: Arc<EventBus>) -> Self {
        let locks = FieldId::ALL
            .into_iter()
            .filter(|field| field.is_lockable())
            .map(|field| {
                let locked = initial.get(&field).copied().unwrap_or(false);
                (field, watch::channel(locked).0)
            })
            .collect();

        Self { locks, event_bus }
    }

    /// Current lock flag
    ///
    /// # Errors
    /// Returns `DomainError::NotLockable` if the field has no lock
    pub fn read(&self, field: FieldId) -> Result<bool, DomainError> {
        Ok(*self.lock(field)?.borrow())
    }

    /// Flip the lock flag and return the new value
    ///
    /// # Errors
    /// Returns `DomainError::NotLockable` if the field has no lock
    pub fn toggle(&self, field: FieldId) -> Result<bool, DomainError> {
        let lock = self.lock(field)?;
        lock.send_modify(|locked| *locked = !*locked);
        let locked = *lock.borrow();

        debug!(field = %field, locked, "Lock toggled");
        self.event_bus.send(AppEvent::LockToggled {
            field,
            locked,
            timestamp: Utc::now(),
        });
        Ok(locked)
    }

    /// Flip the lock flag of the field called `name`
    ///
    /// # Errors
    /// Returns `DomainError::UnknownField` or `DomainError::NotLockable`
    pub fn toggle_by_name(&self, name: &str) -> Result<bool, DomainError> {
        self.toggle(FieldId::from_name(name)?)
    }

    /// True if the field has a lock and it is set
    pub fn is_locked(&self, field: FieldId) -> bool {
        self.read(field).unwrap_or(false)
    }

    /// Subscribe to lock flag changes (`None` if the field has no lock)
    pub fn subscribe(&self, field: FieldId) -> Option<watch::Receiver<bool>> {
        self.locks.get(&field).map(watch::Sender::subscribe)
    }

    fn lock(&self, field: FieldId) -> Result<&watch::Sender<bool>, DomainError> {
        self.locks
            .get(&field)
            .ok_or_else(|| DomainError::NotLockable(field.name().to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
