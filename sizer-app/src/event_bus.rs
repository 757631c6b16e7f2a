//! Event bus for application notifications.
//!
//! The event bus lets the presentation layer follow state without polling:
//! - Field State Store → edits
//! - Lock State Store → lock toggles
//! - Calculator → settled derived values
//! - App → bulk resets and shutdown
//!
//! Uses tokio broadcast channels for fan-out to multiple receivers.

use chrono::{DateTime, Utc};
use sizer_domain::{FieldId, FieldValue};
use sizer_engine::{DerivedNode, DerivedSnapshot};
use tokio::sync::broadcast;

// =============================================================================
// Event Types
// =============================================================================

/// Events that flow through the application event bus.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// A field received a new raw value
    FieldChanged {
        field: FieldId,
        value: FieldValue,
        timestamp: DateTime<Utc>,
    },

    /// A lock flag flipped
    LockToggled {
        field: FieldId,
        locked: bool,
        timestamp: DateTime<Utc>,
    },

    /// Derived values were recomputed from a settled field value
    DerivedUpdated {
        field: FieldId,
        recomputed: Vec<DerivedNode>,
        snapshot: DerivedSnapshot,
    },

    /// Bulk reset applied
    ResetApplied {
        reset: Vec<FieldId>,
        kept: Vec<FieldId>,
    },

    /// Shutdown signal
    Shutdown,
}

// =============================================================================
// Event Bus
// =============================================================================

/// Event bus for application-wide notifications.
///
/// Multiple producers can send events, and multiple consumers can receive.
pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    /// Create a new event bus with specified capacity.
    ///
    /// Capacity determines how many events can be buffered before
    /// slow receivers start missing events (lagging).
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an event to all subscribers.
    ///
    /// Returns the number of receivers that received the event.
    /// Returns 0 if there are no active receivers.
    pub fn send(&self, event: AppEvent) -> usize {
        // send() returns Err if there are no receivers, but we don't care
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to events sent after this call.
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Get the number of active receivers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Receiver for application events.
pub struct EventReceiver {
    receiver: broadcast::Receiver<AppEvent>,
}

impl EventReceiver {
    /// Receive the next event.
    ///
    /// Returns `None` if the bus has been dropped.
    /// Returns error description if the receiver lagged (missed events).
    pub async fn recv(&mut self) -> Option<Result<AppEvent, String>> {
        match self.receiver.recv().await {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::RecvError::Closed) => None,
            Err(broadcast::error::RecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            },
        }
    }

    /// Try to receive an event without blocking.
    ///
    /// Returns `None` if no event is immediately available.
    pub fn try_recv(&mut self) -> Option<Result<AppEvent, String>> {
        match self.receiver.try_recv() {
            Ok(event) => Some(Ok(event)),
            Err(broadcast::error::TryRecvError::Empty) => None,
            Err(broadcast::error::TryRecvError::Closed) => None,
            Err(broadcast::error::TryRecvError::Lagged(count)) => {
                Some(Err(format!("Receiver lagged, missed {} events", count)))
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
