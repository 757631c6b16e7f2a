//! Position Sizer Domain Layer
//!
//! Pure domain types with zero I/O dependencies.
//! Contains the field registry, field values, derived values and the
//! display rules used to render them.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod fields;
pub mod format;
pub mod value_objects;

// Re-export commonly used types
pub use fields::{registry, FieldId, FieldKind, FieldSpec, LOCK_KEY_SUFFIX};
pub use format::format_display;
pub use value_objects::{DerivedValue, DomainError, FieldValue, Trend};
