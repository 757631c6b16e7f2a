//! Loading and saving field state.
//!
//! Storage is best-effort: a failed read falls back to the default and a
//! failed write keeps the in-memory value. Both are logged.

use std::collections::BTreeMap;

use sizer_domain::{registry, FieldId, FieldValue};
use sizer_store::KeyValueStore;
use tracing::{debug, warn};

/// Stored text of a set lock flag
const LOCKED: &str = "true";
/// Stored text of a cleared lock flag
const UNLOCKED: &str = "false";

/// Encode a lock flag for storage
pub fn encode_lock(locked: bool) -> &'static str {
    if locked {
        LOCKED
    } else {
        UNLOCKED
    }
}

/// Decode a stored lock flag. Only `"true"` means locked.
pub fn decode_lock(raw: Option<&str>) -> bool {
    raw.map(str::trim) == Some(LOCKED)
}

/// Initial value of every field: stored value if present and non-empty,
/// else the field default, else empty.
pub async fn load_field_values(store: &dyn KeyValueStore) -> BTreeMap<FieldId, FieldValue> {
    let mut values = BTreeMap::new();

    for spec in registry() {
        let stored = match store.get(spec.id.value_key()).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(field = %spec.id, error = %e, "Failed to load field value, using default");
                None
            },
        };

        let value = stored
            .filter(|raw| !raw.is_empty())
            .map(FieldValue::new)
            .unwrap_or_else(|| spec.default_field_value());
        values.insert(spec.id, value);
    }

    debug!(fields = values.len(), "Field values loaded");
    values
}

/// Initial lock flag of every lockable field.
pub async fn load_lock_flags(store: &dyn KeyValueStore) -> BTreeMap<FieldId, bool> {
    let mut flags = BTreeMap::new();

    for field in FieldId::ALL {
        let Some(key) = field.lock_key() else {
            continue;
        };

        let locked = match store.get(&key).await {
            Ok(stored) => decode_lock(stored.as_deref()),
            Err(e) => {
                warn!(field = %field, error = %e, "Failed to load lock flag, leaving unlocked");
                false
            },
        };
        flags.insert(field, locked);
    }

    flags
}

/// Write one value, logging instead of failing.
pub async fn persist(store: &dyn KeyValueStore, key: &str, value: &str) {
    match store.set(key, value).await {
        Ok(()) => debug!(key, value, "Persisted"),
        Err(e) => warn!(key, error = %e, "Failed to persist, keeping in-memory value"),
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use sizer_store::MemoryStore;

    #[test]
    fn test_lock_encoding() {
        assert_eq!(encode_lock(true), "true");
        assert_eq!(encode_lock(false), "false");
        assert!(decode_lock(Some("true")));
        assert!(!decode_lock(Some("false")));
        assert!(!decode_lock(Some("")));
        assert!(!decode_lock(None));
    }

    #[tokio::test]
    async fn test_load_defaults_from_empty_store() {
        let store = MemoryStore::new();
        let values = load_field_values(&store).await;

        assert_eq!(values.len(), FieldId::ALL.len());
        assert_eq!(values[&FieldId::AccountBalance].as_str(), "1000");
        assert_eq!(values[&FieldId::RiskPercent].as_str(), "2");
        assert!(values[&FieldId::EntryPrice].is_empty());
    }

    #[tokio::test]
    async fn test_stored_values_win_unless_empty() {
        let store = MemoryStore::with_entries([
            ("account-balance", "5000"),
            ("risk-percent", ""),
            ("entry-price", "95000"),
        ]);
        let values = load_field_values(&store).await;

        assert_eq!(values[&FieldId::AccountBalance].as_str(), "5000");
        assert_eq!(values[&FieldId::RiskPercent].as_str(), "2");
        assert_eq!(values[&FieldId::EntryPrice].as_str(), "95000");
    }

    #[tokio::test]
    async fn test_load_lock_flags() {
        let store = MemoryStore::with_entries([
            ("risk-percent.lock", "true"),
            ("entry-fee.lock", "false"),
        ]);
        let flags = load_lock_flags(&store).await;

        assert_eq!(flags.len(), 4);
        assert!(flags[&FieldId::RiskPercent]);
        assert!(!flags[&FieldId::EntryFee]);
        assert!(!flags[&FieldId::StopFee]);
        assert!(!flags.contains_key(&FieldId::AccountBalance));
    }

    #[tokio::test]
    async fn test_unavailable_store_falls_back() {
        let store = MemoryStore::with_entries([("account-balance", "5000")]);
        store.set_unavailable(true);

        let values = load_field_values(&store).await;
        assert_eq!(values[&FieldId::AccountBalance].as_str(), "1000");

        // Must not panic or error
        persist(&store, "account-balance", "42").await;
        store.set_unavailable(false);
        assert_eq!(store.get("account-balance").await.unwrap().as_deref(), Some("5000"));
    }
}
