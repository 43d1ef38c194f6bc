//! Run-scoped named value store.

use std::collections::HashMap;

use serde_json::Value;

use crate::errors::{PipelineError, Result};

/// Named intermediate-value scratch space, scoped to one top-level
/// execution. Save stages write entries; func stages read them back through
/// their retrieve keys. Entries saved earlier in document order are visible
/// to every later stage of the same run and never to other runs.
#[derive(Clone, Debug, Default)]
pub struct ValueStore {
    entries: HashMap<String, Value>,
}

impl ValueStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Save `value` under `name`, overwriting any prior entry.
    pub fn save(&mut self, name: impl Into<String>, value: Value) {
        let _ = self.entries.insert(name.into(), value);
    }

    /// The value last saved under `name`.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.entries
            .get(name)
            .ok_or_else(|| PipelineError::Lookup(name.to_owned()))
    }

    /// Number of saved entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn save_then_get() {
        let mut store = ValueStore::new();
        store.save("x", json!(42));
        assert_eq!(store.get("x").unwrap(), &json!(42));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn save_overwrites() {
        let mut store = ValueStore::new();
        store.save("x", json!("first"));
        store.save("x", json!("second"));
        assert_eq!(store.get("x").unwrap(), &json!("second"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn missing_name_is_lookup_error() {
        let store = ValueStore::new();
        assert_matches!(store.get("absent"), Err(PipelineError::Lookup(name)) if name == "absent");
    }
}
