//! The per-render state payload store.
//!
//! A store is opened empty at the start of a render pass, written by every
//! component that resolves an asynchronous initial state, and serialized once
//! after the pass. On the client the same mapping is rebuilt from the embedded
//! block and consulted read-only at mount time.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SsrCoreError};
use crate::identity::ComponentId;
use crate::state::State;

/// Mapping from component identity to resolved state.
///
/// Ordered by identity so that the serialized form is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadStore {
    entries: BTreeMap<ComponentId, State>,
}

impl PayloadStore {
    /// Opens a new, empty store.
    pub fn open() -> Self {
        Self::default()
    }

    /// Records the state for `id`. The last write for an identity wins.
    pub fn set(&mut self, id: ComponentId, state: State) {
        self.entries.insert(id, state);
    }

    /// Looks up the state recorded for `id`.
    pub fn get(&self, id: &ComponentId) -> Option<&State> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &ComponentId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries in identity order.
    pub fn iter(&self) -> impl Iterator<Item = (&ComponentId, &State)> {
        self.entries.iter()
    }

    /// Serializes the store to its wire form.
    ///
    /// The result is a JSON object safe to place inside a `<script>` element:
    /// see [`crate::embed::escape_for_script`].
    pub fn serialize(&self) -> Result<String> {
        let json = serde_json::to_string(&self.entries)
            .map_err(|e| SsrCoreError::Serialization(e.to_string()))?;
        Ok(crate::embed::escape_for_script(&json))
    }

    /// Parses a serialized block, reporting why it could not be used.
    pub fn try_deserialize(block: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(block.trim())
            .map_err(|e| SsrCoreError::MalformedPayload(e.to_string()))?;

        if !value.is_object() {
            return Err(SsrCoreError::MalformedPayload(
                "payload must be a JSON object".to_string(),
            ));
        }

        serde_json::from_value(value).map_err(|e| SsrCoreError::MalformedPayload(e.to_string()))
    }

    /// Rebuilds a store from an embedded block.
    ///
    /// A missing or unusable block yields an empty store, which sends every
    /// component down the client-side loading path instead of failing the page.
    pub fn deserialize(block: Option<&str>) -> Self {
        block
            .and_then(|block| Self::try_deserialize(block).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_state(n: i64) -> State {
        State::new().with("n", n).with("label", format!("item-{n}"))
    }

    #[test]
    fn test_open_is_empty() {
        let store = PayloadStore::open();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_set_and_get() {
        let mut store = PayloadStore::open();
        let id = ComponentId::root().child(0);
        store.set(id.clone(), sample_state(1));

        assert!(store.contains(&id));
        assert_eq!(store.get(&id), Some(&sample_state(1)));
        assert_eq!(store.get(&ComponentId::root()), None);
    }

    #[test]
    fn test_last_write_wins() {
        let mut store = PayloadStore::open();
        let id = ComponentId::root();
        store.set(id.clone(), sample_state(1));
        store.set(id.clone(), sample_state(2));

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id), Some(&sample_state(2)));
    }

    #[test]
    fn test_serialize_then_deserialize_preserves_entries() {
        let mut store = PayloadStore::open();
        store.set(ComponentId::root(), sample_state(1));
        store.set(ComponentId::root().child(3), State::new());
        store.set(
            ComponentId::root().keyed("nav"),
            State::from_value(json!({"links": ["/", "/about"], "open": false})).unwrap(),
        );

        let block = store.serialize().unwrap();
        let restored = PayloadStore::deserialize(Some(&block));

        assert_eq!(restored, store);
    }

    #[test]
    fn test_serialize_shape_is_id_to_state() {
        let mut store = PayloadStore::open();
        store.set(ComponentId::root(), State::new().with("a", 1));

        let block = store.serialize().unwrap();
        assert_eq!(block, r#"{".0":{"a":1}}"#);
    }

    #[test]
    fn test_deserialize_missing_block_is_empty() {
        assert!(PayloadStore::deserialize(None).is_empty());
        assert!(PayloadStore::deserialize(Some("")).is_empty());
    }

    #[test]
    fn test_deserialize_malformed_block_is_empty() {
        assert!(PayloadStore::deserialize(Some("{not json")).is_empty());
        assert!(PayloadStore::deserialize(Some("[1,2,3]")).is_empty());
        assert!(PayloadStore::deserialize(Some(r#"{".0": 42}"#)).is_empty());
    }

    #[test]
    fn test_try_deserialize_reports_reason() {
        let result = PayloadStore::try_deserialize("null");
        assert!(matches!(result, Err(SsrCoreError::MalformedPayload(_))));
    }
}
