//! Process-wide store-type registry
//!
//! Populated once per type by concrete stores at their own initialization
//! time, queried read-mostly, never cleared during normal operation.

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::StoreError;

use super::{Store, StoreJson};

/// Constructor reviving a store from its serialized form
pub type StoreFactory = fn(&StoreJson) -> Result<Box<dyn Store>, StoreError>;

static STORE_REGISTRY: Lazy<RwLock<FxHashMap<String, StoreFactory>>> =
    Lazy::new(|| RwLock::new(FxHashMap::default()));

/// Register a store type under a name. The first registration wins; a
/// duplicate name returns `false` and leaves the existing entry intact.
pub fn add_store(name: &str, factory: StoreFactory) -> bool {
    let mut registry = STORE_REGISTRY.write();
    if registry.contains_key(name) {
        tracing::debug!(name, "store type already registered");
        return false;
    }
    registry.insert(name.to_string(), factory);
    true
}

/// Look up a registered store factory by name
pub fn get_store(name: &str) -> Option<StoreFactory> {
    STORE_REGISTRY.read().get(name).copied()
}

/// All registered store names, sorted
pub fn get_all_store_names() -> Vec<String> {
    let mut names: Vec<String> = STORE_REGISTRY.read().keys().cloned().collect();
    names.sort();
    names
}

/// Defensive copy of the whole registry
pub fn get_all_stores() -> FxHashMap<String, StoreFactory> {
    STORE_REGISTRY.read().clone()
}

/// Revive a store from its serialized form by dispatching on the class tag
pub fn store_from_json(json: &StoreJson) -> Result<Box<dyn Store>, StoreError> {
    let factory = get_store(&json.class_tag)
        .ok_or_else(|| StoreError::UnknownStoreType(json.class_tag.clone()))?;
    factory(json)
}

/// Parse serialized store JSON text and revive the store it describes
pub fn store_from_json_str(json: &str) -> Result<Box<dyn Store>, StoreError> {
    let parsed: StoreJson = serde_json::from_str(json)?;
    store_from_json(&parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Row, Table};
    use crate::store::{MemoryStore, StoreCore};

    struct NullStore {
        core: StoreCore,
    }

    impl Store for NullStore {
        fn core(&self) -> &StoreCore {
            &self.core
        }

        fn core_mut(&mut self) -> &mut StoreCore {
            &mut self.core
        }

        fn class_tag(&self) -> &'static str {
            "NullStore"
        }
    }

    fn null_factory(_json: &StoreJson) -> Result<Box<dyn Store>, StoreError> {
        Ok(Box::new(NullStore {
            core: StoreCore::default(),
        }))
    }

    fn failing_factory(_json: &StoreJson) -> Result<Box<dyn Store>, StoreError> {
        Err(StoreError::UnknownStoreType("failing".to_string()))
    }

    #[test]
    fn test_first_registration_wins() {
        assert!(add_store("registry-test-dup", null_factory));
        assert!(!add_store("registry-test-dup", failing_factory));

        let registered = get_store("registry-test-dup").unwrap();
        let json = StoreJson {
            class_tag: "registry-test-dup".to_string(),
            metadata: Default::default(),
            table: Table::new(),
        };
        assert!(
            registered(&json).is_ok(),
            "first registration stays intact"
        );
    }

    #[test]
    fn test_read_accessors() {
        add_store("registry-test-read", null_factory);
        assert!(get_all_store_names().contains(&"registry-test-read".to_string()));
        assert!(get_all_stores().contains_key("registry-test-read"));
        assert!(get_store("registry-test-missing").is_none());
    }

    #[test]
    fn test_store_from_json_dispatches_on_class_tag() {
        MemoryStore::register();

        let mut table = Table::new();
        table
            .insert_row(Row::with_id("r0").with_cell("x", 1.0))
            .unwrap();
        let store = MemoryStore::new(table);

        let revived = store_from_json(&store.to_json()).unwrap();
        assert_eq!(revived.class_tag(), MemoryStore::NAME);
        assert_eq!(revived.core().table().row_count(), 1);
    }

    #[test]
    fn test_store_from_json_str() {
        MemoryStore::register();

        let store = MemoryStore::new(Table::new());
        let wire = serde_json::to_string(&store.to_json()).unwrap();
        let revived = store_from_json_str(&wire).unwrap();
        assert_eq!(revived.class_tag(), MemoryStore::NAME);

        assert!(matches!(
            store_from_json_str("{not json"),
            Err(StoreError::Json(_))
        ));
    }

    #[test]
    fn test_store_from_json_unknown_tag_fails() {
        let json = StoreJson {
            class_tag: "NeverRegistered".to_string(),
            metadata: Default::default(),
            table: Table::new(),
        };
        let err = match store_from_json(&json) {
            Ok(_) => panic!("expected store_from_json to fail for unknown tag"),
            Err(e) => e,
        };
        assert!(matches!(err, StoreError::UnknownStoreType(name) if name == "NeverRegistered"));
    }
}
