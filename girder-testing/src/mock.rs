// In-memory storage backend for tests

use girder_core::{StorageBackend, StorageHandle};
use parking_lot::RwLock;
use serde_json::Value;

/// Rows of JSON objects; [`query`](Self::query) applies the equality
/// filters decorators placed on the request's [`StorageHandle`].
#[derive(Debug, Default)]
pub struct MemoryStorage {
    rows: RwLock<Vec<Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Value>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }

    pub fn insert(&self, row: Value) {
        self.rows.write().push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows matching every filter on the handle
    pub fn query(&self, handle: &StorageHandle) -> Vec<Value> {
        self.rows
            .read()
            .iter()
            .filter(|row| {
                handle
                    .filters()
                    .iter()
                    .all(|filter| row.get(&filter.field) == Some(&filter.value))
            })
            .cloned()
            .collect()
    }
}

impl StorageBackend for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use girder_core::StorageFilter;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_query_applies_every_filter() {
        let storage = Arc::new(MemoryStorage::with_rows(vec![
            json!({"id": 1, "tenant_id": "acme", "kind": "a"}),
            json!({"id": 2, "tenant_id": "acme", "kind": "b"}),
            json!({"id": 3, "tenant_id": "umbrella", "kind": "a"}),
        ]));
        let filter = |field: &str, value: Value| StorageFilter {
            field: field.to_string(),
            value,
        };

        let handle = StorageHandle::new(storage.clone(), vec![filter("tenant_id", json!("acme"))]);
        assert_eq!(storage.query(&handle).len(), 2);

        let handle = StorageHandle::new(
            storage.clone(),
            vec![filter("tenant_id", json!("acme")), filter("kind", json!("b"))],
        );
        assert_eq!(storage.query(&handle), vec![json!({"id": 2, "tenant_id": "acme", "kind": "b"})]);

        let handle = StorageHandle::new(storage.clone(), Vec::new());
        assert_eq!(storage.query(&handle).len(), 3);
        assert_eq!(handle.downcast::<MemoryStorage>().map(|s| s.len()), Some(3));
    }
}
