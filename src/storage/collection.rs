use crate::core::{FieldDef, RecordKey, RecordSchema, RecordState, Result, StoreError, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rows of one record type.
///
/// Rows live under auto-increment row ids, so keyless types are storable;
/// types with a primary key also maintain a key index into those ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    schema: RecordSchema,
    rows: BTreeMap<u64, RecordState>,
    primary: BTreeMap<Value, u64>,
    next_row_id: u64,
}

impl Collection {
    pub fn new(schema: RecordSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            primary: BTreeMap::new(),
            next_row_id: 0,
        }
    }

    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Inserts a new record. Keyed types reject an already-present key.
    pub fn insert(&mut self, state: RecordState) -> Result<u64> {
        self.schema.validate_state(&state)?;
        let key_value = self.key_value_of(&state);
        if let Some(value) = &key_value
            && self.primary.contains_key(value)
        {
            return Err(StoreError::DuplicateKey {
                record_type: self.schema.name().to_string(),
                key: RecordKey::from_value(value.clone()),
            });
        }
        let id = self.next_row_id;
        self.next_row_id += 1;
        if let Some(value) = key_value {
            self.primary.insert(value, id);
        }
        self.rows.insert(id, state);
        Ok(id)
    }

    /// Inserts or replaces by primary key. Requires a keyed schema.
    pub fn upsert(&mut self, state: RecordState) -> Result<u64> {
        self.require_key()?;
        self.schema.validate_state(&state)?;
        let Some(value) = self.key_value_of(&state) else {
            return Err(StoreError::NoPrimaryKey {
                record_type: self.schema.name().to_string(),
            });
        };
        if let Some(&id) = self.primary.get(&value) {
            self.rows.insert(id, state);
            return Ok(id);
        }
        let id = self.next_row_id;
        self.next_row_id += 1;
        self.primary.insert(value, id);
        self.rows.insert(id, state);
        Ok(id)
    }

    /// Looks up a record by primary key. A key whose kind does not match
    /// the declared key type simply misses.
    pub fn get(&self, key: &RecordKey) -> Result<Option<&RecordState>> {
        self.require_key()?;
        Ok(self.primary.get(key.value()).and_then(|id| self.rows.get(id)))
    }

    pub fn contains(&self, key: &RecordKey) -> Result<bool> {
        self.require_key()?;
        Ok(self.primary.contains_key(key.value()))
    }

    /// Removes a record by primary key; returns whether one was present.
    pub fn remove(&mut self, key: &RecordKey) -> Result<bool> {
        self.require_key()?;
        match self.primary.remove(key.value()) {
            Some(id) => {
                self.rows.remove(&id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// All rows in insertion order.
    pub fn scan(&self) -> impl Iterator<Item = &RecordState> {
        self.rows.values()
    }

    fn key_value_of(&self, state: &RecordState) -> Option<Value> {
        let field = self.schema.primary_key()?;
        state.get(&field.name).cloned()
    }

    fn require_key(&self) -> Result<&FieldDef> {
        self.schema.primary_key().ok_or_else(|| StoreError::NoPrimaryKey {
            record_type: self.schema.name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FieldType;

    fn keyed() -> Collection {
        Collection::new(RecordSchema::new(
            "Account",
            vec![
                FieldDef::new("id", FieldType::Integer).primary_key(),
                FieldDef::new("owner", FieldType::Text),
            ],
        ))
    }

    fn keyless() -> Collection {
        Collection::new(RecordSchema::new(
            "Event",
            vec![FieldDef::new("message", FieldType::Text)],
        ))
    }

    fn account(id: i64, owner: &str) -> RecordState {
        let mut state = RecordState::new();
        state.insert("id".into(), Value::Integer(id));
        state.insert("owner".into(), Value::Text(owner.into()));
        state
    }

    #[test]
    fn insert_then_get() {
        let mut collection = keyed();
        collection.insert(account(1, "alice")).unwrap();
        let found = collection.get(&RecordKey::int(1)).unwrap().unwrap();
        assert_eq!(found.get("owner"), Some(&Value::Text("alice".into())));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut collection = keyed();
        collection.insert(account(1, "alice")).unwrap();
        let err = collection.insert(account(1, "bob")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { .. }));
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut collection = keyed();
        let first = collection.upsert(account(1, "alice")).unwrap();
        let second = collection.upsert(account(1, "alicia")).unwrap();
        assert_eq!(first, second);
        assert_eq!(collection.len(), 1);
        let found = collection.get(&RecordKey::int(1)).unwrap().unwrap();
        assert_eq!(found.get("owner"), Some(&Value::Text("alicia".into())));
    }

    #[test]
    fn remove_frees_the_key() {
        let mut collection = keyed();
        collection.insert(account(1, "alice")).unwrap();
        assert!(collection.remove(&RecordKey::int(1)).unwrap());
        assert!(!collection.remove(&RecordKey::int(1)).unwrap());
        assert!(collection.is_empty());
        collection.insert(account(1, "anna")).unwrap();
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn wrong_key_kind_misses() {
        let mut collection = keyed();
        collection.insert(account(42, "alice")).unwrap();
        assert!(collection.get(&RecordKey::text("42")).unwrap().is_none());
        assert!(!collection.contains(&RecordKey::text("42")).unwrap());
    }

    #[test]
    fn keyless_collections_insert_and_scan() {
        let mut collection = keyless();
        for text in ["a", "b", "c"] {
            let mut state = RecordState::new();
            state.insert("message".into(), Value::Text(text.into()));
            collection.insert(state).unwrap();
        }
        let scanned: Vec<_> = collection
            .scan()
            .filter_map(|s| s.get("message").and_then(Value::as_str))
            .collect();
        assert_eq!(scanned, vec!["a", "b", "c"]);
    }

    #[test]
    fn keyless_collections_reject_key_lookups() {
        let mut collection = keyless();
        let mut state = RecordState::new();
        state.insert("message".into(), Value::Text("x".into()));
        collection.insert(state).unwrap();
        assert!(matches!(
            collection.get(&RecordKey::int(0)),
            Err(StoreError::NoPrimaryKey { .. })
        ));
        assert!(matches!(
            collection.upsert(RecordState::new()),
            Err(StoreError::NoPrimaryKey { .. })
        ));
    }

    #[test]
    fn null_primary_key_is_rejected() {
        let mut collection = keyed();
        let mut state = account(1, "alice");
        state.insert("id".into(), Value::Null);
        assert!(collection.insert(state).is_err());
    }
}
