use crate::core::{RecordSchema, Result, StoreError};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of record schemas known to a store.
///
/// The map is immutable once built; registration clones it and swaps in a
/// new `Arc` (copy-on-write), so clones are cheap and lookups never see a
/// half-updated catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    schemas: Arc<HashMap<String, RecordSchema>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            schemas: Arc::new(HashMap::new()),
        }
    }

    /// Registers a schema, returning the updated catalog.
    ///
    /// Re-registering an identical schema is a no-op; a conflicting
    /// redefinition is rejected.
    pub fn with_schema(self, schema: RecordSchema) -> Result<Self> {
        schema.validate()?;
        if let Some(existing) = self.schemas.get(schema.name()) {
            if *existing == schema {
                return Ok(self);
            }
            return Err(StoreError::SchemaViolation(format!(
                "record type '{}' is already registered with a different schema",
                schema.name()
            )));
        }
        let mut schemas = (*self.schemas).clone();
        schemas.insert(schema.name().to_string(), schema);
        Ok(Self {
            schemas: Arc::new(schemas),
        })
    }

    pub fn get(&self, name: &str) -> Result<&RecordSchema> {
        self.schemas
            .get(name)
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.schemas.keys().map(|s| s.as_str()).collect()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FieldDef, FieldType};

    fn schema(name: &str) -> RecordSchema {
        RecordSchema::new(
            name,
            vec![FieldDef::new("id", FieldType::Integer).primary_key()],
        )
    }

    #[test]
    fn registration_is_idempotent() {
        let catalog = Catalog::new()
            .with_schema(schema("User"))
            .unwrap()
            .with_schema(schema("User"))
            .unwrap();
        assert!(catalog.contains("User"));
        assert_eq!(catalog.names().len(), 1);
    }

    #[test]
    fn conflicting_redefinition_is_rejected() {
        let catalog = Catalog::new().with_schema(schema("User")).unwrap();
        let changed = RecordSchema::new(
            "User",
            vec![FieldDef::new("id", FieldType::Text).primary_key()],
        );
        assert!(matches!(
            catalog.with_schema(changed),
            Err(StoreError::SchemaViolation(_))
        ));
    }

    #[test]
    fn missing_schema_lookup_fails() {
        let err = Catalog::new().get("Ghost").unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(name) if name == "Ghost"));
    }

    #[test]
    fn clones_do_not_observe_later_registrations() {
        let before = Catalog::new();
        let after = before.clone().with_schema(schema("User")).unwrap();
        assert!(!before.contains("User"));
        assert!(after.contains("User"));
    }
}
