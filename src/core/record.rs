use crate::core::error::{Result, StoreError};
use crate::core::key::RecordKey;
use crate::core::value::{FieldType, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A record serialized field-wise, keyed by field name.
pub type RecordState = BTreeMap<String, Value>;

/// Declares one field of a record schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub primary_key: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            nullable: false,
            primary_key: false,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Checks one value against this field's type and nullability.
    pub fn validate(&self, value: &Value) -> Result<()> {
        if value.is_null() {
            if !self.nullable {
                return Err(StoreError::SchemaViolation(format!(
                    "field '{}' cannot be null",
                    self.name
                )));
            }
            return Ok(());
        }
        if !self.field_type.is_compatible(value) {
            return Err(StoreError::TypeMismatch(format!(
                "field '{}' expects {}, got {}",
                self.name,
                self.field_type,
                value.type_name()
            )));
        }
        Ok(())
    }
}

/// Schema of one record type: its name plus field declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    name: String,
    fields: Vec<FieldDef>,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The primary-key field, if this schema declares one.
    pub fn primary_key(&self) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.primary_key)
    }

    /// Checks the schema is well formed: a non-empty name, unique field
    /// names, at most one primary key, and the key (when present)
    /// non-nullable and of integer or text type.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(StoreError::SchemaViolation(
                "record type name is empty".into(),
            ));
        }
        if self.fields.is_empty() {
            return Err(StoreError::SchemaViolation(format!(
                "record type '{}' declares no fields",
                self.name
            )));
        }
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(StoreError::SchemaViolation(format!(
                    "record type '{}' declares field '{}' twice",
                    self.name, field.name
                )));
            }
        }
        let keys: Vec<_> = self.fields.iter().filter(|f| f.primary_key).collect();
        if keys.len() > 1 {
            return Err(StoreError::SchemaViolation(format!(
                "record type '{}' declares more than one primary key",
                self.name
            )));
        }
        if let Some(key) = keys.first() {
            if key.nullable {
                return Err(StoreError::SchemaViolation(format!(
                    "primary key field '{}' must not be nullable",
                    key.name
                )));
            }
            if !matches!(key.field_type, FieldType::Integer | FieldType::Text) {
                return Err(StoreError::SchemaViolation(format!(
                    "primary key field '{}' must be INTEGER or TEXT, got {}",
                    key.name, key.field_type
                )));
            }
        }
        Ok(())
    }

    /// Validates a full record state against this schema: every declared
    /// field passes its check, and no undeclared field is present.
    pub fn validate_state(&self, state: &RecordState) -> Result<()> {
        for field in &self.fields {
            match state.get(&field.name) {
                Some(value) => field.validate(value)?,
                None if field.nullable => {}
                None => {
                    return Err(StoreError::SchemaViolation(format!(
                        "field '{}' missing from record state",
                        field.name
                    )));
                }
            }
        }
        for name in state.keys() {
            if self.field(name).is_none() {
                return Err(StoreError::SchemaViolation(format!(
                    "record type '{}' has no field '{}'",
                    self.name, name
                )));
            }
        }
        Ok(())
    }

    /// Extracts the primary key from a record state. Fails with
    /// `NoPrimaryKey` when the schema declares none.
    pub fn key_of(&self, state: &RecordState) -> Result<RecordKey> {
        let field = self.primary_key().ok_or_else(|| StoreError::NoPrimaryKey {
            record_type: self.name.clone(),
        })?;
        let value = state.get(&field.name).cloned().unwrap_or(Value::Null);
        Ok(RecordKey::from_value(value))
    }
}

/// A type that can live in a store: it names itself, declares its schema,
/// and converts to and from field-wise state.
///
/// Usually implemented through `#[derive(Record)]`.
pub trait Record: Sized {
    /// Stable name of this record type; collections are keyed by it.
    fn record_type() -> &'static str;

    /// Field declarations for this type.
    fn schema() -> RecordSchema;

    /// Serializes the record into field-wise state.
    fn to_state(&self) -> Result<RecordState>;

    /// Rebuilds a record from state, checking every field's type.
    fn from_state(state: &RecordState) -> Result<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_schema() -> RecordSchema {
        RecordSchema::new(
            "User",
            vec![
                FieldDef::new("id", FieldType::Integer).primary_key(),
                FieldDef::new("name", FieldType::Text),
                FieldDef::new("nickname", FieldType::Text).nullable(),
            ],
        )
    }

    fn user_state(id: i64, name: &str) -> RecordState {
        let mut state = RecordState::new();
        state.insert("id".into(), Value::Integer(id));
        state.insert("name".into(), Value::Text(name.into()));
        state
    }

    #[test]
    fn well_formed_schema_validates() {
        assert!(user_schema().validate().is_ok());
    }

    #[test]
    fn duplicate_fields_are_rejected() {
        let schema = RecordSchema::new(
            "Bad",
            vec![
                FieldDef::new("x", FieldType::Integer),
                FieldDef::new("x", FieldType::Text),
            ],
        );
        assert!(matches!(
            schema.validate(),
            Err(StoreError::SchemaViolation(_))
        ));
    }

    #[test]
    fn two_primary_keys_are_rejected() {
        let schema = RecordSchema::new(
            "Bad",
            vec![
                FieldDef::new("a", FieldType::Integer).primary_key(),
                FieldDef::new("b", FieldType::Integer).primary_key(),
            ],
        );
        assert!(schema.validate().is_err());
    }

    #[test]
    fn nullable_primary_key_is_rejected() {
        let schema = RecordSchema::new(
            "Bad",
            vec![FieldDef::new("id", FieldType::Integer).primary_key().nullable()],
        );
        assert!(schema.validate().is_err());
    }

    #[test]
    fn float_primary_key_is_rejected() {
        let schema = RecordSchema::new(
            "Bad",
            vec![FieldDef::new("score", FieldType::Float).primary_key()],
        );
        assert!(matches!(
            schema.validate(),
            Err(StoreError::SchemaViolation(_))
        ));
    }

    #[test]
    fn key_extraction() {
        let key = user_schema().key_of(&user_state(9, "Nina")).unwrap();
        assert_eq!(key, RecordKey::int(9));
    }

    #[test]
    fn key_extraction_without_primary_key_fails() {
        let schema = RecordSchema::new("Note", vec![FieldDef::new("body", FieldType::Text)]);
        let err = schema.key_of(&RecordState::new()).unwrap_err();
        assert!(matches!(err, StoreError::NoPrimaryKey { record_type } if record_type == "Note"));
    }

    #[test]
    fn state_validation_catches_null_and_unknown_fields() {
        let schema = user_schema();
        assert!(schema.validate_state(&user_state(1, "Ada")).is_ok());

        let mut null_name = user_state(2, "x");
        null_name.insert("name".into(), Value::Null);
        assert!(schema.validate_state(&null_name).is_err());

        let mut extra = user_state(3, "y");
        extra.insert("age".into(), Value::Integer(30));
        assert!(schema.validate_state(&extra).is_err());

        let mut missing = RecordState::new();
        missing.insert("id".into(), Value::Integer(4));
        assert!(schema.validate_state(&missing).is_err());
    }

    #[test]
    fn state_validation_catches_type_mismatch() {
        let mut state = user_state(5, "z");
        state.insert("id".into(), Value::Text("five".into()));
        assert!(matches!(
            user_schema().validate_state(&state),
            Err(StoreError::TypeMismatch(_))
        ));
    }

    #[test]
    fn nullable_fields_may_be_absent_or_null() {
        let schema = user_schema();
        let mut state = user_state(6, "w");
        assert!(schema.validate_state(&state).is_ok());
        state.insert("nickname".into(), Value::Null);
        assert!(schema.validate_state(&state).is_ok());
        state.insert("nickname".into(), Value::Text("W".into()));
        assert!(schema.validate_state(&state).is_ok());
    }
}
