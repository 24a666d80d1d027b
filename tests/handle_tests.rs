//! Handle contract: capture, resolve, equality.

use threadstore::{
    KeyType, Record, RecordKey, SafeHandle, Store, StoreConfig, StoreError, Value,
};

#[derive(Record, Debug)]
struct User {
    #[record(primary_key)]
    id: i64,
    name: String,
    age: i64,
}

#[derive(Record)]
struct Profile {
    #[record(primary_key)]
    id: i64,
    bio: String,
}

#[derive(Record)]
struct Tag {
    #[record(primary_key)]
    name: String,
    weight: i64,
}

#[derive(Record)]
struct Note {
    body: String,
}

fn open_store(id: &str) -> Store {
    let store = Store::open(StoreConfig::in_memory(id)).unwrap();
    store.register::<User>().unwrap();
    store.register::<Profile>().unwrap();
    store.register::<Tag>().unwrap();
    store.register::<Note>().unwrap();
    store
}

fn user(id: i64, name: &str, age: i64) -> User {
    User {
        id,
        name: name.into(),
        age,
    }
}

#[test]
fn resolve_returns_current_persisted_state() {
    let store = open_store("handles-resolve");
    let live = store.insert(&user(42, "Alice", 30)).unwrap();

    let handle = SafeHandle::new(&live).unwrap();
    assert_eq!(handle.record_type(), "User");
    assert_eq!(handle.key(), &RecordKey::int(42));
    assert_eq!(handle.key().kind(), KeyType::Int);

    let resolved = handle.resolve().unwrap();
    assert_eq!(resolved.id, 42);
    assert_eq!(resolved.name, "Alice");
    assert_eq!(resolved.age, 30);

    // Handles carry identity, not state: a later save is visible.
    store.save(&user(42, "Alice", 31)).unwrap();
    assert_eq!(handle.resolve().unwrap().age, 31);
}

#[test]
fn resolving_a_deleted_record_fails() {
    let store = open_store("handles-deleted");
    let live = store.insert(&user(7, "Bob", 44)).unwrap();
    let handle = SafeHandle::new(&live).unwrap();

    assert!(store.delete::<User>(7i64).unwrap());
    let err = handle.resolve().unwrap_err();
    assert!(matches!(
        err,
        StoreError::RecordNotFound { record_type, .. } if record_type == "User"
    ));
}

#[test]
fn keyless_records_cannot_be_captured() {
    let store = open_store("handles-keyless");
    let live = store
        .insert(&Note {
            body: "remember the milk".into(),
        })
        .unwrap();

    let err = SafeHandle::new(&live).unwrap_err();
    assert!(matches!(
        err,
        StoreError::NoPrimaryKey { record_type } if record_type == "Note"
    ));
}

#[test]
fn handles_from_separate_lookups_are_equal() {
    let store = open_store("handles-equality");
    store.insert(&user(1, "Ada", 36)).unwrap();
    store.insert(&user(2, "Grace", 45)).unwrap();

    let a = SafeHandle::new(&store.get::<User>(1i64).unwrap().unwrap()).unwrap();
    let b = SafeHandle::new(&store.get::<User>(1i64).unwrap().unwrap()).unwrap();
    let c = SafeHandle::new(&store.get::<User>(2i64).unwrap().unwrap()).unwrap();

    assert_eq!(a, b);
    assert_eq!(b, a);
    assert_eq!(a, a.clone());
    assert_ne!(a, c);
}

#[test]
fn equality_ignores_record_type_and_store() {
    let store = open_store("handles-cross-type");
    let other = open_store("handles-cross-store");

    store.insert(&user(42, "Alice", 30)).unwrap();
    store
        .insert(&Profile {
            id: 42,
            bio: "hello".into(),
        })
        .unwrap();
    other.insert(&user(42, "Elsewhere", 1)).unwrap();

    let user_handle = SafeHandle::new(&store.get::<User>(42i64).unwrap().unwrap()).unwrap();
    let profile_handle =
        SafeHandle::new(&store.get::<Profile>(42i64).unwrap().unwrap()).unwrap();
    let other_handle = SafeHandle::new(&other.get::<User>(42i64).unwrap().unwrap()).unwrap();

    // Only the key participates in equality.
    assert_eq!(user_handle, profile_handle);
    assert_eq!(user_handle, other_handle);
}

#[test]
fn integer_and_text_keys_never_compare_equal() {
    let store = open_store("handles-key-kinds");
    store.insert(&user(42, "Alice", 30)).unwrap();
    store
        .insert(&Tag {
            name: "42".into(),
            weight: 1,
        })
        .unwrap();

    let by_int = SafeHandle::new(&store.get::<User>(42i64).unwrap().unwrap()).unwrap();
    let by_text = SafeHandle::new(&store.get::<Tag>("42").unwrap().unwrap()).unwrap();

    assert_ne!(by_int, by_text);
    assert_ne!(by_text, by_int);
}

#[test]
fn unsupported_key_kinds_equal_nothing() {
    let key = RecordKey::from_value(Value::Boolean(true));
    assert_eq!(key.kind(), KeyType::Unsupported);
    assert_ne!(key, key.clone());
    assert_ne!(
        RecordKey::from_value(Value::Float(1.0)),
        RecordKey::from_value(Value::Float(1.0))
    );
}

#[test]
fn handle_outlives_its_store_and_serializes_its_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("users.store");

    let handle = {
        let store = Store::open(StoreConfig::file(&path)).unwrap();
        store.register::<User>().unwrap();
        let live = store.insert(&user(42, "Alice", 30)).unwrap();
        SafeHandle::new(&live).unwrap()
    };

    // The originating connection is gone; resolve re-opens from disk.
    assert_eq!(handle.resolve().unwrap().name, "Alice");

    let json = serde_json::to_string(handle.config()).unwrap();
    let config: StoreConfig = serde_json::from_str(&json).unwrap();
    let reopened = Store::open(config).unwrap();
    let live = handle.resolve_in(&reopened).unwrap();
    assert_eq!(live.id, 42);
    assert_eq!(live.key(), Some(&RecordKey::int(42)));
}

#[test]
fn resolve_in_rejects_other_stores() {
    let store = open_store("handles-mismatch-origin");
    let elsewhere = open_store("handles-mismatch-other");
    let live = store.insert(&user(5, "Eve", 29)).unwrap();
    let handle = SafeHandle::new(&live).unwrap();

    assert!(handle.resolve_in(&store).is_ok());
    let err = handle.resolve_in(&elsewhere).unwrap_err();
    assert!(matches!(err, StoreError::StoreMismatch { .. }));
}

#[test]
fn store_accessor_opens_a_fresh_connection_each_time() {
    let store = open_store("handles-accessor");
    let live = store.insert(&user(11, "Noor", 52)).unwrap();
    let handle = SafeHandle::new(&live).unwrap();

    let first = handle.store().unwrap();
    let second = handle.store().unwrap();

    first.save(&user(11, "Noor", 53)).unwrap();
    assert_eq!(second.get::<User>(11i64).unwrap().unwrap().age, 53);
    assert_eq!(handle.resolve().unwrap().age, 53);
}
