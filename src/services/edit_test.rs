use super::*;
use crate::protocol::Scope;
use serde_json::json;

fn key() -> ScopeKey {
    ScopeKey::new(Scope::Orders, None)
}

fn identity() -> EditIdentity {
    EditIdentity { user_id: "u1".into(), display_name: "Alice".into(), color: "c".into() }
}

#[test]
fn fields_accumulate_across_edits() {
    // Editing "start" then blurring "end" leaves one entry holding both
    // field values with no active field.
    let mut index = EditIntentIndex::new();
    let conn = Uuid::new_v4();

    index.upsert_field(
        &key(), conn, &identity(), EntityType::Order, "O1",
        Some("start"), json!("08:00"), EditState::Change,
    );
    let entry = index.upsert_field(
        &key(), conn, &identity(), EntityType::Order, "O1",
        Some("end"), json!("09:30"), EditState::Blur,
    );

    assert_eq!(entry.fields.get("start"), Some(&json!("08:00")));
    assert_eq!(entry.fields.get("end"), Some(&json!("09:30")));
    assert!(entry.active_field.is_none());

    let snapshot = index.snapshot(&key());
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].fields.len(), 2);
}

#[test]
fn change_sets_active_field() {
    let mut index = EditIntentIndex::new();
    let conn = Uuid::new_v4();

    let entry = index.upsert_field(
        &key(), conn, &identity(), EntityType::Order, "O1",
        Some("name"), json!("Foo"), EditState::Change,
    );
    assert_eq!(entry.active_field.as_deref(), Some("name"));
    assert_eq!(entry.fields.get("name"), Some(&json!("Foo")));
}

#[test]
fn blur_commits_value_but_clears_active_field() {
    let mut index = EditIntentIndex::new();
    let conn = Uuid::new_v4();

    index.upsert_field(
        &key(), conn, &identity(), EntityType::Order, "O1",
        Some("name"), json!("Fo"), EditState::Change,
    );
    let entry = index.upsert_field(
        &key(), conn, &identity(), EntityType::Order, "O1",
        Some("name"), json!("Foo"), EditState::Blur,
    );

    assert!(entry.active_field.is_none());
    assert_eq!(entry.fields.get("name"), Some(&json!("Foo")));
}

#[test]
fn fieldless_blur_only_clears_active_field() {
    let mut index = EditIntentIndex::new();
    let conn = Uuid::new_v4();

    index.upsert_field(
        &key(), conn, &identity(), EntityType::Order, "O1",
        Some("name"), json!("Foo"), EditState::Focus,
    );
    let entry = index.upsert_field(
        &key(), conn, &identity(), EntityType::Order, "O1",
        None, json!(null), EditState::Blur,
    );

    assert!(entry.active_field.is_none());
    assert_eq!(entry.fields.get("name"), Some(&json!("Foo")));
}

#[test]
fn end_removes_entry_and_reports_it() {
    // End terminates the edit; later snapshots no longer include the entry.
    let mut index = EditIntentIndex::new();
    let conn = Uuid::new_v4();

    index.upsert_field(
        &key(), conn, &identity(), EntityType::Order, "O1",
        Some("name"), json!("Foo"), EditState::Change,
    );
    let prev = index.end(&key(), conn).expect("entry should exist");
    assert_eq!(prev.active_field.as_deref(), Some("name"));
    assert!(index.snapshot(&key()).is_empty());
    assert!(index.is_empty());
}

#[test]
fn end_without_entry_is_none() {
    let mut index = EditIntentIndex::new();
    assert!(index.end(&key(), Uuid::new_v4()).is_none());
}

#[test]
fn upsert_refreshes_identity_and_entity() {
    let mut index = EditIntentIndex::new();
    let conn = Uuid::new_v4();

    index.upsert_field(
        &key(), conn, &identity(), EntityType::Order, "O1",
        Some("name"), json!("Foo"), EditState::Change,
    );
    let renamed = EditIdentity { user_id: "u1".into(), display_name: "Alicia".into(), color: "d".into() };
    let entry = index.upsert_field(
        &key(), conn, &renamed, EntityType::OrderItem, "I9",
        None, json!(null), EditState::Focus,
    );

    assert_eq!(entry.display_name, "Alicia");
    assert_eq!(entry.entity_type, EntityType::OrderItem);
    assert_eq!(entry.entity_id, "I9");
    // Accumulated values survive the refresh.
    assert_eq!(entry.fields.get("name"), Some(&json!("Foo")));
}

#[test]
fn entries_are_scoped_per_key() {
    let mut index = EditIntentIndex::new();
    let conn = Uuid::new_v4();
    let board_key = ScopeKey::new(Scope::Orders, Some("b1"));

    index.upsert_field(
        &key(), conn, &identity(), EntityType::Order, "O1",
        Some("name"), json!("Foo"), EditState::Change,
    );
    assert!(index.snapshot(&board_key).is_empty());
    assert_eq!(index.snapshot(&key()).len(), 1);
}
