//! Concrete scenario 6 from spec.md §8: `storeChanges` conflict resolution.
//! A locally modified Phone detail survives under `PreserveLocalChanges`
//! and is overwritten under `PreserveRemoteChanges`; either way the
//! contact's change flags are clean after a subsequent `clearChangeFlags`.

mod common;

use contacts_store::ConflictResolutionPolicy;
use contacts_types::{Contact, ContactId, Detail, DetailType, FetchHint, FieldKey, Value};

fn phone_contact(collection_id: contacts_types::CollectionId, number: &str) -> Contact {
    let mut contact = Contact::new(ContactId::new(0), collection_id);
    contact
        .details
        .push(Detail::new(DetailType::PhoneNumber).with_field(FieldKey::PhoneNumber, Value::Str(number.to_string())));
    contact
}

fn phone_number(contact: &Contact) -> &str {
    contact
        .details_of_type(DetailType::PhoneNumber)
        .next()
        .and_then(|d| d.field(FieldKey::PhoneNumber))
        .and_then(Value::as_str)
        .unwrap()
}

async fn setup_modified_local_contact() -> (std::sync::Arc<contacts_store::ContactsEngine>, tempfile::TempDir, ContactId) {
    let (engine, dir) = common::open_test_engine();
    let collection_id = common::new_plain_collection(&engine, "conflict-source").await;

    let saved = engine.save_contacts(vec![phone_contact(collection_id, "seed")], None).await.unwrap();
    let id = saved.values[0];

    // A fresh insert starts life Added; clear it to Clean first so the
    // next edit below is the one that pushes it to Modified (spec.md §4.G:
    // a fresh Added row stays Added across edits, it never becomes
    // Modified until it's been cleared at least once).
    engine.clear_change_flags(vec![id]).await.unwrap();

    let mut edited = phone_contact(collection_id, "old");
    edited.id = id;
    engine.save_contacts(vec![edited], None).await.unwrap();

    (engine, dir, id)
}

#[tokio::test]
async fn preserve_local_changes_keeps_the_local_value() {
    let (engine, _dir, id) = setup_modified_local_contact().await;

    let remote = {
        let fetched = engine.fetch_contacts_by_id(vec![id], FetchHint::default()).await.unwrap();
        let mut remote = fetched[0].clone();
        for detail in remote.details.iter_mut().filter(|d| d.detail_type == DetailType::PhoneNumber) {
            detail.fields.insert(FieldKey::PhoneNumber, Value::Str("new".to_string()));
        }
        remote
    };

    engine
        .store_changes(vec![(id, remote)], ConflictResolutionPolicy::PreserveLocalChanges, false)
        .await
        .unwrap();

    let after = engine.fetch_contacts_by_id(vec![id], FetchHint::default()).await.unwrap();
    assert_eq!(phone_number(&after[0]), "old");
}

#[tokio::test]
async fn preserve_remote_changes_overwrites_and_clears_after_clear_flags() {
    let (engine, _dir, id) = setup_modified_local_contact().await;

    let remote = {
        let fetched = engine.fetch_contacts_by_id(vec![id], FetchHint::default()).await.unwrap();
        let mut remote = fetched[0].clone();
        for detail in remote.details.iter_mut().filter(|d| d.detail_type == DetailType::PhoneNumber) {
            detail.fields.insert(FieldKey::PhoneNumber, Value::Str("new".to_string()));
        }
        remote
    };

    engine
        .store_changes(vec![(id, remote)], ConflictResolutionPolicy::PreserveRemoteChanges, false)
        .await
        .unwrap();

    let after = engine.fetch_contacts_by_id(vec![id], FetchHint::default()).await.unwrap();
    assert_eq!(phone_number(&after[0]), "new");

    engine.clear_change_flags(vec![id]).await.unwrap();
    let changes = engine.fetch_contact_changes(after[0].collection_id).await.unwrap();
    assert!(changes.added.is_empty() && changes.modified.is_empty() && changes.deleted.is_empty());
    assert_eq!(changes.unmodified, vec![id]);
}

#[tokio::test]
async fn preserve_remote_changes_clears_flags_inline_when_requested() {
    let (engine, _dir, id) = setup_modified_local_contact().await;

    let remote = {
        let fetched = engine.fetch_contacts_by_id(vec![id], FetchHint::default()).await.unwrap();
        let mut remote = fetched[0].clone();
        for detail in remote.details.iter_mut().filter(|d| d.detail_type == DetailType::PhoneNumber) {
            detail.fields.insert(FieldKey::PhoneNumber, Value::Str("new".to_string()));
        }
        remote
    };

    engine
        .store_changes(vec![(id, remote)], ConflictResolutionPolicy::PreserveRemoteChanges, true)
        .await
        .unwrap();

    let changes = engine.fetch_contact_changes(engine.fetch_contacts_by_id(vec![id], FetchHint::default()).await.unwrap()[0].collection_id).await.unwrap();
    assert_eq!(changes.unmodified, vec![id], "clear_flags=true should zero flags without a separate clearChangeFlags call");
}

/// Resolution happens per detail, not per contact: a locally pending Phone
/// doesn't block an unrelated, non-conflicting remote Email update.
#[tokio::test]
async fn preserve_local_changes_still_applies_a_non_conflicting_detail() {
    let (engine, _dir) = common::open_test_engine();
    let collection_id = common::new_plain_collection(&engine, "conflict-detail-source").await;

    let mut seed = phone_contact(collection_id, "seed");
    seed.details
        .push(Detail::new(DetailType::EmailAddress).with_field(FieldKey::EmailAddress, Value::Str("old@example.com".to_string())));
    let saved = engine.save_contacts(vec![seed], None).await.unwrap();
    let id = saved.values[0];
    engine.clear_change_flags(vec![id]).await.unwrap();

    // Only the Phone detail becomes locally pending.
    let mut edited = phone_contact(collection_id, "local-edit");
    edited.id = id;
    edited
        .details
        .push(Detail::new(DetailType::EmailAddress).with_field(FieldKey::EmailAddress, Value::Str("old@example.com".to_string())));
    engine.save_contacts(vec![edited], None).await.unwrap();

    // The remote only changes Email, leaving Phone as it already was.
    let remote = {
        let fetched = engine.fetch_contacts_by_id(vec![id], FetchHint::default()).await.unwrap();
        let mut remote = fetched[0].clone();
        for detail in remote.details.iter_mut().filter(|d| d.detail_type == DetailType::EmailAddress) {
            detail.fields.insert(FieldKey::EmailAddress, Value::Str("new@example.com".to_string()));
        }
        remote
    };

    engine
        .store_changes(vec![(id, remote)], ConflictResolutionPolicy::PreserveLocalChanges, false)
        .await
        .unwrap();

    let after = engine.fetch_contacts_by_id(vec![id], FetchHint::default()).await.unwrap();
    assert_eq!(phone_number(&after[0]), "local-edit", "the locally pending Phone detail is preserved");
    let email = after[0]
        .details_of_type(DetailType::EmailAddress)
        .next()
        .and_then(|d| d.field(FieldKey::EmailAddress))
        .and_then(Value::as_str)
        .unwrap();
    assert_eq!(email, "new@example.com", "the non-conflicting Email detail still picks up the remote update");
}
