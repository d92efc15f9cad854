//! Concrete scenario 1 from spec.md §8: a Local contact and a sync-source
//! contact sharing a name merge into one aggregate with the union of their
//! details, each tagged with its constituent's provenance.

mod common;

use contacts_types::{Contact, ContactFilter, ContactId, Detail, DetailType, FetchHint, FieldKey, SortSpec, Value,
    LOCAL_COLLECTION_ID, AGGREGATE_COLLECTION_ID};

fn name_detail(first: &str, last: &str) -> Detail {
    Detail::new(DetailType::Name)
        .with_field(FieldKey::FirstName, Value::Str(first.to_string()))
        .with_field(FieldKey::LastName, Value::Str(last.to_string()))
}

fn phone_detail(number: &str) -> Detail {
    Detail::new(DetailType::PhoneNumber).with_field(FieldKey::PhoneNumber, Value::Str(number.to_string()))
}

fn email_detail(address: &str) -> Detail {
    Detail::new(DetailType::EmailAddress).with_field(FieldKey::EmailAddress, Value::Str(address.to_string()))
}

#[tokio::test]
async fn local_and_sync_constituents_merge_into_one_aggregate() {
    let (engine, _dir) = common::open_test_engine();
    let sync_collection = common::new_sync_collection(&engine, "sync-source").await;

    let mut local = Contact::new(ContactId::new(0), LOCAL_COLLECTION_ID);
    local.details.push(name_detail("John", "Smith"));
    local.details.push(phone_detail("+1-555"));

    let mut remote = Contact::new(ContactId::new(0), sync_collection);
    remote.details.push(name_detail("John", "Smith"));
    remote.details.push(email_detail("j@x"));

    let saved_local = engine.save_contacts(vec![local], None).await.unwrap();
    assert!(saved_local.is_ok());
    let saved_remote = engine.save_contacts(vec![remote], None).await.unwrap();
    assert!(saved_remote.is_ok());

    let aggregates = engine
        .fetch_contacts(ContactFilter::CollectionIs(AGGREGATE_COLLECTION_ID), Vec::<SortSpec>::new(), FetchHint::default())
        .await
        .unwrap();
    assert_eq!(aggregates.len(), 1, "exactly one aggregate should exist");

    let aggregate = &aggregates[0];
    let phone = aggregate.details_of_type(DetailType::PhoneNumber).next().unwrap();
    assert_eq!(phone.field(FieldKey::PhoneNumber), Some(&Value::Str("+1-555".into())));
    assert_eq!(phone.provenance(), saved_local.values.first().copied());

    let email = aggregate.details_of_type(DetailType::EmailAddress).next().unwrap();
    assert_eq!(email.field(FieldKey::EmailAddress), Some(&Value::Str("j@x".into())));
    assert_eq!(email.provenance(), saved_remote.values.first().copied());

    let name = aggregate.details_of_type(DetailType::Name).next().unwrap();
    assert_eq!(name.field(FieldKey::LastName), Some(&Value::Str("Smith".into())));
}

#[tokio::test]
async fn two_aggregates_never_silently_merge() {
    let (engine, _dir) = common::open_test_engine();
    let sync_a = common::new_sync_collection(&engine, "source-a").await;
    let sync_b = common::new_sync_collection(&engine, "source-b").await;

    let mut ann_one = Contact::new(ContactId::new(0), sync_a);
    ann_one.details.push(name_detail("Ann", "Smith"));
    let mut ann_two = Contact::new(ContactId::new(0), sync_b);
    ann_two.details.push(name_detail("Carla", "Jones"));

    engine.save_contacts(vec![ann_one], None).await.unwrap();
    engine.save_contacts(vec![ann_two], None).await.unwrap();

    let aggregates = engine
        .fetch_contacts(ContactFilter::CollectionIs(AGGREGATE_COLLECTION_ID), Vec::<SortSpec>::new(), FetchHint::default())
        .await
        .unwrap();
    assert_eq!(aggregates.len(), 2, "unrelated constituents must not share an aggregate");
}
