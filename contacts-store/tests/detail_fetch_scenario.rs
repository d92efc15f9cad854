//! Concrete scenario 3 from spec.md §8: detail-type projection sorted by a
//! field, with a later insertion landing in the right sorted position.

mod common;

use contacts_types::{Contact, CollectionId, ContactId, Detail, DetailType, FieldKey, SortDirection, Value};

fn hobby(collection_id: CollectionId, name: &str) -> Contact {
    let mut contact = Contact::new(ContactId::new(0), collection_id);
    contact
        .details
        .push(Detail::new(DetailType::Hobby).with_field(FieldKey::Hobby, Value::Str(name.to_string())));
    contact
}

fn hobby_names(details: &[Detail]) -> Vec<String> {
    details
        .iter()
        .filter_map(|d| d.field(FieldKey::Hobby).and_then(Value::as_str))
        .map(|s| s.to_string())
        .collect()
}

#[tokio::test]
async fn hobby_projection_respects_sort_and_picks_up_new_rows() {
    let (engine, _dir) = common::open_test_engine();
    let collection_id = common::new_plain_collection(&engine, "hobby-source").await;

    for name in ["Acting", "Bungee", "Cooking"] {
        engine.save_contacts(vec![hobby(collection_id, name)], None).await.unwrap();
    }

    let details = engine
        .fetch_details(DetailType::Hobby, Some(FieldKey::Hobby), SortDirection::Ascending)
        .await
        .unwrap();
    assert_eq!(hobby_names(&details), vec!["Acting", "Bungee", "Cooking"]);

    engine.save_contacts(vec![hobby(collection_id, "Amateur radio")], None).await.unwrap();

    let details = engine
        .fetch_details(DetailType::Hobby, Some(FieldKey::Hobby), SortDirection::Ascending)
        .await
        .unwrap();
    assert_eq!(hobby_names(&details), vec!["Acting", "Amateur radio", "Bungee", "Cooking"]);
}
