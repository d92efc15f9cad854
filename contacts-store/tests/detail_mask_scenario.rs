//! spec.md §8 boundary test: a save whose `detailMask` restricts it to
//! `Presence` updates only that detail type; every other stored detail is
//! left untouched rather than being tombstoned as a deletion.

mod common;

use std::collections::HashSet;

use contacts_types::{Contact, ContactId, Detail, DetailType, FetchHint, FieldKey, Value};

fn name_detail(first: &str, last: &str) -> Detail {
    Detail::new(DetailType::Name)
        .with_field(FieldKey::FirstName, Value::Str(first.to_string()))
        .with_field(FieldKey::LastName, Value::Str(last.to_string()))
}

fn presence_detail(state: &str) -> Detail {
    Detail::new(DetailType::Presence).with_field(FieldKey::PresenceState, Value::Str(state.to_string()))
}

#[tokio::test]
async fn masked_save_leaves_unmasked_details_untouched() {
    let (engine, _dir) = common::open_test_engine();
    let collection_id = common::new_plain_collection(&engine, "mask-source").await;

    let mut seed = Contact::new(ContactId::new(0), collection_id);
    seed.details.push(name_detail("Ann", "Smith"));
    seed.details.push(presence_detail("away"));
    let saved = engine.save_contacts(vec![seed], None).await.unwrap();
    let id = saved.values[0];

    // A restricted save carrying only a Presence update for `id`.
    let mut presence_only = Contact::new(id, collection_id);
    presence_only.details.push(presence_detail("online"));
    let mask: HashSet<DetailType> = [DetailType::Presence].into_iter().collect();
    engine.save_contacts(vec![presence_only], Some(mask)).await.unwrap();

    let after = engine.fetch_contacts_by_id(vec![id], FetchHint::default()).await.unwrap();
    let name = after[0].details_of_type(DetailType::Name).next();
    assert!(name.is_some(), "the Name detail must survive a Presence-masked save");
    assert_eq!(name.unwrap().field(FieldKey::LastName), Some(&Value::Str("Smith".into())));

    let presence = after[0].details_of_type(DetailType::Presence).next().unwrap();
    assert_eq!(presence.field(FieldKey::PresenceState), Some(&Value::Str("online".into())));
}

#[tokio::test]
async fn unmasked_save_still_tombstones_omitted_details() {
    let (engine, _dir) = common::open_test_engine();
    let collection_id = common::new_plain_collection(&engine, "mask-source-unmasked").await;

    let mut seed = Contact::new(ContactId::new(0), collection_id);
    seed.details.push(name_detail("Bob", "Jones"));
    seed.details.push(presence_detail("away"));
    let saved = engine.save_contacts(vec![seed], None).await.unwrap();
    let id = saved.values[0];

    let presence_only = Contact::new(id, collection_id);
    engine.save_contacts(vec![presence_only], None).await.unwrap();

    let after = engine.fetch_contacts_by_id(vec![id], FetchHint::default()).await.unwrap();
    assert!(
        after[0].details_of_type(DetailType::Name).next().is_none(),
        "an unmasked save diffs the full detail set, so an omitted detail is a real deletion"
    );
}
