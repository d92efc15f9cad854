//! spec.md §4.D presence-only fast path: once a Presence-only constituent's
//! aggregate exists, a further Presence-only update re-unions just the
//! `Presence` detail and announces `contactsPresenceChanged`, not the
//! general `contactsChanged` a full re-promotion would publish.

mod common;

use contacts_notify::ChangeEvent;
use contacts_types::{Contact, ContactId, Detail, DetailType, FetchHint, FieldKey, SortSpec, Value, ContactFilter,
    AGGREGATE_COLLECTION_ID};

fn presence_detail(state: &str) -> Detail {
    Detail::new(DetailType::Presence).with_field(FieldKey::PresenceState, Value::Str(state.to_string()))
}

#[tokio::test]
async fn second_presence_update_fires_presence_changed_not_contacts_changed() {
    let (engine, _dir) = common::open_test_engine();
    let sync_collection = common::new_sync_collection(&engine, "presence-source").await;

    let mut seed = Contact::new(ContactId::new(0), sync_collection);
    seed.details.push(presence_detail("away"));
    let saved = engine.save_contacts(vec![seed], None).await.unwrap();
    let id = saved.values[0];

    let aggregates = engine
        .fetch_contacts(ContactFilter::CollectionIs(AGGREGATE_COLLECTION_ID), Vec::<SortSpec>::new(), FetchHint::default())
        .await
        .unwrap();
    assert_eq!(aggregates.len(), 1);
    let aggregate_id = aggregates[0].id;

    let mut rx = engine.subscribe();

    let mut update = Contact::new(id, sync_collection);
    update.details.push(presence_detail("online"));
    engine.save_contacts(vec![update], None).await.unwrap();

    let mut saw_presence_changed = false;
    loop {
        match rx.try_recv() {
            Ok(ChangeEvent::ContactsPresenceChanged(ids)) if ids.contains(&aggregate_id) => {
                saw_presence_changed = true;
            }
            Ok(ChangeEvent::ContactsChanged(ids)) if ids.contains(&aggregate_id) => {
                panic!("the presence-only fast path must not publish a general ContactsChanged event");
            }
            Ok(_) => continue,
            Err(_) => break,
        }
    }
    assert!(saw_presence_changed, "expected a ContactsPresenceChanged event for the aggregate");

    let aggregate = engine
        .fetch_contacts_by_id(vec![aggregate_id], FetchHint::default())
        .await
        .unwrap()
        .remove(0);
    let presence = aggregate.details_of_type(DetailType::Presence).next().unwrap();
    assert_eq!(presence.field(FieldKey::PresenceState), Some(&Value::Str("online".into())));
}
