//! Concrete scenario 5 from spec.md §8: of 100 enqueued ContactSave
//! requests, canceling every even-indexed one before it starts leaves the
//! odd ones finishing in enqueue order and the even ones canceled with no
//! database effect.

mod common;

use contacts_store::scheduler::{RequestKind, RequestState};
use contacts_types::{Contact, ContactFilter, ContactId, Detail, DetailType, FetchHint, FieldKey, SortSpec, Value};

fn named_contact(collection_id: contacts_types::CollectionId, tag: usize) -> Contact {
    let mut contact = Contact::new(ContactId::new(0), collection_id);
    contact
        .details
        .push(Detail::new(DetailType::Nickname).with_field(FieldKey::Nickname, Value::Str(format!("req-{tag}"))));
    contact
}

#[tokio::test]
async fn even_requests_cancel_odd_requests_finish_in_order() {
    let (engine, _dir) = common::open_test_engine();
    let collection_id = common::new_plain_collection(&engine, "cancel-source").await;

    let mut handles = Vec::with_capacity(100);
    for i in 0..100usize {
        let handle = engine.submit(RequestKind::ContactSave {
            contacts: vec![named_contact(collection_id, i)],
            mask: None,
        });
        if i % 2 == 0 {
            handle.cancel();
        }
        handles.push(handle);
    }

    for handle in &handles {
        handle.wait_for_finished().await;
    }

    let mut last_finished_index: Option<usize> = None;
    for (i, handle) in handles.iter().enumerate() {
        if i % 2 == 0 {
            assert_eq!(handle.state(), RequestState::Canceled, "request {i} should be canceled");
        } else {
            assert_eq!(handle.state(), RequestState::Finished, "request {i} should finish");
            assert!(
                last_finished_index.map_or(true, |prev| prev < i),
                "odd requests must finish in enqueue order"
            );
            last_finished_index = Some(i);
        }
    }

    let saved = engine
        .fetch_contacts(ContactFilter::CollectionIs(collection_id), Vec::<SortSpec>::new(), FetchHint::default())
        .await
        .unwrap();
    assert_eq!(saved.len(), 50, "only the odd, non-canceled saves should have any database effect");
}
