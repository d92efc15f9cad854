//! The single worker thread and its `execute` dispatch (spec.md §4.H). One
//! match arm per `RequestKind`; no per-kind subclass or vtable.

use std::sync::atomic::{AtomicBool, Ordering};

use contacts_notify::Notifier;
use contacts_types::{BatchResult, ContactsResult, FetchHint};

use crate::change_tracking::ChangeTracker;
use crate::reader::Reader;
use crate::storage::StorageAdapter;
use crate::writer::Writer;

use super::request::{RequestKind, RequestOutcome, RequestResult};

/// Runs one request to completion, checking `cancel` between independently
/// completable steps of a batch so a canceled request yields whatever
/// partial results it already gathered rather than an empty answer
/// (spec.md §4.H "partial-result coalescing").
pub fn execute(storage: &StorageAdapter, notifier: &Notifier, kind: RequestKind, cancel: &AtomicBool) -> RequestOutcome {
    let reader = Reader::new(storage);
    let writer = Writer::new(storage, notifier);
    let tracker = ChangeTracker::new(storage);

    match kind {
        RequestKind::ContactSave { contacts, mask } => {
            Ok(RequestResult::Contacts(save_with_cancellation(&writer, contacts, mask.as_ref(), cancel)))
        }
        RequestKind::ContactRemove(ids) => {
            Ok(RequestResult::Contacts(remove_with_cancellation(&writer, ids, cancel)))
        }
        RequestKind::ContactFetch { filter, sort, hint } => {
            reader.contacts(&filter, &sort, &hint).map(RequestResult::ContactList)
        }
        RequestKind::ContactIdFetch { filter, sort } => {
            reader.contact_ids(&filter, &sort).map(RequestResult::ContactIds)
        }
        RequestKind::ContactFetchById { ids, hint } => {
            fetch_by_id_with_cancellation(&reader, &ids, &hint, cancel).map(RequestResult::ContactList)
        }
        RequestKind::RelationshipFetch { relationship_type, first, second } => reader
            .relationships(relationship_type.as_deref(), first, second)
            .map(RequestResult::Relationships),
        RequestKind::RelationshipSave(rels) => {
            Ok(RequestResult::RelationshipBatch(writer.save_relationships(rels)))
        }
        RequestKind::RelationshipRemove(rels) => {
            Ok(RequestResult::RelationshipBatch(writer.remove_relationships(rels)))
        }
        RequestKind::CollectionFetch => reader.collections().map(RequestResult::Collections),
        RequestKind::CollectionSave(collection) => writer.save_collection(collection).map(RequestResult::CollectionId),
        RequestKind::CollectionRemove(id) => writer.remove_collection(id).map(|_| RequestResult::Unit),
        RequestKind::DetailFetch { detail_type, sort_field, direction } => reader
            .details_of_type(detail_type, sort_field, direction)
            .map(RequestResult::Details),
        RequestKind::CollectionChangesFetch => tracker.fetch_collection_changes().map(RequestResult::CollectionIds),
        RequestKind::ContactChangesFetch(collection_id) => tracker
            .fetch_contact_changes(collection_id)
            .map(RequestResult::ContactChanges),
        RequestKind::ChangesSave { updates, policy, clear_flags } => {
            tracker.store_changes(&writer, updates, policy, clear_flags).map(RequestResult::AppliedIds)
        }
        RequestKind::ClearChangeFlags(ids) => tracker.clear_change_flags(&ids).map(|_| RequestResult::Unit),
    }
}

fn save_with_cancellation(
    writer: &Writer<'_>,
    contacts: Vec<contacts_types::Contact>,
    mask: Option<&std::collections::HashSet<contacts_types::DetailType>>,
    cancel: &AtomicBool,
) -> BatchResult<contacts_types::ContactId> {
    if contacts.len() <= 1 {
        return writer.save_contacts(contacts, mask);
    }
    batch_until_canceled(contacts, cancel, |chunk| writer.save_contacts(chunk, mask))
}

fn remove_with_cancellation(writer: &Writer<'_>, ids: Vec<contacts_types::ContactId>, cancel: &AtomicBool) -> BatchResult<contacts_types::ContactId> {
    if ids.len() <= 1 {
        return writer.remove_contacts(ids);
    }
    batch_until_canceled(ids, cancel, |chunk| writer.remove_contacts(chunk))
}

/// Processes one item at a time, stopping as soon as `cancel` flips and
/// returning the batch result accumulated so far — the coalesced partial
/// result a canceled batch request settles with.
fn batch_until_canceled<T, F>(items: Vec<T>, cancel: &AtomicBool, mut one: F) -> BatchResult<contacts_types::ContactId>
where
    F: FnMut(Vec<T>) -> BatchResult<contacts_types::ContactId>,
{
    let mut result = BatchResult::ok(Vec::new());
    let mut next_index = 0;
    for item in items {
        if cancel.load(Ordering::Relaxed) {
            break;
        }
        let partial = one(vec![item]);
        result.values.extend(partial.values);
        for error in partial.per_index.into_values() {
            result.record_error(next_index, error);
        }
        next_index += 1;
    }
    result
}

fn fetch_by_id_with_cancellation(
    reader: &Reader<'_>,
    ids: &[contacts_types::ContactId],
    hint: &FetchHint,
    cancel: &AtomicBool,
) -> ContactsResult<Vec<contacts_types::Contact>> {
    if ids.len() <= 1 {
        return reader.contacts_by_ids(ids, hint);
    }
    let mut out = Vec::with_capacity(ids.len());
    for chunk in ids.chunks(16) {
        if cancel.load(Ordering::Relaxed) && !out.is_empty() {
            break;
        }
        out.extend(reader.contacts_by_ids(chunk, hint)?);
    }
    Ok(out)
}
