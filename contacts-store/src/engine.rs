//! The public `ContactsEngine` facade (spec.md §6 "External Interfaces"):
//! ties the Storage Adapter, Notifier, Reader, Writer, Change-Tracking
//! Protocol, Request Scheduler and process registry together. Modeled on
//! the teacher's `SharedMempool` — a thin async-submission wrapper around a
//! single-worker core, plus a synchronous escape hatch for callers on the
//! submitter thread that don't want to round-trip through the scheduler.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use contacts_notify::{ChangeEvent, Notifier};
use contacts_types::{
    BatchResult, Collection, CollectionId, Contact, ContactFilter, ContactId, ContactsError, ContactsResult,
    Detail, DetailType, FetchHint, FieldKey, Relationship, SortDirection, SortSpec,
};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::change_tracking::{ChangeTracker, ConflictResolutionPolicy, ContactChanges};
use crate::config::EngineConfig;
use crate::reader::Reader;
use crate::registry;
use crate::scheduler::request::{RequestKind, RequestResult};
use crate::scheduler::{RequestHandle, Scheduler};
use crate::storage::StorageAdapter;
use crate::writer::Writer;

/// A running engine instance: one worker thread, one synchronous-caller
/// database handle, one notifier, registered under `manager_uri` in the
/// process-wide registry for the duration of its life.
pub struct ContactsEngine {
    manager_uri: String,
    config: EngineConfig,
    uuid: Uuid,
    path: PathBuf,
    sync_storage: StorageAdapter,
    notifier: Notifier,
    scheduler: Scheduler,
    degraded: bool,
}

impl ContactsEngine {
    /// Opens (or creates) the engine's database under `base_dir`, spawns the
    /// worker, and registers the instance under `manager_uri` (spec.md §5
    /// "Process-wide state"). `uuid` should be the one persisted from a
    /// prior open of this same `manager_uri`, or freshly generated on first
    /// open by the caller.
    pub fn open(
        manager_uri: impl Into<String>,
        config: EngineConfig,
        base_dir: &Path,
        uuid: Uuid,
    ) -> ContactsResult<Arc<Self>> {
        let manager_uri = manager_uri.into();
        let path = base_dir.join(config.database_file_name(&uuid));
        let privileged = !config.nonprivileged;

        let worker_open = StorageAdapter::open(&path, privileged, config.auto_test);
        let sync_open = StorageAdapter::open(&path, privileged, config.auto_test);

        let notifier = Notifier::new(config.merge_presence_changes);

        let (worker_storage, degraded) = match worker_open {
            Ok((storage, _outcome)) => (Some(Arc::new(storage)), false),
            Err(_) => (None, true),
        };

        let sync_storage = match sync_open {
            Ok((storage, outcome)) => {
                if outcome.needs_aggregate_regeneration {
                    regenerate_aggregates(&storage, &notifier)?;
                }
                storage
            }
            Err(e) => return Err(e),
        };

        let scheduler = Scheduler::start(worker_storage, notifier.clone());

        let engine = Arc::new(ContactsEngine {
            manager_uri,
            config,
            uuid,
            path,
            sync_storage,
            notifier,
            scheduler,
            degraded,
        });

        registry::init(&engine.manager_uri, Arc::clone(&engine));
        Ok(engine)
    }

    /// Explicit teardown: removes this instance from the process-wide
    /// registry. Safe to call more than once.
    pub fn close(self: &Arc<Self>) {
        registry::teardown(&self.manager_uri, self);
    }

    pub fn manager_uri(&self) -> &str {
        &self.manager_uri
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_privileged(&self) -> bool {
        self.sync_storage.is_privileged()
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.notifier.subscribe()
    }

    /// Synchronous read surface, against the engine's own handle (spec.md
    /// §5 "separate database handle owned by the engine") — bypasses the
    /// scheduler entirely, for callers already on a thread that can block.
    pub fn reader(&self) -> Reader<'_> {
        Reader::new(&self.sync_storage)
    }

    pub fn writer(&self) -> Writer<'_> {
        Writer::new(&self.sync_storage, &self.notifier)
    }

    pub fn change_tracker(&self) -> ChangeTracker<'_> {
        ChangeTracker::new(&self.sync_storage)
    }

    /// Queues `kind` on the worker and returns a handle the caller can
    /// poll, cancel, or await — the async Request API of spec.md §6,
    /// collapsed from "object with setters + signals" into "submit, get a
    /// handle back".
    pub fn submit(&self, kind: RequestKind) -> RequestHandle {
        self.scheduler.submit(kind)
    }

    pub async fn save_contacts(
        &self,
        contacts: Vec<Contact>,
        mask: Option<HashSet<DetailType>>,
    ) -> ContactsResult<BatchResult<ContactId>> {
        let handle = self.submit(RequestKind::ContactSave { contacts, mask });
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::Contacts(b) => Ok(b),
            other => Err(unexpected(other)),
        })
    }

    pub async fn remove_contacts(&self, ids: Vec<ContactId>) -> ContactsResult<BatchResult<ContactId>> {
        let handle = self.submit(RequestKind::ContactRemove(ids));
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::Contacts(b) => Ok(b),
            other => Err(unexpected(other)),
        })
    }

    pub async fn fetch_contacts(
        &self,
        filter: ContactFilter,
        sort: Vec<SortSpec>,
        hint: FetchHint,
    ) -> ContactsResult<Vec<Contact>> {
        let handle = self.submit(RequestKind::ContactFetch { filter, sort, hint });
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::ContactList(c) => Ok(c),
            other => Err(unexpected(other)),
        })
    }

    pub async fn fetch_contact_ids(&self, filter: ContactFilter, sort: Vec<SortSpec>) -> ContactsResult<Vec<ContactId>> {
        let handle = self.submit(RequestKind::ContactIdFetch { filter, sort });
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::ContactIds(ids) => Ok(ids),
            other => Err(unexpected(other)),
        })
    }

    pub async fn fetch_contacts_by_id(&self, ids: Vec<ContactId>, hint: FetchHint) -> ContactsResult<Vec<Contact>> {
        let handle = self.submit(RequestKind::ContactFetchById { ids, hint });
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::ContactList(c) => Ok(c),
            other => Err(unexpected(other)),
        })
    }

    pub async fn fetch_relationships(
        &self,
        relationship_type: Option<String>,
        first: Option<ContactId>,
        second: Option<ContactId>,
    ) -> ContactsResult<Vec<Relationship>> {
        let handle = self.submit(RequestKind::RelationshipFetch { relationship_type, first, second });
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::Relationships(rels) => Ok(rels),
            other => Err(unexpected(other)),
        })
    }

    pub async fn save_relationships(&self, relationships: Vec<Relationship>) -> ContactsResult<BatchResult<()>> {
        let handle = self.submit(RequestKind::RelationshipSave(relationships));
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::RelationshipBatch(b) => Ok(b),
            other => Err(unexpected(other)),
        })
    }

    pub async fn remove_relationships(&self, relationships: Vec<Relationship>) -> ContactsResult<BatchResult<()>> {
        let handle = self.submit(RequestKind::RelationshipRemove(relationships));
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::RelationshipBatch(b) => Ok(b),
            other => Err(unexpected(other)),
        })
    }

    pub async fn fetch_collections(&self) -> ContactsResult<Vec<Collection>> {
        let handle = self.submit(RequestKind::CollectionFetch);
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::Collections(c) => Ok(c),
            other => Err(unexpected(other)),
        })
    }

    pub async fn save_collection(&self, collection: Collection) -> ContactsResult<CollectionId> {
        let handle = self.submit(RequestKind::CollectionSave(collection));
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::CollectionId(id) => Ok(id),
            other => Err(unexpected(other)),
        })
    }

    pub async fn remove_collection(&self, id: CollectionId) -> ContactsResult<()> {
        let handle = self.submit(RequestKind::CollectionRemove(id));
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::Unit => Ok(()),
            other => Err(unexpected(other)),
        })
    }

    pub async fn fetch_details(
        &self,
        detail_type: DetailType,
        sort_field: Option<FieldKey>,
        direction: SortDirection,
    ) -> ContactsResult<Vec<Detail>> {
        let handle = self.submit(RequestKind::DetailFetch { detail_type, sort_field, direction });
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::Details(d) => Ok(d),
            other => Err(unexpected(other)),
        })
    }

    pub async fn fetch_collection_changes(&self) -> ContactsResult<Vec<CollectionId>> {
        let handle = self.submit(RequestKind::CollectionChangesFetch);
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::CollectionIds(ids) => Ok(ids),
            other => Err(unexpected(other)),
        })
    }

    pub async fn fetch_contact_changes(&self, collection_id: CollectionId) -> ContactsResult<ContactChanges> {
        let handle = self.submit(RequestKind::ContactChangesFetch(collection_id));
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::ContactChanges(c) => Ok(c),
            other => Err(unexpected(other)),
        })
    }

    pub async fn store_changes(
        &self,
        updates: Vec<(ContactId, Contact)>,
        policy: ConflictResolutionPolicy,
        clear_flags: bool,
    ) -> ContactsResult<Vec<ContactId>> {
        let handle = self.submit(RequestKind::ChangesSave { updates, policy, clear_flags });
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::AppliedIds(ids) => Ok(ids),
            other => Err(unexpected(other)),
        })
    }

    pub async fn clear_change_flags(&self, ids: Vec<ContactId>) -> ContactsResult<()> {
        let handle = self.submit(RequestKind::ClearChangeFlags(ids));
        handle.wait_for_finished().await;
        extract(handle, |r| match r {
            RequestResult::Unit => Ok(()),
            other => Err(unexpected(other)),
        })
    }
}

fn unexpected(_r: RequestResult) -> ContactsError {
    ContactsError::Unspecified
}

fn extract<T>(handle: RequestHandle, project: impl FnOnce(RequestResult) -> ContactsResult<T>) -> ContactsResult<T> {
    match handle.result() {
        Some(Ok(r)) => project(r),
        Some(Err(e)) => Err(e),
        None => Err(ContactsError::Unspecified),
    }
}

/// Regenerates every aggregate from scratch by re-saving each Local
/// constituent, per spec.md §4.D "Regeneration": used once after a schema
/// version bump when the Aggregate collection is empty but Local is not.
fn regenerate_aggregates(storage: &StorageAdapter, notifier: &Notifier) -> ContactsResult<()> {
    use contacts_types::{AGGREGATE_COLLECTION_ID, LOCAL_COLLECTION_ID};

    let hint = FetchHint::default();
    let aggregates_exist = !storage.read_contacts_in_collection(AGGREGATE_COLLECTION_ID, &hint, false)?.is_empty();
    if aggregates_exist {
        return Ok(());
    }
    let locals = storage.read_contacts_in_collection(LOCAL_COLLECTION_ID, &hint, false)?;
    if locals.is_empty() {
        return Ok(());
    }

    let writer = Writer::new(storage, notifier);
    for contact in locals {
        let _ = writer.save_contacts(vec![contact], None);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    // Exercised end-to-end in `tests/`, against a real sqlite-backed engine
    // rooted at a temporary directory.
}
