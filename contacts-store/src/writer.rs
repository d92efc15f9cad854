//! The Writer (spec.md §4.F): contact/collection/relationship mutations.
//! Every mutating call runs in one storage transaction, re-derives the
//! affected aggregates, and — once the transaction commits — publishes the
//! corresponding `ChangeEvent`s via the `Notifier`.

use std::collections::HashSet;

use contacts_notify::{ChangeEvent, Notifier};
use contacts_types::{
    BatchResult, ChangeFlags, Collection, CollectionId, Contact, ContactId, ContactsError, ContactsResult,
    Detail, DetailType, FetchHint, Relationship, AGGREGATE_COLLECTION_ID, LOCAL_COLLECTION_ID, SELF_CONTACT_ID,
};

use crate::aggregation::{self, is_presence_only_update};
use crate::delta::{determine_contact_detail_delta, DeltaOptions};
use crate::label::{self, EnglishDisplayLabelGroupGenerator};
use crate::storage::StorageAdapter;

pub struct Writer<'a> {
    storage: &'a StorageAdapter,
    notifier: &'a Notifier,
}

impl<'a> Writer<'a> {
    pub fn new(storage: &'a StorageAdapter, notifier: &'a Notifier) -> Self {
        Writer { storage, notifier }
    }

    /// Saves a batch of contacts, each independently succeeding or failing
    /// (spec.md §7 batch error policy). Constituent saves also re-derive
    /// whichever aggregate they match. `mask`, when set, restricts every
    /// save in the batch to those detail types (spec.md §4.F
    /// `save(&contacts, detailMask?, errMap)`): stored details of any other
    /// type are left untouched rather than being diffed against an incoming
    /// set that never mentions them.
    pub fn save_contacts(&self, contacts: Vec<Contact>, mask: Option<&HashSet<DetailType>>) -> BatchResult<ContactId> {
        let mut result = BatchResult::ok(Vec::new());
        let mut saved_ids = Vec::new();
        let mut touched_collections = Vec::new();

        for (index, contact) in contacts.into_iter().enumerate() {
            if contact.id == SELF_CONTACT_ID {
                result.record_error(index, ContactsError::NotSupported);
                continue;
            }
            match self.save_one_contact(contact, mask) {
                Ok((id, collection_id)) => {
                    result.values.push(id);
                    saved_ids.push(id);
                    touched_collections.push(collection_id);
                }
                Err(e) => result.record_error(index, e),
            }
        }

        if !saved_ids.is_empty() {
            self.notifier.publish(ChangeEvent::ContactsChanged(saved_ids));
        }
        result
    }

    /// Applies an already-identified remote contact as an update to `id`,
    /// used by the change-tracking conflict-resolution pass (spec.md §4.G
    /// `storeChanges`). Always a full, unmasked diff: the caller has already
    /// merged whichever details should and shouldn't move.
    pub fn apply_remote_contact(&self, id: ContactId, mut remote: Contact) -> ContactsResult<ContactId> {
        remote.id = id;
        let (saved_id, _) = self.save_one_contact(remote, None)?;
        Ok(saved_id)
    }

    fn save_one_contact(
        &self,
        mut contact: Contact,
        mask: Option<&HashSet<DetailType>>,
    ) -> ContactsResult<(ContactId, CollectionId)> {
        let collection_id = contact.collection_id;
        let existed = contact.id.get() != 0;

        let id = self.storage.with_tx(|tx| {
            let id = if existed {
                contact.id
            } else {
                StorageAdapter::insert_contact_tx(tx, collection_id, ChangeFlags::added())?
            };

            let old_details = if existed {
                // The existing rows are the baseline the delta engine diffs
                // against; re-reading them inside the same transaction keeps
                // the comparison consistent with whatever else is in flight.
                crate::storage::read_contact_details_tx(tx, id, false)?
            } else {
                Vec::new()
            };

            let (old_for_delta, new_for_delta): (Vec<Detail>, Vec<Detail>) = match mask {
                Some(types) => (
                    old_details.iter().filter(|d| types.contains(&d.detail_type)).cloned().collect(),
                    contact.details.iter().filter(|d| types.contains(&d.detail_type)).cloned().collect(),
                ),
                None => (old_details.clone(), contact.details.clone()),
            };

            let delta = determine_contact_detail_delta(&old_for_delta, &new_for_delta, &DeltaOptions::default());

            for addition in &delta.additions {
                let mut addition = addition.clone();
                addition.set_change_flags(ChangeFlags::added());
                StorageAdapter::insert_detail_tx(tx, id, &addition)?;
            }
            for modification in &delta.modifications {
                if let Some(detail_id) = modification.database_id() {
                    let mut modification = modification.clone();
                    let flags = existing_flags(&old_details, detail_id).on_edit();
                    modification.set_change_flags(flags);
                    StorageAdapter::update_detail_tx(tx, detail_id, &modification)?;
                }
            }
            for deletion in &delta.deletions {
                if let Some(detail_id) = deletion.database_id() {
                    let flags = existing_flags(&old_details, detail_id).on_delete();
                    StorageAdapter::set_detail_change_flags_tx(tx, detail_id, flags)?;
                }
            }

            if existed {
                let flags = StorageAdapter::contact_change_flags_tx(tx, id)?.on_edit();
                StorageAdapter::set_contact_change_flags_tx(tx, id, flags)?;
            }

            contact.id = id;
            Ok(id)
        })?;

        if collection_id != AGGREGATE_COLLECTION_ID && self.is_aggregable(collection_id)? {
            self.reaggregate_constituent(id)?;
        }

        Ok((id, collection_id))
    }

    /// Removes a batch of contacts. Removal always sets the tombstone flag
    /// rather than deleting the row outright (spec.md §3 invariant 5); a
    /// physical delete only happens once flags are cleared.
    pub fn remove_contacts(&self, ids: Vec<ContactId>) -> BatchResult<ContactId> {
        let mut result = BatchResult::ok(Vec::new());
        let mut removed = Vec::new();

        for (index, id) in ids.into_iter().enumerate() {
            if id == SELF_CONTACT_ID {
                result.record_error(index, ContactsError::NotSupported);
                continue;
            }
            let outcome = self.storage.with_tx(|tx| {
                let flags = StorageAdapter::contact_change_flags_tx(tx, id)?.on_delete();
                StorageAdapter::set_contact_change_flags_tx(tx, id, flags)?;
                StorageAdapter::remove_relationships_for_contact_tx(tx, id)?;
                Ok(())
            });
            match outcome {
                Ok(()) => {
                    result.values.push(id);
                    removed.push(id);
                }
                Err(e) => result.record_error(index, e),
            }
        }

        if !removed.is_empty() {
            self.notifier.publish(ChangeEvent::ContactsRemoved(removed));
        }
        result
    }

    pub fn save_collection(&self, mut collection: Collection) -> ContactsResult<CollectionId> {
        let is_new = collection.id.get() == 0;
        let id = self.storage.with_tx(|tx| {
            if is_new {
                let id = StorageAdapter::insert_collection_tx(tx, &collection)?;
                collection.id = id;
                Ok(id)
            } else {
                StorageAdapter::update_collection_tx(tx, &collection)?;
                Ok(collection.id)
            }
        })?;
        self.notifier.publish(ChangeEvent::CollectionsChanged(vec![id]));
        Ok(id)
    }

    pub fn remove_collection(&self, id: CollectionId) -> ContactsResult<()> {
        if id == AGGREGATE_COLLECTION_ID || id == LOCAL_COLLECTION_ID {
            return Err(ContactsError::NotSupported);
        }
        self.storage.with_tx(|tx| StorageAdapter::remove_collection_tx(tx, id))?;
        self.notifier.publish(ChangeEvent::CollectionsRemoved(vec![id]));
        Ok(())
    }

    pub fn save_relationships(&self, relationships: Vec<Relationship>) -> BatchResult<()> {
        let mut result = BatchResult::ok(Vec::new());
        for (index, rel) in relationships.iter().enumerate() {
            let outcome = self
                .storage
                .with_tx(|tx| StorageAdapter::insert_relationship_tx(tx, rel));
            if let Err(e) = outcome {
                result.record_error(index, e);
            } else {
                result.values.push(());
            }
        }
        if result.is_ok() && !relationships.is_empty() {
            let first_ids = relationships.iter().map(|r| r.first).collect();
            self.notifier.publish(ChangeEvent::RelationshipsAdded(first_ids));
        }
        result
    }

    pub fn remove_relationships(&self, relationships: Vec<Relationship>) -> BatchResult<()> {
        let mut result = BatchResult::ok(Vec::new());
        for (index, rel) in relationships.iter().enumerate() {
            let outcome = self
                .storage
                .with_tx(|tx| StorageAdapter::remove_relationship_tx(tx, rel));
            if let Err(e) = outcome {
                result.record_error(index, e);
            } else {
                result.values.push(());
            }
        }
        if result.is_ok() && !relationships.is_empty() {
            let first_ids = relationships.iter().map(|r| r.first).collect();
            self.notifier.publish(ChangeEvent::RelationshipsRemoved(first_ids));
        }
        result
    }

    /// Re-derives the aggregate that `constituent_id` matches (creating one
    /// if none matches yet), then re-promotes its union of details (spec.md
    /// §4.D). The presence-only fast path skips matching entirely and just
    /// re-unions the `Presence` detail of the already-known aggregate.
    fn reaggregate_constituent(&self, constituent_id: ContactId) -> ContactsResult<()> {
        let hint = FetchHint::default();
        let constituent = self.storage.read_contacts_by_ids(&[constituent_id], &hint, false)?;
        let Some(constituent) = constituent.into_iter().next() else {
            return Ok(());
        };

        if is_presence_only_update(&constituent) {
            if let Some(aggregate_id) = self.find_existing_aggregate(constituent_id)? {
                return self.repromote_presence_only(aggregate_id);
            }
        }

        let aggregates = self.storage.read_contacts_in_collection(AGGREGATE_COLLECTION_ID, &hint, false)?;
        let aggregate_id = match aggregation::find_aggregate_match(&constituent, &aggregates) {
            Some(id) => id,
            None => self.storage.with_tx(|tx| {
                StorageAdapter::insert_contact_tx(tx, AGGREGATE_COLLECTION_ID, ChangeFlags::CLEAN)
            })?,
        };

        self.storage.with_tx(|tx| {
            StorageAdapter::insert_relationship_tx(tx, &Relationship::aggregates(aggregate_id, constituent_id))
        })?;
        self.notifier.publish(ChangeEvent::RelationshipsAdded(vec![aggregate_id]));

        self.repromote_aggregate(aggregate_id)
    }

    /// Only constituents of an `Aggregable` collection feed the aggregation
    /// engine (spec.md §4.D "Triggering"); a non-aggregable collection's
    /// contacts are never promoted into (or out of) an aggregate.
    fn is_aggregable(&self, collection_id: CollectionId) -> ContactsResult<bool> {
        Ok(self
            .storage
            .read_collection(collection_id)?
            .map(|c| c.aggregable)
            .unwrap_or(false))
    }

    fn find_existing_aggregate(&self, constituent_id: ContactId) -> ContactsResult<Option<ContactId>> {
        let rels = self
            .storage
            .read_relationships(Some(aggregation::RELATIONSHIP_TYPE), None, Some(constituent_id))?;
        Ok(rels.into_iter().map(|r| r.first).next())
    }

    fn repromote_aggregate(&self, aggregate_id: ContactId) -> ContactsResult<()> {
        let refs_holder = self.read_constituents(aggregate_id)?;
        let refs: Vec<(&Contact, bool)> = refs_holder.iter().map(|(c, l)| (c, *l)).collect();
        let mut promoted = aggregation::promote_details(&refs);

        let hint = FetchHint::default();
        let old_group = self
            .storage
            .read_contacts_by_ids(&[aggregate_id], &hint, false)?
            .into_iter()
            .next()
            .and_then(|c| label::display_label_group_of(&c.details));

        let label_detail = label::synthesize_display_label(&promoted, &EnglishDisplayLabelGroupGenerator);
        let new_group = label::display_label_group_of(std::slice::from_ref(&label_detail));
        promoted.retain(|d| d.detail_type != DetailType::DisplayLabel);
        promoted.push(label_detail);

        self.storage.with_tx(|tx| {
            StorageAdapter::replace_contact_details_tx(tx, aggregate_id, &promoted)
        })?;
        self.notifier.publish(ChangeEvent::ContactsChanged(vec![aggregate_id]));
        if old_group != new_group {
            self.notifier.publish(ChangeEvent::DisplayLabelGroupsChanged);
        }
        Ok(())
    }

    /// The presence-only fast path (spec.md §4.D): re-unions just the
    /// `Presence` detail of `aggregate_id`'s constituents, leaving every
    /// other stored detail (including the display label) untouched, and
    /// announces it as a dedicated presence event rather than a general
    /// `contactsChanged`.
    fn repromote_presence_only(&self, aggregate_id: ContactId) -> ContactsResult<()> {
        let refs_holder = self.read_constituents(aggregate_id)?;
        let refs: Vec<(&Contact, bool)> = refs_holder.iter().map(|(c, l)| (c, *l)).collect();
        let presence = aggregation::promote_presence_only(&refs);

        self.storage.with_tx(|tx| {
            StorageAdapter::replace_contact_details_of_type_tx(tx, aggregate_id, DetailType::Presence, &presence)
        })?;
        self.notifier.publish(ChangeEvent::ContactsPresenceChanged(vec![aggregate_id]));
        Ok(())
    }

    fn read_constituents(&self, aggregate_id: ContactId) -> ContactsResult<Vec<(Contact, bool)>> {
        let rels = self
            .storage
            .read_relationships(Some(aggregation::RELATIONSHIP_TYPE), Some(aggregate_id), None)?;
        let hint = FetchHint::default();
        let mut constituents = Vec::new();
        for rel in &rels {
            if let Some(contact) = self
                .storage
                .read_contacts_by_ids(&[rel.second], &hint, false)?
                .into_iter()
                .next()
            {
                let is_local = aggregation::is_local_collection(contact.collection_id);
                constituents.push((contact, is_local));
            }
        }
        Ok(constituents)
    }
}

fn existing_flags(old_details: &[Detail], detail_id: contacts_types::DetailId) -> ChangeFlags {
    old_details
        .iter()
        .find(|d| d.database_id() == Some(detail_id))
        .map(|d| d.change_flags())
        .unwrap_or(ChangeFlags::CLEAN)
}
