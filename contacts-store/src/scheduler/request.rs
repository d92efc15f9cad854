//! Request payloads and the lifecycle state machine driven by the worker
//! (spec.md §4.H). One tagged enum per request kind, dispatched through a
//! single `execute` match rather than a per-kind request subclass/vtable —
//! this is the shape spec.md's Design Notes call out explicitly.

use std::collections::HashSet;

use contacts_types::{
    BatchResult, Collection, CollectionId, Contact, ContactFilter, ContactId, ContactsResult, Detail,
    DetailType, FetchHint, FieldKey, Relationship, SortDirection, SortSpec,
};

use crate::change_tracking::{ContactChanges, ConflictResolutionPolicy};

/// Every request the engine accepts, tagged by kind (spec.md §6 "External
/// Interfaces").
#[derive(Debug, Clone)]
pub enum RequestKind {
    ContactSave {
        contacts: Vec<Contact>,
        /// `Some(types)` restricts the save to those detail types only
        /// (spec.md §4.F `save(&contacts, detailMask?, errMap)`); every other
        /// stored detail on the contact is left untouched. `None` means an
        /// unrestricted save of the full detail set.
        mask: Option<HashSet<DetailType>>,
    },
    ContactRemove(Vec<ContactId>),
    ContactFetch {
        filter: ContactFilter,
        sort: Vec<SortSpec>,
        hint: FetchHint,
    },
    ContactIdFetch {
        filter: ContactFilter,
        sort: Vec<SortSpec>,
    },
    ContactFetchById {
        ids: Vec<ContactId>,
        hint: FetchHint,
    },
    RelationshipFetch {
        relationship_type: Option<String>,
        first: Option<ContactId>,
        second: Option<ContactId>,
    },
    RelationshipSave(Vec<Relationship>),
    RelationshipRemove(Vec<Relationship>),
    CollectionFetch,
    CollectionSave(Collection),
    CollectionRemove(CollectionId),
    DetailFetch {
        detail_type: DetailType,
        sort_field: Option<FieldKey>,
        direction: SortDirection,
    },
    CollectionChangesFetch,
    ContactChangesFetch(CollectionId),
    ChangesSave {
        updates: Vec<(ContactId, Contact)>,
        policy: ConflictResolutionPolicy,
        /// When set, every contact actually touched by this call has its
        /// change flags (and its details') zeroed after the merge, per
        /// spec.md §4.F `storeChanges(..., policy, clearFlags)`.
        clear_flags: bool,
    },
    ClearChangeFlags(Vec<ContactId>),
}

impl RequestKind {
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::ContactSave { .. } => "ContactSave",
            RequestKind::ContactRemove(_) => "ContactRemove",
            RequestKind::ContactFetch { .. } => "ContactFetch",
            RequestKind::ContactIdFetch { .. } => "ContactIdFetch",
            RequestKind::ContactFetchById { .. } => "ContactFetchById",
            RequestKind::RelationshipFetch { .. } => "RelationshipFetch",
            RequestKind::RelationshipSave(_) => "RelationshipSave",
            RequestKind::RelationshipRemove(_) => "RelationshipRemove",
            RequestKind::CollectionFetch => "CollectionFetch",
            RequestKind::CollectionSave(_) => "CollectionSave",
            RequestKind::CollectionRemove(_) => "CollectionRemove",
            RequestKind::DetailFetch { .. } => "DetailFetch",
            RequestKind::CollectionChangesFetch => "CollectionChangesFetch",
            RequestKind::ContactChangesFetch(_) => "ContactChangesFetch",
            RequestKind::ChangesSave { .. } => "ChangesSave",
            RequestKind::ClearChangeFlags(_) => "ClearChangeFlags",
        }
    }
}

/// The result of whichever `RequestKind` was submitted. One variant per
/// kind, so callers get back a typed value instead of an `Any`-punned blob.
#[derive(Debug, Clone)]
pub enum RequestResult {
    Contacts(BatchResult<ContactId>),
    ContactList(Vec<Contact>),
    ContactIds(Vec<ContactId>),
    Relationships(Vec<Relationship>),
    RelationshipBatch(BatchResult<()>),
    Collections(Vec<Collection>),
    CollectionId(CollectionId),
    Unit,
    Details(Vec<Detail>),
    CollectionIds(Vec<CollectionId>),
    ContactChanges(ContactChanges),
    AppliedIds(Vec<ContactId>),
}

pub type RequestOutcome = ContactsResult<RequestResult>;

/// The lifecycle every request moves through (spec.md §4.H / §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Queued, not yet picked up by the worker.
    Inactive,
    /// The worker has started executing it.
    Active,
    /// Finished normally (check the result for success/failure).
    Finished,
    /// Canceled before or during execution; any result is best-effort
    /// partial data, not a completed answer.
    Canceled,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Finished | RequestState::Canceled)
    }
}
