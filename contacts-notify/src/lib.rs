//! The Notifier (spec.md §4.B): fan-out of change events to in-process
//! subscribers. Modeled on the teacher's inter-component event-notification
//! crates — a broadcast channel plus a typed event enum, rather than a
//! callback-list API.
//!
//! Ordering guarantee (owned by the caller, not by this crate): the Writer
//! must call [`Notifier::publish`] only after its transaction has committed,
//! and before the mutating request's reply is delivered to the submitter
//! (spec.md §4.B).

use contacts_types::{CollectionId, ContactId};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 1024;

/// One tagged change event. Each variant corresponds 1:1 to a wire-level
/// event name in spec.md §6 ("Notifier wire-level").
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    ContactsAdded(Vec<ContactId>),
    ContactsChanged(Vec<ContactId>),
    ContactsPresenceChanged(Vec<ContactId>),
    ContactsRemoved(Vec<ContactId>),
    CollectionsAdded(Vec<CollectionId>),
    CollectionsChanged(Vec<CollectionId>),
    CollectionsRemoved(Vec<CollectionId>),
    CollectionContactsChanged(Vec<CollectionId>),
    RelationshipsAdded(Vec<ContactId>),
    RelationshipsRemoved(Vec<ContactId>),
    SelfContactIdChanged { old: ContactId, new: ContactId },
    DisplayLabelGroupsChanged,
}

impl ChangeEvent {
    /// The wire-level signature from spec.md §6: `"au"` (array of u32),
    /// `"uu"` (pair of u32), or `""` (no payload).
    pub fn wire_signature(&self) -> &'static str {
        match self {
            ChangeEvent::SelfContactIdChanged { .. } => "uu",
            ChangeEvent::DisplayLabelGroupsChanged => "",
            _ => "au",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::ContactsAdded(_) => "contactsAdded",
            ChangeEvent::ContactsChanged(_) => "contactsChanged",
            ChangeEvent::ContactsPresenceChanged(_) => "contactsPresenceChanged",
            ChangeEvent::ContactsRemoved(_) => "contactsRemoved",
            ChangeEvent::CollectionsAdded(_) => "collectionsAdded",
            ChangeEvent::CollectionsChanged(_) => "collectionsChanged",
            ChangeEvent::CollectionsRemoved(_) => "collectionsRemoved",
            ChangeEvent::CollectionContactsChanged(_) => "collectionContactsChanged",
            ChangeEvent::RelationshipsAdded(_) => "relationshipsAdded",
            ChangeEvent::RelationshipsRemoved(_) => "relationshipsRemoved",
            ChangeEvent::SelfContactIdChanged { .. } => "selfContactIdChanged",
            ChangeEvent::DisplayLabelGroupsChanged => "displayLabelGroupsChanged",
        }
    }
}

/// Fan-out publisher/subscriber. Cheap to clone; every clone shares the same
/// underlying broadcast channel.
#[derive(Clone)]
pub struct Notifier {
    sender: broadcast::Sender<ChangeEvent>,
    merge_presence_changes: bool,
}

impl Notifier {
    pub fn new(merge_presence_changes: bool) -> Self {
        let (sender, _receiver) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            merge_presence_changes,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event, applying the `mergePresenceChanges` switch
    /// (spec.md §4.B) on the outbound side: when enabled, a presence-only
    /// change is folded into a regular `contactsChanged` event so that
    /// subscribers who don't care about presence see one unified stream.
    pub fn publish(&self, event: ChangeEvent) {
        let event = match (event, self.merge_presence_changes) {
            (ChangeEvent::ContactsPresenceChanged(ids), true) => ChangeEvent::ContactsChanged(ids),
            (event, _) => event,
        };
        tracing::debug!(event = event.name(), "publishing change event");
        // A lagging/absent subscriber is not an error for the publisher:
        // the scheduler's worker thread must never block on a slow reader.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn merge_presence_changes_folds_into_contacts_changed() {
        let notifier = Notifier::new(true);
        let mut rx = notifier.subscribe();
        notifier.publish(ChangeEvent::ContactsPresenceChanged(vec![ContactId::new(7)]));
        let event = rx.recv().await.unwrap();
        assert_eq!(event, ChangeEvent::ContactsChanged(vec![ContactId::new(7)]));
    }

    #[tokio::test]
    async fn presence_changes_pass_through_when_not_merged() {
        let notifier = Notifier::new(false);
        let mut rx = notifier.subscribe();
        notifier.publish(ChangeEvent::ContactsPresenceChanged(vec![ContactId::new(7)]));
        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            ChangeEvent::ContactsPresenceChanged(vec![ContactId::new(7)])
        );
    }

    #[tokio::test]
    async fn multiple_subscribers_each_get_the_event() {
        let notifier = Notifier::new(false);
        let mut a = notifier.subscribe();
        let mut b = notifier.subscribe();
        notifier.publish(ChangeEvent::DisplayLabelGroupsChanged);
        assert_eq!(a.recv().await.unwrap(), ChangeEvent::DisplayLabelGroupsChanged);
        assert_eq!(b.recv().await.unwrap(), ChangeEvent::DisplayLabelGroupsChanged);
    }
}
