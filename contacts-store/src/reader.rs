//! The Reader (spec.md §4.E): synchronous query surface over the storage
//! adapter. Filters are translated directly against SQL where the shape
//! allows it (`All`, `CollectionIs`); anything else (`DetailFieldContains`,
//! boolean composition) is evaluated in memory against the fetched rows —
//! there is deliberately no query planner (spec.md §1 Non-goals).

use contacts_types::{
    Contact, ContactFilter, ContactId, ContactsError, ContactsResult, DetailType, FetchHint, FieldKey,
    Relationship, SortDirection, SortSpec,
};

use crate::storage::StorageAdapter;

pub struct Reader<'a> {
    storage: &'a StorageAdapter,
}

impl<'a> Reader<'a> {
    pub fn new(storage: &'a StorageAdapter) -> Self {
        Reader { storage }
    }

    pub fn contact_ids(&self, filter: &ContactFilter, sort: &[SortSpec]) -> ContactsResult<Vec<ContactId>> {
        let contacts = self.contacts(filter, sort, &FetchHint::default())?;
        Ok(contacts.into_iter().map(|c| c.id).collect())
    }

    pub fn contact_by_id(&self, id: ContactId, hint: &FetchHint) -> ContactsResult<Contact> {
        let mut matches = self.storage.read_contacts_by_ids(&[id], hint, false)?;
        matches.pop().ok_or(ContactsError::DoesNotExist)
    }

    pub fn contacts_by_ids(&self, ids: &[ContactId], hint: &FetchHint) -> ContactsResult<Vec<Contact>> {
        self.storage.read_contacts_by_ids(ids, hint, false)
    }

    pub fn contacts(
        &self,
        filter: &ContactFilter,
        sort: &[SortSpec],
        hint: &FetchHint,
    ) -> ContactsResult<Vec<Contact>> {
        let mut contacts = match filter {
            ContactFilter::All => self.storage.read_all_contacts(hint, false)?,
            ContactFilter::CollectionIs(collection_id) => {
                self.storage.read_contacts_in_collection(*collection_id, hint, false)?
            }
            other => {
                let all = self.storage.read_all_contacts(hint, false)?;
                all.into_iter().filter(|c| matches_filter(c, other)).collect()
            }
        };
        apply_sort(&mut contacts, sort);
        if let Some(max) = hint.max_count {
            contacts.truncate(max);
        }
        Ok(contacts)
    }

    pub fn collections(&self) -> ContactsResult<Vec<contacts_types::Collection>> {
        self.storage.read_collections()
    }

    pub fn relationships(
        &self,
        relationship_type: Option<&str>,
        first: Option<ContactId>,
        second: Option<ContactId>,
    ) -> ContactsResult<Vec<Relationship>> {
        self.storage.read_relationships(relationship_type, first, second)
    }

    /// Projects a single detail type across every contact, optionally
    /// sorted by one of the detail's own fields (spec.md §4.E `readDetails`).
    pub fn details_of_type(
        &self,
        detail_type: DetailType,
        sort_field: Option<FieldKey>,
        direction: SortDirection,
    ) -> ContactsResult<Vec<contacts_types::Detail>> {
        let rows = self.storage.read_details_of_type(
            detail_type,
            sort_field,
            matches!(direction, SortDirection::Ascending),
        )?;
        Ok(rows.into_iter().map(|(_, detail)| detail).collect())
    }
}

fn matches_filter(contact: &Contact, filter: &ContactFilter) -> bool {
    match filter {
        ContactFilter::All => true,
        ContactFilter::CollectionIs(id) => contact.collection_id == *id,
        ContactFilter::DetailFieldContains { detail_type, field, needle } => contact
            .details_of_type(*detail_type)
            .filter_map(|d| d.field(*field))
            .filter_map(|v| v.as_str())
            .any(|s| s.contains(needle.as_str())),
        ContactFilter::And(filters) => filters.iter().all(|f| matches_filter(contact, f)),
        ContactFilter::Or(filters) => filters.iter().any(|f| matches_filter(contact, f)),
    }
}

fn apply_sort(contacts: &mut [Contact], sort: &[SortSpec]) {
    if sort.is_empty() {
        return;
    }
    contacts.sort_by(|a, b| {
        for spec in sort {
            let ordering = sort_key(a, &spec.field).cmp(&sort_key(b, &spec.field));
            let ordering = match spec.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering != std::cmp::Ordering::Equal {
                return ordering;
            }
        }
        std::cmp::Ordering::Equal
    });
}

fn sort_key(contact: &Contact, field: &str) -> String {
    if field == "id" {
        return format!("{:010}", contact.id.get());
    }
    for detail in &contact.details {
        for (key, value) in &detail.fields {
            if format!("{key:?}") == field {
                if let Some(s) = value.as_str() {
                    return s.to_lowercase();
                }
                if let Some(i) = value.as_int() {
                    return format!("{i:020}");
                }
            }
        }
    }
    String::new()
}
