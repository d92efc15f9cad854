//! The Aggregation Engine (spec.md §4.D): maintains the synthetic
//! "aggregate" contacts that union the details of matching constituents
//! from every non-aggregate collection.
//!
//! Matching and promotion are pure functions over in-memory `Contact`
//! values so they can be exercised without a database; `writer.rs` is
//! responsible for fetching candidates, calling into this module, and
//! persisting the result (including the `Aggregates` relationship rows).

use std::collections::HashSet;

use contacts_types::{
    AGGREGATE_COLLECTION_ID, AGGREGATES_RELATIONSHIP, ChangeFlags, Collection, CollectionId, Contact,
    ContactId, Detail, DetailType, FieldKey, LOCAL_COLLECTION_ID, Relationship, Value,
};

/// Detail types for which only a single value should survive promotion
/// (spec.md §4.D "per-type union promotion"): local constituents win over
/// remote ones; ties beyond that are broken by lowest constituent id.
const SINGLETON_TYPES: &[DetailType] = &[DetailType::Name, DetailType::DisplayLabel, DetailType::Favorite];

/// An identity key a constituent contact exposes for matching purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityKey {
    Name(String),
    Phone(String),
    OnlineAccount(String),
}

/// Extracts the candidate identity keys for a contact: its normalized
/// display name, and any phone numbers / online-account URIs it carries
/// verbatim (spec.md §4.D "match by normalized name or exact phone/
/// online-account identifier").
fn identity_keys(contact: &Contact) -> Vec<IdentityKey> {
    let mut keys = Vec::new();
    for detail in contact.details_of_type(DetailType::Name) {
        if let Some(normalized) = normalized_name(detail) {
            keys.push(IdentityKey::Name(normalized));
        }
    }
    for detail in contact.details_of_type(DetailType::PhoneNumber) {
        if let Some(Value::Str(number)) = detail.field(FieldKey::PhoneNumber) {
            let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
            if !digits.is_empty() {
                keys.push(IdentityKey::Phone(digits));
            }
        }
    }
    for detail in contact.details_of_type(DetailType::OnlineAccount) {
        if let Some(value) = detail.field(FieldKey::AccountUri).and_then(Value::as_str) {
            if !value.is_empty() {
                keys.push(IdentityKey::OnlineAccount(value.to_string()));
            }
        }
    }
    keys
}

fn normalized_name(detail: &Detail) -> Option<String> {
    let first = detail.field(FieldKey::FirstName).and_then(Value::as_str).unwrap_or("");
    let last = detail.field(FieldKey::LastName).and_then(Value::as_str).unwrap_or("");
    let joined = format!("{first} {last}");
    let normalized: String = joined
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

/// Finds the aggregate (if any) that `constituent` should be merged into,
/// out of `aggregates`. When more than one aggregate matches, the one with
/// the lowest id wins (spec.md §4.D "lowest-id-wins on multi-match").
pub fn find_aggregate_match(constituent: &Contact, aggregates: &[Contact]) -> Option<ContactId> {
    let keys: HashSet<IdentityKey> = identity_keys(constituent).into_iter().collect();
    if keys.is_empty() {
        return None;
    }
    aggregates
        .iter()
        .filter(|candidate| {
            let candidate_keys: HashSet<IdentityKey> = identity_keys(candidate).into_iter().collect();
            !keys.is_disjoint(&candidate_keys)
        })
        .map(|candidate| candidate.id)
        .min_by_key(|id| id.get())
}

/// Returns true if `contact` carries nothing but a `Presence` detail beyond
/// its identity — the "presence-only fast path" (spec.md §4.D): such
/// updates never change matching or promoted singleton fields, so the
/// aggregate's relationship set doesn't need to be recomputed, only the
/// `Presence` detail re-unioned.
pub fn is_presence_only_update(contact: &Contact) -> bool {
    contact
        .details
        .iter()
        .all(|d| matches!(d.detail_type, DetailType::Presence))
}

/// Computes the union of details that an aggregate contact should carry,
/// given its current constituents. Multi-valued detail types (phone
/// numbers, emails, and so on) are unioned verbatim, each tagged with the
/// constituent it came from via `Provenance`; `SINGLETON_TYPES` keep at
/// most one value, preferring a local constituent's value, else the value
/// from the lowest-id constituent.
pub fn promote_details(constituents: &[(&Contact, bool)]) -> Vec<Detail> {
    let mut promoted = Vec::new();

    for detail_type in DetailType::ALL.iter().copied() {
        if detail_type == DetailType::Deactivated || detail_type == DetailType::StatusFlags {
            continue;
        }
        if SINGLETON_TYPES.contains(&detail_type) {
            if let Some(detail) = promote_singleton(detail_type, constituents) {
                promoted.push(detail);
            }
            continue;
        }
        promoted.extend(promote_type_union(detail_type, constituents));
    }

    promoted
}

/// Re-unions a single non-singleton detail type across `constituents`,
/// tagging each promoted detail with its source via `Provenance` (spec.md
/// §4.D "per-type union promotion"). Used both by the full `promote_details`
/// sweep and by the presence-only fast path, which must re-union `Presence`
/// alone without recomputing any other promoted type.
fn promote_type_union(detail_type: DetailType, constituents: &[(&Contact, bool)]) -> Vec<Detail> {
    let mut promoted = Vec::new();
    for (contact, _is_local) in constituents {
        for detail in contact.details_of_type(detail_type) {
            let mut promoted_detail = detail.clone();
            promoted_detail.clear_database_id();
            promoted_detail.set_provenance(contact.id);
            promoted_detail.set_change_flags(ChangeFlags::CLEAN);
            promoted.push(promoted_detail);
        }
    }
    promoted
}

/// Re-unions only the `Presence` detail across `constituents` (spec.md §4.D
/// presence-only fast path): the aggregate's other promoted detail types are
/// left exactly as they are.
pub fn promote_presence_only(constituents: &[(&Contact, bool)]) -> Vec<Detail> {
    promote_type_union(DetailType::Presence, constituents)
}

fn promote_singleton(detail_type: DetailType, constituents: &[(&Contact, bool)]) -> Option<Detail> {
    let mut ordered: Vec<(&Contact, bool)> = constituents.iter().copied().collect();
    ordered.sort_by_key(|(contact, is_local)| (!is_local, contact.id.get()));

    for (contact, _is_local) in ordered {
        if let Some(detail) = contact.details_of_type(detail_type).next() {
            let mut promoted_detail = detail.clone();
            promoted_detail.clear_database_id();
            promoted_detail.set_provenance(contact.id);
            promoted_detail.set_change_flags(ChangeFlags::CLEAN);
            return Some(promoted_detail);
        }
    }
    None
}

/// Builds the `Aggregates` relationship rows for a freshly (re)computed
/// aggregate, replacing whatever set previously existed for it.
pub fn aggregates_relationships(aggregate_id: ContactId, constituent_ids: &[ContactId]) -> Vec<Relationship> {
    constituent_ids
        .iter()
        .map(|&constituent_id| Relationship::aggregates(aggregate_id, constituent_id))
        .collect()
}

/// A freshly matched constituent with no existing aggregate needs a new
/// aggregate contact shell created for it, in the sentinel aggregate
/// collection (spec.md §3).
pub fn new_aggregate_collection() -> Collection {
    let mut collection = Collection::new(AGGREGATE_COLLECTION_ID, "aggregate");
    collection.aggregable = false;
    collection.read_only = true;
    collection
}

pub fn is_local_collection(id: CollectionId) -> bool {
    id == LOCAL_COLLECTION_ID
}

pub const RELATIONSHIP_TYPE: &str = AGGREGATES_RELATIONSHIP;

#[cfg(test)]
mod tests {
    use super::*;
    use contacts_types::{CollectionId, FieldKey};

    fn constituent(id: u32, first: &str, last: &str, collection: CollectionId) -> Contact {
        let mut contact = Contact::new(ContactId::new(id), collection);
        contact.details.push(
            Detail::new(DetailType::Name)
                .with_field(FieldKey::FirstName, Value::Str(first.to_string()))
                .with_field(FieldKey::LastName, Value::Str(last.to_string())),
        );
        contact
    }

    #[test]
    fn matching_normalized_names_merge() {
        let aggregate = constituent(100, "ann", "smith", AGGREGATE_COLLECTION_ID);
        let incoming = constituent(5, "Ann", "Smith", LOCAL_COLLECTION_ID);
        let matched = find_aggregate_match(&incoming, std::slice::from_ref(&aggregate));
        assert_eq!(matched, Some(ContactId::new(100)));
    }

    #[test]
    fn no_shared_identity_means_no_match() {
        let aggregate = constituent(100, "ann", "smith", AGGREGATE_COLLECTION_ID);
        let incoming = constituent(5, "bob", "jones", LOCAL_COLLECTION_ID);
        assert_eq!(find_aggregate_match(&incoming, std::slice::from_ref(&aggregate)), None);
    }

    #[test]
    fn local_constituent_wins_singleton_promotion() {
        let local = constituent(5, "Ann", "Local", LOCAL_COLLECTION_ID);
        let remote = constituent(6, "Ann", "Remote", CollectionId::new(9));
        let promoted = promote_details(&[(&remote, false), (&local, true)]);
        let name = promoted.iter().find(|d| d.detail_type == DetailType::Name).unwrap();
        assert_eq!(name.field(FieldKey::LastName), Some(&Value::Str("Local".into())));
    }

    #[test]
    fn lowest_id_wins_when_no_local_constituent() {
        let a = constituent(10, "Ann", "A", CollectionId::new(9));
        let b = constituent(5, "Ann", "B", CollectionId::new(9));
        let promoted = promote_details(&[(&a, false), (&b, false)]);
        let name = promoted.iter().find(|d| d.detail_type == DetailType::Name).unwrap();
        assert_eq!(name.field(FieldKey::LastName), Some(&Value::Str("B".into())));
    }
}
