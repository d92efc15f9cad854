//! The Detail-Delta Engine (spec.md §4.C): given a contact's old and new
//! detail lists, works out the minimal set of additions/modifications/
//! deletions that would turn one into the other.
//!
//! The algorithm is a three-pass reduction: first strip exact matches
//! (including the "empty string/list is equivalent to absent" and "URL
//! equals its string form" tolerances), then pair up same-type details that
//! share a `DatabaseId`, then greedily pair up whatever is left by lowest
//! field-difference score within each remaining detail type. Anything that
//! survives all three passes is a genuine addition or deletion.

use std::collections::{BTreeMap, HashMap, HashSet};

use contacts_types::{Detail, DetailType, FieldKey, Value};
use url::Url;

/// Tunable ignore-sets for the delta computation (spec.md §4.C). The
/// defaults mirror the three built-in ignore lists: read-only/composed
/// detail types, fields that are meaningless to compare (change metadata),
/// and a couple of per-type fields that are derived rather than authored.
#[derive(Debug, Clone)]
pub struct DeltaOptions {
    pub ignorable_detail_types: HashSet<DetailType>,
    pub ignorable_detail_fields: HashMap<DetailType, HashSet<FieldKey>>,
    pub ignorable_common_fields: HashSet<FieldKey>,
}

impl Default for DeltaOptions {
    fn default() -> Self {
        let mut ignorable_detail_fields = HashMap::new();
        ignorable_detail_fields.insert(
            DetailType::PhoneNumber,
            HashSet::from([FieldKey::PhoneNormalizedNumber]),
        );

        DeltaOptions {
            ignorable_detail_types: HashSet::from([DetailType::Deactivated, DetailType::StatusFlags]),
            ignorable_detail_fields,
            ignorable_common_fields: HashSet::from([
                FieldKey::Provenance,
                FieldKey::Modifiable,
                FieldKey::Nonexportable,
                FieldKey::ChangeFlags,
                FieldKey::DatabaseId,
            ]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactDetailDelta {
    pub additions: Vec<Detail>,
    pub modifications: Vec<Detail>,
    pub deletions: Vec<Detail>,
}

/// Computes the delta between a contact's stored details and its proposed
/// replacement set.
pub fn determine_contact_detail_delta(
    old_details: &[Detail],
    new_details: &[Detail],
    options: &DeltaOptions,
) -> ContactDetailDelta {
    let mut odets: Vec<Detail> = old_details
        .iter()
        .filter(|d| !options.ignorable_detail_types.contains(&d.detail_type))
        .cloned()
        .collect();
    let mut ndets: Vec<Detail> = new_details
        .iter()
        .filter(|d| !options.ignorable_detail_types.contains(&d.detail_type))
        .cloned()
        .collect();

    remove_exact_matches(&mut odets, &mut ndets, options);

    let mut modifications = remove_direct_database_id_modifications(&mut odets, &mut ndets);
    modifications.extend(improve_delta(&mut odets, &mut ndets, options));

    let deletions = odets;
    let mut additions = ndets;
    for detail in &mut additions {
        // Any detail addition requires a fresh database id (spec.md §3
        // invariant 4).
        detail.clear_database_id();
    }

    ContactDetailDelta {
        additions,
        modifications,
        deletions,
    }
}

/// Strips details that match exactly (up to the configured tolerances) from
/// both lists; they carry no delta.
fn remove_exact_matches(odets: &mut Vec<Detail>, ndets: &mut Vec<Detail>, options: &DeltaOptions) {
    let mut i = odets.len();
    while i > 0 {
        i -= 1;
        let mut found = false;
        let mut j = ndets.len();
        while j > 0 {
            j -= 1;
            if detail_pair_exactly_matches(&odets[i], &ndets[j], options) {
                ndets.remove(j);
                found = true;
            }
        }
        if found {
            odets.remove(i);
        }
    }
}

/// Details that share a `DatabaseId` (and type) are always a modification
/// of one another, regardless of score — a sync round-trip that changed
/// every field still updates the same row.
fn remove_direct_database_id_modifications(odets: &mut Vec<Detail>, ndets: &mut Vec<Detail>) -> Vec<Detail> {
    let mut modifications = Vec::new();
    let mut i = odets.len();
    while i > 0 {
        i -= 1;
        let old_id = odets[i].database_id();
        let old_type = odets[i].detail_type;
        let mut found_idx = None;
        if let Some(old_id) = old_id {
            let mut j = ndets.len();
            while j > 0 {
                j -= 1;
                if ndets[j].detail_type == old_type && ndets[j].database_id() == Some(old_id) {
                    found_idx = Some(j);
                    break;
                }
            }
        }
        if let Some(idx) = found_idx {
            let mut update = ndets.remove(idx);
            construct_modification(&odets[i], &mut update);
            modifications.push(update);
            odets.remove(i);
        }
    }
    modifications
}

/// Buckets the remaining details by type (in first-seen order — the
/// upstream implementation this is modeled on iterates a multi-map's
/// "unique keys", whose order is an implementation detail of its hash
/// table; first-seen order instead makes the result reproducible) and
/// greedily pairs off the closest match within each bucket.
fn improve_delta(odets: &mut Vec<Detail>, ndets: &mut Vec<Detail>, options: &DeltaOptions) -> Vec<Detail> {
    let mut final_removals = Vec::new();
    let mut final_additions = Vec::new();
    let mut final_modifications = Vec::new();
    let mut seen_types = HashSet::new();

    for detail_type in ordered_unique_types(odets) {
        seen_types.insert(detail_type);
        let mut removals_of_type: Vec<Detail> =
            odets.iter().filter(|d| d.detail_type == detail_type).cloned().collect();
        let mut additions_of_type: Vec<Detail> =
            ndets.iter().filter(|d| d.detail_type == detail_type).cloned().collect();
        let modifications_of_type = determine_modifications(&mut removals_of_type, &mut additions_of_type, options);
        final_removals.extend(removals_of_type);
        final_additions.extend(additions_of_type);
        final_modifications.extend(modifications_of_type);
    }

    for detail_type in ordered_unique_types(ndets) {
        if !seen_types.contains(&detail_type) {
            final_additions.extend(ndets.iter().filter(|d| d.detail_type == detail_type).cloned());
        }
    }

    *odets = final_removals;
    *ndets = final_additions;
    final_modifications
}

fn ordered_unique_types(details: &[Detail]) -> Vec<DetailType> {
    let mut order = Vec::new();
    for detail in details {
        if !order.contains(&detail.detail_type) {
            order.push(detail.detail_type);
        }
    }
    order
}

/// Within one detail type, greedily pairs removals and additions by lowest
/// score until no pairing remains possible. Ties are broken by enumeration
/// order (removal index ascending, then addition index ascending), which
/// keeps the result deterministic.
fn determine_modifications(
    removals: &mut Vec<Detail>,
    additions: &mut Vec<Detail>,
    options: &DeltaOptions,
) -> Vec<Detail> {
    let mut modifications = Vec::new();
    let mut scores = Vec::with_capacity(removals.len());
    for removal in removals.iter() {
        let mut row = Vec::with_capacity(additions.len());
        for addition in additions.iter() {
            row.push(score_for_detail_pair(removal, addition, options));
        }
        scores.push(row);
    }

    let mut remaining_removals: Vec<usize> = (0..removals.len()).collect();
    let mut remaining_additions: Vec<usize> = (0..additions.len()).collect();

    loop {
        if remaining_removals.is_empty() || remaining_additions.is_empty() {
            break;
        }
        let mut best: Option<(usize, usize, i32)> = None;
        for &i in &remaining_removals {
            for &j in &remaining_additions {
                let score = scores[i][j];
                if best.map_or(true, |(_, _, b)| score < b) {
                    best = Some((i, j, score));
                }
            }
        }
        let (bi, bj, _) = best.expect("checked non-empty above");
        remaining_removals.retain(|&x| x != bi);
        remaining_additions.retain(|&x| x != bj);

        let mut update = additions[bj].clone();
        construct_modification(&removals[bi], &mut update);
        modifications.push(update);
    }

    let final_removals: Vec<Detail> = remaining_removals.iter().map(|&i| removals[i].clone()).collect();
    let final_additions: Vec<Detail> = remaining_additions.iter().map(|&j| additions[j].clone()).collect();
    *removals = final_removals;
    *additions = final_additions;
    modifications
}

/// Transfers the fields the new value should inherit from the old one when
/// it's silent about them: `DatabaseId` always (a modification necessarily
/// targets the same row), and `Modifiable` / `Provenance` / `DetailUri` /
/// `LinkedDetailUris` whenever the incoming update doesn't specify them.
fn construct_modification(old: &Detail, update: &mut Detail) {
    if let Some(id) = old.field(FieldKey::DatabaseId).cloned() {
        update.fields.insert(FieldKey::DatabaseId, id);
    }
    for field in [
        FieldKey::Modifiable,
        FieldKey::Provenance,
        FieldKey::DetailUri,
        FieldKey::LinkedDetailUris,
    ] {
        if !update.fields.contains_key(&field) {
            if let Some(value) = old.field(field).cloned() {
                update.fields.insert(field, value);
            }
        }
    }
}

fn score_for_value_pair(removal: Option<&Value>, addition: Option<&Value>) -> i32 {
    match (removal, addition) {
        (None, None) => 0,
        (Some(v), None) | (None, Some(v)) => {
            if v.is_empty_equivalent() {
                0
            } else {
                1
            }
        }
        (Some(Value::Url(r)), Some(Value::Str(a))) | (Some(Value::Str(a)), Some(Value::Url(r))) => {
            match (Url::parse(r), Url::parse(a)) {
                (Ok(ru), Ok(au)) => i32::from(ru != au),
                _ => i32::from(r != a),
            }
        }
        (Some(r), Some(a)) => i32::from(r != a),
    }
}

fn score_for_detail_pair(removal: &Detail, addition: &Detail, options: &DeltaOptions) -> i32 {
    let mut score = 0;
    let mut seen = HashSet::new();
    let ignorable_removal = options.ignorable_detail_fields.get(&removal.detail_type);
    let ignorable_addition = options.ignorable_detail_fields.get(&addition.detail_type);

    for (&field, value) in &removal.fields {
        if options.ignorable_common_fields.contains(&field)
            || ignorable_removal.map_or(false, |s| s.contains(&field))
        {
            continue;
        }
        seen.insert(field);
        score += score_for_value_pair(Some(value), addition.field(field));
    }
    for (&field, value) in &addition.fields {
        if seen.contains(&field)
            || options.ignorable_common_fields.contains(&field)
            || ignorable_addition.map_or(false, |s| s.contains(&field))
        {
            continue;
        }
        score += score_for_value_pair(removal.field(field), Some(value));
    }
    score
}

fn detail_pair_exactly_matches(a: &Detail, b: &Detail, options: &DeltaOptions) -> bool {
    if a.detail_type != b.detail_type {
        return false;
    }
    let ignorable_a = options.ignorable_detail_fields.get(&a.detail_type);
    let ignorable_b = options.ignorable_detail_fields.get(&b.detail_type);

    let mut b_remaining: BTreeMap<FieldKey, &Value> = b.fields.iter().map(|(k, v)| (*k, v)).collect();
    for (&field, avalue) in &a.fields {
        if options.ignorable_common_fields.contains(&field) || ignorable_a.map_or(false, |s| s.contains(&field)) {
            continue;
        }
        match b_remaining.remove(&field) {
            None => {
                if !avalue.is_empty_equivalent() {
                    return false;
                }
            }
            Some(bvalue) => {
                if score_for_value_pair(Some(avalue), Some(bvalue)) != 0 {
                    return false;
                }
            }
        }
    }

    for (&field, bvalue) in &b_remaining {
        if options.ignorable_common_fields.contains(&field) || ignorable_b.map_or(false, |s| s.contains(&field)) {
            continue;
        }
        if !bvalue.is_empty_equivalent() {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use contacts_types::FieldKey::{EmailAddress, FirstName};

    fn name(first: &str) -> Detail {
        Detail::new(DetailType::Name).with_field(FirstName, Value::Str(first.to_string()))
    }

    #[test]
    fn identical_details_produce_no_delta() {
        let old = vec![name("Ann")];
        let new = old.clone();
        let delta = determine_contact_detail_delta(&old, &new, &DeltaOptions::default());
        assert!(delta.additions.is_empty());
        assert!(delta.modifications.is_empty());
        assert!(delta.deletions.is_empty());
    }

    #[test]
    fn single_field_change_is_a_modification_not_addition_plus_deletion() {
        let old = vec![name("Ann")];
        let new = vec![name("Anne")];
        let delta = determine_contact_detail_delta(&old, &new, &DeltaOptions::default());
        assert!(delta.additions.is_empty());
        assert!(delta.deletions.is_empty());
        assert_eq!(delta.modifications.len(), 1);
        assert_eq!(delta.modifications[0].field(FirstName), Some(&Value::Str("Anne".into())));
    }

    #[test]
    fn database_id_pins_the_modification_even_with_a_large_score() {
        let mut old = Detail::new(DetailType::EmailAddress).with_field(EmailAddress, Value::Str("a@example.com".into()));
        old.set_database_id(contacts_types::DetailId::new(7));
        let mut new = Detail::new(DetailType::EmailAddress).with_field(EmailAddress, Value::Str("totally-different@example.com".into()));
        new.set_database_id(contacts_types::DetailId::new(7));

        let delta = determine_contact_detail_delta(&[old], &[new], &DeltaOptions::default());
        assert_eq!(delta.modifications.len(), 1);
        assert_eq!(delta.modifications[0].database_id(), Some(contacts_types::DetailId::new(7)));
    }

    #[test]
    fn new_addition_gets_a_fresh_database_id() {
        let delta = determine_contact_detail_delta(&[], &[name("Ann")], &DeltaOptions::default());
        assert_eq!(delta.additions.len(), 1);
        assert!(delta.additions[0].database_id().is_none());
    }

    #[test]
    fn empty_string_is_equivalent_to_absent_field() {
        let old = Detail::new(DetailType::Nickname);
        let new = Detail::new(DetailType::Nickname).with_field(FieldKey::Nickname, Value::Str(String::new()));
        let delta = determine_contact_detail_delta(&[old], &[new], &DeltaOptions::default());
        assert!(delta.modifications.is_empty());
        assert!(delta.additions.is_empty());
        assert!(delta.deletions.is_empty());
    }

    #[test]
    fn url_and_equivalent_string_form_match_exactly() {
        let old = Detail::new(DetailType::Avatar).with_field(FieldKey::ImageUrl, Value::Url("https://example.com/a.png".into()));
        let new = Detail::new(DetailType::Avatar).with_field(FieldKey::ImageUrl, Value::Str("https://example.com/a.png".into()));
        let delta = determine_contact_detail_delta(&[old], &[new], &DeltaOptions::default());
        assert!(delta.modifications.is_empty());
    }

    #[test]
    fn deletion_and_addition_of_unrelated_types_stay_separate() {
        let old = vec![name("Ann")];
        let new = vec![Detail::new(DetailType::Hobby).with_field(FieldKey::Hobby, Value::Str("chess".into()))];
        let delta = determine_contact_detail_delta(&old, &new, &DeltaOptions::default());
        assert_eq!(delta.deletions.len(), 1);
        assert_eq!(delta.additions.len(), 1);
        assert!(delta.modifications.is_empty());
    }
}
