use std::collections::BTreeMap;
use std::str::FromStr;

use contacts_types::{
    ChangeFlags, Collection, CollectionId, Contact, ContactId, Detail, DetailId, DetailType,
    FieldKey, Relationship, Value,
};
use rusqlite::Row;

use crate::error::{map_sqlite_err, StorageResult};

/// Reconstructs a `Detail` from its row columns, re-inserting the
/// database-id and change-flags fields that are stored in dedicated columns
/// rather than in the JSON blob (spec.md §3 invariant 4: a detail carries at
/// most one `DatabaseId`).
pub fn detail_from_row(
    id: i64,
    detail_type: &str,
    fields_json: &str,
    change_flags: i64,
) -> StorageResult<Detail> {
    let detail_type = DetailType::from_str(detail_type).map_err(map_sqlite_err)?;
    let mut fields: BTreeMap<FieldKey, Value> =
        serde_json::from_str(fields_json).unwrap_or_default();
    fields.insert(FieldKey::DatabaseId, Value::Int(id));
    fields.insert(FieldKey::ChangeFlags, Value::Int(change_flags));
    Ok(Detail {
        detail_type,
        fields,
    })
}

pub fn detail_from_sqlite_row(row: &Row<'_>) -> rusqlite::Result<(i64, i64, String, String, i64)> {
    Ok((
        row.get(0)?, // id
        row.get(1)?, // contact_id
        row.get(2)?, // detail_type
        row.get(3)?, // fields_json
        row.get(4)?, // change_flags
    ))
}

/// Serializes a detail's non-column fields to JSON for storage.
pub fn detail_fields_json(detail: &Detail) -> String {
    let mut fields = detail.fields.clone();
    fields.remove(&FieldKey::DatabaseId);
    fields.remove(&FieldKey::ChangeFlags);
    serde_json::to_string(&fields).unwrap_or_else(|_| "{}".to_string())
}

pub fn collection_from_row(row: &Row<'_>) -> rusqlite::Result<Collection> {
    let id: i64 = row.get(0)?;
    Ok(Collection {
        id: CollectionId::new(id as u32),
        aggregable: row.get::<_, i64>(1)? != 0,
        application_name: row.get(2)?,
        account_id: row.get(3)?,
        remote_path: row.get(4)?,
        read_only: row.get::<_, i64>(5)? != 0,
    })
}

pub fn relationship_from_row(row: &Row<'_>) -> rusqlite::Result<Relationship> {
    let first: i64 = row.get(0)?;
    let second: i64 = row.get(2)?;
    Ok(Relationship {
        first: ContactId::new(first as u32),
        relationship_type: row.get(1)?,
        second: ContactId::new(second as u32),
    })
}

pub fn contact_shell_from_row(row: &Row<'_>) -> rusqlite::Result<Contact> {
    let id: i64 = row.get(0)?;
    let collection_id: i64 = row.get(1)?;
    let change_flags: i64 = row.get(2)?;
    let mut contact = Contact::new(
        ContactId::new(id as u32),
        CollectionId::new(collection_id as u32),
    );
    contact.change_flags = ChangeFlags::from_bits(change_flags as u8);
    Ok(contact)
}

pub fn detail_id_from(detail: &Detail) -> Option<DetailId> {
    detail.database_id()
}
