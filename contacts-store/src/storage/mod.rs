//! The Storage Adapter (spec.md §4.A): scoped acquisition of a backing
//! database handle, and the typed read/write primitives everything else is
//! built on. Each `StorageAdapter` owns exactly one connection — the engine
//! constructs two (one for the worker thread, one for synchronous callers)
//! against the same file, matching spec.md §5's "separate database handle
//! owned by the engine" requirement.

mod models;
mod schema;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use contacts_types::{
    ChangeFlags, Collection, CollectionId, Contact, ContactId, Detail, DetailId, DetailType,
    FetchHint, FieldKey, Relationship, AGGREGATE_COLLECTION_ID, LOCAL_COLLECTION_ID,
    SELF_CONTACT_ID,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{map_sqlite_err, StorageResult};
pub use models::*;
pub use schema::CURRENT_SCHEMA_VERSION;

/// A change-flags bit predicate fragment, reused by every query that needs
/// to hide tombstoned rows from ordinary reads (spec.md §3 invariant 5).
const NOT_DELETED_SQL: &str = "(change_flags & 4) = 0";

pub struct StorageAdapter {
    conn: Mutex<Connection>,
    path: PathBuf,
    privileged: bool,
}

/// Outcome of `StorageAdapter::open`: whether a fresh schema was created and
/// whether the aggregate collection needs one-shot regeneration (spec.md
/// §4.D "Regeneration").
pub struct OpenOutcome {
    pub schema_created: bool,
    pub needs_aggregate_regeneration: bool,
    pub effective_privileged: bool,
}

impl StorageAdapter {
    /// Opens (creating if necessary) the sqlite-backed store at `path`.
    /// `privileged` is the caller's request; if the file cannot be opened
    /// read-write the adapter silently downgrades and reports that back via
    /// `OpenOutcome::effective_privileged`, per spec.md §4.A.
    pub fn open(path: &Path, privileged: bool, _test_mode: bool) -> StorageResult<(Self, OpenOutcome)> {
        let mut conn = Connection::open(path).map_err(map_sqlite_err)?;
        conn.busy_timeout(Duration::from_secs(5)).map_err(map_sqlite_err)?;
        conn.pragma_update(None, "journal_mode", "WAL").map_err(map_sqlite_err)?;
        conn.pragma_update(None, "foreign_keys", "ON").map_err(map_sqlite_err)?;

        let effective_privileged = if privileged {
            conn.is_readonly(rusqlite::DatabaseName::Main)
                .map(|ro| !ro)
                .unwrap_or(false)
        } else {
            false
        };

        let tx = conn.transaction().map_err(map_sqlite_err)?;
        let schema_created = !schema_exists(&tx)?;
        if schema_created {
            tx.execute_batch(schema::CREATE_SCHEMA_SQL).map_err(map_sqlite_err)?;
            seed_well_known_rows(&tx)?;
        }
        let stored_version: i64 = tx
            .query_row("SELECT version FROM schema_meta WHERE id = 1", [], |r| r.get(0))
            .map_err(map_sqlite_err)?;
        let needs_aggregate_regeneration = stored_version < CURRENT_SCHEMA_VERSION;
        if needs_aggregate_regeneration {
            tx.execute(
                "UPDATE schema_meta SET version = ?1 WHERE id = 1",
                params![CURRENT_SCHEMA_VERSION],
            )
            .map_err(map_sqlite_err)?;
        }
        tx.commit().map_err(map_sqlite_err)?;

        let adapter = StorageAdapter {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            privileged: effective_privileged,
        };
        let outcome = OpenOutcome {
            schema_created,
            needs_aggregate_regeneration,
            effective_privileged,
        };
        Ok((adapter, outcome))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_privileged(&self) -> bool {
        self.privileged
    }

    /// Wraps every mutation in a transaction (spec.md §4.A `withTx`):
    /// commits on `Ok`, rolls back (implicitly, via `Transaction::drop`) on
    /// `Err`.
    pub fn with_tx<T>(
        &self,
        f: impl FnOnce(&rusqlite::Transaction) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(map_sqlite_err)?;
        match f(&tx) {
            Ok(value) => {
                tx.commit().map_err(map_sqlite_err)?;
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    pub fn get_self_contact_id(&self) -> StorageResult<ContactId> {
        let conn = self.conn.lock();
        let id: Option<i64> = conn
            .query_row("SELECT self_contact_id FROM schema_meta WHERE id = 1", [], |r| r.get(0))
            .map_err(map_sqlite_err)?;
        Ok(id.map(|v| ContactId::new(v as u32)).unwrap_or(SELF_CONTACT_ID))
    }

    pub fn set_self_contact_id(&self, id: ContactId) -> StorageResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE schema_meta SET self_contact_id = ?1 WHERE id = 1",
            params![id.get() as i64],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    // ---- collections -------------------------------------------------

    pub fn read_collections(&self) -> StorageResult<Vec<Collection>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, aggregable, application_name, account_id, remote_path, read_only FROM collections ORDER BY id")
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map([], collection_from_row)
            .map_err(map_sqlite_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite_err)
    }

    pub fn read_collection(&self, id: CollectionId) -> StorageResult<Option<Collection>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, aggregable, application_name, account_id, remote_path, read_only FROM collections WHERE id = ?1",
            params![id.get() as i64],
            collection_from_row,
        )
        .optional()
        .map_err(map_sqlite_err)
    }

    /// Inserts a new collection and returns its assigned id.
    pub fn insert_collection_tx(
        tx: &rusqlite::Transaction,
        collection: &Collection,
    ) -> StorageResult<CollectionId> {
        tx.execute(
            "INSERT INTO collections (aggregable, application_name, account_id, remote_path, read_only) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                collection.aggregable as i64,
                collection.application_name,
                collection.account_id,
                collection.remote_path,
                collection.read_only as i64,
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(CollectionId::new(tx.last_insert_rowid() as u32))
    }

    pub fn update_collection_tx(tx: &rusqlite::Transaction, collection: &Collection) -> StorageResult<()> {
        tx.execute(
            "UPDATE collections SET aggregable = ?2, application_name = ?3, account_id = ?4, remote_path = ?5, read_only = ?6 WHERE id = ?1",
            params![
                collection.id.get() as i64,
                collection.aggregable as i64,
                collection.application_name,
                collection.account_id,
                collection.remote_path,
                collection.read_only as i64,
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn remove_collection_tx(tx: &rusqlite::Transaction, id: CollectionId) -> StorageResult<()> {
        tx.execute("DELETE FROM collections WHERE id = ?1", params![id.get() as i64])
            .map_err(map_sqlite_err)?;
        Ok(())
    }

    // ---- contacts ------------------------------------------------------

    pub fn read_contact_ids(
        &self,
        collection_id: Option<CollectionId>,
        include_deleted: bool,
    ) -> StorageResult<Vec<ContactId>> {
        let conn = self.conn.lock();
        let mut sql = String::from("SELECT id FROM contacts WHERE 1 = 1");
        if !include_deleted {
            sql.push_str(" AND ");
            sql.push_str(NOT_DELETED_SQL);
        }
        if collection_id.is_some() {
            sql.push_str(" AND collection_id = ?1");
        }
        sql.push_str(" ORDER BY id");
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite_err)?;
        let ids: Vec<ContactId> = if let Some(cid) = collection_id {
            stmt.query_map(params![cid.get() as i64], |r| r.get::<_, i64>(0))
                .map_err(map_sqlite_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_sqlite_err)?
        } else {
            stmt.query_map([], |r| r.get::<_, i64>(0))
                .map_err(map_sqlite_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_sqlite_err)?
        }
        .into_iter()
        .map(|v| ContactId::new(v as u32))
        .collect();
        Ok(ids)
    }

    pub fn read_contacts_by_ids(
        &self,
        ids: &[ContactId],
        hint: &FetchHint,
        include_deleted: bool,
    ) -> StorageResult<Vec<Contact>> {
        let conn = self.conn.lock();
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            let mut sql = String::from("SELECT id, collection_id, change_flags FROM contacts WHERE id = ?1");
            if !include_deleted {
                sql.push_str(" AND ");
                sql.push_str(NOT_DELETED_SQL);
            }
            let contact = conn
                .query_row(&sql, params![id.get() as i64], contact_shell_from_row)
                .optional()
                .map_err(map_sqlite_err)?;
            if let Some(mut contact) = contact {
                contact.details = read_contact_details(&conn, id, hint, include_deleted)?;
                out.push(contact);
            }
        }
        Ok(out)
    }

    pub fn read_contacts_in_collection(
        &self,
        collection_id: CollectionId,
        hint: &FetchHint,
        include_deleted: bool,
    ) -> StorageResult<Vec<Contact>> {
        let ids = self.read_contact_ids(Some(collection_id), include_deleted)?;
        self.read_contacts_by_ids(&ids, hint, include_deleted)
    }

    pub fn read_all_contacts(&self, hint: &FetchHint, include_deleted: bool) -> StorageResult<Vec<Contact>> {
        let ids = self.read_contact_ids(None, include_deleted)?;
        self.read_contacts_by_ids(&ids, hint, include_deleted)
    }

    /// Inserts a constituent/aggregate shell row (no details). Returns the
    /// assigned id.
    pub fn insert_contact_tx(
        tx: &rusqlite::Transaction,
        collection_id: CollectionId,
        change_flags: ChangeFlags,
    ) -> StorageResult<ContactId> {
        tx.execute(
            "INSERT INTO contacts (collection_id, change_flags) VALUES (?1, ?2)",
            params![collection_id.get() as i64, change_flags.bits() as i64],
        )
        .map_err(map_sqlite_err)?;
        Ok(ContactId::new(tx.last_insert_rowid() as u32))
    }

    pub fn set_contact_change_flags_tx(
        tx: &rusqlite::Transaction,
        id: ContactId,
        flags: ChangeFlags,
    ) -> StorageResult<()> {
        tx.execute(
            "UPDATE contacts SET change_flags = ?2 WHERE id = ?1",
            params![id.get() as i64, flags.bits() as i64],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn contact_change_flags_tx(tx: &rusqlite::Transaction, id: ContactId) -> StorageResult<ChangeFlags> {
        let bits: i64 = tx
            .query_row("SELECT change_flags FROM contacts WHERE id = ?1", params![id.get() as i64], |r| r.get(0))
            .map_err(map_sqlite_err)?;
        Ok(ChangeFlags::from_bits(bits as u8))
    }

    pub fn physically_remove_contact_tx(tx: &rusqlite::Transaction, id: ContactId) -> StorageResult<()> {
        tx.execute("DELETE FROM details WHERE contact_id = ?1", params![id.get() as i64])
            .map_err(map_sqlite_err)?;
        tx.execute("DELETE FROM contacts WHERE id = ?1", params![id.get() as i64])
            .map_err(map_sqlite_err)?;
        tx.execute(
            "DELETE FROM relationships WHERE first_id = ?1 OR second_id = ?1",
            params![id.get() as i64],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    // ---- details --------------------------------------------------------

    pub fn replace_contact_details_tx(
        tx: &rusqlite::Transaction,
        contact_id: ContactId,
        details: &[Detail],
    ) -> StorageResult<()> {
        tx.execute("DELETE FROM details WHERE contact_id = ?1", params![contact_id.get() as i64])
            .map_err(map_sqlite_err)?;
        for detail in details {
            Self::insert_detail_tx(tx, contact_id, detail)?;
        }
        Ok(())
    }

    /// Like [`Self::replace_contact_details_tx`] but scoped to a single
    /// `detail_type`: rows of every other type on `contact_id` are left
    /// untouched. Used by the aggregation engine's presence-only fast path
    /// (spec.md §4.D), which must not disturb the other promoted detail
    /// types while re-unioning `Presence`.
    pub fn replace_contact_details_of_type_tx(
        tx: &rusqlite::Transaction,
        contact_id: ContactId,
        detail_type: DetailType,
        details: &[Detail],
    ) -> StorageResult<()> {
        tx.execute(
            "DELETE FROM details WHERE contact_id = ?1 AND detail_type = ?2",
            params![contact_id.get() as i64, detail_type.as_str()],
        )
        .map_err(map_sqlite_err)?;
        for detail in details {
            Self::insert_detail_tx(tx, contact_id, detail)?;
        }
        Ok(())
    }

    pub fn insert_detail_tx(
        tx: &rusqlite::Transaction,
        contact_id: ContactId,
        detail: &Detail,
    ) -> StorageResult<DetailId> {
        let fields_json = detail_fields_json(detail);
        tx.execute(
            "INSERT INTO details (contact_id, detail_type, fields_json, change_flags) VALUES (?1, ?2, ?3, ?4)",
            params![
                contact_id.get() as i64,
                detail.detail_type.as_str(),
                fields_json,
                detail.change_flags().bits() as i64,
            ],
        )
        .map_err(map_sqlite_err)?;
        Ok(DetailId::new(tx.last_insert_rowid() as u32))
    }

    pub fn update_detail_tx(tx: &rusqlite::Transaction, detail_id: DetailId, detail: &Detail) -> StorageResult<()> {
        let fields_json = detail_fields_json(detail);
        tx.execute(
            "UPDATE details SET fields_json = ?2, change_flags = ?3 WHERE id = ?1",
            params![detail_id.get() as i64, fields_json, detail.change_flags().bits() as i64],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn remove_detail_tx(tx: &rusqlite::Transaction, detail_id: DetailId) -> StorageResult<()> {
        tx.execute("DELETE FROM details WHERE id = ?1", params![detail_id.get() as i64])
            .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn set_detail_change_flags_tx(
        tx: &rusqlite::Transaction,
        detail_id: DetailId,
        flags: ChangeFlags,
    ) -> StorageResult<()> {
        tx.execute(
            "UPDATE details SET change_flags = ?2 WHERE id = ?1",
            params![detail_id.get() as i64, flags.bits() as i64],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    /// Projects a single detail type across every non-deleted contact,
    /// optionally sorted by one of the detail's own fields (spec.md §4.E
    /// `readDetails`).
    pub fn read_details_of_type(
        &self,
        detail_type: DetailType,
        sort_field: Option<FieldKey>,
        ascending: bool,
    ) -> StorageResult<Vec<(ContactId, Detail)>> {
        let conn = self.conn.lock();
        let mut sql = String::from(
            "SELECT d.id, d.contact_id, d.detail_type, d.fields_json, d.change_flags \
             FROM details d JOIN contacts c ON c.id = d.contact_id \
             WHERE d.detail_type = ?1 AND (d.change_flags & 4) = 0 AND (c.change_flags & 4) = 0",
        );
        if let Some(field) = sort_field {
            let key = field_key_json_name(field);
            // `key` is one of a closed, compile-time-known set of Rust
            // identifiers (see `FieldKey`), never user input.
            sql.push_str(&format!(
                " ORDER BY json_extract(d.fields_json, '$.{key}') {dir}",
                dir = if ascending { "ASC" } else { "DESC" }
            ));
        }
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params![detail_type.as_str()], detail_from_sqlite_row)
            .map_err(map_sqlite_err)?;
        let mut out = Vec::new();
        for row in rows {
            let (id, contact_id, detail_type, fields_json, change_flags) = row.map_err(map_sqlite_err)?;
            let detail = detail_from_row(id, &detail_type, &fields_json, change_flags)?;
            out.push((ContactId::new(contact_id as u32), detail));
        }
        Ok(out)
    }

    // ---- relationships --------------------------------------------------

    pub fn read_relationships(
        &self,
        relationship_type: Option<&str>,
        first: Option<ContactId>,
        second: Option<ContactId>,
    ) -> StorageResult<Vec<Relationship>> {
        let conn = self.conn.lock();
        let mut sql = String::from("SELECT first_id, rel_type, second_id FROM relationships WHERE 1 = 1");
        if relationship_type.is_some() {
            sql.push_str(" AND rel_type = ?1");
        }
        if first.is_some() {
            sql.push_str(" AND first_id = ?2");
        }
        if second.is_some() {
            sql.push_str(" AND second_id = ?3");
        }
        let mut stmt = conn.prepare(&sql).map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(
                params![
                    relationship_type.unwrap_or(""),
                    first.map(|c| c.get() as i64).unwrap_or(0),
                    second.map(|c| c.get() as i64).unwrap_or(0),
                ],
                relationship_from_row,
            )
            .map_err(map_sqlite_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite_err)
    }

    pub fn insert_relationship_tx(tx: &rusqlite::Transaction, rel: &Relationship) -> StorageResult<()> {
        tx.execute(
            "INSERT OR IGNORE INTO relationships (first_id, rel_type, second_id) VALUES (?1, ?2, ?3)",
            params![rel.first.get() as i64, rel.relationship_type, rel.second.get() as i64],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn remove_relationship_tx(tx: &rusqlite::Transaction, rel: &Relationship) -> StorageResult<()> {
        tx.execute(
            "DELETE FROM relationships WHERE first_id = ?1 AND rel_type = ?2 AND second_id = ?3",
            params![rel.first.get() as i64, rel.relationship_type, rel.second.get() as i64],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    pub fn remove_relationships_for_contact_tx(tx: &rusqlite::Transaction, id: ContactId) -> StorageResult<()> {
        tx.execute(
            "DELETE FROM relationships WHERE first_id = ?1 OR second_id = ?1",
            params![id.get() as i64],
        )
        .map_err(map_sqlite_err)?;
        Ok(())
    }

    // ---- out-of-band key/value -------------------------------------------

    pub fn fetch_oob(&self, scope: &str, keys: Option<&[String]>) -> StorageResult<BTreeMap<String, String>> {
        let conn = self.conn.lock();
        let mut out = BTreeMap::new();
        if let Some(keys) = keys {
            for key in keys {
                if let Some(value) = conn
                    .query_row(
                        "SELECT value FROM oob WHERE scope = ?1 AND key = ?2",
                        params![scope, key],
                        |r| r.get::<_, String>(0),
                    )
                    .optional()
                    .map_err(map_sqlite_err)?
                {
                    out.insert(key.clone(), value);
                }
            }
        } else {
            let mut stmt = conn
                .prepare("SELECT key, value FROM oob WHERE scope = ?1")
                .map_err(map_sqlite_err)?;
            let rows = stmt
                .query_map(params![scope], |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)))
                .map_err(map_sqlite_err)?;
            for row in rows {
                let (k, v) = row.map_err(map_sqlite_err)?;
                out.insert(k, v);
            }
        }
        Ok(out)
    }

    pub fn fetch_oob_keys(&self, scope: &str) -> StorageResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT key FROM oob WHERE scope = ?1 ORDER BY key")
            .map_err(map_sqlite_err)?;
        let rows = stmt
            .query_map(params![scope], |r| r.get::<_, String>(0))
            .map_err(map_sqlite_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(map_sqlite_err)
    }

    pub fn store_oob(&self, scope: &str, entries: &[(String, String)]) -> StorageResult<()> {
        self.with_tx(|tx| {
            for (key, value) in entries {
                tx.execute(
                    "INSERT INTO oob (scope, key, value) VALUES (?1, ?2, ?3) \
                     ON CONFLICT(scope, key) DO UPDATE SET value = excluded.value",
                    params![scope, key, value],
                )
                .map_err(map_sqlite_err)?;
            }
            Ok(())
        })
    }

    pub fn remove_oob(&self, scope: &str, keys: Option<&[String]>) -> StorageResult<()> {
        self.with_tx(|tx| {
            match keys {
                Some(keys) => {
                    for key in keys {
                        tx.execute("DELETE FROM oob WHERE scope = ?1 AND key = ?2", params![scope, key])
                            .map_err(map_sqlite_err)?;
                    }
                }
                None => {
                    tx.execute("DELETE FROM oob WHERE scope = ?1", params![scope])
                        .map_err(map_sqlite_err)?;
                }
            }
            Ok(())
        })
    }
}

fn read_contact_details(
    conn: &Connection,
    contact_id: ContactId,
    hint: &FetchHint,
    include_deleted: bool,
) -> StorageResult<Vec<Detail>> {
    let mut sql = String::from(
        "SELECT id, contact_id, detail_type, fields_json, change_flags FROM details WHERE contact_id = ?1",
    );
    if !include_deleted {
        sql.push_str(" AND ");
        sql.push_str(NOT_DELETED_SQL);
    }
    sql.push_str(" ORDER BY id");
    let mut stmt = conn.prepare(&sql).map_err(map_sqlite_err)?;
    let rows = stmt
        .query_map(params![contact_id.get() as i64], detail_from_sqlite_row)
        .map_err(map_sqlite_err)?;
    let mut out = Vec::new();
    for row in rows {
        let (id, _contact_id, detail_type, fields_json, change_flags) = row.map_err(map_sqlite_err)?;
        let detail_type_parsed: DetailType = detail_type.parse().map_err(map_sqlite_err)?;
        if !hint.wants(detail_type_parsed) {
            continue;
        }
        out.push(detail_from_row(id, &detail_type, &fields_json, change_flags)?);
    }
    Ok(out)
}

/// Transaction-scoped variant of `read_contact_details`, for callers (the
/// writer's delta computation) that need to read the current rows as part
/// of a larger transaction rather than through a fresh connection lock.
pub fn read_contact_details_tx(
    tx: &rusqlite::Transaction,
    contact_id: ContactId,
    include_deleted: bool,
) -> StorageResult<Vec<Detail>> {
    read_contact_details(tx, contact_id, &FetchHint::default(), include_deleted)
}

fn field_key_json_name(field: FieldKey) -> String {
    match serde_json::to_value(field) {
        Ok(serde_json::Value::String(name)) => name,
        _ => unreachable!("FieldKey always serializes to a JSON string"),
    }
}

fn schema_exists(tx: &rusqlite::Transaction) -> StorageResult<bool> {
    let count: i64 = tx
        .query_row(
            "SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_meta'",
            [],
            |r| r.get(0),
        )
        .map_err(map_sqlite_err)?;
    Ok(count > 0)
}

fn seed_well_known_rows(tx: &rusqlite::Transaction) -> StorageResult<()> {
    tx.execute(
        "INSERT INTO schema_meta (id, version, uuid, self_contact_id) VALUES (1, ?1, ?2, NULL)",
        params![CURRENT_SCHEMA_VERSION, uuid::Uuid::new_v4().to_string()],
    )
    .map_err(map_sqlite_err)?;

    // The two sentinel collections (spec.md §3). Row ids are assigned by
    // AUTOINCREMENT; inserting them first in this order matches the
    // well-known ids `AGGREGATE_COLLECTION_ID` / `LOCAL_COLLECTION_ID`.
    tx.execute(
        "INSERT INTO collections (id, aggregable, application_name, account_id, remote_path, read_only) VALUES (?1, 0, 'aggregate', 0, NULL, 1)",
        params![AGGREGATE_COLLECTION_ID.get() as i64],
    )
    .map_err(map_sqlite_err)?;
    tx.execute(
        "INSERT INTO collections (id, aggregable, application_name, account_id, remote_path, read_only) VALUES (?1, 1, 'local', 0, NULL, 0)",
        params![LOCAL_COLLECTION_ID.get() as i64],
    )
    .map_err(map_sqlite_err)?;

    // The self contact always exists, in the local collection (spec.md §3
    // invariant 3).
    tx.execute(
        "INSERT INTO contacts (id, collection_id, change_flags) VALUES (?1, ?2, 0)",
        params![SELF_CONTACT_ID.get() as i64, LOCAL_COLLECTION_ID.get() as i64],
    )
    .map_err(map_sqlite_err)?;
    tx.execute(
        "UPDATE schema_meta SET self_contact_id = ?1 WHERE id = 1",
        params![SELF_CONTACT_ID.get() as i64],
    )
    .map_err(map_sqlite_err)?;

    Ok(())
}
