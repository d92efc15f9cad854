//! DDL for the backing relational store. The exact schema text is an
//! external collaborator per spec.md §1 ("the SQL schema, concrete SQL
//! text... out of scope"); this is one reasonable shape for it. Detail
//! fields are kept in a JSON column rather than one table per detail type:
//! the delta engine and aggregation engine only ever see typed `Detail`
//! values reconstructed from this row, never the column layout itself.

pub const CURRENT_SCHEMA_VERSION: i64 = 1;

pub const CREATE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    uuid TEXT NOT NULL,
    self_contact_id INTEGER
);

CREATE TABLE IF NOT EXISTS collections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    aggregable INTEGER NOT NULL DEFAULT 0,
    application_name TEXT NOT NULL,
    account_id INTEGER NOT NULL DEFAULT 0,
    remote_path TEXT,
    read_only INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection_id INTEGER NOT NULL REFERENCES collections(id),
    change_flags INTEGER NOT NULL DEFAULT 1
);
CREATE INDEX IF NOT EXISTS contacts_collection_id_idx ON contacts(collection_id);

CREATE TABLE IF NOT EXISTS details (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    contact_id INTEGER NOT NULL REFERENCES contacts(id),
    detail_type TEXT NOT NULL,
    fields_json TEXT NOT NULL,
    change_flags INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS details_contact_id_idx ON details(contact_id);
CREATE INDEX IF NOT EXISTS details_type_idx ON details(detail_type);

CREATE TABLE IF NOT EXISTS relationships (
    first_id INTEGER NOT NULL,
    rel_type TEXT NOT NULL,
    second_id INTEGER NOT NULL,
    PRIMARY KEY (first_id, rel_type, second_id)
);
CREATE INDEX IF NOT EXISTS relationships_second_idx ON relationships(second_id, rel_type);

CREATE TABLE IF NOT EXISTS oob (
    scope TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    PRIMARY KEY (scope, key)
);
"#;
