use contacts_types::ContactsError;

pub type StorageResult<T> = Result<T, ContactsError>;

/// Maps a backing-store error onto the closed error-code enumeration
/// (spec.md §6). `SQLITE_BUSY`/`SQLITE_LOCKED` become `Locked`; anything else
/// is `Unspecified`, matching spec.md §7 ("database open failure... all
/// subsequent async requests finish with UnspecifiedError").
pub fn map_sqlite_err(err: impl Into<SourceError>) -> ContactsError {
    match err.into() {
        SourceError::Sqlite(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::DatabaseBusy
                || e.code == rusqlite::ErrorCode::DatabaseLocked =>
        {
            ContactsError::Locked
        }
        SourceError::Sqlite(rusqlite::Error::QueryReturnedNoRows) => ContactsError::DoesNotExist,
        SourceError::Contacts(e) => e,
        _ => ContactsError::Unspecified,
    }
}

/// A thin adapter so `map_sqlite_err` can take either a `rusqlite::Error` or
/// a `ContactsError` (already-mapped errors pass through unchanged).
pub enum SourceError {
    Sqlite(rusqlite::Error),
    Contacts(ContactsError),
}

impl From<rusqlite::Error> for SourceError {
    fn from(e: rusqlite::Error) -> Self {
        SourceError::Sqlite(e)
    }
}

impl From<ContactsError> for SourceError {
    fn from(e: ContactsError) -> Self {
        SourceError::Contacts(e)
    }
}
