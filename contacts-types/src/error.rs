use std::collections::BTreeMap;
use std::fmt;

/// Mirrors the closed error-code enumeration from the external interface
/// (`NoError` is represented by `Result::Ok`, never by a variant here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContactsError {
    #[error("does not exist")]
    DoesNotExist,
    #[error("already exists")]
    AlreadyExists,
    #[error("invalid detail")]
    InvalidDetail,
    #[error("invalid contact type")]
    InvalidContactType,
    #[error("database locked")]
    Locked,
    #[error("detail access denied")]
    DetailAccess,
    #[error("permissions error")]
    Permissions,
    #[error("out of memory")]
    OutOfMemory,
    #[error("not supported")]
    NotSupported,
    #[error("bad argument")]
    BadArgument,
    #[error("unspecified error")]
    Unspecified,
    #[error("limit reached")]
    LimitReached,
    #[error("invalid collection")]
    InvalidCollection,
}

pub type ContactsResult<T> = Result<T, ContactsError>;

/// `(overall error, per-index error map)` as specified by the batch error
/// handling policy in spec.md §7. An empty `per_index` with `overall` set
/// means a transactional failure (rollback, no single entry singled out).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchResult<T> {
    pub values: Vec<T>,
    pub overall: Option<ContactsError>,
    pub per_index: BTreeMap<usize, ContactsError>,
}

impl<T> BatchResult<T> {
    pub fn ok(values: Vec<T>) -> Self {
        Self {
            values,
            overall: None,
            per_index: BTreeMap::new(),
        }
    }

    pub fn record_error(&mut self, index: usize, error: ContactsError) {
        if self.overall.is_none() {
            self.overall = Some(error);
        }
        self.per_index.insert(index, error);
    }

    pub fn is_ok(&self) -> bool {
        self.overall.is_none()
    }

    pub fn rollback(overall: ContactsError) -> Self {
        Self {
            values: Vec::new(),
            overall: Some(overall),
            per_index: BTreeMap::new(),
        }
    }
}

impl fmt::Display for ContactsResultSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s), overall={:?}", self.count, self.overall)
    }
}

/// Small summary used in logging; not part of the public result contract.
pub struct ContactsResultSummary {
    pub count: usize,
    pub overall: Option<ContactsError>,
}

impl<T> From<&BatchResult<T>> for ContactsResultSummary {
    fn from(r: &BatchResult<T>) -> Self {
        ContactsResultSummary {
            count: r.per_index.len(),
            overall: r.overall,
        }
    }
}
