use std::fmt;

/// The raw 32-bit row id used internally by the backing store and by the
/// notifier's wire-level payloads (spec.md §6 "Ids in payloads are
/// database-internal").
pub type DatabaseId = u32;

macro_rules! db_id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub DatabaseId);

        impl $name {
            pub const fn new(id: DatabaseId) -> Self {
                Self(id)
            }

            pub const fn get(self) -> DatabaseId {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<DatabaseId> for $name {
            fn from(id: DatabaseId) -> Self {
                Self(id)
            }
        }
    };
}

db_id_newtype!(ContactId);
db_id_newtype!(CollectionId);
db_id_newtype!(DetailId);

/// The two well-known sentinel collections (spec.md §3).
pub const AGGREGATE_COLLECTION_ID: CollectionId = CollectionId(1);
pub const LOCAL_COLLECTION_ID: CollectionId = CollectionId(2);

/// Row id reserved for the self contact, which always lives in the local
/// collection (spec.md §3 invariant 3).
pub const SELF_CONTACT_ID: ContactId = ContactId(2);
