//! Data model, error codes, and change-flags shared by every layer of the
//! contacts store engine. See `contacts-store` for the engine itself.

pub mod change_flags;
pub mod error;
pub mod fetch;
pub mod ids;
pub mod model;

pub use change_flags::ChangeFlags;
pub use error::{BatchResult, ContactsError, ContactsResult};
pub use fetch::{ContactFilter, FetchHint, SortDirection, SortSpec};
pub use ids::{CollectionId, ContactId, DatabaseId, DetailId, AGGREGATE_COLLECTION_ID, LOCAL_COLLECTION_ID, SELF_CONTACT_ID};
pub use model::{Collection, Contact, Detail, DetailType, FieldKey, Relationship, Value, AGGREGATES_RELATIONSHIP};
