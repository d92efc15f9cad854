use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::change_flags::ChangeFlags;
use crate::ids::{CollectionId, ContactId, DatabaseId, DetailId};

/// The closed detail-type enumeration (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DetailType {
    Name,
    PhoneNumber,
    EmailAddress,
    Address,
    Avatar,
    Presence,
    Nickname,
    OnlineAccount,
    Organization,
    Hobby,
    DisplayLabel,
    Favorite,
    /// Read-only/composed detail ignored by the delta engine by default.
    Deactivated,
    /// Read-only/composed detail ignored by the delta engine by default.
    StatusFlags,
}

impl DetailType {
    pub const ALL: &'static [DetailType] = &[
        DetailType::Name,
        DetailType::PhoneNumber,
        DetailType::EmailAddress,
        DetailType::Address,
        DetailType::Avatar,
        DetailType::Presence,
        DetailType::Nickname,
        DetailType::OnlineAccount,
        DetailType::Organization,
        DetailType::Hobby,
        DetailType::DisplayLabel,
        DetailType::Favorite,
        DetailType::Deactivated,
        DetailType::StatusFlags,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DetailType::Name => "Name",
            DetailType::PhoneNumber => "PhoneNumber",
            DetailType::EmailAddress => "EmailAddress",
            DetailType::Address => "Address",
            DetailType::Avatar => "Avatar",
            DetailType::Presence => "Presence",
            DetailType::Nickname => "Nickname",
            DetailType::OnlineAccount => "OnlineAccount",
            DetailType::Organization => "Organization",
            DetailType::Hobby => "Hobby",
            DetailType::DisplayLabel => "DisplayLabel",
            DetailType::Favorite => "Favorite",
            DetailType::Deactivated => "Deactivated",
            DetailType::StatusFlags => "StatusFlags",
        }
    }
}

impl std::str::FromStr for DetailType {
    type Err = crate::error::ContactsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DetailType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or(crate::error::ContactsError::InvalidDetail)
    }
}

impl std::fmt::Display for DetailType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field keys: the common extended fields shared by every detail type, plus
/// the type-specific fields. Kept as one flat enum (rather than `(type, int)`
/// pairs as in the original) because Rust's closed-enum-plus-match gives the
/// same "this field only makes sense on that detail type" guarantee the
/// original's integer field ids relied on convention for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum FieldKey {
    // Common extended fields (spec.md §3).
    Modifiable,
    Nonexportable,
    ChangeFlags,
    DatabaseId,
    Provenance,
    DetailUri,
    LinkedDetailUris,

    // Name
    FirstName,
    LastName,
    MiddleName,

    // PhoneNumber
    PhoneNumber,
    PhoneNormalizedNumber,

    // EmailAddress
    EmailAddress,

    // Address
    Street,
    Locality,
    Region,
    Postcode,
    Country,

    // Avatar
    ImageUrl,

    // Presence
    PresenceState,
    PresenceMessage,

    // Nickname
    Nickname,

    // OnlineAccount
    AccountUri,
    ServiceProvider,

    // Organization
    OrganizationName,
    Title,

    // Hobby
    Hobby,

    // DisplayLabel
    Label,
    LabelGroup,

    // Favorite
    IsFavorite,
}

/// A detail field value. `Url` is kept distinct from `Str` so the delta
/// engine's "URL equivalent to its string form" tolerance (spec.md §4.C) has
/// something to key off; every other backend just treats it as text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Str(String),
    IntList(Vec<i64>),
    Url(String),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            Value::Url(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int_list(&self) -> Option<&[i64]> {
        match self {
            Value::IntList(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// True if this value is "empty" in the sense used by the delta engine's
    /// equivalence rules: an absent field, an empty string, or an empty
    /// ordered-int-sequence (spec.md §4.C step 2).
    pub fn is_empty_equivalent(&self) -> bool {
        match self {
            Value::Str(s) | Value::Url(s) => s.is_empty(),
            Value::IntList(v) => v.is_empty(),
            Value::Bool(_) | Value::Int(_) => false,
        }
    }
}

/// A tagged detail record (spec.md §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detail {
    pub detail_type: DetailType,
    pub fields: BTreeMap<FieldKey, Value>,
}

impl Detail {
    pub fn new(detail_type: DetailType) -> Self {
        Self {
            detail_type,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: FieldKey, value: Value) -> Self {
        self.fields.insert(key, value);
        self
    }

    pub fn field(&self, key: FieldKey) -> Option<&Value> {
        self.fields.get(&key)
    }

    pub fn database_id(&self) -> Option<DetailId> {
        match self.field(FieldKey::DatabaseId) {
            Some(Value::Int(v)) if *v > 0 => Some(DetailId::new(*v as DatabaseId)),
            _ => None,
        }
    }

    pub fn set_database_id(&mut self, id: DetailId) {
        self.fields
            .insert(FieldKey::DatabaseId, Value::Int(id.get() as i64));
    }

    /// Addition implies `DatabaseId` is cleared (spec.md §3 invariant 4).
    pub fn clear_database_id(&mut self) {
        self.fields.remove(&FieldKey::DatabaseId);
    }

    pub fn provenance(&self) -> Option<ContactId> {
        match self.field(FieldKey::Provenance) {
            Some(Value::Int(v)) if *v > 0 => Some(ContactId::new(*v as DatabaseId)),
            _ => None,
        }
    }

    pub fn set_provenance(&mut self, constituent: ContactId) {
        self.fields
            .insert(FieldKey::Provenance, Value::Int(constituent.get() as i64));
    }

    pub fn change_flags(&self) -> ChangeFlags {
        match self.field(FieldKey::ChangeFlags) {
            Some(Value::Int(v)) => ChangeFlags::from_bits(*v as u8),
            _ => ChangeFlags::CLEAN,
        }
    }

    pub fn set_change_flags(&mut self, flags: ChangeFlags) {
        self.fields
            .insert(FieldKey::ChangeFlags, Value::Int(flags.bits() as i64));
    }
}

/// A contact: an unordered bag of details plus identity and change-flags
/// (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: ContactId,
    pub collection_id: CollectionId,
    pub details: Vec<Detail>,
    pub change_flags: ChangeFlags,
}

impl Contact {
    pub fn new(id: ContactId, collection_id: CollectionId) -> Self {
        Self {
            id,
            collection_id,
            details: Vec::new(),
            change_flags: ChangeFlags::CLEAN,
        }
    }

    pub fn details_of_type(&self, detail_type: DetailType) -> impl Iterator<Item = &Detail> {
        self.details
            .iter()
            .filter(move |d| d.detail_type == detail_type)
    }
}

/// A named container of contacts with extended metadata (spec.md §3).
#[derive(Debug, Clone, PartialEq)]
pub struct Collection {
    pub id: CollectionId,
    pub aggregable: bool,
    pub application_name: String,
    pub account_id: i64,
    pub remote_path: Option<String>,
    pub read_only: bool,
}

impl Collection {
    pub fn new(id: CollectionId, application_name: impl Into<String>) -> Self {
        Self {
            id,
            aggregable: false,
            application_name: application_name.into(),
            account_id: 0,
            remote_path: None,
            read_only: false,
        }
    }
}

/// `(first, type, second)` relationship triple (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub first: ContactId,
    pub relationship_type: String,
    pub second: ContactId,
}

/// The well-known relationship type managed solely by the aggregation engine.
pub const AGGREGATES_RELATIONSHIP: &str = "Aggregates";

impl Relationship {
    pub fn aggregates(aggregate: ContactId, constituent: ContactId) -> Self {
        Relationship {
            first: aggregate,
            relationship_type: AGGREGATES_RELATIONSHIP.to_string(),
            second: constituent,
        }
    }
}
