//! Datastore contract consumed by entities, plus reference adapters.
//!
//! # Responsibility
//! - Define the opaque storage service entities persist through.
//! - Provide an in-memory adapter and a SQLite adapter implementing it.
//!
//! # Invariants
//! - `put` persists the full property map of one record atomically.
//! - `put` returns the assigned identifier when the record had none.
//! - `find_custom` returns records matching *every* condition by equality.

use crate::db::DbError;
use crate::model::kind::Kind;
use crate::model::value::{Conditions, Properties, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory;
mod sqlite;

pub use memory::{MemoryDatastore, StoreCall};
pub use sqlite::SqliteDatastore;

/// Property holding a record's identifier.
pub const ID_FIELD: &str = "id";

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer failures surfaced unchanged to entity callers.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    InvalidData(String),
    Serialization(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored record: {message}"),
            Self::Serialization(message) => write!(f, "record serialization failed: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::Serialization(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// One stored record as returned by lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: Kind,
    pub properties: Properties,
}

impl Record {
    pub fn new(kind: Kind, properties: Properties) -> Self {
        Self { kind, properties }
    }

    pub fn id(&self) -> Option<&Value> {
        self.properties.get(ID_FIELD).filter(|id| !id.is_null())
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.properties.get(field)
    }

    /// Equality match against every condition; an empty filter matches all.
    ///
    /// A `Null` condition matches both an explicit null and an absent field.
    pub fn matches(&self, conditions: &Conditions) -> bool {
        conditions
            .iter()
            .all(|(field, expected)| match self.properties.get(field) {
                Some(actual) => actual == expected,
                None => expected.is_null(),
            })
    }
}

/// Storage service an entity persists through.
///
/// Calls are synchronous and blocking; retries, timeouts and cancellation
/// belong to the implementation.
pub trait Datastore {
    /// Persists all `properties` of one record of `kind`.
    ///
    /// Returns `Some(id)` when an identifier was assigned to a new record.
    fn put(&self, kind: &Kind, properties: &Properties) -> StoreResult<Option<Value>>;

    /// Point lookup by identifier.
    fn find(&self, kind: &Kind, id: &Value) -> StoreResult<Option<Record>>;

    /// Equality-filtered scan.
    fn find_custom(&self, kind: &Kind, conditions: &Conditions) -> StoreResult<Vec<Record>>;
}
