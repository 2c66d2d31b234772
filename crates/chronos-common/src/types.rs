//! Core identity types for Chronos
//!
//! Every persisted metadata or data object is identified by a [`Surrogate`]:
//! the database it lives in, the kind of object, and the internal id the
//! backend assigned to it. Objects that have not been persisted yet carry a
//! surrogate "in construction" which is upgraded exactly once.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Identity of a database instance
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, From, Into)]
pub struct DatabaseId(Uuid);

impl DatabaseId {
    /// Database owning the built-in value types and properties
    pub const BUILTIN: Self = Self(Uuid::nil());

    /// Generate a new random database ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for DatabaseId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatabaseId({})", self.0)
    }
}

impl fmt::Display for DatabaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of object a surrogate designates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    #[display("schema")]
    Schema,
    #[display("property")]
    Property,
    #[display("value_type")]
    ValueType,
    #[display("chronicle")]
    Chronicle,
    #[display("series")]
    Series,
}

/// Committed, hashable identity of a persisted object
///
/// This is what caches and indexes key on. It can only be obtained from a
/// [`Surrogate`] whose id has been assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[display("{kind}#{id}@{database}")]
pub struct SurrogateKey {
    pub database: DatabaseId,
    pub kind: ObjectKind,
    pub id: u64,
}

/// Lifecycle state of a surrogate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SurrogateState {
    /// Object not persisted yet, no id assigned
    Pending,
    /// Object persisted under the given id
    Committed(u64),
}

/// Identity handle of a metadata or data object
///
/// Two surrogates are equal iff they designate the same database, the same
/// kind and the same assigned id. A surrogate in construction is never equal
/// to anything, and hashing one is a programming error. Equality is
/// therefore not reflexive and `Surrogate` is not `Eq`; maps and sets key on
/// [`SurrogateKey`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Surrogate {
    database: DatabaseId,
    kind: ObjectKind,
    state: SurrogateState,
}

impl Surrogate {
    /// Surrogate of an object in construction
    #[must_use]
    pub const fn pending(database: DatabaseId, kind: ObjectKind) -> Self {
        Self {
            database,
            kind,
            state: SurrogateState::Pending,
        }
    }

    /// Surrogate of a persisted object
    #[must_use]
    pub const fn committed(database: DatabaseId, kind: ObjectKind, id: u64) -> Self {
        Self {
            database,
            kind,
            state: SurrogateState::Committed(id),
        }
    }

    #[must_use]
    pub const fn database(&self) -> DatabaseId {
        self.database
    }

    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        self.kind
    }

    #[must_use]
    pub const fn state(&self) -> SurrogateState {
        self.state
    }

    /// Assigned id, absent while in construction
    #[must_use]
    pub const fn id(&self) -> Option<u64> {
        match self.state {
            SurrogateState::Pending => None,
            SurrogateState::Committed(id) => Some(id),
        }
    }

    #[must_use]
    pub const fn is_in_construction(&self) -> bool {
        matches!(self.state, SurrogateState::Pending)
    }

    /// Make the surrogate permanent with the id assigned by the backend.
    ///
    /// This is the only mutation a surrogate undergoes and it is legal once.
    pub fn upgrade(&mut self, id: u64) -> Result<()> {
        if let SurrogateState::Committed(current) = self.state {
            return Err(Error::AlreadyCommitted {
                kind: self.kind,
                id: current,
            });
        }
        if id == 0 {
            return Err(Error::invalid_argument(format!(
                "{} id must be positive",
                self.kind
            )));
        }
        self.state = SurrogateState::Committed(id);
        Ok(())
    }

    /// Committed identity, or [`Error::InConstruction`]
    pub fn key(&self) -> Result<SurrogateKey> {
        match self.state {
            SurrogateState::Committed(id) => Ok(SurrogateKey {
                database: self.database,
                kind: self.kind,
                id,
            }),
            SurrogateState::Pending => Err(Error::InConstruction { kind: self.kind }),
        }
    }

    /// Committed identity of a surrogate known to be persisted.
    ///
    /// # Panics
    ///
    /// Panics if the surrogate is still in construction.
    #[must_use]
    pub fn committed_key(&self) -> SurrogateKey {
        match self.state {
            SurrogateState::Committed(id) => SurrogateKey {
                database: self.database,
                kind: self.kind,
                id,
            },
            SurrogateState::Pending => {
                panic!("{} surrogate in construction has no identity", self.kind)
            }
        }
    }
}

impl PartialEq for Surrogate {
    fn eq(&self, other: &Self) -> bool {
        match (self.state, other.state) {
            (SurrogateState::Committed(a), SurrogateState::Committed(b)) => {
                a == b && self.database == other.database && self.kind == other.kind
            }
            _ => false,
        }
    }
}

impl Hash for Surrogate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.committed_key().hash(state);
    }
}

impl From<SurrogateKey> for Surrogate {
    fn from(key: SurrogateKey) -> Self {
        Self::committed(key.database, key.kind, key.id)
    }
}

impl fmt::Display for Surrogate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.state {
            SurrogateState::Committed(id) => write!(f, "{}#{}@{}", self.kind, id, self.database),
            SurrogateState::Pending => write!(f, "{}#<new>@{}", self.kind, self.database),
        }
    }
}
