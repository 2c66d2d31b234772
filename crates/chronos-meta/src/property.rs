//! Properties
//!
//! A property is a named, typed characteristic that attribute definitions
//! refer to. Properties are immutable once published and shared by handle;
//! updating one means publishing a replacement and invalidating caches.

use chronos_common::{Result, Surrogate};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::value::{Value, ValueType};

/// A named, typed characteristic definition
#[derive(Debug, Clone)]
pub struct Property {
    surrogate: Surrogate,
    name: String,
    value_type: Arc<ValueType>,
    indexed: bool,
}

impl Property {
    pub fn new(
        surrogate: Surrogate,
        name: impl Into<String>,
        value_type: Arc<ValueType>,
        indexed: bool,
    ) -> Self {
        Self {
            surrogate,
            name: name.into(),
            value_type,
            indexed,
        }
    }

    pub const fn surrogate(&self) -> &Surrogate {
        &self.surrogate
    }

    /// Record the id assigned by the backend
    pub fn upgrade(&mut self, id: u64) -> Result<()> {
        self.surrogate.upgrade(id)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &Arc<ValueType> {
        &self.value_type
    }

    /// Whether reverse lookup by value is supported
    pub const fn is_indexed(&self) -> bool {
        self.indexed
    }

    /// Whether `value` is acceptable for attributes of this property
    pub fn accepts(&self, value: Option<&Value>) -> bool {
        self.value_type.is_compatible(value)
    }

    /// Copy of this property with the identity assigned by the backend
    #[must_use]
    pub fn with_surrogate(&self, surrogate: Surrogate) -> Self {
        Self {
            surrogate,
            ..self.clone()
        }
    }

    /// Copy of this property with another value type
    #[must_use]
    pub fn with_value_type(&self, value_type: Arc<ValueType>) -> Self {
        Self {
            value_type,
            ..self.clone()
        }
    }
}

/// Identity-based: properties still in construction never compare equal.
impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.surrogate == other.surrogate
            && self.name == other.name
            && self.indexed == other.indexed
            && self.value_type == other.value_type
    }
}

impl Hash for Property {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}
