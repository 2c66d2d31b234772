//! Chronicles and chronicle naming
//!
//! Chronicles form a tree; a chronicle's full name is the path of simple
//! names from the root, joined by the separator of the [`NamingPolicy`].

use chronos_common::{Error, Result, Surrogate};
use std::sync::Arc;

use crate::schema::Schema;

/// How chronicle names are split into and joined from their parts
pub trait NamingPolicy: Send + Sync {
    fn separator(&self) -> char;

    /// Split a full name into the parent's full name and the simple name
    fn split<'a>(&self, full_name: &'a str) -> (Option<&'a str>, &'a str) {
        match full_name.rsplit_once(self.separator()) {
            Some((parent, name)) => (Some(parent), name),
            None => (None, full_name),
        }
    }

    fn join(&self, parent: Option<&str>, name: &str) -> String {
        match parent {
            Some(parent) => format!("{parent}{}{name}", self.separator()),
            None => name.to_string(),
        }
    }

    /// Check a simple name
    fn validate(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::invalid_argument("chronicle name is empty"));
        }
        if name.contains(self.separator()) {
            return Err(Error::invalid_argument(format!(
                "chronicle name {name:?} contains the separator {:?}",
                self.separator()
            )));
        }
        Ok(())
    }
}

/// Names separated by a fixed character, `.` by default
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeparatorNaming {
    separator: char,
}

impl SeparatorNaming {
    pub const fn new(separator: char) -> Self {
        Self { separator }
    }
}

impl Default for SeparatorNaming {
    fn default() -> Self {
        Self::new('.')
    }
}

impl NamingPolicy for SeparatorNaming {
    fn separator(&self) -> char {
        self.separator
    }
}

/// Snapshot of a chronicle with its resolved schema
#[derive(Debug, Clone)]
pub struct Chronicle {
    surrogate: Surrogate,
    name: String,
    full_name: String,
    description: Option<String>,
    parent: Option<Surrogate>,
    schema: Arc<Schema>,
}

impl Chronicle {
    pub fn new(
        surrogate: Surrogate,
        full_name: impl Into<String>,
        description: Option<String>,
        parent: Option<Surrogate>,
        schema: Arc<Schema>,
        naming: &dyn NamingPolicy,
    ) -> Self {
        let full_name = full_name.into();
        let name = naming.split(&full_name).1.to_string();
        Self {
            surrogate,
            name,
            full_name,
            description,
            parent,
            schema,
        }
    }

    pub const fn surrogate(&self) -> &Surrogate {
        &self.surrogate
    }

    /// Simple name, the last part of the full name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub const fn parent(&self) -> Option<&Surrogate> {
        self.parent.as_ref()
    }

    pub const fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub const fn is_top_level(&self) -> bool {
        self.parent.is_none()
    }

    pub(crate) fn with_schema(&self, schema: Arc<Schema>) -> Self {
        Self {
            schema,
            ..self.clone()
        }
    }
}

impl PartialEq for Chronicle {
    fn eq(&self, other: &Self) -> bool {
        self.surrogate == other.surrogate
            && self.full_name == other.full_name
            && self.description == other.description
            && self.parent == other.parent
            && (Arc::ptr_eq(&self.schema, &other.schema) || self.schema == other.schema)
    }
}
