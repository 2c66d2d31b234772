//! Components: numbered, optionally named definition units

use std::fmt;

/// A definition unit held in a [`ComponentContainer`](crate::container::ComponentContainer)
///
/// Components are identified by a positive number, unique within their
/// container, and optionally by a name, unique among named components.
/// Cloning a component must produce a deep, independently editable copy.
pub trait Component: Clone + fmt::Debug {
    /// Kind of component, used in diagnostics
    const LABEL: &'static str;

    /// Create an erasing component, removing the inherited one of this number
    fn erasing(number: u32) -> Self;

    fn number(&self) -> u32;

    fn name(&self) -> Option<&str>;

    fn is_complete(&self) -> bool;

    fn is_erasing(&self) -> bool;

    fn is_editable(&self) -> bool;

    fn set_editable(&mut self, editable: bool);

    /// Leave edit mode, committing any nested state
    fn freeze(&mut self) {
        self.set_editable(false);
    }
}

/// Lookup key for a definition: its number or its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKey<'a> {
    Number(u32),
    Name(&'a str),
}

impl From<u32> for DefinitionKey<'_> {
    fn from(number: u32) -> Self {
        Self::Number(number)
    }
}

impl<'a> From<&'a str> for DefinitionKey<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl fmt::Display for DefinitionKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "#{n}"),
            Self::Name(name) => write!(f, "{name:?}"),
        }
    }
}
