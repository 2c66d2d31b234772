//! Values and value types
//!
//! A [`ValueType`] is the domain of a property: a scalar kind, optionally
//! restricted to an enumerated set of allowed values, and the string
//! conversion contract (parse, format, check) for that domain.

use chrono::NaiveDate;
use chronos_common::{Error, Result, Surrogate};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Scalar kind underlying a value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    #[display("text")]
    Text,
    #[display("integer")]
    Integer,
    #[display("float")]
    Float,
    #[display("boolean")]
    Boolean,
    #[display("date")]
    Date,
}

impl std::str::FromStr for ValueKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "text" => Ok(Self::Text),
            "integer" => Ok(Self::Integer),
            "float" => Ok(Self::Float),
            "boolean" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            other => Err(Error::ValueTypeNotFound(other.to_string())),
        }
    }
}

/// A scalar attribute value
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Integer(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Float,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Date(_) => ValueKind::Date,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Parse the canonical text form of a value of the given kind
    pub fn parse(kind: ValueKind, input: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidValue {
            value_type: kind.to_string(),
            input: input.to_string(),
            reason,
        };
        match kind {
            ValueKind::Text => Ok(Self::Text(input.to_string())),
            ValueKind::Integer => input
                .trim()
                .parse()
                .map(Self::Integer)
                .map_err(|e: std::num::ParseIntError| invalid(e.to_string())),
            ValueKind::Float => input
                .trim()
                .parse()
                .map(Self::Float)
                .map_err(|e: std::num::ParseFloatError| invalid(e.to_string())),
            ValueKind::Boolean => match input.trim() {
                "true" => Ok(Self::Boolean(true)),
                "false" => Ok(Self::Boolean(false)),
                _ => Err(invalid("expected true or false".to_string())),
            },
            ValueKind::Date => NaiveDate::parse_from_str(input.trim(), DATE_FORMAT)
                .map(Self::Date)
                .map_err(|e| invalid(e.to_string())),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind().hash(state);
        match self {
            Self::Text(s) => s.hash(state),
            Self::Integer(i) => i.hash(state),
            Self::Float(f) => f.to_bits().hash(state),
            Self::Boolean(b) => b.hash(state),
            Self::Date(d) => d.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

/// Value domain of a property
///
/// Immutable once published; editing a value type produces a new instance.
#[derive(Debug, Clone)]
pub struct ValueType {
    surrogate: Surrogate,
    name: String,
    kind: ValueKind,
    /// Allowed values by canonical text, with optional descriptions
    restriction: Option<BTreeMap<String, Option<String>>>,
    nullable: bool,
}

impl ValueType {
    pub fn new(surrogate: Surrogate, name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            surrogate,
            name: name.into(),
            kind,
            restriction: None,
            nullable: false,
        }
    }

    /// Restrict the type to an enumerated set of values.
    ///
    /// Values of the wrong kind are rejected.
    pub fn restricted<I>(mut self, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Value, Option<String>)>,
    {
        let mut allowed = BTreeMap::new();
        for (value, description) in values {
            if value.kind() != self.kind {
                return Err(Error::InvalidValue {
                    value_type: self.name.clone(),
                    input: value.to_string(),
                    reason: format!("expected a {} value", self.kind),
                });
            }
            allowed.insert(value.to_string(), description);
        }
        self.restriction = Some(allowed);
        Ok(self)
    }

    /// Text type restricted to the given values, without descriptions
    pub(crate) fn enumerated(surrogate: Surrogate, name: &str, values: &[&str]) -> Self {
        Self {
            restriction: Some(values.iter().map(|v| ((*v).to_string(), None)).collect()),
            ..Self::new(surrogate, name, ValueKind::Text)
        }
    }

    /// Allow attributes of this type to have no value
    #[must_use]
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
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

    pub const fn kind(&self) -> ValueKind {
        self.kind
    }

    pub const fn is_restricted(&self) -> bool {
        self.restriction.is_some()
    }

    /// Whether an absent value is legitimate for this type
    pub const fn accepts_absent(&self) -> bool {
        self.nullable
    }

    /// Allowed values of a restricted type, in canonical text form
    pub fn allowed_values(&self) -> impl Iterator<Item = &str> {
        self.restriction
            .iter()
            .flat_map(|allowed| allowed.keys().map(String::as_str))
    }

    /// Description attached to an allowed value
    pub fn description_of(&self, value: &Value) -> Option<&str> {
        self.restriction
            .as_ref()?
            .get(&value.to_string())?
            .as_deref()
    }

    /// Parse text into a value of this type
    pub fn parse(&self, input: &str) -> Result<Value> {
        let value = Value::parse(self.kind, input).map_err(|e| match e {
            Error::InvalidValue { input, reason, .. } => Error::InvalidValue {
                value_type: self.name.clone(),
                input,
                reason,
            },
            other => other,
        })?;
        self.check(&value)?;
        Ok(value)
    }

    /// Format a value of this type in canonical text form
    pub fn format(&self, value: &Value) -> Result<String> {
        self.check(value)?;
        Ok(value.to_string())
    }

    /// Verify that a value belongs to this type's domain
    pub fn check(&self, value: &Value) -> Result<()> {
        if value.kind() != self.kind {
            return Err(Error::InvalidValue {
                value_type: self.name.clone(),
                input: value.to_string(),
                reason: format!("expected a {} value", self.kind),
            });
        }
        if let Some(allowed) = &self.restriction
            && !allowed.contains_key(&value.to_string())
        {
            return Err(Error::InvalidValue {
                value_type: self.name.clone(),
                input: value.to_string(),
                reason: "not an allowed value".to_string(),
            });
        }
        Ok(())
    }

    /// Whether `value` is acceptable, absence included
    pub fn is_compatible(&self, value: Option<&Value>) -> bool {
        value.map_or(self.nullable, |v| self.check(v).is_ok())
    }
}

/// Value types still in construction never compare equal, so this is not `Eq`.
impl PartialEq for ValueType {
    fn eq(&self, other: &Self) -> bool {
        self.surrogate == other.surrogate
            && self.name == other.name
            && self.kind == other.kind
            && self.restriction == other.restriction
            && self.nullable == other.nullable
    }
}
