//! Built-in value types and properties
//!
//! Every series definition carries three structural attributes (name, value
//! type and time domain). They are ordinary attribute definitions stored at
//! reserved numbers of the series container, referring to the built-in
//! properties defined here.

use chronos_common::{DatabaseId, ObjectKind, Surrogate};
use std::sync::{Arc, LazyLock};

use crate::property::Property;
use crate::value::{ValueKind, ValueType};

/// Series attribute number of the series name
pub const SERIES_NAME: u32 = 1;
/// Series attribute number of the series value type
pub const SERIES_TYPE: u32 = 2;
/// Series attribute number of the series time domain
pub const SERIES_TIME_DOMAIN: u32 = 3;
/// Lowest number available to custom series attributes
pub const FIRST_CUSTOM_SERIES_ATTRIBUTE: u32 = 4;

pub const SERIES_NAME_PROPERTY: &str = "series.name";
pub const SERIES_TYPE_PROPERTY: &str = "series.type";
pub const SERIES_TIME_DOMAIN_PROPERTY: &str = "series.time_domain";

/// Time domains a series can be indexed by
pub const TIME_DOMAINS: [&str; 10] = [
    "year", "semester", "quarter", "month", "week", "workweek", "day", "hour", "minute", "second",
];

/// Kinds a series can hold
pub const SERIES_KINDS: [&str; 5] = ["text", "integer", "float", "boolean", "date"];

/// The built-in metadata objects
#[derive(Debug)]
pub struct Builtins {
    pub text: Arc<ValueType>,
    pub series_kind: Arc<ValueType>,
    pub time_domain: Arc<ValueType>,
    pub series_name: Arc<Property>,
    pub series_type: Arc<Property>,
    pub series_time_domain: Arc<Property>,
}

impl Builtins {
    fn new() -> Self {
        let value_type = |id| Surrogate::committed(DatabaseId::BUILTIN, ObjectKind::ValueType, id);
        let property = |id| Surrogate::committed(DatabaseId::BUILTIN, ObjectKind::Property, id);

        let text = Arc::new(ValueType::new(value_type(1), "text", ValueKind::Text));
        let series_kind = Arc::new(ValueType::enumerated(
            value_type(2),
            "series_kind",
            &SERIES_KINDS,
        ));
        let time_domain = Arc::new(ValueType::enumerated(
            value_type(3),
            "time_domain",
            &TIME_DOMAINS,
        ));

        Self {
            series_name: Arc::new(Property::new(
                property(1),
                SERIES_NAME_PROPERTY,
                Arc::clone(&text),
                true,
            )),
            series_type: Arc::new(Property::new(
                property(2),
                SERIES_TYPE_PROPERTY,
                Arc::clone(&series_kind),
                false,
            )),
            series_time_domain: Arc::new(Property::new(
                property(3),
                SERIES_TIME_DOMAIN_PROPERTY,
                Arc::clone(&time_domain),
                false,
            )),
            text,
            series_kind,
            time_domain,
        }
    }

    /// All built-in properties
    pub fn properties(&self) -> [&Arc<Property>; 3] {
        [&self.series_name, &self.series_type, &self.series_time_domain]
    }

    /// Built-in property by name
    pub fn property(&self, name: &str) -> Option<&Arc<Property>> {
        self.properties().into_iter().find(|p| p.name() == name)
    }

    /// Built-in property stored at a reserved series attribute number
    pub fn for_series_attribute(&self, number: u32) -> Option<&Arc<Property>> {
        match number {
            SERIES_NAME => Some(&self.series_name),
            SERIES_TYPE => Some(&self.series_type),
            SERIES_TIME_DOMAIN => Some(&self.series_time_domain),
            _ => None,
        }
    }
}

static BUILTINS: LazyLock<Builtins> = LazyLock::new(Builtins::new);

/// Shared built-in value types and properties
pub fn builtins() -> &'static Builtins {
    &BUILTINS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_builtin_lookup() {
        let b = builtins();
        assert_eq!(b.property(SERIES_NAME_PROPERTY).unwrap().name(), "series.name");
        assert!(b.property("nope").is_none());
        assert!(Arc::ptr_eq(
            b.for_series_attribute(SERIES_TIME_DOMAIN).unwrap(),
            &b.series_time_domain
        ));
        assert!(b.for_series_attribute(FIRST_CUSTOM_SERIES_ATTRIBUTE).is_none());
    }

    #[test]
    fn test_time_domain_restricted() {
        let td = &builtins().time_domain;
        assert!(td.check(&Value::from("workweek")).is_ok());
        assert!(td.check(&Value::from("fortnight")).is_err());
    }
}
