//! Immutable schemas
//!
//! A [`Schema`] is the resolved, flattened form of an editable schema chain.
//! It is never edited in place: schemas placed in the metadata cache are
//! shared by every chronicle that uses them.

use chronos_common::{Error, Result, Surrogate};
use std::sync::Arc;

use crate::attribute::{AttributeDefinition, map_properties};
use crate::component::{Component, DefinitionKey};
use crate::container::ComponentContainer;
use crate::property::Property;
use crate::series::SeriesDefinition;

/// Anything holding attribute definitions that may not be complete yet
pub trait IncompleteSchema {
    /// Human-readable designation, used in diagnostics
    fn label(&self) -> String;

    fn attribute_definitions(&self) -> &ComponentContainer<AttributeDefinition>;

    fn is_complete(&self) -> bool;

    /// Attribute definition by number or name.
    ///
    /// A missing definition is `Ok(None)`, or [`Error::AttributeNotFound`]
    /// when `must_exist` is set.
    fn attribute_definition<'k>(
        &self,
        key: impl Into<DefinitionKey<'k>>,
        must_exist: bool,
    ) -> Result<Option<&AttributeDefinition>> {
        let key = key.into();
        match self.attribute_definitions().lookup(key) {
            Some(definition) => Ok(Some(definition)),
            None if must_exist => Err(Error::AttributeNotFound {
                owner: self.label(),
                key: key.to_string(),
            }),
            None => Ok(None),
        }
    }
}

/// Resolved schema with its dependency list
#[derive(Debug, Clone)]
pub struct Schema {
    surrogate: Surrogate,
    name: String,
    attributes: ComponentContainer<AttributeDefinition>,
    series: ComponentContainer<SeriesDefinition>,
    /// Every schema consulted during resolution, most derived first
    dependencies: Vec<Surrogate>,
}

impl Schema {
    pub(crate) fn new(
        surrogate: Surrogate,
        name: String,
        attributes: ComponentContainer<AttributeDefinition>,
        series: ComponentContainer<SeriesDefinition>,
        dependencies: Vec<Surrogate>,
    ) -> Self {
        Self {
            surrogate,
            name,
            attributes,
            series,
            dependencies,
        }
    }

    pub const fn surrogate(&self) -> &Surrogate {
        &self.surrogate
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn series_definitions(&self) -> &ComponentContainer<SeriesDefinition> {
        &self.series
    }

    /// Series definition by number or name.
    ///
    /// A missing definition is `Ok(None)`, or [`Error::SeriesNotFound`]
    /// when `must_exist` is set.
    pub fn series_definition<'k>(
        &self,
        key: impl Into<DefinitionKey<'k>>,
        must_exist: bool,
    ) -> Result<Option<&SeriesDefinition>> {
        let key = key.into();
        match self.series.lookup(key) {
            Some(series) => Ok(Some(series)),
            None if must_exist => Err(Error::SeriesNotFound {
                owner: self.label(),
                key: key.to_string(),
            }),
            None => Ok(None),
        }
    }

    pub fn dependencies(&self) -> &[Surrogate] {
        &self.dependencies
    }

    /// Whether `schema` was consulted when resolving this schema
    pub fn depends_on_schema(&self, schema: &Surrogate) -> bool {
        self.dependencies.iter().any(|s| s == schema)
    }

    /// Every property referenced, chronicle-level first, with repetitions
    pub fn properties(&self) -> impl Iterator<Item = &Arc<Property>> {
        let series_level = self
            .series
            .iter()
            .flat_map(|s| s.attribute_definitions().iter());
        self.attributes
            .iter()
            .chain(series_level)
            .filter_map(AttributeDefinition::property)
    }

    /// Why the schema is incomplete, if it is
    pub fn incompleteness(&self) -> Option<String> {
        if self.series.is_empty() {
            return Some("no series definition".to_string());
        }
        if let Some(definition) = self.attributes.first_incomplete() {
            return Some(format!("attribute #{} is incomplete", definition.number()));
        }
        if let Some(series) = self.series.first_incomplete() {
            return Some(format!("series #{} is incomplete", series.number()));
        }
        None
    }

    /// Fail with [`Error::IncompleteSchema`] unless complete
    pub fn ensure_complete(&self) -> Result<()> {
        match self.incompleteness() {
            None => Ok(()),
            Some(reason) => Err(Error::IncompleteSchema {
                schema: self.name.clone(),
                reason,
            }),
        }
    }

    /// Copy with every property passed through `f`
    pub(crate) fn map_properties(
        &self,
        f: &mut impl FnMut(&Arc<Property>) -> Result<Arc<Property>>,
    ) -> Result<Self> {
        let attributes = map_properties(&self.attributes, f)?;
        let mut series = ComponentContainer::new();
        for definition in self.series.iter() {
            series.add(definition.map_properties(f)?)?;
        }
        series.consolidate();
        Ok(Self {
            surrogate: self.surrogate.clone(),
            name: self.name.clone(),
            attributes,
            series,
            dependencies: self.dependencies.clone(),
        })
    }
}

impl IncompleteSchema for Schema {
    fn label(&self) -> String {
        format!("schema {}", self.name)
    }

    fn attribute_definitions(&self) -> &ComponentContainer<AttributeDefinition> {
        &self.attributes
    }

    fn is_complete(&self) -> bool {
        !self.series.is_empty() && self.attributes.is_complete() && self.series.is_complete()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.surrogate == other.surrogate
            && self.name == other.name
            && self.attributes == other.attributes
            && self.series == other.series
            && self.dependencies == other.dependencies
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ValueKind, ValueType};
    use chronos_common::{DatabaseId, ObjectKind};

    fn prices(series: &[(u32, &str)], unit: Option<&str>) -> Schema {
        let db = DatabaseId::new();
        let text = Arc::new(ValueType::new(
            Surrogate::committed(db, ObjectKind::ValueType, 1),
            "label",
            ValueKind::Text,
        ));
        let property = Arc::new(Property::new(
            Surrogate::committed(db, ObjectKind::Property, 2),
            "unit",
            text,
            false,
        ));

        let mut attributes = ComponentContainer::new();
        attributes
            .add(AttributeDefinition::with_property(1, property, unit.map(Into::into)).unwrap())
            .unwrap();
        attributes.consolidate();
        let mut definitions = ComponentContainer::new();
        for (number, name) in series {
            definitions
                .add(
                    SeriesDefinition::with_structure(*number, name, ValueKind::Float, "day")
                        .unwrap(),
                )
                .unwrap();
        }
        definitions.consolidate();

        let surrogate = Surrogate::committed(db, ObjectKind::Schema, 3);
        let base = Surrogate::committed(db, ObjectKind::Schema, 4);
        Schema::new(
            surrogate.clone(),
            "prices".into(),
            attributes,
            definitions,
            vec![surrogate, base],
        )
    }

    #[test]
    fn test_lookups() {
        let schema = prices(&[(1, "open"), (2, "close")], Some("kg"));
        assert!(schema.is_complete());
        assert!(schema.ensure_complete().is_ok());
        assert_eq!(
            schema.series_definition("close", true).unwrap().unwrap().number(),
            2
        );
        assert_eq!(schema.attribute_definition("unit", true).unwrap().unwrap().number(), 1);

        let err = schema.series_definition(9, true).unwrap_err();
        assert_eq!(
            err,
            Error::SeriesNotFound {
                owner: "schema prices".into(),
                key: "#9".into()
            }
        );
        assert!(schema.attribute_definition("currency", false).unwrap().is_none());
    }

    #[test]
    fn test_incompleteness() {
        let schema = prices(&[], Some("kg"));
        assert_eq!(schema.incompleteness().as_deref(), Some("no series definition"));

        let schema = prices(&[(1, "open")], None);
        assert_eq!(
            schema.incompleteness().as_deref(),
            Some("attribute #1 is incomplete")
        );
        assert_eq!(schema.ensure_complete().unwrap_err().key(), "schema.incomplete");
    }

    #[test]
    fn test_dependencies() {
        let schema = prices(&[(1, "open")], Some("kg"));
        let db = schema.surrogate().database();
        assert!(schema.depends_on_schema(&Surrogate::committed(db, ObjectKind::Schema, 4)));
        assert!(!schema.depends_on_schema(&Surrogate::committed(db, ObjectKind::Schema, 5)));
        assert!(!schema.depends_on_schema(&Surrogate::pending(db, ObjectKind::Schema)));
    }

    #[test]
    fn test_properties_include_series_level() {
        let schema = prices(&[(1, "open"), (2, "close")], Some("kg"));
        let names: Vec<&str> = schema.properties().map(|p| p.name()).collect();
        assert_eq!(names.len(), 7);
        assert_eq!(names[0], "unit");
        assert_eq!(names.iter().filter(|n| **n == "series.name").count(), 2);
    }
}
