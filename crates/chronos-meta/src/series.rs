//! Series definitions
//!
//! A series definition describes one time-indexed value stream of a
//! chronicle. Its structural attributes (name, value kind, time domain) live in
//! its own attribute container at reserved numbers, next to any custom
//! series-scoped attributes, so that resolution merges all of them with the
//! same per-field rule.

use chronos_common::{Error, Result};
use std::sync::Arc;

use crate::attribute::{AttributeDefinition, map_properties};
use crate::builtin::{
    self, FIRST_CUSTOM_SERIES_ATTRIBUTE, SERIES_NAME, SERIES_TIME_DOMAIN, SERIES_TYPE,
};
use crate::component::Component;
use crate::container::ComponentContainer;
use crate::property::Property;
use crate::schema::IncompleteSchema;
use crate::value::{Value, ValueKind};

/// Series definition, a [`Component`] of schemas
#[derive(Debug, Clone)]
pub struct SeriesDefinition {
    number: u32,
    description: Option<String>,
    attributes: ComponentContainer<AttributeDefinition>,
    erasing: bool,
    editable: bool,
}

impl SeriesDefinition {
    /// Empty definition in edit mode
    pub fn new(number: u32) -> Self {
        Self {
            number,
            description: None,
            attributes: ComponentContainer::new(),
            erasing: false,
            editable: true,
        }
    }

    /// Definition with all structural attributes set
    pub fn with_structure(
        number: u32,
        name: &str,
        kind: ValueKind,
        time_domain: &str,
    ) -> Result<Self> {
        let mut series = Self::new(number);
        series.set_name(name)?;
        series.set_value_kind(kind)?;
        series.set_time_domain(time_domain)?;
        Ok(series)
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.editable {
            Ok(())
        } else {
            Err(Error::not_editable(format!("series #{}", self.number)))
        }
    }

    fn structural(&self, number: u32) -> Option<&str> {
        self.attributes.get(number)?.value()?.as_text()
    }

    fn set_structural(&mut self, number: u32, value: &str) -> Result<()> {
        self.ensure_editable()?;
        let value = Some(Value::from(value));
        if self.attributes.contains(number) {
            self.attributes
                .edit_component(number, |definition| definition.set_value(value))?;
        } else {
            let property = builtin::builtins()
                .for_series_attribute(number)
                .ok_or_else(|| Error::internal(format!("no built-in series attribute #{number}")))?;
            self.attributes.add(AttributeDefinition::with_property(
                number,
                Arc::clone(property),
                value,
            )?)?;
        }
        self.erasing = false;
        Ok(())
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) -> Result<()> {
        self.ensure_editable()?;
        if description.is_some() {
            self.erasing = false;
        }
        self.description = description;
        Ok(())
    }

    pub fn set_name(&mut self, name: &str) -> Result<()> {
        self.set_structural(SERIES_NAME, name)
    }

    pub fn value_kind(&self) -> Option<ValueKind> {
        self.structural(SERIES_TYPE)?.parse().ok()
    }

    pub fn set_value_kind(&mut self, kind: ValueKind) -> Result<()> {
        self.set_structural(SERIES_TYPE, &kind.to_string())
    }

    pub fn time_domain(&self) -> Option<&str> {
        self.structural(SERIES_TIME_DOMAIN)
    }

    pub fn set_time_domain(&mut self, time_domain: &str) -> Result<()> {
        self.set_structural(SERIES_TIME_DOMAIN, time_domain)
    }

    /// Custom series-scoped attribute definitions
    pub fn custom_attributes(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.attributes
            .iter()
            .filter(|d| d.number() >= FIRST_CUSTOM_SERIES_ATTRIBUTE)
    }

    fn check_custom(&self, number: u32) -> Result<()> {
        self.ensure_editable()?;
        if number < FIRST_CUSTOM_SERIES_ATTRIBUTE {
            return Err(Error::invalid_argument(format!(
                "series #{}: attribute #{number} is reserved, custom attributes start at #{FIRST_CUSTOM_SERIES_ATTRIBUTE}",
                self.number
            )));
        }
        Ok(())
    }

    /// Add a custom attribute; `Ok(false)` if the number is taken
    pub fn add_attribute(&mut self, definition: AttributeDefinition) -> Result<bool> {
        self.check_custom(definition.number())?;
        let added = self.attributes.add(definition)?;
        if added {
            self.erasing = false;
        }
        Ok(added)
    }

    pub fn delete_attribute(&mut self, number: u32) -> Result<bool> {
        self.check_custom(number)?;
        Ok(self.attributes.delete(number))
    }

    pub fn erase_attribute(&mut self, number: u32) -> Result<()> {
        self.check_custom(number)?;
        self.attributes.erase(number)
    }

    /// Edit a series attribute, structural ones included
    pub fn edit_attribute<R>(
        &mut self,
        number: u32,
        f: impl FnOnce(&mut AttributeDefinition) -> Result<R>,
    ) -> Result<Option<R>> {
        self.ensure_editable()?;
        self.attributes.edit_component(number, f)
    }

    pub fn set_erasing(&mut self, erasing: bool) -> Result<()> {
        self.ensure_editable()?;
        if erasing {
            self.description = None;
            self.attributes = ComponentContainer::new();
        }
        self.erasing = erasing;
        Ok(())
    }

    /// Overwrite description and attributes with those set in `other`
    pub(crate) fn merge_from(&mut self, other: &Self) -> Result<()> {
        self.ensure_editable()?;
        self.attributes.merge_level(
            &other.attributes,
            AttributeDefinition::new,
            AttributeDefinition::merge_from,
        )?;
        if let Some(description) = &other.description {
            self.description = Some(description.clone());
        }
        self.erasing = false;
        Ok(())
    }

    pub(crate) fn map_properties(
        &self,
        f: &mut impl FnMut(&Arc<Property>) -> Result<Arc<Property>>,
    ) -> Result<Self> {
        Ok(Self {
            attributes: map_properties(&self.attributes, f)?,
            ..self.clone()
        })
    }
}

impl IncompleteSchema for SeriesDefinition {
    fn label(&self) -> String {
        match self.name() {
            Some(name) => format!("series {name}"),
            None => format!("series #{}", self.number),
        }
    }

    fn attribute_definitions(&self) -> &ComponentContainer<AttributeDefinition> {
        &self.attributes
    }

    fn is_complete(&self) -> bool {
        Component::is_complete(self)
    }
}

impl Component for SeriesDefinition {
    const LABEL: &'static str = "series";

    fn erasing(number: u32) -> Self {
        Self {
            erasing: true,
            ..Self::new(number)
        }
    }

    fn number(&self) -> u32 {
        self.number
    }

    fn name(&self) -> Option<&str> {
        self.structural(SERIES_NAME)
    }

    fn is_complete(&self) -> bool {
        !self.erasing
            && self.name().is_some()
            && self.value_kind().is_some()
            && self.time_domain().is_some()
            && self.attributes.is_complete()
    }

    fn is_erasing(&self) -> bool {
        self.erasing
    }

    fn is_editable(&self) -> bool {
        self.editable
    }

    fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }

    fn freeze(&mut self) {
        self.attributes.consolidate();
        self.editable = false;
    }
}

impl PartialEq for SeriesDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.erasing == other.erasing
            && self.description == other.description
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueType;
    use chronos_common::{DatabaseId, ObjectKind, Surrogate};

    fn unit_property() -> Arc<Property> {
        let db = DatabaseId::new();
        let vt = ValueType::new(
            Surrogate::committed(db, ObjectKind::ValueType, 1),
            "unit",
            ValueKind::Text,
        );
        Arc::new(Property::new(
            Surrogate::committed(db, ObjectKind::Property, 1),
            "unit",
            Arc::new(vt),
            false,
        ))
    }

    #[test]
    fn test_structural_accessors() {
        let series = SeriesDefinition::with_structure(1, "price", ValueKind::Float, "day").unwrap();
        assert_eq!(series.name(), Some("price"));
        assert_eq!(series.value_kind(), Some(ValueKind::Float));
        assert_eq!(series.time_domain(), Some("day"));
        assert!(Component::is_complete(&series));
        assert_eq!(series.custom_attributes().count(), 0);
    }

    #[test]
    fn test_incomplete_without_time_domain() {
        let mut series = SeriesDefinition::new(1);
        series.set_name("price").unwrap();
        series.set_value_kind(ValueKind::Float).unwrap();
        assert!(!Component::is_complete(&series));
    }

    #[test]
    fn test_invalid_time_domain() {
        let mut series = SeriesDefinition::new(1);
        let err = series.set_time_domain("fortnight").unwrap_err();
        assert_eq!(err.key(), "value.incompatible");
        assert!(series.time_domain().is_none());
    }

    #[test]
    fn test_reserved_numbers() {
        let mut series = SeriesDefinition::new(1);
        let err = series
            .add_attribute(AttributeDefinition::new(SERIES_TYPE))
            .unwrap_err();
        assert_eq!(err.key(), "invalid_argument");
    }

    #[test]
    fn test_custom_attributes() {
        let mut series = SeriesDefinition::with_structure(1, "price", ValueKind::Float, "day").unwrap();
        let def = AttributeDefinition::with_property(4, unit_property(), Some(Value::from("EUR")))
            .unwrap();
        assert!(series.add_attribute(def.clone()).unwrap());
        assert!(!series.add_attribute(def).unwrap());
        assert_eq!(series.custom_attributes().count(), 1);
        assert_eq!(
            series.attribute_definition("unit", true).unwrap().unwrap().number(),
            4
        );
        assert!(series.delete_attribute(4).unwrap());
        assert!(series.attribute_definition(4, false).unwrap().is_none());
        assert!(series.attribute_definition(4, true).unwrap_err().is_not_found());
    }

    #[test]
    fn test_rename_updates_nested_index() {
        let mut series = SeriesDefinition::with_structure(1, "price", ValueKind::Float, "day").unwrap();
        series.set_name("close").unwrap();
        assert_eq!(series.name(), Some("close"));
        assert!(series.attribute_definition("series.name", true).is_ok());
    }

    #[test]
    fn test_frozen_series_rejects_edits() {
        let mut series = SeriesDefinition::with_structure(1, "price", ValueKind::Float, "day").unwrap();
        series.freeze();
        assert!(!series.attribute_definitions().is_editing());
        let err = series.set_description(Some("x".into())).unwrap_err();
        assert_eq!(err.key(), "state.not_editable");
    }

    #[test]
    fn test_erasing_clears_everything() {
        let mut series = SeriesDefinition::with_structure(1, "price", ValueKind::Float, "day").unwrap();
        series.set_description(Some("closing price".into())).unwrap();
        series.set_erasing(true).unwrap();
        assert!(series.is_erasing());
        assert!(series.name().is_none());
        assert!(series.description().is_none());
        assert_eq!(series, SeriesDefinition::erasing(7));
    }
}
