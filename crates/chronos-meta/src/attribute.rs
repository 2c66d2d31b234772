//! Attribute definitions
//!
//! An attribute definition binds a property and an optional default value to
//! a number. In a derived schema it can instead be "erasing", which removes
//! the inherited definition of the same number during resolution.

use chronos_common::{Error, Result};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::component::Component;
use crate::container::ComponentContainer;
use crate::property::Property;
use crate::value::Value;

/// Attribute definition, a [`Component`] of schemas and series
#[derive(Debug, Clone)]
pub struct AttributeDefinition {
    number: u32,
    property: Option<Arc<Property>>,
    value: Option<Value>,
    erasing: bool,
    editable: bool,
}

fn incompatible(property: &Property, value: &Value) -> Error {
    Error::IncompatibleValue {
        property: property.name().to_string(),
        value_type: property.value_type().name().to_string(),
        value: value.to_string(),
    }
}

fn check_pair(property: Option<&Arc<Property>>, value: Option<&Value>) -> Result<()> {
    if let (Some(property), Some(value)) = (property, value)
        && property.value_type().check(value).is_err()
    {
        return Err(incompatible(property, value));
    }
    Ok(())
}

impl AttributeDefinition {
    /// Empty definition in edit mode
    pub const fn new(number: u32) -> Self {
        Self {
            number,
            property: None,
            value: None,
            erasing: false,
            editable: true,
        }
    }

    /// Definition of `property` with an optional default value
    pub fn with_property(
        number: u32,
        property: Arc<Property>,
        value: Option<Value>,
    ) -> Result<Self> {
        check_pair(Some(&property), value.as_ref())?;
        Ok(Self {
            property: Some(property),
            value,
            ..Self::new(number)
        })
    }

    pub fn property(&self) -> Option<&Arc<Property>> {
        self.property.as_ref()
    }

    pub const fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    fn ensure_editable(&self) -> Result<()> {
        if self.editable {
            Ok(())
        } else {
            Err(Error::not_editable(format!("attribute #{}", self.number)))
        }
    }

    /// Set the property; the current value must fit its type
    pub fn set_property(&mut self, property: Option<Arc<Property>>) -> Result<()> {
        self.ensure_editable()?;
        check_pair(property.as_ref(), self.value.as_ref())?;
        if property.is_some() {
            self.erasing = false;
        }
        self.property = property;
        Ok(())
    }

    /// Set the default value; it must fit the property's type
    pub fn set_value(&mut self, value: Option<Value>) -> Result<()> {
        self.ensure_editable()?;
        check_pair(self.property.as_ref(), value.as_ref())?;
        if value.is_some() {
            self.erasing = false;
        }
        self.value = value;
        Ok(())
    }

    /// Parse and set the default value using the property's value type
    pub fn parse_value(&mut self, input: &str) -> Result<()> {
        let property = self.property.as_ref().ok_or_else(|| {
            Error::invalid_argument(format!(
                "attribute #{} has no property to parse {input:?} with",
                self.number
            ))
        })?;
        let value = property.value_type().parse(input)?;
        self.set_value(Some(value))
    }

    /// Turn erasing on or off; erasing clears property and value
    pub fn set_erasing(&mut self, erasing: bool) -> Result<()> {
        self.ensure_editable()?;
        if erasing {
            self.property = None;
            self.value = None;
        }
        self.erasing = erasing;
        Ok(())
    }

    /// Overwrite property and value with those set in `other`.
    ///
    /// The merged pair is validated as a whole, so a derived definition may
    /// change the property and the value together.
    pub(crate) fn merge_from(&mut self, other: &Self) -> Result<()> {
        self.ensure_editable()?;
        let property = other.property.clone().or_else(|| self.property.clone());
        let value = other.value.clone().or_else(|| self.value.clone());
        check_pair(property.as_ref(), value.as_ref())?;
        if property.is_some() || value.is_some() {
            self.erasing = false;
        }
        self.property = property;
        self.value = value;
        Ok(())
    }

    /// Copy with the property replaced by `f`, used to share property instances
    pub(crate) fn map_property(
        &self,
        f: &mut impl FnMut(&Arc<Property>) -> Result<Arc<Property>>,
    ) -> Result<Self> {
        let property = self.property.as_ref().map(|p| f(p)).transpose()?;
        Ok(Self {
            property,
            ..self.clone()
        })
    }
}

/// Copy of a definition container with every property passed through `f`
pub(crate) fn map_properties(
    definitions: &ComponentContainer<AttributeDefinition>,
    f: &mut impl FnMut(&Arc<Property>) -> Result<Arc<Property>>,
) -> Result<ComponentContainer<AttributeDefinition>> {
    let mut mapped = ComponentContainer::new();
    for definition in definitions.iter() {
        mapped.add(definition.map_property(f)?)?;
    }
    mapped.consolidate();
    Ok(mapped)
}

impl Component for AttributeDefinition {
    const LABEL: &'static str = "attribute";

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
        self.property.as_deref().map(Property::name)
    }

    fn is_complete(&self) -> bool {
        !self.erasing
            && self
                .property
                .as_ref()
                .is_some_and(|p| p.accepts(self.value.as_ref()))
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
}

/// Compares properties by identity, so definitions of a property still in
/// construction are never equal.
impl PartialEq for AttributeDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.erasing == other.erasing
            && self.property == other.property
            && self.value == other.value
    }
}

impl Hash for AttributeDefinition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.erasing.hash(state);
        self.property.as_deref().map(Property::name).hash(state);
        self.value.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{ValueKind, ValueType};
    use chronos_common::{DatabaseId, ObjectKind, Surrogate};

    fn property(id: u64, name: &str, kind: ValueKind) -> Arc<Property> {
        let db = DatabaseId::BUILTIN;
        let vt = ValueType::new(Surrogate::committed(db, ObjectKind::ValueType, id), name, kind);
        Arc::new(Property::new(
            Surrogate::committed(db, ObjectKind::Property, id),
            name,
            Arc::new(vt),
            false,
        ))
    }

    #[test]
    fn test_completeness() {
        let mut def = AttributeDefinition::new(1);
        assert!(!def.is_complete());
        def.set_property(Some(property(1, "unit", ValueKind::Text)))
            .unwrap();
        assert!(!def.is_complete());
        def.set_value(Some(Value::from("kg"))).unwrap();
        assert!(def.is_complete());
        assert_eq!(def.name(), Some("unit"));
    }

    #[test]
    fn test_erasing_clears_fields() {
        let mut def = AttributeDefinition::with_property(
            1,
            property(1, "unit", ValueKind::Text),
            Some(Value::from("kg")),
        )
        .unwrap();
        def.set_erasing(true).unwrap();
        assert!(def.is_erasing());
        assert!(def.property().is_none());
        assert!(def.value().is_none());
        assert!(!def.is_complete());

        def.set_value(Some(Value::from("g"))).unwrap();
        assert!(!def.is_erasing());
    }

    #[test]
    fn test_incompatible_value() {
        let mut def =
            AttributeDefinition::with_property(1, property(1, "count", ValueKind::Integer), None)
                .unwrap();
        let err = def.set_value(Some(Value::from("many"))).unwrap_err();
        assert_eq!(err.key(), "value.incompatible");
        assert!(def.value().is_none());

        def.parse_value("12").unwrap();
        assert_eq!(def.value(), Some(&Value::Integer(12)));

        let err = def
            .set_property(Some(property(2, "label", ValueKind::Text)))
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleValue { .. }));
    }

    #[test]
    fn test_frozen_definition_rejects_edits() {
        let mut def = AttributeDefinition::new(4);
        def.freeze();
        let err = def.set_value(None).unwrap_err();
        assert_eq!(err.key(), "state.not_editable");
    }

    #[test]
    fn test_equality_ignores_number() {
        let p = property(1, "unit", ValueKind::Text);
        let a = AttributeDefinition::with_property(1, Arc::clone(&p), Some(Value::from("kg")))
            .unwrap();
        let b = AttributeDefinition::with_property(2, p, Some(Value::from("kg"))).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, AttributeDefinition::erasing(1));
    }

    #[test]
    fn test_merge_overwrites_per_field() {
        let p = property(1, "unit", ValueKind::Text);
        let mut base =
            AttributeDefinition::with_property(1, Arc::clone(&p), Some(Value::from("x")))
                .unwrap();
        let mut derived = AttributeDefinition::new(1);
        derived.set_value(Some(Value::from("y"))).unwrap();

        base.merge_from(&derived).unwrap();
        assert_eq!(base.property(), Some(&p));
        assert_eq!(base.value(), Some(&Value::from("y")));
    }

    #[test]
    fn test_merge_checks_merged_pair() {
        let mut base = AttributeDefinition::with_property(
            1,
            property(1, "unit", ValueKind::Text),
            Some(Value::from("x")),
        )
        .unwrap();
        let mut retyped = AttributeDefinition::new(1);
        retyped
            .set_property(Some(property(2, "count", ValueKind::Integer)))
            .unwrap();
        assert!(base.clone().merge_from(&retyped).is_err());

        retyped.set_value(Some(Value::Integer(3))).unwrap();
        base.merge_from(&retyped).unwrap();
        assert_eq!(base.value(), Some(&Value::Integer(3)));
    }
}
