//! JSON catalog of metadata objects
//!
//! A catalog lists value types, properties, schemas and chronicles. Loading
//! it creates every object through the database facade, so the same checks
//! apply as for any other client.

use anyhow::{Context, Result, bail};
use chronos_common::{ObjectKind, Surrogate};
use chronos_meta::{
    AttributeDefinition, EditableSchema, MetaDatabase, Property, SeriesDefinition, Value,
    ValueKind, ValueType,
};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Catalog {
    pub value_types: Vec<ValueTypeEntry>,
    pub properties: Vec<PropertyEntry>,
    pub schemas: Vec<SchemaEntry>,
    pub chronicles: Vec<ChronicleEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ValueTypeEntry {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub nullable: bool,
    /// Allowed values; the type is unrestricted when empty
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PropertyEntry {
    pub name: String,
    pub value_type: String,
    #[serde(default)]
    pub indexed: bool,
}

#[derive(Debug, Deserialize)]
pub struct AttributeEntry {
    pub number: u32,
    #[serde(default)]
    pub property: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub erasing: bool,
}

#[derive(Debug, Deserialize)]
pub struct SeriesEntry {
    pub number: u32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub time_domain: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub erasing: bool,
    #[serde(default)]
    pub attributes: Vec<AttributeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SchemaEntry {
    pub name: String,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeEntry>,
    #[serde(default)]
    pub series: Vec<SeriesEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ChronicleEntry {
    pub name: String,
    pub schema: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Catalog {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read catalog {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse catalog {}", path.display()))
    }

    /// Create every object of the catalog in `db`
    pub fn load_into(&self, db: &MetaDatabase) -> Result<()> {
        for entry in &self.value_types {
            load_value_type(db, entry)?;
        }
        for entry in &self.properties {
            load_property(db, entry)?;
        }
        self.load_schemas(db)?;
        for entry in &self.chronicles {
            db.create_chronicle(&entry.name, entry.description.clone(), &entry.schema)
                .with_context(|| format!("chronicle {}", entry.name))?;
        }
        info!(
            value_types = self.value_types.len(),
            properties = self.properties.len(),
            schemas = self.schemas.len(),
            chronicles = self.chronicles.len(),
            "catalog loaded"
        );
        Ok(())
    }

    /// Create schemas once their base exists, in as many rounds as needed
    fn load_schemas(&self, db: &MetaDatabase) -> Result<()> {
        let mut pending: Vec<&SchemaEntry> = self.schemas.iter().collect();
        while !pending.is_empty() {
            let (ready, waiting): (Vec<_>, Vec<_>) = pending.into_iter().partition(|entry| {
                entry.base.as_deref().is_none_or(|base| {
                    db.store()
                        .editable_schema(base)
                        .is_ok_and(|schema| schema.is_some())
                })
            });
            if ready.is_empty() {
                let names: Vec<&str> = waiting.iter().map(|e| e.name.as_str()).collect();
                bail!("schemas with a missing or cyclic base: {}", names.join(", "));
            }
            for entry in ready {
                create_schema(db, entry).with_context(|| format!("schema {}", entry.name))?;
            }
            pending = waiting;
        }
        Ok(())
    }
}

fn load_value_type(db: &MetaDatabase, entry: &ValueTypeEntry) -> Result<()> {
    let store = db.store();
    let kind: ValueKind = entry.kind.parse()?;
    let mut value_type = ValueType::new(
        Surrogate::pending(store.database(), ObjectKind::ValueType),
        &entry.name,
        kind,
    )
    .with_nullable(entry.nullable);
    if !entry.values.is_empty() {
        let values = entry
            .values
            .iter()
            .map(|v| Ok((Value::parse(kind, v)?, None::<String>)))
            .collect::<chronos_common::Result<Vec<_>>>()?;
        value_type = value_type.restricted(values)?;
    }
    store.create_value_type(&value_type)?;
    Ok(())
}

fn load_property(db: &MetaDatabase, entry: &PropertyEntry) -> Result<()> {
    let store = db.store();
    let value_type = store
        .load_value_type(&entry.value_type)?
        .or_else(|| builtin_value_type(&entry.value_type))
        .with_context(|| {
            format!(
                "property {}: unknown value type {}",
                entry.name, entry.value_type
            )
        })?;
    db.create_property(Property::new(
        Surrogate::pending(store.database(), ObjectKind::Property),
        &entry.name,
        value_type,
        entry.indexed,
    ))?;
    Ok(())
}

fn builtin_value_type(name: &str) -> Option<Arc<ValueType>> {
    let builtins = chronos_meta::builtins();
    [&builtins.text, &builtins.series_kind, &builtins.time_domain]
        .into_iter()
        .find(|vt| vt.name() == name)
        .cloned()
}

fn build_attribute(db: &MetaDatabase, entry: &AttributeEntry) -> Result<AttributeDefinition> {
    let mut definition = AttributeDefinition::new(entry.number);
    if entry.erasing {
        definition.set_erasing(true)?;
        return Ok(definition);
    }
    if let Some(property) = &entry.property {
        definition.set_property(Some(db.property(property)?))?;
    }
    if let Some(value) = &entry.value {
        definition.parse_value(value)?;
    }
    Ok(definition)
}

/// Only the structural fields named in the entry are set, the rest is
/// inherited from the base schema's series of the same number.
fn build_series(db: &MetaDatabase, entry: &SeriesEntry) -> Result<SeriesDefinition> {
    let mut series = SeriesDefinition::new(entry.number);
    if entry.erasing {
        series.set_erasing(true)?;
        return Ok(series);
    }
    if let Some(name) = &entry.name {
        series.set_name(name)?;
    }
    if let Some(kind) = &entry.kind {
        series.set_value_kind(kind.parse()?)?;
    }
    if let Some(time_domain) = &entry.time_domain {
        series.set_time_domain(time_domain)?;
    }
    if entry.description.is_some() {
        series.set_description(entry.description.clone())?;
    }
    for attribute in &entry.attributes {
        if attribute.erasing {
            series.erase_attribute(attribute.number)?;
        } else if !series.add_attribute(build_attribute(db, attribute)?)? {
            bail!(
                "series #{}: attribute #{} listed twice",
                entry.number,
                attribute.number
            );
        }
    }
    Ok(series)
}

fn add_definitions(
    db: &MetaDatabase,
    schema: &mut EditableSchema,
    entry: &SchemaEntry,
) -> Result<()> {
    for attribute in &entry.attributes {
        schema.add_attribute(build_attribute(db, attribute)?)?;
    }
    for series in &entry.series {
        schema.add_series(build_series(db, series)?)?;
    }
    Ok(())
}

/// A base change and definition edits cannot share a session, so a derived
/// schema is created first and filled in a second session.
fn create_schema(db: &MetaDatabase, entry: &SchemaEntry) -> Result<()> {
    let mut schema = db.new_schema(&entry.name);
    if entry.base.is_some() {
        schema.set_base(entry.base.as_deref())?;
        db.update_schema(&mut schema)?;
        if entry.attributes.is_empty() && entry.series.is_empty() {
            return Ok(());
        }
        schema = db.edit_schema(&entry.name)?;
    }
    add_definitions(db, &mut schema, entry)?;
    db.update_schema(&mut schema)?;
    debug!(schema = %entry.name, base = ?entry.base, "loaded schema");
    Ok(())
}
