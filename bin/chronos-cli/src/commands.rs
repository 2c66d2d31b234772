//! Command handlers and their output
//!
//! Handlers return serializable views; [`emit`] renders them as text tables
//! or as JSON.

use anyhow::Result;
use chronos_common::Surrogate;
use chronos_meta::{
    AttributeDefinition, Component, IncompleteSchema, MetaDatabase, Schema, SeriesDefinition,
};
use serde::Serialize;
use std::fmt::Write;
use std::sync::atomic::Ordering;

/// Output that can be printed as text
pub trait Render: Serialize {
    fn render(&self, out: &mut String) -> std::fmt::Result;
}

/// Format a view for the terminal
pub fn emit<T: Render>(json: bool, view: &T) -> Result<String> {
    if json {
        return Ok(serde_json::to_string_pretty(view)?);
    }
    let mut out = String::new();
    view.render(&mut out)?;
    Ok(out)
}

fn header(out: &mut String, title: &str) -> std::fmt::Result {
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "=".repeat(title.len()))
}

#[derive(Debug, Serialize)]
pub struct AttributeView {
    pub number: u32,
    pub property: Option<String>,
    pub value: Option<String>,
}

impl From<&AttributeDefinition> for AttributeView {
    fn from(definition: &AttributeDefinition) -> Self {
        Self {
            number: definition.number(),
            property: definition.property().map(|p| p.name().to_string()),
            value: definition.value().map(ToString::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SeriesView {
    pub number: u32,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub time_domain: Option<String>,
    pub description: Option<String>,
    pub attributes: Vec<AttributeView>,
}

impl From<&SeriesDefinition> for SeriesView {
    fn from(series: &SeriesDefinition) -> Self {
        Self {
            number: series.number(),
            name: series.name().map(str::to_owned),
            kind: series.value_kind().map(|k| k.to_string()),
            time_domain: series.time_domain().map(str::to_owned),
            description: series.description().map(str::to_owned),
            attributes: series.custom_attributes().map(AttributeView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SchemaView {
    pub name: String,
    pub base: Option<String>,
    pub incompleteness: Option<String>,
    pub dependencies: Vec<String>,
    pub attributes: Vec<AttributeView>,
    pub series: Vec<SeriesView>,
}

impl Render for SchemaView {
    fn render(&self, out: &mut String) -> std::fmt::Result {
        header(out, &format!("Schema: {}", self.name))?;
        writeln!(out, "Base: {}", self.base.as_deref().unwrap_or("-"))?;
        writeln!(out, "Resolved from: {}", self.dependencies.join(" <- "))?;
        match &self.incompleteness {
            Some(reason) => writeln!(out, "Complete: no ({reason})")?,
            None => writeln!(out, "Complete: yes")?,
        }
        writeln!(out)?;
        writeln!(out, "{:<8} {:<30} {:<30}", "#", "PROPERTY", "VALUE")?;
        writeln!(out, "{}", "-".repeat(70))?;
        for attribute in &self.attributes {
            render_attribute(out, attribute, "")?;
        }
        for series in &self.series {
            writeln!(out)?;
            writeln!(
                out,
                "Series #{} {} ({}, {})",
                series.number,
                series.name.as_deref().unwrap_or("?"),
                series.kind.as_deref().unwrap_or("?"),
                series.time_domain.as_deref().unwrap_or("?"),
            )?;
            if let Some(description) = &series.description {
                writeln!(out, "  {description}")?;
            }
            for attribute in &series.attributes {
                render_attribute(out, attribute, "  ")?;
            }
        }
        Ok(())
    }
}

fn render_attribute(out: &mut String, attribute: &AttributeView, indent: &str) -> std::fmt::Result {
    writeln!(
        out,
        "{indent}{:<8} {:<30} {:<30}",
        attribute.number,
        attribute.property.as_deref().unwrap_or("?"),
        attribute.value.as_deref().unwrap_or("-"),
    )
}

#[derive(Debug, Serialize)]
pub struct NameList {
    pub title: String,
    pub names: Vec<String>,
}

impl Render for NameList {
    fn render(&self, out: &mut String) -> std::fmt::Result {
        header(out, &self.title)?;
        if self.names.is_empty() {
            return writeln!(out, "(none)");
        }
        for name in &self.names {
            writeln!(out, "{name}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct PropertyView {
    pub name: String,
    pub value_type: String,
    pub indexed: bool,
}

#[derive(Debug, Serialize)]
pub struct PropertyList(pub Vec<PropertyView>);

impl Render for PropertyList {
    fn render(&self, out: &mut String) -> std::fmt::Result {
        header(out, "Properties")?;
        if self.0.is_empty() {
            return writeln!(out, "No properties found");
        }
        writeln!(out, "{:<30} {:<20} {:<8}", "NAME", "VALUE TYPE", "INDEXED")?;
        writeln!(out, "{}", "-".repeat(60))?;
        for property in &self.0 {
            writeln!(
                out,
                "{:<30} {:<20} {:<8}",
                property.name, property.value_type, property.indexed
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ChronicleView {
    pub full_name: String,
    pub name: String,
    pub description: Option<String>,
    pub top_level: bool,
    pub schema: SchemaView,
}

impl Render for ChronicleView {
    fn render(&self, out: &mut String) -> std::fmt::Result {
        header(out, &format!("Chronicle: {}", self.full_name))?;
        writeln!(out, "Name: {}", self.name)?;
        writeln!(out, "Top level: {}", self.top_level)?;
        if let Some(description) = &self.description {
            writeln!(out, "Description: {description}")?;
        }
        writeln!(out)?;
        self.schema.render(out)
    }
}

#[derive(Debug, Serialize)]
pub struct SharedSchemaView {
    pub name: String,
    pub chronicles: usize,
}

#[derive(Debug, Serialize)]
pub struct CacheView {
    pub capacity: usize,
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub stores: u64,
    pub hit_ratio: f64,
    pub schemas: Vec<SharedSchemaView>,
}

impl Render for CacheView {
    fn render(&self, out: &mut String) -> std::fmt::Result {
        header(out, "Metadata Cache")?;
        writeln!(out, "Chronicles: {}/{}", self.size, self.capacity)?;
        writeln!(out, "Stores: {}", self.stores)?;
        writeln!(out, "Hits: {}", self.hits)?;
        writeln!(out, "Misses: {}", self.misses)?;
        writeln!(out, "Evictions: {}", self.evictions)?;
        writeln!(out, "Hit ratio: {:.2}", self.hit_ratio)?;
        writeln!(out)?;
        writeln!(out, "{:<30} {:<10}", "SHARED SCHEMA", "CHRONICLES")?;
        writeln!(out, "{}", "-".repeat(42))?;
        for schema in &self.schemas {
            writeln!(out, "{:<30} {:<10}", schema.name, schema.chronicles)?;
        }
        Ok(())
    }
}

fn schema_name(db: &MetaDatabase, surrogate: &Surrogate) -> Result<String> {
    Ok(db
        .store()
        .load_schema(surrogate)?
        .map_or_else(|| surrogate.to_string(), |s| s.name().to_string()))
}

fn schema_view(db: &MetaDatabase, schema: &Schema, base: Option<String>) -> Result<SchemaView> {
    let dependencies = schema
        .dependencies()
        .iter()
        .map(|s| schema_name(db, s))
        .collect::<Result<_>>()?;
    Ok(SchemaView {
        name: schema.name().to_string(),
        base,
        incompleteness: schema.incompleteness(),
        dependencies,
        attributes: schema
            .attribute_definitions()
            .iter()
            .map(AttributeView::from)
            .collect(),
        series: schema.series_definitions().iter().map(SeriesView::from).collect(),
    })
}

pub fn list_schemas(db: &MetaDatabase, pattern: &str) -> Result<NameList> {
    Ok(NameList {
        title: "Schemas".to_string(),
        names: db.store().schemas_matching(pattern)?,
    })
}

/// Merged view of a schema, incomplete or not
pub fn show_schema(db: &MetaDatabase, name: &str) -> Result<SchemaView> {
    let editable = db
        .store()
        .editable_schema(name)?
        .ok_or_else(|| chronos_common::Error::SchemaNotFound(name.to_string()))?;
    let merged = editable.merge(db.store().as_ref())?;
    schema_view(db, &merged, editable.base().map(str::to_owned))
}

/// Fully resolve a schema, failing if it is incomplete
pub fn check_schema(db: &MetaDatabase, name: &str) -> Result<SchemaView> {
    let resolved = db.schema(name)?;
    let base = db
        .store()
        .editable_schema(name)?
        .and_then(|s| s.base().map(str::to_owned));
    schema_view(db, &resolved, base)
}

pub fn schema_dependencies(db: &MetaDatabase, name: &str) -> Result<NameList> {
    let view = show_schema(db, name)?;
    Ok(NameList {
        title: format!("Dependencies of {name}"),
        names: view.dependencies,
    })
}

pub fn list_properties(db: &MetaDatabase, pattern: &str) -> Result<PropertyList> {
    let mut properties: Vec<PropertyView> = chronos_meta::builtins()
        .properties()
        .into_iter()
        .filter(|p| chronos_meta::matches_pattern(pattern, p.name()))
        .chain(db.store().properties_matching(pattern)?.iter())
        .map(|p| PropertyView {
            name: p.name().to_string(),
            value_type: p.value_type().name().to_string(),
            indexed: p.is_indexed(),
        })
        .collect();
    properties.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(PropertyList(properties))
}

pub fn show_chronicle(db: &MetaDatabase, full_name: &str) -> Result<ChronicleView> {
    let chronicle = db.chronicle(full_name)?;
    let base = db
        .store()
        .editable_schema(chronicle.schema().name())?
        .and_then(|s| s.base().map(str::to_owned));
    Ok(ChronicleView {
        full_name: chronicle.full_name().to_string(),
        name: chronicle.name().to_string(),
        description: chronicle.description().map(str::to_owned),
        top_level: chronicle.is_top_level(),
        schema: schema_view(db, chronicle.schema(), base)?,
    })
}

/// Look every chronicle up through the cache and report how it is shared
pub fn cache_stats(db: &MetaDatabase, chronicles: &[String]) -> Result<CacheView> {
    let mut schemas: Vec<Surrogate> = Vec::new();
    for full_name in chronicles {
        let chronicle = db.chronicle(full_name)?;
        let surrogate = chronicle.schema().surrogate();
        if !schemas.contains(surrogate) {
            schemas.push(surrogate.clone());
        }
    }
    let cache = db.cache();
    let shared = schemas
        .iter()
        .filter_map(|s| cache.schema_ref_count(s).map(|refs| (s, refs)))
        .map(|(s, chronicles)| {
            Ok(SharedSchemaView {
                name: schema_name(db, s)?,
                chronicles,
            })
        })
        .collect::<Result<_>>()?;
    let stats = cache.stats();
    Ok(CacheView {
        capacity: cache.capacity(),
        size: cache.size(),
        hits: stats.hits.load(Ordering::Relaxed),
        misses: stats.misses.load(Ordering::Relaxed),
        evictions: stats.evictions.load(Ordering::Relaxed),
        stores: stats.stores.load(Ordering::Relaxed),
        hit_ratio: stats.hit_ratio(),
        schemas: shared,
    })
}
