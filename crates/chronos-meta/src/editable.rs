//! Editable schemas and schema resolution
//!
//! An [`EditableSchema`] is the mutable form of a schema, edited during one
//! session and optionally extending a base schema. Resolving it walks the
//! base chain, rejects cycles, and merges every schema of the chain into one
//! immutable [`Schema`]:
//!
//! ```text
//!   derived ──base──▶ middle ──base──▶ root
//!
//!   accumulator = {}
//!   merge(root) → merge(middle) → merge(derived) → consolidate
//! ```
//!
//! Merging is last-writer-wins per field: a derived definition overrides the
//! property and the default value it sets and inherits the others. An erasing
//! definition removes the inherited definition of the same number.

use chronos_common::config::ResolutionConfig;
use chronos_common::{Error, Result, Surrogate};
use std::borrow::Cow;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::attribute::{AttributeDefinition, map_properties};
use crate::backend::{MetaStore, SchemaSource};
use crate::cache::MetadataCache;
use crate::component::{Component, DefinitionKey};
use crate::container::ComponentContainer;
use crate::property::Property;
use crate::schema::{IncompleteSchema, Schema};
use crate::series::SeriesDefinition;
use crate::value::Value;

/// What an edit session changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Changes {
    /// The base schema was replaced
    pub base: bool,
    /// Definitions were added, deleted, erased or redefined
    pub structure: bool,
    /// Only default values were changed
    pub values: bool,
}

impl Changes {
    pub const fn any(&self) -> bool {
        self.base || self.structure || self.values
    }
}

/// Mutable schema, edited in a session and resolved into a [`Schema`]
#[derive(Debug, Clone)]
pub struct EditableSchema {
    surrogate: Surrogate,
    name: String,
    base: Option<String>,
    attributes: ComponentContainer<AttributeDefinition>,
    series: ComponentContainer<SeriesDefinition>,
    editing: bool,
    changes: Changes,
}

impl EditableSchema {
    /// New schema in edit mode; the surrogate is normally in construction
    pub fn new(surrogate: Surrogate, name: impl Into<String>) -> Self {
        Self {
            surrogate,
            name: name.into(),
            base: None,
            attributes: ComponentContainer::new(),
            series: ComponentContainer::new(),
            editing: true,
            changes: Changes::default(),
        }
    }

    pub const fn surrogate(&self) -> &Surrogate {
        &self.surrogate
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the base schema
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub const fn is_editing(&self) -> bool {
        self.editing
    }

    pub const fn changes(&self) -> Changes {
        self.changes
    }

    pub const fn series_definitions(&self) -> &ComponentContainer<SeriesDefinition> {
        &self.series
    }

    pub fn series_definition<'k>(
        &self,
        key: impl Into<DefinitionKey<'k>>,
        must_exist: bool,
    ) -> Result<Option<&SeriesDefinition>> {
        let key = key.into();
        match self.series.lookup(key) {
            Some(series) => Ok(Some(series)),
            None if must_exist => Err(self.series_not_found(key)),
            None => Ok(None),
        }
    }

    fn series_not_found(&self, key: DefinitionKey<'_>) -> Error {
        Error::SeriesNotFound {
            owner: self.label(),
            key: key.to_string(),
        }
    }

    fn attribute_not_found(&self, number: u32) -> Error {
        Error::AttributeNotFound {
            owner: self.label(),
            key: DefinitionKey::Number(number).to_string(),
        }
    }

    fn duplicate(container: &str, number: u32) -> Error {
        Error::DuplicateNumber {
            container: container.to_string(),
            number,
        }
    }

    /// Start an edit session
    pub fn edit(&mut self) {
        self.editing = true;
    }

    fn ensure_editing(&self) -> Result<()> {
        if self.editing {
            Ok(())
        } else {
            Err(Error::not_editable(self.label()))
        }
    }

    fn structural_edit(&mut self) -> Result<()> {
        self.ensure_editing()?;
        if self.changes.base {
            warn!(schema = %self.name, "rejected definition edit after base change");
            return Err(Error::ConflictingEdit {
                schema: self.name.clone(),
                reason: "definitions cannot be edited in the session that changes the base"
                    .to_string(),
            });
        }
        self.changes.structure = true;
        Ok(())
    }

    fn value_edit(&mut self) -> Result<()> {
        self.ensure_editing()?;
        self.changes.values = true;
        Ok(())
    }

    /// Replace the base schema
    pub fn set_base(&mut self, base: Option<&str>) -> Result<()> {
        self.ensure_editing()?;
        if base == self.base.as_deref() {
            return Ok(());
        }
        if self.changes.structure {
            warn!(schema = %self.name, "rejected base change after definition edit");
            return Err(Error::ConflictingEdit {
                schema: self.name.clone(),
                reason: "the base cannot change in the session that edits definitions"
                    .to_string(),
            });
        }
        if base == Some(self.name.as_str()) {
            return Err(Error::SchemaCycle {
                chain: vec![self.name.clone(), self.name.clone()],
            });
        }
        self.base = base.map(str::to_owned);
        self.changes.base = true;
        Ok(())
    }

    pub fn add_attribute(&mut self, definition: AttributeDefinition) -> Result<()> {
        self.structural_edit()?;
        let number = definition.number();
        if self.attributes.add(definition)? {
            Ok(())
        } else {
            Err(Self::duplicate(AttributeDefinition::LABEL, number))
        }
    }

    pub fn delete_attribute(&mut self, number: u32) -> Result<bool> {
        self.structural_edit()?;
        Ok(self.attributes.delete(number))
    }

    /// Mark attribute `number` as removed from the inherited definitions
    pub fn erase_attribute(&mut self, number: u32) -> Result<()> {
        self.structural_edit()?;
        self.attributes.erase(number)
    }

    /// Change the default value of an attribute; allowed in any session
    pub fn set_attribute_value(&mut self, number: u32, value: Option<Value>) -> Result<()> {
        self.value_edit()?;
        self.attributes
            .edit_component(number, |definition| definition.set_value(value))?
            .ok_or_else(|| self.attribute_not_found(number))
    }

    /// Redefine an attribute
    pub fn edit_attribute<R>(
        &mut self,
        number: u32,
        f: impl FnOnce(&mut AttributeDefinition) -> Result<R>,
    ) -> Result<R> {
        self.structural_edit()?;
        self.attributes
            .edit_component(number, f)?
            .ok_or_else(|| self.attribute_not_found(number))
    }

    pub fn add_series(&mut self, series: SeriesDefinition) -> Result<()> {
        self.structural_edit()?;
        let number = series.number();
        if self.series.add(series)? {
            Ok(())
        } else {
            Err(Self::duplicate(SeriesDefinition::LABEL, number))
        }
    }

    pub fn delete_series(&mut self, number: u32) -> Result<bool> {
        self.structural_edit()?;
        Ok(self.series.delete(number))
    }

    /// Mark series `number` as removed from the inherited definitions
    pub fn erase_series(&mut self, number: u32) -> Result<()> {
        self.structural_edit()?;
        self.series.erase(number)
    }

    /// Redefine a series; renames are reflected in the series name index
    pub fn edit_series<R>(
        &mut self,
        number: u32,
        f: impl FnOnce(&mut SeriesDefinition) -> Result<R>,
    ) -> Result<R> {
        self.structural_edit()?;
        self.series
            .edit_component(number, f)?
            .ok_or_else(|| self.series_not_found(DefinitionKey::Number(number)))
    }

    pub fn add_series_attribute(
        &mut self,
        series: u32,
        definition: AttributeDefinition,
    ) -> Result<()> {
        let number = definition.number();
        let added = self.edit_series(series, |s| s.add_attribute(definition))?;
        if added {
            Ok(())
        } else {
            Err(Self::duplicate(&format!("series #{series} attribute"), number))
        }
    }

    pub fn delete_series_attribute(&mut self, series: u32, number: u32) -> Result<bool> {
        self.edit_series(series, |s| s.delete_attribute(number))
    }

    pub fn erase_series_attribute(&mut self, series: u32, number: u32) -> Result<()> {
        self.edit_series(series, |s| s.erase_attribute(number))
    }

    /// Change the default value of a series attribute; allowed in any session
    pub fn set_series_attribute_value(
        &mut self,
        series: u32,
        number: u32,
        value: Option<Value>,
    ) -> Result<()> {
        self.value_edit()?;
        let owner = self.label();
        let edited = self
            .series
            .edit_component(series, |s| {
                s.edit_attribute(number, |definition| definition.set_value(value))
            })?
            .ok_or_else(|| self.series_not_found(DefinitionKey::Number(series)))?;
        edited.ok_or_else(|| Error::AttributeNotFound {
            owner: format!("{owner}, series #{series}"),
            key: DefinitionKey::Number(number).to_string(),
        })
    }

    /// This schema followed by its base schemas, most derived first.
    ///
    /// Fails with [`Error::SchemaCycle`] if a schema name repeats, reporting
    /// the whole chain including the repeated name.
    pub fn chain<'a, S>(&'a self, source: &S, max_depth: usize) -> Result<Vec<Cow<'a, Self>>>
    where
        S: SchemaSource + ?Sized,
    {
        let mut chain = vec![Cow::Borrowed(self)];
        let mut visited = HashSet::from([self.name.clone()]);
        let mut next = self.base.clone();

        while let Some(name) = next {
            let names = || chain.iter().map(|s| s.name.clone()).collect::<Vec<_>>();
            if !visited.insert(name.clone()) {
                let mut cycle = names();
                cycle.push(name);
                warn!(schema = %self.name, chain = ?cycle, "cycle in base schema chain");
                return Err(Error::SchemaCycle { chain: cycle });
            }
            if chain.len() >= max_depth {
                let mut too_deep = names();
                too_deep.push(name);
                return Err(Error::SchemaChainTooDeep {
                    schema: self.name.clone(),
                    max_depth,
                    chain: too_deep,
                });
            }
            let base = source
                .editable_schema(&name)?
                .ok_or_else(|| Error::SchemaNotFound(name.clone()))?;
            next = base.base.clone();
            chain.push(Cow::Owned(base));
        }
        Ok(chain)
    }

    /// Surrogates of this schema and all its base schemas, most derived first
    pub fn dependencies<S>(&self, source: &S, max_depth: usize) -> Result<Vec<Surrogate>>
    where
        S: SchemaSource + ?Sized,
    {
        Ok(self
            .chain(source, max_depth)?
            .iter()
            .map(|s| s.surrogate.clone())
            .collect())
    }

    /// Flatten the base chain without checking completeness
    pub fn merge<S>(&self, source: &S) -> Result<Schema>
    where
        S: SchemaSource + ?Sized,
    {
        self.merge_with(source, ResolutionConfig::default().max_depth)
    }

    fn merge_with<S>(&self, source: &S, max_depth: usize) -> Result<Schema>
    where
        S: SchemaSource + ?Sized,
    {
        let chain = self.chain(source, max_depth)?;
        let dependencies = chain.iter().map(|s| s.surrogate.clone()).collect();

        let mut attributes = ComponentContainer::new();
        let mut series = ComponentContainer::new();
        for schema in chain.iter().rev() {
            debug!(schema = %self.name, merging = %schema.name, "merging schema");
            merge_attributes(&mut attributes, &schema.attributes)?;
            merge_series(&mut series, &schema.series)?;
        }
        attributes.consolidate();
        series.consolidate();

        Ok(Schema::new(
            self.surrogate.clone(),
            self.name.clone(),
            attributes,
            series,
            dependencies,
        ))
    }

    /// Flatten the base chain into a complete schema
    pub fn resolve<S>(&self, source: &S) -> Result<Schema>
    where
        S: SchemaSource + ?Sized,
    {
        self.resolve_with(source, &ResolutionConfig::default())
    }

    /// Flatten the base chain with explicit resolution settings
    pub fn resolve_with<S>(&self, source: &S, config: &ResolutionConfig) -> Result<Schema>
    where
        S: SchemaSource + ?Sized,
    {
        let schema = self.merge_with(source, config.max_depth)?;
        if config.require_complete {
            schema.ensure_complete()?;
        }
        debug!(
            schema = %self.name,
            dependencies = schema.dependencies().len(),
            "resolved schema"
        );
        Ok(schema)
    }

    /// Persist the session's edits and invalidate cached copies.
    ///
    /// A schema in construction is created and its surrogate upgraded with
    /// the assigned id; an existing one is cleared from the cache before the
    /// backend update. Pending edits are committed and the session closed only
    /// once the backend accepted them.
    pub fn apply_updates<S>(&mut self, store: &S, cache: &MetadataCache) -> Result<()>
    where
        S: MetaStore + ?Sized,
    {
        self.ensure_editing()?;
        self.chain(store, ResolutionConfig::default().max_depth)?;

        if self.surrogate.is_in_construction() {
            let id = store.create_schema(self)?;
            self.surrogate.upgrade(id)?;
            info!(schema = %self.name, id, "created schema");
        } else {
            cache.clear_schema(&self.surrogate);
            store.update_schema(self)?;
            info!(schema = %self.name, changes = ?self.changes, "updated schema");
        }
        self.close_session();
        Ok(())
    }

    /// Commit pending container edits and leave edit mode
    pub(crate) fn close_session(&mut self) {
        self.attributes.consolidate();
        self.series.consolidate();
        self.editing = false;
        self.changes = Changes::default();
    }

    pub(crate) fn upgrade_surrogate(&mut self, id: u64) -> Result<()> {
        self.surrogate.upgrade(id)
    }

    /// Every property referenced by this schema's own definitions
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
            attributes,
            series,
            ..self.clone()
        })
    }
}

impl IncompleteSchema for EditableSchema {
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

fn merge_attributes(
    accumulator: &mut ComponentContainer<AttributeDefinition>,
    definitions: &ComponentContainer<AttributeDefinition>,
) -> Result<()> {
    accumulator.merge_level(
        definitions,
        AttributeDefinition::new,
        AttributeDefinition::merge_from,
    )
}

fn merge_series(
    accumulator: &mut ComponentContainer<SeriesDefinition>,
    definitions: &ComponentContainer<SeriesDefinition>,
) -> Result<()> {
    accumulator.merge_level(definitions, SeriesDefinition::new, SeriesDefinition::merge_from)
}
