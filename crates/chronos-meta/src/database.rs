//! Metadata database facade
//!
//! [`MetaDatabase`] ties the backend, the metadata cache, the permission
//! checker and the naming policy together. Reading a chronicle goes through
//! the cache; a miss loads the stored chronicle, resolves its schema and
//! stores the result, so chronicles sharing a schema share one instance.
//! Every update or deletion invalidates the cache before reaching the backend.

use chronos_common::config::{Config, ResolutionConfig};
use chronos_common::{Error, ObjectKind, Result, Surrogate};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{AllowAll, MetaStore, Permission, PermissionChecker, StoredChronicle};
use crate::cache::MetadataCache;
use crate::chronicle::{Chronicle, NamingPolicy, SeparatorNaming};
use crate::editable::EditableSchema;
use crate::property::Property;
use crate::schema::Schema;

/// Entry point to the metadata of one database
pub struct MetaDatabase {
    store: Arc<dyn MetaStore>,
    cache: MetadataCache,
    permissions: Arc<dyn PermissionChecker>,
    naming: Arc<dyn NamingPolicy>,
    resolution: ResolutionConfig,
}

impl MetaDatabase {
    /// Open the metadata of `store` with every permission granted
    pub fn new(store: Arc<dyn MetaStore>, config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            cache: MetadataCache::from_config(&config.cache)?,
            permissions: Arc::new(AllowAll),
            naming: Arc::new(SeparatorNaming::default()),
            resolution: config.resolution.clone(),
        })
    }

    #[must_use]
    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionChecker>) -> Self {
        self.permissions = permissions;
        self
    }

    #[must_use]
    pub fn with_naming(mut self, naming: Arc<dyn NamingPolicy>) -> Self {
        self.naming = naming;
        self
    }

    pub fn store(&self) -> &Arc<dyn MetaStore> {
        &self.store
    }

    pub const fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn naming(&self) -> &dyn NamingPolicy {
        self.naming.as_ref()
    }

    fn check(&self, permission: Permission, object: &Surrogate) -> Result<()> {
        self.permissions.check(permission, object).inspect_err(|_| {
            warn!(%permission, object = %object, "permission denied");
        })
    }

    fn load_schema(&self, name: &str) -> Result<EditableSchema> {
        self.store
            .editable_schema(name)?
            .ok_or_else(|| Error::SchemaNotFound(name.to_string()))
    }

    /// Start a new schema in edit mode
    pub fn new_schema(&self, name: &str) -> EditableSchema {
        EditableSchema::new(
            Surrogate::pending(self.store.database(), ObjectKind::Schema),
            name,
        )
    }

    /// Stored schema in edit mode
    pub fn edit_schema(&self, name: &str) -> Result<EditableSchema> {
        let mut schema = self.load_schema(name)?;
        self.check(Permission::Modify, schema.surrogate())?;
        schema.edit();
        Ok(schema)
    }

    /// Resolved form of a stored schema
    pub fn schema(&self, name: &str) -> Result<Schema> {
        let schema = self.load_schema(name)?;
        self.check(Permission::Read, schema.surrogate())?;
        schema.resolve_with(self.store.as_ref(), &self.resolution)
    }

    /// Persist the edits of a schema session
    pub fn update_schema(&self, schema: &mut EditableSchema) -> Result<()> {
        let permission = if schema.surrogate().is_in_construction() {
            Permission::Create
        } else {
            Permission::Modify
        };
        self.check(permission, schema.surrogate())?;
        schema.apply_updates(self.store.as_ref(), &self.cache)
    }

    /// Delete a schema no other schema or chronicle depends on
    pub fn delete_schema(&self, name: &str) -> Result<()> {
        let schema = self.load_schema(name)?;
        self.check(Permission::Delete, schema.surrogate())?;

        // Check if another schema extends it, directly or not
        for other in self.store.schemas_matching("*")? {
            if other == name {
                continue;
            }
            let dependencies = self
                .load_schema(&other)?
                .dependencies(self.store.as_ref(), self.resolution.max_depth)?;
            if dependencies.contains(schema.surrogate()) {
                return Err(Error::SchemaInUse {
                    schema: name.to_string(),
                    dependent: format!("schema {other}"),
                });
            }
        }
        if let Some(chronicle) = self.store.chronicles_using(schema.surrogate())?.first() {
            return Err(Error::SchemaInUse {
                schema: name.to_string(),
                dependent: format!("chronicle {chronicle}"),
            });
        }

        self.cache.clear_schema(schema.surrogate());
        self.store.delete_schema(schema.surrogate())?;
        info!(schema = %name, "deleted schema");
        Ok(())
    }

    /// Built-in or stored property
    pub fn property(&self, name: &str) -> Result<Arc<Property>> {
        if let Some(property) = self.cache.look_up_property(name) {
            return Ok(property);
        }
        self.store
            .load_property(name)?
            .ok_or_else(|| Error::PropertyNotFound(name.to_string()))
    }

    /// Persist a new property, returning it with its assigned identity
    pub fn create_property(&self, mut property: Property) -> Result<Arc<Property>> {
        self.check(Permission::Create, property.surrogate())?;
        let id = self.store.create_property(&property)?;
        property.upgrade(id)?;
        info!(property = %property.name(), id, "created property");
        Ok(Arc::new(property))
    }

    /// Replace a stored property
    pub fn update_property(&self, property: &Property) -> Result<()> {
        self.check(Permission::Modify, property.surrogate())?;
        self.cache.clear_property(property.surrogate());
        self.store.update_property(property)?;
        info!(property = %property.name(), "updated property");
        Ok(())
    }

    /// Delete a property no stored schema refers to
    pub fn delete_property(&self, name: &str) -> Result<()> {
        let property = self.property(name)?;
        if property.surrogate().database().is_builtin() {
            return Err(Error::invalid_argument(format!(
                "built-in property {name} cannot be deleted"
            )));
        }
        self.check(Permission::Delete, property.surrogate())?;

        for schema_name in self.store.schemas_matching("*")? {
            let schema = self.load_schema(&schema_name)?;
            if schema
                .properties()
                .any(|p| p.surrogate() == property.surrogate())
            {
                return Err(Error::invalid_argument(format!(
                    "property {name} is still used by schema {schema_name}"
                )));
            }
        }

        self.cache.clear_property(property.surrogate());
        self.store.delete_property(property.surrogate())?;
        info!(property = %name, "deleted property");
        Ok(())
    }

    /// Chronicle snapshot with its resolved schema
    pub fn chronicle(&self, full_name: &str) -> Result<Arc<Chronicle>> {
        if let Some(chronicle) = self.cache.look_up_chronicle_by_name(full_name) {
            return Ok(chronicle);
        }

        let stored = self
            .store
            .load_chronicle(full_name)?
            .ok_or_else(|| Error::ChronicleNotFound(full_name.to_string()))?;
        self.check(Permission::Read, &stored.surrogate)?;

        let schema = match self.cache.look_up_schema(&stored.schema) {
            Some(schema) => schema,
            None => {
                let editable = self
                    .store
                    .load_schema(&stored.schema)?
                    .ok_or_else(|| Error::SchemaNotFound(stored.schema.to_string()))?;
                Arc::new(editable.resolve_with(self.store.as_ref(), &self.resolution)?)
            }
        };
        debug!(chronicle = %full_name, schema = %schema.name(), "loaded chronicle");

        let chronicle = Chronicle::new(
            stored.surrogate,
            stored.full_name,
            stored.description,
            stored.parent,
            schema,
            self.naming.as_ref(),
        );
        match self.cache.store(&chronicle)? {
            Some(cached) => Ok(cached),
            None => Ok(self
                .cache
                .look_up_chronicle(chronicle.surrogate())
                .unwrap_or_else(|| Arc::new(chronicle))),
        }
    }

    /// Create a chronicle under an existing parent, using a stored schema
    pub fn create_chronicle(
        &self,
        full_name: &str,
        description: Option<String>,
        schema_name: &str,
    ) -> Result<Arc<Chronicle>> {
        let (parent_name, name) = self.naming.split(full_name);
        self.naming.validate(name)?;

        let parent = match parent_name {
            Some(parent_name) => {
                let parent = self
                    .store
                    .load_chronicle(parent_name)?
                    .ok_or_else(|| Error::ChronicleNotFound(parent_name.to_string()))?;
                self.check(Permission::Create, &parent.surrogate)?;
                Some(parent.surrogate)
            }
            None => None,
        };

        // The schema must resolve before anything uses it
        let schema = self.load_schema(schema_name)?;
        self.check(Permission::Read, schema.surrogate())?;
        schema.resolve_with(self.store.as_ref(), &self.resolution)?;

        let stored = StoredChronicle {
            surrogate: Surrogate::pending(self.store.database(), ObjectKind::Chronicle),
            full_name: full_name.to_string(),
            description,
            parent,
            schema: schema.surrogate().clone(),
        };
        let id = self.store.create_chronicle(&stored)?;
        info!(chronicle = %full_name, schema = %schema_name, id, "created chronicle");
        self.chronicle(full_name)
    }

    /// Delete a chronicle, dropping it from the cache first
    pub fn delete_chronicle(&self, full_name: &str) -> Result<()> {
        let stored = self
            .store
            .load_chronicle(full_name)?
            .ok_or_else(|| Error::ChronicleNotFound(full_name.to_string()))?;
        self.check(Permission::Delete, &stored.surrogate)?;
        self.cache.clear_chronicle(&stored.surrogate);
        self.store.delete_chronicle(&stored.surrogate)?;
        info!(chronicle = %full_name, "deleted chronicle");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeDefinition;
    use crate::backend::MemoryStore;
    use crate::schema::IncompleteSchema;
    use crate::series::SeriesDefinition;
    use crate::value::{Value, ValueKind, ValueType};
    use chronos_common::DatabaseId;

    fn database() -> MetaDatabase {
        MetaDatabase::new(
            Arc::new(MemoryStore::new(DatabaseId::new())),
            &Config::default(),
        )
        .unwrap()
    }

    fn unit(db: &MetaDatabase) -> Arc<Property> {
        let store = db.store();
        let mut text = ValueType::new(
            Surrogate::pending(store.database(), ObjectKind::ValueType),
            "label",
            ValueKind::Text,
        );
        let id = store.create_value_type(&text).unwrap();
        text.upgrade(id).unwrap();
        db.create_property(Property::new(
            Surrogate::pending(store.database(), ObjectKind::Property),
            "unit",
            Arc::new(text),
            false,
        ))
        .unwrap()
    }

    /// Stores "base" (unit = "kg", series price) and "derived" extending it
    fn schemas(db: &MetaDatabase) -> Arc<Property> {
        let unit = unit(db);
        let mut base = db.new_schema("base");
        base.add_attribute(
            AttributeDefinition::with_property(1, Arc::clone(&unit), Some("kg".into())).unwrap(),
        )
        .unwrap();
        base.add_series(
            SeriesDefinition::with_structure(1, "price", ValueKind::Float, "day").unwrap(),
        )
        .unwrap();
        db.update_schema(&mut base).unwrap();

        let mut derived = db.new_schema("derived");
        derived.set_base(Some("base")).unwrap();
        db.update_schema(&mut derived).unwrap();
        unit
    }

    struct ReadOnly;

    impl PermissionChecker for ReadOnly {
        fn check(&self, permission: Permission, object: &Surrogate) -> Result<()> {
            if permission == Permission::Read {
                Ok(())
            } else {
                Err(Error::PermissionDenied {
                    permission: permission.to_string(),
                    object: object.to_string(),
                })
            }
        }
    }

    #[test]
    fn test_chronicles_share_cached_schema() {
        let db = database();
        schemas(&db);
        let a = db.create_chronicle("a", None, "derived").unwrap();
        let b = db.create_chronicle("b", Some("second".into()), "derived").unwrap();

        assert!(Arc::ptr_eq(a.schema(), b.schema()));
        assert_eq!(db.cache().schema_ref_count(a.schema().surrogate()), Some(2));
        assert!(Arc::ptr_eq(&db.chronicle("a").unwrap(), &a));
        assert_eq!(b.description(), Some("second"));
        assert_eq!(a.schema().dependencies().len(), 2);
    }

    #[test]
    fn test_nested_chronicles() {
        let db = database();
        schemas(&db);
        let markets = db.create_chronicle("markets", None, "base").unwrap();
        let smi = db.create_chronicle("markets.smi", None, "derived").unwrap();
        assert_eq!(smi.name(), "smi");
        assert_eq!(smi.parent(), Some(markets.surrogate()));
        assert!(markets.is_top_level());

        let err = db.create_chronicle("nowhere.smi", None, "base").unwrap_err();
        assert_eq!(err, Error::ChronicleNotFound("nowhere".into()));
        assert!(db.create_chronicle("markets.", None, "base").is_err());
    }

    #[test]
    fn test_schema_update_invalidates_cache() {
        let db = database();
        schemas(&db);
        let before = db.create_chronicle("a", None, "derived").unwrap();
        let unit = |c: &Chronicle| {
            c.schema()
                .attribute_definition("unit", true)
                .unwrap()
                .unwrap()
                .value()
                .cloned()
        };
        assert_eq!(unit(&before), Some(Value::from("kg")));

        let mut base = db.edit_schema("base").unwrap();
        base.set_attribute_value(1, Some("g".into())).unwrap();
        db.update_schema(&mut base).unwrap();
        assert!(db.cache().is_empty());

        let after = db.chronicle("a").unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(unit(&after), Some(Value::from("g")));
    }

    #[test]
    fn test_property_update_invalidates_cache() {
        let db = database();
        let unit = schemas(&db);
        db.create_chronicle("a", None, "base").unwrap();

        let indexed = Property::new(
            unit.surrogate().clone(),
            "unit",
            Arc::clone(unit.value_type()),
            true,
        );
        db.update_property(&indexed).unwrap();
        assert!(db.cache().is_empty());

        let a = db.chronicle("a").unwrap();
        let def = a.schema().attribute_definition(1, true).unwrap().unwrap();
        assert!(def.property().unwrap().is_indexed());
    }

    #[test]
    fn test_delete_schema_in_use() {
        let db = database();
        schemas(&db);

        let err = db.delete_schema("base").unwrap_err();
        assert_eq!(
            err,
            Error::SchemaInUse {
                schema: "base".into(),
                dependent: "schema derived".into()
            }
        );

        db.create_chronicle("a", None, "derived").unwrap();
        let err = db.delete_schema("derived").unwrap_err();
        assert_eq!(err.key(), "schema.in_use");

        db.delete_chronicle("a").unwrap();
        assert!(db.chronicle("a").unwrap_err().is_not_found());
        db.delete_schema("derived").unwrap();
        db.delete_schema("base").unwrap();
        assert!(db.schema("base").unwrap_err().is_not_found());
    }

    #[test]
    fn test_delete_property_in_use() {
        let db = database();
        schemas(&db);
        assert!(db.delete_property("unit").is_err());
        assert!(db.delete_property("series.name").is_err());
        assert!(db.delete_property("missing").unwrap_err().is_not_found());

        db.delete_schema("derived").unwrap();
        db.delete_schema("base").unwrap();
        db.delete_property("unit").unwrap();
        assert!(db.property("unit").unwrap_err().is_not_found());
        assert!(db.property("series.time_domain").is_ok());
    }

    #[test]
    fn test_permissions() {
        let db = database();
        schemas(&db);
        db.create_chronicle("a", None, "base").unwrap();
        let db = db.with_permissions(Arc::new(ReadOnly));

        assert!(db.chronicle("a").is_ok());
        assert!(db.schema("derived").is_ok());
        let err = db.edit_schema("base").unwrap_err();
        assert_eq!(err.key(), "permission.denied");
        assert!(db.delete_schema("derived").is_err());
        assert!(db.delete_chronicle("a").is_err());
        assert_eq!(db.cache().size(), 1);
    }

    #[test]
    fn test_incomplete_schema_not_usable() {
        let db = database();
        let mut empty = db.new_schema("empty");
        db.update_schema(&mut empty).unwrap();
        let err = db.create_chronicle("a", None, "empty").unwrap_err();
        assert_eq!(err.key(), "schema.incomplete");
        assert!(db.store().load_chronicle("a").unwrap().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.cache.capacity = 0;
        let store: Arc<dyn MetaStore> = Arc::new(MemoryStore::new(DatabaseId::new()));
        assert!(MetaDatabase::new(store, &config).is_err());
    }
}
