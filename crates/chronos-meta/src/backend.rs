//! Backend contracts and the in-memory backend
//!
//! Persistence, permission checking and name syntax live outside the
//! metadata engine; it reaches them through the traits here.
//! [`MemoryStore`] implements the store contract in memory.

use chronos_common::{DatabaseId, Error, ObjectKind, Result, Surrogate};
use derive_more::Display;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::editable::EditableSchema;
use crate::property::Property;
use crate::value::ValueType;

/// Where base schemas are loaded from during resolution
pub trait SchemaSource {
    /// Stored schema of the given name, not in edit mode
    fn editable_schema(&self, name: &str) -> Result<Option<EditableSchema>>;
}

/// Persisted form of a chronicle
#[derive(Debug, Clone, PartialEq)]
pub struct StoredChronicle {
    pub surrogate: Surrogate,
    pub full_name: String,
    pub description: Option<String>,
    pub parent: Option<Surrogate>,
    pub schema: Surrogate,
}

/// Persistence of metadata objects
pub trait MetaStore: SchemaSource + Send + Sync {
    fn database(&self) -> DatabaseId;

    /// Persist a new schema and return its assigned id
    fn create_schema(&self, schema: &EditableSchema) -> Result<u64>;
    fn update_schema(&self, schema: &EditableSchema) -> Result<()>;
    fn delete_schema(&self, schema: &Surrogate) -> Result<()>;
    fn load_schema(&self, schema: &Surrogate) -> Result<Option<EditableSchema>>;
    /// Names of the schemas matching a `*` wildcard pattern
    fn schemas_matching(&self, pattern: &str) -> Result<Vec<String>>;

    fn create_value_type(&self, value_type: &ValueType) -> Result<u64>;
    fn load_value_type(&self, name: &str) -> Result<Option<Arc<ValueType>>>;

    /// Persist a new property and return its assigned id
    fn create_property(&self, property: &Property) -> Result<u64>;
    /// Replace a property, keeping stored schemas pointing at the new version
    fn update_property(&self, property: &Property) -> Result<()>;
    fn delete_property(&self, property: &Surrogate) -> Result<()>;
    fn load_property(&self, name: &str) -> Result<Option<Arc<Property>>>;
    fn properties_matching(&self, pattern: &str) -> Result<Vec<Arc<Property>>>;

    /// Persist a new chronicle and return its assigned id
    fn create_chronicle(&self, chronicle: &StoredChronicle) -> Result<u64>;
    fn delete_chronicle(&self, chronicle: &Surrogate) -> Result<()>;
    fn load_chronicle(&self, full_name: &str) -> Result<Option<StoredChronicle>>;
    /// Full names of the chronicles stored with the given schema
    fn chronicles_using(&self, schema: &Surrogate) -> Result<Vec<String>>;
}

/// Operation being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Permission {
    #[display("read")]
    Read,
    #[display("create")]
    Create,
    #[display("modify")]
    Modify,
    #[display("delete")]
    Delete,
}

/// Authorization of metadata operations
pub trait PermissionChecker: Send + Sync {
    /// Fail with [`Error::PermissionDenied`] unless `permission` is granted on `object`
    fn check(&self, permission: Permission, object: &Surrogate) -> Result<()>;
}

/// Grants every permission
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn check(&self, _permission: Permission, _object: &Surrogate) -> Result<()> {
        Ok(())
    }
}

/// Match a name against a pattern where `*` stands for any sequence
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = name.strip_prefix(first) else {
        return false;
    };
    let parts: Vec<&str> = parts.collect();
    let Some((last, middle)) = parts.split_last() else {
        return rest.is_empty();
    };
    for part in middle {
        match rest.find(part) {
            Some(i) => rest = &rest[i + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

/// In-memory backend
pub struct MemoryStore {
    database: DatabaseId,
    /// Last assigned id
    next_id: AtomicU64,
    schemas: RwLock<BTreeMap<String, EditableSchema>>,
    value_types: RwLock<BTreeMap<String, Arc<ValueType>>>,
    properties: RwLock<BTreeMap<String, Arc<Property>>>,
    chronicles: RwLock<BTreeMap<String, StoredChronicle>>,
}

impl MemoryStore {
    pub fn new(database: DatabaseId) -> Self {
        Self {
            database,
            next_id: AtomicU64::new(0),
            schemas: RwLock::new(BTreeMap::new()),
            value_types: RwLock::new(BTreeMap::new()),
            properties: RwLock::new(BTreeMap::new()),
            chronicles: RwLock::new(BTreeMap::new()),
        }
    }

    fn allocate(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn check_new(&self, surrogate: &Surrogate, kind: ObjectKind) -> Result<()> {
        if !surrogate.is_in_construction() {
            return Err(Error::invalid_argument(format!(
                "{kind} {surrogate} is already persisted"
            )));
        }
        self.check_owned(surrogate, kind)
    }

    fn check_owned(&self, surrogate: &Surrogate, kind: ObjectKind) -> Result<()> {
        if surrogate.kind() != kind || surrogate.database() != self.database {
            return Err(Error::invalid_argument(format!(
                "{surrogate} is not a {kind} of database {}",
                self.database
            )));
        }
        Ok(())
    }

    /// Create a value type, returning the persisted instance
    pub fn insert_value_type(&self, mut value_type: ValueType) -> Result<Arc<ValueType>> {
        let id = self.create_value_type(&value_type)?;
        value_type.upgrade(id)?;
        Ok(Arc::new(value_type))
    }

    /// Create a property, returning the persisted instance
    pub fn insert_property(&self, property: Property) -> Result<Arc<Property>> {
        self.create_property(&property)?;
        self.load_property(property.name())?
            .ok_or_else(|| Error::internal(format!("property {} vanished", property.name())))
    }

    fn schema_name(
        schemas: &BTreeMap<String, EditableSchema>,
        surrogate: &Surrogate,
    ) -> Option<String> {
        schemas
            .values()
            .find(|s| s.surrogate() == surrogate)
            .map(|s| s.name().to_string())
    }
}

impl SchemaSource for MemoryStore {
    fn editable_schema(&self, name: &str) -> Result<Option<EditableSchema>> {
        Ok(self.schemas.read().get(name).cloned())
    }
}

impl MetaStore for MemoryStore {
    fn database(&self) -> DatabaseId {
        self.database
    }

    fn create_schema(&self, schema: &EditableSchema) -> Result<u64> {
        self.check_new(schema.surrogate(), ObjectKind::Schema)?;
        let mut schemas = self.schemas.write();
        if schemas.contains_key(schema.name()) {
            return Err(Error::invalid_argument(format!(
                "schema {} already exists",
                schema.name()
            )));
        }
        let id = self.allocate();
        let mut stored = schema.clone();
        stored.upgrade_surrogate(id)?;
        stored.close_session();
        schemas.insert(schema.name().to_string(), stored);
        debug!(schema = %schema.name(), id, "stored new schema");
        Ok(id)
    }

    fn update_schema(&self, schema: &EditableSchema) -> Result<()> {
        let mut schemas = self.schemas.write();
        let old_name = Self::schema_name(&schemas, schema.surrogate())
            .ok_or_else(|| Error::SchemaNotFound(schema.surrogate().to_string()))?;
        if old_name != schema.name() && schemas.contains_key(schema.name()) {
            return Err(Error::invalid_argument(format!(
                "schema {} already exists",
                schema.name()
            )));
        }
        schemas.remove(&old_name);
        let mut stored = schema.clone();
        stored.close_session();
        schemas.insert(schema.name().to_string(), stored);
        Ok(())
    }

    fn delete_schema(&self, schema: &Surrogate) -> Result<()> {
        let mut schemas = self.schemas.write();
        let name = Self::schema_name(&schemas, schema)
            .ok_or_else(|| Error::SchemaNotFound(schema.to_string()))?;
        schemas.remove(&name);
        Ok(())
    }

    fn load_schema(&self, schema: &Surrogate) -> Result<Option<EditableSchema>> {
        Ok(self
            .schemas
            .read()
            .values()
            .find(|s| s.surrogate() == schema)
            .cloned())
    }

    fn schemas_matching(&self, pattern: &str) -> Result<Vec<String>> {
        Ok(self
            .schemas
            .read()
            .keys()
            .filter(|name| matches_pattern(pattern, name))
            .cloned()
            .collect())
    }

    fn create_value_type(&self, value_type: &ValueType) -> Result<u64> {
        self.check_new(value_type.surrogate(), ObjectKind::ValueType)?;
        let mut value_types = self.value_types.write();
        if value_types.contains_key(value_type.name()) {
            return Err(Error::invalid_argument(format!(
                "value type {} already exists",
                value_type.name()
            )));
        }
        let id = self.allocate();
        let mut stored = value_type.clone();
        stored.upgrade(id)?;
        value_types.insert(value_type.name().to_string(), Arc::new(stored));
        Ok(id)
    }

    fn load_value_type(&self, name: &str) -> Result<Option<Arc<ValueType>>> {
        Ok(self.value_types.read().get(name).cloned())
    }

    fn create_property(&self, property: &Property) -> Result<u64> {
        self.check_new(property.surrogate(), ObjectKind::Property)?;
        let mut properties = self.properties.write();
        if properties.contains_key(property.name()) {
            return Err(Error::invalid_argument(format!(
                "property {} already exists",
                property.name()
            )));
        }
        let id = self.allocate();
        let mut stored = property.clone();
        stored.upgrade(id)?;
        properties.insert(property.name().to_string(), Arc::new(stored));
        debug!(property = %property.name(), id, "stored new property");
        Ok(id)
    }

    fn update_property(&self, property: &Property) -> Result<()> {
        self.check_owned(property.surrogate(), ObjectKind::Property)?;
        let mut schemas = self.schemas.write();
        let mut properties = self.properties.write();
        let old_name = properties
            .values()
            .find(|p| p.surrogate() == property.surrogate())
            .map(|p| p.name().to_string())
            .ok_or_else(|| Error::PropertyNotFound(property.surrogate().to_string()))?;
        if old_name != property.name() && properties.contains_key(property.name()) {
            return Err(Error::invalid_argument(format!(
                "property {} already exists",
                property.name()
            )));
        }

        let updated = Arc::new(property.clone());
        let mut rewritten = BTreeMap::new();
        for (name, schema) in schemas.iter() {
            let mapped = schema.map_properties(&mut |p: &Arc<Property>| {
                Ok(if p.surrogate() == updated.surrogate() {
                    Arc::clone(&updated)
                } else {
                    Arc::clone(p)
                })
            })?;
            rewritten.insert(name.clone(), mapped);
        }
        *schemas = rewritten;
        properties.remove(&old_name);
        properties.insert(property.name().to_string(), updated);
        Ok(())
    }

    fn delete_property(&self, property: &Surrogate) -> Result<()> {
        let mut properties = self.properties.write();
        let name = properties
            .values()
            .find(|p| p.surrogate() == property)
            .map(|p| p.name().to_string())
            .ok_or_else(|| Error::PropertyNotFound(property.to_string()))?;
        properties.remove(&name);
        Ok(())
    }

    fn load_property(&self, name: &str) -> Result<Option<Arc<Property>>> {
        Ok(self.properties.read().get(name).cloned())
    }

    fn properties_matching(&self, pattern: &str) -> Result<Vec<Arc<Property>>> {
        Ok(self
            .properties
            .read()
            .iter()
            .filter(|(name, _)| matches_pattern(pattern, name))
            .map(|(_, p)| Arc::clone(p))
            .collect())
    }

    fn create_chronicle(&self, chronicle: &StoredChronicle) -> Result<u64> {
        self.check_new(&chronicle.surrogate, ObjectKind::Chronicle)?;
        let mut chronicles = self.chronicles.write();
        if chronicles.contains_key(&chronicle.full_name) {
            return Err(Error::invalid_argument(format!(
                "chronicle {} already exists",
                chronicle.full_name
            )));
        }
        let id = self.allocate();
        let mut stored = chronicle.clone();
        stored.surrogate.upgrade(id)?;
        chronicles.insert(chronicle.full_name.clone(), stored);
        Ok(id)
    }

    fn delete_chronicle(&self, chronicle: &Surrogate) -> Result<()> {
        let mut chronicles = self.chronicles.write();
        let name = chronicles
            .values()
            .find(|c| &c.surrogate == chronicle)
            .map(|c| c.full_name.clone())
            .ok_or_else(|| Error::ChronicleNotFound(chronicle.to_string()))?;
        chronicles.remove(&name);
        Ok(())
    }

    fn load_chronicle(&self, full_name: &str) -> Result<Option<StoredChronicle>> {
        Ok(self.chronicles.read().get(full_name).cloned())
    }

    fn chronicles_using(&self, schema: &Surrogate) -> Result<Vec<String>> {
        Ok(self
            .chronicles
            .read()
            .values()
            .filter(|c| &c.schema == schema)
            .map(|c| c.full_name.clone())
            .collect())
    }
}
