//! Chronos Meta - Schema resolution and metadata caching
//!
//! This crate implements the metadata engine of Chronos including:
//! - Values, value types and properties
//! - Numbered, named components held in copy-on-write containers
//! - Attribute and series definitions
//! - Schemas extending base schemas, and their resolution
//! - Chronicle snapshots and chronicle naming
//! - The metadata cache sharing schemas and properties between chronicles
//! - Backend contracts, an in-memory backend and the database facade

pub mod attribute;
pub mod backend;
pub mod builtin;
pub mod cache;
pub mod chronicle;
pub mod component;
pub mod container;
pub mod database;
pub mod editable;
pub mod property;
pub mod schema;
pub mod series;
pub mod value;

// Re-exports
pub use attribute::AttributeDefinition;
pub use backend::{
    AllowAll, MemoryStore, MetaStore, Permission, PermissionChecker, SchemaSource,
    StoredChronicle, matches_pattern,
};
pub use builtin::{Builtins, builtins};
pub use cache::{CacheStats, MetadataCache};
pub use chronicle::{Chronicle, NamingPolicy, SeparatorNaming};
pub use component::{Component, DefinitionKey};
pub use container::ComponentContainer;
pub use database::MetaDatabase;
pub use editable::{Changes, EditableSchema};
pub use property::Property;
pub use schema::{IncompleteSchema, Schema};
pub use series::SeriesDefinition;
pub use value::{Value, ValueKind, ValueType};
