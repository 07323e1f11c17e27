//! Pluggable external storage for field values.
//!
//! Some field types keep their authoritative data outside the field row
//! (binary files, images, relation targets). Each such field type registers a
//! [`FieldStorage`] engine; [`StorageHandler`] dispatches per-field operations
//! to the engine registered for the field's type identifier, falling back to
//! a no-op engine for purely row-backed types.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use metrics::counter;
use thiserror::Error;

use crate::domain::content::{Field, VersionInfo};
use crate::domain::types::FieldId;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage engine failure for field type `{field_type}`: {message}")]
    Engine { field_type: String, message: String },
}

impl StorageError {
    pub fn engine(field_type: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Engine {
            field_type: field_type.into(),
            message: message.to_string(),
        }
    }
}

/// Outcome of a store or copy call: whether the engine rewrote the field's
/// lightweight value while processing (file size, image dimensions, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueUpdate {
    pub value_changed: bool,
}

impl ValueUpdate {
    pub fn changed() -> Self {
        Self {
            value_changed: true,
        }
    }

    pub fn unchanged() -> Self {
        Self {
            value_changed: false,
        }
    }
}

/// Opaque key-value context threaded through every engine call (connection
/// names, tenant hints). Engines interpret it; this crate does not.
#[derive(Debug, Clone, Default)]
pub struct StorageContext {
    pub values: serde_json::Map<String, serde_json::Value>,
}

/// Per-field-type engine persisting data that lives outside the field row.
#[async_trait]
pub trait FieldStorage: Send + Sync {
    /// Persist the field's external data for the given version.
    async fn store_field_data(
        &self,
        version_info: &VersionInfo,
        field: &mut Field,
        context: &StorageContext,
    ) -> Result<ValueUpdate, StorageError>;

    /// Point the new field at the external data of `original` instead of
    /// writing a second copy.
    async fn copy_field_data(
        &self,
        version_info: &VersionInfo,
        field: &mut Field,
        original: &Field,
        context: &StorageContext,
    ) -> Result<ValueUpdate, StorageError>;

    /// Hydrate `field.value.external_data` from the engine's store.
    async fn get_field_data(
        &self,
        version_info: &VersionInfo,
        field: &mut Field,
        context: &StorageContext,
    ) -> Result<(), StorageError>;

    /// Purge external data of the given field ids for one version.
    async fn delete_field_data(
        &self,
        version_info: &VersionInfo,
        field_ids: &[FieldId],
        context: &StorageContext,
    ) -> Result<(), StorageError>;

    /// Whether this engine stores anything outside the field row at all.
    fn has_field_data(&self) -> bool;
}

/// Engine for field types whose value lives entirely in the field row.
#[derive(Debug, Default)]
pub struct NullFieldStorage;

#[async_trait]
impl FieldStorage for NullFieldStorage {
    async fn store_field_data(
        &self,
        _version_info: &VersionInfo,
        _field: &mut Field,
        _context: &StorageContext,
    ) -> Result<ValueUpdate, StorageError> {
        Ok(ValueUpdate::unchanged())
    }

    async fn copy_field_data(
        &self,
        _version_info: &VersionInfo,
        _field: &mut Field,
        _original: &Field,
        _context: &StorageContext,
    ) -> Result<ValueUpdate, StorageError> {
        Ok(ValueUpdate::unchanged())
    }

    async fn get_field_data(
        &self,
        _version_info: &VersionInfo,
        _field: &mut Field,
        _context: &StorageContext,
    ) -> Result<(), StorageError> {
        Ok(())
    }

    async fn delete_field_data(
        &self,
        _version_info: &VersionInfo,
        _field_ids: &[FieldId],
        _context: &StorageContext,
    ) -> Result<(), StorageError> {
        Ok(())
    }

    fn has_field_data(&self) -> bool {
        false
    }
}

/// Registry of storage engines keyed by field type identifier.
///
/// Engines may be registered at runtime (plugin setup); lookups for
/// unregistered types resolve to the shared no-op engine.
pub struct StorageRegistry {
    engines: DashMap<String, Arc<dyn FieldStorage>>,
    fallback: Arc<dyn FieldStorage>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self {
            engines: DashMap::new(),
            fallback: Arc::new(NullFieldStorage),
        }
    }

    pub fn register(&self, field_type: impl Into<String>, engine: Arc<dyn FieldStorage>) {
        self.engines.insert(field_type.into(), engine);
    }

    pub fn for_type(&self, field_type: &str) -> Arc<dyn FieldStorage> {
        self.engines
            .get(field_type)
            .map(|entry| Arc::clone(entry.value()))
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Dispatches field storage operations to the engine for the field's type,
/// threading the shared context through every call.
pub struct StorageHandler {
    registry: Arc<StorageRegistry>,
    context: StorageContext,
}

impl StorageHandler {
    pub fn new(registry: Arc<StorageRegistry>, context: StorageContext) -> Self {
        Self { registry, context }
    }

    pub async fn store_field_data(
        &self,
        version_info: &VersionInfo,
        field: &mut Field,
    ) -> Result<ValueUpdate, StorageError> {
        let engine = self.registry.for_type(&field.field_type);
        if engine.has_field_data() {
            counter!("strato_field_external_store_total").increment(1);
        }
        engine
            .store_field_data(version_info, field, &self.context)
            .await
    }

    pub async fn copy_field_data(
        &self,
        version_info: &VersionInfo,
        field: &mut Field,
        original: &Field,
    ) -> Result<ValueUpdate, StorageError> {
        self.registry
            .for_type(&field.field_type)
            .copy_field_data(version_info, field, original, &self.context)
            .await
    }

    pub async fn get_field_data(
        &self,
        version_info: &VersionInfo,
        field: &mut Field,
    ) -> Result<(), StorageError> {
        let engine = self.registry.for_type(&field.field_type);
        if engine.has_field_data() {
            engine
                .get_field_data(version_info, field, &self.context)
                .await?;
        }
        Ok(())
    }

    pub async fn delete_field_data(
        &self,
        field_type: &str,
        version_info: &VersionInfo,
        field_ids: &[FieldId],
    ) -> Result<(), StorageError> {
        self.registry
            .for_type(field_type)
            .delete_field_data(version_info, field_ids, &self.context)
            .await
    }
}
