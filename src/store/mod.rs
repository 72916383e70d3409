//! Persistence Collaborator
//!
//! Key-addressed state store over a fixed key set. Callers read with a
//! fallback value and write whole values per key; export and import operate
//! on the union of all keys as one serializable bundle, and import is
//! partial: keys absent from an imported bundle are left untouched.

use crate::error::StorageError;
use crate::notes::NoteServiceConfig;
use crate::provider::ModelEndpointConfig;
use crate::template::PromptTemplate;
use crate::types::{TaskResult, WorkItem};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod persistence;

pub use persistence::SledStateStore;

/// The fixed key set addressed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKey {
    WorkItems,
    Results,
    PromptTemplates,
    Defaults,
    EndpointConfigs,
    GeneratedImages,
    NoteService,
    Settings,
}

impl StoreKey {
    pub const ALL: [StoreKey; 8] = [
        StoreKey::WorkItems,
        StoreKey::Results,
        StoreKey::PromptTemplates,
        StoreKey::Defaults,
        StoreKey::EndpointConfigs,
        StoreKey::GeneratedImages,
        StoreKey::NoteService,
        StoreKey::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::WorkItems => "work_items",
            StoreKey::Results => "results",
            StoreKey::PromptTemplates => "prompt_templates",
            StoreKey::Defaults => "defaults",
            StoreKey::EndpointConfigs => "endpoint_configs",
            StoreKey::GeneratedImages => "generated_images",
            StoreKey::NoteService => "note_service",
            StoreKey::Settings => "settings",
        }
    }
}

/// Raw byte-level store interface; typed access lives on [`PipelineStore`].
pub trait StateStore: Send + Sync {
    fn get_raw(&self, key: StoreKey) -> Result<Option<Vec<u8>>, StorageError>;
    fn put_raw(&self, key: StoreKey, value: &[u8]) -> Result<(), StorageError>;
    fn remove_raw(&self, key: StoreKey) -> Result<(), StorageError>;
}

/// Caller-level default prompt template ids.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PromptDefaults {
    pub write_template: Option<String>,
    pub search_template: Option<String>,
}

/// Numeric generation settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationSettings {
    pub write_count: u32,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            write_count: 1,
            temperature: None,
            max_tokens: None,
        }
    }
}

/// Serializable union of every store key; absent keys stay `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportBundle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_items: Option<Vec<WorkItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<TaskResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_templates: Option<Vec<PromptTemplate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<PromptDefaults>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_configs: Option<HashMap<String, ModelEndpointConfig>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_images: Option<HashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_service: Option<NoteServiceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings: Option<GenerationSettings>,
}

/// Typed facade over a raw [`StateStore`].
pub struct PipelineStore {
    inner: Box<dyn StateStore>,
}

impl PipelineStore {
    pub fn new(inner: Box<dyn StateStore>) -> Self {
        Self { inner }
    }

    /// Read a key, returning `fallback` when the key has never been written.
    pub fn read<T: DeserializeOwned>(&self, key: StoreKey, fallback: T) -> Result<T, StorageError> {
        match self.inner.get_raw(key)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map_err(|e| StorageError::Serialization(format!("{}: {}", key.as_str(), e))),
            None => Ok(fallback),
        }
    }

    pub fn write<T: Serialize>(&self, key: StoreKey, value: &T) -> Result<(), StorageError> {
        let bytes = bincode::serialize(value)
            .map_err(|e| StorageError::Serialization(format!("{}: {}", key.as_str(), e)))?;
        self.inner.put_raw(key, &bytes)
    }

    pub fn remove(&self, key: StoreKey) -> Result<(), StorageError> {
        self.inner.remove_raw(key)
    }

    /// Export the union of all present keys as one bundle.
    pub fn export_bundle(&self) -> Result<ExportBundle, StorageError> {
        Ok(ExportBundle {
            work_items: self.read_optional(StoreKey::WorkItems)?,
            results: self.read_optional(StoreKey::Results)?,
            prompt_templates: self.read_optional(StoreKey::PromptTemplates)?,
            defaults: self.read_optional(StoreKey::Defaults)?,
            endpoint_configs: self.read_optional(StoreKey::EndpointConfigs)?,
            generated_images: self.read_optional(StoreKey::GeneratedImages)?,
            note_service: self.read_optional(StoreKey::NoteService)?,
            settings: self.read_optional(StoreKey::Settings)?,
        })
    }

    /// Import a bundle. Partial by design: keys absent from the bundle are
    /// left untouched.
    pub fn import_bundle(&self, bundle: &ExportBundle) -> Result<(), StorageError> {
        if let Some(value) = &bundle.work_items {
            self.write(StoreKey::WorkItems, value)?;
        }
        if let Some(value) = &bundle.results {
            self.write(StoreKey::Results, value)?;
        }
        if let Some(value) = &bundle.prompt_templates {
            self.write(StoreKey::PromptTemplates, value)?;
        }
        if let Some(value) = &bundle.defaults {
            self.write(StoreKey::Defaults, value)?;
        }
        if let Some(value) = &bundle.endpoint_configs {
            self.write(StoreKey::EndpointConfigs, value)?;
        }
        if let Some(value) = &bundle.generated_images {
            self.write(StoreKey::GeneratedImages, value)?;
        }
        if let Some(value) = &bundle.note_service {
            self.write(StoreKey::NoteService, value)?;
        }
        if let Some(value) = &bundle.settings {
            self.write(StoreKey::Settings, value)?;
        }
        Ok(())
    }

    fn read_optional<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>, StorageError> {
        match self.inner.get_raw(key)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| StorageError::Serialization(format!("{}: {}", key.as_str(), e))),
            None => Ok(None),
        }
    }
}
