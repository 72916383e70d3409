//! Configuration System
//!
//! File-plus-environment configuration for pipeline callers. A caller loads
//! one [`QuillConfig`] and derives from it the explicit
//! [`GenerationContext`] handed to every pipeline invocation; the pipeline
//! itself never reads global state.

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::notes::NoteServiceConfig;
use crate::pipeline::GenerationContext;
use crate::provider::{CompletionOptions, ModelEndpointConfig};
use crate::store::{GenerationSettings, PromptDefaults};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuillConfig {
    /// Named completion endpoints.
    #[serde(default)]
    pub endpoints: HashMap<String, ModelEndpointConfig>,

    /// Name of the endpoint used by the write stage.
    pub write_endpoint: Option<String>,

    /// Name of the endpoint used by the retrieval stage.
    pub search_endpoint: Option<String>,

    /// Default prompt template ids.
    #[serde(default)]
    pub defaults: PromptDefaults,

    /// Numeric generation settings.
    #[serde(default)]
    pub generation: GenerationSettings,

    /// Batch guidance appended to items without their own guidance.
    pub batch_guidance: Option<String>,

    /// Note service connection, when configured.
    pub note_service: Option<NoteServiceConfig>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl QuillConfig {
    /// Resolve a named endpoint from the endpoint table.
    fn endpoint(&self, name: Option<&str>) -> Result<Option<ModelEndpointConfig>, ApiError> {
        match name {
            Some(name) => {
                let endpoint = self.endpoints.get(name).ok_or_else(|| {
                    ApiError::ConfigError(format!("Endpoint not configured: {}", name))
                })?;
                Ok(Some(endpoint.clone()))
            }
            None => Ok(None),
        }
    }

    /// Build the explicit per-invocation context from this configuration.
    pub fn generation_context(&self) -> Result<GenerationContext, ApiError> {
        Ok(GenerationContext {
            write_endpoint: self.endpoint(self.write_endpoint.as_deref())?,
            search_endpoint: self.endpoint(self.search_endpoint.as_deref())?,
            default_write_template: self.defaults.write_template.clone(),
            search_template: self.defaults.search_template.clone(),
            batch_guidance: self.batch_guidance.clone(),
            write_count: self.generation.write_count,
            options: CompletionOptions {
                temperature: self.generation.temperature,
                max_tokens: self.generation.max_tokens,
                ..CompletionOptions::default()
            },
        })
    }
}

/// Loads configuration from a TOML file layered with `QUILL_`-prefixed
/// environment variables (environment wins).
pub struct ConfigLoader;

impl ConfigLoader {
    /// Default config file under the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "quill")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn load(path: Option<&Path>) -> Result<QuillConfig, ApiError> {
        let mut builder = Config::builder();
        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path));
            }
            None => {
                if let Some(default) = Self::default_path() {
                    builder = builder.add_source(File::from(default).required(false));
                }
            }
        }
        builder = builder.add_source(Environment::with_prefix("QUILL").separator("__"));

        let config = builder.build()?;
        Ok(config.try_deserialize::<QuillConfig>()?)
    }
}
