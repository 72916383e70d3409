//! Endpoint configuration for the completion provider.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};

/// Connection settings for one completion endpoint.
///
/// The search and write stages may point at different endpoints; each run
/// receives its endpoints explicitly through the generation context rather
/// than reading global state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelEndpointConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// Pass provider output through the reasoning-trace sanitizer.
    #[serde(default = "default_thinking_filter")]
    pub thinking_filter: bool,
}

fn default_thinking_filter() -> bool {
    true
}

impl ModelEndpointConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            thinking_filter: true,
        }
    }

    /// Check the fields a request cannot be built without.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.base_url.trim().is_empty() {
            return Err(ApiError::ConfigError(
                "Endpoint base URL is empty".to_string(),
            ));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ApiError::ConfigError(format!(
                "Endpoint base URL must start with http:// or https://: {}",
                self.base_url
            )));
        }
        if self.model.trim().is_empty() {
            return Err(ApiError::ConfigError(
                "Endpoint model is empty".to_string(),
            ));
        }
        Ok(())
    }
}
