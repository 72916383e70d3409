//! Note-Saving Collaborator
//!
//! Pushes generated results to an external note service. One POST per
//! result; a multi-result batch save fires one concurrent request per
//! result, never a single batched request, and reports each outcome
//! independently.

use crate::error::ApiError;
use crate::provider::{build_provider_http_client, map_http_error};
use futures::future;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

/// Connection settings for the note service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteServiceConfig {
    pub endpoint: String,
    pub token: Option<String>,
}

impl NoteServiceConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.endpoint.trim().is_empty() {
            return Err(ApiError::ConfigError(
                "Note service endpoint is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Client for the note service.
pub struct NoteClient {
    client: Client,
    config: NoteServiceConfig,
}

impl NoteClient {
    pub fn new(config: NoteServiceConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let client = build_provider_http_client()?;
        Ok(Self { client, config })
    }

    /// Save one text payload as a note.
    pub async fn save_note(&self, text: &str) -> Result<(), ApiError> {
        let mut request = self
            .client
            .post(&self.config.endpoint)
            .header("Content-Type", "application/json")
            .json(&json!({ "content": text }));
        if let Some(token) = &self.config.token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(map_http_error)?;
        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ApiError::ProviderRequestFailed(format!(
                "Note save failed with status {}: {}",
                status, error_text
            )));
        }
        Ok(())
    }

    /// Save many payloads, one concurrent request per payload.
    ///
    /// Failures are reported per payload and never abort the others.
    pub async fn save_all(&self, texts: &[String]) -> Vec<Result<(), ApiError>> {
        info!(total = texts.len(), "batch note save started");
        let outcomes =
            future::join_all(texts.iter().map(|text| self.save_note(text))).await;
        let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
        if failed > 0 {
            warn!(failed, total = outcomes.len(), "batch note save finished with failures");
        }
        outcomes
    }
}
