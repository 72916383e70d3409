//! Prompt Templates
//!
//! Registry of named prompt templates plus the composition rules for the
//! write and refine stages. Resolution order is always per-item override
//! first, caller-level default second; a missing template is a configuration
//! error surfaced before any network call.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A reusable prompt template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    pub category: String,
    pub content: String,
}

impl PromptTemplate {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            content: content.into(),
        }
    }
}

/// In-memory template registry.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: HashMap<String, PromptTemplate>,
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, template: PromptTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn get(&self, template_id: &str) -> Option<&PromptTemplate> {
        self.templates.get(template_id)
    }

    pub fn get_or_error(&self, template_id: &str) -> Result<&PromptTemplate, ApiError> {
        self.get(template_id)
            .ok_or_else(|| ApiError::TemplateNotFound(template_id.to_string()))
    }

    pub fn remove(&mut self, template_id: &str) -> Option<PromptTemplate> {
        self.templates.remove(template_id)
    }

    pub fn list_all(&self) -> Vec<&PromptTemplate> {
        self.templates.values().collect()
    }

    /// Export templates for persistence or bundles.
    pub fn to_vec(&self) -> Vec<PromptTemplate> {
        self.templates.values().cloned().collect()
    }

    pub fn load(&mut self, templates: Vec<PromptTemplate>) {
        for template in templates {
            self.insert(template);
        }
    }

    /// Resolve a template: per-item override first, caller default second.
    ///
    /// Both ids may be absent; the absence of any resolvable template is a
    /// configuration error, as is an id pointing at no registered template.
    pub fn resolve(
        &self,
        item_ref: Option<&str>,
        default_id: Option<&str>,
        stage: &str,
    ) -> Result<&PromptTemplate, ApiError> {
        match item_ref.or(default_id) {
            Some(id) => self.get_or_error(id),
            None => Err(ApiError::ConfigError(format!(
                "No {} prompt template configured",
                stage
            ))),
        }
    }
}

/// Compose the write-stage user input.
///
/// Effective prior-stage input first, then the per-item guidance block, then
/// the caller-level batch guidance block. The batch block is appended only
/// when no per-item guidance was supplied, preventing duplicate intent
/// injection.
pub fn compose_write_input(
    effective_input: &str,
    item_guidance: Option<&str>,
    batch_guidance: Option<&str>,
) -> String {
    let mut composed = effective_input.trim_end().to_string();
    match item_guidance.filter(|g| !g.trim().is_empty()) {
        Some(guidance) => {
            composed.push_str("\n\n");
            composed.push_str(guidance.trim());
        }
        None => {
            if let Some(guidance) = batch_guidance.filter(|g| !g.trim().is_empty()) {
                composed.push_str("\n\n");
                composed.push_str(guidance.trim());
            }
        }
    }
    composed
}

/// Compose the refine-stage user input from the original raw text, the
/// previous output and a free-text correction instruction.
pub fn compose_refine_input(raw_text: &str, previous_output: &str, instruction: &str) -> String {
    format!(
        "Original request:\n{}\n\nPrevious result:\n{}\n\nRevision instruction:\n{}",
        raw_text.trim(),
        previous_output.trim(),
        instruction.trim()
    )
}
