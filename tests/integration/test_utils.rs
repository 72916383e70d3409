//! Shared test utilities for integration tests
//!
//! Scripted completion providers that stand in for the external service:
//! one driven by call order, one driven by message content, both recording
//! every request they receive for assertions.

use async_trait::async_trait;
use quill::error::ApiError;
use quill::pipeline::Pipeline;
use quill::provider::{
    ChatMessage, CompletionOptions, CompletionResponse, ModelEndpointConfig, ModelProviderClient,
    ProviderResolver,
};
use quill::template::PromptTemplate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// One scripted provider behavior.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    Respond(String),
    Fail(String),
    /// Never resolves; used to test cancellation of in-flight calls.
    Hang,
}

async fn act(behavior: &MockBehavior) -> Result<CompletionResponse, ApiError> {
    match behavior {
        MockBehavior::Respond(content) => Ok(CompletionResponse {
            content: content.clone(),
            model: "mock-model".to_string(),
            finish_reason: Some("stop".to_string()),
        }),
        MockBehavior::Fail(message) => Err(ApiError::ProviderRequestFailed(message.clone())),
        MockBehavior::Hang => futures::future::pending().await,
    }
}

/// Provider scripted by call order.
pub struct SequenceProvider {
    script: Vec<MockBehavior>,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl SequenceProvider {
    pub fn new(script: Vec<MockBehavior>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelProviderClient for SequenceProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages);
        let behavior = self
            .script
            .get(index)
            .cloned()
            .unwrap_or_else(|| MockBehavior::Respond("Mock response".to_string()));
        act(&behavior).await
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Provider scripted by message content: the first rule whose needle appears
/// in the last user message wins, otherwise the default applies.
pub struct KeyedProvider {
    rules: Vec<(String, MockBehavior)>,
    default: MockBehavior,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl KeyedProvider {
    pub fn new(rules: Vec<(&str, MockBehavior)>, default: MockBehavior) -> Arc<Self> {
        Arc::new(Self {
            rules: rules
                .into_iter()
                .map(|(needle, behavior)| (needle.to_string(), behavior))
                .collect(),
            default,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl ModelProviderClient for KeyedProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        _options: CompletionOptions,
    ) -> Result<CompletionResponse, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let user_content = messages
            .last()
            .map(|message| message.content.clone())
            .unwrap_or_default();
        self.seen.lock().unwrap().push(messages);
        let behavior = self
            .rules
            .iter()
            .find(|(needle, _)| user_content.contains(needle))
            .map(|(_, behavior)| behavior.clone())
            .unwrap_or_else(|| self.default.clone());
        act(&behavior).await
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

/// Resolver handing out one shared provider for every endpoint.
pub struct SharedResolver {
    provider: Arc<dyn ModelProviderClient>,
}

impl SharedResolver {
    pub fn new(provider: Arc<dyn ModelProviderClient>) -> Arc<Self> {
        Arc::new(Self { provider })
    }
}

impl ProviderResolver for SharedResolver {
    fn create_client(
        &self,
        _endpoint: &ModelEndpointConfig,
    ) -> Result<Arc<dyn ModelProviderClient>, ApiError> {
        Ok(Arc::clone(&self.provider))
    }
}

pub fn endpoint() -> ModelEndpointConfig {
    ModelEndpointConfig::new("https://api.example.com/v1", "test-key", "test-model")
}

/// A pipeline wired to the given provider with a registered default write
/// template and search template.
pub fn pipeline_with(provider: Arc<dyn ModelProviderClient>) -> Pipeline {
    let pipeline = Pipeline::new(SharedResolver::new(provider));
    pipeline.register_template(PromptTemplate::new(
        "write-default",
        "Default write",
        "write",
        "You write publishable content.",
    ));
    pipeline.register_template(PromptTemplate::new(
        "search-default",
        "Default search",
        "search",
        "You gather supporting material.",
    ));
    pipeline
}
