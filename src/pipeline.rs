//! Generation Orchestrator
//!
//! Drives every work item through its per-item state machine
//! (`Idle → (Searching) → Writing → Done`, with `Failed` and `Cancelled` as
//! the other terminal states) while all items run fully in parallel. The only
//! shared mutable state is the merge-by-id results collection; per-item abort
//! handles are owned here and cleaned up on success, failure and cancellation
//! alike. Errors are caught at the per-item/per-variant boundary and never
//! propagate to sibling items or variants. No automatic retries: every
//! re-attempt (re-run, refine) is user-initiated.

use crate::error::ApiError;
use crate::provider::{
    ChatMessage, CompletionOptions, ModelEndpointConfig, ModelProviderClient, ProviderResolver,
};
use crate::results::ResultSet;
use crate::sanitize::strip_thinking;
use crate::template::{compose_refine_input, compose_write_input, TemplateRegistry};
use crate::types::{TaskResult, TaskState, WorkItem};
use chrono::Utc;
use futures::future;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Caller-supplied variant counts are clamped to this range.
pub const MAX_VARIANTS: u32 = 5;

/// Caller-level settings passed explicitly into every pipeline invocation.
#[derive(Debug, Clone)]
pub struct GenerationContext {
    pub write_endpoint: Option<ModelEndpointConfig>,
    pub search_endpoint: Option<ModelEndpointConfig>,
    /// Default write template id, used when an item carries no override.
    pub default_write_template: Option<String>,
    /// Search prompt template id.
    pub search_template: Option<String>,
    /// Batch guidance, appended only to items without their own guidance.
    pub batch_guidance: Option<String>,
    /// Requested variants per item, clamped to 1..=MAX_VARIANTS.
    pub write_count: u32,
    pub options: CompletionOptions,
}

impl Default for GenerationContext {
    fn default() -> Self {
        Self {
            write_endpoint: None,
            search_endpoint: None,
            default_write_template: None,
            search_template: None,
            batch_guidance: None,
            write_count: 1,
            options: CompletionOptions::default(),
        }
    }
}

/// One variant's failure, surfaced per-variant rather than atomically.
#[derive(Debug)]
pub struct VariantFailure {
    pub variant_no: u32,
    pub error: ApiError,
}

/// Terminal report for one work item's run.
#[derive(Debug)]
pub struct ItemOutcome {
    pub item_id: Uuid,
    pub index: u32,
    pub state: TaskState,
    pub results: Vec<TaskResult>,
    pub failures: Vec<VariantFailure>,
}

impl ItemOutcome {
    fn done(item: &WorkItem, results: Vec<TaskResult>, failures: Vec<VariantFailure>) -> Self {
        Self {
            item_id: item.id,
            index: item.index,
            state: TaskState::Done,
            results,
            failures,
        }
    }

    fn failed(item: &WorkItem, error: ApiError) -> Self {
        error!(item_id = %item.id, index = item.index, %error, "item failed");
        Self {
            item_id: item.id,
            index: item.index,
            state: TaskState::Failed,
            results: Vec::new(),
            failures: vec![VariantFailure {
                variant_no: 0,
                error,
            }],
        }
    }

    fn cancelled(item: &WorkItem) -> Self {
        info!(item_id = %item.id, index = item.index, "item cancelled");
        Self {
            item_id: item.id,
            index: item.index,
            state: TaskState::Cancelled,
            results: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// The batch generation orchestrator.
///
/// Cheap to clone; clones share the template registry, the results
/// collection, the state map and the abort-handle map.
#[derive(Clone)]
pub struct Pipeline {
    resolver: Arc<dyn ProviderResolver>,
    templates: Arc<RwLock<TemplateRegistry>>,
    results: Arc<RwLock<ResultSet>>,
    states: Arc<RwLock<HashMap<Uuid, TaskState>>>,
    aborts: Arc<Mutex<HashMap<Uuid, oneshot::Sender<()>>>>,
}

impl Pipeline {
    pub fn new(resolver: Arc<dyn ProviderResolver>) -> Self {
        Self {
            resolver,
            templates: Arc::new(RwLock::new(TemplateRegistry::new())),
            results: Arc::new(RwLock::new(ResultSet::new())),
            states: Arc::new(RwLock::new(HashMap::new())),
            aborts: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn templates(&self) -> &Arc<RwLock<TemplateRegistry>> {
        &self.templates
    }

    pub fn register_template(&self, template: crate::template::PromptTemplate) {
        self.templates.write().insert(template);
    }

    /// Snapshot of all results, sorted by (item index, variant number).
    pub fn sorted_results(&self) -> Vec<TaskResult> {
        self.results.read().sorted()
    }

    pub fn results(&self) -> &Arc<RwLock<ResultSet>> {
        &self.results
    }

    pub fn state(&self, item_id: Uuid) -> Option<TaskState> {
        self.states.read().get(&item_id).copied()
    }

    /// Fire the cancellation signal for one in-flight item or refinement.
    ///
    /// Returns false when nothing is in flight under that id. Cancelling one
    /// item has no effect on others.
    pub fn cancel(&self, id: Uuid) -> bool {
        if let Some(abort_tx) = self.aborts.lock().remove(&id) {
            // Receiver may already be gone if the item just finished.
            let _ = abort_tx.send(());
            true
        } else {
            false
        }
    }

    /// Run every item concurrently; completes when all reach a terminal
    /// state, independent of individual outcomes.
    pub async fn run_all(
        &self,
        items: Vec<WorkItem>,
        context: GenerationContext,
    ) -> Vec<ItemOutcome> {
        let context = Arc::new(context);
        info!(total = items.len(), "batch run started");

        let handles: Vec<_> = items
            .into_iter()
            .map(|item| {
                let pipeline = self.clone();
                let context = Arc::clone(&context);
                tokio::spawn(async move { pipeline.run_item(&item, &context).await })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_error) => error!(%join_error, "item task aborted unexpectedly"),
            }
        }
        outcomes.sort_by_key(|outcome| outcome.index);
        info!(total = outcomes.len(), "batch run finished");
        outcomes
    }

    /// Run one item to a terminal state.
    pub async fn run_item(&self, item: &WorkItem, context: &GenerationContext) -> ItemOutcome {
        let (abort_tx, abort_rx) = oneshot::channel();
        self.aborts.lock().insert(item.id, abort_tx);
        self.set_state(item.id, TaskState::Idle);

        let outcome = self.drive_item(item, context, abort_rx).await;

        // Cleanup is unconditional: success, failure and cancellation all
        // pass through here.
        self.aborts.lock().remove(&item.id);
        self.set_state(item.id, outcome.state);

        if !outcome.results.is_empty() {
            let mut results = self.results.write();
            for result in &outcome.results {
                results.merge(result.clone());
            }
        }
        outcome
    }

    async fn drive_item(
        &self,
        item: &WorkItem,
        context: &GenerationContext,
        mut abort_rx: oneshot::Receiver<()>,
    ) -> ItemOutcome {
        // Template resolution happens before any network call.
        let write_template = {
            let templates = self.templates.read();
            match templates.resolve(
                item.prompt_ref.as_deref(),
                context.default_write_template.as_deref(),
                "write",
            ) {
                Ok(template) => template.content.clone(),
                Err(error) => return ItemOutcome::failed(item, error),
            }
        };

        // Retrieval-augmentation stage.
        let (effective_input, search_output) = if item.needs_search {
            let endpoint = match &context.search_endpoint {
                Some(endpoint) => endpoint.clone(),
                None => {
                    return ItemOutcome::failed(
                        item,
                        ApiError::ConfigError("No search endpoint configured".to_string()),
                    )
                }
            };
            let search_template = {
                let templates = self.templates.read();
                match templates.resolve(None, context.search_template.as_deref(), "search") {
                    Ok(template) => template.content.clone(),
                    Err(error) => return ItemOutcome::failed(item, error),
                }
            };
            let client = match self.resolver.create_client(&endpoint) {
                Ok(client) => client,
                Err(error) => return ItemOutcome::failed(item, error),
            };

            self.set_state(item.id, TaskState::Searching);
            let messages = vec![
                ChatMessage::system(search_template),
                ChatMessage::user(item.raw_text.clone()),
            ];
            let response = tokio::select! {
                _ = &mut abort_rx => return ItemOutcome::cancelled(item),
                response = client.complete(messages, context.options.clone()) => response,
            };
            match response {
                Ok(response) => {
                    let cleaned = apply_thinking_filter(&response.content, &endpoint);
                    (cleaned.clone(), Some(cleaned))
                }
                Err(error) => return ItemOutcome::failed(item, error),
            }
        } else {
            (item.raw_text.clone(), None)
        };

        // Write stage.
        let endpoint = match &context.write_endpoint {
            Some(endpoint) => endpoint.clone(),
            None => {
                return ItemOutcome::failed(
                    item,
                    ApiError::ConfigError("No write endpoint configured".to_string()),
                )
            }
        };
        let client = match self.resolver.create_client(&endpoint) {
            Ok(client) => client,
            Err(error) => return ItemOutcome::failed(item, error),
        };

        self.set_state(item.id, TaskState::Writing);
        let user_input = compose_write_input(
            &effective_input,
            item.guidance.as_deref(),
            context.batch_guidance.as_deref(),
        );
        let messages = vec![
            ChatMessage::system(write_template),
            ChatMessage::user(user_input),
        ];
        let write_count = context.write_count.clamp(1, MAX_VARIANTS);

        if write_count == 1 {
            let response = tokio::select! {
                _ = &mut abort_rx => return ItemOutcome::cancelled(item),
                response = client.complete(messages, context.options.clone()) => response,
            };
            match response {
                Ok(response) => {
                    let result = TaskResult {
                        id: Uuid::new_v4(),
                        parent_task_id: None,
                        index: item.index,
                        variant_no: None,
                        raw_text: item.raw_text.clone(),
                        search_output,
                        write_output: apply_thinking_filter(&response.content, &endpoint),
                        created_at: Utc::now(),
                    };
                    ItemOutcome::done(item, vec![result], Vec::new())
                }
                Err(error) => ItemOutcome::failed(item, error),
            }
        } else {
            self.run_variants(
                item,
                context,
                &mut abort_rx,
                client,
                &endpoint,
                messages,
                search_output,
                write_count,
            )
            .await
        }
    }

    /// Concurrent variant fan-out sharing one composed prompt.
    ///
    /// One variant's failure never cancels its siblings; the item reaches
    /// `Done` once every variant call has resolved, with failures surfaced
    /// per-variant.
    #[allow(clippy::too_many_arguments)]
    async fn run_variants(
        &self,
        item: &WorkItem,
        context: &GenerationContext,
        abort_rx: &mut oneshot::Receiver<()>,
        client: Arc<dyn ModelProviderClient>,
        endpoint: &ModelEndpointConfig,
        messages: Vec<ChatMessage>,
        search_output: Option<String>,
        write_count: u32,
    ) -> ItemOutcome {
        let parent_task_id = Uuid::new_v4();
        let calls = (1..=write_count).map(|variant_no| {
            let client = Arc::clone(&client);
            let messages = messages.clone();
            let options = context.options.clone();
            async move { (variant_no, client.complete(messages, options).await) }
        });

        let resolved = tokio::select! {
            _ = &mut *abort_rx => return ItemOutcome::cancelled(item),
            resolved = future::join_all(calls) => resolved,
        };

        let mut results = Vec::new();
        let mut failures = Vec::new();
        for (variant_no, response) in resolved {
            match response {
                Ok(response) => results.push(TaskResult {
                    id: Uuid::new_v4(),
                    parent_task_id: Some(parent_task_id),
                    index: item.index,
                    variant_no: Some(variant_no),
                    raw_text: item.raw_text.clone(),
                    search_output: search_output.clone(),
                    write_output: apply_thinking_filter(&response.content, endpoint),
                    created_at: Utc::now(),
                }),
                Err(error) => {
                    warn!(item_id = %item.id, variant_no, %error, "variant failed");
                    failures.push(VariantFailure { variant_no, error });
                }
            }
        }
        ItemOutcome::done(item, results, failures)
    }

    /// Reprocess a completed result with a free-text correction instruction.
    ///
    /// Success replaces the result's output in place, updating its timestamp
    /// and preserving its id and position. A cancelled refinement leaves the
    /// stored result untouched.
    pub async fn refine(
        &self,
        result_id: Uuid,
        prompt_ref: Option<&str>,
        instruction: &str,
        context: &GenerationContext,
    ) -> Result<TaskResult, ApiError> {
        let previous = self
            .results
            .read()
            .get(result_id)
            .cloned()
            .ok_or(ApiError::ResultNotFound(result_id))?;

        let template = {
            let templates = self.templates.read();
            templates
                .resolve(
                    prompt_ref,
                    context.default_write_template.as_deref(),
                    "write",
                )?
                .content
                .clone()
        };
        let endpoint = context
            .write_endpoint
            .clone()
            .ok_or_else(|| ApiError::ConfigError("No write endpoint configured".to_string()))?;
        let client = self.resolver.create_client(&endpoint)?;

        let (abort_tx, mut abort_rx) = oneshot::channel();
        self.aborts.lock().insert(result_id, abort_tx);

        let user_input =
            compose_refine_input(&previous.raw_text, &previous.write_output, instruction);
        let messages = vec![
            ChatMessage::system(template),
            ChatMessage::user(user_input),
        ];
        info!(%result_id, "refine started");
        let response = tokio::select! {
            _ = &mut abort_rx => Err(ApiError::Cancelled),
            response = client.complete(messages, context.options.clone()) => response,
        };
        self.aborts.lock().remove(&result_id);

        let response = response?;
        let refined = TaskResult {
            write_output: apply_thinking_filter(&response.content, &endpoint),
            created_at: Utc::now(),
            ..previous
        };
        self.results.write().merge(refined.clone());
        info!(%result_id, "refine finished");
        Ok(refined)
    }

    fn set_state(&self, item_id: Uuid, state: TaskState) {
        debug!(%item_id, ?state, "state transition");
        self.states.write().insert(item_id, state);
    }
}

fn apply_thinking_filter(content: &str, endpoint: &ModelEndpointConfig) -> String {
    if endpoint.thinking_filter {
        strip_thinking(content)
    } else {
        content.to_string()
    }
}
