//! End-to-end pipeline runs against scripted providers.

use super::test_utils::{
    endpoint, pipeline_with, KeyedProvider, MockBehavior, SequenceProvider,
};
use quill::pipeline::GenerationContext;
use quill::segment::segment_into_work_items;
use quill::types::{TaskState, WorkItem};
use std::sync::Arc;

fn context() -> GenerationContext {
    GenerationContext {
        write_endpoint: Some(endpoint()),
        search_endpoint: Some(endpoint()),
        default_write_template: Some("write-default".to_string()),
        search_template: Some("search-default".to_string()),
        ..GenerationContext::default()
    }
}

#[tokio::test]
async fn test_segment_then_run_all_preserves_order() {
    let provider = KeyedProvider::new(
        vec![
            ("first topic", MockBehavior::Respond("output one".to_string())),
            ("second topic", MockBehavior::Respond("output two".to_string())),
        ],
        MockBehavior::Respond("unexpected".to_string()),
    );
    let pipeline = pipeline_with(provider);

    let items = segment_into_work_items("1. first topic\n2. second topic");
    assert_eq!(items.len(), 2);

    let outcomes = pipeline.run_all(items, context()).await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|o| o.state == TaskState::Done));

    let results = pipeline.sorted_results();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].index, 1);
    assert_eq!(results[0].write_output, "output one");
    assert_eq!(results[1].index, 2);
    assert_eq!(results[1].write_output, "output two");
}

#[tokio::test]
async fn test_search_output_sanitized_and_fed_to_write() {
    let provider = SequenceProvider::new(vec![
        MockBehavior::Respond("<think>private</think>supporting facts".to_string()),
        MockBehavior::Respond("final article".to_string()),
    ]);
    let pipeline = pipeline_with(provider.clone());

    let mut item = WorkItem::new(1, "the topic");
    item.needs_search = true;

    let outcome = pipeline.run_item(&item, &context()).await;
    assert_eq!(outcome.state, TaskState::Done);
    let result = &outcome.results[0];
    assert_eq!(result.search_output.as_deref(), Some("supporting facts"));
    assert_eq!(result.write_output, "final article");
    assert_eq!(result.raw_text, "the topic");

    // The write call consumed the sanitized search output, not the raw text.
    let seen = provider.seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    let write_user_message = &seen[1].last().unwrap().content;
    assert!(write_user_message.contains("supporting facts"));
    assert!(!write_user_message.contains("private"));
}

#[tokio::test]
async fn test_variant_fanout_with_failure_isolation() {
    let provider = SequenceProvider::new(vec![
        MockBehavior::Respond("variant one".to_string()),
        MockBehavior::Fail("mid-flight error".to_string()),
        MockBehavior::Respond("variant three".to_string()),
    ]);
    let pipeline = pipeline_with(provider.clone());

    let item = WorkItem::new(1, "topic");
    let mut ctx = context();
    ctx.write_count = 3;

    let outcome = pipeline.run_item(&item, &ctx).await;
    assert_eq!(outcome.state, TaskState::Done);
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].variant_no, 2);
    assert_eq!(provider.call_count(), 3);

    // Surviving variants share one parent and index with distinct numbers.
    let parent = outcome.results[0].parent_task_id;
    assert!(parent.is_some());
    assert!(outcome.results.iter().all(|r| r.parent_task_id == parent));
    assert!(outcome.results.iter().all(|r| r.index == 1));
    let mut variant_nos: Vec<u32> = outcome
        .results
        .iter()
        .filter_map(|r| r.variant_no)
        .collect();
    variant_nos.sort_unstable();
    assert_eq!(variant_nos, vec![1, 3]);

    // Presented order is (index, variant_no).
    let results = pipeline.sorted_results();
    assert_eq!(results[0].variant_no, Some(1));
    assert_eq!(results[1].variant_no, Some(3));
}

#[tokio::test]
async fn test_cancel_mid_write_produces_no_result() {
    let provider = SequenceProvider::new(vec![MockBehavior::Hang]);
    let pipeline = pipeline_with(provider);

    let item = WorkItem::new(1, "topic");
    let item_id = item.id;
    let runner = pipeline.clone();
    let ctx = context();
    let handle = tokio::spawn(async move { runner.run_item(&item, &ctx).await });

    // Let the item reach its in-flight write call.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(pipeline.state(item_id), Some(TaskState::Writing));
    assert!(pipeline.cancel(item_id));

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.state, TaskState::Cancelled);
    assert!(outcome.results.is_empty());
    assert!(outcome.failures.is_empty());
    assert!(pipeline.sorted_results().is_empty());
    assert_eq!(pipeline.state(item_id), Some(TaskState::Cancelled));
    // The abort handle was cleaned up with the run.
    assert!(!pipeline.cancel(item_id));
}

#[tokio::test]
async fn test_cancel_one_item_leaves_siblings_running() {
    let provider = KeyedProvider::new(
        vec![
            ("stuck topic", MockBehavior::Hang),
            ("quick topic", MockBehavior::Respond("quick output".to_string())),
        ],
        MockBehavior::Respond("unexpected".to_string()),
    );
    let pipeline = pipeline_with(provider);

    let stuck = WorkItem::new(1, "stuck topic");
    let quick = WorkItem::new(2, "quick topic");
    let stuck_id = stuck.id;

    let runner = pipeline.clone();
    let ctx = context();
    let handle =
        tokio::spawn(async move { runner.run_all(vec![stuck, quick], ctx).await });

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(pipeline.cancel(stuck_id));

    let outcomes = handle.await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].state, TaskState::Cancelled);
    assert_eq!(outcomes[1].state, TaskState::Done);
    assert_eq!(outcomes[1].results[0].write_output, "quick output");

    let results = pipeline.sorted_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].index, 2);
}

#[tokio::test]
async fn test_refine_replaces_output_in_place() {
    let provider = SequenceProvider::new(vec![
        MockBehavior::Respond("first draft".to_string()),
        MockBehavior::Respond("second draft".to_string()),
    ]);
    let pipeline = pipeline_with(provider.clone());

    let item = WorkItem::new(1, "topic");
    let ctx = context();
    let outcome = pipeline.run_item(&item, &ctx).await;
    // needs_search is false: exactly one write call was issued.
    assert_eq!(provider.call_count(), 1);
    let original = outcome.results[0].clone();

    let refined = pipeline
        .refine(original.id, None, "make it shorter", &ctx)
        .await
        .unwrap();
    assert_eq!(refined.id, original.id);
    assert_eq!(refined.index, original.index);
    assert_eq!(refined.write_output, "second draft");
    assert!(refined.created_at >= original.created_at);

    let results = pipeline.sorted_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].write_output, "second draft");

    // The refine prompt carried the original text, the previous output and
    // the correction instruction.
    let seen = provider.seen.lock().unwrap();
    let refine_user_message = &seen[1].last().unwrap().content;
    assert!(refine_user_message.contains("topic"));
    assert!(refine_user_message.contains("first draft"));
    assert!(refine_user_message.contains("make it shorter"));
}

#[tokio::test]
async fn test_cancelled_refine_leaves_stored_result() {
    let provider = SequenceProvider::new(vec![
        MockBehavior::Respond("first draft".to_string()),
        MockBehavior::Hang,
    ]);
    let pipeline = pipeline_with(provider);

    let item = WorkItem::new(1, "topic");
    let ctx = context();
    let outcome = pipeline.run_item(&item, &ctx).await;
    let result_id = outcome.results[0].id;

    let refiner = pipeline.clone();
    let refine_ctx = ctx.clone();
    let handle = tokio::spawn(async move {
        refiner
            .refine(result_id, None, "again", &refine_ctx)
            .await
    });

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert!(pipeline.cancel(result_id));

    let refine_result = handle.await.unwrap();
    assert!(refine_result.unwrap_err().is_cancellation());
    assert_eq!(
        pipeline.sorted_results()[0].write_output,
        "first draft"
    );
}

#[tokio::test]
async fn test_failed_item_does_not_block_siblings() {
    let provider = KeyedProvider::new(
        vec![
            ("bad topic", MockBehavior::Fail("provider exploded".to_string())),
            ("good topic", MockBehavior::Respond("good output".to_string())),
        ],
        MockBehavior::Respond("unexpected".to_string()),
    );
    let pipeline = pipeline_with(provider);

    let bad = WorkItem::new(1, "bad topic");
    let good = WorkItem::new(2, "good topic");
    let outcomes = pipeline.run_all(vec![bad, good], context()).await;

    assert_eq!(outcomes[0].state, TaskState::Failed);
    assert_eq!(outcomes[1].state, TaskState::Done);
    assert_eq!(pipeline.sorted_results().len(), 1);
}
