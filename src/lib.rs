//! Quill: Batch Content Generation
//!
//! A batch content-generation pipeline: raw pasted text is segmented into
//! ordered work items, each item flows through an optional
//! retrieval-augmentation stage and a mandatory write stage against an
//! external completion provider, outputs are sanitized to strip embedded
//! reasoning traces, and results support per-item refinement and
//! multi-variant fan-out, each independently cancellable.

pub mod config;
pub mod error;
pub mod images;
pub mod logging;
pub mod notes;
pub mod pipeline;
pub mod provider;
pub mod results;
pub mod sanitize;
pub mod segment;
pub mod store;
pub mod template;
pub mod types;
