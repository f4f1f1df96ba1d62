// src/lib.rs
// Public library surface for the service binary, operator tools and integration tests.

pub mod analyze;
pub mod api;
pub mod app;
pub mod budget;
pub mod classify;
pub mod config;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod relevance;
pub mod scheduler;
pub mod store;

pub use crate::api::router;
pub use crate::error::PipelineError;
pub use crate::pipeline::{CycleReport, Orchestrator};
