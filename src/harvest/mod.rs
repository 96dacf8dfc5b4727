//! Harvest module - analyzer chain, merge engine and per-run reporting.
//!
//! - **Context**: [`PipelineContext`] and the chain configuration types
//! - **Pipeline**: ordered, gated execution via [`Pipeline`]
//! - **Merge**: folding records into entities via [`MergeEngine`]
//! - **Report**: [`RunReport`] and the [`harvest`] entry point
//! - **Analyzers**: concrete extraction strategies

pub mod analyzers;
pub mod context;
pub mod merge;
pub mod pipeline;
pub mod report;

// Re-export commonly used types
pub use context::{ChainConfig, MergeStrategy, PipelineContext, StageConfig};
pub use merge::{MergeEngine, MergeOutcome};
pub use pipeline::{Pipeline, PipelineError};
pub use report::{harvest, RunReport, RunStats};
