use crate::harvest::context::PipelineContext;
use crate::model::AnalyzerResult;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("Failed to parse content: {0}")]
    InvalidContent(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid analyzer configuration: {0}")]
    InvalidConfig(String),
    #[error("Timed out after {0}s")]
    Timeout(u64),
    #[error("Model error: {0}")]
    Model(String),
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<serde_json::Error> for AnalyzerError {
    fn from(e: serde_json::Error) -> Self {
        AnalyzerError::InvalidContent(e.to_string())
    }
}

/// A pluggable extraction strategy run by the pipeline.
///
/// Implementations must be `Send + Sync` so one pipeline can serve many
/// concurrent runs. `run` receives the context by shared reference and must
/// leave `context.previous_results` untouched.
#[async_trait]
pub trait Analyzer: Send + Sync {
    /// Stable identifier used for ordering, lookup and provenance (e.g. "story").
    fn identifier(&self) -> &str;

    /// Pure predicate deciding whether `run` applies to this context.
    fn can_handle(&self, context: &PipelineContext) -> bool;

    /// Extracts records for the context's subject.
    async fn run(&self, context: &PipelineContext) -> Result<AnalyzerResult, AnalyzerError>;
}
