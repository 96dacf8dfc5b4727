//! Concrete analyzers and the default pipeline built from them.

pub mod annotations;
pub mod enhancer;
pub mod overrides;
pub mod source;
pub mod story;
mod text;

use std::sync::Arc;

use crate::harvest::pipeline::{Pipeline, PipelineError};

pub use annotations::{AnnotationAnalyzer, AnnotationOptions, ANNOTATION_ANALYZER};
pub use enhancer::{EnhancerOptions, ModelEnhancer, TextGenerator, ENHANCER_ANALYZER};
pub use overrides::{ManualOverrideAnalyzer, OverrideOptions, OVERRIDE_ANALYZER};
pub use source::{SourceAnalyzer, SourceOptions, SOURCE_ANALYZER};
pub use story::{StoryAnalyzer, StoryOptions, STORY_ANALYZER};

/// Pipeline with every analyzer that needs no external service.
pub fn default_pipeline() -> Result<Pipeline, PipelineError> {
    Pipeline::new()
        .with_analyzer(Arc::new(StoryAnalyzer::new()))?
        .with_analyzer(Arc::new(AnnotationAnalyzer::new()))?
        .with_analyzer(Arc::new(SourceAnalyzer::new()))?
        .with_analyzer(Arc::new(ManualOverrideAnalyzer::new()))
}

/// Adds the model-backed enhancer to `pipeline`.
pub fn with_enhancer(
    pipeline: Pipeline,
    generator: Arc<dyn TextGenerator>,
) -> Result<Pipeline, PipelineError> {
    pipeline.with_analyzer(Arc::new(ModelEnhancer::new(generator)))
}
