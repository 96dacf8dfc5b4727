pub mod config;
pub mod executor;
pub mod harvest;
pub mod logging;
pub mod model;
pub mod scan;
pub mod traits;

// Re-export common types for convenience
pub use config::{ConfigError, HarvestConfig};
pub use executor::*;
pub use harvest::analyzers::{default_pipeline, with_enhancer, TextGenerator};
pub use harvest::{
    harvest, ChainConfig, MergeEngine, MergeStrategy, Pipeline, PipelineContext, PipelineError,
    RunReport, StageConfig,
};
pub use logging::{init_tracing, LogLevel};
pub use model::*;
pub use scan::{discover, ScanError};
pub use traits::*;
