//! Per-run input and chain configuration for the analysis pipeline.
//!
//! A [`PipelineContext`] is built once per subject by the caller. The pipeline
//! derives a fresh copy for every analyzer it invokes, swapping in the
//! snapshot of results produced so far and that analyzer's configuration
//! payload. Nothing in a context is shared mutably between analyzers.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::model::{AnalysisRecord, AnalyzerResult};

// ============================================================================
// Pipeline Context
// ============================================================================

/// Immutable input handed to every analyzer in a run.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    /// Story or demonstration file the run is about
    pub subject_path: PathBuf,

    /// Component source file paired with the subject, if one was found
    pub companion_path: Option<PathBuf>,

    /// Declared UI framework (e.g. "react", "vue", "svelte")
    pub framework: String,

    /// Design library the component belongs to (e.g. "material")
    pub design_library: Option<String>,

    /// Prefix used to synthesize import paths (e.g. "@acme/ui")
    pub base_import_path: Option<String>,

    /// Results produced earlier in this run, in execution order.
    pub previous_results: Arc<[Arc<AnalyzerResult>]>,

    /// Stage-specific configuration payload, opaque to the pipeline.
    pub analyzer_config: serde_json::Value,
}

impl PipelineContext {
    pub fn new(subject_path: impl Into<PathBuf>, framework: impl Into<String>) -> Self {
        Self {
            subject_path: subject_path.into(),
            companion_path: None,
            framework: framework.into(),
            design_library: None,
            base_import_path: None,
            previous_results: Arc::from(Vec::new()),
            analyzer_config: serde_json::Value::Null,
        }
    }

    pub fn with_companion(mut self, path: impl Into<PathBuf>) -> Self {
        self.companion_path = Some(path.into());
        self
    }

    pub fn with_design_library(mut self, library: impl Into<String>) -> Self {
        self.design_library = Some(library.into());
        self
    }

    pub fn with_base_import_path(mut self, base: impl Into<String>) -> Self {
        self.base_import_path = Some(base.into());
        self
    }

    /// Builds the context seen by one analyzer: same inputs, a snapshot of
    /// the accumulated results and that stage's payload.
    pub(crate) fn derive(
        &self,
        previous_results: Arc<[Arc<AnalyzerResult>]>,
        analyzer_config: serde_json::Value,
    ) -> Self {
        Self {
            previous_results,
            analyzer_config,
            ..self.clone()
        }
    }

    pub fn subject(&self) -> &Path {
        &self.subject_path
    }

    /// File name of the subject, empty if the path has none.
    pub fn subject_file_name(&self) -> &str {
        self.subject_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
    }

    /// Every record produced earlier in this run, in chain order.
    pub fn previous_records(&self) -> impl Iterator<Item = (&str, &AnalysisRecord)> {
        self.previous_results
            .iter()
            .flat_map(|r| r.records.iter().map(move |rec| (r.analyzer.as_str(), rec)))
    }

    /// Parses this stage's payload, falling back to `T::default()` when absent.
    pub fn analyzer_options<T>(&self) -> Result<T, serde_json::Error>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.analyzer_config.is_null() {
            Ok(T::default())
        } else {
            serde_json::from_value(self.analyzer_config.clone())
        }
    }
}

// ============================================================================
// Chain Configuration
// ============================================================================

/// Per-analyzer declaration in a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageConfig {
    /// Identifier of a registered analyzer
    pub analyzer: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Execution order, ascending. Ties keep declaration order.
    #[serde(default)]
    pub weight: i32,

    /// Opaque payload handed to the analyzer
    #[serde(default)]
    pub config: serde_json::Value,
}

impl StageConfig {
    pub fn new(analyzer: impl Into<String>, weight: i32) -> Self {
        Self {
            analyzer: analyzer.into(),
            enabled: true,
            weight,
            config: serde_json::Value::Null,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

fn default_true() -> bool {
    true
}

/// How conflicting records for the same component are reconciled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Keep the first record, retain later ones as provenance only
    Append,
    /// Field-by-field reconciliation
    #[default]
    Merge,
    /// Later records replace earlier ones
    Override,
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MergeStrategy::Append => "append",
            MergeStrategy::Merge => "merge",
            MergeStrategy::Override => "override",
        };
        write!(f, "{}", name)
    }
}

/// Ordered stage list plus run-level policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    #[serde(default)]
    pub stages: Vec<StageConfig>,

    #[serde(default)]
    pub continue_on_error: bool,

    #[serde(default)]
    pub strategy: MergeStrategy,
}

impl ChainConfig {
    pub fn new(stages: Vec<StageConfig>) -> Self {
        Self {
            stages,
            ..Default::default()
        }
    }

    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }

    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}
