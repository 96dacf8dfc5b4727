//! Weight-ordered analyzer pipeline.
//!
//! This module provides the [`Pipeline`] coordinator that executes registered
//! analyzers against a [`PipelineContext`] with:
//! - Stable ordering by stage weight (ties keep declaration order)
//! - A silent capability gate via [`Analyzer::can_handle`]
//! - Per-analyzer failure isolation, or whole-run abort when configured
//! - Structured logging via `tracing`
//!
//! Analyzers run strictly one after another: every analyzer sees the results
//! of all earlier analyzers through `context.previous_results`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::harvest::context::{ChainConfig, PipelineContext, StageConfig};
use crate::model::{now_millis, AnalyzerResult, Diagnostic};
use crate::traits::{Analyzer, AnalyzerError};

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors that can occur during pipeline execution.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// An analyzer was invoked for a context it declared it cannot handle
    #[error("Analyzer '{analyzer}' cannot handle '{subject}'")]
    CapabilityMismatch { analyzer: String, subject: String },

    /// The analyzer's `run` returned an error
    #[error("Analyzer '{analyzer}' failed: {source}")]
    ExecutionFailure {
        analyzer: String,
        #[source]
        source: AnalyzerError,
    },

    /// A failure stopped the run because `continue_on_error` was disabled
    #[error("Chain aborted by analyzer '{analyzer}': {source}")]
    ChainAborted {
        analyzer: String,
        #[source]
        source: Box<PipelineError>,
    },

    /// Two analyzers share one identifier
    #[error("Analyzer '{0}' is already registered")]
    DuplicateAnalyzer(String),

    /// No analyzer is registered under this identifier
    #[error("Analyzer '{0}' is not registered")]
    UnknownAnalyzer(String),
}

impl PipelineError {
    /// Identifier of the analyzer behind this error, if any.
    pub fn analyzer(&self) -> Option<&str> {
        match self {
            PipelineError::CapabilityMismatch { analyzer, .. }
            | PipelineError::ExecutionFailure { analyzer, .. }
            | PipelineError::ChainAborted { analyzer, .. } => Some(analyzer),
            PipelineError::DuplicateAnalyzer(id) | PipelineError::UnknownAnalyzer(id) => Some(id),
        }
    }
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Registry of analyzers plus the chain executor.
///
/// # Thread Safety
///
/// The pipeline is `Send + Sync`; wrap it in an [`Arc`] to drive many
/// independent runs concurrently. Each run owns its own accumulated results.
///
/// # Example
///
/// ```ignore
/// use component_harvester::harvest::{ChainConfig, Pipeline, PipelineContext, StageConfig};
///
/// let mut pipeline = Pipeline::new();
/// pipeline.register(Arc::new(StoryAnalyzer::new()))?;
///
/// let chain = ChainConfig::new(vec![StageConfig::new("story", 10)]);
/// let ctx = PipelineContext::new("src/Button.stories.tsx", "react");
/// let results = pipeline.execute(&ctx, &chain).await?;
/// ```
#[derive(Default)]
pub struct Pipeline {
    analyzers: HashMap<String, Arc<dyn Analyzer>>,

    /// Identifiers in registration order
    order: Vec<String>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("analyzers", &self.order)
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an analyzer under its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DuplicateAnalyzer`] if the identifier is taken.
    pub fn register(&mut self, analyzer: Arc<dyn Analyzer>) -> Result<(), PipelineError> {
        let id = analyzer.identifier().to_string();
        if self.analyzers.contains_key(&id) {
            return Err(PipelineError::DuplicateAnalyzer(id));
        }
        debug!(analyzer = %id, "Registered analyzer");
        self.order.push(id.clone());
        self.analyzers.insert(id, analyzer);
        Ok(())
    }

    /// Builder form of [`Pipeline::register`].
    pub fn with_analyzer(mut self, analyzer: Arc<dyn Analyzer>) -> Result<Self, PipelineError> {
        self.register(analyzer)?;
        Ok(self)
    }

    pub fn get(&self, identifier: &str) -> Option<&Arc<dyn Analyzer>> {
        self.analyzers.get(identifier)
    }

    /// Registered identifiers, in registration order.
    pub fn identifiers(&self) -> &[String] {
        &self.order
    }

    /// Enabled, registered stages sorted by weight.
    ///
    /// `sort_by_key` is stable, so equal weights keep declaration order.
    pub fn plan<'c>(&self, chain: &'c ChainConfig) -> Vec<&'c StageConfig> {
        let mut selected: Vec<&StageConfig> = chain
            .stages
            .iter()
            .filter(|stage| stage.enabled && self.analyzers.contains_key(&stage.analyzer))
            .collect();
        selected.sort_by_key(|stage| stage.weight);
        selected
    }

    /// Runs one analyzer outside a chain.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::UnknownAnalyzer`] if nothing is registered under `identifier`
    /// - [`PipelineError::CapabilityMismatch`] if the analyzer rejects `context`
    /// - [`PipelineError::ExecutionFailure`] if `run` fails
    pub async fn invoke(
        &self,
        identifier: &str,
        context: &PipelineContext,
    ) -> Result<AnalyzerResult, PipelineError> {
        let analyzer = self
            .analyzers
            .get(identifier)
            .ok_or_else(|| PipelineError::UnknownAnalyzer(identifier.to_string()))?;

        if !analyzer.can_handle(context) {
            return Err(PipelineError::CapabilityMismatch {
                analyzer: identifier.to_string(),
                subject: context.subject_path.display().to_string(),
            });
        }

        run_stamped(analyzer.as_ref(), context).await
    }

    /// Executes the chain against `context`.
    ///
    /// Returns the results of every analyzer that ran, in execution order.
    /// Failures become `error` diagnostics on the last successful result when
    /// `chain.continue_on_error` is set.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::ChainAborted`] on the first analyzer failure
    /// when `chain.continue_on_error` is `false`. No partial results are
    /// returned in that case.
    pub async fn execute(
        &self,
        context: &PipelineContext,
        chain: &ChainConfig,
    ) -> Result<Vec<AnalyzerResult>, PipelineError> {
        let start = Instant::now();
        let plan = self.plan(chain);
        // Shared so each stage's snapshot copies pointers, not results
        let mut results: Vec<Arc<AnalyzerResult>> = Vec::with_capacity(plan.len());

        info!(
            subject = %context.subject_path.display(),
            stages = plan.len(),
            "Starting analyzer chain"
        );

        for stage in plan {
            let Some(analyzer) = self.analyzers.get(&stage.analyzer) else {
                continue;
            };

            let derived = context.derive(Arc::from(results.as_slice()), stage.config.clone());

            // ================================================================
            // Capability gate
            // ================================================================

            if !analyzer.can_handle(&derived) {
                debug!(analyzer = %stage.analyzer, "Analyzer declined subject");
                continue;
            }

            // ================================================================
            // Run
            // ================================================================

            let stage_start = Instant::now();
            let outcome = run_stamped(analyzer.as_ref(), &derived).await;
            drop(derived);

            match outcome {
                Ok(result) => {
                    info!(
                        analyzer = %stage.analyzer,
                        records = result.records.len(),
                        duration_ms = stage_start.elapsed().as_millis() as u64,
                        "Analyzer completed"
                    );
                    results.push(Arc::new(result));
                }
                Err(failure) => {
                    error!(analyzer = %stage.analyzer, error = %failure, "Analyzer failed");

                    if !chain.continue_on_error {
                        return Err(PipelineError::ChainAborted {
                            analyzer: stage.analyzer.clone(),
                            source: Box::new(failure),
                        });
                    }

                    let diagnostic = Diagnostic::error(failure.to_string())
                        .with_source(stage.analyzer.clone());
                    match results.last_mut() {
                        Some(last) => Arc::make_mut(last).push_diagnostic(diagnostic),
                        None => warn!(
                            analyzer = %stage.analyzer,
                            "No earlier result to carry the failure diagnostic, dropping it"
                        ),
                    }
                }
            }
        }

        info!(
            results = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Analyzer chain completed"
        );

        Ok(results
            .into_iter()
            .map(|result| Arc::try_unwrap(result).unwrap_or_else(|shared| (*shared).clone()))
            .collect())
    }
}

/// Runs `analyzer` and stamps provenance on its result.
async fn run_stamped(
    analyzer: &dyn Analyzer,
    context: &PipelineContext,
) -> Result<AnalyzerResult, PipelineError> {
    let mut result = analyzer
        .run(context)
        .await
        .map_err(|source| PipelineError::ExecutionFailure {
            analyzer: analyzer.identifier().to_string(),
            source,
        })?;
    result.analyzer = analyzer.identifier().to_string();
    result.completed_at = now_millis();
    Ok(result)
}

// ============================================================================
// Tests
// ============================================================================
