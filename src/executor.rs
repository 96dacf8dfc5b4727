use crate::harvest::context::{ChainConfig, PipelineContext};
use crate::harvest::pipeline::{Pipeline, PipelineError};
use crate::harvest::report::{harvest, RunReport};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument};

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Semaphore error: {0}")]
    Semaphore(#[from] tokio::sync::AcquireError),
    #[error("Harvest task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Outcome of one subject in a batch.
#[derive(Debug)]
pub struct SubjectOutcome {
    pub subject: PathBuf,
    pub report: Result<RunReport, ExecutorError>,
}

/// Runs independent pipeline runs concurrently, bounded by a semaphore.
///
/// Each run owns its context and accumulated results; the pipeline and chain
/// are shared read-only.
pub struct HarvestExecutor {
    semaphore: Arc<Semaphore>,
}

impl HarvestExecutor {
    pub fn new(concurrency_limit: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit.max(1))),
        }
    }

    #[instrument(skip(self, pipeline, chain, context), fields(subject = %context.subject_path.display()))]
    pub async fn run(
        &self,
        pipeline: &Pipeline,
        chain: &ChainConfig,
        context: PipelineContext,
    ) -> Result<RunReport, ExecutorError> {
        let _permit = self.semaphore.acquire().await?;

        info!("Starting harvest");
        let report = harvest(pipeline, &context, chain).await?;
        info!(entities = report.entities.len(), "Finished harvest");

        Ok(report)
    }

    /// Harvests every context, returning outcomes in input order.
    ///
    /// A failed or panicking run is reported in its own outcome and never
    /// affects the others.
    #[instrument(skip_all, fields(subjects = contexts.len()))]
    pub async fn run_all(
        &self,
        pipeline: Arc<Pipeline>,
        chain: Arc<ChainConfig>,
        contexts: Vec<PipelineContext>,
    ) -> Vec<SubjectOutcome> {
        let mut handles = Vec::with_capacity(contexts.len());

        for context in contexts {
            let subject = context.subject_path.clone();
            let semaphore = Arc::clone(&self.semaphore);
            let pipeline = Arc::clone(&pipeline);
            let chain = Arc::clone(&chain);

            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await?;
                let report = harvest(&pipeline, &context, &chain).await?;
                Ok::<RunReport, ExecutorError>(report)
            });
            handles.push((subject, handle));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for (subject, handle) in handles {
            let report = match handle.await {
                Ok(report) => report,
                Err(join) => Err(ExecutorError::from(join)),
            };
            if let Err(e) = &report {
                error!(subject = %subject.display(), error = %e, "Harvest failed");
            }
            outcomes.push(SubjectOutcome { subject, report });
        }

        info!(
            failed = outcomes.iter().filter(|o| o.report.is_err()).count(),
            "Batch finished"
        );
        outcomes
    }
}
