//! Per-run report: pipeline results, merged entities and diagnostics.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use crate::harvest::context::{ChainConfig, PipelineContext};
use crate::harvest::merge::MergeEngine;
use crate::harvest::pipeline::{Pipeline, PipelineError};
use crate::model::{AnalyzerResult, Diagnostic, DiagnosticLevel, MergedEntity};

/// Statistics about one run.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    /// Wall time for execute and merge (milliseconds)
    pub duration_ms: u64,

    /// Analyzers that produced a result
    pub analyzers_run: usize,

    /// Records across all results, before merging
    pub records_seen: usize,

    pub entities: usize,
    pub errors: usize,
    pub warnings: usize,
}

/// Everything a reporting collaborator needs for one subject.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub subject: PathBuf,
    pub results: Vec<AnalyzerResult>,
    pub entities: Vec<MergedEntity>,
    /// Analyzer diagnostics in result order, then merge diagnostics
    pub diagnostics: Vec<Diagnostic>,
    pub stats: RunStats,
}

impl RunReport {
    /// Assembles a report from finished results.
    pub fn build(
        subject: PathBuf,
        results: Vec<AnalyzerResult>,
        engine: MergeEngine,
        started: Instant,
    ) -> Self {
        let outcome = engine.merge(&results);

        let mut diagnostics: Vec<Diagnostic> = results
            .iter()
            .flat_map(|r| r.diagnostics.iter().cloned())
            .collect();
        diagnostics.extend(outcome.diagnostics);

        let count = |level: DiagnosticLevel| diagnostics.iter().filter(|d| d.level == level).count();
        let stats = RunStats {
            duration_ms: started.elapsed().as_millis() as u64,
            analyzers_run: results.len(),
            records_seen: results.iter().map(|r| r.records.len()).sum(),
            entities: outcome.entities.len(),
            errors: count(DiagnosticLevel::Error),
            warnings: count(DiagnosticLevel::Warning),
        };

        Self {
            subject,
            results,
            entities: outcome.entities,
            diagnostics,
            stats,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.stats.errors > 0
    }

    /// Looks up a merged entity by (case-insensitive) name.
    pub fn entity(&self, name: &str) -> Option<&MergedEntity> {
        let key = crate::model::normalize_name(name);
        self.entities.iter().find(|e| e.key() == key)
    }

    /// Served representation of the merged entities and diagnostics.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&serde_json::json!({
            "subject": self.subject,
            "components": self.entities,
            "diagnostics": self.diagnostics,
            "stats": self.stats,
        }))
    }

    pub fn log_summary(&self) {
        for diagnostic in &self.diagnostics {
            let source = diagnostic.source.as_deref().unwrap_or("-");
            match diagnostic.level {
                DiagnosticLevel::Error | DiagnosticLevel::Warning => warn!(
                    subject = %self.subject.display(),
                    source,
                    level = ?diagnostic.level,
                    "{}",
                    diagnostic.message
                ),
                DiagnosticLevel::Info => info!(
                    subject = %self.subject.display(),
                    source,
                    "{}",
                    diagnostic.message
                ),
            }
        }
        info!(
            subject = %self.subject.display(),
            entities = self.stats.entities,
            analyzers = self.stats.analyzers_run,
            errors = self.stats.errors,
            duration_ms = self.stats.duration_ms,
            "Harvest completed"
        );
    }
}

/// Executes the chain for `context` and merges the results.
///
/// # Errors
///
/// Propagates [`PipelineError::ChainAborted`] from [`Pipeline::execute`].
pub async fn harvest(
    pipeline: &Pipeline,
    context: &PipelineContext,
    chain: &ChainConfig,
) -> Result<RunReport, PipelineError> {
    let started = Instant::now();
    let results = pipeline.execute(context, chain).await?;
    Ok(RunReport::build(
        context.subject_path.clone(),
        results,
        MergeEngine::new(chain.strategy),
        started,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::context::{MergeStrategy, StageConfig};
    use crate::model::AnalysisRecord;
    use crate::traits::{Analyzer, AnalyzerError};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Fixed {
        id: &'static str,
        records: Vec<AnalysisRecord>,
        fail: bool,
    }

    #[async_trait]
    impl Analyzer for Fixed {
        fn identifier(&self) -> &str {
            self.id
        }

        fn can_handle(&self, _context: &PipelineContext) -> bool {
            true
        }

        async fn run(&self, _context: &PipelineContext) -> Result<AnalyzerResult, AnalyzerError> {
            if self.fail {
                return Err(AnalyzerError::Model("upstream unavailable".to_string()));
            }
            Ok(AnalyzerResult::new(self.id).with_records(self.records.clone()))
        }
    }

    fn pipeline() -> Pipeline {
        let mut first = AnalysisRecord::new("Button");
        first.tags.insert("a".to_string());
        let mut second = AnalysisRecord::new("button");
        second.tags.insert("b".to_string());

        Pipeline::new()
            .with_analyzer(Arc::new(Fixed {
                id: "story",
                records: vec![first, AnalysisRecord::new("")],
                fail: false,
            }))
            .and_then(|p| {
                p.with_analyzer(Arc::new(Fixed {
                    id: "enhancer",
                    records: vec![],
                    fail: true,
                }))
            })
            .and_then(|p| {
                p.with_analyzer(Arc::new(Fixed {
                    id: "source",
                    records: vec![second],
                    fail: false,
                }))
            })
            .unwrap()
    }

    fn chain() -> ChainConfig {
        ChainConfig::new(vec![
            StageConfig::new("story", 1),
            StageConfig::new("enhancer", 2),
            StageConfig::new("source", 3),
        ])
        .with_continue_on_error(true)
        .with_strategy(MergeStrategy::Merge)
    }

    #[tokio::test]
    async fn test_harvest_collects_diagnostics_alongside_entities() {
        let ctx = PipelineContext::new("Button.stories.tsx", "react");
        let report = harvest(&pipeline(), &ctx, &chain()).await.unwrap();

        assert_eq!(report.entities.len(), 1);
        assert_eq!(report.stats.analyzers_run, 2);
        assert_eq!(report.stats.records_seen, 3);
        assert_eq!(report.stats.errors, 1);
        assert_eq!(report.stats.warnings, 1);
        assert!(report.has_errors());

        // Pipeline diagnostic first, merge diagnostic after
        assert_eq!(report.diagnostics[0].source.as_deref(), Some("enhancer"));
        assert_eq!(report.diagnostics[1].level, DiagnosticLevel::Warning);

        let button = report.entity("BUTTON").unwrap();
        assert_eq!(button.contributors, vec!["story", "source"]);
    }

    #[tokio::test]
    async fn test_report_json_shape() {
        let ctx = PipelineContext::new("Button.stories.tsx", "react");
        let report = harvest(&pipeline(), &ctx, &chain()).await.unwrap();

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["components"][0]["name"], "button");
        assert_eq!(json["components"][0]["contributors"][1], "source");
        assert_eq!(json["stats"]["entities"], 1);
        assert_eq!(json["diagnostics"][0]["level"], "error");
    }

    #[tokio::test]
    async fn test_harvest_propagates_abort() {
        let ctx = PipelineContext::new("Button.stories.tsx", "react");
        let err = harvest(&pipeline(), &ctx, &chain().with_continue_on_error(false))
            .await
            .unwrap_err();
        assert_eq!(err.analyzer(), Some("enhancer"));
    }
}
