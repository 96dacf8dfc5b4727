//! Hand-maintained metadata read from a JSON sidecar.
//!
//! For `src/Button.stories.tsx` the sidecar is `src/Button.stories.tsx.meta.json`
//! unless the stage payload names a `path`. The file holds one record or an
//! array of records, used verbatim. Pair with the `override` strategy to make
//! the sidecar authoritative.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;

use super::text::read_source;
use crate::harvest::context::PipelineContext;
use crate::model::{AnalysisRecord, AnalyzerResult, Diagnostic};
use crate::traits::{Analyzer, AnalyzerError};

pub const OVERRIDE_ANALYZER: &str = "overrides";

const SIDECAR_SUFFIX: &str = ".meta.json";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OverrideOptions {
    /// Explicit sidecar location, relative to the subject's directory
    pub path: Option<PathBuf>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SidecarFile {
    Many(Vec<AnalysisRecord>),
    One(Box<AnalysisRecord>),
}

#[derive(Debug, Default)]
pub struct ManualOverrideAnalyzer;

impl ManualOverrideAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Location of the sidecar for this context.
    pub fn sidecar_path(context: &PipelineContext, options: &OverrideOptions) -> PathBuf {
        match &options.path {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => context
                .subject_path
                .parent()
                .map(|dir| dir.join(path))
                .unwrap_or_else(|| path.clone()),
            None => {
                let mut sidecar = context.subject_path.clone().into_os_string();
                sidecar.push(SIDECAR_SUFFIX);
                PathBuf::from(sidecar)
            }
        }
    }

    /// Parses sidecar JSON into a result.
    pub fn analyze_text(&self, sidecar: &str, text: &str) -> Result<AnalyzerResult, AnalyzerError> {
        let records = match serde_json::from_str::<SidecarFile>(text) {
            Ok(SidecarFile::Many(records)) => records,
            Ok(SidecarFile::One(record)) => vec![*record],
            Err(e) => {
                return Err(AnalyzerError::InvalidContent(format!(
                    "{} is not a record or a list of records: {}",
                    sidecar, e
                )))
            }
        };

        let mut result = AnalyzerResult::new(OVERRIDE_ANALYZER);
        for record in records {
            if record.name.trim().is_empty() {
                result.push_diagnostic(
                    Diagnostic::warning("Override record without a name skipped")
                        .with_source(sidecar.to_string()),
                );
                continue;
            }
            result.push_record(record);
        }
        result.insert_metadata("sidecar", json!(sidecar));
        Ok(result)
    }
}

#[async_trait]
impl Analyzer for ManualOverrideAnalyzer {
    fn identifier(&self) -> &str {
        OVERRIDE_ANALYZER
    }

    /// Handles contexts whose sidecar exists. A malformed payload is let
    /// through so `run` reports it.
    fn can_handle(&self, context: &PipelineContext) -> bool {
        match context.analyzer_options::<OverrideOptions>() {
            Ok(options) => Self::sidecar_path(context, &options).is_file(),
            Err(_) => true,
        }
    }

    async fn run(&self, context: &PipelineContext) -> Result<AnalyzerResult, AnalyzerError> {
        let options: OverrideOptions = context
            .analyzer_options()
            .map_err(|e| AnalyzerError::InvalidConfig(e.to_string()))?;

        let path = Self::sidecar_path(context, &options);
        let text = read_source(&path).await?;
        self.analyze_text(&path.display().to_string(), &text)
    }
}
