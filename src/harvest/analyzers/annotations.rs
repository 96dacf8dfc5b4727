//! Free-text annotation scanner.
//!
//! Picks `@`-tags out of comment lines in the subject and companion files:
//!
//! ```text
//! // @component Button
//! // @description Primary action trigger
//! // @category Forms
//! // @tags interactive, form
//! // @related Icon, Spinner
//! // @a11y keyboard-support: Space and Enter activate
//! ```
//!
//! Without `@component` the record is attributed to the last component named
//! by an earlier analyzer in the run.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;

use super::text::{comma_items, comment_text, read_source};
use crate::harvest::context::PipelineContext;
use crate::model::{
    AccessibilityDescriptor, AccessibilityKind, AnalysisRecord, AnalyzerResult, Diagnostic,
};
use crate::traits::{Analyzer, AnalyzerError};

pub const ANNOTATION_ANALYZER: &str = "annotations";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotationOptions {
    /// Leading character of annotation tags
    pub marker: char,
}

impl Default for AnnotationOptions {
    fn default() -> Self {
        Self { marker: '@' }
    }
}

/// One `@tag value` hit.
#[derive(Debug, Clone, PartialEq)]
struct Annotation {
    tag: String,
    value: String,
    line: u32,
}

#[derive(Debug, Default)]
pub struct AnnotationAnalyzer;

impl AnnotationAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Folds the annotations of one or more files into a single record.
    pub fn analyze_texts(
        &self,
        context: &PipelineContext,
        sources: &[(&Path, &str)],
        options: &AnnotationOptions,
    ) -> Result<AnalyzerResult, AnalyzerError> {
        let mut result = AnalyzerResult::new(ANNOTATION_ANALYZER);
        let mut record = AnalysisRecord::default();
        let mut seen = 0usize;

        for (path, text) in sources {
            let file = path.display().to_string();
            for annotation in scan(text, options.marker) {
                seen += 1;
                apply(&mut record, &annotation, &file, &mut result);
            }
        }

        if seen == 0 {
            return Ok(result);
        }

        if record.name.is_empty() {
            match context.previous_records().last() {
                Some((_, previous)) => record.name = previous.name.clone(),
                None => {
                    result.push_diagnostic(
                        Diagnostic::warning("Annotations found but no component to attach them to")
                            .with_source(context.subject_path.display().to_string()),
                    );
                    return Ok(result);
                }
            }
        }

        record
            .custom_data
            .insert("annotationCount".to_string(), json!(seen));
        result.push_record(record);
        Ok(result)
    }
}

fn scan(text: &str, marker: char) -> Vec<Annotation> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| {
            let comment = comment_text(line)?;
            let body = comment.strip_prefix(marker)?;
            let (tag, value) = match body.split_once(char::is_whitespace) {
                Some((tag, value)) => (tag, value.trim()),
                None => (body, ""),
            };
            Some(Annotation {
                tag: tag.to_lowercase(),
                value: value.to_string(),
                line: u32::try_from(i + 1).unwrap_or(u32::MAX),
            })
        })
        .collect()
}

fn apply(
    record: &mut AnalysisRecord,
    annotation: &Annotation,
    file: &str,
    result: &mut AnalyzerResult,
) {
    let tag = annotation.tag.as_str();
    let value = annotation.value.as_str();

    if value.is_empty() && matches!(tag, "component" | "category" | "import") {
        result.push_diagnostic(
            Diagnostic::warning(format!("Empty @{} annotation", tag))
                .with_source(file.to_string())
                .with_line(annotation.line),
        );
        return;
    }

    match tag {
        "component" => record.name = value.to_string(),
        "description" => {
            if !record.description.is_empty() {
                record.description.push(' ');
            }
            record.description.push_str(value);
        }
        "category" => record.category = Some(value.to_string()),
        "import" => record.import_path = Some(value.to_string()),
        "tags" | "tag" => record.tags.extend(comma_items(value)),
        "related" | "see" => record.related_components.extend(comma_items(value)),
        "a11y" | "accessibility" => {
            let (kind, text) = match value.split_once(':') {
                Some((kind, text)) => (parse_kind(kind.trim()), text.trim()),
                None => (AccessibilityKind::Other, value),
            };
            if !text.is_empty() {
                record
                    .accessibility_notes
                    .insert(AccessibilityDescriptor::new(kind, text));
            }
        }
        // Left for other tooling (e.g. JSDoc @param)
        _ => {}
    }
}

fn parse_kind(kind: &str) -> AccessibilityKind {
    match kind.to_lowercase().as_str() {
        "aria-label" | "aria" => AccessibilityKind::AriaLabel,
        "keyboard-support" | "keyboard" => AccessibilityKind::KeyboardSupport,
        "semantic-role" | "role" => AccessibilityKind::SemanticRole,
        _ => AccessibilityKind::Other,
    }
}

/// Subject plus companion, whichever exist.
fn candidate_files(context: &PipelineContext) -> Vec<&Path> {
    std::iter::once(context.subject_path.as_path())
        .chain(context.companion_path.as_deref())
        .collect()
}

#[async_trait]
impl Analyzer for AnnotationAnalyzer {
    fn identifier(&self) -> &str {
        ANNOTATION_ANALYZER
    }

    /// Handles any context with at least one readable file.
    fn can_handle(&self, context: &PipelineContext) -> bool {
        candidate_files(context).iter().any(|p| p.is_file())
    }

    async fn run(&self, context: &PipelineContext) -> Result<AnalyzerResult, AnalyzerError> {
        let options: AnnotationOptions = context
            .analyzer_options()
            .map_err(|e| AnalyzerError::InvalidConfig(e.to_string()))?;

        let mut texts = Vec::new();
        for path in candidate_files(context) {
            if path.is_file() {
                texts.push((path, read_source(path).await?));
            }
        }
        let sources: Vec<(&Path, &str)> = texts.iter().map(|(p, t)| (*p, t.as_str())).collect();
        self.analyze_texts(context, &sources, &options)
    }
}
