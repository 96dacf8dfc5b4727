//! Story file scanner.
//!
//! Reads a Storybook-style CSF file and reports the component it documents:
//! name (from `component:`, the `title:` leaf, or the file stem), category
//! (the `title:` path), tags, the docs description and one example per
//! exported story.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::text::{component_stem, export_to_title, line_of, quoted_items, read_source};
use crate::harvest::context::PipelineContext;
use crate::model::{AnalysisRecord, AnalyzerResult, Diagnostic, ExampleDescriptor};
use crate::traits::{Analyzer, AnalyzerError};

pub const STORY_ANALYZER: &str = "story";

static TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\btitle\s*:\s*['"`]([^'"`]+)['"`]"#).unwrap());
static COMPONENT_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bcomponent\s*:\s*([A-Z][A-Za-z0-9_]*)").unwrap());
static STORY_EXPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^export\s+const\s+([A-Za-z_][A-Za-z0-9_]*)\b").unwrap());
static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btags\s*:\s*\[([^\]]*)\]").unwrap());
static DOCS_DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"description\s*:\s*\{\s*component\s*:\s*['"`]([^'"`]*)['"`]"#).unwrap()
});
static IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"import\s+(?:([A-Za-z_][A-Za-z0-9_]*)\s*,?\s*)?(?:\{([^}]*)\})?\s*from\s+['"]([^'"]+)['"]"#,
    )
    .unwrap()
});

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StoryOptions {
    /// Exports that are not stories
    pub skip_exports: Vec<String>,

    /// Longest example snippet kept, in lines
    pub max_example_lines: usize,
}

impl Default for StoryOptions {
    fn default() -> Self {
        Self {
            skip_exports: vec!["default".to_string(), "meta".to_string()],
            max_example_lines: 40,
        }
    }
}

#[derive(Debug, Default)]
pub struct StoryAnalyzer;

impl StoryAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Extracts one record from story source text.
    pub fn analyze_text(
        &self,
        context: &PipelineContext,
        source: &str,
        options: &StoryOptions,
    ) -> Result<AnalyzerResult, AnalyzerError> {
        let mut result = AnalyzerResult::new(STORY_ANALYZER);
        let subject = context.subject_path.display().to_string();

        let title = TITLE.captures(source).map(|c| c[1].trim().to_string());
        let component = COMPONENT_REF.captures(source).map(|c| c[1].to_string());
        let title_leaf = title
            .as_deref()
            .and_then(|t| t.rsplit('/').next())
            .map(str::trim)
            .filter(|leaf| !leaf.is_empty())
            .map(str::to_string);

        let name = component
            .or(title_leaf)
            .or_else(|| component_stem(&context.subject_path))
            .ok_or_else(|| {
                AnalyzerError::InvalidContent(format!("cannot name component in {}", subject))
            })?;

        let mut record = AnalysisRecord::new(name.clone());
        record.category = title
            .as_deref()
            .and_then(|t| t.rsplit_once('/'))
            .map(|(path, _)| path.trim().to_string())
            .filter(|path| !path.is_empty());

        if let Some(c) = TAGS.captures(source) {
            record.tags.extend(quoted_items(&c[1]));
        }
        if let Some(c) = DOCS_DESCRIPTION.captures(source) {
            record.description = c[1].trim().to_string();
        }
        record.import_path = resolve_import(source, &name, context);

        let exports: Vec<_> = STORY_EXPORT.captures_iter(source).collect();
        for (i, capture) in exports.iter().enumerate() {
            let export = &capture[1];
            if options.skip_exports.iter().any(|s| s == export) {
                continue;
            }
            let start = capture.get(0).map(|m| m.start()).unwrap_or_default();
            let end = exports
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(source.len());
            let code = source[start..end]
                .trim()
                .lines()
                .take(options.max_example_lines)
                .collect::<Vec<_>>()
                .join("\n");

            let title = export_to_title(export);
            if record.examples.iter().any(|e| e.title == title) {
                result.push_diagnostic(
                    Diagnostic::warning(format!("Duplicate story title '{}'", title))
                        .with_source(subject.clone())
                        .with_line(line_of(source, start)),
                );
                continue;
            }
            record.examples.push(ExampleDescriptor {
                title,
                code,
                description: None,
            });
        }

        if record.examples.is_empty() {
            result.push_diagnostic(
                Diagnostic::info("No story exports found").with_source(subject.clone()),
            );
        }

        if let Some(title) = &title {
            record
                .custom_data
                .insert("storyTitle".to_string(), json!(title));
        }
        record
            .custom_data
            .insert("storyCount".to_string(), json!(record.examples.len()));
        if let Some(library) = &context.design_library {
            record.tags.insert(library.clone());
        }

        debug!(component = %name, stories = record.examples.len(), "Parsed story file");
        result.insert_metadata("subject", json!(subject));
        result.push_record(record);
        Ok(result)
    }
}

/// Import path of `name`: a package import wins, then the base-path hint.
fn resolve_import(source: &str, name: &str, context: &PipelineContext) -> Option<String> {
    for c in IMPORT.captures_iter(source) {
        let default_import = c.get(1).map(|m| m.as_str());
        let named = c.get(2).map(|m| m.as_str()).unwrap_or_default();
        let imports_name = default_import == Some(name)
            || named
                .split(',')
                .map(|n| n.trim().split_whitespace().next().unwrap_or_default())
                .any(|n| n == name);
        if !imports_name {
            continue;
        }
        let path = &c[3];
        if !path.starts_with('.') {
            return Some(path.to_string());
        }
        break;
    }

    context
        .base_import_path
        .as_deref()
        .map(|base| format!("{}/{}", base.trim_end_matches('/'), name))
}

#[async_trait]
impl Analyzer for StoryAnalyzer {
    fn identifier(&self) -> &str {
        STORY_ANALYZER
    }

    fn can_handle(&self, context: &PipelineContext) -> bool {
        context.subject_file_name().contains(".stories.")
    }

    async fn run(&self, context: &PipelineContext) -> Result<AnalyzerResult, AnalyzerError> {
        let options: StoryOptions = context
            .analyzer_options()
            .map_err(|e| AnalyzerError::InvalidConfig(e.to_string()))?;
        let source = read_source(&context.subject_path).await?;
        self.analyze_text(context, &source, &options)
    }
}
