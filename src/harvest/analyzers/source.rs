//! Component source scanner.
//!
//! Works on the companion file paired with a story. Props come from
//! `XProps` interfaces or type literals, Vue `defineProps<{...}>()` and Svelte
//! `export let` declarations; defaults from destructured parameters. Slots,
//! imports and accessibility hints are matched line by line. None of this is
//! a parser; unmatched constructs are simply not reported.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::debug;

use super::text::{component_stem, doc_comment_text, read_source};
use crate::harvest::context::PipelineContext;
use crate::model::{
    AccessibilityDescriptor, AccessibilityKind, AnalysisRecord, AnalyzerResult, Diagnostic,
    PropDescriptor, SlotDescriptor,
};
use crate::traits::{Analyzer, AnalyzerError};

pub const SOURCE_ANALYZER: &str = "source";

static COMPONENT_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^export\s+(?:default\s+)?(?:function|const|class)\s+([A-Z][A-Za-z0-9_]*)")
        .unwrap()
});
static DOC_BEFORE_EXPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"/\*\*((?:[^*]|\*+[^*/])*)\*+/\s*export\s+(?:default\s+)?(?:function|const|class)\s+([A-Z][A-Za-z0-9_]*)",
    )
    .unwrap()
});
static PROPS_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)(?:interface\s+[A-Za-z0-9_]*Props(?:\s+extends\s+[^{]+)?\s*\{|type\s+[A-Za-z0-9_]*Props\s*=\s*\{|defineProps<\{)(.*?)\n?\s*\}",
    )
    .unwrap()
});
static PROP_MEMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^(?:readonly\s+)?['"]?([A-Za-z_$][\w$-]*)['"]?(\?)?\s*:\s*(.+?)[;,]?$"#).unwrap()
});
static SVELTE_PROP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*export\s+let\s+([A-Za-z_$][\w$]*)(?:\s*:\s*([^=;]+?))?(?:\s*=\s*([^;]+?))?\s*;")
        .unwrap()
});
static DESTRUCTURED_PARAMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:function\s+[A-Z][A-Za-z0-9_]*\s*\(|=\s*\()\s*\{([^}]*)\}").unwrap()
});
static PARAM_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([A-Za-z_$][\w$]*)\s*=\s*([^,\n]+)").unwrap());
static IMPORT_FROM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:type\s+)?(.*?)\s+from\s+['"]([^'"]+)['"]"#).unwrap()
});
static SLOT_ELEMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<slot(?:\s+name=["']([\w-]+)["'])?[^>]*>"#).unwrap()
});
static ARIA_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"aria-label(?:ledby)?=\{?["'`]([^"'`]+)["'`]"#).unwrap()
});
static ROLE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"\brole=\{?["'`]([\w-]+)["'`]"#).unwrap());
static KEY_HANDLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bon(?:KeyDown|KeyUp|KeyPress)\b|@keydown|on:keydown").unwrap());
static TAB_INDEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\btab[iI]ndex\s*=").unwrap());

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceOptions {
    /// Companion extensions this analyzer reads
    pub extensions: Vec<String>,

    /// Props never reported (e.g. "className")
    pub ignore_props: Vec<String>,
}

impl Default for SourceOptions {
    fn default() -> Self {
        Self {
            extensions: ["tsx", "ts", "jsx", "js", "vue", "svelte"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            ignore_props: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SourceAnalyzer {
    options: SourceOptions,
}

impl SourceAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `options` for the capability check when no stage payload is set.
    pub fn with_options(options: SourceOptions) -> Self {
        Self { options }
    }

    pub fn analyze_text(
        &self,
        context: &PipelineContext,
        companion: &Path,
        source: &str,
        options: &SourceOptions,
    ) -> Result<AnalyzerResult, AnalyzerError> {
        let mut result = AnalyzerResult::new(SOURCE_ANALYZER);
        let file = companion.display().to_string();

        let name = COMPONENT_EXPORT
            .captures(source)
            .map(|c| c[1].to_string())
            .or_else(|| component_stem(companion))
            .ok_or_else(|| {
                AnalyzerError::InvalidContent(format!("cannot name component in {}", file))
            })?;

        let mut record = AnalysisRecord::new(name.clone());
        record.description = DOC_BEFORE_EXPORT
            .captures_iter(source)
            .find(|c| c[2] == *name)
            .map(|c| doc_comment_text(&c[1]))
            .unwrap_or_default();

        let mut props = extract_props(source);
        apply_defaults(source, &mut props);
        props.retain(|p| !options.ignore_props.contains(&p.name));

        record.slots = extract_slots(source, &props);
        record.props = props;

        let (dependencies, related) = extract_imports(source, &name);
        record.dependencies = dependencies;
        record.related_components = related;
        record.accessibility_notes = extract_accessibility(source);

        if record.props.is_empty() {
            result.push_diagnostic(
                Diagnostic::info(format!("No props found for {}", name)).with_source(file.clone()),
            );
        }

        record
            .custom_data
            .insert("sourceFile".to_string(), json!(file));
        record
            .custom_data
            .insert("framework".to_string(), json!(context.framework));

        debug!(
            component = %name,
            props = record.props.len(),
            slots = record.slots.len(),
            "Parsed component source"
        );
        result.insert_metadata("companion", json!(file));
        result.push_record(record);
        Ok(result)
    }

    /// Stage payload if one is set, otherwise the options given at construction.
    fn options_for(&self, context: &PipelineContext) -> Result<SourceOptions, AnalyzerError> {
        if context.analyzer_config.is_null() {
            return Ok(self.options.clone());
        }
        context
            .analyzer_options()
            .map_err(|e| AnalyzerError::InvalidConfig(e.to_string()))
    }

    fn handles_extension(&self, path: &Path, options: &SourceOptions) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| options.extensions.iter().any(|allowed| allowed == ext))
            .unwrap_or(false)
    }
}

fn extract_props(source: &str) -> Vec<PropDescriptor> {
    let mut props: Vec<PropDescriptor> = Vec::new();

    for block in PROPS_BLOCK.captures_iter(source) {
        let mut doc: Option<String> = None;
        let mut pending_doc: Option<String> = None;

        for line in block[1].lines() {
            let line = line.trim();
            if let Some(acc) = pending_doc.as_mut() {
                if let Some(end) = line.find("*/") {
                    acc.push('\n');
                    acc.push_str(&line[..end]);
                    doc = Some(doc_comment_text(acc)).filter(|d| !d.is_empty());
                    pending_doc = None;
                } else {
                    acc.push('\n');
                    acc.push_str(line);
                }
                continue;
            }
            if let Some(rest) = line.strip_prefix("/**") {
                match rest.find("*/") {
                    Some(end) => {
                        doc = Some(doc_comment_text(&rest[..end])).filter(|d| !d.is_empty())
                    }
                    None => pending_doc = Some(rest.to_string()),
                }
                continue;
            }
            if let Some(rest) = line.strip_prefix("//") {
                doc = Some(rest.trim().to_string()).filter(|d| !d.is_empty());
                continue;
            }
            if let Some(member) = PROP_MEMBER.captures(line) {
                let name = member[1].to_string();
                if props.iter().any(|p| p.name == name) {
                    doc = None;
                    continue;
                }
                props.push(PropDescriptor {
                    name,
                    prop_type: member[3].trim().to_string(),
                    required: member.get(2).is_none(),
                    description: doc.take(),
                    default_value: None,
                });
            }
        }
    }

    for c in SVELTE_PROP.captures_iter(source) {
        let name = c[1].to_string();
        if props.iter().any(|p| p.name == name) {
            continue;
        }
        let default_value = c.get(3).map(|m| m.as_str().trim().to_string());
        props.push(PropDescriptor {
            name,
            prop_type: c.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default(),
            required: default_value.is_none(),
            description: None,
            default_value,
        });
    }

    props
}

fn apply_defaults(source: &str, props: &mut [PropDescriptor]) {
    let Some(params) = DESTRUCTURED_PARAMS.captures(source) else {
        return;
    };
    for c in PARAM_DEFAULT.captures_iter(&params[1]) {
        let value = c[2].trim().trim_end_matches(',').trim().to_string();
        if let Some(prop) = props.iter_mut().find(|p| p.name == c[1]) {
            if prop.default_value.is_none() {
                prop.default_value = Some(value);
            }
        }
    }
}

fn extract_slots(source: &str, props: &[PropDescriptor]) -> Vec<SlotDescriptor> {
    let mut slots: Vec<SlotDescriptor> = Vec::new();

    if let Some(children) = props.iter().find(|p| p.name == "children") {
        slots.push(SlotDescriptor {
            name: "default".to_string(),
            description: children.description.clone().unwrap_or_default(),
            required: children.required,
        });
    }

    for c in SLOT_ELEMENT.captures_iter(source) {
        let name = c.get(1).map(|m| m.as_str()).unwrap_or("default").to_string();
        if slots.iter().all(|s| s.name != name) {
            slots.push(SlotDescriptor {
                name,
                description: String::new(),
                required: false,
            });
        }
    }

    slots
}

/// Package dependencies and capitalized relative imports.
fn extract_imports(source: &str, component: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    let mut dependencies = BTreeSet::new();
    let mut related = BTreeSet::new();

    for c in IMPORT_FROM.captures_iter(source) {
        let clause = &c[1];
        let path = &c[2];

        if !path.starts_with('.') && !path.starts_with('/') {
            let mut segments = path.split('/');
            let package = match segments.next() {
                Some(scope) if scope.starts_with('@') => match segments.next() {
                    Some(pkg) => format!("{}/{}", scope, pkg),
                    None => scope.to_string(),
                },
                Some(pkg) => pkg.to_string(),
                None => continue,
            };
            dependencies.insert(package);
            continue;
        }

        let names = clause
            .split(|ch: char| ch == ',' || ch == '{' || ch == '}')
            .map(str::trim)
            .filter(|part| !part.starts_with("type "))
            // `Foo as Bar` binds Bar locally; the component is still Foo
            .filter_map(|part| part.split_whitespace().next());
        for name in names {
            let capitalized = name.chars().next().map(char::is_uppercase).unwrap_or(false);
            if capitalized && name != component && !name.ends_with("Props") {
                related.insert(name.to_string());
            }
        }
    }

    (dependencies, related)
}

fn extract_accessibility(source: &str) -> BTreeSet<AccessibilityDescriptor> {
    let mut notes = BTreeSet::new();

    for c in ARIA_LABEL.captures_iter(source) {
        notes.insert(AccessibilityDescriptor::new(
            AccessibilityKind::AriaLabel,
            c[1].trim(),
        ));
    }
    for c in ROLE.captures_iter(source) {
        notes.insert(AccessibilityDescriptor::new(
            AccessibilityKind::SemanticRole,
            &c[1],
        ));
    }
    if KEY_HANDLER.is_match(source) {
        notes.insert(AccessibilityDescriptor::new(
            AccessibilityKind::KeyboardSupport,
            "keydown handler",
        ));
    }
    if TAB_INDEX.is_match(source) {
        notes.insert(AccessibilityDescriptor::new(
            AccessibilityKind::KeyboardSupport,
            "focusable",
        ));
    }

    notes
}

#[async_trait]
impl Analyzer for SourceAnalyzer {
    fn identifier(&self) -> &str {
        SOURCE_ANALYZER
    }

    /// Handles a companion with a known extension. A malformed payload is
    /// let through so `run` reports it.
    fn can_handle(&self, context: &PipelineContext) -> bool {
        let Ok(options) = self.options_for(context) else {
            return true;
        };
        context
            .companion_path
            .as_deref()
            .map(|path| self.handles_extension(path, &options))
            .unwrap_or(false)
    }

    async fn run(&self, context: &PipelineContext) -> Result<AnalyzerResult, AnalyzerError> {
        let options = self.options_for(context)?;
        let companion = context.companion_path.as_deref().ok_or_else(|| {
            AnalyzerError::InvalidContent("no companion source file".to_string())
        })?;
        let source = read_source(companion).await?;
        self.analyze_text(context, companion, &source, &options)
    }
}
