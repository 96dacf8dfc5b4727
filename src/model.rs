//! Normalized records exchanged between analyzers and the merge engine.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One analyzer's view of one component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisRecord {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub tags: BTreeSet<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_path: Option<String>,
    pub props: Vec<PropDescriptor>,
    pub slots: Vec<SlotDescriptor>,
    pub examples: Vec<ExampleDescriptor>,
    pub dependencies: BTreeSet<String>,
    pub related_components: BTreeSet<String>,
    pub accessibility_notes: BTreeSet<AccessibilityDescriptor>,
    /// Analyzer-owned findings. Never interpreted by the merge engine.
    pub custom_data: BTreeMap<String, serde_json::Value>,
}

impl AnalysisRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Identity used to fold records of the same component together.
    pub fn entity_key(&self) -> String {
        normalize_name(&self.name)
    }
}

/// Lower-cases and trims a component name.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropDescriptor {
    pub name: String,
    /// Declared type as written in source, empty when unknown
    #[serde(rename = "type")]
    pub prop_type: String,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlotDescriptor {
    pub name: String,
    pub description: String,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExampleDescriptor {
    pub title: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AccessibilityKind {
    AriaLabel,
    KeyboardSupport,
    SemanticRole,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccessibilityDescriptor {
    pub kind: AccessibilityKind,
    pub value: String,
}

impl AccessibilityDescriptor {
    pub fn new(kind: AccessibilityKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}

/// A leveled, non-fatal condition encountered during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

impl Diagnostic {
    pub fn new(level: DiagnosticLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            source: None,
            line: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Warning, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(DiagnosticLevel::Info, message)
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_line(mut self, line: u32) -> Self {
        self.line = Some(line);
        self
    }
}

/// Full contribution of one analyzer invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerResult {
    pub analyzer: String,
    /// Unix timestamp (milliseconds) when the analyzer finished
    pub completed_at: i64,
    pub records: Vec<AnalysisRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalyzerResult {
    pub fn new(analyzer: impl Into<String>) -> Self {
        Self {
            analyzer: analyzer.into(),
            completed_at: now_millis(),
            records: Vec::new(),
            metadata: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn with_records(mut self, records: Vec<AnalysisRecord>) -> Self {
        self.records = records;
        self
    }

    pub fn push_record(&mut self, record: AnalysisRecord) {
        self.records.push(record);
    }

    pub fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn insert_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value);
    }
}

/// Record kept verbatim under the append strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppendedContribution {
    pub analyzer: String,
    pub record: AnalysisRecord,
}

/// Reconciled record for one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedEntity {
    #[serde(flatten)]
    pub record: AnalysisRecord,
    /// Analyzer identifiers in the order they first touched this entity
    pub contributors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub appended: Vec<AppendedContribution>,
    /// Entity state replaced by the override strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<Box<MergedEntity>>,
}

impl MergedEntity {
    pub fn seed(analyzer: &str, record: AnalysisRecord) -> Self {
        Self {
            record,
            contributors: vec![analyzer.to_string()],
            appended: Vec::new(),
            previous: None,
        }
    }

    pub fn key(&self) -> String {
        self.record.entity_key()
    }

    pub(crate) fn add_contributor(&mut self, analyzer: &str) {
        if !self.contributors.iter().any(|c| c == analyzer) {
            self.contributors.push(analyzer.to_string());
        }
    }
}

pub(crate) fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
