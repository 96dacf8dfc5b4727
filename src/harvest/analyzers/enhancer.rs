//! Model-backed enrichment.
//!
//! Asks a text generator to fill in description, tags and accessibility notes
//! for every component found earlier in the run. The generator is injected;
//! this crate ships no provider.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::harvest::context::PipelineContext;
use crate::model::{
    AccessibilityDescriptor, AccessibilityKind, AnalysisRecord, AnalyzerResult,
};
use crate::traits::{Analyzer, AnalyzerError};

pub const ENHANCER_ANALYZER: &str = "enhancer";

/// Completes a prompt. Implemented by whatever model client the caller wires in.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, AnalyzerError>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnhancerOptions {
    /// Prompts per component, including corrective re-prompts
    pub max_attempts: u32,

    /// Per-call limit
    pub timeout_secs: u64,
}

impl Default for EnhancerOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout_secs: 30,
        }
    }
}

/// Shape the model is asked to reply with.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Enhancement {
    description: String,
    tags: Vec<String>,
    accessibility: Vec<String>,
}

pub struct ModelEnhancer {
    generator: Arc<dyn TextGenerator>,
}

impl ModelEnhancer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Prompts until a reply parses, or attempts run out.
    async fn ask(
        &self,
        prompt: &str,
        options: &EnhancerOptions,
    ) -> Result<Enhancement, AnalyzerError> {
        let attempts = options.max_attempts.max(1);
        let limit = Duration::from_secs(options.timeout_secs);
        let mut request = prompt.to_string();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let reply = timeout(limit, self.generator.generate(&request))
                .await
                .map_err(|_| AnalyzerError::Timeout(options.timeout_secs))??;

            match parse_reply(&reply) {
                Ok(enhancement) => return Ok(enhancement),
                Err(e) => {
                    warn!(attempt, error = %e, "Unparseable model reply");
                    last_error = e.to_string();
                    request = corrective_prompt(prompt, &last_error);
                }
            }
        }

        Err(AnalyzerError::Model(format!(
            "no parseable reply after {} attempts: {}",
            attempts, last_error
        )))
    }
}

impl std::fmt::Debug for ModelEnhancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEnhancer").finish_non_exhaustive()
    }
}

/// Latest record per entity key, in first-seen order.
fn distinct_records(context: &PipelineContext) -> Vec<&AnalysisRecord> {
    let mut keys: Vec<String> = Vec::new();
    let mut records: Vec<&AnalysisRecord> = Vec::new();
    for (_, record) in context.previous_records() {
        let key = record.entity_key();
        if key.is_empty() {
            continue;
        }
        match keys.iter().position(|k| *k == key) {
            Some(i) => records[i] = record,
            None => {
                keys.push(key);
                records.push(record);
            }
        }
    }
    records
}

fn build_prompt(record: &AnalysisRecord, framework: &str) -> String {
    let mut prompt = format!(
        "Describe the {} UI component `{}` for a component catalogue.\n",
        framework, record.name
    );
    if !record.description.is_empty() {
        prompt.push_str(&format!("Current description: {}\n", record.description));
    }
    if !record.props.is_empty() {
        let props: Vec<_> = record.props.iter().map(|p| p.name.as_str()).collect();
        prompt.push_str(&format!("Props: {}\n", props.join(", ")));
    }
    if !record.examples.is_empty() {
        let titles: Vec<_> = record.examples.iter().map(|e| e.title.as_str()).collect();
        prompt.push_str(&format!("Examples: {}\n", titles.join(", ")));
    }
    prompt.push_str(
        "Reply with only a JSON object: \
         {\"description\": string, \"tags\": [string], \"accessibility\": [string]}",
    );
    prompt
}

fn corrective_prompt(prompt: &str, error: &str) -> String {
    format!(
        "{}\n\nYour previous reply could not be parsed ({}). \
         Reply with the JSON object and nothing else.",
        prompt, error
    )
}

/// Parses a reply, tolerating a surrounding markdown code fence.
fn parse_reply(reply: &str) -> Result<Enhancement, serde_json::Error> {
    let trimmed = reply.trim();
    let body = if trimmed.starts_with("```") {
        let lines: Vec<&str> = trimmed.lines().collect();
        let end = if lines.len() > 1 && lines[lines.len() - 1].trim() == "```" {
            lines.len() - 1
        } else {
            lines.len()
        };
        lines[1.min(end)..end].join("\n")
    } else {
        trimmed.to_string()
    };
    serde_json::from_str(&body)
}

#[async_trait]
impl Analyzer for ModelEnhancer {
    fn identifier(&self) -> &str {
        ENHANCER_ANALYZER
    }

    fn can_handle(&self, context: &PipelineContext) -> bool {
        context.previous_records().next().is_some()
    }

    async fn run(&self, context: &PipelineContext) -> Result<AnalyzerResult, AnalyzerError> {
        let options: EnhancerOptions = context
            .analyzer_options()
            .map_err(|e| AnalyzerError::InvalidConfig(e.to_string()))?;
        let mut result = AnalyzerResult::new(ENHANCER_ANALYZER);

        for existing in distinct_records(context) {
            let prompt = build_prompt(existing, &context.framework);
            let enhancement = self.ask(&prompt, &options).await?;
            debug!(component = %existing.name, "Model enhancement received");

            let mut record = AnalysisRecord::new(existing.name.clone());
            record.description = enhancement.description.trim().to_string();
            record.tags.extend(
                enhancement
                    .tags
                    .into_iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
            );
            record.accessibility_notes.extend(
                enhancement
                    .accessibility
                    .iter()
                    .map(|note| note.trim())
                    .filter(|note| !note.is_empty())
                    .map(|note| AccessibilityDescriptor::new(AccessibilityKind::Other, note)),
            );
            result.push_record(record);
        }

        result.insert_metadata("enhanced", json!(result.records.len()));
        Ok(result)
    }
}
