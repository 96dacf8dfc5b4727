//! Reconciliation of analyzer output into one entity per component.
//!
//! Records are folded in pipeline order, then record order within each
//! result, which keeps every strategy's tie-breaks reproducible. Conflicts
//! are always resolved by policy; merging never fails.

use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::harvest::context::MergeStrategy;
use crate::model::{
    AnalysisRecord, AnalyzerResult, AppendedContribution, Diagnostic, MergedEntity,
    PropDescriptor, SlotDescriptor,
};

/// `custom_data` key holding every analyzer that touched an entity.
pub const CONTRIBUTORS_KEY: &str = "contributors";

/// `custom_data` key holding the per-analyzer contribution snapshots.
pub const CONTRIBUTIONS_KEY: &str = "contributions";

/// Entities in first-seen order plus the conditions met while folding.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    pub entities: Vec<MergedEntity>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Folds [`AnalyzerResult`]s into [`MergedEntity`]s under one strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine {
    strategy: MergeStrategy,
}

impl MergeEngine {
    pub fn new(strategy: MergeStrategy) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> MergeStrategy {
        self.strategy
    }

    pub fn merge(&self, results: &[AnalyzerResult]) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();
        let mut index: HashMap<String, usize> = HashMap::new();

        for result in results {
            for record in &result.records {
                let key = record.entity_key();
                if key.is_empty() {
                    warn!(analyzer = %result.analyzer, "Dropping record without a name");
                    outcome.diagnostics.push(
                        Diagnostic::warning("Dropped record with an empty name")
                            .with_source(result.analyzer.clone()),
                    );
                    continue;
                }

                match index.get(&key).copied() {
                    None => {
                        let mut entity = MergedEntity::seed(&result.analyzer, record.clone());
                        if self.strategy == MergeStrategy::Merge {
                            annotate_contribution(&mut entity, &result.analyzer, record);
                        }
                        index.insert(key, outcome.entities.len());
                        outcome.entities.push(entity);
                    }
                    Some(slot) => {
                        debug!(
                            analyzer = %result.analyzer,
                            entity = %key,
                            strategy = %self.strategy,
                            "Reconciling record"
                        );
                        let entity = &mut outcome.entities[slot];
                        match self.strategy {
                            MergeStrategy::Append => append(entity, &result.analyzer, record),
                            MergeStrategy::Override => {
                                override_entity(entity, &result.analyzer, record)
                            }
                            MergeStrategy::Merge => merge_into(entity, &result.analyzer, record),
                        }
                    }
                }
            }
        }

        outcome
    }
}

/// Convenience wrapper around [`MergeEngine::merge`].
pub fn merge(results: &[AnalyzerResult], strategy: MergeStrategy) -> MergeOutcome {
    MergeEngine::new(strategy).merge(results)
}

// ============================================================================
// Strategies
// ============================================================================

fn append(entity: &mut MergedEntity, analyzer: &str, record: &AnalysisRecord) {
    entity.appended.push(AppendedContribution {
        analyzer: analyzer.to_string(),
        record: record.clone(),
    });
    entity.add_contributor(analyzer);
}

fn override_entity(entity: &mut MergedEntity, analyzer: &str, record: &AnalysisRecord) {
    let mut contributors = entity.contributors.clone();
    if !contributors.iter().any(|c| c == analyzer) {
        contributors.push(analyzer.to_string());
    }
    let replacement = MergedEntity {
        record: record.clone(),
        contributors,
        appended: Vec::new(),
        previous: None,
    };
    let previous = std::mem::replace(entity, replacement);
    entity.previous = Some(Box::new(previous));
}

fn merge_into(entity: &mut MergedEntity, analyzer: &str, incoming: &AnalysisRecord) {
    let existing = &mut entity.record;

    if !incoming.name.trim().is_empty() {
        existing.name = incoming.name.clone();
    }

    if prefers_description(&existing.description, &incoming.description) {
        existing.description = incoming.description.clone();
    }

    if let Some(category) = non_empty(&incoming.category) {
        existing.category = Some(category);
    }
    if let Some(import_path) = non_empty(&incoming.import_path) {
        existing.import_path = Some(import_path);
    }

    existing.tags.extend(incoming.tags.iter().cloned());
    existing
        .dependencies
        .extend(incoming.dependencies.iter().cloned());
    existing
        .related_components
        .extend(incoming.related_components.iter().cloned());
    existing
        .accessibility_notes
        .extend(incoming.accessibility_notes.iter().cloned());

    merge_props(&mut existing.props, &incoming.props);
    merge_slots(&mut existing.slots, &incoming.slots);

    for example in &incoming.examples {
        if !existing.examples.iter().any(|e| e.title == example.title) {
            existing.examples.push(example.clone());
        }
    }

    for (key, value) in &incoming.custom_data {
        existing.custom_data.insert(key.clone(), value.clone());
    }

    entity.add_contributor(analyzer);
    annotate_contribution(entity, analyzer, incoming);
}

/// A new description wins only if it is non-empty and either nothing is
/// known yet or it is more than 50% longer than the current one.
fn prefers_description(existing: &str, incoming: &str) -> bool {
    if incoming.is_empty() || incoming == existing {
        return false;
    }
    if existing.is_empty() {
        return true;
    }
    let (old_len, new_len) = (existing.chars().count(), incoming.chars().count());
    new_len * 2 > old_len * 3
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
}

fn merge_props(existing: &mut Vec<PropDescriptor>, incoming: &[PropDescriptor]) {
    for prop in incoming {
        match existing.iter_mut().find(|p| p.name == prop.name) {
            Some(current) => {
                if !prop.prop_type.is_empty() {
                    current.prop_type = prop.prop_type.clone();
                }
                current.required = prop.required;
                if let Some(description) = non_empty(&prop.description) {
                    current.description = Some(description);
                }
                if prop.default_value.is_some() {
                    current.default_value = prop.default_value.clone();
                }
            }
            None => existing.push(prop.clone()),
        }
    }
}

fn merge_slots(existing: &mut Vec<SlotDescriptor>, incoming: &[SlotDescriptor]) {
    for slot in incoming {
        match existing.iter_mut().find(|s| s.name == slot.name) {
            Some(current) => {
                if !slot.description.is_empty() {
                    current.description = slot.description.clone();
                }
                current.required = slot.required;
            }
            None => existing.push(slot.clone()),
        }
    }
}

/// Refreshes the normalized contributor list and records what `analyzer`
/// reported for this entity.
fn annotate_contribution(entity: &mut MergedEntity, analyzer: &str, record: &AnalysisRecord) {
    let snapshot = json!({
        "description": record.description,
        "tags": record.tags,
        "props": record.props,
        "accessibility": record.accessibility_notes,
    });

    let custom = &mut entity.record.custom_data;
    let mut contributions = match custom.remove(CONTRIBUTIONS_KEY) {
        Some(Value::Object(map)) => map,
        _ => serde_json::Map::new(),
    };
    contributions.insert(analyzer.to_string(), snapshot);
    custom.insert(CONTRIBUTIONS_KEY.to_string(), Value::Object(contributions));
    custom.insert(CONTRIBUTORS_KEY.to_string(), json!(entity.contributors));
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccessibilityDescriptor, AccessibilityKind, ExampleDescriptor};

    fn record(name: &str, tags: &[&str]) -> AnalysisRecord {
        let mut r = AnalysisRecord::new(name);
        r.tags = tags.iter().map(|t| t.to_string()).collect();
        r
    }

    fn result(analyzer: &str, records: Vec<AnalysisRecord>) -> AnalyzerResult {
        AnalyzerResult::new(analyzer).with_records(records)
    }

    fn tags(entity: &MergedEntity) -> Vec<&str> {
        entity.record.tags.iter().map(String::as_str).collect()
    }

    fn example(title: &str, code: &str) -> ExampleDescriptor {
        ExampleDescriptor {
            title: title.to_string(),
            code: code.to_string(),
            description: None,
        }
    }

    #[test]
    fn test_append_keeps_first_record() {
        let results = vec![
            result("story", vec![record("Btn", &["a"])]),
            result("source", vec![record("Btn", &["b"])]),
        ];

        let outcome = merge(&results, MergeStrategy::Append);

        assert_eq!(outcome.entities.len(), 1);
        let entity = &outcome.entities[0];
        assert_eq!(tags(entity), vec!["a"]);
        assert_eq!(entity.contributors, vec!["story", "source"]);
        assert_eq!(entity.appended.len(), 1);
        assert_eq!(entity.appended[0].analyzer, "source");
        assert!(entity.appended[0].record.tags.contains("b"));
        assert!(entity.previous.is_none());
    }

    #[test]
    fn test_override_replaces_and_keeps_previous() {
        let results = vec![
            result("story", vec![record("Btn", &["a"])]),
            result("overrides", vec![record("Btn", &["b"])]),
        ];

        let outcome = merge(&results, MergeStrategy::Override);

        let entity = &outcome.entities[0];
        assert_eq!(tags(entity), vec!["b"]);
        assert_eq!(entity.contributors, vec!["story", "overrides"]);
        let previous = entity.previous.as_ref().expect("previous snapshot retained");
        assert_eq!(tags(previous), vec!["a"]);
        assert_eq!(previous.contributors, vec!["story"]);
    }

    #[test]
    fn test_merge_prefers_much_longer_description_and_unions_tags() {
        let mut first = record("Btn", &["a"]);
        first.description = "Btn".to_string();
        let mut second = record("Btn", &["b"]);
        second.description = "A fully accessible button for triggering primary actions".to_string();

        let outcome = merge(
            &[result("story", vec![first]), result("source", vec![second])],
            MergeStrategy::Merge,
        );

        let entity = &outcome.entities[0];
        assert_eq!(
            entity.record.description,
            "A fully accessible button for triggering primary actions"
        );
        assert_eq!(tags(entity), vec!["a", "b"]);
    }

    #[test]
    fn test_merge_description_thresholds() {
        assert!(prefers_description("", "Anything"));
        assert!(!prefers_description("Existing", ""));
        assert!(!prefers_description("Same text", "Same text"));
        // 10 -> 15 chars is exactly 50% longer: not enough
        assert!(!prefers_description("0123456789", "012345678901234"));
        assert!(prefers_description("0123456789", "0123456789012345"));
        // Shorter descriptions never win over an existing one
        assert!(!prefers_description("A long existing description", "Short"));
    }

    #[test]
    fn test_merge_last_non_empty_category_and_import_path() {
        let mut first = record("Card", &[]);
        first.category = Some("Layout".to_string());
        first.import_path = Some("@ui/card".to_string());
        let mut second = record("Card", &[]);
        second.category = Some("Surfaces".to_string());
        second.import_path = Some("  ".to_string());
        let third = record("Card", &[]);

        let outcome = merge(
            &[
                result("a", vec![first]),
                result("b", vec![second]),
                result("c", vec![third]),
            ],
            MergeStrategy::Merge,
        );

        let merged = &outcome.entities[0].record;
        assert_eq!(merged.category.as_deref(), Some("Surfaces"));
        assert_eq!(merged.import_path.as_deref(), Some("@ui/card"));
    }

    #[test]
    fn test_merge_examples_first_seen_wins() {
        let mut first = record("Btn", &[]);
        first.examples = vec![example("Basic", "<Btn />")];
        let mut second = record("Btn", &[]);
        second.examples = vec![
            example("Basic", "<Btn variant=\"other\" />"),
            example("Disabled", "<Btn disabled />"),
        ];

        let outcome = merge(
            &[result("story", vec![first]), result("source", vec![second])],
            MergeStrategy::Merge,
        );

        let examples = &outcome.entities[0].record.examples;
        let titles: Vec<_> = examples.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["Basic", "Disabled"]);
        assert_eq!(examples[0].code, "<Btn />");
    }

    #[test]
    fn test_merge_props_field_by_field() {
        let mut first = record("Btn", &[]);
        first.props = vec![PropDescriptor {
            name: "variant".to_string(),
            prop_type: "string".to_string(),
            required: false,
            description: Some("Visual style".to_string()),
            default_value: None,
        }];
        let mut second = record("Btn", &[]);
        second.props = vec![
            PropDescriptor {
                name: "variant".to_string(),
                prop_type: "'primary' | 'secondary'".to_string(),
                required: true,
                description: Some(String::new()),
                default_value: Some("'primary'".to_string()),
            },
            PropDescriptor {
                name: "onClick".to_string(),
                prop_type: "() => void".to_string(),
                ..Default::default()
            },
        ];

        let outcome = merge(
            &[result("story", vec![first]), result("source", vec![second])],
            MergeStrategy::Merge,
        );

        let props = &outcome.entities[0].record.props;
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].prop_type, "'primary' | 'secondary'");
        assert!(props[0].required);
        assert_eq!(props[0].description.as_deref(), Some("Visual style"));
        assert_eq!(props[0].default_value.as_deref(), Some("'primary'"));
        assert_eq!(props[1].name, "onClick");
    }

    #[test]
    fn test_merge_slots_keep_description_when_new_is_empty() {
        let mut first = record("Dialog", &[]);
        first.slots = vec![SlotDescriptor {
            name: "footer".to_string(),
            description: "Action area".to_string(),
            required: false,
        }];
        let mut second = record("Dialog", &[]);
        second.slots = vec![
            SlotDescriptor {
                name: "footer".to_string(),
                description: String::new(),
                required: true,
            },
            SlotDescriptor {
                name: "default".to_string(),
                description: "Body".to_string(),
                required: false,
            },
        ];

        let outcome = merge(
            &[result("a", vec![first]), result("b", vec![second])],
            MergeStrategy::Merge,
        );

        let slots = &outcome.entities[0].record.slots;
        assert_eq!(slots[0].description, "Action area");
        assert!(slots[0].required);
        assert_eq!(slots[1].name, "default");
    }

    #[test]
    fn test_merge_accessibility_union_on_kind_and_value() {
        let mut first = record("Btn", &[]);
        first.accessibility_notes.insert(AccessibilityDescriptor::new(
            AccessibilityKind::SemanticRole,
            "button",
        ));
        let mut second = record("Btn", &[]);
        second.accessibility_notes.insert(AccessibilityDescriptor::new(
            AccessibilityKind::SemanticRole,
            "button",
        ));
        second.accessibility_notes.insert(AccessibilityDescriptor::new(
            AccessibilityKind::KeyboardSupport,
            "Enter",
        ));

        let outcome = merge(
            &[result("a", vec![first]), result("b", vec![second])],
            MergeStrategy::Merge,
        );

        assert_eq!(outcome.entities[0].record.accessibility_notes.len(), 2);
    }

    #[test]
    fn test_merge_custom_data_and_contributions() {
        let mut first = record("Btn", &["a"]);
        first
            .custom_data
            .insert("storyCount".to_string(), json!(2));
        first.custom_data.insert("origin".to_string(), json!("story"));
        let mut second = record("Btn", &["b"]);
        second
            .custom_data
            .insert("origin".to_string(), json!("source"));

        let outcome = merge(
            &[result("story", vec![first]), result("source", vec![second])],
            MergeStrategy::Merge,
        );

        let custom = &outcome.entities[0].record.custom_data;
        assert_eq!(custom["storyCount"], json!(2));
        assert_eq!(custom["origin"], json!("source"));
        assert_eq!(custom[CONTRIBUTORS_KEY], json!(["story", "source"]));
        assert_eq!(custom[CONTRIBUTIONS_KEY]["story"]["tags"], json!(["a"]));
        assert_eq!(custom[CONTRIBUTIONS_KEY]["source"]["tags"], json!(["b"]));
    }

    #[test]
    fn test_key_normalization_folds_variants() {
        let results = vec![
            result("a", vec![record("Button", &[])]),
            result("b", vec![record("button", &[])]),
            result("c", vec![record(" Button ", &[])]),
        ];

        for strategy in [MergeStrategy::Append, MergeStrategy::Merge, MergeStrategy::Override] {
            let outcome = merge(&results, strategy);
            assert_eq!(outcome.entities.len(), 1, "strategy {strategy}");
            assert_eq!(outcome.entities[0].contributors, vec!["a", "b", "c"]);
        }
    }

    #[test]
    fn test_empty_names_dropped_with_diagnostic() {
        let results = vec![result(
            "story",
            vec![record("  ", &[]), record("Btn", &[])],
        )];

        let outcome = merge(&results, MergeStrategy::Merge);

        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].source.as_deref(), Some("story"));
    }

    #[test]
    fn test_entities_keep_first_seen_order() {
        let results = vec![
            result("a", vec![record("Zeta", &[]), record("Alpha", &[])]),
            result("b", vec![record("Mid", &[]), record("zeta", &[])]),
        ];

        let outcome = merge(&results, MergeStrategy::Override);

        let names: Vec<_> = outcome
            .entities
            .iter()
            .map(|e| e.record.name.as_str())
            .collect();
        assert_eq!(names, vec!["zeta", "Alpha", "Mid"]);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let mut first = record("Btn", &["a"]);
        first.description = "Btn".to_string();
        first.examples = vec![example("Basic", "<Btn />")];
        let mut second = record("btn", &["b", "c"]);
        second.description = "A button that does a great many things".to_string();
        second.custom_data.insert("k".to_string(), json!({"x": [1, 2]}));
        let results = vec![
            result("story", vec![first]),
            result("source", vec![second, record("Card", &["d"])]),
        ];

        for strategy in [MergeStrategy::Append, MergeStrategy::Merge, MergeStrategy::Override] {
            let once = serde_json::to_vec(&merge(&results, strategy).entities).unwrap();
            let twice = serde_json::to_vec(&merge(&results, strategy).entities).unwrap();
            assert_eq!(once, twice);
        }
    }
}
