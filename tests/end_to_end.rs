//! End-to-end harvest of a small component tree: discovery, the default
//! pipeline, concurrent execution and merging.

use component_harvester::{
    default_pipeline, discover, HarvestConfig, HarvestExecutor, MergeStrategy, RunReport,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;

const BUTTON_STORIES: &str = r#"import type { Meta } from '@storybook/react';
import { Button } from './Button';

const meta: Meta<typeof Button> = {
  title: 'Forms/Button',
  component: Button,
  tags: ['autodocs'],
  parameters: { docs: { description: { component: 'Triggers an action.' } } },
};
export default meta;

export const Primary = { args: { label: 'Save' } };
"#;

const BUTTON_SOURCE: &str = r#"import clsx from 'clsx';
import { Icon } from './Icon';

export interface ButtonProps {
  /** Visible text */
  label: string;
  variant?: 'primary' | 'secondary';
}

/**
 * Primary action trigger used across the forms and dialogs of the product.
 */
export function Button({ label, variant = 'primary' }: ButtonProps) {
  return <button className={clsx(variant)} onKeyDown={handle}><Icon />{label}</button>;
}
// @tags interactive
"#;

const CARD_STORIES: &str = r#"export default { title: 'Layout/Card' };
export const Basic = {};
"#;

const CARD_SIDECAR: &str =
    r#"{"name": "Card", "description": "Surface container for grouped content.", "tags": ["curated"]}"#;

fn write_tree(root: &Path) {
    let dir = root.join("src");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("Button.stories.tsx"), BUTTON_STORIES).unwrap();
    fs::write(dir.join("Button.tsx"), BUTTON_SOURCE).unwrap();
    fs::write(dir.join("Card.stories.tsx"), CARD_STORIES).unwrap();
    fs::write(dir.join("Card.stories.tsx.meta.json"), CARD_SIDECAR).unwrap();
}

async fn harvest_tree(root: &Path, config: &HarvestConfig) -> Vec<RunReport> {
    let contexts = discover(root, config).unwrap();
    let executor = HarvestExecutor::new(config.concurrency);
    let outcomes = executor
        .run_all(
            Arc::new(default_pipeline().unwrap()),
            Arc::new(config.chain()),
            contexts,
        )
        .await;

    outcomes.into_iter().map(|o| o.report.unwrap()).collect()
}

#[tokio::test]
async fn test_harvest_merges_all_sources() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());

    let reports = harvest_tree(dir.path(), &HarvestConfig::default()).await;
    assert_eq!(reports.len(), 2);

    let button = reports[0].entity("button").unwrap();
    assert_eq!(button.contributors, vec!["story", "annotations", "source"]);
    assert_eq!(button.record.category.as_deref(), Some("Forms"));
    assert!(button.record.description.starts_with("Primary action trigger"));
    assert!(button.record.tags.contains("autodocs"));
    assert!(button.record.tags.contains("interactive"));
    assert!(button.record.dependencies.contains("clsx"));
    assert!(button.record.related_components.contains("Icon"));
    assert_eq!(button.record.examples.len(), 1);

    let label = button.record.props.iter().find(|p| p.name == "label").unwrap();
    assert!(label.required);
    let variant = button.record.props.iter().find(|p| p.name == "variant").unwrap();
    assert!(!variant.required);
    assert!(variant.default_value.is_some());

    let card = reports[1].entity("Card").unwrap();
    assert_eq!(card.contributors, vec!["story", "overrides"]);
    assert_eq!(card.record.category.as_deref(), Some("Layout"));
    assert_eq!(card.record.description, "Surface container for grouped content.");
    assert!(reports.iter().all(|r| !r.has_errors()));

    let json: serde_json::Value = serde_json::from_str(&reports[0].to_json().unwrap()).unwrap();
    assert_eq!(json["components"][0]["name"], "Button");
}

#[tokio::test]
async fn test_override_strategy_makes_sidecar_authoritative() {
    let dir = tempfile::tempdir().unwrap();
    write_tree(dir.path());
    let config = HarvestConfig {
        strategy: MergeStrategy::Override,
        ..Default::default()
    };

    let reports = harvest_tree(dir.path(), &config).await;

    let card = reports[1].entity("Card").unwrap();
    assert_eq!(card.record.category, None);
    assert!(card.record.tags.contains("curated"));
    let replaced = card.previous.as_ref().unwrap();
    assert_eq!(replaced.record.category.as_deref(), Some("Layout"));
}
