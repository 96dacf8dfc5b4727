//! Source-tree discovery: finds story files and pairs them with components.

use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::config::HarvestConfig;
use crate::harvest::context::PipelineContext;

/// Companion extensions, in lookup order.
const COMPANION_EXTENSIONS: &[&str] = &["tsx", "ts", "jsx", "js", "vue", "svelte"];

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Scan root does not exist: {0}")]
    MissingRoot(PathBuf),
    #[error("Failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// One context per story file under `root`, sorted by path.
pub fn discover(root: &Path, config: &HarvestConfig) -> Result<Vec<PipelineContext>, ScanError> {
    if !root.is_dir() {
        return Err(ScanError::MissingRoot(root.to_path_buf()));
    }

    let mut subjects = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry, &config.exclude));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                // An unreadable root is fatal, anything below it is skipped
                if path == root {
                    return Err(ScanError::Walk { path, source: e });
                }
                warn!(path = %path.display(), error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_file() && is_subject(entry.path(), &config.include) {
            subjects.push(entry.into_path());
        }
    }
    subjects.sort();

    let contexts = subjects
        .into_iter()
        .map(|subject| {
            let mut context = PipelineContext::new(&subject, config.framework.clone());
            if let Some(companion) = find_companion(&subject) {
                debug!(subject = %subject.display(), companion = %companion.display(), "Paired");
                context = context.with_companion(companion);
            }
            if let Some(library) = &config.design_library {
                context = context.with_design_library(library.clone());
            }
            if let Some(base) = &config.base_import_path {
                context = context.with_base_import_path(base.clone());
            }
            context
        })
        .collect();

    Ok(contexts)
}

fn is_excluded(entry: &DirEntry, exclude: &[String]) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| exclude.iter().any(|e| e == name))
            .unwrap_or(false)
}

fn is_subject(path: &Path, include: &[String]) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| include.iter().any(|marker| name.ends_with(marker.as_str())))
        .unwrap_or(false)
}

/// `Button.stories.tsx` -> first existing `Button.<ext>` next to it.
fn find_companion(subject: &Path) -> Option<PathBuf> {
    let name = subject.file_name()?.to_str()?;
    let stem = &name[..name.find(".stories")?];
    let dir = subject.parent()?;
    COMPANION_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn test_discovers_and_pairs_subjects() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "src/Button/Button.stories.tsx");
        touch(root, "src/Button/Button.tsx");
        touch(root, "src/Card/Card.stories.js");
        touch(root, "src/Card/Card.vue");
        touch(root, "src/Alert.stories.ts");
        touch(root, "node_modules/lib/Thing.stories.tsx");
        touch(root, "src/Button/Button.test.tsx");

        let config = HarvestConfig {
            design_library: Some("acme".to_string()),
            ..Default::default()
        };
        let contexts = discover(root, &config).unwrap();

        let subjects: Vec<_> = contexts
            .iter()
            .map(|c| c.subject_path.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            subjects,
            vec![
                PathBuf::from("src/Alert.stories.ts"),
                PathBuf::from("src/Button/Button.stories.tsx"),
                PathBuf::from("src/Card/Card.stories.js"),
            ]
        );

        assert!(contexts[0].companion_path.is_none());
        assert_eq!(
            contexts[1].companion_path.as_deref(),
            Some(root.join("src/Button/Button.tsx").as_path())
        );
        assert_eq!(
            contexts[2].companion_path.as_deref(),
            Some(root.join("src/Card/Card.vue").as_path())
        );
        assert!(contexts.iter().all(|c| c.design_library.as_deref() == Some("acme")));
    }

    #[test]
    fn test_missing_root() {
        let err = discover(Path::new("/nonexistent/ui"), &HarvestConfig::default()).unwrap_err();
        assert!(matches!(err, ScanError::MissingRoot(_)));
    }
}
