//! Shallow text helpers shared by the heuristic analyzers.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use crate::traits::AnalyzerError;

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"['"`]([^'"`]+)['"`]"#).unwrap());

/// 1-based line number of a byte offset.
pub fn line_of(text: &str, offset: usize) -> u32 {
    text[..offset.min(text.len())].matches('\n').count() as u32 + 1
}

/// "PrimaryLarge" -> "Primary Large", "withIcon" -> "With Icon".
pub fn export_to_title(name: &str) -> String {
    let mut title = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for ch in name.chars() {
        if ch == '_' {
            if !title.ends_with(' ') && !title.is_empty() {
                title.push(' ');
            }
            prev = Some(ch);
            continue;
        }
        if let Some(p) = prev {
            if ch.is_uppercase() && (p.is_lowercase() || p.is_ascii_digit()) {
                title.push(' ');
            }
        }
        if title.is_empty() {
            title.extend(ch.to_uppercase());
        } else {
            title.push(ch);
        }
        prev = Some(ch);
    }
    title.trim().to_string()
}

/// Quoted string literals inside a list body such as `'a', "b"`.
pub fn quoted_items(list: &str) -> Vec<String> {
    QUOTED
        .captures_iter(list)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Splits `a, b , c` into trimmed, non-empty parts.
pub fn comma_items(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Joins the body of a `/** ... */` block, dropping leading `*` markers
/// and `@tag` lines.
pub fn doc_comment_text(body: &str) -> String {
    body.lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .take_while(|line| !line.starts_with('@'))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of a comment line (`//`, `/*`, `*`, `<!--`), or `None` for code.
pub fn comment_text(line: &str) -> Option<&str> {
    let trimmed = line.trim_start();
    for marker in ["///", "//", "/**", "/*", "<!--", "*"] {
        if let Some(rest) = trimmed.strip_prefix(marker) {
            let rest = rest.trim();
            let rest = rest.strip_suffix("*/").unwrap_or(rest);
            let rest = rest.strip_suffix("-->").unwrap_or(rest);
            return Some(rest.trim());
        }
    }
    None
}

/// File name up to the first `.stories` marker, or the plain stem.
pub fn component_stem(path: &Path) -> Option<String> {
    let file_name = path.file_name()?.to_str()?;
    let stem = match file_name.find(".stories") {
        Some(idx) => &file_name[..idx],
        None => path.file_stem()?.to_str()?,
    };
    (!stem.is_empty()).then(|| stem.to_string())
}

pub async fn read_source(path: &Path) -> Result<String, AnalyzerError> {
    Ok(tokio::fs::read_to_string(path).await?)
}
