//! Title and year extraction from release-style filenames.
//!
//! `Blade.Runner.2049.2017.1080p.mkv` parses to `("Blade Runner 2049", Some(2017))`:
//! punctuation is normalised to spaces and the *last* four-digit year that
//! follows some title text wins.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Title and optional release year parsed from a filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedTitle {
    pub title: String,
    pub year: Option<u16>,
}

fn year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("valid regex"))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Replace separator punctuation with spaces and collapse runs of whitespace.
pub fn normalize(stem: &str) -> String {
    let replaced: String = stem
        .chars()
        .map(|c| match c {
            '.' | '_' | '-' | '(' | ')' | '[' | ']' | '{' | '}' | '+' | ',' => ' ',
            other => other,
        })
        .collect();
    whitespace_regex()
        .replace_all(replaced.trim(), " ")
        .into_owned()
}

/// Parse a filename stem (no extension) into title and year.
pub fn parse_title(stem: &str) -> ParsedTitle {
    let normalized = normalize(stem);

    let last_year = year_regex()
        .find_iter(&normalized)
        .filter(|m| !normalized[..m.start()].trim().is_empty())
        .last();

    match last_year {
        Some(m) => {
            let title = normalized[..m.start()].trim().to_string();
            let year = m.as_str().parse().ok();
            ParsedTitle { title, year }
        }
        None => ParsedTitle {
            title: if normalized.is_empty() {
                stem.to_string()
            } else {
                normalized
            },
            year: None,
        },
    }
}

/// Parse the file stem of `path`.
pub fn parse_path(path: &Path) -> ParsedTitle {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_title(&stem)
}
