//! Structured findings pulled out of free-form mentor answers.
//!
//! Extraction is best effort and pure: text without markers or code blocks
//! yields empty lists, never an error.

use std::sync::OnceLock;

use regex::Regex;

use crate::markdown::{self, Segment};
use crate::models::{Category, CodeSnippet, Severity, StructuredFinding};

fn marker_pattern() -> &'static Regex {
    static MARKER: OnceLock<Regex> = OnceLock::new();
    MARKER.get_or_init(|| {
        Regex::new(
            r"(?im)^[ \t]*(?:[-*][ \t]+)?(?:\[(critical|warning|info)\]|\*\*(critical|warning|info)\*\*)[ \t]*:?[ \t]*(\S.*)$",
        )
        .expect("marker pattern is valid")
    })
}

fn line_pattern() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| Regex::new(r"(?i)\blines?[ \t]+(\d+)").expect("line pattern is valid"))
}

const SECURITY_KEYWORDS: &[&str] = &[
    "security", "vulnerab", "injection", "xss", "csrf", "password", "secret", "credential",
    "token", "authenticat", "authoriz", "sanitiz", "encrypt", "privilege",
];

const SCALABILITY_KEYWORDS: &[&str] = &[
    "performance", "scalab", "slow", "memory", "n+1", "o(n", "complexity", "latency",
    "bottleneck", "allocation", "cache", "concurren",
];

const STYLE_KEYWORDS: &[&str] = &[
    "style", "naming", "readab", "format", "convention", "indent", "lint", "docstring",
    "comment",
];

/// Words that mark a fenced block as the code being replaced.
const ORIGINAL_LABELS: &[&str] = &["before", "original", "current", "existing"];

const REPLACEMENT_LABELS: &[&str] = &["after", "fixed", "suggested", "improved", "corrected", "updated"];

fn categorize(description: &str) -> Category {
    let lowered = description.to_lowercase();
    let mentions = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

    if mentions(SECURITY_KEYWORDS) {
        Category::Security
    } else if mentions(SCALABILITY_KEYWORDS) {
        Category::Scalability
    } else if mentions(STYLE_KEYWORDS) {
        Category::Style
    } else {
        Category::Logic
    }
}

fn severity(tag: &str) -> Severity {
    match tag.to_ascii_lowercase().as_str() {
        "critical" => Severity::Critical,
        "warning" => Severity::Warning,
        _ => Severity::Info,
    }
}

/// Severity-marked lines outside code blocks, in order of appearance.
pub fn extract_findings(text: &str) -> Vec<StructuredFinding> {
    markdown::segments(text)
        .into_iter()
        .filter_map(|segment| match segment {
            Segment::Prose(prose) => Some(prose),
            Segment::Code(_) => None,
        })
        .flat_map(|prose| marker_pattern().captures_iter(prose))
        .filter_map(|caps| {
            let tag = caps.get(1).or_else(|| caps.get(2))?.as_str();
            let description = caps.get(3)?.as_str().trim().to_string();
            let line = line_pattern()
                .captures(&description)
                .and_then(|l| l.get(1)?.as_str().parse().ok());

            Some(StructuredFinding {
                severity: severity(tag),
                category: categorize(&description),
                description,
                line,
            })
        })
        .collect()
}

fn normalized_label(line: &str) -> String {
    line.trim()
        .trim_matches(|c: char| c == '*' || c == '#' || c == '_' || c.is_whitespace())
        .trim_end_matches(':')
        .trim_end_matches('*')
        .to_lowercase()
}

fn has_label(line: &str, labels: &[&str]) -> bool {
    let label = normalized_label(line);
    label.len() <= 32 && labels.iter().any(|l| label.starts_with(l))
}

fn is_label(line: &str) -> bool {
    has_label(line, ORIGINAL_LABELS) || has_label(line, REPLACEMENT_LABELS)
}

fn last_line(prose: &str) -> Option<&str> {
    prose.lines().map(str::trim).filter(|l| !l.is_empty()).last()
}

/// Fenced code blocks as suggested changes.
///
/// A block introduced by a "Before:" style label is paired with the block
/// after it as original and replacement. Any other block is a standalone
/// suggestion. The explanation is the closest line of prose since the
/// previous block that is not itself a label, or empty when there is none.
pub fn extract_code_snippets(text: &str, file_path: Option<&str>) -> Vec<CodeSnippet> {
    let blocks = markdown::code_blocks(text);
    let file_path = file_path.unwrap_or_default().to_string();
    let mut snippets = Vec::new();
    let mut cursor = 0;
    let mut index = 0;

    while index < blocks.len() {
        let block = &blocks[index];
        let preceding = &text[cursor..block.start];
        let label = last_line(preceding);

        let explanation = preceding
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !is_label(l))
            .last()
            .unwrap_or_default()
            .to_string();

        let opens_pair = label.map_or(false, |l| has_label(l, ORIGINAL_LABELS));
        match blocks.get(index + 1) {
            Some(next) if opens_pair => {
                snippets.push(CodeSnippet {
                    file_path: file_path.clone(),
                    original_code: block.body.to_string(),
                    suggested_code: next.body.to_string(),
                    explanation,
                });
                cursor = next.end;
                index += 2;
            }
            _ => {
                snippets.push(CodeSnippet {
                    file_path: file_path.clone(),
                    original_code: String::new(),
                    suggested_code: block.body.to_string(),
                    explanation,
                });
                cursor = block.end;
                index += 1;
            }
        }
    }

    snippets
}
