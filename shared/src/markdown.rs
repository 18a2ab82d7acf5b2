//! Splitting model output around fenced code blocks.

use std::sync::OnceLock;

use regex::Regex;

fn fence_pattern() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    FENCE.get_or_init(|| {
        Regex::new(r"(?ms)^[ \t]*```[ \t]*([^\n`]*)\n(.*?)^[ \t]*```[ \t]*$")
            .expect("fence pattern is valid")
    })
}

/// A fenced code block, borrowed from the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock<'a> {
    /// The whole block including both fences.
    pub raw: &'a str,
    pub language: Option<&'a str>,
    /// Code between the fences, without the final newline.
    pub body: &'a str,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment<'a> {
    Prose(&'a str),
    Code(CodeBlock<'a>),
}

/// All complete fenced code blocks in `text`, in order. Fences only count
/// at the start of a line; an unterminated fence is not a code block.
pub fn code_blocks(text: &str) -> Vec<CodeBlock<'_>> {
    fence_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let language = caps
                .get(1)
                .map(|m| m.as_str().trim())
                .filter(|lang| !lang.is_empty());
            let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            Some(CodeBlock {
                raw: whole.as_str(),
                language,
                body: body.strip_suffix('\n').unwrap_or(body),
                start: whole.start(),
                end: whole.end(),
            })
        })
        .collect()
}

/// Split `text` into alternating prose and code segments. Concatenating the
/// segments' source slices reproduces `text`.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let mut result = Vec::new();
    let mut cursor = 0;

    for block in code_blocks(text) {
        if block.start > cursor {
            result.push(Segment::Prose(&text[cursor..block.start]));
        }
        cursor = block.end;
        result.push(Segment::Code(block));
    }
    if cursor < text.len() {
        result.push(Segment::Prose(&text[cursor..]));
    }
    result
}
