//! Paragraph-aligned splitting of oversized text.

/// Separator between paragraphs, and between chunks when they are rejoined.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Split `text` into chunks of whole paragraphs.
///
/// Paragraphs are accumulated greedily while the candidate chunk stays within
/// `max_bytes`. A paragraph is never split, so a single paragraph larger than
/// `max_bytes` becomes a chunk of its own. Joining the result with
/// [`PARAGRAPH_SEPARATOR`] gives back `text` exactly.
pub fn split_paragraphs(text: &str, max_bytes: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Option<String> = None;

    for paragraph in text.split(PARAGRAPH_SEPARATOR) {
        current = Some(match current.take() {
            None => paragraph.to_string(),
            Some(mut chunk) => {
                let candidate_len = chunk.len() + PARAGRAPH_SEPARATOR.len() + paragraph.len();
                if candidate_len <= max_bytes {
                    chunk.push_str(PARAGRAPH_SEPARATOR);
                    chunk.push_str(paragraph);
                    chunk
                } else {
                    chunks.push(chunk);
                    paragraph.to_string()
                }
            }
        });
    }

    if let Some(chunk) = current {
        chunks.push(chunk);
    }
    chunks
}

/// Longest prefix of `text` no larger than `max_bytes` that ends on a char
/// boundary.
pub fn prefix_within(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
