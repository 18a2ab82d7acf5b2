//! System prompt assembly for mentor chats.

use crate::models::FileContext;

/// Longest slice of file content included in a prompt, in characters.
pub const MAX_FILE_CONTEXT_CHARS: usize = 8_000;

pub const MENTOR_PERSONA: &str = "You are Code Mentor, a senior software engineer reviewing code \
for a developer on their team. Be direct and specific. Explain the reasoning behind each \
recommendation so the developer learns from it.\n\
\n\
When you find problems, start each one on its own line with a severity marker: \
[CRITICAL], [WARNING] or [INFO]. Mention the line number as \"line N\" when you know it. \
Put code in fenced blocks with a language tag. When you propose a change, show the \
current code in a block labelled \"Before:\" followed by the corrected code.";

/// Persona first, then the file under discussion if one was found.
pub fn build_system_prompt(file_path: Option<&str>, file: Option<&FileContext>) -> String {
    let mut prompt = MENTOR_PERSONA.to_string();

    if let Some(file) = file {
        let fence_language = file.language.as_deref().unwrap_or_default();
        prompt.push_str("\n\nThe developer is working on ");
        prompt.push_str(file_path.unwrap_or("the following file"));
        prompt.push_str(":\n\n```");
        prompt.push_str(fence_language);
        prompt.push('\n');
        prompt.push_str(truncate_chars(&file.content, MAX_FILE_CONTEXT_CHARS));
        prompt.push_str("\n```");
    }

    prompt
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
