//! Helpers for keeping sensitive data out of traces and model prompts.
//!
//! Uploaded file names may carry client directory structure and document
//! text may carry chat-template tokens.

use std::path::Path;

/// Returns only the final component of an uploaded file name.
///
/// Handles both `/` and `\` separators, since upload names come from any client.
pub fn redact_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    raw.rsplit(['/', '\\'])
        .find(|s| !s.is_empty())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Escapes chat-template control sequences in untrusted text before it is
/// embedded in a prompt.
///
/// # Sequences Escaped
/// - `<|...|>` - ChatML special tokens
/// - `<s>`, `</s>` - Sequence boundaries
/// - `[INST]`, `[/INST]` - Llama-style instruction markers
/// - `<<SYS>>`, `<</SYS>>` - Llama-style system prompt markers
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("<s>", "< s >")
        .replace("</s>", "< / s >")
        .replace("[INST]", "[ INST ]")
        .replace("[/INST]", "[ / INST ]")
        .replace("<<SYS>>", "< < SYS > >")
        .replace("<</SYS>>", "< < / SYS > >")
}
