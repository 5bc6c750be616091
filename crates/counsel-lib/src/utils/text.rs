/// Shorten `text` to at most `max_chars` characters, appending `...` when cut.
/// Cuts on character boundaries, never inside a multi-byte sequence.
pub fn snippet(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}
