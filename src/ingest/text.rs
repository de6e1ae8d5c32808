//! Text normalization shared by ingestion and prompt assembly.

/// Marker appended to clipped text.
pub const CLIP_MARKER: &str = "...";

/// Collapse every run of whitespace to a single space and trim.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Keep at most `limit` characters, appending [`CLIP_MARKER`] when anything was cut.
///
/// Counts `char`s, not bytes, so multi-byte text is never split mid-character.
pub fn clip_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => {
            let mut clipped = String::with_capacity(byte_idx + CLIP_MARKER.len());
            clipped.push_str(&text[..byte_idx]);
            clipped.push_str(CLIP_MARKER);
            clipped
        }
        None => text.to_string(),
    }
}
