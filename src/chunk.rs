//! Overlapping character-window text chunker.
//!
//! Splits document text into windows of `chunk_size` characters with
//! `chunk_overlap` characters shared between consecutive windows. Windows
//! end on a whitespace boundary where one exists, keeping words intact.
//! Splitting is deterministic: the same text always yields the same chunks.

/// Split text into overlapping chunks. Sizes are in characters, not bytes,
/// so multi-byte text never splits inside a code point.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let mut cut = end;

        // Prefer ending on a whitespace boundary, unless this is the tail.
        if end < chars.len() {
            if let Some(pos) = chars[start..end].iter().rposition(|c| c.is_whitespace()) {
                if pos > 0 {
                    cut = start + pos;
                }
            }
        }

        let piece: String = chars[start..cut].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if cut >= chars.len() {
            break;
        }
        // Step forward, re-covering the last chunk_overlap characters.
        start += (cut - start).saturating_sub(chunk_overlap).max(1);
    }

    chunks
}
