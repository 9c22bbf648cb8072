//! Fixed-size overlapping text chunker.
//!
//! Splits extracted document text into character windows of a configured
//! size, where consecutive windows share `overlap` characters so that
//! passages spanning a window boundary still appear intact in one chunk.
//! Chunking is purely positional, with no sentence or paragraph awareness.

/// Split text into overlapping character windows.
///
/// Windows start at offsets `0, size-overlap, 2*(size-overlap), ...`;
/// the window that reaches the end of the text is the last one and may be
/// shorter than `size`. Offsets count characters, not bytes, so multi-byte
/// UTF-8 text never splits inside a code point.
///
/// Empty input produces an empty sequence. Callers must ensure
/// `0 <= overlap < size` (enforced at config load); a zero stride would
/// never advance.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    debug_assert!(size > 0 && overlap < size);

    let chars: Vec<char> = text.chars().collect();
    let stride = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += stride;
    }

    chunks
}
