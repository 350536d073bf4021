//! Text chunking for the TTS provider's request size limit
//!
//! Replies are split on whitespace so each synthesis request stays under the
//! limit. Lengths are counted in characters, not bytes, and every chunk is a
//! slice of the input so the original text can be rebuilt by re-inserting
//! the whitespace consumed between chunks.

use crate::config::DEFAULT_CHUNK_LIMIT;

/// Split `text` into chunks of at most `limit` characters.
///
/// Cuts at the last whitespace at or before character `limit`; when the
/// window holds no usable whitespace the cut is made at exactly `limit`,
/// splitting the word. Leading whitespace of the remainder is dropped.
/// Trailing whitespace never produces an empty final chunk; only empty
/// text yields a single empty chunk. A `limit` of 0 uses
/// [`DEFAULT_CHUNK_LIMIT`].
///
/// # Examples
///
/// ```
/// use voice_relay::voice::chunk_text;
///
/// assert_eq!(chunk_text("hello big world", 9), vec!["hello big", "world"]);
/// assert_eq!(chunk_text("abcdef", 4), vec!["abcd", "ef"]);
/// ```
#[must_use]
pub fn chunk_text(text: &str, limit: usize) -> Vec<&str> {
    let limit = if limit == 0 { DEFAULT_CHUNK_LIMIT } else { limit };

    let mut chunks = Vec::new();
    let mut remaining = text;

    while let Some(limit_byte) = nth_char_offset(remaining, limit) {
        let split_at = find_split_point(remaining, limit_byte);
        chunks.push(&remaining[..split_at]);
        remaining = remaining[split_at..].trim_start();
    }

    if chunks.is_empty() || !remaining.is_empty() {
        chunks.push(remaining);
    }
    chunks
}

/// Byte offset of the `n`th character, or `None` if `text` has at most `n` characters
fn nth_char_offset(text: &str, n: usize) -> Option<usize> {
    let mut indices = text.char_indices().skip(n);
    indices.next().map(|(offset, _)| offset)
}

/// Choose where to cut a window ending at byte `limit_byte`
///
/// The character at `limit_byte` is included in the search, so whitespace
/// sitting right after a full-length chunk still counts as a word boundary.
fn find_split_point(text: &str, limit_byte: usize) -> usize {
    let window_end = limit_byte + text[limit_byte..].chars().next().map_or(0, char::len_utf8);

    text[..window_end]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map(|(offset, _)| offset)
        .filter(|&offset| offset > 0)
        .unwrap_or(limit_byte)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rebuild the source by locating each chunk in order and checking that
    /// only whitespace was skipped between them
    fn reconstruct(original: &str, chunks: &[&str]) -> String {
        let mut rebuilt = String::new();
        let mut cursor = 0;
        for chunk in chunks {
            let start = cursor + original[cursor..].find(chunk).expect("chunk not in source");
            let gap = &original[cursor..start];
            assert!(gap.chars().all(char::is_whitespace), "non-whitespace skipped: {gap:?}");
            rebuilt.push_str(gap);
            rebuilt.push_str(chunk);
            cursor = start + chunk.len();
        }
        rebuilt
    }

    #[test]
    fn short_text_is_single_chunk() {
        assert_eq!(chunk_text("hi there", 3000), vec!["hi there"]);
    }

    #[test]
    fn exact_limit_is_single_chunk() {
        let text = "a".repeat(10);
        assert_eq!(chunk_text(&text, 10), vec![text.as_str()]);
    }

    #[test]
    fn empty_text_yields_one_empty_chunk() {
        assert_eq!(chunk_text("", 10), vec![""]);
    }

    #[test]
    fn trailing_whitespace_adds_no_empty_chunk() {
        assert_eq!(chunk_text("abcde ", 5), vec!["abcde"]);
        assert_eq!(chunk_text("one two   \n", 7), vec!["one two"]);
    }

    #[test]
    fn hard_cut_without_whitespace() {
        let text = "x".repeat(7000);
        let chunks = chunk_text(&text, 3000);
        let lengths: Vec<_> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lengths, [3000, 3000, 1000]);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn splits_at_last_whitespace() {
        let chunks = chunk_text("one two three four", 9);
        assert_eq!(chunks, vec!["one two", "three", "four"]);
    }

    #[test]
    fn whitespace_right_after_limit_is_a_boundary() {
        // the space sits at character index 5 == limit
        assert_eq!(chunk_text("abcde fgh", 5), vec!["abcde", "fgh"]);
    }

    #[test]
    fn consumes_runs_of_whitespace() {
        let text = "alpha   \n  beta gamma";
        let chunks = chunk_text(text, 8);
        assert_eq!(chunks, vec!["alpha   ", "beta", "gamma"]);
        assert_eq!(reconstruct(text, &chunks), text);
    }

    #[test]
    fn oversized_word_is_hard_cut() {
        let text = "hi supercalifragilistic ok";
        let chunks = chunk_text(text, 6);
        assert_eq!(chunks, vec!["hi", "superc", "alifra", "gilist", "ic ok"]);
        assert_eq!(reconstruct(text, &chunks), text);
    }

    #[test]
    fn leading_whitespace_does_not_create_empty_chunk() {
        let chunks = chunk_text(" abcdefgh", 4);
        assert!(chunks.iter().all(|c| !c.is_empty()));
        assert_eq!(reconstruct(" abcdefgh", &chunks), " abcdefgh");
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "é".repeat(5);
        let chunks = chunk_text(&text, 2);
        assert_eq!(chunks, vec!["éé", "éé", "é"]);
    }

    #[test]
    fn zero_limit_uses_default() {
        let text = "y".repeat(DEFAULT_CHUNK_LIMIT + 1);
        assert_eq!(chunk_text(&text, 0).len(), 2);
    }

    #[test]
    fn chunks_respect_limit_and_rebuild_source() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(40);
        let text = text.trim_end();
        for limit in [1, 7, 16, 45, 100, 333] {
            let chunks = chunk_text(text, limit);
            assert!(chunks.iter().all(|c| c.chars().count() <= limit));
            assert_eq!(reconstruct(text, &chunks), text);
            assert_eq!(chunks, chunk_text(text, limit), "not deterministic");
        }
    }
}
