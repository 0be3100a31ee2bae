//! Message chunking for Telegram.
//!
//! Telegram limits text messages to 4096 characters. Long completions are
//! split at paragraph boundaries, then line boundaries, then hard cuts.

/// Default split threshold (below Telegram's 4096 hard limit).
const DEFAULT_MAX_LEN: usize = 4000;

/// Split `text` into chunks of at most `max_len` characters.
///
/// Newlines at a split point are dropped from the start of the next chunk.
pub fn chunk_text(text: &str, max_len: Option<usize>) -> Vec<String> {
    let limit = max_len.unwrap_or(DEFAULT_MAX_LEN).max(1);

    if text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        // Byte offset of the first character past the limit, if any.
        let Some((hard_cut, _)) = remaining.char_indices().nth(limit) else {
            chunks.push(remaining.to_string());
            break;
        };

        let split_at = find_split_point(&remaining[..hard_cut]);
        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start_matches('\n');
    }

    chunks
}

/// Best byte offset to split `candidate`, which already fits the limit.
fn find_split_point(candidate: &str) -> usize {
    if let Some(pos) = candidate.rfind("\n\n")
        && pos > 0
    {
        return pos;
    }

    if let Some(pos) = candidate.rfind('\n')
        && pos > 0
    {
        return pos;
    }

    candidate.len()
}
