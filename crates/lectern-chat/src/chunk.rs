//! Splitting of long segment bodies into transport-sized messages.

/// Split `body` into ordered chunks of at most `limit` characters.
///
/// A chunk ends after the last line break inside its window when there is
/// one, otherwise exactly at the limit. Concatenating the chunks yields
/// `body`. A body within the limit (or a zero limit) comes back whole.
pub fn split_for_transport(body: &str, limit: usize) -> Vec<String> {
    if limit == 0 || body.chars().count() <= limit {
        return vec![body.to_string()];
    }

    let mut chunks = Vec::new();
    let mut rest = body;
    while rest.chars().count() > limit {
        let window_end = rest
            .char_indices()
            .nth(limit)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let split_at = match rest[..window_end].rfind('\n') {
            Some(newline) if newline > 0 => newline + 1,
            _ => window_end,
        };
        let (chunk, tail) = rest.split_at(split_at);
        chunks.push(chunk.to_string());
        rest = tail;
    }
    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}
