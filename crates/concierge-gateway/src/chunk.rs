pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

/// A newline or space is only used as a break point when it falls at or past
/// this share of the limit.
const BREAK_THRESHOLD_PERCENT: usize = 80;

/// Byte offset of the `n`th character, or `None` if `s` has `n` or fewer
/// characters.
fn byte_offset_of_char(s: &str, n: usize) -> Option<usize> {
    s.char_indices().nth(n).map(|(i, _)| i)
}

/// Last occurrence of `needle` at or before character position `limit`,
/// accepted only if it sits at or past the break threshold. Returns the byte
/// offset just past the break character.
fn late_break(s: &str, limit_byte: usize, limit: usize, needle: char) -> Option<usize> {
    let window_end = limit_byte + s[limit_byte..].chars().next().map_or(0, char::len_utf8);
    let idx = s[..window_end].rfind(needle)?;
    let position = s[..idx].chars().count();
    if position * 100 >= limit * BREAK_THRESHOLD_PERCENT {
        Some(idx + needle.len_utf8())
    } else {
        None
    }
}

fn split_point(s: &str, limit: usize) -> Option<usize> {
    let limit_byte = byte_offset_of_char(s, limit)?;
    Some(
        late_break(s, limit_byte, limit, '\n')
            .or_else(|| late_break(s, limit_byte, limit, ' '))
            .unwrap_or(limit_byte),
    )
}

/// Split `text` into pieces of at most `limit` characters.
///
/// Text within the limit comes back trimmed as a single piece, so empty or
/// whitespace-only input yields one empty piece. Longer text
/// is broken at the last newline, then the last space, when either falls in
/// the final fifth of the window; otherwise it is cut at the limit. Every
/// piece is trimmed, and pieces left empty by a split are dropped.
pub fn chunk_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if byte_offset_of_char(text, limit).is_none() {
        return vec![text.trim().to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;
    while let Some(split) = split_point(remaining, limit) {
        let piece = remaining[..split].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        remaining = remaining[split..].trim();
    }
    if !remaining.is_empty() {
        chunks.push(remaining.to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_len(s: &str) -> usize {
        s.chars().count()
    }

    #[test]
    fn test_short_text_returns_single_chunk() {
        assert_eq!(chunk_message("Hello, world!", 2000), vec!["Hello, world!"]);
    }

    #[test]
    fn test_text_at_limit_is_single_trimmed_chunk() {
        let text = format!(" {} ", "a".repeat(1998));
        let chunks = chunk_message(&text, DISCORD_MESSAGE_LIMIT);
        assert_eq!(chunks, vec!["a".repeat(1998)]);
    }

    #[test]
    fn test_long_text_splits_by_chars() {
        let text = "a".repeat(4500);
        let chunks = chunk_message(&text, DISCORD_MESSAGE_LIMIT);
        let lengths: Vec<usize> = chunks.iter().map(|c| char_len(c)).collect();
        assert_eq!(lengths, vec![2000, 2000, 500]);
    }

    #[test]
    fn test_prefers_late_newline() {
        let text = format!("{}\n{}", "a".repeat(1700), "b".repeat(1000));
        let chunks = chunk_message(&text, DISCORD_MESSAGE_LIMIT);
        assert_eq!(chunks, vec!["a".repeat(1700), "b".repeat(1000)]);
    }

    #[test]
    fn test_early_newline_falls_back_to_space() {
        let text = format!(
            "{}\n{} {}",
            "a".repeat(100),
            "b".repeat(1700),
            "c".repeat(500)
        );
        let chunks = chunk_message(&text, DISCORD_MESSAGE_LIMIT);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{}\n{}", "a".repeat(100), "b".repeat(1700)));
        assert_eq!(chunks[1], "c".repeat(500));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // newline at position 8 of a 10-char window
        let chunks = chunk_message("aaaaaaaa\nbbbbbbbbbb", 10);
        assert_eq!(chunks, vec!["aaaaaaaa", "bbbbbbbbbb"]);

        // position 7 is below the threshold, so the cut is hard
        let chunks = chunk_message("aaaaaaa\nbbbbbbbbbbbb", 10);
        assert_eq!(chunks, vec!["aaaaaaa\nbb", "bbbbbbbbbb"]);
    }

    #[test]
    fn test_newline_exactly_at_limit() {
        let text = format!("{}\n{}", "a".repeat(10), "b".repeat(5));
        let chunks = chunk_message(&text, 10);
        assert_eq!(chunks, vec!["a".repeat(10), "b".repeat(5)]);
    }

    #[test]
    fn test_chunks_are_trimmed_and_nonempty() {
        let text = format!("{}\n\n\n   \n{}", "x".repeat(9), "y".repeat(12));
        let chunks = chunk_message(&text, 10);
        assert!(chunks.iter().all(|c| !c.is_empty()));
        assert!(chunks.iter().all(|c| c.trim() == c));
        assert!(chunks.iter().all(|c| char_len(c) <= 10));
    }

    #[test]
    fn test_multibyte_utf8_does_not_panic() {
        let text = "🔥".repeat(4500);
        let chunks = chunk_message(&text, DISCORD_MESSAGE_LIMIT);
        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(char_len(chunk) <= DISCORD_MESSAGE_LIMIT);
        }
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn test_whitespace_only_is_one_empty_chunk() {
        assert_eq!(chunk_message("", DISCORD_MESSAGE_LIMIT), vec![""]);
        assert_eq!(chunk_message("  \n\t ", DISCORD_MESSAGE_LIMIT), vec![""]);
    }

    #[test]
    fn test_splits_only_lose_boundary_whitespace() {
        let words = ["héllo", "wörld", "🚀", "x", "configuration", "日本語", "ok"];
        let mut text = String::new();
        for i in 0..1500 {
            text.push_str(words[i % words.len()]);
            text.push(match i % 11 {
                0 => '\n',
                5 => '\t',
                _ => ' ',
            });
        }

        for limit in [DISCORD_MESSAGE_LIMIT, 97] {
            let chunks = chunk_message(&text, limit);
            assert!(chunks.len() > 1);
            assert!(chunks.iter().all(|c| char_len(c) <= limit));

            let strip = |s: &str| s.chars().filter(|c| !c.is_whitespace()).collect::<String>();
            assert_eq!(strip(&chunks.concat()), strip(&text));
        }
    }

    #[test]
    fn test_mixed_ascii_and_multibyte() {
        let text = "Hello 🌍 World 🚀 ".repeat(200);
        let chunks = chunk_message(&text, 100);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 100);
        }
    }
}
