//! Chunking: splits text that is too long for one model call into pieces.
//!
//! Paragraph boundaries (blank lines) are preferred, then sentence
//! boundaries; a single sentence longer than the limit is hard-cut. Each
//! chunk remembers the whitespace that followed it, so `join` rebuilds the
//! input byte for byte.

use std::sync::LazyLock;

use regex::Regex;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n[ \t]*\n\s*").expect("paragraph regex"));

// Terminal punctuation, optional closing quotes/brackets, then the whitespace (group 1).
static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[.!?…。！？]+["'”’»)\]]*(\s+)"#).expect("sentence regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    /// Whitespace that followed this chunk in the input; empty for the last one.
    pub separator: String,
}

/// An atomic piece that the packer never splits further.
struct Unit<'a> {
    text: &'a str,
    separator: String,
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits `text` into chunks of at most `max_chars` characters where possible.
pub fn split(text: &str, max_chars: usize) -> Vec<Chunk> {
    let max_chars = max_chars.max(1);
    if char_len(text) <= max_chars {
        return vec![Chunk {
            text: text.to_string(),
            separator: String::new(),
        }];
    }

    let mut units = Vec::new();
    for paragraph in split_on(text, &PARAGRAPH_BREAK, 0, String::new()) {
        if char_len(paragraph.text) <= max_chars {
            units.push(paragraph);
            continue;
        }
        for sentence in split_on(paragraph.text, &SENTENCE_END, 1, paragraph.separator) {
            if char_len(sentence.text) <= max_chars {
                units.push(sentence);
                continue;
            }
            let mut pieces = hard_cut(sentence.text, max_chars);
            let last = pieces.pop();
            units.extend(pieces.into_iter().map(|text| Unit {
                text,
                separator: String::new(),
            }));
            if let Some(text) = last {
                units.push(Unit {
                    text,
                    separator: sentence.separator,
                });
            }
        }
    }

    pack(units, max_chars)
}

/// Splits at each match of `pattern`, using capture `group` as the separator.
/// The tail piece inherits `outer_separator`.
fn split_on<'a>(
    text: &'a str,
    pattern: &Regex,
    group: usize,
    outer_separator: String,
) -> Vec<Unit<'a>> {
    let mut units: Vec<Unit<'a>> = Vec::new();
    let mut last = 0;

    for caps in pattern.captures_iter(text) {
        let Some(sep) = caps.get(group) else {
            continue;
        };
        // Leading whitespace stays with the piece that follows it.
        if sep.start() == last {
            continue;
        }
        units.push(Unit {
            text: &text[last..sep.start()],
            separator: sep.as_str().to_string(),
        });
        last = sep.end();
    }

    if last < text.len() {
        units.push(Unit {
            text: &text[last..],
            separator: outer_separator,
        });
    } else if let Some(tail) = units.last_mut() {
        tail.separator.push_str(&outer_separator);
    }

    units
}

/// Cuts an oversized sentence into windows of `max_chars`, ending each window
/// after its last whitespace when that falls in the window's second half.
fn hard_cut(text: &str, max_chars: usize) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut rest = text;

    while let Some((window_end, _)) = rest.char_indices().nth(max_chars) {
        let window = &rest[..window_end];
        let cut = window
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(idx, c)| idx + c.len_utf8())
            .filter(|&idx| idx * 2 >= window.len())
            .unwrap_or(window_end);
        pieces.push(&rest[..cut]);
        rest = &rest[cut..];
    }

    if !rest.is_empty() {
        pieces.push(rest);
    }
    pieces
}

/// Greedily packs consecutive units into chunks no longer than `max_chars`.
fn pack(units: Vec<Unit<'_>>, max_chars: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    let mut pending_separator = String::new();

    for unit in units {
        let unit_len = char_len(unit.text);
        if !current.is_empty() {
            let separator_len = char_len(&pending_separator);
            if current_len + separator_len + unit_len > max_chars {
                chunks.push(Chunk {
                    text: std::mem::take(&mut current),
                    separator: std::mem::take(&mut pending_separator),
                });
                current_len = 0;
            } else {
                current.push_str(&pending_separator);
                current_len += separator_len;
            }
        }
        current.push_str(unit.text);
        current_len += unit_len;
        pending_separator = unit.separator;
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            text: current,
            separator: pending_separator,
        });
    }
    chunks
}

/// Joins per-chunk replacements with the original separators. With fewer
/// pieces than chunks (a partial result) no trailing separator is added.
pub fn rejoin(chunks: &[Chunk], pieces: &[String]) -> String {
    let complete = pieces.len() == chunks.len();
    let mut out = String::new();
    for (idx, (piece, chunk)) in pieces.iter().zip(chunks).enumerate() {
        out.push_str(piece);
        if complete || idx + 1 < pieces.len() {
            out.push_str(&chunk.separator);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Rebuilds the original text from its chunks.
    fn join(chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .flat_map(|c| [c.text.as_str(), c.separator.as_str()])
            .collect()
    }

    fn assert_lossless(text: &str, max: usize) -> Vec<Chunk> {
        let chunks = split(text, max);
        assert_eq!(join(&chunks), text, "join must rebuild the input");
        chunks
    }

    fn lengths(chunks: &[Chunk]) -> Vec<usize> {
        chunks.iter().map(|c| char_len(&c.text)).collect()
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = assert_lossless("Short summary.", 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Short summary.");
        assert!(chunks[0].separator.is_empty());
    }

    #[test]
    fn test_empty_text() {
        let chunks = assert_lossless("", 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "");
    }

    #[test]
    fn test_paragraph_boundaries_preferred() {
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird one.";
        let chunks = assert_lossless(text, 25);
        assert_eq!(
            chunks.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(),
            vec!["First paragraph here.", "Second paragraph here.", "Third one."]
        );
        assert_eq!(chunks[0].separator, "\n\n");
        assert_eq!(chunks[1].separator, "\n\n");
        assert_eq!(chunks[2].separator, "");
    }

    #[test]
    fn test_small_paragraphs_are_packed_together() {
        let text = "One.\n\nTwo.\n\nThree.\n\nFour.";
        let chunks = assert_lossless(text, 14);
        assert_eq!(chunks[0].text, "One.\n\nTwo.");
        assert!(lengths(&chunks).iter().all(|&n| n <= 14));
    }

    #[test]
    fn test_long_paragraph_falls_back_to_sentences() {
        let text = "Built the API. Cut latency by half! Was it worth it? Yes.";
        let chunks = assert_lossless(text, 20);
        assert!(lengths(&chunks).iter().all(|&n| n <= 20));
        assert_eq!(chunks[0].text, "Built the API.");
        assert_eq!(chunks[0].separator, " ");
    }

    #[test]
    fn test_oversized_sentence_is_hard_cut() {
        let sentence = "word ".repeat(30);
        let text = format!("{}end.", sentence);
        let chunks = assert_lossless(&text, 32);
        assert!(chunks.len() > 1);
        assert!(lengths(&chunks).iter().all(|&n| n <= 32));
    }

    #[test]
    fn test_hard_cut_without_whitespace() {
        let text = "x".repeat(25);
        let chunks = assert_lossless(&text, 10);
        assert_eq!(lengths(&chunks), vec![10, 10, 5]);
    }

    #[test]
    fn test_multibyte_text_counts_chars() {
        let text = "Привет мир. Как дела? ".repeat(10);
        let chunks = assert_lossless(&text, 30);
        assert!(lengths(&chunks).iter().all(|&n| n <= 30));
    }

    #[test]
    fn test_leading_and_trailing_whitespace_round_trip() {
        let text = "\n\n  Lead paragraph.  \n\nMiddle paragraph text.\n\n\nTail.  \n";
        let chunks = assert_lossless(text, 22);
        assert!(chunks.iter().all(|c| !c.text.is_empty()));
    }

    #[test]
    fn test_irregular_blank_lines_round_trip() {
        let text = "Alpha beta.\n \t\nGamma delta epsilon.\n\n\n\nZeta eta theta iota.";
        assert_lossless(text, 15);
        assert_lossless(text, 1);
    }

    #[test]
    fn test_rejoin_full_and_partial() {
        let chunks = split("Aaaa.\n\nBbbb.\n\nCccc.", 6);
        assert_eq!(chunks.len(), 3);

        let all = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        assert_eq!(rejoin(&chunks, &all), "A\n\nB\n\nC");

        let first_two = &all[..2];
        assert_eq!(rejoin(&chunks, first_two), "A\n\nB");
        assert_eq!(rejoin(&chunks, &all[..1]), "A");
    }
}
