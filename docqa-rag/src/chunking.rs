//! Splitting segments into overlapping, bounded passages.
//!
//! Segment texts are joined with [`SEGMENT_SEPARATOR`] and cut with a sliding
//! window of `max_length` characters. Inside the tail of each window the cut
//! prefers, in order: a paragraph or segment break, a sentence end, any
//! whitespace. Without one the window is cut hard at its edge. The next window
//! starts `overlap` characters before the cut, moved forward to a word start
//! when one exists in that region.
//!
//! Lengths and offsets are counted in `char`s, never bytes.

use std::ops::Range;

use crate::config::validate_chunking;
use crate::document::{Passage, Segment};
use crate::error::Result;

/// Text inserted between consecutive segments. It doubles as a soft break point.
pub const SEGMENT_SEPARATOR: &str = "\n\n";

/// Splits segments into [`Passage`]s of at most `max_length` characters that
/// share at most `overlap` characters with their neighbour.
///
/// Splitting is a pure function of the segments and the two parameters.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::Chunker;
///
/// let chunker = Chunker::new(1000, 100)?;
/// let passages = chunker.split(&segments);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_length: usize,
    overlap: usize,
}

impl Chunker {
    /// Create a new `Chunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidChunkConfig`](crate::RagError::InvalidChunkConfig)
    /// if `max_length == 0` or `overlap >= max_length`.
    pub fn new(max_length: usize, overlap: usize) -> Result<Self> {
        validate_chunking(max_length, overlap)?;
        Ok(Self { max_length, overlap })
    }

    /// Maximum passage length in characters.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Maximum number of characters shared by adjacent passages.
    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split segments into passages in reading order.
    ///
    /// Returns an empty `Vec` when the segments hold no non-whitespace text.
    pub fn split(&self, segments: &[Segment]) -> Vec<Passage> {
        let Some(first) = segments.first() else {
            return Vec::new();
        };
        let text = JoinedText::new(segments);
        if text.chars.iter().all(|c| c.is_whitespace()) {
            return Vec::new();
        }

        let total = text.chars.len();
        let mut passages = Vec::new();
        let mut start = 0;

        loop {
            let window_end = (start + self.max_length).min(total);
            let end = if window_end == total {
                total
            } else {
                self.cut_point(&text.chars, start, window_end)
            };

            passages.push(Passage {
                index: passages.len(),
                document_name: first.document_name.clone(),
                text: text.chars[start..end].iter().collect(),
                char_range: start..end,
                segments: text.segments_for(start..end),
            });

            if end == total {
                break;
            }
            start = self.next_start(&text.chars, end);
        }

        passages
    }

    /// Choose where to end a window that does not reach the end of the text.
    ///
    /// The cut never lands within `overlap` characters of `start`, so the
    /// following window always advances.
    fn cut_point(&self, chars: &[char], start: usize, window_end: usize) -> usize {
        let lower = start + (self.overlap + 1).max(self.max_length / 2);
        let mut best: Option<(u8, usize)> = None;

        for cut in (lower..=window_end).rev() {
            let rank = break_rank(chars, cut);
            if rank > 0 && best.is_none_or(|(best_rank, _)| rank > best_rank) {
                best = Some((rank, cut));
                if rank == PARAGRAPH_BREAK {
                    break;
                }
            }
        }

        best.map_or(window_end, |(_, cut)| cut)
    }

    fn next_start(&self, chars: &[char], end: usize) -> usize {
        let floor = end - self.overlap;
        (floor..end)
            .find(|&i| i == 0 || (chars[i - 1].is_whitespace() && !chars[i].is_whitespace()))
            .unwrap_or(floor)
    }
}

const PARAGRAPH_BREAK: u8 = 3;
const SENTENCE_BREAK: u8 = 2;
const WORD_BREAK: u8 = 1;

/// How good a place `cut` is to end a passage (`chars[..cut]` | `chars[cut..]`).
fn break_rank(chars: &[char], cut: usize) -> u8 {
    let Some(&last) = chars[..cut].last() else {
        return 0;
    };
    let before_last = cut.checked_sub(2).map(|i| chars[i]);

    if last == '\n' && before_last == Some('\n') {
        PARAGRAPH_BREAK
    } else if last.is_whitespace() && matches!(before_last, Some('.' | '!' | '?')) {
        SENTENCE_BREAK
    } else if last.is_whitespace() {
        WORD_BREAK
    } else {
        0
    }
}

/// Segment texts joined by [`SEGMENT_SEPARATOR`], with each segment's span.
struct JoinedText {
    chars: Vec<char>,
    spans: Vec<(usize, Range<usize>)>,
}

impl JoinedText {
    fn new(segments: &[Segment]) -> Self {
        let mut chars = Vec::new();
        let mut spans = Vec::with_capacity(segments.len());

        for (i, segment) in segments.iter().enumerate() {
            if i > 0 {
                chars.extend(SEGMENT_SEPARATOR.chars());
            }
            let start = chars.len();
            chars.extend(segment.text.chars());
            spans.push((segment.position, start..chars.len()));
        }

        Self { chars, spans }
    }

    /// Positions of the first and last segment overlapping `range`.
    ///
    /// A range that only covers separator characters is attributed to the
    /// segment preceding it.
    fn segments_for(&self, range: Range<usize>) -> std::ops::RangeInclusive<usize> {
        let mut touching = self
            .spans
            .iter()
            .filter(|(_, span)| span.start < range.end && span.end > range.start)
            .map(|(position, _)| *position);

        match touching.next() {
            Some(first) => first..=touching.last().unwrap_or(first),
            None => {
                let preceding = self
                    .spans
                    .iter()
                    .rev()
                    .find(|(_, span)| span.start <= range.start)
                    .or_else(|| self.spans.first())
                    .map_or(0, |(position, _)| *position);
                preceding..=preceding
            }
        }
    }
}

/// Split segments with a one-off [`Chunker`].
///
/// # Errors
///
/// Returns [`RagError::InvalidChunkConfig`](crate::RagError::InvalidChunkConfig)
/// if `overlap >= max_length` or `max_length == 0`.
pub fn split(segments: &[Segment], max_length: usize, overlap: usize) -> Result<Vec<Passage>> {
    Ok(Chunker::new(max_length, overlap)?.split(segments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RagError;

    fn segment(position: usize, text: &str) -> Segment {
        Segment { document_name: "doc.txt".into(), position, label: None, text: text.into() }
    }

    #[test]
    fn short_document_is_one_passage() {
        let passages = split(&[segment(0, "A short note.")], 50, 10).unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].text, "A short note.");
        assert_eq!(passages[0].char_range, 0..13);
        assert_eq!(passages[0].segments, 0..=0);
    }

    #[test]
    fn empty_and_blank_input_yield_nothing() {
        assert!(split(&[], 50, 10).unwrap().is_empty());
        assert!(split(&[segment(0, "  \n\t ")], 50, 10).unwrap().is_empty());
    }

    #[test]
    fn overlap_not_smaller_than_length_is_rejected() {
        assert!(matches!(split(&[segment(0, "x")], 10, 10), Err(RagError::InvalidChunkConfig(_))));
        assert!(matches!(split(&[segment(0, "x")], 10, 20), Err(RagError::InvalidChunkConfig(_))));
        assert!(matches!(split(&[segment(0, "x")], 0, 0), Err(RagError::InvalidChunkConfig(_))));
    }

    #[test]
    fn prefers_sentence_end_over_hard_cut() {
        let text = "The first sentence ends here. The second one keeps on going for a while.";
        let passages = split(&[segment(0, text)], 40, 5).unwrap();
        assert_eq!(passages[0].text, "The first sentence ends here. ");
        assert!(passages.iter().all(|p| p.text.chars().count() <= 40));
        assert!(passages.last().unwrap().text.ends_with("while."));
    }

    #[test]
    fn segment_boundaries_are_break_points_and_tracked() {
        let segments = [
            segment(0, "Page one talks about ALPHA only."),
            segment(1, "Page two talks about BETA only."),
            segment(2, "Page three talks about GAMMA."),
        ];
        let passages = split(&segments, 50, 10).unwrap();
        assert_eq!(passages[0].text, "Page one talks about ALPHA only.\n\n");
        assert_eq!(passages[0].segments, 0..=0);
        assert!(passages.iter().any(|p| p.text.contains("BETA") && *p.segments.start() <= 1));
        assert_eq!(*passages.last().unwrap().segments.end(), 2);
    }

    #[test]
    fn hard_cut_without_whitespace() {
        let text = "x".repeat(25);
        let passages = split(&[segment(0, &text)], 10, 3).unwrap();
        let ranges: Vec<_> = passages.iter().map(|p| p.char_range.clone()).collect();
        assert_eq!(ranges, vec![0..10, 7..17, 14..24, 21..25]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "é".repeat(30);
        let passages = split(&[segment(0, &text)], 12, 2).unwrap();
        assert!(passages.iter().all(|p| p.text.chars().count() <= 12));
        assert_eq!(passages[0].text.chars().count(), 12);
    }

    #[test]
    fn next_window_starts_on_a_word() {
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let passages = split(&[segment(0, text)], 20, 8).unwrap();
        for passage in &passages[1..] {
            assert!(!passage.text.starts_with(' '), "{:?}", passage.text);
        }
    }
}
