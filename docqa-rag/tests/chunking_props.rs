//! Property tests for passage splitting.

use docqa_rag::{Chunker, SEGMENT_SEPARATOR, Segment};
use proptest::prelude::*;

fn segments_from(texts: &[String]) -> Vec<Segment> {
    texts
        .iter()
        .enumerate()
        .map(|(position, text)| Segment {
            document_name: "props.txt".to_string(),
            position,
            label: None,
            text: text.clone(),
        })
        .collect()
}

fn joined(texts: &[String]) -> Vec<char> {
    texts.join(SEGMENT_SEPARATOR).chars().collect()
}

/// Words, sentence ends, paragraph breaks and some multi-byte characters.
fn arb_text() -> impl Strategy<Value = String> {
    "([a-zA-Zéü]{1,12}[ .,!?\n]{0,2}){0,40}"
}

fn arb_params() -> impl Strategy<Value = (usize, usize)> {
    (1usize..120).prop_flat_map(|max| (Just(max), 0..max))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn passages_are_bounded_and_cover_the_text(
        texts in proptest::collection::vec(arb_text(), 1..5),
        (max, overlap) in arb_params(),
    ) {
        let chars = joined(&texts);
        let passages = Chunker::new(max, overlap).unwrap().split(&segments_from(&texts));

        if chars.iter().all(|c| c.is_whitespace()) {
            prop_assert!(passages.is_empty());
            return Ok(());
        }

        prop_assert!(!passages.is_empty());
        prop_assert_eq!(passages[0].char_range.start, 0);
        prop_assert_eq!(passages.last().unwrap().char_range.end, chars.len());

        for (i, passage) in passages.iter().enumerate() {
            let range = passage.char_range.clone();
            prop_assert_eq!(passage.index, i);
            prop_assert!(range.end > range.start);
            prop_assert!(range.len() <= max);
            prop_assert_eq!(passage.text.chars().count(), range.len());
            let expected: String = chars[range].iter().collect();
            prop_assert_eq!(&passage.text, &expected);
        }

        for pair in passages.windows(2) {
            let (prev, next) = (&pair[0].char_range, &pair[1].char_range);
            prop_assert!(next.start > prev.start);
            prop_assert!(next.start <= prev.end);
            prop_assert!(prev.end - next.start <= overlap);
        }
    }

    #[test]
    fn splitting_is_deterministic(
        texts in proptest::collection::vec(arb_text(), 1..4),
        (max, overlap) in arb_params(),
    ) {
        let chunker = Chunker::new(max, overlap).unwrap();
        let segments = segments_from(&texts);
        prop_assert_eq!(chunker.split(&segments), chunker.split(&segments));
    }

    #[test]
    fn segment_ranges_are_ordered(
        texts in proptest::collection::vec(arb_text(), 1..6),
        (max, overlap) in arb_params(),
    ) {
        let passages = Chunker::new(max, overlap).unwrap().split(&segments_from(&texts));
        for passage in &passages {
            prop_assert!(passage.segments.start() <= passage.segments.end());
            prop_assert!(*passage.segments.end() < texts.len());
        }
        for pair in passages.windows(2) {
            prop_assert!(pair[0].segments.start() <= pair[1].segments.start());
        }
    }
}
