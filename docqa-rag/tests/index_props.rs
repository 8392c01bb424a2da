//! Property tests for vector index search ordering.

use docqa_rag::{IndexEntry, Passage, VectorIndex, cosine_similarity};
use proptest::prelude::*;

/// Generate a non-zero embedding of the given dimension.
fn arb_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter("non-zero embedding", |v| {
        v.iter().map(|x| x * x).sum::<f32>().sqrt() > 1e-4
    })
}

fn entry(index: usize, vector: Vec<f32>) -> IndexEntry {
    IndexEntry::new(
        vector,
        Passage {
            index,
            document_name: "doc.txt".to_string(),
            text: format!("passage {index}"),
            char_range: index * 10..index * 10 + 10,
            segments: 0..=0,
        },
    )
}

fn build(vectors: Vec<Vec<f32>>) -> VectorIndex {
    let entries = vectors.into_iter().enumerate().map(|(i, v)| entry(i, v)).collect();
    VectorIndex::build(entries).unwrap()
}

/// Searching returns results ordered by descending cosine similarity, at
/// most `k` of them, each scored exactly as a direct cosine comparison.
mod prop_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_k(
            vectors in proptest::collection::vec(arb_embedding(DIM), 1..20),
            query in arb_embedding(DIM),
            k in 1usize..25,
        ) {
            let count = vectors.len();
            let index = build(vectors.clone());
            let results = index.search(&query, k).unwrap();

            prop_assert_eq!(results.len(), k.min(count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score
                );
            }

            for result in &results {
                prop_assert!((-1.0..=1.0).contains(&result.score));
                let direct = cosine_similarity(&vectors[result.position], &query);
                prop_assert!((result.score - direct).abs() < 1e-4);
                prop_assert_eq!(result.passage.index, result.position);
            }
        }

        #[test]
        fn no_better_entry_is_left_out(
            vectors in proptest::collection::vec(arb_embedding(DIM), 2..20),
            query in arb_embedding(DIM),
            k in 1usize..5,
        ) {
            let index = build(vectors);
            let results = index.search(&query, k).unwrap();
            let all = index.search(&query, index.len()).unwrap();

            let worst_kept = results.last().unwrap().score;
            for omitted in all.iter().skip(results.len()) {
                prop_assert!(omitted.score <= worst_kept);
            }
        }
    }
}

