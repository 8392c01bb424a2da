//! Exact cosine-similarity index over one document's passages.
//!
//! [`VectorIndex`] is built once from a complete set of entries and is
//! read-only afterwards, so it can be shared behind an `Arc` and searched
//! concurrently without locking. Replacing the corpus means building a new
//! index.

use crate::document::{IndexEntry, SearchResult};
use crate::error::{RagError, Result};

/// An immutable brute-force vector index.
///
/// Vectors are L2-normalised at build time, so a search is one dot product
/// per entry followed by a stable sort. Similarity is computed in `f64` and
/// rounded to `f32`, so vectors pointing the same way score bit-equal and
/// keep their insertion order.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::VectorIndex;
///
/// let index = VectorIndex::build(entries)?;
/// let results = index.search(&query_vector, 4)?;
/// ```
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Vec<IndexEntry>,
    normalized: Vec<Vec<f64>>,
    dimensions: usize,
}

impl VectorIndex {
    /// Build an index from scratch.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyCorpus`] if `entries` is empty and
    /// [`RagError::DimensionMismatch`] if the vectors are zero-length or do
    /// not all share one length.
    pub fn build(entries: Vec<IndexEntry>) -> Result<Self> {
        let Some(first) = entries.first() else {
            return Err(RagError::EmptyCorpus);
        };

        let dimensions = first.vector.len();
        if dimensions == 0 {
            return Err(RagError::DimensionMismatch { expected: 1, actual: 0 });
        }
        if let Some(bad) = entries.iter().find(|e| e.vector.len() != dimensions) {
            return Err(RagError::DimensionMismatch { expected: dimensions, actual: bad.vector.len() });
        }

        let normalized = entries.iter().map(|e| normalize(&e.vector)).collect();
        Ok(Self { entries, normalized, dimensions })
    }

    /// Return the `k` entries most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order. `k` larger than the index returns
    /// every entry; `k == 0` returns nothing.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::DimensionMismatch`] if `query` has the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if query.len() != self.dimensions {
            return Err(RagError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        let query = normalize(query);
        let mut scored: Vec<(usize, f32)> = self
            .normalized
            .iter()
            .enumerate()
            .map(|(position, vector)| (position, dot(vector, &query)))
            .collect();

        // `sort_by` is stable, which keeps insertion order among ties.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k.min(self.entries.len()));

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchResult {
                passage: self.entries[position].passage.clone(),
                score,
                position,
            })
            .collect())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; an index cannot be built empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimensionality shared by every vector in the index.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Name of the document the index was built from.
    pub fn document_name(&self) -> &str {
        &self.entries[0].passage.document_name
    }

    /// The entries in insertion order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }
}

/// Scale a vector to unit length. Zero or non-finite magnitudes give a zero
/// vector, which scores 0.0 against everything.
fn normalize(v: &[f32]) -> Vec<f64> {
    let norm = v.iter().map(|&x| f64::from(x) * f64::from(x)).sum::<f64>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return vec![0.0; v.len()];
    }
    v.iter().map(|&x| f64::from(x) / norm).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>().clamp(-1.0, 1.0) as f32
}

/// Cosine similarity between two vectors of equal length.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    dot(&normalize(a), &normalize(b))
}
