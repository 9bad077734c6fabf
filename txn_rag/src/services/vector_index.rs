//! In-memory vector index with cosine ranking.
//!
//! One index per user, positionally aligned with the user's document list:
//! the vector at ordinal `i` belongs to document `i`.

use anyhow::{anyhow, Result};

#[derive(Debug, Clone)]
pub struct VectorIndex {
    vectors: Vec<Vec<f32>>,
    dimension: usize,
}

/// A ranked hit: document ordinal plus cosine similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub ordinal: usize,
    pub score: f32,
}

fn normalize(mut v: Vec<f32>) -> Vec<f32> {
    let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in &mut v {
            *x /= magnitude;
        }
    }
    v
}

impl VectorIndex {
    pub fn empty(dimension: usize) -> Self {
        Self { vectors: Vec::new(), dimension }
    }

    /// Build an index from raw embeddings. Vectors are normalized on entry so
    /// the search loop is a plain dot product.
    pub fn from_embeddings(embeddings: Vec<Vec<f32>>, dimension: usize) -> Result<Self> {
        for (i, v) in embeddings.iter().enumerate() {
            if v.len() != dimension {
                return Err(anyhow!(
                    "embedding {i} has dimension {}, expected {dimension}",
                    v.len()
                ));
            }
        }
        Ok(Self {
            vectors: embeddings.into_iter().map(normalize).collect(),
            dimension,
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Top-k nearest neighbours by cosine similarity, highest first. Ties
    /// break by ordinal so results are stable.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<SearchHit> {
        if self.vectors.is_empty() || k == 0 || query.len() != self.dimension {
            return Vec::new();
        }

        let query = normalize(query.to_vec());
        let mut hits: Vec<SearchHit> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(ordinal, v)| SearchHit {
                ordinal,
                score: v.iter().zip(query.iter()).map(|(a, b)| a * b).sum(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.ordinal.cmp(&b.ordinal))
        });
        hits.truncate(k);
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(vectors: Vec<Vec<f32>>) -> VectorIndex {
        VectorIndex::from_embeddings(vectors, 3).unwrap()
    }

    #[test]
    fn identical_vector_ranks_first() {
        let idx = index(vec![
            vec![0.0, 1.0, 0.0],
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
        ]);

        let hits = idx.search(&[1.0, 0.0, 0.0], 3);
        assert_eq!(hits[0].ordinal, 1);
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[1].ordinal, 2);
    }

    #[test]
    fn k_bounds_result_size() {
        let idx = index(vec![vec![1.0, 0.0, 0.0]; 5]);
        assert_eq!(idx.search(&[1.0, 0.0, 0.0], 2).len(), 2);
        assert_eq!(idx.search(&[1.0, 0.0, 0.0], 50).len(), 5);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let idx = VectorIndex::empty(3);
        assert!(idx.search(&[1.0, 0.0, 0.0], 10).is_empty());
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        assert!(VectorIndex::from_embeddings(vec![vec![1.0, 0.0]], 3).is_err());
    }

    #[test]
    fn zero_vector_scores_zero() {
        let idx = index(vec![vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]]);
        let hits = idx.search(&[1.0, 0.0, 0.0], 2);
        assert_eq!(hits[0].ordinal, 1);
        assert_eq!(hits[1].score, 0.0);
    }
}
