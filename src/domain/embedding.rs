use serde::{Deserialize, Serialize};

/// Fixed-length, L2-normalized embedding.
///
/// Because every vector has unit length, the inner product of two vectors is
/// their cosine similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// Normalizes `values` to unit length.
    ///
    /// A zero vector is kept as is.
    pub fn normalized(values: Vec<f32>) -> Self {
        let norm = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            Self(values)
        } else {
            Self(values.into_iter().map(|x| x / norm).collect())
        }
    }

    /// Wraps values that are already normalized, e.g. read back from disk.
    pub(crate) fn from_normalized(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dot(&self, other: &EmbeddingVector) -> f32 {
        self.0.iter().zip(other.0.iter()).map(|(a, b)| a * b).sum()
    }
}

impl AsRef<[f32]> for EmbeddingVector {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}
