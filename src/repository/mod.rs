use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::domain::embedding::EmbeddingVector;
use crate::domain::matching::MatchResult;
use crate::domain::posting::{IdentityKey, Posting};

pub mod index;
pub mod storage;

pub use index::VectorIndex;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index is corrupted: {0}")]
    Corrupted(String),
    #[error("failed to persist {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("index dimensions must be positive")]
    ZeroDimensions,
    #[error("{vectors} vectors supplied for {postings} postings")]
    LengthMismatch { vectors: usize, postings: usize },
    #[error("index lock poisoned")]
    Poisoned,
}

pub type IndexResult<T> = Result<T, IndexError>;

pub trait PostingIndexReader {
    /// Returns the `min(k, count)` best matches by descending score, earliest
    /// added first among equal scores.
    fn search(&self, query: &EmbeddingVector, k: usize) -> IndexResult<Vec<MatchResult>>;

    /// Whether a posting with this identity key has already been added.
    fn contains(&self, key: &IdentityKey) -> IndexResult<bool>;

    fn count(&self) -> IndexResult<usize>;
}

pub trait PostingIndexWriter {
    /// Appends `vectors[i]` paired with `postings[i]` and returns the number of
    /// entries added.
    fn add(&self, vectors: Vec<EmbeddingVector>, postings: Vec<Posting>) -> IndexResult<usize>;

    /// Like [`add`](Self::add), but skips postings whose identity key is
    /// already indexed or repeated within the batch. The check and the append
    /// happen under one write, so concurrent callers never index the same
    /// posting twice.
    fn add_new(&self, vectors: Vec<EmbeddingVector>, postings: Vec<Posting>)
    -> IndexResult<usize>;
}
