use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::embedding::EmbeddingVector;
use crate::domain::matching::MatchResult;
use crate::domain::posting::{IdentityKey, Posting};
use crate::repository::storage::IndexStore;
use crate::repository::{IndexError, IndexResult, PostingIndexReader, PostingIndexWriter};

#[derive(Default)]
struct IndexState {
    vectors: Vec<EmbeddingVector>,
    postings: Vec<Posting>,
    identities: HashSet<IdentityKey>,
}

/// Append-only exact inner-product index over postings.
///
/// `add` holds the write lock while persisting, so concurrent additions are
/// serialized and searches never see a half-applied addition.
pub struct VectorIndex {
    dimensions: usize,
    store: Option<IndexStore>,
    state: RwLock<IndexState>,
}

/// Descending by score; NaN sorts last.
fn by_score_desc(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

impl VectorIndex {
    /// Opens the index persisted under `dir`, starting empty when nothing has
    /// been written yet.
    ///
    /// Fails with [`IndexError::Corrupted`] or [`IndexError::DimensionMismatch`]
    /// rather than serving a partial index.
    pub fn open(dir: impl Into<PathBuf>, dimensions: usize) -> IndexResult<Self> {
        if dimensions == 0 {
            return Err(IndexError::ZeroDimensions);
        }
        let store = IndexStore::open(dir)?;
        let state = match store.load(dimensions)? {
            Some((vectors, postings)) => {
                log::info!(
                    "Loaded {} indexed postings from {}",
                    postings.len(),
                    store.dir().display()
                );
                let identities = postings.iter().map(Posting::identity_key).collect();
                IndexState {
                    vectors,
                    postings,
                    identities,
                }
            }
            None => {
                log::info!("Starting empty index at {}", store.dir().display());
                IndexState::default()
            }
        };

        Ok(Self {
            dimensions,
            store: Some(store),
            state: RwLock::new(state),
        })
    }

    /// An index that is never written to disk.
    pub fn in_memory(dimensions: usize) -> Self {
        Self {
            dimensions,
            store: None,
            state: RwLock::new(IndexState::default()),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn read(&self) -> IndexResult<RwLockReadGuard<'_, IndexState>> {
        self.state.read().map_err(|_| IndexError::Poisoned)
    }

    fn write(&self) -> IndexResult<RwLockWriteGuard<'_, IndexState>> {
        self.state.write().map_err(|_| IndexError::Poisoned)
    }

    fn check_dimensions(&self, vector: &EmbeddingVector) -> IndexResult<()> {
        if vector.dimensions() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.dimensions(),
            });
        }
        Ok(())
    }
}

impl PostingIndexReader for VectorIndex {
    fn search(&self, query: &EmbeddingVector, k: usize) -> IndexResult<Vec<MatchResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let state = self.read()?;
        if state.vectors.is_empty() {
            return Ok(Vec::new());
        }
        self.check_dimensions(query)?;

        let mut scored: Vec<(usize, f32)> = state
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (position, query.dot(vector)))
            .collect();
        // Stable sort: equal scores stay in insertion order.
        scored.sort_by(|a, b| by_score_desc(a.1, b.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| MatchResult {
                posting: state.postings[position].clone(),
                score,
            })
            .collect())
    }

    fn contains(&self, key: &IdentityKey) -> IndexResult<bool> {
        Ok(self.read()?.identities.contains(key))
    }

    fn count(&self) -> IndexResult<usize> {
        Ok(self.read()?.postings.len())
    }
}

impl VectorIndex {
    /// Appends the pairs kept by `skip_known` under the write lock and
    /// persists. On a persistence failure the in-memory addition is rolled
    /// back, so memory and disk keep the same length.
    fn append(
        &self,
        vectors: Vec<EmbeddingVector>,
        postings: Vec<Posting>,
        skip_known: bool,
    ) -> IndexResult<usize> {
        if vectors.len() != postings.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                postings: postings.len(),
            });
        }
        for vector in &vectors {
            self.check_dimensions(vector)?;
        }
        if vectors.is_empty() {
            return Ok(0);
        }

        let mut guard = self.write()?;
        let state = &mut *guard;

        let (vectors, postings): (Vec<_>, Vec<_>) = if skip_known {
            let mut batch = HashSet::new();
            vectors
                .into_iter()
                .zip(postings)
                .filter(|(_, posting)| {
                    let key = posting.identity_key();
                    !state.identities.contains(&key) && batch.insert(key)
                })
                .unzip()
        } else {
            (vectors, postings)
        };
        if postings.is_empty() {
            return Ok(0);
        }

        let added = postings.len();
        let previous_len = state.postings.len();
        state.vectors.extend(vectors);
        state.postings.extend(postings);

        if let Some(store) = &self.store
            && let Err(e) = store.save(self.dimensions, &state.vectors, &state.postings)
        {
            state.vectors.truncate(previous_len);
            state.postings.truncate(previous_len);
            return Err(e);
        }

        state
            .identities
            .extend(state.postings[previous_len..].iter().map(Posting::identity_key));
        Ok(added)
    }
}

impl PostingIndexWriter for VectorIndex {
    fn add(&self, vectors: Vec<EmbeddingVector>, postings: Vec<Posting>) -> IndexResult<usize> {
        self.append(vectors, postings, false)
    }

    fn add_new(
        &self,
        vectors: Vec<EmbeddingVector>,
        postings: Vec<Posting>,
    ) -> IndexResult<usize> {
        self.append(vectors, postings, true)
    }
}
