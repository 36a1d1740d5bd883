use std::path::PathBuf;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use thiserror::Error;

use crate::domain::embedding::EmbeddingVector;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("unknown embedding model: {0}")]
    UnknownModel(String),
    #[error("failed to initialize embedder: {0}")]
    Init(String),
    #[error("failed to generate embeddings: {0}")]
    Generate(String),
    #[error("embedder returned {actual} vectors for {expected} texts")]
    CountMismatch { expected: usize, actual: usize },
    #[error("embedder returned a {actual}-dimensional vector, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Maps texts to unit-length vectors of a fixed dimension.
///
/// Implementations must return exactly one vector per input text and an empty
/// result for an empty batch.
pub trait EmbeddingGenerator: Send {
    fn dimensions(&self) -> usize;

    fn embed(&mut self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>>;
}

/// Resolves a configured model name to a fastembed model and its dimension.
pub fn resolve_model(name: &str) -> EmbeddingResult<(EmbeddingModel, usize)> {
    match name.to_ascii_lowercase().as_str() {
        "all-minilm-l6-v2" | "sentence-transformers/all-minilm-l6-v2" => {
            Ok((EmbeddingModel::AllMiniLML6V2, 384))
        }
        "bge-small-en-v1.5" => Ok((EmbeddingModel::BGESmallENV15, 384)),
        "multilingual-e5-large" => Ok((EmbeddingModel::MultilingualE5Large, 1024)),
        _ => Err(EmbeddingError::UnknownModel(name.to_string())),
    }
}

/// Checks a batch returned by an embedder against the request.
pub fn validate_batch(
    vectors: &[EmbeddingVector],
    expected_count: usize,
    dimensions: usize,
) -> EmbeddingResult<()> {
    if vectors.len() != expected_count {
        return Err(EmbeddingError::CountMismatch {
            expected: expected_count,
            actual: vectors.len(),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.dimensions() != dimensions) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: dimensions,
            actual: bad.dimensions(),
        });
    }
    Ok(())
}

/// Local ONNX embedder backed by fastembed.
pub struct FastEmbedGenerator {
    model: TextEmbedding,
    dimensions: usize,
    batch_size: usize,
}

impl FastEmbedGenerator {
    pub fn new(
        model_name: &str,
        cache_dir: Option<PathBuf>,
        batch_size: usize,
    ) -> EmbeddingResult<Self> {
        let (model, dimensions) = resolve_model(model_name)?;
        let mut options = InitOptions::new(model);
        if let Some(dir) = cache_dir {
            options = options.with_cache_dir(dir);
        }
        let model =
            TextEmbedding::try_new(options).map_err(|e| EmbeddingError::Init(format!("{e:?}")))?;
        log::info!("Loaded embedding model {model_name} ({dimensions} dimensions)");

        Ok(Self {
            model,
            dimensions,
            batch_size: batch_size.max(1),
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&mut self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors: Vec<EmbeddingVector> = self
            .model
            .embed(texts.to_vec(), Some(self.batch_size))
            .map_err(|e| EmbeddingError::Generate(format!("{e:?}")))?
            .into_iter()
            .map(EmbeddingVector::normalized)
            .collect();

        validate_batch(&vectors, texts.len(), self.dimensions)?;
        Ok(vectors)
    }
}
