//! Helpers for integration tests.

use async_trait::async_trait;
use jobscout::crawlers::{JobSource, SourceError, SourceResult};
use jobscout::domain::embedding::EmbeddingVector;
use jobscout::domain::posting::RawPosting;
use jobscout::processing::embedding::{EmbeddingGenerator, EmbeddingResult};

pub const TEST_DIM: usize = 64;

/// Deterministic bag-of-words embedder: each lower-cased word adds one to an
/// FNV-hashed bucket.
pub struct HashingEmbedder;

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf29ce484222325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x100000001b3)
    })
}

impl EmbeddingGenerator for HashingEmbedder {
    fn dimensions(&self) -> usize {
        TEST_DIM
    }

    fn embed(&mut self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut values = vec![0.0_f32; TEST_DIM];
                for word in text.split_whitespace() {
                    values[(fnv1a(&word.to_lowercase()) % TEST_DIM as u64) as usize] += 1.0;
                }
                EmbeddingVector::normalized(values)
            })
            .collect())
    }
}

/// Source returning fixed `(title, company, url, description)` records.
pub struct FixedSource {
    pub name: &'static str,
    pub records: Vec<(&'static str, &'static str, &'static str, &'static str)>,
}

#[async_trait]
impl JobSource for FixedSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, limit: usize) -> SourceResult<Vec<RawPosting>> {
        Ok(self
            .records
            .iter()
            .take(limit)
            .map(|(title, company, url, description)| RawPosting {
                title: Some(title.to_string()),
                company: Some(company.to_string()),
                location: Some("Remote".to_string()),
                description: Some(description.to_string()),
                tags: None,
                url: Some(url.to_string()),
            })
            .collect())
    }
}

/// Source that always fails.
pub struct FailingSource {
    pub name: &'static str,
}

#[async_trait]
impl JobSource for FailingSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn fetch(&self, _limit: usize) -> SourceResult<Vec<RawPosting>> {
        Err(SourceError::Parse("listing page changed".to_string()))
    }
}

pub fn fixed(
    name: &'static str,
    records: Vec<(&'static str, &'static str, &'static str, &'static str)>,
) -> Box<dyn JobSource> {
    Box::new(FixedSource { name, records })
}
