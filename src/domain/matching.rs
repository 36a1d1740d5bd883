use serde::{Deserialize, Serialize};

use crate::domain::posting::Posting;
use crate::{DEFAULT_FETCH_LIMIT, DEFAULT_TOP_K};

fn default_fetch_limit() -> usize {
    DEFAULT_FETCH_LIMIT
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

/// Input of one end-to-end matching run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRequest {
    /// Source names to query. Matched case-insensitively.
    pub sources: Vec<String>,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    pub resume_text: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub fetch_descriptions: bool,
}

/// A posting paired with its cosine similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub posting: Posting,
    pub score: f32,
}

/// Outcome of a matching run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Sorted by descending score.
    pub matches: Vec<MatchResult>,
    /// Postings fetched across all sources, before deduplication.
    pub raw_count: usize,
    /// Postings left after deduplication within this run.
    pub deduped_count: usize,
    /// Postings appended to the index by this run.
    pub indexed_count: usize,
    /// Sources that failed or timed out.
    pub failed_sources: Vec<String>,
}
