use std::sync::Mutex;
use std::time::Duration;

use futures::future;
use thiserror::Error;

use crate::crawlers::{JobSource, SourceError, SourceResult};
use crate::domain::embedding::EmbeddingVector;
use crate::domain::matching::{MatchReport, MatchRequest};
use crate::domain::posting::Posting;
use crate::processing::dedup::dedupe_postings;
use crate::processing::embedding::{
    EmbeddingError, EmbeddingGenerator, EmbeddingResult, validate_batch,
};
use crate::processing::enrich::DescriptionEnricher;
use crate::processing::normalizer::normalize_postings;
use crate::processing::planner::{PlanOutcome, parse_plan};
use crate::processing::{ZMQMessage, ZMQResponse};
use crate::repository::{IndexError, PostingIndexReader, PostingIndexWriter};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Errors that abort a matching run. Source failures never surface here.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("index failed: {0}")]
    Index(#[from] IndexError),
}

/// Drives fetch, normalize, dedupe, embed, index and search for one request.
///
/// `sources` must be given in priority order: when two sources return the same
/// listing, the posting from the earlier source is kept.
pub struct MatchingOrchestrator<E, R> {
    sources: Vec<Box<dyn JobSource>>,
    embedder: Mutex<E>,
    index: R,
    fetch_timeout: Duration,
    enricher: Option<DescriptionEnricher>,
}

impl<E, R> MatchingOrchestrator<E, R>
where
    E: EmbeddingGenerator,
    R: PostingIndexReader + PostingIndexWriter,
{
    pub fn new(sources: Vec<Box<dyn JobSource>>, embedder: E, index: R) -> Self {
        Self {
            sources,
            embedder: Mutex::new(embedder),
            index,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            enricher: None,
        }
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    pub fn with_enricher(mut self, enricher: DescriptionEnricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn index(&self) -> &R {
        &self.index
    }

    /// Requested sources in priority order. Unknown names are logged.
    fn selected_sources(&self, requested: &[String]) -> Vec<&dyn JobSource> {
        for name in requested {
            if !self
                .sources
                .iter()
                .any(|s| s.name().eq_ignore_ascii_case(name))
            {
                log::warn!("Unknown source requested: {name}");
            }
        }

        self.sources
            .iter()
            .filter(|s| requested.iter().any(|r| r.eq_ignore_ascii_case(s.name())))
            .map(|s| &**s)
            .collect()
    }

    async fn fetch_source(&self, source: &dyn JobSource, limit: usize) -> SourceResult<Vec<Posting>> {
        let raws = tokio::time::timeout(self.fetch_timeout, source.fetch(limit))
            .await
            .map_err(|_| SourceError::Timeout(self.fetch_timeout))??;
        Ok(normalize_postings(source.name(), raws))
    }

    /// Fetches all requested sources concurrently and concatenates their
    /// postings in priority order. Returns the postings and the names of the
    /// sources that failed.
    pub async fn fetch_postings(&self, request: &MatchRequest) -> (Vec<Posting>, Vec<String>) {
        let sources = self.selected_sources(&request.sources);
        let tasks = sources
            .iter()
            .map(|source| self.fetch_source(*source, request.fetch_limit));
        let results = future::join_all(tasks).await;

        let mut postings = Vec::new();
        let mut failed = Vec::new();
        for (source, result) in sources.iter().zip(results) {
            match result {
                Ok(fetched) => {
                    log::info!("Source {} returned {} postings", source.name(), fetched.len());
                    postings.extend(fetched);
                }
                Err(e) => {
                    log::error!("Source {} failed: {e}", source.name());
                    failed.push(source.name().to_string());
                }
            }
        }
        (postings, failed)
    }

    fn embed(&self, texts: &[String]) -> EmbeddingResult<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut embedder = self
            .embedder
            .lock()
            .map_err(|_| EmbeddingError::Generate("embedder lock poisoned".to_string()))?;
        let dimensions = embedder.dimensions();
        let vectors = embedder.embed(texts)?;
        validate_batch(&vectors, texts.len(), dimensions)?;
        Ok(vectors)
    }

    /// Runs the whole pipeline for `request`.
    ///
    /// Postings already present in the index are not embedded again, and the
    /// index rechecks identity keys when adding, so overlapping runs never
    /// index the same posting twice. Both the posting batch and the resume are
    /// embedded before anything is added, so an embedding failure leaves the
    /// index untouched.
    pub async fn run(&self, request: &MatchRequest) -> Result<MatchReport, MatchError> {
        let (fetched, failed_sources) = self.fetch_postings(request).await;
        let raw_count = fetched.len();

        let mut deduped = dedupe_postings(fetched);
        let deduped_count = deduped.len();

        if request.fetch_descriptions
            && let Some(enricher) = &self.enricher
        {
            let enriched = enricher.enrich(&mut deduped).await;
            log::info!("Enriched {enriched} of {deduped_count} postings");
        }

        let mut new_postings = Vec::with_capacity(deduped.len());
        for posting in deduped {
            if !self.index.contains(&posting.identity_key())? {
                new_postings.push(posting);
            }
        }

        let texts: Vec<String> = new_postings.iter().map(Posting::embedding_text).collect();
        let vectors = self.embed(&texts)?;

        let query = if request.resume_text.trim().is_empty() {
            log::warn!("Empty resume text; skipping search");
            None
        } else {
            self.embed(std::slice::from_ref(&request.resume_text))?
                .into_iter()
                .next()
        };

        let indexed_count = self.index.add_new(vectors, new_postings)?;

        let matches = match query {
            Some(query) => self.index.search(&query, request.top_k)?,
            None => Vec::new(),
        };

        Ok(MatchReport {
            matches,
            raw_count,
            deduped_count,
            indexed_count,
            failed_sources,
        })
    }
}

/// Handles one service message and builds the reply.
pub async fn process_match_message<E, R>(
    msg: ZMQMessage,
    orchestrator: &MatchingOrchestrator<E, R>,
) -> ZMQResponse
where
    E: EmbeddingGenerator,
    R: PostingIndexReader + PostingIndexWriter,
{
    let (request, outcome) = match msg {
        ZMQMessage::Match(request) => (request, None),
        ZMQMessage::Plan(plan_request) => {
            let outcome = parse_plan(&plan_request.plan);
            if let PlanOutcome::Defaulted(_, reason) = &outcome {
                log::warn!("Using default plan: {reason}");
            }
            let request = outcome
                .plan()
                .clone()
                .into_request(plan_request.resume_text, plan_request.fetch_limit);
            (request, Some(outcome))
        }
    };
    log::info!(
        "Received match request: sources={:?}, fetch_limit={}, top_k={}, fetch_descriptions={}",
        request.sources,
        request.fetch_limit,
        request.top_k,
        request.fetch_descriptions
    );

    match orchestrator.run(&request).await {
        Ok(report) => {
            log::info!(
                "Finished match run: raw_count={}, deduped_count={}, indexed_count={}, matches={}, failed_sources={:?}",
                report.raw_count,
                report.deduped_count,
                report.indexed_count,
                report.matches.len(),
                report.failed_sources
            );
            match outcome {
                Some(outcome) => ZMQResponse::Planned { outcome, report },
                None => ZMQResponse::Ok(report),
            }
        }
        Err(e) => {
            log::error!("Match run failed: {e}");
            ZMQResponse::Error {
                reason: e.to_string(),
            }
        }
    }
}
