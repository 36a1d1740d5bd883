use std::sync::Arc;

use scraper::Html;
use tokio::sync::Semaphore;

use crate::crawlers::{fetch_text, visible_text};
use crate::domain::posting::Posting;
use crate::{ENRICH_MAX_CHARS, ENRICH_MIN_CHARS};

/// Replaces short posting descriptions with the text of the posting page.
pub struct DescriptionEnricher {
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    min_chars: usize,
    max_chars: usize,
}

impl DescriptionEnricher {
    /// `concurrency` bounds the number of pages fetched at once.
    pub fn new(client: reqwest::Client, concurrency: usize) -> Self {
        Self {
            client,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
            min_chars: ENRICH_MIN_CHARS,
            max_chars: ENRICH_MAX_CHARS,
        }
    }

    fn needs_enrichment(&self, posting: &Posting) -> bool {
        !posting.url.is_empty() && posting.description.chars().count() < self.min_chars
    }

    async fn fetch_description(&self, url: &str) -> Option<String> {
        let _permit = self.semaphore.acquire().await.ok()?;
        match fetch_text(&self.client, url).await {
            Ok(body) => Some(page_text(&body, self.max_chars)).filter(|t| !t.is_empty()),
            Err(e) => {
                log::warn!("Failed to fetch description from {url}: {e}");
                None
            }
        }
    }

    /// Enriches postings in place and returns how many were updated.
    ///
    /// A failed fetch leaves the existing description untouched.
    pub async fn enrich(&self, postings: &mut [Posting]) -> usize {
        let targets: Vec<usize> = postings
            .iter()
            .enumerate()
            .filter(|(_, p)| self.needs_enrichment(p))
            .map(|(i, _)| i)
            .collect();

        let tasks = targets.iter().map(|&i| {
            let url = postings[i].url.clone();
            async move { (i, self.fetch_description(&url).await) }
        });
        let results = futures::future::join_all(tasks).await;

        let mut enriched = 0;
        for (i, description) in results {
            if let Some(description) = description {
                postings[i].enrich_description(description);
                enriched += 1;
            }
        }
        enriched
    }
}

/// Visible text of an HTML page, whitespace-collapsed and truncated to
/// `max_chars` characters.
pub fn page_text(html: &str, max_chars: usize) -> String {
    let document = Html::parse_document(html);
    visible_text(document.root_element())
        .chars()
        .take(max_chars)
        .collect()
}
