use async_trait::async_trait;
use serde::Deserialize;

use crate::crawlers::{JobSource, REMOTE_OK, SourceError, SourceResult, fetch_text, html_to_text};
use crate::domain::posting::RawPosting;

const API_URL: &str = "https://remoteok.com/api";
const FALLBACK_URL: &str = "https://remoteok.com";

#[derive(Debug, Deserialize)]
struct RemoteOkJob {
    position: Option<String>,
    company: Option<String>,
    url: Option<String>,
    apply_url: Option<String>,
    location: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
}

/// Source backed by the RemoteOK public JSON API.
pub struct RemoteOkSource {
    client: reqwest::Client,
}

impl RemoteOkSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parses the API response. The first array element is a legal notice and
/// carries no job.
fn parse_jobs(body: &str, limit: usize) -> SourceResult<Vec<RawPosting>> {
    let items: Vec<serde_json::Value> =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;

    let jobs = items
        .into_iter()
        .skip(1)
        .filter_map(|item| match serde_json::from_value::<RemoteOkJob>(item) {
            Ok(job) => Some(job),
            Err(e) => {
                log::warn!("Skipping malformed RemoteOK item: {e}");
                None
            }
        })
        .take(limit)
        .map(|job| RawPosting {
            title: job.position,
            company: job.company,
            location: non_empty(job.location).or_else(|| Some("Remote".to_string())),
            description: job.description.map(|d| html_to_text(&d)),
            tags: job.tags,
            url: non_empty(job.url)
                .or_else(|| non_empty(job.apply_url))
                .or_else(|| Some(FALLBACK_URL.to_string())),
        })
        .collect();

    Ok(jobs)
}

#[async_trait]
impl JobSource for RemoteOkSource {
    fn name(&self) -> &str {
        REMOTE_OK
    }

    async fn fetch(&self, limit: usize) -> SourceResult<Vec<RawPosting>> {
        let body = fetch_text(&self.client, API_URL).await?;
        parse_jobs(&body, limit)
    }
}
