use async_trait::async_trait;
use serde::Deserialize;

use crate::crawlers::{JobSource, REMOTIVE, SourceError, SourceResult, fetch_text, html_to_text};
use crate::domain::posting::RawPosting;

const API_URL: &str = "https://remotive.com/api/remote-jobs";

#[derive(Debug, Deserialize)]
struct RemotiveResponse {
    #[serde(default)]
    jobs: Vec<RemotiveJob>,
}

#[derive(Debug, Deserialize)]
struct RemotiveJob {
    title: Option<String>,
    company_name: Option<String>,
    url: Option<String>,
    candidate_required_location: Option<String>,
    description: Option<String>,
    tags: Option<Vec<String>>,
}

/// Source backed by the Remotive remote-jobs API.
pub struct RemotiveSource {
    client: reqwest::Client,
}

impl RemotiveSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn parse_jobs(body: &str, limit: usize) -> SourceResult<Vec<RawPosting>> {
    let response: RemotiveResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;

    Ok(response
        .jobs
        .into_iter()
        .take(limit)
        .map(|job| RawPosting {
            title: job.title,
            company: job.company_name,
            location: job
                .candidate_required_location
                .filter(|l| !l.is_empty())
                .or_else(|| Some("Remote".to_string())),
            description: job.description.map(|d| html_to_text(&d)),
            tags: job.tags,
            url: job.url,
        })
        .collect())
}

#[async_trait]
impl JobSource for RemotiveSource {
    fn name(&self) -> &str {
        REMOTIVE
    }

    async fn fetch(&self, limit: usize) -> SourceResult<Vec<RawPosting>> {
        let body = fetch_text(&self.client, API_URL).await?;
        parse_jobs(&body, limit)
    }
}
