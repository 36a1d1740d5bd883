use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html};
use thiserror::Error;

use crate::domain::posting::RawPosting;

pub mod greenhouse;
pub mod newgrad;
pub mod remoteok;
pub mod remotive;
pub mod weworkremotely;

pub const REMOTE_OK: &str = "RemoteOK";
pub const REMOTIVE: &str = "Remotive";
pub const WE_WORK_REMOTELY: &str = "WeWorkRemotely";
pub const NEW_GRAD_JOBS: &str = "NewGradJobs";
pub const GREENHOUSE: &str = "Greenhouse";

/// Fixed adapter order. Postings from earlier sources win deduplication ties.
pub const SOURCE_PRIORITY: [&str; 5] = [
    REMOTE_OK,
    REMOTIVE,
    WE_WORK_REMOTELY,
    NEW_GRAD_JOBS,
    GREENHOUSE,
];

const USER_AGENT: &str = "Mozilla/5.0 (AutoJobScout/1.0)";

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to build source: {0}")]
    Build(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status {status} from {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to parse response: {0}")]
    Parse(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

pub type SourceResult<T> = Result<T, SourceError>;

/// A listing source that produces raw postings.
#[async_trait]
pub trait JobSource: Send + Sync {
    /// Name recorded in every posting this source produces.
    fn name(&self) -> &str;

    /// Fetches at most `limit` raw postings.
    async fn fetch(&self, limit: usize) -> SourceResult<Vec<RawPosting>>;
}

/// Builds the HTTP client shared by all sources.
pub fn build_reqwest_client(timeout: Duration) -> SourceResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| SourceError::Build(e.to_string()))
}

/// GETs `url` and returns the body, treating non-success statuses as errors.
pub(crate) async fn fetch_text(client: &reqwest::Client, url: &str) -> SourceResult<String> {
    let res = client.get(url).send().await?;
    if !res.status().is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: res.status(),
        });
    }
    Ok(res.text().await?)
}

/// Text under `root` outside `script`, `style` and `noscript`, with
/// whitespace collapsed.
pub(crate) fn visible_text(root: ElementRef<'_>) -> String {
    let mut words = Vec::new();

    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| matches!(e.name(), "script" | "style" | "noscript"))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }

    words.join(" ")
}

/// Visible text of an HTML fragment with entities decoded.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    visible_text(fragment.root_element())
}

/// Returns the priority position of a source name, ignoring case.
pub fn source_priority(name: &str) -> Option<usize> {
    SOURCE_PRIORITY
        .iter()
        .position(|source| source.eq_ignore_ascii_case(name))
}

/// Instantiates every known source in priority order.
pub fn build_sources(client: &reqwest::Client) -> Vec<Box<dyn JobSource>> {
    vec![
        Box::new(remoteok::RemoteOkSource::new(client.clone())),
        Box::new(remotive::RemotiveSource::new(client.clone())),
        Box::new(weworkremotely::WeWorkRemotelySource::new(client.clone())),
        Box::new(newgrad::NewGradJobsSource::new(client.clone())),
        Box::new(greenhouse::GreenhouseSource::new(client.clone())),
    ]
}
