use async_trait::async_trait;
use html_escape::decode_html_entities;
use serde::Deserialize;
use url::Url;

use crate::crawlers::{GREENHOUSE, JobSource, SourceError, SourceResult, fetch_text, html_to_text};
use crate::domain::posting::RawPosting;

const BOARDS_API: &str = "https://boards-api.greenhouse.io/v1/boards/";
const BOARDS: [&str; 5] = ["airbnb", "gitlab", "stripe", "spotify", "dropbox"];

#[derive(Debug, Deserialize)]
struct BoardResponse {
    #[serde(default)]
    jobs: Vec<BoardJob>,
}

#[derive(Debug, Deserialize)]
struct BoardJob {
    title: Option<String>,
    absolute_url: Option<String>,
    location: Option<BoardLocation>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoardLocation {
    name: Option<String>,
}

/// Source aggregating a fixed list of Greenhouse-hosted company boards.
pub struct GreenhouseSource {
    client: reqwest::Client,
    api_base: String,
    boards: Vec<String>,
}

impl GreenhouseSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            api_base: BOARDS_API.to_string(),
            boards: BOARDS.iter().map(|b| b.to_string()).collect(),
        }
    }

    fn board_url(&self, board: &str) -> SourceResult<Url> {
        let mut url = Url::parse(&self.api_base)
            .and_then(|base| base.join(&format!("{board}/jobs")))
            .map_err(|e| SourceError::Build(e.to_string()))?;
        url.query_pairs_mut().append_pair("content", "true");
        Ok(url)
    }
}

fn company_name(board: &str) -> String {
    let mut chars = board.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn parse_board(body: &str, board: &str, limit: usize) -> SourceResult<Vec<RawPosting>> {
    let response: BoardResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Parse(e.to_string()))?;
    let company = company_name(board);

    Ok(response
        .jobs
        .into_iter()
        .take(limit)
        .map(|job| RawPosting {
            title: job.title,
            company: Some(company.clone()),
            location: job
                .location
                .and_then(|l| l.name)
                .or_else(|| Some("Remote".to_string())),
            // Board content is entity-escaped HTML.
            description: job
                .content
                .map(|c| html_to_text(&decode_html_entities(&c))),
            tags: Some(vec!["greenhouse".to_string()]),
            url: job.absolute_url,
        })
        .collect())
}

#[async_trait]
impl JobSource for GreenhouseSource {
    fn name(&self) -> &str {
        GREENHOUSE
    }

    /// Reads the boards in order until `limit` postings are collected. A
    /// failing board is logged and skipped unless every board fails.
    async fn fetch(&self, limit: usize) -> SourceResult<Vec<RawPosting>> {
        let mut postings = Vec::new();
        let mut last_error = None;
        let mut any_ok = false;

        for board in &self.boards {
            if postings.len() >= limit {
                break;
            }
            let url = self.board_url(board)?;
            let result = match fetch_text(&self.client, url.as_str()).await {
                Ok(body) => parse_board(&body, board, limit - postings.len()),
                Err(e) => Err(e),
            };
            match result {
                Ok(jobs) => {
                    any_ok = true;
                    postings.extend(jobs);
                }
                Err(e) => {
                    log::error!("Failed to fetch Greenhouse board {board}: {e}");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !any_ok => Err(e),
            _ => Ok(postings),
        }
    }
}
