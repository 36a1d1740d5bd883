use std::sync::LazyLock;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::crawlers::{JobSource, NEW_GRAD_JOBS, SourceResult, fetch_text};
use crate::domain::posting::RawPosting;

const BASE_URL: &str = "https://www.newgrad-jobs.com";

static LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href^='http']").unwrap());

/// Source scraping the outbound job links listed on newgrad-jobs.com.
pub struct NewGradJobsSource {
    client: reqwest::Client,
}

impl NewGradJobsSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

/// Splits link texts of the form `Company - Role`.
fn split_link_text(text: &str) -> (String, String) {
    match text.split_once(" - ") {
        Some((company, role)) => (company.trim().to_string(), role.trim().to_string()),
        None => ("Unknown".to_string(), text.to_string()),
    }
}

fn parse_listing(body: &str, limit: usize) -> Vec<RawPosting> {
    let document = Html::parse_document(body);

    document
        .select(&LINK_SELECTOR)
        .filter_map(|link| {
            let href = link.value().attr("href")?.trim();
            let text = link
                .text()
                .flat_map(str::split_whitespace)
                .collect::<Vec<_>>()
                .join(" ");
            if href.is_empty() || text.is_empty() {
                return None;
            }
            let (company, title) = split_link_text(&text);
            Some(RawPosting {
                title: Some(title),
                company: Some(company),
                location: Some("Unknown".to_string()),
                description: None,
                tags: Some(vec!["new-grad".to_string()]),
                url: Some(href.to_string()),
            })
        })
        .take(limit)
        .collect()
}

#[async_trait]
impl JobSource for NewGradJobsSource {
    fn name(&self) -> &str {
        NEW_GRAD_JOBS
    }

    async fn fetch(&self, limit: usize) -> SourceResult<Vec<RawPosting>> {
        let body = fetch_text(&self.client, BASE_URL).await?;
        Ok(parse_listing(&body, limit))
    }
}
