use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;

use crate::crawlers::{JobSource, SourceResult, WE_WORK_REMOTELY, fetch_text, html_to_text};
use crate::domain::posting::RawPosting;

const FEEDS: [&str; 3] = [
    "https://weworkremotely.com/categories/remote-programming-jobs.rss",
    "https://weworkremotely.com/categories/remote-data-jobs.rss",
    "https://weworkremotely.com/categories/remote-devops-sysadmin-jobs.rss",
];

static ITEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<item>(.*?)</item>").unwrap());
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| element_pattern("title"));
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| element_pattern("link"));
static DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| element_pattern("description"));

/// Matches a `<tag>` element, capturing its text with any CDATA wrapper removed.
fn element_pattern(tag: &str) -> Regex {
    Regex::new(&format!(
        r"(?s)<{tag}>\s*(?:<!\[CDATA\[)?(.*?)(?:\]\]>)?\s*</{tag}>"
    ))
    .unwrap()
}

/// Extracts the text of the first element matched by `re`.
fn element_text(item: &str, re: &Regex) -> Option<String> {
    re.captures(item)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Splits titles of the form `Company: Role`.
fn split_title(title: &str) -> (String, String) {
    match title.split_once(':') {
        Some((company, role)) => (company.trim().to_string(), role.trim().to_string()),
        None => (String::new(), title.trim().to_string()),
    }
}

fn parse_feed(body: &str, limit: usize) -> Vec<RawPosting> {
    ITEM_RE
        .captures_iter(body)
        .filter_map(|c| c.get(1))
        .take(limit)
        .map(|item| {
            let item = item.as_str();
            let raw_title = element_text(item, &TITLE_RE).unwrap_or_default();
            let (company, title) = split_title(&html_escape::decode_html_entities(&raw_title));
            let description = element_text(item, &DESCRIPTION_RE)
                .map(|d| html_to_text(&html_escape::decode_html_entities(&d)));
            RawPosting {
                title: Some(title),
                company: Some(if company.is_empty() {
                    "Unknown".to_string()
                } else {
                    company
                }),
                location: Some("Remote".to_string()),
                description,
                tags: None,
                url: element_text(item, &LINK_RE),
            }
        })
        .collect()
}

/// Source backed by the WeWorkRemotely category RSS feeds.
pub struct WeWorkRemotelySource {
    client: reqwest::Client,
}

impl WeWorkRemotelySource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobSource for WeWorkRemotelySource {
    fn name(&self) -> &str {
        WE_WORK_REMOTELY
    }

    /// Reads the feeds in order until `limit` postings are collected. A
    /// failing feed is logged and skipped unless every feed fails.
    async fn fetch(&self, limit: usize) -> SourceResult<Vec<RawPosting>> {
        let mut postings = Vec::new();
        let mut last_error = None;
        let mut any_ok = false;

        for feed in FEEDS {
            if postings.len() >= limit {
                break;
            }
            match fetch_text(&self.client, feed).await {
                Ok(body) => {
                    any_ok = true;
                    postings.extend(parse_feed(&body, limit - postings.len()));
                }
                Err(e) => {
                    log::warn!("Failed to read feed {feed}: {e}");
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

#[cfg(test)]
mod tests {
    use super::{parse_feed, split_title};

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
  <title>We Work Remotely</title>
  <item>
    <title><![CDATA[Acme Corp: Senior Rust Engineer]]></title>
    <link>https://weworkremotely.com/remote-jobs/acme-rust</link>
    <description><![CDATA[<p>Ship &amp; maintain services</p>]]></description>
  </item>
  <item>
    <title>Platform Engineer</title>
    <link>https://weworkremotely.com/remote-jobs/platform</link>
    <description>&lt;p&gt;Kubernetes&lt;/p&gt;</description>
  </item>
</channel></rss>"#;

    #[test]
    fn parse_feed_splits_company_from_title() {
        let postings = parse_feed(FEED, 10);

        assert_eq!(postings.len(), 2);
        assert_eq!(postings[0].company.as_deref(), Some("Acme Corp"));
        assert_eq!(postings[0].title.as_deref(), Some("Senior Rust Engineer"));
        assert_eq!(
            postings[0].url.as_deref(),
            Some("https://weworkremotely.com/remote-jobs/acme-rust")
        );
        assert_eq!(postings[0].description.as_deref(), Some("Ship & maintain services"));
        assert_eq!(postings[1].company.as_deref(), Some("Unknown"));
        assert_eq!(postings[1].description.as_deref(), Some("Kubernetes"));
    }

    #[test]
    fn parse_feed_respects_limit() {
        assert_eq!(parse_feed(FEED, 1).len(), 1);
    }

    #[test]
    fn split_title_without_company() {
        assert_eq!(
            split_title("Backend Developer"),
            (String::new(), "Backend Developer".to_string())
        );
    }
}
