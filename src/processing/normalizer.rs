//! Mapping from per-source raw records to canonical [`Posting`]s.

use std::collections::BTreeSet;

use crate::domain::posting::{Posting, RawPosting, posting_id};

fn field(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

/// Converts a raw record into a [`Posting`] attributed to `source`.
///
/// Missing fields become empty strings and missing tags an empty set, so a
/// record without a title still yields a posting.
pub fn normalize_posting(source: &str, raw: RawPosting) -> Posting {
    let title = field(raw.title);
    let company = field(raw.company);
    let url = field(raw.url);
    let tags: BTreeSet<String> = raw
        .tags
        .unwrap_or_default()
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    Posting {
        id: posting_id(&title, &company, &url),
        title,
        company,
        location: field(raw.location),
        description: field(raw.description),
        tags,
        url,
        source: source.to_string(),
    }
}

pub fn normalize_postings<I>(source: &str, raws: I) -> Vec<Posting>
where
    I: IntoIterator<Item = RawPosting>,
{
    raws.into_iter()
        .map(|raw| normalize_posting(source, raw))
        .collect()
}
