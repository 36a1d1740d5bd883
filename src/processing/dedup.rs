use std::collections::HashSet;

use crate::domain::posting::Posting;

/// Keeps the first posting for every identity key, preserving input order.
///
/// Postings with an empty url fall back to lower-cased title and company, so
/// two postings with empty url, title and company collapse into one.
pub fn dedupe_postings<I>(postings: I) -> Vec<Posting>
where
    I: IntoIterator<Item = Posting>,
{
    let mut seen = HashSet::new();
    postings
        .into_iter()
        .filter(|p| seen.insert(p.identity_key()))
        .collect()
}
