use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Number of hex characters kept from the content hash.
const POSTING_ID_LEN: usize = 16;

/// A record as produced by a source adapter, before normalization.
///
/// Every field is optional; adapters fill in what the listing provides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPosting {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub url: Option<String>,
}

/// Canonical job listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    pub tags: BTreeSet<String>,
    pub url: String,
    pub source: String,
}

/// Key used to decide that two postings describe the same listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdentityKey {
    Url(String),
    TitleCompany(String, String),
}

impl Posting {
    /// Builds a posting and derives its `id` from title, company and url.
    pub fn new(
        title: impl Into<String>,
        company: impl Into<String>,
        location: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let title = title.into();
        let company = company.into();
        let url = url.into();
        Self {
            id: posting_id(&title, &company, &url),
            title,
            company,
            location: location.into(),
            description: description.into(),
            tags: BTreeSet::new(),
            url,
            source: source.into(),
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// The url when present, otherwise the lower-cased title and company.
    pub fn identity_key(&self) -> IdentityKey {
        if self.url.is_empty() {
            IdentityKey::TitleCompany(self.title.to_lowercase(), self.company.to_lowercase())
        } else {
            IdentityKey::Url(self.url.clone())
        }
    }

    /// Text submitted to the embedding model: title, company, location and
    /// description joined by single spaces, in that order.
    pub fn embedding_text(&self) -> String {
        [
            self.title.as_str(),
            self.company.as_str(),
            self.location.as_str(),
            self.description.as_str(),
        ]
        .join(" ")
    }

    /// Replaces the description with a richer one. `id` is unaffected.
    pub fn enrich_description(&mut self, description: String) {
        self.description = description;
    }
}

/// Stable identifier over lower-cased title, lower-cased company and url.
pub fn posting_id(title: &str, company: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.to_lowercase().as_bytes());
    hasher.update([0x1f]);
    hasher.update(company.to_lowercase().as_bytes());
    hasher.update([0x1f]);
    hasher.update(url.as_bytes());
    let mut id = hex::encode(hasher.finalize());
    id.truncate(POSTING_ID_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::{IdentityKey, Posting, posting_id};

    #[test]
    fn posting_id_ignores_title_and_company_case() {
        assert_eq!(
            posting_id("Rust Engineer", "Acme", "https://acme.dev/1"),
            posting_id("rust engineer", "ACME", "https://acme.dev/1"),
        );
        assert_ne!(
            posting_id("Rust Engineer", "Acme", "https://acme.dev/1"),
            posting_id("Rust Engineer", "Acme", "https://acme.dev/2"),
        );
        assert_eq!(posting_id("a", "b", "c").len(), 16);
    }

    #[test]
    fn identity_key_prefers_url() {
        let posting = Posting::new("Eng", "Acme", "", "", "u1", "test");
        assert_eq!(posting.identity_key(), IdentityKey::Url("u1".to_string()));

        let posting = Posting::new("Eng", "Acme", "", "", "", "test");
        assert_eq!(
            posting.identity_key(),
            IdentityKey::TitleCompany("eng".to_string(), "acme".to_string())
        );
    }

    #[test]
    fn embedding_text_joins_fields_in_order() {
        let posting = Posting::new("Eng", "Acme", "Remote", "Build things", "u1", "test");
        assert_eq!(posting.embedding_text(), "Eng Acme Remote Build things");
    }

    #[test]
    fn enrich_keeps_identity() {
        let mut posting = Posting::new("Eng", "Acme", "", "short", "u1", "test");
        let id = posting.id.clone();
        posting.enrich_description("a much longer description".to_string());
        assert_eq!(posting.id, id);
        assert_eq!(posting.description, "a much longer description");
    }
}
