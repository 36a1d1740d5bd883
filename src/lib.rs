pub mod crawlers;
pub mod domain;
pub mod models;
pub mod processing;
pub mod repository;

/// Number of matches returned when a request does not say.
pub const DEFAULT_TOP_K: usize = 10;

/// Per-source posting limit when a request does not say.
pub const DEFAULT_FETCH_LIMIT: usize = 100;

/// Descriptions shorter than this are replaced during enrichment.
pub const ENRICH_MIN_CHARS: usize = 200;

/// Enriched descriptions are truncated to this many characters.
pub const ENRICH_MAX_CHARS: usize = 6000;
