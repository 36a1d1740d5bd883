use serde::{Deserialize, Serialize};

use crate::DEFAULT_FETCH_LIMIT;
use crate::domain::matching::{MatchReport, MatchRequest};
use crate::processing::planner::PlanOutcome;

pub mod dedup;
pub mod embedding;
pub mod enrich;
pub mod matcher;
pub mod normalizer;
pub mod planner;

fn default_fetch_limit() -> usize {
    DEFAULT_FETCH_LIMIT
}

/// Planner output to be parsed and executed for a resume.
#[derive(Deserialize, Debug)]
pub struct PlanRequest {
    pub plan: String,
    pub resume_text: String,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
}

#[derive(Deserialize, Debug)]
pub enum ZMQMessage {
    Match(MatchRequest),
    Plan(PlanRequest),
}

#[derive(Serialize, Debug)]
pub enum ZMQResponse {
    Ok(MatchReport),
    Planned {
        outcome: PlanOutcome,
        report: MatchReport,
    },
    Error {
        reason: String,
    },
}
