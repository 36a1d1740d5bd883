//! Parsing of pipeline plans produced by an external planner.

use serde::{Deserialize, Serialize};

use crate::DEFAULT_TOP_K;
use crate::crawlers::{REMOTE_OK, REMOTIVE, WE_WORK_REMOTELY, source_priority};
use crate::domain::matching::MatchRequest;

/// How a matching run should be executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPlan {
    pub use_sources: Vec<String>,
    pub fetch_descriptions: bool,
    pub top_k: usize,
    pub run_gap_analysis: bool,
}

impl Default for MatchPlan {
    fn default() -> Self {
        Self {
            use_sources: vec![
                REMOTE_OK.to_string(),
                REMOTIVE.to_string(),
                WE_WORK_REMOTELY.to_string(),
            ],
            fetch_descriptions: true,
            top_k: DEFAULT_TOP_K,
            run_gap_analysis: true,
        }
    }
}

impl MatchPlan {
    pub fn into_request(self, resume_text: String, fetch_limit: usize) -> MatchRequest {
        MatchRequest {
            sources: self.use_sources,
            fetch_limit,
            resume_text,
            top_k: self.top_k,
            fetch_descriptions: self.fetch_descriptions,
        }
    }
}

/// Result of [`parse_plan`], recording whether defaults were substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanOutcome {
    Parsed(MatchPlan),
    Defaulted(MatchPlan, String),
}

impl PlanOutcome {
    pub fn plan(&self) -> &MatchPlan {
        match self {
            PlanOutcome::Parsed(plan) | PlanOutcome::Defaulted(plan, _) => plan,
        }
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, PlanOutcome::Defaulted(..))
    }
}

/// Slice between the first `{` and the last `}`; planners tend to wrap JSON
/// in prose or code fences.
fn json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Parses planner output, falling back to [`MatchPlan::default`] with the
/// reason when the text is not a usable plan.
pub fn parse_plan(text: &str) -> PlanOutcome {
    let Some(json) = json_object(text) else {
        return PlanOutcome::Defaulted(MatchPlan::default(), "no JSON object found".to_string());
    };

    let mut plan: MatchPlan = match serde_json::from_str(json) {
        Ok(plan) => plan,
        Err(e) => {
            return PlanOutcome::Defaulted(MatchPlan::default(), format!("invalid plan: {e}"));
        }
    };

    let requested = plan.use_sources.len();
    plan.use_sources.retain(|s| source_priority(s).is_some());
    if plan.use_sources.is_empty() {
        return PlanOutcome::Defaulted(
            MatchPlan::default(),
            format!("none of the {requested} requested sources are known"),
        );
    }

    PlanOutcome::Parsed(plan)
}
