use std::str::FromStr;
use serde::Deserialize;

/// Canonical task identifier, caller-assigned and unique within a graph.
pub type TaskId = String;

/// What happens to the rest of a run once a task fails.
///
/// - `BestEffort`: a failed task still releases its dependents; they run and
///   report their own outcome (default behaviour).
/// - `FailFast`: once any task fails, nothing new is started. Tasks already
///   running are allowed to finish; everything else is reported as skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    BestEffort,
    FailFast,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        FailurePolicy::BestEffort
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "best_effort" => Ok(FailurePolicy::BestEffort),
            "fail_fast" => Ok(FailurePolicy::FailFast),
            other => Err(format!(
                "invalid failure_policy: {other} (expected \"best_effort\" or \"fail_fast\")"
            )),
        }
    }
}
