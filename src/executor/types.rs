use serde::{Deserialize, Deserializer, Serialize};

use crate::session::string_or_number;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Finished,
    Failed,
    #[default]
    #[serde(other)]
    Pending,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Failed)
    }
}

/// Anything other than a recognized status string, `null` included, is still pending.
fn status_or_pending<'de, D>(deserializer: D) -> std::result::Result<JobStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => match s.as_str() {
            "finished" => JobStatus::Finished,
            "failed" => JobStatus::Failed,
            _ => JobStatus::Pending,
        },
        _ => JobStatus::Pending,
    })
}

/// State of a remote execution job as reported by a poll.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionJob {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default, deserialize_with = "status_or_pending")]
    pub status: JobStatus,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub results: Option<Vec<TestCaseResult>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub passed: bool,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub solution_output: String,
    #[serde(default)]
    pub user_output: String,
    #[serde(default)]
    pub user_error: Option<String>,
    #[serde(default)]
    pub solution_error: Option<String>,
}

/// Follow-up the tutor attaches to a problem run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TutorAction {
    GiveHint,
    ShowMotivation,
    IncreaseDifficulty,
    DecreaseDifficulty,
    #[serde(untagged)]
    Other(String),
}

impl TutorAction {
    /// Whether the action offers the student a different problem.
    pub fn offers_next_problem(&self) -> bool {
        matches!(
            self,
            TutorAction::IncreaseDifficulty | TutorAction::DecreaseDifficulty
        )
    }
}

/// Poll response of `/api/problems/result-problem/{job}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemRunEnvelope {
    #[serde(default)]
    pub result: Option<ExecutionJob>,
    #[serde(default)]
    pub action: Option<TutorAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionDetails {
    #[serde(default)]
    pub runtime: Option<serde_json::Value>,
    #[serde(default)]
    pub memory: Option<serde_json::Value>,
    #[serde(default, rename = "submittedAt")]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    #[serde(default)]
    pub submission: Option<SubmissionDetails>,
    #[serde(default)]
    pub total_test_cases: u32,
    #[serde(default)]
    pub passed_test_cases: u32,
    #[serde(default)]
    pub failed_test_case: Option<TestCaseResult>,
    #[serde(default)]
    pub xp_gained: Option<i64>,
}

impl SubmissionResult {
    pub fn accepted(&self) -> bool {
        self.submission.is_some()
            && self.total_test_cases > 0
            && self.passed_test_cases == self.total_test_cases
    }
}

/// Poll response of `/api/problems/result-submit/{job}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubmissionEnvelope {
    #[serde(default)]
    pub result: Option<SubmissionResult>,
}
