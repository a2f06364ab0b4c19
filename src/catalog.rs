//! Read-only catalog lookups used by the execution flows.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::types::ApiRequest;
use crate::api::ApiClient;
use crate::session::string_or_number;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub expected_output: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub starter_code: Option<String>,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
}

impl Problem {
    pub fn inputs(&self) -> Vec<String> {
        self.test_cases.iter().map(|tc| tc.input.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Example {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: u64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub runtime: Option<serde_json::Value>,
    #[serde(default)]
    pub memory: Option<serde_json::Value>,
    #[serde(default)]
    pub submitted_at: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl ApiClient {
    pub async fn problem(&self, id: u64) -> Result<Problem> {
        self.send_json(&ApiRequest::get(self.api_url(&format!("/api/problems/{}", id))))
            .await
            .with_context(|| format!("Failed to load problem {}", id))
    }

    /// The practice problem attached to a lesson.
    pub async fn problem_for_lesson(&self, lesson_id: u64) -> Result<Problem> {
        self.send_json(&ApiRequest::get(
            self.api_url(&format!("/api/problems/by-lesson/{}", lesson_id)),
        ))
        .await
        .with_context(|| format!("Failed to load problem for lesson {}", lesson_id))
    }

    pub async fn example(&self, id: u64) -> Result<Example> {
        self.send_json(&ApiRequest::get(self.api_url(&format!("/api/examples/{}", id))))
            .await
            .with_context(|| format!("Failed to load example {}", id))
    }

    pub async fn submissions(&self, problem_id: u64) -> Result<Vec<Submission>> {
        self.send_json(
            &ApiRequest::get(self.api_url("/api/submissions")).query("problemId", problem_id),
        )
        .await
        .with_context(|| format!("Failed to load submissions for problem {}", problem_id))
    }
}
