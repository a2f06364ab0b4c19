//! Remote code execution jobs
//!
//! Every execution follows the same shape: submit the code, receive an opaque
//! job id, then poll the matching result endpoint on a fixed interval until
//! the job reports a terminal status or the attempt budget runs out. The three
//! call sites (playground, problem run, problem submit) differ only in their
//! endpoints, payloads and cadence, captured by [`JobTarget`].

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::types::{ApiRequest, JobSubmitted};
use crate::api::ApiClient;
use crate::config::{PollSettings, PollingConfig};
use crate::errors::{ApiError, JobError};

pub mod report;
pub mod types;

use types::{ExecutionJob, JobStatus, ProblemRunEnvelope, SubmissionEnvelope};

/// Where a job is submitted and how its result is fetched.
#[derive(Debug, Clone, PartialEq)]
pub enum JobTarget {
    /// Free-form code from the playground or a lesson example
    Playground { code: String },
    /// Run against the student's own test inputs
    ProblemRun {
        problem_id: u64,
        code: String,
        inputs: Vec<String>,
    },
    /// Graded submission against the hidden test set
    Submit {
        problem_id: u64,
        code: String,
        user_id: Option<i64>,
        lesson_id: Option<u64>,
    },
}

impl JobTarget {
    pub fn name(&self) -> &'static str {
        match self {
            JobTarget::Playground { .. } => "playground",
            JobTarget::ProblemRun { .. } => "problem-run",
            JobTarget::Submit { .. } => "submit",
        }
    }

    pub fn poll_settings(&self, polling: &PollingConfig) -> PollSettings {
        match self {
            JobTarget::Playground { .. } => polling.playground,
            JobTarget::ProblemRun { .. } => polling.problem,
            JobTarget::Submit { .. } => polling.submit,
        }
    }

    pub fn submit_request(&self, api_base: &str) -> ApiRequest {
        match self {
            JobTarget::Playground { code } => ApiRequest::post(format!("{}/api/examples/run", api_base))
                .json(serde_json::json!({ "code": code })),
            JobTarget::ProblemRun {
                problem_id,
                code,
                inputs,
            } => {
                let test_cases: Vec<_> = inputs
                    .iter()
                    .enumerate()
                    .map(|(idx, input)| serde_json::json!({ "id": idx + 1, "input": input }))
                    .collect();
                ApiRequest::post(format!("{}/api/problems/{}/run-user-code", api_base, problem_id))
                    .json(serde_json::json!({ "userCode": code, "testCases": test_cases }))
            }
            JobTarget::Submit {
                problem_id,
                code,
                user_id,
                ..
            } => ApiRequest::post(format!("{}/api/problems/{}/submit", api_base, problem_id))
                .json(serde_json::json!({ "userCode": code, "userId": user_id })),
        }
    }

    pub fn poll_request(&self, api_base: &str, job_id: &str, elapsed_secs: f64) -> ApiRequest {
        match self {
            JobTarget::Playground { .. } => {
                ApiRequest::get(format!("{}/api/examples/result/{}", api_base, job_id))
                    .query("timeTaken", elapsed_secs)
            }
            JobTarget::ProblemRun { problem_id, .. } => {
                ApiRequest::get(format!("{}/api/problems/result-problem/{}", api_base, job_id))
                    .query("timeTaken", elapsed_secs)
                    .header("problem-id", problem_id)
            }
            JobTarget::Submit {
                problem_id,
                lesson_id,
                ..
            } => {
                let request =
                    ApiRequest::get(format!("{}/api/problems/result-submit/{}", api_base, job_id))
                        .query("timeTaken", elapsed_secs)
                        .header("problem-id", problem_id);
                match lesson_id {
                    Some(lesson) => request.header("lesson-id", lesson),
                    None => request,
                }
            }
        }
    }
}

/// Transport for job submission and polling.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Submit the job and return its id.
    async fn submit(&self, target: &JobTarget) -> Result<String>;

    /// Fetch the current result document for `job_id`.
    async fn poll(&self, target: &JobTarget, job_id: &str, elapsed_secs: f64) -> Result<serde_json::Value>;
}

#[async_trait]
impl JobBackend for ApiClient {
    async fn submit(&self, target: &JobTarget) -> Result<String> {
        let request = target.submit_request(self.config().api_base());
        let submitted: JobSubmitted = self.send_json(&request).await?;
        submitted
            .job_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| JobError::MissingJobId.into())
    }

    async fn poll(&self, target: &JobTarget, job_id: &str, elapsed_secs: f64) -> Result<serde_json::Value> {
        let request = target.poll_request(self.config().api_base(), job_id, elapsed_secs);
        self.send_json(&request).await
    }
}

#[async_trait]
impl<B: JobBackend + ?Sized> JobBackend for Arc<B> {
    async fn submit(&self, target: &JobTarget) -> Result<String> {
        (**self).submit(target).await
    }

    async fn poll(&self, target: &JobTarget, job_id: &str, elapsed_secs: f64) -> Result<serde_json::Value> {
        (**self).poll(target, job_id, elapsed_secs).await
    }
}

/// A poll result document that reports a job status.
pub trait PollResponse: DeserializeOwned + Send {
    fn job_status(&self) -> JobStatus;

    /// Error text reported with a failed status.
    fn failure_message(&self) -> Option<String> {
        None
    }
}

impl PollResponse for ExecutionJob {
    fn job_status(&self) -> JobStatus {
        self.status
    }

    fn failure_message(&self) -> Option<String> {
        self.error.clone().filter(|e| !e.trim().is_empty())
    }
}

impl PollResponse for ProblemRunEnvelope {
    fn job_status(&self) -> JobStatus {
        self.result
            .as_ref()
            .map(|job| job.status)
            .unwrap_or_default()
    }

    fn failure_message(&self) -> Option<String> {
        self.result.as_ref().and_then(|job| job.failure_message())
    }
}

impl PollResponse for SubmissionEnvelope {
    fn job_status(&self) -> JobStatus {
        match &self.result {
            Some(result) if result.submission.is_some() => JobStatus::Finished,
            _ => JobStatus::Pending,
        }
    }
}

/// How a job run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome<T> {
    Finished(T),
    Failed(T),
    /// The attempt budget ran out without a terminal status
    TimedOut { attempts: u32, last: Option<T> },
    /// A newer action superseded this one, or the user interrupted it
    Cancelled,
}

impl<T> JobOutcome<T> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobOutcome::Finished(_) | JobOutcome::Failed(_))
    }
}

impl<T: PollResponse> JobOutcome<T> {
    /// The finished response, or why there is none.
    pub fn into_result(self) -> Result<T> {
        match self {
            JobOutcome::Finished(t) => Ok(t),
            JobOutcome::Failed(t) => Err(JobError::Failed(
                t.failure_message().unwrap_or_else(|| "no error output".to_string()),
            )
            .into()),
            JobOutcome::TimedOut { attempts, .. } => Err(JobError::TimedOut { attempts }.into()),
            JobOutcome::Cancelled => Err(JobError::Cancelled.into()),
        }
    }
}

/// Seconds elapsed since the user action started, as sent in `timeTaken`.
#[derive(Debug, Clone)]
pub struct ActionClock {
    start: Instant,
    last: f64,
}

impl ActionClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            last: 0.0,
        }
    }

    /// Elapsed seconds at millisecond resolution. Never decreases.
    pub fn elapsed_secs(&mut self) -> f64 {
        let now = self.start.elapsed().as_millis() as f64 / 1000.0;
        if now > self.last {
            self.last = now;
        }
        self.last
    }
}

impl Default for ActionClock {
    fn default() -> Self {
        Self::start()
    }
}

/// Tracks observed job status; a terminal status never reverts.
#[derive(Debug, Clone, Copy, Default)]
pub struct JobTracker {
    status: JobStatus,
    polls: u32,
}

impl JobTracker {
    pub fn observe(&mut self, status: JobStatus) -> JobStatus {
        self.polls += 1;
        if !self.status.is_terminal() {
            self.status = status;
        }
        self.status
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }
}

/// Single-flight guard keyed by logical action.
///
/// Beginning an action under a key cancels whatever was running under that
/// key, so only the latest run or submit for a page keeps polling.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    active: Arc<Mutex<HashMap<String, (u64, CancellationToken)>>>,
    generation: Arc<AtomicU64>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, key: &str) -> ActionTicket {
        self.register(key, CancellationToken::new())
    }

    /// Begin an action that is also cancelled when `parent` is.
    pub fn begin_child(&self, key: &str, parent: &CancellationToken) -> ActionTicket {
        self.register(key, parent.child_token())
    }

    fn register(&self, key: &str, token: CancellationToken) -> ActionTicket {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let previous = self
            .active
            .lock()
            .insert(key.to_string(), (generation, token.clone()));
        if let Some((_, old)) = previous {
            debug!(key, "Superseding running action");
            old.cancel();
        }
        ActionTicket {
            key: key.to_string(),
            generation,
            token,
            registry: self.clone(),
        }
    }

    pub fn is_active(&self, key: &str) -> bool {
        self.active.lock().contains_key(key)
    }

}

/// Handle for one running action. Dropping it unregisters the action.
#[derive(Debug)]
pub struct ActionTicket {
    key: String,
    generation: u64,
    token: CancellationToken,
    registry: ActionRegistry,
}

impl ActionTicket {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for ActionTicket {
    fn drop(&mut self) {
        let mut active = self.registry.active.lock();
        if matches!(active.get(&self.key), Some((generation, _)) if *generation == self.generation) {
            active.remove(&self.key);
        }
    }
}

/// Submits jobs and polls them to completion.
pub struct JobExecutor<B> {
    backend: B,
    polling: PollingConfig,
}

impl<B: JobBackend> JobExecutor<B> {
    pub fn new(backend: B, polling: PollingConfig) -> Self {
        Self { backend, polling }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run `target` to a terminal status, a timeout, or cancellation.
    ///
    /// Sleeps one interval before every poll. Each poll carries the elapsed
    /// time from `clock`.
    pub async fn execute<T: PollResponse>(
        &self,
        target: &JobTarget,
        clock: &mut ActionClock,
        cancel: &CancellationToken,
    ) -> Result<JobOutcome<T>> {
        let settings = target.poll_settings(&self.polling);

        let job_id = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(JobOutcome::Cancelled),
            submitted = self.backend.submit(target) => submitted?,
        };
        info!(kind = target.name(), job_id = job_id.as_str(), "Job submitted");

        let mut tracker = JobTracker::default();
        let mut last = None;

        for attempt in 1..=settings.max_attempts {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(attempt, "Job polling cancelled");
                    return Ok(JobOutcome::Cancelled);
                }
                _ = tokio::time::sleep(settings.interval()) => {}
            }

            let elapsed = clock.elapsed_secs();
            let raw = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(JobOutcome::Cancelled),
                polled = self.backend.poll(target, &job_id, elapsed) => polled?,
            };
            let response: T = serde_json::from_value(raw)
                .map_err(|e| ApiError::Parse(format!("job result: {}", e)))?;

            let status = tracker.observe(response.job_status());
            debug!(attempt, ?status, elapsed, "Polled job");
            match status {
                JobStatus::Finished => {
                    info!(job_id = job_id.as_str(), polls = tracker.polls(), "Job finished");
                    return Ok(JobOutcome::Finished(response));
                }
                JobStatus::Failed => {
                    warn!(job_id = job_id.as_str(), polls = tracker.polls(), "Job failed");
                    return Ok(JobOutcome::Failed(response));
                }
                JobStatus::Pending => last = Some(response),
            }
        }

        warn!(
            job_id = job_id.as_str(),
            attempts = settings.max_attempts,
            "Timed out waiting for job result"
        );
        Ok(JobOutcome::TimedOut {
            attempts: settings.max_attempts,
            last,
        })
    }
}
