//! Plain-text rendering of job results.

use rand::seq::IndexedRandom;

use super::types::{ExecutionJob, ProblemRunEnvelope, SubmissionResult, TestCaseResult, TutorAction};
use super::JobOutcome;

pub const NO_OUTPUT: &str = "No output produced.";
pub const TIMED_OUT: &str = "Timed out waiting for result.";
pub const CANCELLED: &str = "Cancelled.";
pub const HINT_MESSAGE: &str = "Stuck? Open AI assistant to get hint.";

pub const MOTIVATION_MESSAGES: [&str; 4] = [
    "Keep going, you're doing great!",
    "Don't give up, every attempt is progress!",
    "Remember, every coder was once a beginner.",
    "You're closer than you think!",
];

pub fn format_test_case(result: &TestCaseResult) -> String {
    let mut out = format!(
        "Testcase {}: {}\n",
        result.id.as_deref().unwrap_or("?"),
        if result.passed { "✅ Passed" } else { "❌ Failed" }
    );
    if let Some(err) = result.user_error.as_deref().filter(|e| !e.is_empty()) {
        out.push_str(&format!("User Error: {}\n", err));
    }
    if let Some(err) = result.solution_error.as_deref().filter(|e| !e.is_empty()) {
        out.push_str(&format!("Solution Error: {}\n", err));
    }
    out.push_str(&format!(
        "Input: {}\nExpected: {}\nYour Output: {}\n",
        result.input, result.solution_output, result.user_output
    ));
    out
}

pub fn format_test_cases(results: &[TestCaseResult]) -> String {
    results
        .iter()
        .map(format_test_case)
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

/// Output of a finished job, falling back to its error text.
fn finished_output(job: &ExecutionJob) -> String {
    non_empty(&job.output)
        .or_else(|| non_empty(&job.error))
        .unwrap_or(NO_OUTPUT)
        .to_string()
}

pub fn render_playground(outcome: &JobOutcome<ExecutionJob>) -> String {
    match outcome {
        JobOutcome::Finished(job) => finished_output(job),
        JobOutcome::Failed(job) => format!("Error: {}", non_empty(&job.error).unwrap_or("Job failed")),
        JobOutcome::TimedOut { .. } => TIMED_OUT.to_string(),
        JobOutcome::Cancelled => CANCELLED.to_string(),
    }
}

pub fn render_problem_run(outcome: &JobOutcome<ProblemRunEnvelope>) -> String {
    let job = match outcome {
        JobOutcome::Finished(env) | JobOutcome::Failed(env) => env.result.as_ref(),
        JobOutcome::TimedOut { .. } => return TIMED_OUT.to_string(),
        JobOutcome::Cancelled => return CANCELLED.to_string(),
    };
    let Some(job) = job else {
        return NO_OUTPUT.to_string();
    };

    if let JobOutcome::Failed(_) = outcome {
        return format!("Error: {}", non_empty(&job.error).unwrap_or("Unknown error"));
    }
    match job.results.as_deref() {
        Some(results) if !results.is_empty() => format_test_cases(results),
        _ => finished_output(job),
    }
}

/// Multi-line summary of a graded submission.
pub fn render_submission(result: &SubmissionResult) -> String {
    let mut lines = Vec::new();
    let verdict = if result.passed_test_cases == result.total_test_cases {
        "Accepted"
    } else {
        "Wrong Answer"
    };
    lines.push(verdict.to_string());
    lines.push(format!(
        "Passed {} / {} test cases",
        result.passed_test_cases, result.total_test_cases
    ));

    if let Some(details) = &result.submission {
        lines.push(format!(
            "Runtime: {}  Memory: {}",
            format_measure(details.runtime.as_ref(), "s", 3),
            format_measure(details.memory.as_ref(), "MB", 2)
        ));
        if let Some(at) = details.submitted_at.as_deref() {
            lines.push(format!("Submitted at {}", at));
        }
    }

    if result.passed_test_cases != result.total_test_cases {
        if let Some(failed) = &result.failed_test_case {
            lines.push("First Failed Testcase:".to_string());
            lines.push(format!("Input: {}", failed.input));
            lines.push(format!("Expected: {}", failed.solution_output));
            lines.push(format!("Your Output: {}", failed.user_output));
            if let Some(err) = non_empty(&failed.user_error) {
                lines.push(format!("Error: {}", err));
            }
        }
    }

    if let Some(feedback) = result
        .submission
        .as_ref()
        .and_then(|s| non_empty(&s.feedback))
    {
        lines.push(String::new());
        lines.push("AI Feedback".to_string());
        lines.push(feedback.to_string());
    }

    if let Some(xp) = result.xp_gained.filter(|xp| *xp > 0) {
        lines.push(format!("You gained {} XP! ✨", xp));
    }

    lines.join("\n")
}

fn format_measure(value: Option<&serde_json::Value>, unit: &str, precision: usize) -> String {
    match value {
        Some(serde_json::Value::Number(n)) => match n.as_f64() {
            Some(v) if v != 0.0 => format!("{:.*}{}", precision, v, unit),
            _ => "--".to_string(),
        },
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        _ => "--".to_string(),
    }
}

pub fn motivation_message() -> &'static str {
    MOTIVATION_MESSAGES
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(MOTIVATION_MESSAGES[0])
}

/// What to show the student for a tutor action.
pub fn action_message(action: &TutorAction) -> Option<String> {
    match action {
        TutorAction::GiveHint => Some(HINT_MESSAGE.to_string()),
        TutorAction::ShowMotivation => Some(motivation_message().to_string()),
        TutorAction::IncreaseDifficulty => Some("Great job! Ready for a harder problem?".to_string()),
        TutorAction::DecreaseDifficulty => {
            Some("Need something easier? Go to an easier problem?".to_string())
        }
        TutorAction::Other(_) => None,
    }
}
