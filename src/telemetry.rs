//! Telemetry & Observability
//!
//! Structured logging for user actions (ask, run, submit).
//! - Action spans with timing and outcome
//! - Configurable log levels via RUST_LOG
//! - Optional JSON output (`CODETUTOR_LOG_FORMAT=json`)
//! - Secret redaction for tokens and passwords

use regex::Regex;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Sanitize a string for safe log output by escaping control characters.
/// Prevents log injection where server text embeds newlines to forge log entries.
pub fn sanitize_for_log(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x1b' => out.push_str("\\e"),
            '\x00' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            _ => out.push(c),
        }
    }
    out
}

static SECRET_PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();

fn secret_patterns() -> &'static Vec<Regex> {
    SECRET_PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?i)Bearer\s+[A-Za-z0-9_\-\.]{8,}").expect("invalid bearer regex"),
            Regex::new(r"(?i)(refreshToken)=[^&\s]+").expect("invalid refresh regex"),
            Regex::new(r#"(?i)"?(password|passwd|pwd)"?\s*[:=]\s*"?[^"&\s,}]+"?"#)
                .expect("invalid password regex"),
        ]
    })
}

/// Redact bearer tokens, refresh tokens in query strings and passwords.
pub fn redact_secrets(input: &str) -> String {
    let mut result = input.to_string();
    for pattern in secret_patterns() {
        result = pattern.replace_all(&result, "[REDACTED]").to_string();
    }
    result
}

/// Initialize global tracing subscriber.
/// Stays silent unless RUST_LOG is set, so CLI output is not polluted.
pub fn init_tracing() {
    if let Ok(filter) = std::env::var("RUST_LOG") {
        init_tracing_with_filter(&filter);
    }
}

/// Initialize tracing for --verbose
pub fn init_tracing_verbose() {
    init_tracing_with_filter("codetutor=debug,info")
}

/// Initialize with custom filter string
pub fn init_tracing_with_filter(filter: &str) {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let filter_layer = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
        let json = std::env::var("CODETUTOR_LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if json {
            let _ = tracing_subscriber::registry()
                .with(filter_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .try_init();
        } else {
            let _ = tracing_subscriber::registry()
                .with(filter_layer)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_target(false)
                        .with_level(true)
                        .compact()
                        .with_writer(std::io::stderr),
                )
                .try_init();
        }
    });
}

/// Run one user action inside a span, logging duration and outcome.
pub async fn track_action<F, Fut, T, E>(action: &str, f: F) -> Result<T, E>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let start = Instant::now();
    let span = info_span!(
        "action",
        name = sanitize_for_log(action).as_str(),
        duration_ms = tracing::field::Empty,
        success = tracing::field::Empty,
    );
    match f().instrument(span.clone()).await {
        Ok(result) => {
            let duration = start.elapsed().as_millis() as u64;
            span.record("duration_ms", duration);
            span.record("success", true);
            span.in_scope(|| info!(duration_ms = duration, "Action completed"));
            Ok(result)
        }
        Err(e) => {
            let duration = start.elapsed().as_millis() as u64;
            let safe_err = redact_secrets(&sanitize_for_log(&e.to_string()));
            span.record("duration_ms", duration);
            span.record("success", false);
            span.in_scope(|| {
                error!(duration_ms = duration, error = safe_err.as_str(), "Action failed")
            });
            Err(e)
        }
    }
}

#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
