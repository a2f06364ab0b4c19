use thiserror::Error;

/// The central error type for the tutor client.
///
/// Transport, authentication and job-execution failures each get their own
/// enum so callers can downcast an `anyhow::Error` and recover programmatically.
#[derive(Error, Debug)]
pub enum TutorError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API request timed out")]
    Timeout,

    #[error("API returned status {status}: {message}")]
    HttpStatus { status: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ApiError {
    /// Classify a transport-level reqwest failure.
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Parse(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not signed in. Run `codetutor signin` first.")]
    NotSignedIn,

    #[error("Session expired. Please sign in again.")]
    SessionExpired,

    #[error("Sign in rejected: {0}")]
    Rejected(String),

    #[error("Passwords do not match.")]
    PasswordMismatch,
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Timed out waiting for result after {attempts} polls")]
    TimedOut { attempts: u32 },

    #[error("Job failed: {0}")]
    Failed(String),

    #[error("Job cancelled")]
    Cancelled,

    #[error("Execution backend did not return a job id")]
    MissingJobId,
}

pub type Result<T> = std::result::Result<T, TutorError>;

/// Check if an anyhow error means the session is unusable and the user must sign in.
pub fn is_auth_error(e: &anyhow::Error) -> bool {
    if let Some(TutorError::Auth(_)) = e.downcast_ref::<TutorError>() {
        return true;
    }
    e.downcast_ref::<AuthError>().is_some()
}

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_AUTH_ERROR: u8 = 3;
pub const EXIT_API_ERROR: u8 = 4;
pub const EXIT_TIMEOUT: u8 = 5;

/// Determine the appropriate process exit code for an error.
pub fn get_exit_code(e: &anyhow::Error) -> u8 {
    if is_auth_error(e) {
        return EXIT_AUTH_ERROR;
    }

    if let Some(tutor_err) = e.downcast_ref::<TutorError>() {
        return match tutor_err {
            TutorError::Config(_) => EXIT_CONFIG_ERROR,
            TutorError::Api(_) => EXIT_API_ERROR,
            TutorError::Job(JobError::TimedOut { .. }) => EXIT_TIMEOUT,
            _ => EXIT_ERROR,
        };
    }

    // Direct enum unwraps fallback
    if e.downcast_ref::<ApiError>().is_some() {
        return EXIT_API_ERROR;
    }
    if let Some(JobError::TimedOut { .. }) = e.downcast_ref::<JobError>() {
        return EXIT_TIMEOUT;
    }

    EXIT_ERROR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_auth_error_wrapped() {
        let err: anyhow::Error = TutorError::Auth(AuthError::SessionExpired).into();
        assert!(is_auth_error(&err));
    }

    #[test]
    fn test_is_auth_error_direct() {
        let err: anyhow::Error = AuthError::NotSignedIn.into();
        assert!(is_auth_error(&err));
    }

    #[test]
    fn test_is_auth_error_plain_anyhow() {
        let err = anyhow::anyhow!("something went wrong");
        assert!(!is_auth_error(&err));
    }

    #[test]
    fn test_exit_code_auth() {
        let err: anyhow::Error = AuthError::SessionExpired.into();
        assert_eq!(get_exit_code(&err), EXIT_AUTH_ERROR);
    }

    #[test]
    fn test_exit_code_config() {
        let err: anyhow::Error = TutorError::Config("bad base url".to_string()).into();
        assert_eq!(get_exit_code(&err), EXIT_CONFIG_ERROR);
    }

    #[test]
    fn test_exit_code_api_direct() {
        let err: anyhow::Error = ApiError::HttpStatus {
            status: 500,
            message: "boom".to_string(),
        }
        .into();
        assert_eq!(get_exit_code(&err), EXIT_API_ERROR);
    }

    #[test]
    fn test_exit_code_timeout_is_distinct_from_failure() {
        let timed_out: anyhow::Error = JobError::TimedOut { attempts: 20 }.into();
        let failed: anyhow::Error = JobError::Failed("SyntaxError".to_string()).into();
        assert_eq!(get_exit_code(&timed_out), EXIT_TIMEOUT);
        assert_eq!(get_exit_code(&failed), EXIT_ERROR);
    }

    #[test]
    fn test_exit_code_timeout_wrapped() {
        let err: anyhow::Error = TutorError::Job(JobError::TimedOut { attempts: 50 }).into();
        assert_eq!(get_exit_code(&err), EXIT_TIMEOUT);
    }

    #[test]
    fn test_exit_code_plain() {
        let err = anyhow::anyhow!("whatever");
        assert_eq!(get_exit_code(&err), EXIT_ERROR);
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::HttpStatus {
            status: 404,
            message: "no such job".to_string(),
        };
        assert_eq!(err.to_string(), "API returned status 404: no such job");
        assert_eq!(
            JobError::TimedOut { attempts: 20 }.to_string(),
            "Timed out waiting for result after 20 polls"
        );
    }
}
