//! codetutor - terminal client for an AI code tutor
//!
//! Talks to the tutor platform's two backends: the REST API (auth, catalog,
//! code execution jobs) and the AI orchestration service that streams tutor
//! replies.
//!
//! - **Assistant**: streamed replies, in-band run markers, suggestion links
//! - **Executor**: submit-then-poll code execution with cancellation
//! - **Session**: explicit, persisted auth state with one-shot token refresh
//!
//! # Quick Start
//!
//! ```ignore
//! use codetutor::api::ApiClient;
//! use codetutor::config::Config;
//! use codetutor::executor::{ActionClock, JobExecutor, JobTarget};
//! use codetutor::executor::types::ExecutionJob;
//! use codetutor::session::SessionHandle;
//!
//! let config = Config::load(None)?;
//! let client = ApiClient::new(&config, SessionHandle::default())?;
//! let executor = JobExecutor::new(client, config.polling.clone());
//! let outcome = executor
//!     .execute::<ExecutionJob>(
//!         &JobTarget::Playground { code: "print(1)".into() },
//!         &mut ActionClock::start(),
//!         &tokio_util::sync::CancellationToken::new(),
//!     )
//!     .await?;
//! ```

pub mod api;
pub mod assistant;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod errors;
pub mod executor;
pub mod session;
pub mod telemetry;
