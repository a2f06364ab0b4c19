//! Integration tests for codetutor modules
//!
//! HTTP flows run against a local wiremock server; nothing leaves the machine.

mod test_api;
mod test_assistant;
mod test_cli;
mod test_config;
mod test_executor;
