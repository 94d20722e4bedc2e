//! Process exit errors.
//!
//! Commands return `anyhow::Result<()>`. Outcomes that must end the process
//! with a specific code are wrapped in `ExitError`; `main` downcasts and
//! exits accordingly. Any other error exits with `codes::FAILURE`.

use thiserror::Error;

pub mod codes {
    pub const SUCCESS: i32 = 0;
    /// Missing input or failed remote call.
    pub const FAILURE: i32 = 1;
    /// Event channel dropped before the remote command finished.
    pub const DISCONNECTED: i32 = 2;
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ExitError {
    pub code: i32,
    pub message: String,
}

impl ExitError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Exit code 1 carrying the error's full context chain.
    pub fn fatal(err: impl std::fmt::Display) -> Self {
        Self::new(codes::FAILURE, format!("{err:#}"))
    }
}

/// Exit code and message for an error returned by a command.
pub fn exit_status(err: &anyhow::Error) -> (i32, String) {
    match err.downcast_ref::<ExitError>() {
        Some(e) => (e.code, e.message.clone()),
        None => (codes::FAILURE, format!("Error: {err:#}")),
    }
}
