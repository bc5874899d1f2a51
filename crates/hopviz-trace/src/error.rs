use std::process::ExitStatus;
use std::time::Duration;

/// Errors raised while running the external trace utility.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The trace program is not installed or not on `PATH`
    #[error("{program} not found; is it installed?")]
    NotFound { program: &'static str },

    /// Spawning or talking to the child failed
    #[error("failed to run {program} for {destination}: {source}")]
    Spawn {
        program: &'static str,
        destination: String,
        #[source]
        source: std::io::Error,
    },

    /// The utility exited unsuccessfully
    #[error("{program} failed for {destination} (status: {status}): {stderr}")]
    Failed {
        program: &'static str,
        destination: String,
        status: ExitStatus,
        stderr: String,
    },

    /// The utility ran past the configured timeout and was killed
    #[error("{program} for {destination} timed out after {after:?}")]
    TimedOut {
        program: &'static str,
        destination: String,
        after: Duration,
    },
}
