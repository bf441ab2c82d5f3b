//! Error taxonomy for the bitcoin-cli driver.

use thiserror::Error;

/// Everything that can go wrong driving `bitcoin-cli`.
///
/// `Fatal` and `Signaled` correspond to conditions that, in the source
/// node, abort the whole process: this crate cannot unilaterally kill
/// its host, so it surfaces them as a typed error instead and leaves
/// the decision of whether (and how) to exit to the embedder.
#[derive(Debug, Error, Clone)]
pub enum BcliError {
    /// The CLI binary could not be spawned at all (not found, not
    /// executable, etc).
    #[error("failed to exec {command}: {reason}")]
    Exec { command: String, reason: String },

    /// The child process was killed by a signal.
    #[error("{command} was killed by signal {signal}")]
    Signaled { command: String, signal: i32 },

    /// A streak of non-zero exits (without exit-status capture) exceeded
    /// the configured error window.
    #[error(
        "bitcoin-cli has been failing for {streak_secs}s ({attempts} attempts); \
         last: `{command}` exited {exit_code}, stdout tail: {stdout_tail}"
    )]
    ErrorStreak {
        command: String,
        exit_code: i32,
        streak_secs: u64,
        attempts: u32,
        stdout_tail: String,
    },

    /// A response was missing a mandatory field, or a field in-range
    /// could not be parsed (malformed JSON, malformed hex, etc). This is
    /// always a bug in the CLI or a version mismatch, never a "missing
    /// output" signal - that is exclusively communicated by a non-zero
    /// exit code.
    #[error("malformed response to `{command}`: {detail}")]
    Protocol { command: String, detail: String },

    /// The request's cancellation anchor was dropped before the child
    /// finished, or the driver was shut down while the request was
    /// still queued or in flight. The child (if any) still ran to
    /// completion and was reaped; the caller simply never learns the
    /// result. This is the idiomatic-Rust equivalent of a silently
    /// suppressed completion callback.
    #[error("request was cancelled")]
    Cancelled,
}
