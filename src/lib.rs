//! Keymux - a per-identity ssh-agent multiplexer.
//!
//! This library provides the core functionality for the `keymux` CLI tool:
//! resolving which identity an ssh invocation belongs to, keeping one
//! long-lived `ssh-agent` per identity reachable, loading the keys that
//! agent is missing, and delegating to the real `ssh` binary.

pub mod agent;
pub mod cli;
pub mod config;
pub mod exec;
pub mod identity;
pub mod keys;
pub mod loader;
pub mod rules;

/// Library-level error type for keymux operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pattern {pattern:?} for {option}: {source}")]
    InvalidPattern {
        option: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Could not create agents directory {}: {reason}", path.display())]
    AgentsDir { path: std::path::PathBuf, reason: String },

    #[error("Failed to start ssh-agent: {0}")]
    AgentSpawn(String),

    #[error("Agent descriptor error: {0}")]
    Descriptor(String),

    #[error("Failed to scan key directory {}: {source}", path.display())]
    KeyScan {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to run {tool}: {source}")]
    Exec {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Process exit code for this error.
    ///
    /// The success path never produces an exit code of our own: keymux
    /// replaces itself with ssh, so a successful invocation exits with
    /// whatever ssh exits with.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::InvalidPattern { .. } => 2,
            Error::AgentsDir { .. } => 3,
            Error::AgentSpawn(_) | Error::Descriptor(_) => 4,
            Error::KeyScan { .. } | Error::Io(_) => 5,
            Error::Exec { .. } => 6,
        }
    }
}

/// Result type alias for keymux operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Exit code used when the invocation is interrupted (SIGINT).
pub const EXIT_INTERRUPTED: i32 = 130;
