//! Error types used across the crate.
//!
//! Each module-facing concern gets its own small [`thiserror::Error`] enum rather than
//! one crate-wide type, so a caller can match on exactly the failures relevant to it.
//! The binary entry point composes these with `anyhow` at its edge; see
//! `src/bin/driver.rs`.

use thiserror::Error;

/// Failures reading from a connected remote, or discovering one.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// The remote stopped responding (no accelerometer event for >500ms) or its
    /// device path vanished from the filesystem.
    #[error("remote disappeared")]
    Gone,

    /// Failed to open or initialize a remote's device handle.
    #[error("failed to open remote: {0}")]
    OpenFailed(String),

    /// Backend unavailable for this build (e.g. hardware feature disabled).
    #[error("remote backend not available in this build")]
    BackendUnavailable,
}

/// Failures parsing the on-disk configuration store.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to open config file {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

/// Failures handling a single control-socket command.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("invalid parameter")]
    InvalidParameter,

    #[error("invalid parameter count")]
    InvalidParameterCount,

    #[error("unknown command")]
    UnknownCommand,

    #[error("{0}")]
    Other(String),
}

impl CommandError {
    /// Render as the `ERROR:<reason>` reply line the protocol expects.
    pub fn reply(&self) -> String {
        format!("ERROR:{}", self)
    }
}

/// Fatal failures standing up the control socket.
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("failed to bind control socket at {path}: {source}")]
    Bind { path: String, #[source] source: std::io::Error },
}
