//! Core error types for console-link

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Transport-related errors
///
/// These are relayed to event subscribers unchanged, so they are cheap to
/// clone and carry the I/O error kind rather than the error itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Connecting to the server socket failed
    #[error("Failed to connect to {path}: {message}")]
    ConnectFailed {
        path: PathBuf,
        kind: io::ErrorKind,
        message: String,
    },

    /// The server socket disappeared while connected
    #[error("Server socket is gone: {0}")]
    ServerGone(PathBuf),

    /// Sending a datagram failed
    #[error("Failed to send to {path}: {message}")]
    SendFailed {
        path: PathBuf,
        kind: io::ErrorKind,
        message: String,
    },
}

impl TransportError {
    /// Build a connect failure from an I/O error
    pub fn connect(path: impl Into<PathBuf>, err: &io::Error) -> Self {
        Self::ConnectFailed {
            path: path.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Build a send failure from an I/O error
    pub fn send(path: impl Into<PathBuf>, err: &io::Error) -> Self {
        Self::SendFailed {
            path: path.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// The I/O error kind behind this error, if any
    pub fn kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::ConnectFailed { kind, .. } | Self::SendFailed { kind, .. } => Some(*kind),
            Self::ServerGone(_) => None,
        }
    }
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
