//! Protocol error types

use thiserror::Error;

/// Errors that can occur while encoding or decoding commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A string field does not fit into its fixed-width wire buffer
    #[error("{field} is too long ({len} bytes, max {max}): {value}")]
    FieldTooLong {
        field: &'static str,
        value: String,
        len: usize,
        max: usize,
    },

    /// A string field contains a nul byte, which would end it early on the wire
    #[error("{field} contains a nul byte at offset {offset}")]
    InteriorNul { field: &'static str, offset: usize },

    /// Unknown operation type tag
    #[error("Unknown operation type: {0:#04x}")]
    UnknownOperation(u8),

    /// Datagram size does not match the operation's fixed size
    #[error("Invalid message length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// A string buffer has no terminator or is not valid UTF-8
    #[error("Invalid string in field {field}")]
    InvalidString { field: &'static str },

    /// Empty datagram
    #[error("Empty message")]
    Empty,

    /// I/O error surfaced through the codec
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ProtocolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl ProtocolError {
    /// Name of the offending field, if the error concerns a single field
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::FieldTooLong { field, .. }
            | Self::InteriorNul { field, .. }
            | Self::InvalidString { field } => Some(field),
            _ => None,
        }
    }
}
