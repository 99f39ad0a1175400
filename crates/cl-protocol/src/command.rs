//! Command values sent to the console user's session

use std::fmt;

use crate::operation::OperationType;

/// Opaque monotonic timestamp token
///
/// The value is copied onto the wire verbatim; the receiver uses it to
/// order input source requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AbsoluteTime(pub u64);

impl AbsoluteTime {
    /// Create a new token
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw token value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for AbsoluteTime {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for AbsoluteTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which input source to select; any field may be left unset
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputSourceSelector {
    /// Language tag (e.g. `en`)
    pub language: Option<String>,
    /// Input source identifier
    pub input_source_id: Option<String>,
    /// Input mode identifier
    pub input_mode_id: Option<String>,
}

impl InputSourceSelector {
    /// Create an empty selector
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the language
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Set the input source id
    pub fn with_input_source_id(mut self, id: impl Into<String>) -> Self {
        self.input_source_id = Some(id.into());
        self
    }

    /// Set the input mode id
    pub fn with_input_mode_id(mut self, id: impl Into<String>) -> Self {
        self.input_mode_id = Some(id.into());
        self
    }

    /// True when no field is set
    pub fn is_empty(&self) -> bool {
        self.language.is_none() && self.input_source_id.is_none() && self.input_mode_id.is_none()
    }
}

/// A command for the session-side receiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Execute a shell command as the console user
    ShellCommandExecution { command: String },
    /// Select a keyboard input source
    SelectInputSource {
        time_stamp: AbsoluteTime,
        selector: InputSourceSelector,
    },
}

impl Command {
    /// Build a shell command execution request
    pub fn shell(command: impl Into<String>) -> Self {
        Self::ShellCommandExecution {
            command: command.into(),
        }
    }

    /// Build an input source selection request
    pub fn select_input_source(selector: InputSourceSelector, time_stamp: AbsoluteTime) -> Self {
        Self::SelectInputSource {
            time_stamp,
            selector,
        }
    }

    /// The operation type (and therefore the wire layout) of this command
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::ShellCommandExecution { .. } => OperationType::ShellCommandExecution,
            Self::SelectInputSource { .. } => OperationType::SelectInputSource,
        }
    }
}
