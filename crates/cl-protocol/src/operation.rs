//! Operation types and their fixed wire layouts
//!
//! Every datagram starts with a 1-byte operation tag followed by the
//! operation's fields. Integers are little-endian, strings live in
//! nul-padded fixed-width slots.
//!
//! - shell command execution: tag(1) | shell_command[256]
//! - select input source: tag(1) | time_stamp(8) | language[256]
//!   | input_source_id[256] | input_mode_id[256]

/// Size of the operation tag in bytes
pub const TAG_SIZE: usize = 1;

/// Size of the timestamp token in bytes
pub const TIME_STAMP_SIZE: usize = 8;

/// Wire buffer capacity of the shell command field
pub const SHELL_COMMAND_CAPACITY: usize = 256;

/// Wire buffer capacity of the language field
pub const LANGUAGE_CAPACITY: usize = 256;

/// Wire buffer capacity of the input source id field
pub const INPUT_SOURCE_ID_CAPACITY: usize = 256;

/// Wire buffer capacity of the input mode id field
pub const INPUT_MODE_ID_CAPACITY: usize = 256;

/// Operation type identifier (first byte of every datagram)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperationType {
    /// Run a shell command in the user's session
    ShellCommandExecution = 0x01,
    /// Switch the user's keyboard input source
    SelectInputSource = 0x02,
}

impl OperationType {
    /// Convert to u8
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Convert from u8
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::ShellCommandExecution),
            0x02 => Some(Self::SelectInputSource),
            _ => None,
        }
    }

    /// Total datagram size for this operation, tag included
    pub const fn wire_size(&self) -> usize {
        match self {
            Self::ShellCommandExecution => TAG_SIZE + SHELL_COMMAND_CAPACITY,
            Self::SelectInputSource => {
                TAG_SIZE
                    + TIME_STAMP_SIZE
                    + LANGUAGE_CAPACITY
                    + INPUT_SOURCE_ID_CAPACITY
                    + INPUT_MODE_ID_CAPACITY
            }
        }
    }

    /// Field name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::ShellCommandExecution => "shell_command_execution",
            Self::SelectInputSource => "select_input_source",
        }
    }
}
