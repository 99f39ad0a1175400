//! cl-protocol: Fixed-layout datagram protocol for console-link
//!
//! This crate defines the binary messages a privileged process sends to the
//! companion process running inside a console user's session. Every message
//! is a single datagram whose size is determined by its operation type.

pub mod bounded;
pub mod codec;
pub mod command;
pub mod error;
pub mod operation;

pub use bounded::BoundedString;
pub use codec::{decode_command, encode_command, CommandCodec};
pub use command::{AbsoluteTime, Command, InputSourceSelector};
pub use error::ProtocolError;
pub use operation::{
    OperationType, INPUT_MODE_ID_CAPACITY, INPUT_SOURCE_ID_CAPACITY, LANGUAGE_CAPACITY,
    SHELL_COMMAND_CAPACITY,
};
