//! Command encoding and decoding
//!
//! `encode_command` is what the sending side uses: it validates every string
//! field against its slot before writing a single byte, so a rejected command
//! never produces a partial message. `decode_command` parses one datagram and
//! is what a receiver (or a test) uses to read commands back.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::bounded::{write_slot, BoundedString};
use crate::command::{AbsoluteTime, Command, InputSourceSelector};
use crate::error::ProtocolError;
use crate::operation::{
    OperationType, INPUT_MODE_ID_CAPACITY, INPUT_SOURCE_ID_CAPACITY, LANGUAGE_CAPACITY,
    SHELL_COMMAND_CAPACITY, TAG_SIZE,
};

type ShellCommand = BoundedString<SHELL_COMMAND_CAPACITY>;
type Language = BoundedString<LANGUAGE_CAPACITY>;
type InputSourceId = BoundedString<INPUT_SOURCE_ID_CAPACITY>;
type InputModeId = BoundedString<INPUT_MODE_ID_CAPACITY>;

const SHELL_COMMAND_FIELD: &str = "shell_command";
const LANGUAGE_FIELD: &str = "language";
const INPUT_SOURCE_ID_FIELD: &str = "input_source_id";
const INPUT_MODE_ID_FIELD: &str = "input_mode_id";

/// Encode a command into its fixed-size datagram
pub fn encode_command(command: &Command) -> Result<Bytes, ProtocolError> {
    let mut dst = BytesMut::with_capacity(command.operation_type().wire_size());
    encode_into(command, &mut dst)?;
    Ok(dst.freeze())
}

/// Decode one complete datagram
pub fn decode_command(src: &[u8]) -> Result<Command, ProtocolError> {
    let (&tag, _) = src.split_first().ok_or(ProtocolError::Empty)?;
    let operation = OperationType::from_u8(tag).ok_or(ProtocolError::UnknownOperation(tag))?;

    if src.len() != operation.wire_size() {
        return Err(ProtocolError::InvalidLength {
            expected: operation.wire_size(),
            actual: src.len(),
        });
    }

    let mut body = &src[TAG_SIZE..];
    match operation {
        OperationType::ShellCommandExecution => {
            let command = ShellCommand::read_from(SHELL_COMMAND_FIELD, body)?;
            Ok(Command::shell(command.into_inner()))
        }
        OperationType::SelectInputSource => {
            let time_stamp = AbsoluteTime(body.get_u64_le());
            let (language, rest) = body.split_at(LANGUAGE_CAPACITY);
            let (input_source_id, input_mode_id) = rest.split_at(INPUT_SOURCE_ID_CAPACITY);

            let selector = InputSourceSelector {
                language: non_empty(Language::read_from(LANGUAGE_FIELD, language)?),
                input_source_id: non_empty(InputSourceId::read_from(
                    INPUT_SOURCE_ID_FIELD,
                    input_source_id,
                )?),
                input_mode_id: non_empty(InputModeId::read_from(
                    INPUT_MODE_ID_FIELD,
                    input_mode_id,
                )?),
            };
            Ok(Command::select_input_source(selector, time_stamp))
        }
    }
}

// Unset and empty fields share the same all-zero encoding.
fn non_empty<const CAPACITY: usize>(value: BoundedString<CAPACITY>) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.into_inner())
    }
}

fn encode_into(command: &Command, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    let operation = command.operation_type();

    match command {
        Command::ShellCommandExecution { command } => {
            let shell_command = ShellCommand::try_new(SHELL_COMMAND_FIELD, command.as_str())?;

            dst.reserve(operation.wire_size());
            dst.put_u8(operation.as_u8());
            shell_command.write_to(dst);
        }
        Command::SelectInputSource {
            time_stamp,
            selector,
        } => {
            // Validate everything before writing anything
            let language = Language::try_from_option(LANGUAGE_FIELD, selector.language.as_deref())?;
            let input_source_id = InputSourceId::try_from_option(
                INPUT_SOURCE_ID_FIELD,
                selector.input_source_id.as_deref(),
            )?;
            let input_mode_id = InputModeId::try_from_option(
                INPUT_MODE_ID_FIELD,
                selector.input_mode_id.as_deref(),
            )?;

            dst.reserve(operation.wire_size());
            dst.put_u8(operation.as_u8());
            dst.put_u64_le(time_stamp.as_u64());
            write_slot(language.as_ref(), dst);
            write_slot(input_source_id.as_ref(), dst);
            write_slot(input_mode_id.as_ref(), dst);
        }
    }

    Ok(())
}

/// Codec for commands carried one per datagram
#[derive(Debug, Default)]
pub struct CommandCodec;

impl CommandCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for CommandCodec {
    type Item = Command;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(&tag) = src.first() else {
            return Ok(None);
        };

        let operation = OperationType::from_u8(tag).ok_or(ProtocolError::UnknownOperation(tag))?;
        let size = operation.wire_size();
        if src.len() < size {
            // Need more data
            return Ok(None);
        }

        let message = src.split_to(size);
        decode_command(&message).map(Some)
    }
}

impl Encoder<Command> for CommandCodec {
    type Error = ProtocolError;

    fn encode(&mut self, command: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_into(&command, dst)
    }
}
