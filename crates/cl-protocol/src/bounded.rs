//! Strings constrained to a fixed-width, nul-terminated wire buffer
//!
//! A `BoundedString<CAPACITY>` always fits into a `CAPACITY`-byte slot with
//! room for at least one trailing nul, so the longest accepted value is
//! `CAPACITY - 1` bytes. Oversized values are rejected, never truncated.
//! Values containing a nul byte are rejected too, since the receiver reads
//! each slot only up to its first nul.

use std::fmt;
use std::ops::Deref;

use bytes::{BufMut, BytesMut};

use crate::error::ProtocolError;

/// A string that is known to fit into a `CAPACITY`-byte wire buffer
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoundedString<const CAPACITY: usize>(String);

impl<const CAPACITY: usize> BoundedString<CAPACITY> {
    /// Longest value (in bytes) that fits the buffer
    pub const MAX_LEN: usize = CAPACITY - 1;

    /// Validate `value` against the buffer capacity.
    ///
    /// `field` names the wire field and is carried in the error so callers
    /// can log which part of a command was rejected.
    pub fn try_new(field: &'static str, value: impl Into<String>) -> Result<Self, ProtocolError> {
        let value = value.into();
        if value.len() >= CAPACITY {
            return Err(ProtocolError::FieldTooLong {
                field,
                len: value.len(),
                max: Self::MAX_LEN,
                value,
            });
        }
        if let Some(offset) = value.bytes().position(|b| b == 0) {
            return Err(ProtocolError::InteriorNul { field, offset });
        }
        Ok(Self(value))
    }

    /// Validate an optional value; `None` stays `None`
    pub fn try_from_option(
        field: &'static str,
        value: Option<&str>,
    ) -> Result<Option<Self>, ProtocolError> {
        value.map(|v| Self::try_new(field, v)).transpose()
    }

    /// Write the string followed by nul padding; always `CAPACITY` bytes
    pub fn write_to(&self, dst: &mut BytesMut) {
        write_slot::<CAPACITY>(Some(self), dst);
    }

    /// Read a string back from a `CAPACITY`-byte slot
    ///
    /// The value ends at the first nul. A slot without any nul, or with
    /// non-UTF-8 content, is rejected.
    pub fn read_from(field: &'static str, slot: &[u8]) -> Result<Self, ProtocolError> {
        if slot.len() != CAPACITY {
            return Err(ProtocolError::InvalidLength {
                expected: CAPACITY,
                actual: slot.len(),
            });
        }
        let end = slot
            .iter()
            .position(|b| *b == 0)
            .ok_or(ProtocolError::InvalidString { field })?;
        let value = std::str::from_utf8(&slot[..end])
            .map_err(|_| ProtocolError::InvalidString { field })?;
        Ok(Self(value.to_owned()))
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string
    pub fn into_inner(self) -> String {
        self.0
    }
}

/// Write an optional bounded string into its slot; `None` is all zeros
pub(crate) fn write_slot<const CAPACITY: usize>(
    value: Option<&BoundedString<CAPACITY>>,
    dst: &mut BytesMut,
) {
    dst.reserve(CAPACITY);
    let bytes = value.map(|v| v.0.as_bytes()).unwrap_or_default();
    dst.put_slice(bytes);
    dst.put_bytes(0, CAPACITY - bytes.len());
}

impl<const CAPACITY: usize> Deref for BoundedString<CAPACITY> {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl<const CAPACITY: usize> fmt::Display for BoundedString<CAPACITY> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
