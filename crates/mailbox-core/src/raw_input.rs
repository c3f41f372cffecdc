//! Layout of the raw crashing-input artifacts stored next to the metadata.
//!
//! A campaign input starts (at a campaign-specific offset) with the value
//! written to the mailbox command register, followed by the two 32-bit
//! halves of the mailbox buffer pointer.

use thiserror::Error;

use crate::word::MailboxWord;

/// Width in bytes of one mailbox register value.
pub const REGISTER_BYTES: usize = 4;

/// Byte order of the 32-bit values inside a raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum ByteOrder {
    /// Least significant byte first. Inputs are written as guest memory
    /// images, so this is the default.
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

impl ByteOrder {
    /// Reads a `u32` from exactly four bytes.
    #[must_use]
    pub const fn read_u32(self, bytes: [u8; REGISTER_BYTES]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(bytes),
            Self::Big => u32::from_be_bytes(bytes),
        }
    }
}

/// Where the mailbox values live inside a raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RawInputLayout {
    /// Byte offset of the command word.
    pub command_offset: usize,
    /// Byte order of every 32-bit value.
    pub byte_order: ByteOrder,
}

/// Errors while extracting mailbox values from a raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RawInputError {
    /// The input ends before the command word is complete.
    #[error("raw input has {len} bytes, command word needs bytes {offset}..{end}")]
    Truncated {
        /// Actual input length.
        len: usize,
        /// Configured command word offset.
        offset: usize,
        /// First byte past the command word.
        end: usize,
    },
}

/// Mailbox values extracted from a raw input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RawInput {
    /// Decoded command word.
    pub command: MailboxWord,
    /// First auxiliary value following the command word, if present.
    pub aux_first: Option<u32>,
    /// Second auxiliary value, if present.
    pub aux_second: Option<u32>,
}

impl RawInputLayout {
    /// Creates a layout with the given offset and byte order.
    #[must_use]
    pub const fn new(command_offset: usize, byte_order: ByteOrder) -> Self {
        Self {
            command_offset,
            byte_order,
        }
    }

    fn word_at(self, data: &[u8], offset: usize) -> Option<u32> {
        let end = offset.checked_add(REGISTER_BYTES)?;
        let bytes: [u8; REGISTER_BYTES] = data.get(offset..end)?.try_into().ok()?;
        Some(self.byte_order.read_u32(bytes))
    }

    /// Extracts the command word and auxiliary values from `data`.
    ///
    /// # Errors
    ///
    /// Returns [`RawInputError::Truncated`] when `data` does not contain a
    /// full command word at the configured offset.
    pub fn parse(self, data: &[u8]) -> Result<RawInput, RawInputError> {
        let offset = self.command_offset;
        let end = offset.saturating_add(REGISTER_BYTES);
        let word = self
            .word_at(data, offset)
            .ok_or(RawInputError::Truncated {
                len: data.len(),
                offset,
                end,
            })?;

        Ok(RawInput {
            command: MailboxWord::decode(word),
            aux_first: self.word_at(data, end),
            aux_second: end
                .checked_add(REGISTER_BYTES)
                .and_then(|next| self.word_at(data, next)),
        })
    }
}
