//! Mailbox command/response word decoder.
//!
//! The PSP mailbox register is a 32-bit bit-field written by the host when it
//! issues a command and rewritten by the PSP when it posts the response.
//! Field order and widths are fixed by the hardware contract (MSB first):
//!
//! ```text
//!  31   30   29   28   27..24    23..16     15..0
//! C/R  REC  RST  RSVD  ALT_STAT  CMD_ID  DATA/STATUS
//! ```

use std::fmt;

use crate::commands::{lookup_command, MailboxCommand};

const DIRECTION_SHIFT: u32 = 31;
const RECOVERY_SHIFT: u32 = 30;
const RESET_REQUIRED_SHIFT: u32 = 29;
const RESERVED_SHIFT: u32 = 28;
const ALT_STATUS_SHIFT: u32 = 24;
const COMMAND_ID_SHIFT: u32 = 16;

const ALT_STATUS_MASK: u32 = 0xF;
const COMMAND_ID_MASK: u32 = 0xFF;
const DATA_MASK: u32 = 0xFFFF;

/// Who wrote the word last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Direction {
    /// Written by the host operating system or BIOS (bit 31 clear).
    Command,
    /// Written by the PSP upon completion (bit 31 set).
    Response,
}

impl Direction {
    /// Label used for the 16-bit payload field in this direction.
    #[must_use]
    pub const fn payload_label(self) -> &'static str {
        match self {
            Self::Command => "Data",
            Self::Response => "Status",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => f.write_str("Command"),
            Self::Response => f.write_str("Response"),
        }
    }
}

/// Decoded view of a mailbox word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MailboxWord {
    /// Command/response flag.
    pub direction: Direction,
    /// Target requests the host to run the firmware recovery sequence.
    pub recovery: bool,
    /// Target requests a warm reset because of firmware corruption.
    pub reset_required: bool,
    /// Reserved bit; hardware requires it to be zero.
    pub reserved: bool,
    /// Alternate status nibble.
    pub alt_status: u8,
    /// Command identifier.
    pub command_id: u8,
    /// Command data or response status, depending on [`Direction`].
    pub data_or_status: u16,
}

impl MailboxWord {
    /// Decodes a raw 32-bit mailbox word. Every value is accepted.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn decode(word: u32) -> Self {
        let direction = if (word >> DIRECTION_SHIFT) & 1 == 0 {
            Direction::Command
        } else {
            Direction::Response
        };

        Self {
            direction,
            recovery: (word >> RECOVERY_SHIFT) & 1 == 1,
            reset_required: (word >> RESET_REQUIRED_SHIFT) & 1 == 1,
            reserved: (word >> RESERVED_SHIFT) & 1 == 1,
            alt_status: ((word >> ALT_STATUS_SHIFT) & ALT_STATUS_MASK) as u8,
            command_id: ((word >> COMMAND_ID_SHIFT) & COMMAND_ID_MASK) as u8,
            data_or_status: (word & DATA_MASK) as u16,
        }
    }

    /// Re-encodes the fields into the raw register value.
    ///
    /// `alt_status` is truncated to its 4-bit field.
    #[must_use]
    pub const fn encode(self) -> u32 {
        let direction = match self.direction {
            Direction::Command => 0,
            Direction::Response => 1,
        };

        (direction << DIRECTION_SHIFT)
            | ((self.recovery as u32) << RECOVERY_SHIFT)
            | ((self.reset_required as u32) << RESET_REQUIRED_SHIFT)
            | ((self.reserved as u32) << RESERVED_SHIFT)
            | (((self.alt_status as u32) & ALT_STATUS_MASK) << ALT_STATUS_SHIFT)
            | ((self.command_id as u32) << COMMAND_ID_SHIFT)
            | (self.data_or_status as u32)
    }

    /// Returns false when the reserved bit is set.
    #[must_use]
    pub const fn is_well_formed(&self) -> bool {
        !self.reserved
    }

    /// Resolves the command identifier against the known command table.
    #[must_use]
    pub fn command(&self) -> Option<&'static MailboxCommand> {
        lookup_command(self.command_id)
    }
}

impl From<u32> for MailboxWord {
    fn from(word: u32) -> Self {
        Self::decode(word)
    }
}

impl From<MailboxWord> for u32 {
    fn from(word: MailboxWord) -> Self {
        word.encode()
    }
}

impl fmt::Display for MailboxWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "CmdOrRspns {}", self.direction)?;
        if self.recovery {
            writeln!(f, "Recovery requested")?;
        }
        if self.reset_required {
            writeln!(f, "Reset required")?;
        }
        if !self.is_well_formed() {
            writeln!(f, "Invalid Message")?;
        }
        writeln!(f, "AltStat {}", self.alt_status)?;
        writeln!(f, "CommandId {:#x}", self.command_id)?;
        write!(
            f,
            "{} {}",
            self.direction.payload_label(),
            self.data_or_status
        )?;
        if let Some(command) = self.command() {
            write!(
                f,
                "\nCommand name: {}\nCommand description: {}",
                command.name, command.description
            )?;
        }
        Ok(())
    }
}
