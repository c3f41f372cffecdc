//! PSP mailbox primitives shared by the ASP fuzzing triage tools.

/// Mailbox command/response word decoder.
pub mod word;
pub use word::{Direction, MailboxWord};

/// Known BIOS-to-PSP mailbox commands.
pub mod commands;
pub use commands::{lookup_command, MailboxCommand, MAILBOX_COMMAND_TABLE};

/// Raw crashing-input layout and mailbox value extraction.
pub mod raw_input;
pub use raw_input::{ByteOrder, RawInput, RawInputError, RawInputLayout, REGISTER_BYTES};

/// Shift-pair bit-field inspector.
pub mod shifts;
pub use shifts::{parse_int_literal, render_bits, ShiftError, ShiftView, WORD_BITS};

#[cfg(test)]
use proptest as _;
