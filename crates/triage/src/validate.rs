//! Optional campaign-specific sanity checks.
//!
//! A validator looks at one record (and its decoded raw input when binary
//! cross-referencing is on) and returns a message when the record does not
//! match what the campaign was expected to produce. Messages end up as
//! [`Diagnostic`](crate::aggregate::Diagnostic)s; nothing here aborts a run.

use std::fmt;

use mailbox_core::RawInput;

use crate::metadata::MetadataRecord;

/// What a validator gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct ValidationInput<'a> {
    /// Record under test.
    pub record: &'a MetadataRecord,
    /// Decoded raw input, when available.
    pub raw_input: Option<&'a RawInput>,
}

/// A per-record sanity check.
pub trait RecordValidator: fmt::Debug {
    /// Short name used in diagnostics and configuration errors.
    fn name(&self) -> &'static str;

    /// Whether the check needs the decoded raw input.
    fn requires_raw_input(&self) -> bool {
        false
    }

    /// Returns a message when the record fails the check.
    fn check(&self, input: &ValidationInput<'_>) -> Option<String>;
}

/// Exceptions are expected to come from a single mailbox command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionCommandCheck {
    /// Command id every exception-raising input should carry.
    pub expected_command: u8,
}

impl Default for ExceptionCommandCheck {
    fn default() -> Self {
        Self {
            expected_command: 0x05,
        }
    }
}

impl RecordValidator for ExceptionCommandCheck {
    fn name(&self) -> &'static str {
        "exception-command"
    }

    fn requires_raw_input(&self) -> bool {
        true
    }

    fn check(&self, input: &ValidationInput<'_>) -> Option<String> {
        input.record.exception.as_ref()?;
        let command_id = input.raw_input?.command.command_id;

        (command_id != self.expected_command).then(|| {
            format!(
                "exception raised by command {command_id:#04x}, expected {:#04x}",
                self.expected_command
            )
        })
    }
}

/// Exceptions are expected to involve a misaligned mailbox pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnalignedPointerCheck {
    /// Alignment in bytes that a pointer must *not* satisfy.
    pub alignment: u64,
}

impl Default for UnalignedPointerCheck {
    fn default() -> Self {
        Self { alignment: 4 }
    }
}

impl RecordValidator for UnalignedPointerCheck {
    fn name(&self) -> &'static str {
        "unaligned-pointer"
    }

    fn check(&self, input: &ValidationInput<'_>) -> Option<String> {
        input.record.exception.as_ref()?;
        let pointer = input.record.misc_pointer?;

        (self.alignment > 1 && pointer.full() % self.alignment == 0).then(|| {
            format!(
                "exception with {}-byte aligned mailbox pointer {:#x}",
                self.alignment,
                pointer.full()
            )
        })
    }
}
