//! Shift-pair bit-field inspector.
//!
//! Firmware commonly extracts a field with `(value << left) >> right`. This
//! module computes which bits survive such a pair and renders the
//! intermediate values for a terminal.

use thiserror::Error;

/// Register width the shifts operate on.
pub const WORD_BITS: u32 = 32;

const NIBBLE_COLORS: [&str; 6] = ["31", "36", "32", "35", "34", "33"];

/// Invalid shift-pair parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ShiftError {
    /// A shift amount does not fit the 32-bit register.
    #[error("shift amount {0} must be below {WORD_BITS}")]
    OutOfRange(u32),
    /// The right shift is smaller than the left shift.
    #[error("right shift {right} is smaller than left shift {left}")]
    RightBelowLeft {
        /// Left shift amount.
        left: u32,
        /// Right shift amount.
        right: u32,
    },
}

/// Intermediate and final values of a `(value << left) >> right` extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftView {
    /// Original value.
    pub value: u32,
    /// Left shift amount.
    pub left: u32,
    /// Right shift amount.
    pub right: u32,
    /// Value after the left shift.
    pub left_shifted: u32,
    /// Value after both shifts.
    pub result: u32,
}

impl ShiftView {
    /// Computes the shift pair.
    ///
    /// # Errors
    ///
    /// Fails when either shift is 32 or more, or when `right < left`.
    pub const fn new(value: u32, left: u32, right: u32) -> Result<Self, ShiftError> {
        if left >= WORD_BITS {
            return Err(ShiftError::OutOfRange(left));
        }
        if right >= WORD_BITS {
            return Err(ShiftError::OutOfRange(right));
        }
        if right < left {
            return Err(ShiftError::RightBelowLeft { left, right });
        }

        let left_shifted = value << left;
        Ok(Self {
            value,
            left,
            right,
            left_shifted,
            result: left_shifted >> right,
        })
    }

    /// Lowest original bit index that survives the shifts.
    #[must_use]
    pub const fn selected_start(&self) -> u32 {
        self.right - self.left
    }

    /// One past the highest original bit index that survives the shifts.
    #[must_use]
    pub const fn selected_end(&self) -> u32 {
        WORD_BITS - self.left
    }

    /// Number of bits in the extracted field.
    #[must_use]
    pub const fn result_len(&self) -> u32 {
        WORD_BITS - self.right
    }

    /// Renders the three stages as aligned lines.
    #[must_use]
    pub fn render(&self, colored: bool) -> String {
        let labels = [
            "Original number (bin):".to_string(),
            format!("After left shift by {}:", self.left),
            format!("After right shift by {}:", self.right),
        ];
        let width = labels.iter().map(String::len).max().unwrap_or(0);

        let stages = [
            render_bits(self.value, 0, WORD_BITS, colored),
            render_bits(self.left_shifted, offset_from(self.left), WORD_BITS, colored),
            render_bits(
                self.result,
                -offset_from(self.selected_start()),
                self.result_len() + self.selected_start(),
                colored,
            ),
        ];

        let mut lines: Vec<String> = labels
            .iter()
            .zip(stages.iter())
            .map(|(label, bits)| format!("{label:<width$} {bits}"))
            .collect();
        lines.push(format!("Final result (dec): {}", self.result));
        lines.push(format!(
            "Selected bits: {:#x}:{:#x}",
            self.selected_start(),
            self.selected_end()
        ));
        lines.push(format!("Result length: {}", self.result_len()));
        lines.join("\n")
    }
}

#[allow(clippy::cast_possible_wrap)]
const fn offset_from(bits: u32) -> i32 {
    bits as i32
}

/// Renders `value` as 32 binary digits, MSB first, one space after every
/// nibble boundary (shifted by `offset`).
///
/// With `colored`, digits whose original bit position falls in
/// `0..valid_len` are wrapped in ANSI color escapes, one color per nibble.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn render_bits(value: u32, offset: i32, valid_len: u32, colored: bool) -> String {
    let mut out = String::new();
    let mut position = WORD_BITS as i32 - offset;

    for bit in (0..WORD_BITS).rev() {
        position -= 1;
        let digit = if (value >> bit) & 1 == 1 { '1' } else { '0' };

        if colored && position >= 0 && position < valid_len as i32 {
            let color = NIBBLE_COLORS[(position as usize / 4) % NIBBLE_COLORS.len()];
            out.push_str("\x1b[");
            out.push_str(color);
            out.push('m');
            out.push(digit);
            out.push_str("\x1b[0m");
        } else {
            out.push(digit);
        }

        if (position + offset).rem_euclid(4) == 0 {
            out.push(' ');
        }
    }

    out
}

/// Parses an integer literal with an optional sign and `0x`, `0o` or `0b`
/// prefix, accepting the signed and unsigned 32-bit ranges.
///
/// Negative values are returned in two's complement.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn parse_int_literal(text: &str) -> Option<u32> {
    let text = text.trim();
    let (negative, digits) = text
        .strip_prefix('-')
        .map_or((false, text), |rest| (true, rest));

    let lower = digits.to_ascii_lowercase();
    let (radix, body) = if let Some(rest) = lower.strip_prefix("0x") {
        (16, rest)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (8, rest)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (2, rest)
    } else {
        (10, lower.as_str())
    };

    let magnitude = i64::from(u32::from_str_radix(body, radix).ok()?);
    let value = if negative { -magnitude } else { magnitude };

    if value < i64::from(i32::MIN) {
        return None;
    }

    Some(value as u32)
}
