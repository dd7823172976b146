// Strongly-typed CMPP connect timestamp in MMDDhhmmss format.
// The same ten digits feed the authenticator digest (as text) and the
// Timestamp field of CMPP_CONNECT (as a decimal integer).

use chrono::{Datelike, Local, Timelike};
use std::fmt;

/// A CMPP timestamp: month, day, hour, minute, second
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp {
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl Timestamp {
    /// Parses a ten digit MMDDhhmmss string with range validation
    pub fn new(s: &str) -> Result<Self, TimestampError> {
        if s.len() != 10 {
            return Err(TimestampError::InvalidLength {
                expected: 10,
                actual: s.len(),
            });
        }

        let bytes = s.as_bytes();
        if let Some(position) = bytes.iter().position(|b| !b.is_ascii_digit()) {
            return Err(TimestampError::InvalidCharacter {
                position,
                character: bytes[position] as char,
            });
        }

        let two = |i: usize| (bytes[i] - b'0') * 10 + (bytes[i + 1] - b'0');
        Self::from_parts(two(0), two(2), two(4), two(6), two(8))
    }

    /// Builds a timestamp from its components
    pub fn from_parts(
        month: u8,
        day: u8,
        hour: u8,
        minute: u8,
        second: u8,
    ) -> Result<Self, TimestampError> {
        check_range("month", month, 1, 12)?;
        check_range("day", day, 1, 31)?;
        check_range("hour", hour, 0, 23)?;
        check_range("minute", minute, 0, 59)?;
        check_range("second", second, 0, 59)?;

        Ok(Self {
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    /// The current local wall-clock time
    pub fn now() -> Self {
        Self::from_datetime(&Local::now())
    }

    /// Takes month, day and time of day from any calendar date-time
    pub fn from_datetime<T: Datelike + Timelike>(at: &T) -> Self {
        Self {
            month: at.month() as u8,
            day: at.day() as u8,
            hour: at.hour() as u8,
            minute: at.minute() as u8,
            // Leap seconds are reported as 59 plus extra nanoseconds
            second: at.second().min(59) as u8,
        }
    }

    /// The timestamp as the decimal integer carried on the wire
    pub fn as_u32(&self) -> u32 {
        self.month as u32 * 100_000_000
            + self.day as u32 * 1_000_000
            + self.hour as u32 * 10_000
            + self.minute as u32 * 100
            + self.second as u32
    }

    pub fn month(&self) -> u8 {
        self.month
    }

    pub fn day(&self) -> u8 {
        self.day
    }
}

fn check_range(field: &'static str, value: u8, min: u8, max: u8) -> Result<(), TimestampError> {
    if value < min || value > max {
        return Err(TimestampError::InvalidRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02}{:02}{:02}{:02}{:02}",
            self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp(\"{self}\")")
    }
}

/// Errors produced when parsing a timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimestampError {
    InvalidLength { expected: usize, actual: usize },
    InvalidCharacter { position: usize, character: char },
    InvalidRange {
        field: &'static str,
        value: u8,
        min: u8,
        max: u8,
    },
}

impl fmt::Display for TimestampError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimestampError::InvalidLength { expected, actual } => {
                write!(f, "Invalid timestamp length: expected {expected}, got {actual}")
            }
            TimestampError::InvalidCharacter {
                position,
                character,
            } => write!(f, "Invalid character '{character}' at position {position}"),
            TimestampError::InvalidRange {
                field,
                value,
                min,
                max,
            } => write!(f, "Invalid {field}: {value} (must be {min}-{max})"),
        }
    }
}

impl std::error::Error for TimestampError {}
