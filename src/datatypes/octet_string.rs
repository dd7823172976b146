// Fixed-width octet string fields used throughout CMPP message bodies.
// Unlike C strings they are not null-terminated: the full width is usable
// and shorter values are padded with zero bytes.

use std::fmt;
use std::str;
use std::str::FromStr;

/// A fixed-size zero-padded octet string
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OctetString<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> OctetString<N> {
    /// Creates a new OctetString from a byte slice, padding with zeros if needed
    pub fn new(s: &[u8]) -> Result<Self, OctetStringError> {
        if s.len() > N {
            return Err(OctetStringError::TooLong {
                max_len: N,
                actual_len: s.len(),
            });
        }

        let mut data = [0u8; N];
        data[..s.len()].copy_from_slice(s);
        Ok(Self { data })
    }

    /// Creates an OctetString keeping at most the first `N` bytes of `s`
    pub fn truncating(s: &str) -> Self {
        let bytes = s.as_bytes();
        let len = bytes.len().min(N);
        let mut data = [0u8; N];
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data }
    }

    /// Wraps a field exactly as read off the wire
    pub const fn from_raw(data: [u8; N]) -> Self {
        Self { data }
    }

    /// Returns the full padded field
    pub const fn as_bytes(&self) -> &[u8; N] {
        &self.data
    }

    /// Returns the content, excluding zero padding
    pub fn as_content(&self) -> &[u8] {
        let len = self.data.iter().position(|&b| b == 0).unwrap_or(N);
        &self.data[..len]
    }

    /// Returns the content as a str, excluding zero padding
    pub fn as_str(&self) -> Result<&str, str::Utf8Error> {
        str::from_utf8(self.as_content())
    }

    pub fn len(&self) -> usize {
        self.as_content().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<const N: usize> fmt::Display for OctetString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Ok(s) => write!(f, "{s}"),
            Err(_) => write!(f, "<invalid UTF-8>"),
        }
    }
}

impl<const N: usize> fmt::Debug for OctetString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_str() {
            Ok(s) => write!(f, "OctetString<{N}>(\"{s}\")"),
            Err(_) => write!(f, "OctetString<{}>({:?})", N, self.as_content()),
        }
    }
}

impl<const N: usize> Default for OctetString<N> {
    fn default() -> Self {
        Self { data: [0u8; N] }
    }
}

impl<const N: usize> FromStr for OctetString<N> {
    type Err = OctetStringError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.as_bytes())
    }
}

impl<const N: usize> TryFrom<&str> for OctetString<N> {
    type Error = OctetStringError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl<const N: usize> PartialEq<&str> for OctetString<N> {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Ok(*other)
    }
}

/// Errors that can occur when creating OctetString instances
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OctetStringError {
    /// The input is longer than the field width
    TooLong { max_len: usize, actual_len: usize },
}

impl fmt::Display for OctetStringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OctetStringError::TooLong {
                max_len,
                actual_len,
            } => {
                write!(f, "Field too long: {actual_len} bytes (max {max_len})")
            }
        }
    }
}

impl std::error::Error for OctetStringError {}

// CMPP 2.0 field widths
pub type SourceAddr = OctetString<6>;
pub type MsgSrc = OctetString<6>;
pub type ServiceId = OctetString<10>;
pub type TerminalId = OctetString<21>;
pub type FeeType = OctetString<2>;
pub type FeeCode = OctetString<6>;
pub type TimeString = OctetString<17>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_with_zeros_and_uses_full_width() {
        let addr: SourceAddr = "901234".parse().unwrap();
        assert_eq!(addr.as_bytes(), b"901234");
        assert_eq!(addr.len(), 6);

        let fee: FeeCode = "5".parse().unwrap();
        assert_eq!(fee.as_bytes(), b"5\0\0\0\0\0");
        assert_eq!(fee, "5");
    }

    #[test]
    fn rejects_overlong_values() {
        let result: Result<FeeType, _> = "012".parse();
        assert_eq!(
            result,
            Err(OctetStringError::TooLong {
                max_len: 2,
                actual_len: 3
            })
        );
    }

    #[test]
    fn truncating_keeps_prefix() {
        let id = ServiceId::truncating("MOBILE-NEWS-SERVICE");
        assert_eq!(id, "MOBILE-NEW");
    }
}
