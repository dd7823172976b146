//! Frame boundary detection for the CMPP byte stream.
//!
//! Message decoding lives in the codec module; this module only answers
//! "is there a whole frame at the front of this buffer, and how long is it".

pub use crate::codec::{CodecError, Frame, PduRegistry};
use crate::codec::{PduHeader, MAX_PDU_SIZE};

/// Error returned while looking for a frame boundary
#[derive(Debug)]
pub enum Error {
    /// Not enough data is available to parse a message
    Incomplete,
    /// Invalid message encoding
    Other(crate::Error),
}

/// Check whether `buf` starts with a complete frame
///
/// Returns the frame's total length on success. A length field outside the
/// accepted range is an error; the stream cannot be resynchronised after it.
pub fn check(buf: &[u8]) -> Result<usize, Error> {
    let Some(prefix) = buf.get(..4) else {
        return Err(Error::Incomplete);
    };

    let length = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    if !(PduHeader::SIZE as u32..=MAX_PDU_SIZE).contains(&length) {
        return Err(CodecError::InvalidPduLength {
            length,
            min: PduHeader::SIZE as u32,
            max: MAX_PDU_SIZE,
        }
        .into());
    }

    let length = length as usize;
    if buf.len() < length {
        return Err(Error::Incomplete);
    }
    Ok(length)
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Incomplete => Error::Incomplete,
            _ => Error::Other(Box::new(err)),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Incomplete => write!(f, "Incomplete frame"),
            Error::Other(err) => write!(f, "Frame error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Other(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}
