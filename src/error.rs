//! Error types returned by the codec.
//!
//! Parse-path errors are recoverable at the message boundary: the caller
//! drops the offending message and keeps processing other traffic.
//! Generation-path errors ([`ErrorKind::ChainInconsistency`] and
//! [`ErrorKind::Encoding`]) indicate invalid data handed to the codec by the
//! caller and are surfaced before any bytes are emitted.

/// Convenience alias for codec results.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fewer bytes were available than a length field declared.
    Truncated,
    /// A fixed-format field held an impossible value.
    Malformed(&'static str),
    /// The header length field disagrees with the actual buffer size.
    LengthMismatch { declared: u32, actual: u32 },
    /// An unknown payload type code that cannot be skipped.
    UnsupportedPayload(u8),
    /// Bytes remained after the payload chain was fully walked.
    TrailingData(usize),
    /// A chain link does not match the type of the payload that follows it.
    ChainInconsistency(&'static str),
    /// A field value cannot be represented in its wire width.
    Encoding(&'static str),
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind }
    }

    pub fn truncated() -> Self {
        Self::new(ErrorKind::Truncated)
    }

    pub fn malformed(reason: &'static str) -> Self {
        Self::new(ErrorKind::Malformed(reason))
    }

    pub fn encoding(reason: &'static str) -> Self {
        Self::new(ErrorKind::Encoding(reason))
    }

    pub fn chain(reason: &'static str) -> Self {
        Self::new(ErrorKind::ChainInconsistency(reason))
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self.kind {
            ErrorKind::Truncated => write!(f, "input ends before a declared length"),
            ErrorKind::Malformed(reason) => write!(f, "malformed message: {}", reason),
            ErrorKind::LengthMismatch { declared, actual } => write!(
                f,
                "header declares {} bytes but buffer holds {}",
                declared, actual
            ),
            ErrorKind::UnsupportedPayload(code) => {
                write!(f, "unsupported payload type {}", code)
            }
            ErrorKind::TrailingData(remaining) => {
                write!(f, "{} bytes remain after the payload chain", remaining)
            }
            ErrorKind::ChainInconsistency(reason) => {
                write!(f, "inconsistent payload chain: {}", reason)
            }
            ErrorKind::Encoding(reason) => write!(f, "unencodable field: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

impl<I> From<nom::Err<nom::error::Error<I>>> for Error {
    fn from(err: nom::Err<nom::error::Error<I>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => Self::truncated(),
            nom::Err::Error(_) | nom::Err::Failure(_) => Self::malformed("invalid field value"),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(_: std::io::Error) -> Self {
        Self::encoding("output buffer write failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_maps_to_truncated() {
        let err: Error =
            nom::Err::<nom::error::Error<&[u8]>>::Incomplete(nom::Needed::new(4)).into();
        assert_eq!(err, Error::truncated());
    }

    #[test]
    fn display_length_mismatch() {
        let err = Error::new(ErrorKind::LengthMismatch {
            declared: 32,
            actual: 28,
        });
        assert_eq!(
            err.to_string(),
            "header declares 32 bytes but buffer holds 28"
        );
    }
}
