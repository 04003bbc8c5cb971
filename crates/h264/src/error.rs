use std::io;

use thiserror::Error;

use crate::filter::FilterArgsError;

/// Errors produced while locating, rewriting or splicing H.264 NAL units.
#[derive(Error, Debug)]
pub enum H264Error {
    /// A read ran past the end of the NAL unit or buffer.
    #[error("read past the end of the bitstream")]
    OutOfRange,

    /// The SPS violates the H.264 syntax in a way the rewriter cannot step over.
    #[error("malformed sequence parameter set: {0}")]
    MalformedSps(String),

    /// The input is well-formed but uses something this crate does not handle.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// The filter argument string could not be parsed.
    #[error("invalid filter arguments: {0}")]
    InvalidArgs(#[from] FilterArgsError),

    /// Any other I/O failure from an underlying reader or writer.
    #[error("i/o error: {0}")]
    Io(io::Error),
}

impl From<io::Error> for H264Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::OutOfRange,
            io::ErrorKind::InvalidData => Self::MalformedSps(err.to_string()),
            _ => Self::Io(err),
        }
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let eof = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        assert!(matches!(H264Error::from(eof), H264Error::OutOfRange));

        let invalid = io::Error::new(io::ErrorKind::InvalidData, "prefix too long");
        match H264Error::from(invalid) {
            H264Error::MalformedSps(msg) => assert_eq!(msg, "prefix too long"),
            other => panic!("unexpected mapping: {other:?}"),
        }

        let other = io::Error::other("disk on fire");
        assert!(matches!(H264Error::from(other), H264Error::Io(_)));
    }
}
