use std::io;

use thiserror::Error;

/// Errors produced while scanning or parsing DCA frames.
#[derive(Error, Debug)]
pub enum DcaError {
    /// The buffer is shorter than the structure it should hold.
    #[error("need {needed} bytes but only {available} are available")]
    OutOfRange {
        /// Bytes required.
        needed: usize,
        /// Bytes present.
        available: usize,
    },

    /// A header field holds a value the format does not allow.
    #[error("malformed frame header: {0}")]
    MalformedFrameHeader(&'static str),

    /// The frame is valid but uses a feature this crate does not handle.
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    /// No frame boundary has been confirmed yet, more input is needed.
    #[error("frame boundary not found yet")]
    NotYetComplete,
}

impl From<io::Error> for DcaError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::MalformedFrameHeader("header runs past the end of the frame"),
            io::ErrorKind::InvalidData => Self::MalformedFrameHeader("field offset outside of the frame"),
            _ => Self::UnsupportedConfiguration(err.to_string()),
        }
    }
}
