//! Splits a chunked DCA stream into whole frames.

use bytes::{Buf, Bytes, BytesMut};
use tracing::{debug, warn};

use crate::params::{DcaParameterExtractor, FrameParameters};
use crate::scanner::{DcaFrameScanner, ScanResult};

/// Settings for [`DcaFramer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DcaFramerConfig {
    /// Every pushed chunk already is one whole frame, as delivered by most
    /// containers, so no boundary search is done.
    pub complete_frames: bool,
}

/// A frame cut out of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DcaFrame {
    /// Frame bytes, starting with a sync word.
    pub data: Bytes,
    /// `None` when the frame header could not be read.
    pub params: Option<FrameParameters>,
}

/// Collects pushed bytes until a frame boundary is confirmed.
#[derive(Debug)]
pub struct DcaFramer {
    config: DcaFramerConfig,
    scanner: DcaFrameScanner,
    extractor: DcaParameterExtractor,
    pending: BytesMut,
    scanned: usize,
    sample_rate_pinned: bool,
}

impl DcaFramer {
    /// Creates a framer with a default extractor.
    pub fn new(config: DcaFramerConfig) -> Self {
        Self::with_extractor(config, DcaParameterExtractor::default())
    }

    /// Creates a framer that reads frame parameters with `extractor`.
    pub fn with_extractor(config: DcaFramerConfig, extractor: DcaParameterExtractor) -> Self {
        let sample_rate_pinned = extractor.context().pinned_sample_rate.is_some();
        Self {
            config,
            scanner: DcaFrameScanner::new(),
            extractor,
            pending: BytesMut::new(),
            scanned: 0,
            sample_rate_pinned,
        }
    }

    /// Bytes held back until their frame is complete.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Feeds a chunk and returns the frames it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<DcaFrame> {
        if self.config.complete_frames {
            let frame = self.emit(Bytes::copy_from_slice(chunk));
            return vec![frame];
        }

        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        loop {
            let end = match self.scanner.scan(&self.pending[self.scanned..]) {
                ScanResult::Boundary(offset) => self.scanned.checked_add_signed(offset).filter(|end| *end > 0),
                ScanResult::NeedMoreData => None,
            };

            let Some(end) = end else {
                self.scanned = self.pending.len();
                break;
            };

            let mut data = self.pending.split_to(end);
            self.scanned = 0;

            let garbage = self.scanner.take_start_offset();
            if garbage > 0 && garbage < data.len() {
                debug!(garbage, "dropping bytes before the first dca frame");
                data.advance(garbage);
            }

            frames.push(self.emit(data.freeze()));
        }

        frames
    }

    /// Returns whatever is left as the last frame and resets the scanner.
    pub fn flush(&mut self) -> Option<DcaFrame> {
        self.scanned = 0;
        let garbage = self.scanner.take_start_offset();
        self.scanner.reset();

        if self.pending.is_empty() {
            return None;
        }

        let mut data = self.pending.split();
        if garbage > 0 && garbage < data.len() {
            data.advance(garbage);
        }
        Some(self.emit(data.freeze()))
    }

    fn emit(&mut self, data: Bytes) -> DcaFrame {
        let params = match self.extractor.extract(&data) {
            Ok(params) => {
                // the first sample rate of a stream stays its time base
                if !self.sample_rate_pinned && params.sample_rate != 0 {
                    self.extractor.pin_sample_rate(params.sample_rate);
                    self.sample_rate_pinned = true;
                }
                Some(params)
            }
            Err(e) => {
                warn!(len = data.len(), "cannot read dca frame parameters: {}", e);
                None
            }
        };

        DcaFrame { data, params }
    }
}
