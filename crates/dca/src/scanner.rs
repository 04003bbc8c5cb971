//! Incremental frame boundary search.

use tracing::trace;

use crate::sync::{SYNCWORD_SUBSTREAM, SyncFamily};
use crate::{DcaError, Result};

/// Where the scanner is within the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPhase {
    /// No frame start seen yet.
    #[default]
    Searching,
    /// A marker was found, its size field is still to come.
    AwaitingSize,
    /// The size of a 16-bit big endian core frame is known, an extension
    /// substream may still follow it.
    SizeKnown,
    /// An extension substream follows the core frame, its size field is
    /// still to come.
    ExtensionFound,
    /// The frame size is final, waiting for the next marker.
    AwaitingNextMarker,
}

/// Outcome of [`DcaFrameScanner::scan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanResult {
    /// The next frame starts at this offset relative to the scanned buffer.
    ///
    /// The offset is negative when the marker began in an earlier buffer.
    Boundary(isize),
    /// The end of the current frame has not been seen yet.
    NeedMoreData,
}

impl ScanResult {
    /// The boundary offset, or [`DcaError::NotYetComplete`].
    pub fn boundary(self) -> Result<isize> {
        match self {
            Self::Boundary(offset) => Ok(offset),
            Self::NeedMoreData => Err(DcaError::NotYetComplete),
        }
    }
}

/// Finds DCA frame boundaries in a stream delivered in chunks of any size.
///
/// All state lives in the scanner, so splitting the input differently never
/// changes which boundaries are found. The first marker locks the stream to
/// its family: a core stream only ends a frame on the same core marker,
/// while a substream-only stream accepts any marker.
#[derive(Debug, Clone)]
pub struct DcaFrameScanner {
    state: u64,
    family: Option<SyncFamily>,
    size: u64,
    frame_size: u64,
    phase: ScanPhase,
    start_offset: u64,
}

impl Default for DcaFrameScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DcaFrameScanner {
    /// Creates a scanner that has seen no input.
    pub const fn new() -> Self {
        Self {
            state: u64::MAX,
            family: None,
            size: 0,
            frame_size: 0,
            phase: ScanPhase::Searching,
            start_offset: 0,
        }
    }

    /// The family the stream is locked to.
    pub const fn family(&self) -> Option<SyncFamily> {
        self.family
    }

    /// Current phase.
    pub const fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Bytes of garbage before the first marker of the stream.
    pub const fn start_offset(&self) -> usize {
        self.start_offset as usize
    }

    /// Returns [`Self::start_offset`] and clears it.
    pub fn take_start_offset(&mut self) -> usize {
        std::mem::take(&mut self.start_offset) as usize
    }

    /// Forgets everything, including the family lock.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    fn accepts(&self, found: SyncFamily) -> bool {
        match self.family {
            None | Some(SyncFamily::Substream) => true,
            Some(family) => family == found,
        }
    }

    fn push_byte(&mut self, byte: u8) {
        self.size += 1;
        self.state = (self.state << 8) | u64::from(byte);
    }

    /// Feeds `buf` and reports where the next frame starts.
    ///
    /// After a boundary the scanner restarts from the returned offset, so the
    /// caller must pass the bytes from there on in the next call.
    pub fn scan(&mut self, buf: &[u8]) -> ScanResult {
        let mut i = 0;

        if self.phase == ScanPhase::Searching {
            while i < buf.len() {
                self.push_byte(buf[i]);
                i += 1;

                // the window starts filled with ones, so a marker only counts
                // once all of its bytes were actually fed
                let Some(found) = SyncFamily::from_window(self.state)
                    .filter(|f| self.size >= f.marker_len() as u64 && self.accepts(*f))
                else {
                    continue;
                };

                if self.family.is_none() {
                    self.start_offset = self.size - found.marker_len() as u64;
                }
                self.family = Some(found);
                self.phase = ScanPhase::AwaitingSize;
                self.size = 0;
                break;
            }
        }

        if self.phase == ScanPhase::Searching {
            return ScanResult::NeedMoreData;
        }

        while i < buf.len() {
            self.push_byte(buf[i]);

            match self.phase {
                ScanPhase::AwaitingSize => {
                    self.read_frame_size();
                    i += 1;
                    continue;
                }
                ScanPhase::SizeKnown
                    if self.state & 0xFFFF_FFFF == SYNCWORD_SUBSTREAM as u64 && self.frame_size <= self.size + 2 =>
                {
                    self.frame_size = self.size + 2;
                    self.phase = ScanPhase::ExtensionFound;
                    i += 1;
                    continue;
                }
                ScanPhase::ExtensionFound if self.size == self.frame_size + 4 => {
                    self.frame_size += exss_framesize(self.state);
                    self.phase = ScanPhase::AwaitingNextMarker;
                    i += 1;
                    continue;
                }
                _ => {}
            }

            if self.frame_size > self.size {
                i += 1;
                continue;
            }

            if let Some(found) = SyncFamily::from_window(self.state) {
                if self.family == Some(found) || self.family == Some(SyncFamily::Substream) {
                    let offset = i as isize - (found.marker_len() as isize - 1);
                    trace!(?found, frame_size = self.frame_size, offset, "dca frame boundary");

                    self.state = u64::MAX;
                    self.size = 0;
                    self.phase = ScanPhase::Searching;
                    return ScanResult::Boundary(offset);
                }
            }

            i += 1;
        }

        ScanResult::NeedMoreData
    }

    fn read_frame_size(&mut self) {
        let (ready, frame_size, next) = match self.family {
            Some(SyncFamily::CoreBe) => (self.size == 2, core_framesize(self.state), ScanPhase::SizeKnown),
            Some(SyncFamily::CoreLe) => (
                self.size == 2,
                core_framesize(state_le(self.state)),
                ScanPhase::AwaitingNextMarker,
            ),
            Some(SyncFamily::Core14Be) => (
                self.size == 4,
                core_framesize(state_14(self.state)) * 8 / 14 * 2,
                ScanPhase::AwaitingNextMarker,
            ),
            Some(SyncFamily::Core14Le) => (
                self.size == 4,
                core_framesize(state_14(state_le(self.state))) * 8 / 14 * 2,
                ScanPhase::AwaitingNextMarker,
            ),
            Some(SyncFamily::Substream) => (self.size == 6, exss_framesize(self.state), ScanPhase::AwaitingNextMarker),
            None => return,
        };

        if ready {
            self.frame_size = frame_size;
            self.phase = next;
        }
    }
}

/// Swaps the bytes of both 16-bit words in the low 32 bits.
const fn state_le(state: u64) -> u64 {
    ((state & 0xFF00_FF00) >> 8) | ((state & 0x00FF_00FF) << 8)
}

/// Joins the payload bits of two 14-bit words.
const fn state_14(state: u64) -> u64 {
    ((state & 0x3FFF_0000) >> 8) | ((state & 0x3FFF) >> 6)
}

const fn core_framesize(state: u64) -> u64 {
    ((state >> 4) & 0x3FFF) + 1
}

const fn exss_framesize(state: u64) -> u64 {
    if state & (1 << 37) != 0 {
        ((state >> 5) & 0xF_FFFF) + 1
    } else {
        ((state >> 13) & 0xFFFF) + 1
    }
}
