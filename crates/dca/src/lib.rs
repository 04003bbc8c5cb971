//! DTS Coherent Acoustics (DCA) framing.
//!
//! [`DcaFrameScanner`] finds frame boundaries in a byte stream that arrives in
//! arbitrary chunks, [`DcaFramer`] turns those boundaries into whole frames,
//! and [`DcaParameterExtractor`] reads the duration, sample rate, speaker
//! layout and profile of each frame without decoding any audio.
//!
//! Core frames are accepted in all four packings (16-bit and 14-bit, big and
//! little endian). Extension substreams carrying XBR, LBR (DTS Express) or
//! XLL (DTS-HD Master Audio) components are recognized, either on their own
//! or appended to a core frame.
//!
//! ## Examples
//!
//! ```rust
//! use dca::{DcaFramer, DcaFramerConfig, ScanResult, DcaFrameScanner};
//!
//! let mut scanner = DcaFrameScanner::new();
//! assert_eq!(scanner.scan(&[0x00; 64]), ScanResult::NeedMoreData);
//!
//! let mut framer = DcaFramer::new(DcaFramerConfig::default());
//! assert!(framer.push(&[0x00; 64]).is_empty());
//! ```
//!
//! ## License
//!
//! This project is licensed under the [MIT](./LICENSE.MIT) or [Apache-2.0](./LICENSE.Apache-2.0) license.
//! You can choose between one of them if you use this work.
//!
//! `SPDX-License-Identifier: MIT OR Apache-2.0`
#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod channel_layout;
mod core_frame;
mod error;
mod exss;
mod framer;
mod params;
mod scanner;
mod sync;

#[cfg(test)]
mod test_utils;

pub use channel_layout::{DcaSpeakerMask, WavLayout};
pub use error::DcaError;
pub use framer::{DcaFrame, DcaFramer, DcaFramerConfig};
pub use params::{DcaParameterExtractor, DcaProfile, ExtractorContext, FrameParameters, parse_frame_parameters};
pub use scanner::{DcaFrameScanner, ScanPhase, ScanResult};
pub use sync::{CORE_FRAME_HEADER_SIZE, SyncFamily, convert_bitstream};

pub use self::core_frame::{CoreFrameHeader, ExtAudioType, LegacyExtension, find_legacy_extension, xxch_channel_mask};
pub use self::exss::{ExssAsset, ExssHeader, ExtensionMask, LbrHeader, xll_nsamples_log2};

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, DcaError>;
