//! H.264 bitstream surgery: find NAL units, undo and redo emulation
//! prevention, and rewrite fields of the Sequence Parameter Set in place.
//!
//! The SPS is never fully decoded into a struct and re-encoded. It is walked
//! field by field with every field written back as read, so only the fields
//! that are asked to change do change, and unmodelled trailing data survives.
//!
//! ## Examples
//!
//! ### Rewriting a stream
//!
//! ```rust
//! use bytes::BytesMut;
//!
//! use h264::{FilterOutcome, H264FpsFilter};
//!
//! let mut filter = H264FpsFilter::new("fps=25:1/level=4.1");
//!
//! // a keyframe packet in length-prefixed framing without an SPS
//! let mut packet = BytesMut::from(&[0x00, 0x00, 0x00, 0x02, 0x65, 0x88][..]);
//! assert_eq!(filter.filter_packet(&mut packet, true), FilterOutcome::Unchanged);
//! ```
//!
//! ### Walking NAL units
//!
//! ```rust
//! use h264::{NALUnitType, NalFraming, NalUnits, locate_next_nal};
//!
//! let buf = [0x00, 0x00, 0x01, 0x67, 0xAA, 0x00, 0x00, 0x01, 0x65, 0xBB];
//! assert_eq!(locate_next_nal(&buf, 0), Some((NALUnitType::SPS, 4)));
//!
//! let types: Vec<_> = NalUnits::new(&buf, NalFraming::AnnexB).map(|u| u.unit_type).collect();
//! assert_eq!(types, [NALUnitType::SPS, NALUnitType::IDRSlice]);
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

mod config;
mod enums;
mod error;
mod filter;
mod io;
mod nal;
mod sps;

pub use enums::*;
pub use error::H264Error;
pub use filter::{FilterArgs, FilterArgsError, FilterOutcome, FilterStage, H264FpsFilter};
pub use io::{EmulationPreventionIo, escape, escape_capacity, unescape};
pub use nal::{NAL_LENGTH_SIZE, NalFraming, NalUnit, NalUnits, locate_next_nal};
pub use sps::{
    FrameRate, HIGH_PROFILES, KNOWN_PROFILES, RewrittenSps, SPS_REWRITE_SLACK, SpsInfo, SpsOverrides, SpsRewriter,
    TimingInfo, rewrite_sps,
};

pub use self::config::AVCDecoderConfigurationRecord;

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, H264Error>;
