//! Stream filter that rewrites the SPS of an H.264 elementary stream.
//!
//! ## Purpose
//!
//! Remuxed or re-stamped streams often carry a wrong frame rate or level in
//! their SPS. This filter patches the level and the VUI timing fields without
//! touching any slice data.
//!
//! ## How it Works
//!
//! - The argument string is parsed on the first call. With nothing to do the
//!   filter turns into a pass-through.
//! - The SPS in the extradata (`avcC` or Annex-B) is rewritten once.
//! - On every keyframe the NAL units are walked up to the first slice. The
//!   first SPS found is unescaped, rewritten, re-escaped and spliced back in.
//! - A failed rewrite leaves the buffer as it was.

mod args;
mod stage;

use byteorder::{BigEndian, ByteOrder};
use bytes::{Bytes, BytesMut};
use tracing::{debug, warn};

pub use self::args::{FilterArgs, FilterArgsError};
pub use self::stage::{FilterOutcome, FilterStage};
use crate::nal::{NAL_LENGTH_SIZE, NalFraming, NalUnit, NalUnits};
use crate::sps::{KNOWN_PROFILES, SpsOverrides, rewrite_sps};
use crate::{AVCDecoderConfigurationRecord, H264Error, NALUnitType, Result, escape, unescape};

/// Frame rate / level rewriting filter for one H.264 stream.
#[derive(Debug)]
pub struct H264FpsFilter {
    stage: FilterStage,
    raw_args: String,
    overrides: SpsOverrides,
    extradata_framing: Option<NalFraming>,
}

impl H264FpsFilter {
    /// Creates a filter from an argument string such as `fps=25/level=4.1`.
    /// The string is parsed on first use.
    pub fn new(args: impl Into<String>) -> Self {
        Self {
            stage: FilterStage::Unconfigured,
            raw_args: args.into(),
            overrides: SpsOverrides::default(),
            extradata_framing: None,
        }
    }

    /// Creates an already configured filter.
    pub fn with_args(args: FilterArgs) -> Self {
        let mut filter = Self::new(String::new());
        filter.apply_args(Ok(args));
        filter
    }

    /// Current lifecycle stage.
    pub const fn stage(&self) -> FilterStage {
        self.stage
    }

    fn advance(&mut self, next: FilterStage) {
        if self.stage.can_advance_to(&next) {
            debug!("h264 filter stage {:?} -> {:?}", self.stage, next);
            self.stage = next;
        } else {
            warn!("h264 filter refused transition {:?} -> {:?}", self.stage, next);
        }
    }

    fn configure(&mut self) {
        if self.stage == FilterStage::Unconfigured {
            let parsed = self.raw_args.parse::<FilterArgs>();
            self.apply_args(parsed);
        }
    }

    fn apply_args(&mut self, parsed: std::result::Result<FilterArgs, FilterArgsError>) {
        match parsed {
            Ok(args) if !args.is_empty() => {
                self.overrides = args.overrides();
                self.advance(FilterStage::ArgsParsed);
            }
            Ok(_) => {
                debug!("no filter arguments recognized, passing stream through");
                self.advance(FilterStage::Passthrough);
            }
            Err(err) => {
                warn!("{}, passing stream through", H264Error::from(err));
                self.advance(FilterStage::Passthrough);
            }
        }
    }

    /// Rewrites the SPS carried in out-of-band extradata.
    ///
    /// Only acts once, before the first packet. `extradata` may be swapped
    /// for a larger buffer, which is signalled by [`FilterOutcome::Replaced`].
    pub fn filter_extradata(&mut self, extradata: &mut BytesMut) -> FilterOutcome {
        self.configure();
        if !self.stage.accepts_extradata() {
            return FilterOutcome::Unchanged;
        }

        match self.patch_extradata(extradata) {
            Ok(Some(outcome)) => {
                self.advance(FilterStage::ExtradataPatched);
                outcome
            }
            Ok(None) => {
                debug!("no rewritable sps in extradata");
                self.advance(FilterStage::ExtradataSkipped);
                FilterOutcome::Unchanged
            }
            Err(err) => {
                warn!("failed to rewrite extradata sps: {}", err);
                self.advance(FilterStage::ExtradataSkipped);
                FilterOutcome::Unchanged
            }
        }
    }

    /// Rewrites the first SPS of a keyframe packet. Other packets are not
    /// looked at.
    pub fn filter_packet(&mut self, packet: &mut BytesMut, keyframe: bool) -> FilterOutcome {
        self.configure();
        match self.stage {
            FilterStage::Unconfigured | FilterStage::Passthrough => return FilterOutcome::Unchanged,
            FilterStage::ArgsParsed => self.advance(FilterStage::ExtradataSkipped),
            _ => {}
        }

        if !keyframe || packet.is_empty() {
            return FilterOutcome::Unchanged;
        }

        let framing = match self.stage {
            FilterStage::BitstreamTypeKnown(framing) => framing,
            _ => {
                let framing = self
                    .extradata_framing
                    .unwrap_or_else(|| NalFraming::detect(&packet[..]));
                debug!("detected {:?} framing", framing);
                self.advance(FilterStage::BitstreamTypeKnown(framing));
                framing
            }
        };

        match self.patch_first_sps(packet, framing) {
            Ok(outcome) => outcome.unwrap_or(FilterOutcome::Unchanged),
            Err(err) => {
                warn!("failed to rewrite packet sps: {}", err);
                FilterOutcome::Unchanged
            }
        }
    }

    fn patch_extradata(&mut self, extradata: &mut BytesMut) -> Result<Option<FilterOutcome>> {
        match extradata.first().copied() {
            Some(1) => self.patch_avcc(extradata),
            Some(_) if NalFraming::detect(&extradata[..]) == NalFraming::AnnexB => {
                self.patch_first_sps(extradata, NalFraming::AnnexB)
            }
            _ => Ok(None),
        }
    }

    fn patch_avcc(&mut self, extradata: &mut BytesMut) -> Result<Option<FilterOutcome>> {
        let mut record = AVCDecoderConfigurationRecord::parse(Bytes::copy_from_slice(&extradata[..]))?;
        // packets of an avcC stream carry length fields
        self.extradata_framing = Some(NalFraming::LengthPrefixed);

        let Some(index) = record.sps.iter().position(|sps| {
            sps.first().map(|b| NALUnitType::from_header_byte(*b)) == Some(NALUnitType::SPS) && has_known_profile(sps)
        }) else {
            return Ok(None);
        };

        let rewritten = rewrite_sps(&unescape(&record.sps[index])?, &self.overrides)?;
        record.sps[index] = Bytes::from(escape(&rewritten.data)?);
        if let Some(level_idc) = self.overrides.level_idc {
            record.level_indication = level_idc;
        }

        let mut built = Vec::with_capacity(record.size());
        record.build(&mut built)?;

        Ok(Some(replace_contents(extradata, &built)))
    }

    /// Rewrites the first SPS ahead of any slice. `None` when there is none.
    fn patch_first_sps(&self, buf: &mut BytesMut, framing: NalFraming) -> Result<Option<FilterOutcome>> {
        let Some(unit) = NalUnits::new(&buf[..], framing)
            .take_while(|unit| !unit.unit_type.is_slice())
            .filter(|unit| unit.unit_type == NALUnitType::SPS)
            .find(|unit| has_known_profile(&buf[unit.range()]))
        else {
            return Ok(None);
        };

        let rewritten = rewrite_sps(&unescape(&buf[unit.range()])?, &self.overrides)?;
        let escaped = escape(&rewritten.data)?;

        splice_nal(buf, &unit, &escaped).map(Some)
    }
}

/// Whether the SPS NAL `unit` has a `profile_idc` whose field layout is known.
/// Walking any other profile could misplace every field after `level_idc`.
fn has_known_profile(unit: &[u8]) -> bool {
    let profile_idc = unit.get(1).copied();
    let known = profile_idc.is_some_and(|p| KNOWN_PROFILES.contains(&p));
    if !known {
        warn!("skipping sps with unknown profile_idc {:?}", profile_idc);
    }
    known
}

/// Puts `replacement` where `unit` was, fixing up the length field of
/// length-prefixed framing.
fn splice_nal(buf: &mut BytesMut, unit: &NalUnit, replacement: &[u8]) -> Result<FilterOutcome> {
    let range = unit.range();
    if buf[range.clone()] == *replacement {
        return Ok(FilterOutcome::Unchanged);
    }

    if unit.framing == NalFraming::LengthPrefixed {
        let len = u32::try_from(replacement.len())
            .map_err(|_| H264Error::UnsupportedConfiguration("nal unit larger than 4 GiB".into()))?;
        BigEndian::write_u32(&mut buf[unit.offset - NAL_LENGTH_SIZE..unit.offset], len);
    }

    let outcome = if replacement.len() <= unit.len {
        let new_end = range.start + replacement.len();
        buf[range.start..new_end].copy_from_slice(replacement);
        if new_end < range.end {
            buf.copy_within(range.end.., new_end);
            let shrink = range.end - new_end;
            buf.truncate(buf.len() - shrink);
        }
        FilterOutcome::Mutated
    } else {
        let mut out = BytesMut::with_capacity(buf.len() - unit.len + replacement.len());
        out.extend_from_slice(&buf[..range.start]);
        out.extend_from_slice(replacement);
        out.extend_from_slice(&buf[range.end..]);
        *buf = out;
        FilterOutcome::Replaced
    };

    debug!("spliced sps: {} -> {} bytes ({:?})", unit.len, replacement.len(), outcome);
    Ok(outcome)
}

fn replace_contents(buf: &mut BytesMut, contents: &[u8]) -> FilterOutcome {
    if buf[..] == *contents {
        FilterOutcome::Unchanged
    } else if contents.len() <= buf.len() {
        buf.truncate(contents.len());
        buf.copy_from_slice(contents);
        FilterOutcome::Mutated
    } else {
        *buf = BytesMut::from(contents);
        FilterOutcome::Replaced
    }
}
