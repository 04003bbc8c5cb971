//! Per-frame stream parameters.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use tracing::{debug, trace, warn};

use crate::channel_layout::{DcaSpeakerMask, WavLayout};
use crate::core_frame::{CoreFrameHeader, ExtAudioType, LegacyExtension, find_legacy_extension, xxch_channel_mask};
use crate::exss::{ExssHeader, ExtensionMask, FREQ_RANGES, LbrHeader, SAMPLING_FREQS, xll_nsamples_log2};
use crate::sync::{CORE_FRAME_HEADER_SIZE, SYNCWORD_SUBSTREAM, SyncFamily, convert_bitstream};
use crate::{DcaError, Result};

/// Samples per channel of an LBR frame at the lowest frequency range.
const LBR_BASE_SAMPLES: u32 = 1024;

/// The flavour of DTS a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DcaProfile {
    /// Core only.
    Dts,
    /// Core with a 6.1 extension.
    DtsEs,
    /// Core with a 96 kHz extension.
    Dts9624,
    /// Core with lossy substream extensions.
    DtsHdHra,
    /// Lossless.
    DtsHdMa,
    /// Low bitrate substream only.
    DtsExpress,
}

impl fmt::Display for DcaProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DcaProfile::Dts => write!(f, "DTS"),
            DcaProfile::DtsEs => write!(f, "DTS-ES"),
            DcaProfile::Dts9624 => write!(f, "DTS 96/24"),
            DcaProfile::DtsHdHra => write!(f, "DTS-HD HRA"),
            DcaProfile::DtsHdMa => write!(f, "DTS-HD MA"),
            DcaProfile::DtsExpress => write!(f, "DTS Express"),
        }
    }
}

/// What a frame says about the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameParameters {
    /// Samples per channel.
    pub duration: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Speakers carried by the frame.
    pub channel_mask: DcaSpeakerMask,
    /// Stream profile.
    pub profile: DcaProfile,
    /// `channel_mask` in WAV channel order.
    pub wav_layout: WavLayout,
}

impl FrameParameters {
    fn new(duration: u32, sample_rate: u32, channel_mask: DcaSpeakerMask, profile: DcaProfile) -> Self {
        Self {
            duration,
            sample_rate,
            channel_mask,
            profile,
            wav_layout: channel_mask.to_wav_layout(),
        }
    }
}

/// Stream properties the caller already knows, usually from the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractorContext {
    /// Speaker layout to report instead of searching for legacy extensions.
    pub pinned_channel_mask: Option<DcaSpeakerMask>,
    /// Sample rate durations are rescaled to.
    pub pinned_sample_rate: Option<u32>,
}

impl ExtractorContext {
    /// Pins the speaker layout.
    pub const fn with_channel_mask(mut self, mask: DcaSpeakerMask) -> Self {
        self.pinned_channel_mask = Some(mask);
        self
    }

    /// Pins the sample rate.
    pub const fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.pinned_sample_rate = Some(sample_rate);
        self
    }
}

/// Reads [`FrameParameters`] from whole frames.
///
/// LBR streams only signal their sample rate in decoder init headers, so the
/// extractor remembers the last one and must see the frames of a stream in
/// order.
#[derive(Debug, Clone, Default)]
pub struct DcaParameterExtractor {
    context: ExtractorContext,
    lbr_rate_code: Option<u8>,
}

impl DcaParameterExtractor {
    /// Creates an extractor with the given context.
    pub const fn new(context: ExtractorContext) -> Self {
        Self {
            context,
            lbr_rate_code: None,
        }
    }

    /// The context in use.
    pub const fn context(&self) -> &ExtractorContext {
        &self.context
    }

    /// Pins the sample rate after construction.
    pub fn pin_sample_rate(&mut self, sample_rate: u32) {
        self.context.pinned_sample_rate = Some(sample_rate);
    }

    /// Reads the parameters of the frame starting at `frame[0]`.
    pub fn extract(&mut self, frame: &[u8]) -> Result<FrameParameters> {
        if frame.len() < CORE_FRAME_HEADER_SIZE {
            return Err(DcaError::OutOfRange {
                needed: CORE_FRAME_HEADER_SIZE,
                available: frame.len(),
            });
        }

        let family = SyncFamily::detect(frame).ok_or(DcaError::MalformedFrameHeader("no sync word at frame start"))?;
        let mut params = match family {
            SyncFamily::Substream => self.extract_substream(frame)?,
            _ => self.extract_core(frame, family)?,
        };

        if let Some(mask) = self.context.pinned_channel_mask {
            params.channel_mask = mask;
            params.wav_layout = mask.to_wav_layout();
        }

        if let Some(pinned) = self.context.pinned_sample_rate {
            if pinned != params.sample_rate && params.sample_rate != 0 {
                params.duration = rescale(params.duration, pinned, params.sample_rate);
                params.sample_rate = pinned;
            }
        }

        Ok(params)
    }

    fn extract_substream(&mut self, frame: &[u8]) -> Result<FrameParameters> {
        let header = ExssHeader::parse(frame)?;
        let asset = &header.asset;

        if let Some(range) = asset.component(ExtensionMask::LBR) {
            let rate_code = match LbrHeader::parse(&frame[range])? {
                LbrHeader::DecoderInit { rate_code } => {
                    self.lbr_rate_code = Some(rate_code);
                    rate_code
                }
                LbrHeader::SyncOnly => self
                    .lbr_rate_code
                    .ok_or(DcaError::MalformedFrameHeader("lbr sync header before decoder init"))?,
            };

            let code = rate_code as usize;
            return Ok(FrameParameters::new(
                LBR_BASE_SAMPLES << FREQ_RANGES[code],
                SAMPLING_FREQS[code],
                asset.speaker_mask(),
                DcaProfile::DtsExpress,
            ));
        }

        if let Some(range) = asset.component(ExtensionMask::XLL) {
            let nsamples_log2 = xll_nsamples_log2(&frame[range])?;
            let sample_rate = asset.max_sample_rate;
            return Ok(FrameParameters::new(
                (1 + (sample_rate > 96000) as u32) << nsamples_log2,
                sample_rate,
                asset.speaker_mask(),
                DcaProfile::DtsHdMa,
            ));
        }

        Err(DcaError::MalformedFrameHeader("substream without lbr or xll"))
    }

    fn extract_core(&mut self, frame: &[u8], family: SyncFamily) -> Result<FrameParameters> {
        let converted = convert_bitstream(frame, family)?;
        let header = CoreFrameHeader::parse(&converted)?;

        let mut profile = DcaProfile::Dts;
        if header.ext_audio_present {
            match header.ext_audio_type {
                ExtAudioType::Xch | ExtAudioType::Xxch => profile = DcaProfile::DtsEs,
                ExtAudioType::X96 => profile = DcaProfile::Dts9624,
                ExtAudioType::Reserved(_) => {}
            }
        }

        let mut channel_mask = header.channel_mask();
        if self.context.pinned_channel_mask.is_none() {
            match find_legacy_extension(&converted, &header) {
                Some(LegacyExtension::Xch(_)) => channel_mask |= DcaSpeakerMask::CS,
                Some(LegacyExtension::Xxch(pos)) => match xxch_channel_mask(&converted[pos..], channel_mask) {
                    Ok(mask) => channel_mask = mask,
                    Err(e) => warn!("ignoring xxch extension: {}", e),
                },
                Some(LegacyExtension::X96(pos)) => trace!(pos, "x96 extension present"),
                None => {}
            }
        }

        // substream appended to a 16-bit big endian core
        let core_size = (header.frame_size as usize).next_multiple_of(4);
        if family == SyncFamily::CoreBe
            && frame.len() >= core_size + 4
            && BigEndian::read_u32(&frame[core_size..]) == SYNCWORD_SUBSTREAM
        {
            match ExssHeader::parse(&frame[core_size..]) {
                Ok(exss) => {
                    let mask = exss.asset.extension_mask;
                    if mask.contains(ExtensionMask::XLL) {
                        profile = DcaProfile::DtsHdMa;
                    } else if mask.intersects(ExtensionMask::XBR | ExtensionMask::XXCH | ExtensionMask::X96) {
                        profile = DcaProfile::DtsHdHra;
                    }
                }
                Err(e) => debug!("ignoring substream after core frame: {}", e),
            }
        }

        Ok(FrameParameters::new(
            header.duration(),
            header.sample_rate(),
            channel_mask,
            profile,
        ))
    }
}

/// Reads the parameters of a single frame with no stream context.
pub fn parse_frame_parameters(frame: &[u8]) -> Result<FrameParameters> {
    DcaParameterExtractor::default().extract(frame)
}

/// `duration * to / from`, rounded to nearest.
fn rescale(duration: u32, to: u32, from: u32) -> u32 {
    let scaled = (duration as u64 * to as u64 + from as u64 / 2) / from as u64;
    u32::try_from(scaled).unwrap_or(u32::MAX)
}
