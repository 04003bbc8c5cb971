//! Core frame header and the legacy extensions appended to a core frame.

use byteorder::{BigEndian, ByteOrder};
use bytes_util::BitReader;
use crc::{CRC_16_IBM_3740, Crc};
use tracing::trace;

use crate::channel_layout::{AUDIO_MODE_COUNT, DcaSpeakerMask};
use crate::sync::{SYNCWORD_CORE_BE, SYNCWORD_X96, SYNCWORD_XCH, SYNCWORD_XXCH};
use crate::{DcaError, Result};

/// Samples per PCM block.
pub const PCMBLOCK_SAMPLES: u32 = 32;

/// PCM blocks come in multiples of this.
const SUBBAND_SAMPLES: u8 = 8;

/// Core sample rates by `SFREQ`. Zero marks an invalid code.
pub const CORE_SAMPLE_RATES: [u32; 16] = [
    0, 8000, 16000, 32000, 0, 0, 11025, 22050, 44100, 0, 0, 12000, 24000, 48000, 0, 0,
];

/// Source PCM resolution by `PCMR`. Zero marks an invalid code.
const BITS_PER_SAMPLE: [u8; 8] = [16, 16, 20, 20, 0, 24, 24, 0];

/// Header checksum of an XXCH frame (CRC-16/CCITT-FALSE).
const XXCH_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Bit of the centre surround, the first speaker an XXCH channel set can add.
const CS_INDEX: u8 = 6;

/// Most channels one XXCH channel set may add.
const XXCH_CHANNELS_MAX: u32 = 2;

/// Extension signalled in the core header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtAudioType {
    /// 6.1 centre surround channel.
    Xch,
    /// 96 kHz sampling.
    X96,
    /// Extra channels beyond 5.1.
    Xxch,
    /// Any other value.
    Reserved(u8),
}

impl From<u8> for ExtAudioType {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Xch,
            2 => Self::X96,
            6 => Self::Xxch,
            other => Self::Reserved(other),
        }
    }
}

/// A core frame header.
///
/// ETSI TS 102 114 - 5.3.1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreFrameHeader {
    /// `FTYPE`, set for a normal frame.
    pub normal_frame: bool,
    /// `SHORT` plus one, always 32.
    pub deficit_samples: u8,
    /// `CPF`
    pub crc_present: bool,
    /// `NBLKS` plus one.
    pub npcmblocks: u8,
    /// `FSIZE` plus one, in bytes of the 16-bit packing.
    pub frame_size: u16,
    /// `AMODE`
    pub audio_mode: u8,
    /// `SFREQ`
    pub sr_code: u8,
    /// `RATE`
    pub br_code: u8,
    /// `DYNF`
    pub drc_present: bool,
    /// `TIMEF`
    pub ts_present: bool,
    /// `AUXF`
    pub aux_present: bool,
    /// `HDCD`
    pub hdcd_master: bool,
    /// `EXT_AUDIO_ID`
    pub ext_audio_type: ExtAudioType,
    /// `EXT_AUDIO`
    pub ext_audio_present: bool,
    /// `ASPF`
    pub sync_ssf: bool,
    /// `LFF`, 1 or 2 when an LFE channel is present.
    pub lfe_present: u8,
    /// `HFLAG`
    pub predictor_history: bool,
    /// `FILTS`
    pub filter_perfect: bool,
    /// `VERNUM`
    pub encoder_rev: u8,
    /// `CHIST`
    pub copy_hist: u8,
    /// `PCMR`
    pub pcmr_code: u8,
    /// `SUMF`
    pub sumdiff_front: bool,
    /// `SUMS`
    pub sumdiff_surround: bool,
    /// `DIALNORM`
    pub dn_code: u8,
}

impl CoreFrameHeader {
    /// Parses a header from 16-bit big endian data.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new_from_slice(data);

        if reader.read_bits(32)? as u32 != SYNCWORD_CORE_BE {
            return Err(DcaError::MalformedFrameHeader("missing core sync word"));
        }

        let normal_frame = reader.read_bit()?;
        let deficit_samples = reader.read_bits(5)? as u8 + 1;
        if deficit_samples as u32 != PCMBLOCK_SAMPLES {
            return Err(DcaError::MalformedFrameHeader("deficit sample count"));
        }

        let crc_present = reader.read_bit()?;
        let npcmblocks = reader.read_bits(7)? as u8 + 1;
        if npcmblocks % SUBBAND_SAMPLES != 0 {
            return Err(DcaError::MalformedFrameHeader("pcm block count"));
        }

        let frame_size = reader.read_bits(14)? as u16 + 1;
        if frame_size < 96 {
            return Err(DcaError::MalformedFrameHeader("frame size"));
        }

        let audio_mode = reader.read_bits(6)? as u8;
        if audio_mode >= AUDIO_MODE_COUNT {
            return Err(DcaError::MalformedFrameHeader("audio mode"));
        }

        let sr_code = reader.read_bits(4)? as u8;
        if CORE_SAMPLE_RATES[sr_code as usize] == 0 {
            return Err(DcaError::MalformedFrameHeader("sample rate code"));
        }

        let br_code = reader.read_bits(5)? as u8;
        if reader.read_bit()? {
            return Err(DcaError::MalformedFrameHeader("reserved bit set"));
        }

        let drc_present = reader.read_bit()?;
        let ts_present = reader.read_bit()?;
        let aux_present = reader.read_bit()?;
        let hdcd_master = reader.read_bit()?;
        let ext_audio_type = ExtAudioType::from(reader.read_bits(3)? as u8);
        let ext_audio_present = reader.read_bit()?;
        let sync_ssf = reader.read_bit()?;
        let lfe_present = reader.read_bits(2)? as u8;
        if lfe_present == 3 {
            return Err(DcaError::MalformedFrameHeader("lfe flag"));
        }

        let predictor_history = reader.read_bit()?;
        if crc_present {
            reader.skip_bits(16)?;
        }

        let filter_perfect = reader.read_bit()?;
        let encoder_rev = reader.read_bits(4)? as u8;
        let copy_hist = reader.read_bits(2)? as u8;
        let pcmr_code = reader.read_bits(3)? as u8;
        if BITS_PER_SAMPLE[pcmr_code as usize] == 0 {
            return Err(DcaError::MalformedFrameHeader("pcm resolution code"));
        }

        Ok(Self {
            normal_frame,
            deficit_samples,
            crc_present,
            npcmblocks,
            frame_size,
            audio_mode,
            sr_code,
            br_code,
            drc_present,
            ts_present,
            aux_present,
            hdcd_master,
            ext_audio_type,
            ext_audio_present,
            sync_ssf,
            lfe_present,
            predictor_history,
            filter_perfect,
            encoder_rev,
            copy_hist,
            pcmr_code,
            sumdiff_front: reader.read_bit()?,
            sumdiff_surround: reader.read_bit()?,
            dn_code: reader.read_bits(4)? as u8,
        })
    }

    /// Size of the header in bits.
    pub const fn header_bits(&self) -> usize {
        if self.crc_present { 120 } else { 104 }
    }

    /// Samples per channel in this frame.
    pub const fn duration(&self) -> u32 {
        self.npcmblocks as u32 * PCMBLOCK_SAMPLES
    }

    /// Sample rate in Hz.
    pub const fn sample_rate(&self) -> u32 {
        CORE_SAMPLE_RATES[self.sr_code as usize]
    }

    /// Source PCM resolution.
    pub const fn bits_per_sample(&self) -> u8 {
        BITS_PER_SAMPLE[self.pcmr_code as usize]
    }

    /// Speakers of the core channels, including the LFE.
    pub fn channel_mask(&self) -> DcaSpeakerMask {
        let mut mask = DcaSpeakerMask::from_audio_mode(self.audio_mode).unwrap_or_default();
        if self.lfe_present != 0 {
            mask |= DcaSpeakerMask::LFE1;
        }
        mask
    }
}

/// A legacy extension found inside a core frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyExtension {
    /// XCH frame starting at this byte offset.
    Xch(usize),
    /// X96 frame starting at this byte offset.
    X96(usize),
    /// XXCH frame starting at this byte offset.
    Xxch(usize),
}

/// Looks for the extension announced by `header` in `frame`.
///
/// The search walks 32-bit words backwards from the end of the core frame,
/// since a payload word can alias a sync word. A hit must also agree with
/// the frame end: XCH and X96 sizes must reach it exactly (XCH may be one
/// byte long), and an XXCH header must pass its CRC.
pub fn find_legacy_extension(frame: &[u8], header: &CoreFrameHeader) -> Option<LegacyExtension> {
    if !header.ext_audio_present {
        return None;
    }

    let frame_size = header.frame_size as usize;
    let last = (frame_size / 4).min(frame.len() / 4);
    let first = header.header_bits() / 32;

    let mut next_word = 0u32;
    for pos in (first..last).rev() {
        let word = BigEndian::read_u32(&frame[pos * 4..]);
        let found = match (header.ext_audio_type, word) {
            (ExtAudioType::Xch, SYNCWORD_XCH) => {
                let size = (next_word >> 22) as usize + 1;
                let dist = frame_size - pos * 4;
                (size >= 96 && (size == dist || size - 1 == dist) && (next_word >> 15) & 0x7F == 0x08)
                    .then_some(LegacyExtension::Xch(pos * 4))
            }
            (ExtAudioType::X96, SYNCWORD_X96) => {
                let size = (next_word >> 20) as usize + 1;
                let dist = frame_size - pos * 4;
                (size >= 96 && size == dist).then_some(LegacyExtension::X96(pos * 4))
            }
            (ExtAudioType::Xxch, SYNCWORD_XXCH) => {
                let size = (next_word >> 26) as usize + 1;
                let dist = frame.len() - pos * 4;
                (size >= 11 && size <= dist && XXCH_CRC.checksum(&frame[(pos + 1) * 4..pos * 4 + size]) == 0)
                    .then_some(LegacyExtension::Xxch(pos * 4))
            }
            _ => None,
        };

        if found.is_some() {
            trace!("found {:?} in core frame", found);
            return found;
        }
        next_word = word;
    }

    None
}

/// Speakers of a core frame after applying an XXCH extension at the start of
/// `data`.
///
/// `core_mask` is the mask from the core header. The XXCH header names the
/// core speakers again, where side surrounds may stand in for surrounds.
pub fn xxch_channel_mask(data: &[u8], core_mask: DcaSpeakerMask) -> Result<DcaSpeakerMask> {
    let mut reader = BitReader::new_from_slice(data);

    if reader.read_bits(32)? as u32 != SYNCWORD_XXCH {
        return Err(DcaError::MalformedFrameHeader("missing xxch sync word"));
    }

    let header_size = reader.read_bits(6)? + 1;
    // channel set crc flag
    reader.skip_bits(1)?;
    let mask_nbits = reader.read_bits(5)? as u8 + 1;
    if mask_nbits <= CS_INDEX {
        return Err(DcaError::MalformedFrameHeader("xxch speaker mask width"));
    }

    let nchsets = reader.read_bits(2)? + 1;
    if nchsets > 1 {
        return Err(DcaError::UnsupportedConfiguration(format!("{nchsets} xxch channel sets")));
    }

    reader.skip_bits(14)?;
    let xxch_core_mask = DcaSpeakerMask::from_bits_truncate(reader.read_bits(mask_nbits)? as u32);

    let mut expected = core_mask;
    if expected.contains(DcaSpeakerMask::LS) && xxch_core_mask.contains(DcaSpeakerMask::LSS) {
        expected = (expected - DcaSpeakerMask::LS) | DcaSpeakerMask::LSS;
    }
    if expected.contains(DcaSpeakerMask::RS) && xxch_core_mask.contains(DcaSpeakerMask::RSS) {
        expected = (expected - DcaSpeakerMask::RS) | DcaSpeakerMask::RSS;
    }
    if expected != xxch_core_mask {
        return Err(DcaError::MalformedFrameHeader("xxch core speaker mask"));
    }

    reader.seek_to_bit(header_size * 8)?;

    // channel set header size
    reader.skip_bits(7)?;

    let nchannels = reader.read_bits(3)? as u32 + 1;
    if nchannels > XXCH_CHANNELS_MAX {
        return Err(DcaError::UnsupportedConfiguration(format!("{nchannels} xxch channels")));
    }

    let spkr_mask = DcaSpeakerMask::from_bits_truncate((reader.read_bits(mask_nbits - CS_INDEX)? as u32) << CS_INDEX);
    if spkr_mask.bits().count_ones() != nchannels {
        return Err(DcaError::MalformedFrameHeader("xxch speaker count"));
    }
    if spkr_mask.intersects(xxch_core_mask) {
        return Err(DcaError::MalformedFrameHeader("xxch speakers overlap the core"));
    }

    Ok(xxch_core_mask | spkr_mask)
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;
    use crate::test_utils::{CoreFrame, xch_payload, xxch_payload};

    #[test]
    fn test_parse_header() {
        let frame = CoreFrame::default().build();
        let header = CoreFrameHeader::parse(&frame).unwrap();
        insta::assert_debug_snapshot!((header.duration(), header.sample_rate(), header.bits_per_sample(), header.frame_size, header.header_bits()), @r"
        (
            512,
            48000,
            24,
            1024,
            104,
        )
        ");
        assert_eq!(header.ext_audio_type, ExtAudioType::Xch);
        assert!(!header.ext_audio_present);
        assert_eq!(header.channel_mask(), DcaSpeakerMask::LAYOUT_5_0 | DcaSpeakerMask::LFE1);
    }

    #[test]
    fn test_header_validation() {
        let cases = [
            (CoreFrame { npcmblocks: 12, ..Default::default() }, "pcm block count"),
            (CoreFrame { frame_size: 95, ..Default::default() }, "frame size"),
            (CoreFrame { audio_mode: 10, ..Default::default() }, "audio mode"),
            (CoreFrame { sr_code: 4, ..Default::default() }, "sample rate code"),
            (CoreFrame { lfe: 3, ..Default::default() }, "lfe flag"),
            (CoreFrame { pcmr_code: 4, ..Default::default() }, "pcm resolution code"),
        ];

        for (frame, reason) in cases {
            match CoreFrameHeader::parse(&frame.build()) {
                Err(DcaError::MalformedFrameHeader(msg)) => assert_eq!(msg, reason),
                other => panic!("expected {reason}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_header_with_crc() {
        let frame = CoreFrame { crc_present: true, ..Default::default() }.build();
        let header = CoreFrameHeader::parse(&frame).unwrap();
        assert_eq!(header.header_bits(), 120);
        assert_eq!(header.dn_code, 0);
    }

    #[test]
    fn test_truncated_header() {
        let frame = CoreFrame::default().build();
        assert!(matches!(
            CoreFrameHeader::parse(&frame[..10]),
            Err(DcaError::MalformedFrameHeader(_))
        ));
    }

    #[test]
    fn test_find_xch() {
        let frame = CoreFrame::with_xch(96).build();
        let header = CoreFrameHeader::parse(&frame).unwrap();
        assert_eq!(find_legacy_extension(&frame, &header), Some(LegacyExtension::Xch(1024 - 96)));
    }

    #[test]
    fn test_xch_distance_must_match() {
        let mut core = CoreFrame::with_xch(96);
        core.ext_payload = Some(xch_payload(100, 96));
        let frame = core.build();
        let header = CoreFrameHeader::parse(&frame).unwrap();
        assert_eq!(find_legacy_extension(&frame, &header), None);
    }

    #[test]
    fn test_xch_ignored_for_other_type() {
        let mut core = CoreFrame::with_xch(96);
        core.ext_audio_type = 2;
        let frame = core.build();
        let header = CoreFrameHeader::parse(&frame).unwrap();
        assert_eq!(find_legacy_extension(&frame, &header), None);
    }

    #[test]
    fn test_find_x96() {
        let frame = CoreFrame::with_x96(128).build();
        let header = CoreFrameHeader::parse(&frame).unwrap();
        assert_eq!(find_legacy_extension(&frame, &header), Some(LegacyExtension::X96(1024 - 128)));
    }

    #[test]
    fn test_find_xxch() {
        let core_mask = DcaSpeakerMask::LAYOUT_5_0 | DcaSpeakerMask::LFE1;
        let extra = DcaSpeakerMask::LSR | DcaSpeakerMask::RSR;
        let frame = CoreFrame::with_xxch(core_mask, extra).build();
        let header = CoreFrameHeader::parse(&frame).unwrap();

        let Some(LegacyExtension::Xxch(pos)) = find_legacy_extension(&frame, &header) else {
            panic!("xxch not found");
        };
        assert_eq!(xxch_channel_mask(&frame[pos..], core_mask).unwrap(), core_mask | extra);
    }

    #[test]
    fn test_xxch_bad_crc() {
        let core_mask = DcaSpeakerMask::LAYOUT_5_0;
        let mut payload = xxch_payload(core_mask, DcaSpeakerMask::CS);
        payload[5] ^= 0x10;
        let mut core = CoreFrame::with_xxch(core_mask, DcaSpeakerMask::CS);
        core.ext_payload = Some(payload);
        let frame = core.build();
        let header = CoreFrameHeader::parse(&frame).unwrap();
        assert_eq!(find_legacy_extension(&frame, &header), None);
    }

    #[test]
    fn test_xxch_mask_checks() {
        let core_mask = DcaSpeakerMask::LAYOUT_5_0;

        // side surrounds may replace the core surrounds
        let sides = (core_mask - DcaSpeakerMask::LS - DcaSpeakerMask::RS) | DcaSpeakerMask::LSS | DcaSpeakerMask::RSS;
        let payload = xxch_payload(sides, DcaSpeakerMask::LSR | DcaSpeakerMask::RSR);
        assert_eq!(
            xxch_channel_mask(&payload, core_mask).unwrap(),
            sides | DcaSpeakerMask::LSR | DcaSpeakerMask::RSR
        );

        let payload = xxch_payload(DcaSpeakerMask::LAYOUT_STEREO, DcaSpeakerMask::CS);
        assert!(matches!(
            xxch_channel_mask(&payload, core_mask),
            Err(DcaError::MalformedFrameHeader("xxch core speaker mask"))
        ));

        let payload = xxch_payload(core_mask, DcaSpeakerMask::CS | DcaSpeakerMask::LSR | DcaSpeakerMask::RSR);
        assert!(matches!(
            xxch_channel_mask(&payload, core_mask),
            Err(DcaError::UnsupportedConfiguration(_))
        ));
    }
}
