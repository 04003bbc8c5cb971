//! Extension substream header, asset descriptor, and the LBR and XLL
//! payload headers needed to time a frame.
//!
//! Only one presentation holding one asset is supported, which covers every
//! stream seen in practice.

use std::ops::Range;

use bitflags::bitflags;
use bytes_util::BitReader;

use crate::channel_layout::DcaSpeakerMask;
use crate::sync::{SYNCWORD_LBR, SYNCWORD_SUBSTREAM, SYNCWORD_XLL};
use crate::{DcaError, Result};

/// Sample rates by the 4-bit code used in the substream and in LBR.
pub const SAMPLING_FREQS: [u32; 16] = [
    8000, 16000, 32000, 64000, 128000, 22050, 44100, 88200, 176400, 352800, 12000, 24000, 48000, 96000, 192000,
    384000,
];

/// LBR frame length exponent by sample rate code.
pub const FREQ_RANGES: [u8; 16] = [0, 1, 2, 3, 4, 1, 2, 3, 4, 4, 0, 1, 2, 3, 4, 4];

bitflags! {
    /// Coding components carried by a substream asset.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExtensionMask: u16 {
        /// Core audio
        const CORE = 0x010;
        /// Extended resolution
        const XBR  = 0x020;
        /// Extra channels
        const XXCH = 0x040;
        /// 96 kHz
        const X96  = 0x080;
        /// Low bitrate
        const LBR  = 0x100;
        /// Lossless
        const XLL  = 0x200;
        /// Reserved
        const RSV1 = 0x400;
        /// Reserved
        const RSV2 = 0x800;
    }
}

/// Components laid out in the order they follow each other in an asset.
const COMPONENT_ORDER: [ExtensionMask; 6] = [
    ExtensionMask::CORE,
    ExtensionMask::XBR,
    ExtensionMask::XXCH,
    ExtensionMask::X96,
    ExtensionMask::LBR,
    ExtensionMask::XLL,
];

/// An audio asset of the extension substream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExssAsset {
    /// Byte offset of the asset data from the substream start.
    pub offset: usize,
    /// Size of the asset data in bytes.
    pub size: usize,
    /// Asset identifier.
    pub index: u8,
    /// Bits per sample, 0 without static fields.
    pub pcm_bit_res: u8,
    /// Highest sample rate of any component, 0 without static fields.
    pub max_sample_rate: u32,
    /// Channels in the asset, 0 without static fields.
    pub nchannels_total: u32,
    /// Channels map one to one onto speakers.
    pub one_to_one_map_ch_to_spkr: bool,
    /// An embedded stereo downmix is present.
    pub embedded_stereo: bool,
    /// An embedded 5.1 downmix is present.
    pub embedded_6ch: bool,
    /// The speaker mask below is valid.
    pub spkr_mask_enabled: bool,
    /// Speaker activity mask, one bit per speaker pair.
    pub spkr_mask: u32,
    /// Representation type when channels are not speakers.
    pub representation_type: u8,
    /// Coding mode (0 components, 1 lossless, 2 low bitrate, 3 auxiliary).
    pub coding_mode: u8,
    /// Components present.
    pub extension_mask: ExtensionMask,
    /// Frames of lossless decoding delay.
    pub xll_delay_nframes: u32,
    /// Offset of the lossless sync word inside its component.
    pub xll_sync_offset: u32,
    /// DTS-HD stream id, lossless assets only.
    pub hd_stream_id: u8,
    sizes: [usize; 6],
    ranges: [Option<Range<usize>>; 6],
}

impl ExssAsset {
    /// Byte range of a component inside the substream.
    pub fn component(&self, component: ExtensionMask) -> Option<Range<usize>> {
        COMPONENT_ORDER
            .iter()
            .position(|c| *c == component)
            .and_then(|i| self.ranges[i].clone())
    }

    /// Speakers of the asset, empty when no mask is signalled.
    pub fn speaker_mask(&self) -> DcaSpeakerMask {
        if self.spkr_mask_enabled {
            DcaSpeakerMask::from_exss_pair_mask(self.spkr_mask)
        } else {
            DcaSpeakerMask::empty()
        }
    }

    fn set_size(&mut self, component: ExtensionMask, size: usize) {
        if let Some(i) = COMPONENT_ORDER.iter().position(|c| *c == component) {
            self.sizes[i] = size;
        }
    }

    /// Lays the components out back to back from the asset start.
    fn set_offsets(&mut self) -> Result<()> {
        let mut offset = self.offset;
        let mut left = self.size;
        for (i, component) in COMPONENT_ORDER.iter().enumerate() {
            if !self.extension_mask.contains(*component) {
                continue;
            }
            let size = self.sizes[i];
            if size > left {
                return Err(DcaError::MalformedFrameHeader("component larger than its asset"));
            }
            self.ranges[i] = Some(offset..offset + size);
            offset += size;
            left -= size;
        }
        Ok(())
    }
}

/// An extension substream header.
///
/// ETSI TS 102 114 - 7.4
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExssHeader {
    /// User defined bits.
    pub user_defined: u8,
    /// Substream index.
    pub index: u8,
    /// Header size in bytes.
    pub header_size: usize,
    /// Substream size in bytes, header included.
    pub size: usize,
    /// Per stream static fields are present.
    pub static_fields_present: bool,
    /// Audio presentations.
    pub npresents: u8,
    /// Audio assets.
    pub nassets: u8,
    /// Mixing metadata is enabled.
    pub mix_metadata_enabled: bool,
    /// Channels of each mixer output configuration.
    pub nmixoutchs: Vec<u32>,
    /// The asset.
    pub asset: ExssAsset,
}

impl ExssHeader {
    /// Parses a substream starting at `data[0]`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new_from_slice(data);

        if reader.read_bits(32)? as u32 != SYNCWORD_SUBSTREAM {
            return Err(DcaError::MalformedFrameHeader("missing substream sync word"));
        }

        let user_defined = reader.read_bits(8)? as u8;
        let index = reader.read_bits(2)? as u8;
        let wide_hdr = reader.read_bit()?;
        let header_size = reader.read_bits(8 + 4 * wide_hdr as u8)? as usize + 1;
        let size_nbits = 16 + 4 * wide_hdr as u8;
        let size = reader.read_bits(size_nbits)? as usize + 1;
        if size > data.len() {
            return Err(DcaError::OutOfRange {
                needed: size,
                available: data.len(),
            });
        }

        let mut header = Self {
            user_defined,
            index,
            header_size,
            size,
            static_fields_present: reader.read_bit()?,
            npresents: 1,
            nassets: 1,
            mix_metadata_enabled: false,
            nmixoutchs: Vec::new(),
            asset: ExssAsset::default(),
        };

        if header.static_fields_present {
            header.parse_static_fields(&mut reader)?;
        }

        header.asset.offset = header_size;
        header.asset.size = reader.read_bits(size_nbits)? as usize + 1;
        if header_size + header.asset.size > size {
            return Err(DcaError::MalformedFrameHeader("asset outside of the substream"));
        }

        header.parse_descriptor(&mut reader, size_nbits)?;
        header.asset.set_offsets()?;

        reader.seek_to_bit(header_size as u64 * 8)?;
        Ok(header)
    }

    fn parse_static_fields<R: std::io::Read>(&mut self, reader: &mut BitReader<R>) -> Result<()> {
        // reference clock and frame duration
        reader.skip_bits(5)?;
        if reader.read_bit()? {
            // timecode
            reader.skip_bits(36)?;
        }

        self.npresents = reader.read_bits(3)? as u8 + 1;
        if self.npresents > 1 {
            return Err(DcaError::UnsupportedConfiguration(format!(
                "{} audio presentations",
                self.npresents
            )));
        }

        self.nassets = reader.read_bits(3)? as u8 + 1;
        if self.nassets > 1 {
            return Err(DcaError::UnsupportedConfiguration(format!("{} audio assets", self.nassets)));
        }

        let active_exss_mask = reader.read_bits(self.index + 1)?;
        // active asset mask per active substream
        reader.skip_bits(active_exss_mask.count_ones() as u64 * 8)?;

        self.mix_metadata_enabled = reader.read_bit()?;
        if self.mix_metadata_enabled {
            // adjustment level
            reader.skip_bits(2)?;
            let spkr_mask_nbits = (reader.read_bits(2)? as u8 + 1) << 2;
            let nconfigs = reader.read_bits(2)? + 1;
            for _ in 0..nconfigs {
                let mask = reader.read_bits(spkr_mask_nbits)? as u32;
                self.nmixoutchs.push(DcaSpeakerMask::exss_channel_count(mask));
            }
        }

        Ok(())
    }

    fn parse_descriptor(&mut self, reader: &mut BitReader<std::io::Cursor<&[u8]>>, size_nbits: u8) -> Result<()> {
        let start = reader.bit_position();
        let descr_size = reader.read_bits(9)? + 1;
        let asset = &mut self.asset;
        asset.index = reader.read_bits(3)? as u8;

        if self.static_fields_present {
            if reader.read_bit()? {
                // asset type
                reader.skip_bits(4)?;
            }
            if reader.read_bit()? {
                // language
                reader.skip_bits(24)?;
            }
            if reader.read_bit()? {
                let text_size = (reader.read_bits(10)? + 1) * 8;
                if reader.bits_remaining() < text_size {
                    return Err(DcaError::MalformedFrameHeader("asset text runs past the substream"));
                }
                reader.skip_bits(text_size)?;
            }

            asset.pcm_bit_res = reader.read_bits(5)? as u8 + 1;
            asset.max_sample_rate = SAMPLING_FREQS[reader.read_bits(4)? as usize];
            asset.nchannels_total = reader.read_bits(8)? as u32 + 1;

            asset.one_to_one_map_ch_to_spkr = reader.read_bit()?;
            if asset.one_to_one_map_ch_to_spkr {
                asset.embedded_stereo = asset.nchannels_total > 2 && reader.read_bit()?;
                asset.embedded_6ch = asset.nchannels_total > 6 && reader.read_bit()?;

                let mut spkr_mask_nbits = 0;
                asset.spkr_mask_enabled = reader.read_bit()?;
                if asset.spkr_mask_enabled {
                    spkr_mask_nbits = (reader.read_bits(2)? as u8 + 1) << 2;
                    asset.spkr_mask = reader.read_bits(spkr_mask_nbits)? as u32;
                }

                let remap_sets = reader.read_bits(3)?;
                if remap_sets != 0 && spkr_mask_nbits == 0 {
                    return Err(DcaError::MalformedFrameHeader("speaker remapping without a speaker mask"));
                }

                let mut nspeakers = Vec::with_capacity(remap_sets as usize);
                for _ in 0..remap_sets {
                    let mask = reader.read_bits(spkr_mask_nbits)? as u32;
                    nspeakers.push(DcaSpeakerMask::exss_channel_count(mask));
                }
                for speakers in nspeakers {
                    let nch_for_remaps = reader.read_bits(5)? as u8 + 1;
                    for _ in 0..speakers {
                        let remap_ch_mask = reader.read_bits(nch_for_remaps)?;
                        // remapping codes
                        reader.skip_bits(remap_ch_mask.count_ones() as u64 * 5)?;
                    }
                }
            } else {
                asset.representation_type = reader.read_bits(3)? as u8;
            }
        }

        let drc_present = reader.read_bit()?;
        if drc_present {
            reader.skip_bits(8)?;
        }
        if reader.read_bit()? {
            // dialog normalization
            reader.skip_bits(5)?;
        }
        if drc_present && asset.embedded_stereo {
            reader.skip_bits(8)?;
        }

        if self.mix_metadata_enabled && reader.read_bit()? {
            // external mixing flag and gain adjustment
            reader.skip_bits(7)?;
            if reader.read_bits(2)? == 3 {
                reader.skip_bits(8)?;
            } else {
                reader.skip_bits(3)?;
            }

            if reader.read_bit()? {
                for nch in &self.nmixoutchs {
                    reader.skip_bits(6 * *nch as u64)?;
                }
            } else {
                reader.skip_bits(6 * self.npresents as u64)?;
            }

            let mut nchannels_dmix = asset.nchannels_total;
            if asset.embedded_6ch {
                nchannels_dmix += 6;
            }
            if asset.embedded_stereo {
                nchannels_dmix += 2;
            }

            for nch in &self.nmixoutchs {
                if *nch == 0 {
                    return Err(DcaError::MalformedFrameHeader("empty mixing configuration"));
                }
                for _ in 0..nchannels_dmix {
                    let mix_map_mask = reader.read_bits(*nch as u8)?;
                    reader.skip_bits(mix_map_mask.count_ones() as u64 * 6)?;
                }
            }
        }

        asset.coding_mode = reader.read_bits(2)? as u8;
        match asset.coding_mode {
            0 => {
                asset.extension_mask = ExtensionMask::from_bits_truncate((reader.read_bits(12)? as u16) << 4);

                if asset.extension_mask.contains(ExtensionMask::CORE) {
                    asset.set_size(ExtensionMask::CORE, reader.read_bits(14)? as usize + 1);
                    if reader.read_bit()? {
                        // core sync distance
                        reader.skip_bits(2)?;
                    }
                }
                if asset.extension_mask.contains(ExtensionMask::XBR) {
                    asset.set_size(ExtensionMask::XBR, reader.read_bits(14)? as usize + 1);
                }
                if asset.extension_mask.contains(ExtensionMask::XXCH) {
                    asset.set_size(ExtensionMask::XXCH, reader.read_bits(14)? as usize + 1);
                }
                if asset.extension_mask.contains(ExtensionMask::X96) {
                    asset.set_size(ExtensionMask::X96, reader.read_bits(12)? as usize + 1);
                }
                if asset.extension_mask.contains(ExtensionMask::LBR) {
                    parse_lbr_parameters(reader, asset)?;
                }
                if asset.extension_mask.contains(ExtensionMask::XLL) {
                    parse_xll_parameters(reader, asset, size_nbits)?;
                }
                if asset.extension_mask.contains(ExtensionMask::RSV1) {
                    reader.skip_bits(16)?;
                }
                if asset.extension_mask.contains(ExtensionMask::RSV2) {
                    reader.skip_bits(16)?;
                }
            }
            1 => {
                asset.extension_mask = ExtensionMask::XLL;
                parse_xll_parameters(reader, asset, size_nbits)?;
            }
            2 => {
                asset.extension_mask = ExtensionMask::LBR;
                parse_lbr_parameters(reader, asset)?;
            }
            _ => {
                asset.extension_mask = ExtensionMask::empty();
                // auxiliary data size and codec id
                reader.skip_bits(22)?;
                if reader.read_bit()? {
                    // aux sync distance
                    reader.skip_bits(3)?;
                }
            }
        }

        if asset.extension_mask.contains(ExtensionMask::XLL) {
            asset.hd_stream_id = reader.read_bits(3)? as u8;
        }

        reader.seek_to_bit(start + descr_size * 8)?;
        Ok(())
    }
}

fn parse_lbr_parameters<R: std::io::Read>(reader: &mut BitReader<R>, asset: &mut ExssAsset) -> Result<()> {
    asset.set_size(ExtensionMask::LBR, reader.read_bits(14)? as usize + 1);
    if reader.read_bit()? {
        // lbr sync distance
        reader.skip_bits(2)?;
    }
    Ok(())
}

fn parse_xll_parameters<R: std::io::Read>(
    reader: &mut BitReader<R>,
    asset: &mut ExssAsset,
    size_nbits: u8,
) -> Result<()> {
    asset.set_size(ExtensionMask::XLL, reader.read_bits(size_nbits)? as usize + 1);
    if reader.read_bit()? {
        // peak bitrate smoothing buffer size
        reader.skip_bits(4)?;
        let delay_nbits = reader.read_bits(5)? as u8 + 1;
        asset.xll_delay_nframes = reader.read_bits(delay_nbits)? as u32;
        asset.xll_sync_offset = reader.read_bits(size_nbits)? as u32;
    } else {
        asset.xll_delay_nframes = 0;
        asset.xll_sync_offset = 0;
    }
    Ok(())
}

/// The first header of an LBR component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LbrHeader {
    /// Carries the sample rate code.
    DecoderInit {
        /// Index into [`SAMPLING_FREQS`].
        rate_code: u8,
    },
    /// Sync only, the decoder keeps its last settings.
    SyncOnly,
}

impl LbrHeader {
    /// Parses the header at the start of an LBR component.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new_from_slice(data);
        if reader.read_bits(32)? as u32 != SYNCWORD_LBR {
            return Err(DcaError::MalformedFrameHeader("missing lbr sync word"));
        }

        match reader.read_bits(8)? {
            1 => Ok(Self::SyncOnly),
            2 => {
                let rate_code = reader.read_bits(8)? as u8;
                if rate_code as usize >= SAMPLING_FREQS.len() {
                    return Err(DcaError::UnsupportedConfiguration(format!("lbr sample rate code {rate_code}")));
                }
                Ok(Self::DecoderInit { rate_code })
            }
            _ => Err(DcaError::MalformedFrameHeader("lbr header type")),
        }
    }
}

/// Log2 of the samples per channel in an XLL frame, read from the common
/// header at the start of an XLL component.
pub fn xll_nsamples_log2(data: &[u8]) -> Result<u8> {
    let mut reader = BitReader::new_from_slice(data);
    if reader.read_bits(32)? as u32 != SYNCWORD_XLL {
        return Err(DcaError::MalformedFrameHeader("missing xll sync word"));
    }
    if reader.read_bits(4)? != 0 {
        return Err(DcaError::UnsupportedConfiguration("xll version".into()));
    }

    // header size
    reader.skip_bits(8)?;
    let frame_size_nbits = reader.read_bits(5)? + 1;
    reader.skip_bits(frame_size_nbits)?;
    // channel sets
    reader.skip_bits(4)?;

    let nsegments_log2 = reader.read_bits(4)? as u8;
    let nsamples_log2 = nsegments_log2 + reader.read_bits(4)? as u8;
    if nsamples_log2 > 24 {
        return Err(DcaError::MalformedFrameHeader("xll sample count"));
    }
    Ok(nsamples_log2)
}
