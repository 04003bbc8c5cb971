//! Sync words and bitstream packings.
//!
//! A core stream comes in four packings: 16-bit words big or little endian,
//! and 14 payload bits per 16-bit word big or little endian. The extension
//! substream is always big endian.

use std::borrow::Cow;

use byteorder::{BigEndian, ByteOrder};
use bytes_util::BitWriter;

use crate::Result;

/// Core sync word, 16-bit big endian.
pub const SYNCWORD_CORE_BE: u32 = 0x7FFE_8001;
/// Core sync word, 16-bit little endian.
pub const SYNCWORD_CORE_LE: u32 = 0xFE7F_0180;
/// Core sync word, 14-bit big endian.
pub const SYNCWORD_CORE_14B_BE: u32 = 0x1FFF_E800;
/// Core sync word, 14-bit little endian.
pub const SYNCWORD_CORE_14B_LE: u32 = 0xFF1F_00E8;
/// Extension substream header.
pub const SYNCWORD_SUBSTREAM: u32 = 0x6458_2025;
/// Legacy 6.1 channel extension inside a core frame.
pub const SYNCWORD_XCH: u32 = 0x5A5A_5A5A;
/// Legacy extended channel extension inside a core frame.
pub const SYNCWORD_XXCH: u32 = 0x4700_4A03;
/// Legacy 96 kHz extension inside a core frame.
pub const SYNCWORD_X96: u32 = 0x1D95_F262;
/// Extended resolution extension in a substream.
pub const SYNCWORD_XBR: u32 = 0x655E_315E;
/// Low bitrate (DTS Express) payload in a substream.
pub const SYNCWORD_LBR: u32 = 0x0A80_1921;
/// Lossless payload in a substream.
pub const SYNCWORD_XLL: u32 = 0x41A2_9547;

/// Bytes needed to parse a core frame header in any packing.
pub const CORE_FRAME_HEADER_SIZE: usize = 18;

/// The marker families a frame can start with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncFamily {
    /// Core, 16-bit big endian.
    CoreBe,
    /// Core, 16-bit little endian.
    CoreLe,
    /// Core, 14-bit big endian.
    Core14Be,
    /// Core, 14-bit little endian.
    Core14Le,
    /// Extension substream.
    Substream,
}

impl SyncFamily {
    const ALL: [Self; 5] = [
        Self::Core14Le,
        Self::Core14Be,
        Self::CoreLe,
        Self::CoreBe,
        Self::Substream,
    ];

    /// The 32-bit sync word of this family.
    pub const fn sync_word(self) -> u32 {
        match self {
            Self::CoreBe => SYNCWORD_CORE_BE,
            Self::CoreLe => SYNCWORD_CORE_LE,
            Self::Core14Be => SYNCWORD_CORE_14B_BE,
            Self::Core14Le => SYNCWORD_CORE_14B_LE,
            Self::Substream => SYNCWORD_SUBSTREAM,
        }
    }

    /// Bytes a marker occupies. Core markers include the first two bytes of
    /// the header so that a bare sync word in payload data is not enough.
    pub const fn marker_len(self) -> usize {
        match self {
            Self::Substream => 4,
            _ => 6,
        }
    }

    /// True for the four core packings.
    pub const fn is_core(self) -> bool {
        !matches!(self, Self::Substream)
    }

    /// Checks the newest bytes of a sliding window for this family's marker.
    pub const fn matches(self, window: u64) -> bool {
        let sync = self.sync_word() as u64;
        match self {
            Self::Core14Le => window & 0xFFFF_FFFF_F0FF == (sync << 16 | 0xF007),
            Self::Core14Be => window & 0xFFFF_FFFF_FFF0 == (sync << 16 | 0x07F0),
            Self::CoreLe => window & 0xFFFF_FFFF_00FC == (sync << 16 | 0x00FC),
            Self::CoreBe => window & 0xFFFF_FFFF_FC00 == (sync << 16 | 0xFC00),
            Self::Substream => window & 0xFFFF_FFFF == sync,
        }
    }

    /// The family whose marker ends at the newest byte of `window`.
    pub fn from_window(window: u64) -> Option<Self> {
        Self::ALL.into_iter().find(|family| family.matches(window))
    }

    /// The family of a frame, judged by its first four bytes.
    pub fn detect(frame: &[u8]) -> Option<Self> {
        let word = BigEndian::read_u32(frame.get(..4)?);
        Self::ALL.into_iter().find(|family| family.sync_word() == word)
    }
}

/// Converts `src` to 16-bit big endian words.
///
/// Big endian input is borrowed as is. The 14-bit packings drop the two
/// padding bits of every word, so the output is 7/8 the size of the input.
pub fn convert_bitstream(src: &[u8], family: SyncFamily) -> Result<Cow<'_, [u8]>> {
    let words = src.chunks_exact(2);
    let out = match family {
        SyncFamily::CoreBe | SyncFamily::Substream => return Ok(Cow::Borrowed(src)),
        SyncFamily::CoreLe => words.flat_map(|pair| [pair[1], pair[0]]).collect(),
        SyncFamily::Core14Be | SyncFamily::Core14Le => {
            let mut writer = BitWriter::new(Vec::with_capacity(src.len() * 14 / 16 + 1));
            for pair in words {
                let word = match family {
                    SyncFamily::Core14Le => u16::from_le_bytes([pair[0], pair[1]]),
                    _ => u16::from_be_bytes([pair[0], pair[1]]),
                };
                writer.write_bits((word & 0x3FFF) as u64, 14)?;
            }
            writer.finish()?
        }
    };

    Ok(Cow::Owned(out))
}
