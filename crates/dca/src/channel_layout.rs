//! Speaker masks and their mapping to WAV channel order.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// DCA speaker activity mask, one bit per loudspeaker position.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DcaSpeakerMask: u32 {
        /// Centre
        const C    = 1 << 0;
        /// Left
        const L    = 1 << 1;
        /// Right
        const R    = 1 << 2;
        /// Left surround
        const LS   = 1 << 3;
        /// Right surround
        const RS   = 1 << 4;
        /// Low frequency effects
        const LFE1 = 1 << 5;
        /// Centre surround
        const CS   = 1 << 6;
        /// Left surround rear
        const LSR  = 1 << 7;
        /// Right surround rear
        const RSR  = 1 << 8;
        /// Left side surround
        const LSS  = 1 << 9;
        /// Right side surround
        const RSS  = 1 << 10;
        /// Left centre
        const LC   = 1 << 11;
        /// Right centre
        const RC   = 1 << 12;
        /// Left height
        const LH   = 1 << 13;
        /// Centre height
        const CH   = 1 << 14;
        /// Right height
        const RH   = 1 << 15;
        /// Second low frequency effects
        const LFE2 = 1 << 16;
        /// Left wide
        const LW   = 1 << 17;
        /// Right wide
        const RW   = 1 << 18;
        /// Overhead
        const OH   = 1 << 19;
        /// Left height side
        const LHS  = 1 << 20;
        /// Right height side
        const RHS  = 1 << 21;
        /// Centre height rear
        const CHR  = 1 << 22;
        /// Left height rear
        const LHR  = 1 << 23;
        /// Right height rear
        const RHR  = 1 << 24;
        /// Centre low
        const CL   = 1 << 25;
        /// Left low
        const LL   = 1 << 26;
        /// Right low
        const RL   = 1 << 27;
    }
}

/// Number of speaker positions a mask can name.
const SPEAKER_COUNT: usize = 28;

/// WAV channel index for each DCA speaker bit.
const DCA_TO_WAV_NORM: [u8; SPEAKER_COUNT] = [
    2, 0, 1, 9, 10, 3, 8, 4, 5, 9, 10, 6, 7, 12, 13, 14, 3, 6, 7, 11, 12, 14, 16, 15, 17, 8, 4, 5,
];

/// Same as [`DCA_TO_WAV_NORM`] but the surrounds go to the back pair and the
/// wide speakers take the side pair.
const DCA_TO_WAV_WIDE: [u8; SPEAKER_COUNT] = [
    2, 0, 1, 4, 5, 3, 8, 4, 5, 9, 10, 6, 7, 12, 13, 14, 3, 9, 10, 11, 12, 14, 16, 15, 17, 8, 4, 5,
];

/// Speaker positions named by each bit of an extension substream speaker
/// mask. Most bits stand for a pair.
const EXSS_PAIRS: [DcaSpeakerMask; 16] = [
    DcaSpeakerMask::C,
    DcaSpeakerMask::L.union(DcaSpeakerMask::R),
    DcaSpeakerMask::LS.union(DcaSpeakerMask::RS),
    DcaSpeakerMask::LFE1,
    DcaSpeakerMask::CS,
    DcaSpeakerMask::LH.union(DcaSpeakerMask::RH),
    DcaSpeakerMask::LSR.union(DcaSpeakerMask::RSR),
    DcaSpeakerMask::CH,
    DcaSpeakerMask::OH,
    DcaSpeakerMask::LC.union(DcaSpeakerMask::RC),
    DcaSpeakerMask::LW.union(DcaSpeakerMask::RW),
    DcaSpeakerMask::LSS.union(DcaSpeakerMask::RSS),
    DcaSpeakerMask::LFE2,
    DcaSpeakerMask::LHS.union(DcaSpeakerMask::RHS),
    DcaSpeakerMask::CHR,
    DcaSpeakerMask::LHR.union(DcaSpeakerMask::RHR),
];

/// Number of audio modes a core header can signal.
pub const AUDIO_MODE_COUNT: u8 = 10;

/// Speaker positions a WAV channel mask can name.
const WAV_SPEAKER_COUNT: usize = 18;

/// A channel layout in WAV (`WAVEFORMATEXTENSIBLE`) order.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct WavLayout {
    /// `dwChannelMask` bits of the output.
    pub mask: u32,
    remap: [u8; WAV_SPEAKER_COUNT],
    channels: u8,
}

impl WavLayout {
    /// Number of output channels.
    pub const fn channels(&self) -> usize {
        self.channels as usize
    }

    /// For each output channel, the DCA speaker bit it is taken from.
    pub fn remap(&self) -> &[u8] {
        &self.remap[..self.channels()]
    }
}

impl fmt::Debug for WavLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WavLayout")
            .field("mask", &format_args!("{:#x}", self.mask))
            .field("remap", &self.remap())
            .finish()
    }
}

impl DcaSpeakerMask {
    /// 1.0
    pub const LAYOUT_MONO: Self = Self::C;
    /// 2.0
    pub const LAYOUT_STEREO: Self = Self::L.union(Self::R);
    /// 2.1
    pub const LAYOUT_2_1: Self = Self::LAYOUT_STEREO.union(Self::CS);
    /// 3.0
    pub const LAYOUT_3_0: Self = Self::LAYOUT_STEREO.union(Self::C);
    /// 3.1
    pub const LAYOUT_3_1: Self = Self::LAYOUT_3_0.union(Self::CS);
    /// 2.2
    pub const LAYOUT_2_2: Self = Self::LAYOUT_STEREO.union(Self::LS).union(Self::RS);
    /// 5.0
    pub const LAYOUT_5_0: Self = Self::LAYOUT_3_0.union(Self::LS).union(Self::RS);
    /// 7.0 with wide speakers
    pub const LAYOUT_7_0_WIDE: Self = Self::LAYOUT_5_0.union(Self::LW).union(Self::RW);
    /// 7.1 with wide speakers
    pub const LAYOUT_7_1_WIDE: Self = Self::LAYOUT_7_0_WIDE.union(Self::LFE1);

    /// Speakers of a core `AMODE`, or `None` for the user defined modes.
    pub const fn from_audio_mode(audio_mode: u8) -> Option<Self> {
        Some(match audio_mode {
            0 => Self::LAYOUT_MONO,
            1..=4 => Self::LAYOUT_STEREO,
            5 => Self::LAYOUT_3_0,
            6 => Self::LAYOUT_2_1,
            7 => Self::LAYOUT_3_1,
            8 => Self::LAYOUT_2_2,
            9 => Self::LAYOUT_5_0,
            _ => return None,
        })
    }

    /// Expands an extension substream speaker mask, where most bits name a
    /// speaker pair.
    pub fn from_exss_pair_mask(pairs: u32) -> Self {
        EXSS_PAIRS
            .iter()
            .enumerate()
            .filter(|(bit, _)| pairs & (1 << bit) != 0)
            .fold(Self::empty(), |mask, (_, speakers)| mask | *speakers)
    }

    /// Channels needed to play an extension substream speaker mask.
    pub const fn exss_channel_count(pairs: u32) -> u32 {
        (pairs & 0xFFFF).count_ones() + (pairs & 0xAE66).count_ones()
    }

    /// Maps this mask to WAV channel order.
    ///
    /// Speakers that land on an already taken WAV position are dropped, the
    /// lower DCA bit wins.
    pub fn to_wav_layout(self) -> WavLayout {
        let table = if self == Self::LAYOUT_7_0_WIDE || self == Self::LAYOUT_7_1_WIDE {
            &DCA_TO_WAV_WIDE
        } else {
            &DCA_TO_WAV_NORM
        };

        let mut wav_mask = 0u32;
        let mut wav_map = [0u8; WAV_SPEAKER_COUNT];
        for (dca_ch, wav_ch) in table.iter().enumerate() {
            if self.bits() & (1 << dca_ch) != 0 && wav_mask & (1 << wav_ch) == 0 {
                wav_map[*wav_ch as usize] = dca_ch as u8;
                wav_mask |= 1 << wav_ch;
            }
        }

        let mut layout = WavLayout {
            mask: wav_mask,
            ..Default::default()
        };
        for (wav_ch, dca_ch) in wav_map.iter().enumerate() {
            if wav_mask & (1 << wav_ch) != 0 {
                layout.remap[layout.channels()] = *dca_ch;
                layout.channels += 1;
            }
        }
        layout
    }
}
