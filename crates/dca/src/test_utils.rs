//! # Test Utilities
//!
//! Builders for synthetic DCA frames. Payload bytes are zero unless a test
//! asks for an extension, so no accidental sync words appear.

use bytes_util::{BitReader, BitWriter};
use crc::{CRC_16_IBM_3740, Crc};

use crate::channel_layout::DcaSpeakerMask;
use crate::sync::{
    SYNCWORD_CORE_BE, SYNCWORD_LBR, SYNCWORD_SUBSTREAM, SYNCWORD_X96, SYNCWORD_XBR, SYNCWORD_XCH, SYNCWORD_XLL, SYNCWORD_XXCH,
};

/// Initialize tracing for tests with appropriate settings
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// A 16-bit big endian core frame.
#[derive(Debug, Clone)]
pub struct CoreFrame {
    pub npcmblocks: u8,
    pub frame_size: u16,
    pub audio_mode: u8,
    pub sr_code: u8,
    pub lfe: u8,
    pub pcmr_code: u8,
    pub crc_present: bool,
    pub ext_audio_type: u8,
    pub ext_audio_present: bool,
    /// Placed so that it ends with the frame.
    pub ext_payload: Option<Vec<u8>>,
}

impl Default for CoreFrame {
    /// 5.1, 48 kHz, 24 bit, 512 samples in 1024 bytes.
    fn default() -> Self {
        Self {
            npcmblocks: 16,
            frame_size: 1024,
            audio_mode: 9,
            sr_code: 13,
            lfe: 1,
            pcmr_code: 6,
            crc_present: false,
            ext_audio_type: 0,
            ext_audio_present: false,
            ext_payload: None,
        }
    }
}

impl CoreFrame {
    pub fn with_xch(size: usize) -> Self {
        Self {
            ext_audio_type: 0,
            ext_audio_present: true,
            ext_payload: Some(xch_payload(size, size)),
            ..Default::default()
        }
    }

    pub fn with_x96(size: usize) -> Self {
        Self {
            ext_audio_type: 2,
            ext_audio_present: true,
            ext_payload: Some(x96_payload(size)),
            ..Default::default()
        }
    }

    pub fn with_xxch(core_mask: DcaSpeakerMask, extra: DcaSpeakerMask) -> Self {
        Self {
            ext_audio_type: 6,
            ext_audio_present: true,
            ext_payload: Some(xxch_payload(core_mask, extra)),
            ..Default::default()
        }
    }

    pub fn header(&self) -> Vec<u8> {
        let mut w = BitWriter::<Vec<u8>>::default();
        w.write_bits(SYNCWORD_CORE_BE as u64, 32).unwrap();
        w.write_bit(true).unwrap();
        w.write_bits(31, 5).unwrap();
        w.write_bit(self.crc_present).unwrap();
        w.write_bits(self.npcmblocks as u64 - 1, 7).unwrap();
        w.write_bits(self.frame_size as u64 - 1, 14).unwrap();
        w.write_bits(self.audio_mode as u64, 6).unwrap();
        w.write_bits(self.sr_code as u64, 4).unwrap();
        w.write_bits(15, 5).unwrap();
        // reserved, drc, timestamp, aux, hdcd
        w.write_bits(0, 5).unwrap();
        w.write_bits(self.ext_audio_type as u64, 3).unwrap();
        w.write_bit(self.ext_audio_present).unwrap();
        w.write_bit(false).unwrap();
        w.write_bits(self.lfe as u64, 2).unwrap();
        w.write_bit(false).unwrap();
        if self.crc_present {
            w.write_bits(0, 16).unwrap();
        }
        w.write_bit(false).unwrap();
        w.write_bits(7, 4).unwrap();
        w.write_bits(0, 2).unwrap();
        w.write_bits(self.pcmr_code as u64, 3).unwrap();
        w.write_bits(0, 6).unwrap();
        w.finish().unwrap()
    }

    pub fn build(&self) -> Vec<u8> {
        let mut frame = self.header();
        frame.resize(self.frame_size as usize, 0);
        if let Some(payload) = &self.ext_payload {
            let start = frame.len() - payload.len();
            frame[start..].copy_from_slice(payload);
        }
        frame
    }
}

/// Swaps the bytes of every 16-bit word.
pub fn swap_16(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(2).flat_map(|pair| [pair[1], pair[0]]).collect()
}

/// Repacks a 16-bit big endian frame as 14-bit big endian words, with the
/// two spare bits of each word sign extended.
pub fn pack_14_bit(frame: &[u8]) -> Vec<u8> {
    let words = frame.len() * 8 / 14;
    let mut reader = BitReader::new_from_slice(frame);
    let mut out = Vec::with_capacity(words * 2);
    for _ in 0..words {
        let mut word = reader.read_bits(14).unwrap() as u16;
        if word & 0x2000 != 0 {
            word |= 0xC000;
        }
        out.extend_from_slice(&word.to_be_bytes());
    }
    out
}

/// An XCH frame of `len` bytes whose size field says `size`.
pub fn xch_payload(size: usize, len: usize) -> Vec<u8> {
    let mut data = vec![0; len];
    data[..4].copy_from_slice(&SYNCWORD_XCH.to_be_bytes());
    let word = ((size as u32 - 1) << 22) | (8 << 15);
    data[4..8].copy_from_slice(&word.to_be_bytes());
    data
}

pub fn x96_payload(size: usize) -> Vec<u8> {
    let mut data = vec![0; size];
    data[..4].copy_from_slice(&SYNCWORD_X96.to_be_bytes());
    data[4..8].copy_from_slice(&((size as u32 - 1) << 20).to_be_bytes());
    data
}

/// A 32 byte XXCH frame with 16-bit speaker masks and a valid header CRC.
pub fn xxch_payload(core_mask: DcaSpeakerMask, extra: DcaSpeakerMask) -> Vec<u8> {
    let mut w = BitWriter::<Vec<u8>>::default();
    w.write_bits(SYNCWORD_XXCH as u64, 32).unwrap();
    w.write_bits(11, 6).unwrap();
    w.write_bit(false).unwrap();
    w.write_bits(15, 5).unwrap();
    w.write_bits(0, 2).unwrap();
    w.write_bits(63, 14).unwrap();
    w.write_bits(core_mask.bits() as u64, 16).unwrap();
    let mut data = w.finish().unwrap();

    let crc = Crc::<u16>::new(&CRC_16_IBM_3740).checksum(&data[4..]);
    data.extend_from_slice(&crc.to_be_bytes());

    let mut w = BitWriter::<Vec<u8>>::default();
    w.write_bits(15, 7).unwrap();
    w.write_bits(extra.bits().count_ones() as u64 - 1, 3).unwrap();
    w.write_bits((extra.bits() >> 6) as u64, 10).unwrap();
    data.extend(w.finish().unwrap());

    data.resize(32, 0);
    data
}

/// An extension substream holding one asset.
#[derive(Debug, Clone)]
pub struct ExssFrame {
    /// Sample rate code and speaker pair mask, written as static fields.
    pub static_fields: Option<(u8, u32)>,
    /// 0 for an XBR component, 1 for XLL, 2 for LBR.
    pub coding_mode: u8,
    pub payload: Vec<u8>,
}

impl ExssFrame {
    pub fn lbr(payload: Vec<u8>) -> Self {
        Self {
            static_fields: None,
            coding_mode: 2,
            payload,
        }
    }

    pub fn xll(sr_code: u8, spkr_pairs: u32, payload: Vec<u8>) -> Self {
        Self {
            static_fields: Some((sr_code, spkr_pairs)),
            coding_mode: 1,
            payload,
        }
    }

    pub fn xbr(payload: Vec<u8>) -> Self {
        Self {
            static_fields: None,
            coding_mode: 0,
            payload,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let len = self.payload.len() as u64;
        let mut descr_bits = 12 + 4;
        if self.static_fields.is_some() {
            descr_bits += 44;
        }
        descr_bits += match self.coding_mode {
            0 => 12 + 14,
            1 => 16 + 1 + 3,
            _ => 14 + 1,
        };
        let descr_size = (descr_bits as u64).div_ceil(8);
        let static_bits = if self.static_fields.is_some() { 22 } else { 0 };
        let header_size = (68 + static_bits + 16 + descr_size * 8).div_ceil(8).max(16);

        let mut w = BitWriter::<Vec<u8>>::default();
        w.write_bits(SYNCWORD_SUBSTREAM as u64, 32).unwrap();
        w.write_bits(0, 8).unwrap();
        w.write_bits(0, 2).unwrap();
        w.write_bit(false).unwrap();
        w.write_bits(header_size - 1, 8).unwrap();
        w.write_bits(header_size + len - 1, 16).unwrap();
        w.write_bit(self.static_fields.is_some()).unwrap();
        if self.static_fields.is_some() {
            // clock, duration, no timecode, one presentation, one asset
            w.write_bits(0, 12).unwrap();
            w.write_bits(1, 1).unwrap();
            w.write_bits(1, 8).unwrap();
            w.write_bit(false).unwrap();
        }
        w.write_bits(len - 1, 16).unwrap();

        w.write_bits(descr_size - 1, 9).unwrap();
        w.write_bits(0, 3).unwrap();

        if let Some((sr_code, spkr_pairs)) = self.static_fields {
            w.write_bits(0, 3).unwrap();
            w.write_bits(23, 5).unwrap();
            w.write_bits(sr_code as u64, 4).unwrap();
            w.write_bits(5, 8).unwrap();
            // one to one, no embedded stereo, 16-bit speaker mask
            w.write_bit(true).unwrap();
            w.write_bit(false).unwrap();
            w.write_bit(true).unwrap();
            w.write_bits(3, 2).unwrap();
            w.write_bits(spkr_pairs as u64, 16).unwrap();
            w.write_bits(0, 3).unwrap();
        }

        // no drc, no dialog normalization
        w.write_bits(0, 2).unwrap();
        w.write_bits(self.coding_mode as u64, 2).unwrap();
        match self.coding_mode {
            0 => {
                w.write_bits(0x002, 12).unwrap();
                w.write_bits(len - 1, 14).unwrap();
            }
            1 => {
                w.write_bits(len - 1, 16).unwrap();
                w.write_bit(false).unwrap();
                w.write_bits(0, 3).unwrap();
            }
            _ => {
                w.write_bits(len - 1, 14).unwrap();
                w.write_bit(false).unwrap();
            }
        }

        let mut data = w.finish().unwrap();
        data.resize(header_size as usize, 0);
        data.extend_from_slice(&self.payload);
        data
    }
}

/// A 16 byte LBR component, decoder init when a rate code is given.
pub fn lbr_payload(rate_code: Option<u8>) -> Vec<u8> {
    let mut data = vec![0; 16];
    data[..4].copy_from_slice(&SYNCWORD_LBR.to_be_bytes());
    match rate_code {
        Some(code) => {
            data[4] = 2;
            data[5] = code;
        }
        None => data[4] = 1,
    }
    data
}

/// A 16 byte XBR component.
pub fn xbr_payload() -> Vec<u8> {
    let mut data = vec![0; 16];
    data[..4].copy_from_slice(&SYNCWORD_XBR.to_be_bytes());
    data
}

/// A 16 byte XLL component.
pub fn xll_payload(nsegments_log2: u8, nsamples_log2: u8) -> Vec<u8> {
    let mut w = BitWriter::<Vec<u8>>::default();
    w.write_bits(SYNCWORD_XLL as u64, 32).unwrap();
    w.write_bits(0, 4).unwrap();
    w.write_bits(15, 8).unwrap();
    w.write_bits(15, 5).unwrap();
    w.write_bits(0x1234, 16).unwrap();
    w.write_bits(0, 4).unwrap();
    w.write_bits(nsegments_log2 as u64, 4).unwrap();
    w.write_bits(nsamples_log2 as u64, 4).unwrap();
    let mut data = w.finish().unwrap();
    data.resize(16, 0);
    data
}
