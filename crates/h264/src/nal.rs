//! Walking NAL units inside a packet or extradata buffer.

use std::ops::Range;

use byteorder::{BigEndian, ByteOrder};
use memchr::memmem;

use crate::NALUnitType;

const START_CODE: [u8; 3] = [0x00, 0x00, 0x01];

/// Size of the big-endian length field in front of every NAL unit in
/// length-prefixed (AVCC) framing.
pub const NAL_LENGTH_SIZE: usize = 4;

/// How NAL units are delimited inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NalFraming {
    /// `00 00 01` / `00 00 00 01` start codes.
    AnnexB,
    /// A 4-byte big-endian size field before each unit.
    LengthPrefixed,
}

impl NalFraming {
    /// Decides the framing of a buffer.
    ///
    /// A buffer that opens with a start code is Annex-B unless its size
    /// fields also split it into units that end exactly at the buffer end.
    /// A 4-byte size between 256 and 511 looks like `00 00 01`, so the
    /// leading bytes alone are not enough. Anything else is assumed to be
    /// length-prefixed.
    pub fn detect(buf: &[u8]) -> Self {
        let start_code = buf.starts_with(&START_CODE) || buf.starts_with(&[0x00, 0x00, 0x00, 0x01]);
        if start_code && !Self::length_prefixed_covers(buf) {
            Self::AnnexB
        } else {
            Self::LengthPrefixed
        }
    }

    fn length_prefixed_covers(buf: &[u8]) -> bool {
        let end = NalUnits::new(buf, Self::LengthPrefixed)
            .last()
            .map_or(0, |unit| unit.offset + unit.len);
        end > 0 && end == buf.len()
    }
}

/// Position of one NAL unit inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit {
    /// Type decoded from the header byte.
    pub unit_type: NALUnitType,
    /// Offset of the NAL header byte.
    pub offset: usize,
    /// Length of header plus payload, still escaped.
    pub len: usize,
    /// Framing the unit was found in. For [`NalFraming::LengthPrefixed`] the
    /// size field sits at `offset - 4`.
    pub framing: NalFraming,
}

impl NalUnit {
    /// Byte range of the unit (header included).
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Finds the next start code at or after `cursor` and returns the type of the
/// NAL unit behind it together with the offset just past its header byte.
///
/// Returns `None` when no further start code is followed by a header byte.
pub fn locate_next_nal(buf: &[u8], cursor: usize) -> Option<(NALUnitType, usize)> {
    let rest = buf.get(cursor..)?;
    let start = cursor + memmem::find(rest, &START_CODE)?;
    let header = start + START_CODE.len();
    let header_byte = *buf.get(header)?;
    Some((NALUnitType::from_header_byte(header_byte), header + 1))
}

/// Iterator over the NAL units of one buffer.
#[derive(Debug, Clone)]
pub struct NalUnits<'a> {
    buf: &'a [u8],
    framing: NalFraming,
    cursor: usize,
}

impl<'a> NalUnits<'a> {
    /// Walks `buf` using the given framing.
    pub fn new(buf: &'a [u8], framing: NalFraming) -> Self {
        Self { buf, framing, cursor: 0 }
    }

    fn next_annex_b(&mut self) -> Option<NalUnit> {
        let (unit_type, after_header) = locate_next_nal(self.buf, self.cursor)?;
        let offset = after_header - 1;

        let mut end = memmem::find(&self.buf[after_header..], &START_CODE)
            .map_or(self.buf.len(), |pos| after_header + pos);
        self.cursor = end;

        // zero bytes in front of the next start code belong to it
        while end > after_header && self.buf[end - 1] == 0x00 {
            end -= 1;
        }

        Some(NalUnit {
            unit_type,
            offset,
            len: end - offset,
            framing: NalFraming::AnnexB,
        })
    }

    fn next_length_prefixed(&mut self) -> Option<NalUnit> {
        let size_field = self.buf.get(self.cursor..self.cursor + NAL_LENGTH_SIZE)?;
        let len = BigEndian::read_u32(size_field) as usize;
        let offset = self.cursor + NAL_LENGTH_SIZE;

        if len == 0 || len > self.buf.len() - offset {
            tracing::trace!(offset, len, "nal size field overruns buffer, stopping");
            self.cursor = self.buf.len();
            return None;
        }

        self.cursor = offset + len;
        Some(NalUnit {
            unit_type: NALUnitType::from_header_byte(self.buf[offset]),
            offset,
            len,
            framing: NalFraming::LengthPrefixed,
        })
    }
}

impl Iterator for NalUnits<'_> {
    type Item = NalUnit;

    fn next(&mut self) -> Option<Self::Item> {
        match self.framing {
            NalFraming::AnnexB => self.next_annex_b(),
            NalFraming::LengthPrefixed => self.next_length_prefixed(),
        }
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_locate_next_nal() {
        let buf = [0x00, 0x00, 0x01, 0x67, 0xAA, 0x00, 0x00, 0x01, 0x65, 0xBB];

        assert_eq!(locate_next_nal(&buf, 0), Some((NALUnitType::SPS, 4)));
        assert_eq!(locate_next_nal(&buf, 4), Some((NALUnitType::IDRSlice, 9)));
        assert_eq!(locate_next_nal(&buf, 9), None);
        assert_eq!(locate_next_nal(&buf, 42), None);
    }

    #[test]
    fn test_locate_start_code_without_header() {
        assert_eq!(locate_next_nal(&[0xFF, 0x00, 0x00, 0x01], 0), None);
    }

    #[test]
    fn test_detect_framing() {
        assert_eq!(NalFraming::detect(&[0, 0, 1, 0x67]), NalFraming::AnnexB);
        assert_eq!(NalFraming::detect(&[0, 0, 0, 1, 0x67, 0x42, 0x00]), NalFraming::AnnexB);
        assert_eq!(NalFraming::detect(&[0, 0, 0, 5, 0x67]), NalFraming::LengthPrefixed);
        assert_eq!(NalFraming::detect(&[]), NalFraming::LengthPrefixed);
    }

    #[test]
    fn test_detect_size_field_that_looks_like_start_code() {
        // 300 byte SEI, then an IDR slice
        let mut buf = vec![0x00, 0x00, 0x01, 0x2C, 0x06];
        buf.extend_from_slice(&[0x55; 299]);
        buf.extend_from_slice(&[0x00, 0x00, 0x00, 0x02, 0x65, 0x88]);
        assert_eq!(NalFraming::detect(&buf), NalFraming::LengthPrefixed);

        // a truncated last unit does not count as a cover
        buf.truncate(buf.len() - 1);
        assert_eq!(NalFraming::detect(&buf), NalFraming::AnnexB);
    }

    #[test]
    fn test_annex_b_units() {
        let buf = [
            0x00, 0x00, 0x00, 0x01, 0x09, 0xF0, // AUD behind a 4 byte start code
            0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x1E, // SPS
            0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, // PPS
            0x00, 0x00, 0x01, 0x65, 0x88, 0x84,
        ];

        let units: Vec<_> = NalUnits::new(&buf, NalFraming::AnnexB).collect();
        let summary: Vec<_> = units.iter().map(|u| (u.unit_type, u.offset, u.len)).collect();
        assert_eq!(
            summary,
            vec![
                (NALUnitType::AccessUnitDelimiter, 4, 2),
                (NALUnitType::SPS, 9, 4),
                (NALUnitType::PPS, 17, 2),
                (NALUnitType::IDRSlice, 22, 3),
            ]
        );
        assert_eq!(&buf[units[1].range()], &[0x67, 0x42, 0x00, 0x1E]);
    }

    #[test]
    fn test_length_prefixed_units() {
        let buf = [
            0x00, 0x00, 0x00, 0x03, 0x67, 0x42, 0x1E, //
            0x00, 0x00, 0x00, 0x02, 0x68, 0xCE, //
            0x00, 0x00, 0x00, 0x09, 0x65, 0x88, // claims more than is left
        ];

        let units: Vec<_> = NalUnits::new(&buf, NalFraming::LengthPrefixed).collect();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].unit_type, NALUnitType::SPS);
        assert_eq!(units[0].range(), 4..7);
        assert_eq!(units[1].unit_type, NALUnitType::PPS);
        assert_eq!(units[1].range(), 11..13);
    }

    #[test]
    fn test_length_prefixed_truncated_size_field() {
        let buf = [0x00, 0x00, 0x00, 0x02, 0x09, 0xF0, 0x00, 0x00];
        let units: Vec<_> = NalUnits::new(&buf, NalFraming::LengthPrefixed).collect();
        assert_eq!(units.len(), 1);
    }
}
