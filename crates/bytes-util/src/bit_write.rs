use std::io;

use crate::BitReader;

/// Largest number of bits moved per step by [`BitWriter::copy_bits`].
const COPY_CHUNK_BITS: u8 = 24;

/// Writes individual bits to a [`io::Write`], most significant bit first.
///
/// A byte reaches the inner writer once all eight of its bits are known.
#[derive(Debug)]
#[must_use]
pub struct BitWriter<W> {
    bit_pos: u8,
    current_byte: u8,
    bits_written: u64,
    writer: W,
}

impl<W: Default> Default for BitWriter<W> {
    fn default() -> Self {
        Self::new(W::default())
    }
}

impl<W: io::Write> BitWriter<W> {
    /// Writes one bit.
    pub fn write_bit(&mut self, bit: bool) -> io::Result<()> {
        self.write_bits(bit as u64, 1)
    }

    /// Writes the low `count` bits of `bits`, most significant first.
    ///
    /// Fails with [`io::ErrorKind::InvalidData`] when `bits` does not fit.
    pub fn write_bits(&mut self, bits: u64, count: u8) -> io::Result<()> {
        if count > 64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot write {count} bits at once"),
            ));
        }

        if count < 64 && bits >> count != 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{bits:#x} does not fit in {count} bits"),
            ));
        }

        let mut left = count;
        while left > 0 {
            let free = 8 - self.bit_pos;
            let take = left.min(free);
            let chunk = (bits >> (left - take)) as u8 & ((1u16 << take) - 1) as u8;

            self.current_byte |= chunk << (free - take);
            self.bit_pos += take;
            self.bits_written += take as u64;
            left -= take;

            if self.bit_pos == 8 {
                self.writer.write_all(&[self.current_byte])?;
                self.current_byte = 0;
                self.bit_pos = 0;
            }
        }

        Ok(())
    }

    /// Copies `count` bits verbatim from `reader`.
    ///
    /// Works at any alignment of either side. Bits move in chunks of up to 24
    /// bits followed by a final partial chunk.
    pub fn copy_bits<R: io::Read>(&mut self, reader: &mut BitReader<R>, count: u64) -> io::Result<()> {
        let mut left = count;
        while left > 0 {
            let step = left.min(COPY_CHUNK_BITS as u64) as u8;
            let bits = reader.read_bits(step)?;
            self.write_bits(bits, step)?;
            left -= step as u64;
        }
        Ok(())
    }

    /// Pads the stream with zero bits up to the next byte boundary and
    /// returns the underlying writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.align()?;
        Ok(self.writer)
    }

    /// Pads with zero bits up to the next byte boundary.
    pub fn align(&mut self) -> io::Result<()> {
        if !self.is_aligned() {
            self.write_bits(0, 8 - self.bit_pos())?;
        }

        Ok(())
    }
}

impl<W> BitWriter<W> {
    /// Wraps `writer`.
    pub const fn new(writer: W) -> Self {
        Self {
            bit_pos: 0,
            current_byte: 0,
            bits_written: 0,
            writer,
        }
    }

    /// Bits already placed in the pending byte (0-7).
    #[inline(always)]
    #[must_use]
    pub const fn bit_pos(&self) -> u8 {
        self.bit_pos % 8
    }

    /// True when no partial byte is pending.
    #[inline(always)]
    #[must_use]
    pub const fn is_aligned(&self) -> bool {
        self.bit_pos % 8 == 0
    }

    /// Total number of bits written, including bits still buffered.
    #[inline(always)]
    #[must_use]
    pub const fn bits_written(&self) -> u64 {
        self.bits_written
    }

    /// The inner writer. A pending partial byte is not in it yet.
    #[inline(always)]
    #[must_use]
    pub const fn get_ref(&self) -> &W {
        &self.writer
    }
}

#[cfg(test)]
#[cfg_attr(all(test, coverage_nightly), coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_write_header_fields() {
        let mut writer = BitWriter::<Vec<u8>>::default();

        // nal header of an SPS
        writer.write_bit(false).unwrap();
        writer.write_bits(3, 2).unwrap();
        writer.write_bits(7, 5).unwrap();
        assert!(writer.is_aligned());

        // profile_idc, then a field that straddles bytes
        writer.write_bits(66, 8).unwrap();
        writer.write_bits(0b1_0110_0111, 9).unwrap();
        assert_eq!(writer.bit_pos(), 1);
        assert_eq!(writer.bits_written(), 25);
        assert_eq!(writer.get_ref().as_slice(), &[0x67, 66, 0b1011_0011]);

        let err = writer.write_bits(0b100, 2).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(err.to_string(), "0x4 does not fit in 2 bits");
        assert_eq!(writer.bits_written(), 25);

        writer.write_bits(u64::MAX, 64).unwrap();
        writer.align().unwrap();
        assert_eq!(writer.bits_written(), 96);
        assert_eq!(
            writer.finish().unwrap(),
            [&[0x67, 66, 0b1011_0011, 0xFF][..], &[0xFF; 7], &[0x80]].concat()
        );
    }

    #[test]
    fn test_fixed_width_round_trip() {
        for count in 0..=32u8 {
            let values = [0u64, 1, (1u64 << count) >> 1, (1u64 << count).saturating_sub(1)];
            for value in values.into_iter().filter(|v| *v < (1u64 << count).max(1)) {
                let mut writer = BitWriter::<Vec<u8>>::default();
                writer.write_bit(true).unwrap();
                writer.write_bits(value, count).unwrap();
                let data = writer.finish().unwrap();

                let mut reader = BitReader::new_from_slice(data);
                assert!(reader.read_bit().unwrap());
                assert_eq!(reader.read_bits(count).unwrap(), value, "{count} bit value {value}");
            }
        }
    }

    #[test]
    fn test_copy_bits_unaligned() {
        let source = [0xDE, 0xAD, 0xBE, 0xEF, 0x12, 0x34, 0x56];
        let mut reader = BitReader::new_from_slice(source);
        reader.read_bits(3).unwrap();

        let mut writer = BitWriter::<Vec<u8>>::default();
        writer.write_bits(0b101, 3).unwrap();
        writer.copy_bits(&mut reader, 53).unwrap();
        assert_eq!(reader.bits_remaining(), 0);
        assert_eq!(writer.bits_written(), 56);

        let out = writer.finish().unwrap();
        // first three bits replaced, the rest carried through at the same offset
        assert_eq!(out[0], (0xDE & 0b0001_1111) | 0b1010_0000);
        assert_eq!(&out[1..], &source[1..]);
    }

    #[test]
    fn test_copy_bits_shifts_alignment() {
        let mut reader = BitReader::new_from_slice([0xFF, 0x00, 0xFF]);
        let mut writer = BitWriter::<Vec<u8>>::default();
        writer.write_bits(0, 4).unwrap();
        writer.copy_bits(&mut reader, 24).unwrap();
        assert_eq!(writer.finish().unwrap(), vec![0x0F, 0xF0, 0x0F, 0xF0]);
    }

    #[test]
    fn test_copy_bits_past_end_fails() {
        let mut reader = BitReader::new_from_slice([0xFF]);
        let mut writer = BitWriter::<Vec<u8>>::default();
        let err = writer.copy_bits(&mut reader, 9).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
