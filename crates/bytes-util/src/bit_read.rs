use std::io;

/// A reader that reads individual bits from a stream, most significant bit first.
///
/// Every read is checked: running out of input yields an
/// [`io::ErrorKind::UnexpectedEof`] error and never a partial value.
#[derive(Debug, Clone)]
#[must_use]
pub struct BitReader<T> {
    data: T,
    bit_pos: u8,
    current_byte: u8,
}

impl<T> BitReader<T> {
    /// Wraps `data`, starting at its current position.
    pub const fn new(data: T) -> Self {
        Self {
            data,
            bit_pos: 0,
            current_byte: 0,
        }
    }
}

impl<T: io::Read> BitReader<T> {
    /// Reads one bit.
    pub fn read_bit(&mut self) -> io::Result<bool> {
        Ok(self.read_bits(1)? == 1)
    }

    fn load_byte(&mut self) -> io::Result<()> {
        let mut buf = [0];
        self.data.read_exact(&mut buf)?;
        self.current_byte = buf[0];
        Ok(())
    }

    /// Reads `count` bits (at most 64) and returns them right-aligned.
    ///
    /// Bits are taken a byte's worth at a time where the alignment allows.
    pub fn read_bits(&mut self, count: u8) -> io::Result<u64> {
        if count > 64 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot read {count} bits at once"),
            ));
        }

        let mut bits = 0u64;
        let mut left = count;
        while left > 0 {
            if self.is_aligned() {
                self.load_byte()?;
            }

            let avail = 8 - self.bit_pos;
            let take = left.min(avail);
            let mask = ((1u16 << take) - 1) as u8;
            let chunk = (self.current_byte >> (avail - take)) & mask;

            bits = (bits << take) | chunk as u64;
            self.bit_pos = (self.bit_pos + take) % 8;
            left -= take;
        }

        Ok(bits)
    }

    /// Discards `count` bits.
    pub fn skip_bits(&mut self, count: u64) -> io::Result<()> {
        let mut left = count;
        while left > 0 {
            let step = left.min(64) as u8;
            self.read_bits(step)?;
            left -= step as u64;
        }
        Ok(())
    }

    /// Aligns the reader to the next byte boundary, dropping the rest of the current byte.
    #[inline(always)]
    pub fn align(&mut self) {
        self.bit_pos = 0;
    }
}

impl<T> BitReader<T> {
    /// Returns the underlying reader
    #[inline(always)]
    #[must_use]
    pub fn into_inner(self) -> T {
        self.data
    }

    /// Returns a reference to the underlying reader
    #[inline(always)]
    #[must_use]
    pub const fn get_ref(&self) -> &T {
        &self.data
    }

    /// Returns the bit index (0-7) inside the byte currently being consumed
    #[inline(always)]
    #[must_use]
    pub const fn bit_pos(&self) -> u8 {
        self.bit_pos
    }

    /// Checks if the reader is aligned to the byte boundary
    #[inline(always)]
    #[must_use]
    pub const fn is_aligned(&self) -> bool {
        self.bit_pos == 0
    }
}

impl<B: AsRef<[u8]>> BitReader<io::Cursor<B>> {
    /// Reads from the start of an in-memory buffer.
    pub const fn new_from_slice(data: B) -> Self {
        Self::new(io::Cursor::new(data))
    }

    /// Number of bits consumed so far.
    #[must_use]
    pub fn bit_position(&self) -> u64 {
        let loaded = self.data.position() * 8;
        if self.is_aligned() {
            loaded
        } else {
            loaded - 8 + self.bit_pos as u64
        }
    }

    /// Total length of the underlying buffer in bits.
    #[must_use]
    pub fn bit_len(&self) -> u64 {
        self.data.get_ref().as_ref().len() as u64 * 8
    }

    /// Number of bits that can still be read.
    #[must_use]
    pub fn bits_remaining(&self) -> u64 {
        self.bit_len().saturating_sub(self.bit_position())
    }

    /// Moves forward to the absolute bit offset `target`.
    ///
    /// Fails without moving when `target` lies behind the current position or
    /// beyond the end of the buffer.
    pub fn seek_to_bit(&mut self, target: u64) -> io::Result<()> {
        let position = self.bit_position();
        if target < position || target > self.bit_len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("cannot seek from bit {position} to bit {target}"),
            ));
        }
        self.skip_bits(target - position)
    }
}
