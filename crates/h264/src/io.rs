use std::io::{self, Read, Write};

/// Counts consecutive zero bytes for emulation prevention.
#[derive(Debug, Default, Clone, Copy)]
struct ZeroRun(u8);

impl ZeroRun {
    /// `byte` must be preceded by an emulation prevention byte on output.
    fn needs_escape(self, byte: u8) -> bool {
        self.0 >= 2 && byte <= 0x03
    }

    /// `byte` is an emulation prevention byte on input.
    fn is_escape(self, byte: u8) -> bool {
        self.0 >= 2 && byte == 0x03
    }

    fn push(&mut self, byte: u8) {
        self.0 = if byte == 0x00 { self.0.saturating_add(1) } else { 0 };
    }

    fn reset(&mut self) {
        self.0 = 0;
    }
}

/// A wrapper around a [`std::io::Read`] or [`std::io::Write`] that removes or
/// inserts emulation prevention bytes (`0x03` after two zero bytes).
///
/// Reading turns an escaped NAL payload (EBSP) into its raw form (RBSP),
/// writing does the opposite. The wrapped io is touched one byte at a time,
/// so it should be buffered or in memory.
pub struct EmulationPreventionIo<I> {
    inner: I,
    zeros: ZeroRun,
}

impl<I> EmulationPreventionIo<I> {
    /// Wraps `inner` with a fresh zero counter.
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            zeros: ZeroRun::default(),
        }
    }

    /// Returns the wrapped io.
    pub fn into_inner(self) -> I {
        self.inner
    }
}

impl<I: io::Write> io::Write for EmulationPreventionIo<I> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if self.zeros.needs_escape(byte) {
                self.inner.write_all(&[0x03])?;
                self.zeros.reset();
            }

            self.inner.write_all(&[byte])?;
            self.zeros.push(byte);
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<I: io::Read> io::Read for EmulationPreventionIo<I> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut read_size = 0;
        let mut one_byte = [0; 1];
        while read_size < buf.len() {
            if self.inner.read(&mut one_byte)? == 0 {
                break;
            }

            let byte = one_byte[0];
            if self.zeros.is_escape(byte) {
                self.zeros.reset();
                continue;
            }

            self.zeros.push(byte);
            buf[read_size] = byte;
            read_size += 1;
        }

        Ok(read_size)
    }
}

/// Worst case size of an escaped buffer built from `len` raw bytes.
pub const fn escape_capacity(len: usize) -> usize {
    len + len / 2
}

/// Strips emulation prevention bytes from an escaped NAL unit.
pub fn unescape(ebsp: &[u8]) -> io::Result<Vec<u8>> {
    let mut out = Vec::with_capacity(ebsp.len());
    EmulationPreventionIo::new(ebsp).read_to_end(&mut out)?;
    Ok(out)
}

/// Inserts emulation prevention bytes into a raw NAL unit.
pub fn escape(rbsp: &[u8]) -> io::Result<Vec<u8>> {
    let mut writer = EmulationPreventionIo::new(Vec::with_capacity(escape_capacity(rbsp.len())));
    writer.write_all(rbsp)?;
    Ok(writer.into_inner())
}
