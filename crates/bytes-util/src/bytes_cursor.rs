use std::io;

use bytes::Bytes;

/// An [`io::Cursor`] over [`Bytes`], so that sub-slices can be handed out
/// without copying.
pub type BytesCursor = io::Cursor<Bytes>;

/// Zero copy reads on a [`BytesCursor`].
pub trait BytesCursorExt {
    /// Bytes left between the cursor position and the end of the buffer.
    fn remaining_len(&self) -> usize;

    /// Takes the next `size` bytes as a shared slice of the underlying buffer
    /// and advances past them.
    ///
    /// Fails with [`io::ErrorKind::UnexpectedEof`] when fewer than `size`
    /// bytes are left, in which case the cursor does not move.
    fn extract_bytes(&mut self, size: usize) -> io::Result<Bytes>;

    /// Takes everything that is left. Never fails; an exhausted cursor
    /// yields an empty [`Bytes`].
    fn extract_remaining(&mut self) -> Bytes;
}

impl BytesCursorExt for BytesCursor {
    fn remaining_len(&self) -> usize {
        let position = usize::try_from(self.position()).unwrap_or(usize::MAX);
        self.get_ref().len().saturating_sub(position)
    }

    fn extract_bytes(&mut self, size: usize) -> io::Result<Bytes> {
        let available = self.remaining_len();
        if size > available {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("wanted {size} bytes, {available} left"),
            ));
        }

        if size == 0 {
            return Ok(Bytes::new());
        }

        let start = self.position() as usize;
        let slice = self.get_ref().slice(start..start + size);
        self.set_position((start + size) as u64);

        Ok(slice)
    }

    fn extract_remaining(&mut self) -> Bytes {
        let size = self.remaining_len();
        self.extract_bytes(size).unwrap_or_default()
    }
}
