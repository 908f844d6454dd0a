// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A non-owning read window over a byte span.
//!
//! A `Cursor` wraps a borrowed slice (typically one half of a DMA receive
//! buffer) and hands its bytes out in consumption order. It never copies the
//! backing memory; it only tracks how far reading has progressed. Once the
//! span is exhausted, further reads return nothing, so callers can poll it
//! blindly.

#![cfg_attr(not(test), no_std)]

#[derive(Debug)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Copies at most `dst.len()` bytes into `dst` and returns the number of
    /// bytes read. A short read means the backing span is exhausted;
    /// consecutive reads will yield no more data.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.remaining());
        dst[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    /// Reads a single byte, or `None` if the span is exhausted.
    pub fn read_byte(&mut self) -> Option<u8> {
        let byte = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    /// Number of bytes not yet read.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Rewinds to the start of the span.
    pub fn reset(&mut self) {
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_in_chunks() {
        let buf = [0x00, 0xfd, 0x1a, 0x23, 0xb2, 0x88];
        let mut cursor = Cursor::new(&buf);

        assert_eq!(cursor.remaining(), 6);

        let mut dst = [0; 4];
        assert_eq!(cursor.read(&mut dst), 4);
        assert_eq!(cursor.remaining(), 2);
        assert_eq!(dst, [0x00, 0xfd, 0x1a, 0x23]);

        assert_eq!(cursor.read(&mut dst), 2);
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(&dst[..2], [0xb2, 0x88]);

        assert_eq!(cursor.read(&mut dst), 0);
    }

    #[test]
    fn read_empty() {
        let mut cursor = Cursor::new(&[]);

        assert_eq!(cursor.remaining(), 0);
        let mut dst = [0; 4];
        assert_eq!(cursor.read(&mut dst), 0);
        assert_eq!(cursor.remaining(), 0);
        assert_eq!(cursor.read_byte(), None);
    }

    #[test]
    fn single_bytes_then_reset() {
        let buf = [1, 2, 3];
        let mut cursor = Cursor::new(&buf);

        assert_eq!(cursor.read_byte(), Some(1));
        assert_eq!(cursor.read_byte(), Some(2));
        assert_eq!(cursor.remaining(), 1);

        cursor.reset();
        assert_eq!(cursor.remaining(), 3);
        assert_eq!(cursor.read_byte(), Some(1));
    }
}
