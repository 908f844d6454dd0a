// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Contract between the flash loader and the external NOR flash driver.
//!
//! NOR flash only clears bits on write, so every block must be erased
//! before it is programmed; the loader works strictly in erase-block units
//! and never writes across a block boundary.

#![no_std]

/// Size in bytes of a single erase block (i.e., the granularity of
/// `erase_block()`).
///
/// This is really a property of the flash part, but it is correct for the
/// 4 KiB-subsector parts we install. If that changes, this will need to
/// become something more flexible.
pub const BLOCK_SIZE_BYTES: usize = 4096;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NorFlashError {
    EraseFailed,
    WriteFailed,
    /// The requested range lies outside the device.
    OutOfRange,
}

/// A NOR flash presented as a flat, block-erasable byte range. Offsets are
/// flash-relative (0 is the first byte of the part), not CPU addresses.
pub trait NorFlash {
    /// Erases the block starting at `offset`, which must be block-aligned.
    fn erase_block(&mut self, offset: u32) -> Result<(), NorFlashError>;

    /// Programs `data` at `offset`. Callers erase first and keep the write
    /// inside a single erase block.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), NorFlashError>;
}
