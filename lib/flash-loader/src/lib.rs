// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bootloader's receive protocol.
//!
//! The host talks to the loader over a virtual serial port with a minimal
//! framing: a `0xFF` start marker, a command byte, and for the flash
//! command a 4-byte little-endian image length followed by the image
//! itself. A literal `0xFF` inside the length or image is transmitted as
//! `0xFF 0xFF`; a `0xFF` followed by anything else is a fresh start marker
//! and aborts whatever was in progress.
//!
//! Image bytes are buffered one erase block at a time; each full block (and
//! the final partial one) is erased and programmed on the spot, so the
//! loader never needs more than one block of RAM.

#![cfg_attr(not(test), no_std)]

use drv_nor_flash_api::{NorFlash, BLOCK_SIZE_BYTES};

const START_BYTE: u8 = 0xff;

const COMMAND_FLASH: u8 = 0x00;
const COMMAND_RUN: u8 = 0x01;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    Waiting,
    Command,
    ImageLen,
    Flashing,
}

pub struct FlashLoader<F> {
    flash: F,
    state: State,
    last_byte: u8,
    /// A start byte was seen inside a length/image field; whether it was a
    /// marker or stuffing is decided by the byte after it.
    pending_marker: bool,
    len_buf: [u8; 4],
    len_buf_len: usize,
    buf: [u8; BLOCK_SIZE_BYTES],
    buf_len: usize,
    image_len: u32,
    written: u32,
    next_block_offset: u32,
    run_pending: bool,
}

impl<F: NorFlash> FlashLoader<F> {
    pub fn new(flash: F) -> Self {
        Self {
            flash,
            state: State::Waiting,
            last_byte: 0,
            pending_marker: false,
            len_buf: [0; 4],
            len_buf_len: 0,
            buf: [0; BLOCK_SIZE_BYTES],
            buf_len: 0,
            image_len: 0,
            written: 0,
            next_block_offset: 0,
            run_pending: false,
        }
    }

    /// Consumes one chunk of the incoming stream. Chunk boundaries are
    /// arbitrary; the state machine resumes wherever the previous chunk
    /// left off.
    pub fn process(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.step(byte);
            self.last_byte = byte;
        }
    }

    /// True once a run command has arrived; the flag is cleared by the
    /// call. The caller owns the actual jump to the installed image.
    pub fn take_run_request(&mut self) -> bool {
        core::mem::take(&mut self.run_pending)
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    fn step(&mut self, byte: u8) {
        match self.state {
            State::Waiting => {
                if byte == START_BYTE && self.last_byte != START_BYTE {
                    self.state = State::Command;
                }
            }
            State::Command => self.dispatch_command(byte),
            State::ImageLen | State::Flashing => {
                if self.pending_marker {
                    self.pending_marker = false;

                    if byte == START_BYTE {
                        // stuffed pair, one literal data byte
                        self.push_data(START_BYTE);
                    } else {
                        // the previous byte really was a start marker
                        self.dispatch_command(byte);
                    }
                } else if byte == START_BYTE {
                    self.pending_marker = true;
                } else {
                    self.push_data(byte);
                }
            }
        }
    }

    fn dispatch_command(&mut self, command: u8) {
        match command {
            COMMAND_FLASH => {
                self.len_buf_len = 0;
                self.pending_marker = false;
                self.state = State::ImageLen;
            }
            COMMAND_RUN => {
                self.run_pending = true;
                self.state = State::Waiting;
            }
            _ => {
                // unknown command
                self.state = State::Waiting;
            }
        }
    }

    fn push_data(&mut self, byte: u8) {
        match self.state {
            State::ImageLen => {
                self.len_buf[self.len_buf_len] = byte;
                self.len_buf_len += 1;

                if self.len_buf_len == self.len_buf.len() {
                    self.image_len = u32::from_le_bytes(self.len_buf);
                    self.len_buf_len = 0;
                    self.buf_len = 0;
                    self.written = 0;
                    self.next_block_offset = 0;

                    // nothing to write if the image is empty
                    self.state = if self.image_len == 0 {
                        State::Waiting
                    } else {
                        State::Flashing
                    };
                }
            }
            State::Flashing => {
                self.buf[self.buf_len] = byte;
                self.buf_len += 1;

                if self.buf_len == BLOCK_SIZE_BYTES
                    || self.remaining_bytes() == 0
                {
                    self.flash_block();
                }

                if self.remaining_bytes() == 0 {
                    self.state = State::Waiting;
                }
            }
            _ => {}
        }
    }

    fn remaining_bytes(&self) -> u32 {
        self.image_len - (self.written + self.buf_len as u32)
    }

    /// Erases the next block and programs the buffered bytes into it. The
    /// write may be shorter than a block, but the whole block is erased
    /// regardless. Flash errors are swallowed; the block's bytes are
    /// dropped and the transfer carries on.
    fn flash_block(&mut self) {
        let offset = self.next_block_offset;
        self.next_block_offset += BLOCK_SIZE_BYTES as u32;
        self.written += self.buf_len as u32;

        let len = core::mem::replace(&mut self.buf_len, 0);

        if self.flash.erase_block(offset).is_err() {
            return;
        }

        let _ = self.flash.write(offset, &self.buf[..len]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drv_nor_flash_api::NorFlashError;

    const FLASH_SIZE: usize = 4 * BLOCK_SIZE_BYTES;

    struct RamFlash {
        data: Vec<u8>,
        erases: Vec<u32>,
        writes: Vec<(u32, usize)>,
        fail_erase: bool,
    }

    impl RamFlash {
        fn new() -> Self {
            Self {
                data: vec![0xee; FLASH_SIZE],
                erases: Vec::new(),
                writes: Vec::new(),
                fail_erase: false,
            }
        }
    }

    impl NorFlash for RamFlash {
        fn erase_block(&mut self, offset: u32) -> Result<(), NorFlashError> {
            assert_eq!(offset as usize % BLOCK_SIZE_BYTES, 0);
            if offset as usize >= FLASH_SIZE {
                return Err(NorFlashError::OutOfRange);
            }
            if self.fail_erase {
                return Err(NorFlashError::EraseFailed);
            }

            self.erases.push(offset);
            self.data[offset as usize..offset as usize + BLOCK_SIZE_BYTES]
                .fill(0xff);
            Ok(())
        }

        fn write(
            &mut self,
            offset: u32,
            data: &[u8],
        ) -> Result<(), NorFlashError> {
            if offset as usize + data.len() > FLASH_SIZE {
                return Err(NorFlashError::OutOfRange);
            }

            self.writes.push((offset, data.len()));
            self.data[offset as usize..offset as usize + data.len()]
                .copy_from_slice(data);
            Ok(())
        }
    }

    fn loader() -> FlashLoader<RamFlash> {
        FlashLoader::new(RamFlash::new())
    }

    #[test]
    fn small_image_is_erased_then_written() {
        let mut loader = loader();

        loader.process(&[
            0xff, 0x00, 0x04, 0x00, 0x00, 0x00, 0xde, 0xad, 0xbe, 0xef,
        ]);

        assert_eq!(loader.flash().erases, [0]);
        assert_eq!(loader.flash().writes, [(0, 4)]);
        assert_eq!(&loader.flash().data[..4], [0xde, 0xad, 0xbe, 0xef]);
        // the rest of the block was erased
        assert_eq!(loader.flash().data[4], 0xff);
        assert!(!loader.take_run_request());
    }

    #[test]
    fn run_command() {
        let mut loader = loader();

        loader.process(&[0xff, 0x01]);
        assert!(loader.take_run_request());
        // the flag is a one-shot
        assert!(!loader.take_run_request());
        assert!(loader.flash().erases.is_empty());
    }

    #[test]
    fn stuffed_literal_in_image_data() {
        let mut loader = loader();

        // 3 data bytes: AA FF BB, the FF stuffed on the wire
        loader.process(&[
            0xff, 0x00, 0x03, 0x00, 0x00, 0x00, 0xaa, 0xff, 0xff, 0xbb,
        ]);

        assert_eq!(&loader.flash().data[..3], [0xaa, 0xff, 0xbb]);
        assert_eq!(loader.flash().writes, [(0, 3)]);
    }

    #[test]
    fn stuffed_literal_in_image_len() {
        let mut loader = loader();

        // image length 0x00_00_00ff, the ff stuffed
        let mut stream = vec![0xff, 0x00, 0xff, 0xff, 0x00, 0x00, 0x00];
        stream.extend(std::iter::repeat(0x42).take(0xff));
        loader.process(&stream);

        assert_eq!(loader.flash().writes, [(0, 0xff)]);
        assert_eq!(loader.flash().data[0xfe], 0x42);
    }

    #[test]
    fn multi_block_image_with_partial_tail() {
        let mut loader = loader();

        let image: Vec<u8> =
            (0..BLOCK_SIZE_BYTES + 5).map(|i| (i % 0x7f) as u8).collect();

        let mut stream = vec![0xff, 0x00];
        stream.extend_from_slice(&(image.len() as u32).to_le_bytes());
        stream.extend_from_slice(&image);
        loader.process(&stream);

        assert_eq!(
            loader.flash().erases,
            [0, BLOCK_SIZE_BYTES as u32]
        );
        assert_eq!(
            loader.flash().writes,
            [(0, BLOCK_SIZE_BYTES), (BLOCK_SIZE_BYTES as u32, 5)]
        );
        assert_eq!(
            &loader.flash().data[..image.len()],
            &image[..]
        );
    }

    #[test]
    fn image_split_across_chunks() {
        let mut loader = loader();

        let stream = [
            0xff, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04,
        ];
        for byte in stream {
            loader.process(&[byte]);
        }

        assert_eq!(&loader.flash().data[..4], [1, 2, 3, 4]);
    }

    #[test]
    fn empty_image_writes_nothing() {
        let mut loader = loader();

        loader.process(&[0xff, 0x00, 0x00, 0x00, 0x00, 0x00]);
        assert!(loader.flash().erases.is_empty());

        // the loader is back in waiting and accepts the next command
        loader.process(&[0x00, 0xff, 0x01]);
        assert!(loader.take_run_request());
    }

    #[test]
    fn start_marker_aborts_a_transfer() {
        let mut loader = loader();

        // a 1000-byte image interrupted after 2 bytes by a run command
        loader.process(&[
            0xff, 0x00, 0xe8, 0x03, 0x00, 0x00, 0x11, 0x22, 0xff, 0x01,
        ]);

        assert!(loader.take_run_request());
        assert!(loader.flash().writes.is_empty());

        // and a fresh flash command works afterwards
        loader.process(&[0xff, 0x00, 0x01, 0x00, 0x00, 0x00, 0x7a]);
        assert_eq!(loader.flash().writes, [(0, 1)]);
        assert_eq!(loader.flash().data[0], 0x7a);
    }

    #[test]
    fn flash_errors_are_swallowed() {
        let mut flash = RamFlash::new();
        flash.fail_erase = true;
        let mut loader = FlashLoader::new(flash);

        loader.process(&[
            0xff, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04,
        ]);

        // the block was skipped but the stream stayed in sync
        assert!(loader.flash().writes.is_empty());
        loader.process(&[0x00, 0xff, 0x01]);
        assert!(loader.take_run_request());
    }
}
