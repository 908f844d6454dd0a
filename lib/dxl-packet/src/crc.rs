// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The frame checksum.
//!
//! The protocol uses CRC-16/UMTS: polynomial 0x8005, zero init, no
//! reflection. Frames carry it little-endian after the payload, computed over
//! everything from the first header byte up to (but excluding) the checksum
//! itself.

use crc::{Crc, Digest, CRC_16_UMTS};

static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_UMTS);

/// Incremental CRC engine for one frame at a time.
pub struct Crc16 {
    digest: Digest<'static, u16>,
}

impl Crc16 {
    pub fn new() -> Self {
        Self {
            digest: CRC16.digest(),
        }
    }

    /// Discards any accumulated state.
    pub fn reset(&mut self) {
        self.digest = CRC16.digest();
    }

    pub fn update(&mut self, byte: u8) {
        self.digest.update(&[byte]);
    }

    /// Returns the checksum of everything fed since the last reset, and
    /// resets the engine for the next frame.
    pub fn finish(&mut self) -> u16 {
        let digest = core::mem::replace(&mut self.digest, CRC16.digest());
        digest.finalize()
    }
}

impl Default for Crc16 {
    fn default() -> Self {
        Self::new()
    }
}
