// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The double receive buffer shared with the DMA engine.
//!
//! The DMA controller fills a circular region in two halves and raises the
//! half-transfer interrupt when the front half is full and the
//! transfer-complete interrupt when the back half is. Those ISRs are the
//! only writer of the ready flags' `true` state; the reader clears a flag
//! *before* draining the half it guards, so a refill that races the drain is
//! observed as a fresh ready flag on the next poll. There is no
//! backpressure: if the reader falls a full wrap behind, bytes are lost.

/// One bus's double receive buffer, `HALF` bytes per half.
pub struct ReceiveBuf<const HALF: usize> {
    front: [u8; HALF],
    front_len: usize,
    back: [u8; HALF],
    back_len: usize,
    is_front_ready: bool,
    is_back_ready: bool,
}

impl<const HALF: usize> ReceiveBuf<HALF> {
    pub const fn new() -> Self {
        Self {
            front: [0; HALF],
            front_len: 0,
            back: [0; HALF],
            back_len: 0,
            is_front_ready: false,
            is_back_ready: false,
        }
    }

    /// Writer side, half-transfer: the front half is full.
    ///
    /// `bytes` longer than a half are truncated; the DMA engine always
    /// delivers exactly one half.
    pub fn publish_front(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(HALF);
        self.front[..len].copy_from_slice(&bytes[..len]);
        self.front_len = len;
        self.is_front_ready = true;
        self.is_back_ready = false;
    }

    /// Writer side, transfer-complete: the back half is full.
    pub fn publish_back(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(HALF);
        self.back[..len].copy_from_slice(&bytes[..len]);
        self.back_len = len;
        self.is_back_ready = true;
        self.is_front_ready = false;
    }

    /// Reader side: returns the next ready half, clearing its flag first.
    /// The front half is favored, matching delivery order.
    pub fn take_ready(&mut self) -> Option<&[u8]> {
        if self.is_front_ready {
            self.is_front_ready = false;
            Some(&self.front[..self.front_len])
        } else if self.is_back_ready {
            self.is_back_ready = false;
            Some(&self.back[..self.back_len])
        } else {
            None
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.is_front_ready && !self.is_back_ready
    }
}

impl<const HALF: usize> Default for ReceiveBuf<HALF> {
    fn default() -> Self {
        Self::new()
    }
}
